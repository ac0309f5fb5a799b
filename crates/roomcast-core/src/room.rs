//! Room naming and cohort mapping
//!
//! Rooms are flat string keys with no hierarchy. Every connection sits in
//! its own session-id room; registration adds the identity-id room and,
//! when the role is recognized, the role cohort room plus the catch-all.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Catch-all room joined by every connection with a recognized role
pub const CATCH_ALL: &str = "all";

/// Recognized identity roles
///
/// Roles arrive as free strings on the wire; anything outside this set is
/// an unrecognized role and keeps the connection out of cohort rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Creator,
    Admin,
}

impl Role {
    /// Parse a role string (exact, case-sensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "creator" => Some(Role::Creator),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Creator => "creator",
            Role::Admin => "admin",
        }
    }

    /// Cohort room for this role (same key as the role name)
    pub fn room(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// Announcement audiences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Everyone in the catch-all room
    All,
    /// The user cohort
    Users,
    /// The creator cohort
    Creators,
}

impl Target {
    /// Parse a target string (exact, case-sensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Target::All),
            "users" => Some(Target::Users),
            "creators" => Some(Target::Creators),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::All => "all",
            Target::Users => "users",
            Target::Creators => "creators",
        }
    }

    /// Room this target resolves to
    pub fn room(&self) -> &'static str {
        match self {
            Target::All => CATCH_ALL,
            Target::Users => Role::User.room(),
            Target::Creators => Role::Creator.room(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
