//! Room routing
//!
//! Translates a registered identity into the canonical membership set.
//! After `register` a connection belongs to exactly: its session-id room,
//! the identity-id room, and (when the role is recognized) the role cohort
//! room plus the catch-all. Everything else it was in before is left.

use std::sync::Arc;
use tracing::{debug, info};

use roomcast_core::{Identity, CATCH_ALL};

use crate::connection::SessionId;
use crate::registry::ConnectionRegistry;

/// Sole writer of room memberships for registered identities
pub struct RoomRouter {
    registry: Arc<ConnectionRegistry>,
}

impl RoomRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Apply a registration to the membership table
    ///
    /// Idempotent, and safe to call any number of times per connection;
    /// the latest identity wins wholesale. An unrecognized role keeps the
    /// connection out of the cohort rooms but still joins the identity
    /// room, so direct notifications keep working.
    pub fn register(&self, session_id: &SessionId, identity: &Identity) {
        self.registry.leave_all_except(session_id, session_id);

        match identity.parsed_role() {
            Some(role) => {
                self.registry.join(session_id, role.room());
                self.registry.join(session_id, CATCH_ALL);
            }
            None => {
                debug!(
                    "Unrecognized role '{}' for {}, cohort rooms skipped",
                    identity.role, session_id
                );
            }
        }

        if identity.id.is_empty() {
            debug!("Empty identity id for {}, identity room skipped", session_id);
        } else {
            self.registry.join(session_id, &identity.id);
        }

        info!(
            "Registered {} as '{}' (role '{}')",
            session_id, identity.id, identity.role
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::test_support::RecordingSender;
    use std::collections::HashSet;

    fn setup() -> (Arc<ConnectionRegistry>, RoomRouter, SessionId) {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = RoomRouter::new(registry.clone());
        let conn = Arc::new(Connection::new(RecordingSender::new()));
        let id = conn.id.clone();
        registry.insert(conn);
        (registry, router, id)
    }

    fn rooms(registry: &ConnectionRegistry, id: &SessionId) -> HashSet<String> {
        registry.rooms_of(id)
    }

    #[test]
    fn test_register_recognized_role() {
        let (registry, router, sid) = setup();

        router.register(&sid, &Identity::new("user-1", "creator"));

        let expected: HashSet<String> = [sid.clone(), "creator".into(), "all".into(), "user-1".into()]
            .into_iter()
            .collect();
        assert_eq!(rooms(&registry, &sid), expected);
    }

    #[test]
    fn test_register_unrecognized_role_joins_identity_only() {
        let (registry, router, sid) = setup();

        router.register(&sid, &Identity::new("user-9", "superuser"));

        let expected: HashSet<String> = [sid.clone(), "user-9".into()].into_iter().collect();
        assert_eq!(rooms(&registry, &sid), expected);
        assert_eq!(registry.member_count("all"), 0);
    }

    #[test]
    fn test_register_is_idempotent() {
        let (registry, router, sid) = setup();
        let identity = Identity::new("user-1", "user");

        router.register(&sid, &identity);
        let first = rooms(&registry, &sid);
        router.register(&sid, &identity);
        let second = rooms(&registry, &sid);

        assert_eq!(first, second);
        assert_eq!(registry.member_count("user"), 1);
    }

    #[test]
    fn test_reregistration_supersedes_previous_identity() {
        let (registry, router, sid) = setup();

        router.register(&sid, &Identity::new("user-1", "user"));
        router.register(&sid, &Identity::new("creator-5", "creator"));

        let expected: HashSet<String> =
            [sid.clone(), "creator".into(), "all".into(), "creator-5".into()]
                .into_iter()
                .collect();
        assert_eq!(rooms(&registry, &sid), expected);
        assert_eq!(registry.member_count("user"), 0);
        assert_eq!(registry.member_count("user-1"), 0);
        assert_eq!(registry.member_count("all"), 1);
    }

    #[test]
    fn test_register_empty_id_skips_identity_room() {
        let (registry, router, sid) = setup();

        router.register(&sid, &Identity::new("", "user"));

        let expected: HashSet<String> = [sid.clone(), "user".into(), "all".into()]
            .into_iter()
            .collect();
        assert_eq!(rooms(&registry, &sid), expected);
    }

    #[test]
    fn test_role_change_to_unrecognized_leaves_cohorts() {
        let (registry, router, sid) = setup();

        router.register(&sid, &Identity::new("user-1", "admin"));
        router.register(&sid, &Identity::new("user-1", "banned"));

        let expected: HashSet<String> = [sid.clone(), "user-1".into()].into_iter().collect();
        assert_eq!(rooms(&registry, &sid), expected);
        assert_eq!(registry.member_count("admin"), 0);
    }
}
