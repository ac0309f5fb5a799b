//! Protocol types and message definitions

use serde::{Deserialize, Serialize};

use crate::room::Role;
use crate::time::{self, Timestamp};
use crate::PROTOCOL_VERSION;

/// Event name for broadcast announcements
pub const EVENT_ANNOUNCEMENT: &str = "announcement";

/// Event name for user-directed notifications
pub const EVENT_NOTIFICATION: &str = "notification";

/// Identity supplied by a client at registration
///
/// The role travels as a free string; [`Identity::parsed_role`] tells the
/// recognized roles apart from everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub role: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
        }
    }

    /// Parsed role, `None` when the role string is unrecognized
    pub fn parsed_role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }
}

/// Ephemeral notification payload delivered to room members
///
/// Not persisted anywhere; a member that is offline at emit time never
/// sees the notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
    /// Server-assigned Unix timestamp in microseconds
    pub timestamp: Timestamp,
    /// Payload kind, `"announcement"` or `"notification"` unless overridden
    #[serde(rename = "type")]
    pub kind: String,
}

impl Notice {
    /// Build an announcement notice stamped with the current time
    pub fn announcement(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            timestamp: time::now(),
            kind: EVENT_ANNOUNCEMENT.to_string(),
        }
    }

    /// Build a notification notice stamped with the current time
    ///
    /// `kind` overrides the default `"notification"` payload kind.
    pub fn notification(
        title: impl Into<String>,
        message: impl Into<String>,
        kind: Option<String>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            timestamp: time::now(),
            kind: kind.unwrap_or_else(|| EVENT_NOTIFICATION.to_string()),
        }
    }
}

/// Announcement request resolved against a cohort room
///
/// `target` stays a string at this boundary because it usually arrives
/// straight out of an HTTP body; the notifier parses it at send time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncementRequest {
    pub title: String,
    pub message: String,
    /// One of `all`, `users`, `creators`
    pub target: String,
}

impl AnnouncementRequest {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            target: target.into(),
        }
    }
}

/// Notification request addressed to a single user's identity room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub user_id: String,
    pub title: String,
    pub message: String,
    /// Optional payload kind override
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
}

impl NotificationRequest {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            message: message.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// Protocol message enum
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "REGISTER")]
    Register(RegisterMessage),

    #[serde(rename = "WELCOME")]
    Welcome(WelcomeMessage),

    #[serde(rename = "EVENT")]
    Event(EventMessage),

    #[serde(rename = "PING")]
    Ping,

    #[serde(rename = "PONG")]
    Pong,
}

impl Message {
    /// Wire name of the message variant, for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Register(_) => "REGISTER",
            Message::Welcome(_) => "WELCOME",
            Message::Event(_) => "EVENT",
            Message::Ping => "PING",
            Message::Pong => "PONG",
        }
    }
}

/// REGISTER message - identity registration, opens or reshapes room membership
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterMessage {
    pub version: u8,
    pub id: String,
    pub role: String,
}

impl RegisterMessage {
    pub fn new(identity: Identity) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            id: identity.id,
            role: identity.role,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.id.clone(), self.role.clone())
    }
}

/// WELCOME message - registration accepted, carries the session id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeMessage {
    pub version: u8,
    pub session: String,
    pub name: String,
    pub time: Timestamp,
}

/// EVENT message - a notice fanned out to a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub event: String,
    pub notice: Notice,
}

impl EventMessage {
    pub fn new(event: impl Into<String>, notice: Notice) -> Self {
        Self {
            event: event.into(),
            notice,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_kind_defaults() {
        let a = Notice::announcement("Maintenance", "Back at noon");
        assert_eq!(a.kind, EVENT_ANNOUNCEMENT);
        assert!(a.timestamp > 0);

        let n = Notice::notification("Order shipped", "Track it online", None);
        assert_eq!(n.kind, EVENT_NOTIFICATION);

        let custom = Notice::notification("Payout", "Funds released", Some("payout".into()));
        assert_eq!(custom.kind, "payout");
    }

    #[test]
    fn test_notice_kind_serializes_as_type() {
        let notice = Notice::announcement("t", "m");
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["type"], "announcement");
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_register_carries_identity() {
        let msg = RegisterMessage::new(Identity::new("user-7", Role::Creator));
        assert_eq!(msg.version, PROTOCOL_VERSION);
        assert_eq!(msg.id, "user-7");
        assert_eq!(msg.role, "creator");
        assert_eq!(msg.identity().parsed_role(), Some(Role::Creator));
    }

    #[test]
    fn test_unrecognized_role_parses_to_none() {
        let identity = Identity::new("user-9", "superuser");
        assert_eq!(identity.parsed_role(), None);
    }

    #[test]
    fn test_notification_request_kind_rename() {
        let req = NotificationRequest::new("u1", "t", "m").with_kind("billing");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "billing");

        let parsed: NotificationRequest =
            serde_json::from_str(r#"{"user_id":"u1","title":"t","message":"m"}"#).unwrap();
        assert_eq!(parsed.kind, None);
    }
}
