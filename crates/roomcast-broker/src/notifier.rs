//! Notification send boundary
//!
//! The notifier is the handle route handlers call to push announcements
//! and notifications into rooms. It is cheap to clone and shares the
//! broker's registry and serving flag; constructing one before the broker
//! serves is fine, sending through it is not.

use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

use roomcast_core::{
    codec, AnnouncementRequest, EventMessage, Message, Notice, NotificationRequest, Target,
    EVENT_ANNOUNCEMENT, EVENT_NOTIFICATION,
};

use crate::error::SendError;
use crate::registry::ConnectionRegistry;

/// Cloneable send handle over the broker's rooms
#[derive(Clone)]
pub struct Notifier {
    registry: Arc<ConnectionRegistry>,
    running: Arc<RwLock<bool>>,
}

impl Notifier {
    pub(crate) fn new(registry: Arc<ConnectionRegistry>, running: Arc<RwLock<bool>>) -> Self {
        Self { registry, running }
    }

    /// Broadcast an announcement to a cohort
    ///
    /// `target` must parse as one of `all`, `users`, `creators`; anything
    /// else is logged and dropped without emitting. Returns the number of
    /// member connections the event was handed to.
    pub async fn send_announcement(
        &self,
        request: AnnouncementRequest,
    ) -> Result<usize, SendError> {
        if !*self.running.read() {
            warn!(
                "Announcement '{}' dropped: broker is not serving",
                request.title
            );
            return Err(SendError::Uninitialized);
        }

        let target = match Target::parse(&request.target) {
            Some(target) => target,
            None => {
                warn!(
                    "Announcement '{}' dropped: invalid target '{}'",
                    request.title, request.target
                );
                return Err(SendError::InvalidTarget(request.target));
            }
        };

        let notice = Notice::announcement(request.title, request.message);
        self.emit(target.room(), EVENT_ANNOUNCEMENT, notice).await
    }

    /// Send a notification to one user's identity room
    ///
    /// Reaches every connection registered under `user_id`; when the user
    /// is offline the notice is silently dropped (`Ok(0)`). An empty user
    /// id is rejected. Returns the number of member connections reached.
    pub async fn send_notification(
        &self,
        request: NotificationRequest,
    ) -> Result<usize, SendError> {
        if !*self.running.read() {
            warn!(
                "Notification '{}' dropped: broker is not serving",
                request.title
            );
            return Err(SendError::Uninitialized);
        }

        if request.user_id.is_empty() {
            warn!("Notification '{}' dropped: empty user id", request.title);
            return Err(SendError::InvalidTarget("empty user id".to_string()));
        }

        let notice = Notice::notification(request.title, request.message, request.kind);
        self.emit(&request.user_id, EVENT_NOTIFICATION, notice).await
    }

    /// Encode once, fan out to every current member of the room
    async fn emit(&self, room: &str, event: &str, notice: Notice) -> Result<usize, SendError> {
        let message = Message::Event(EventMessage::new(event, notice));
        let bytes: Bytes =
            codec::encode(&message).map_err(|e| SendError::Encode(e.to_string()))?;

        let members = self.registry.members(room);
        if members.is_empty() {
            debug!("No members in room '{}', {} dropped", room, event);
            return Ok(0);
        }

        // Best effort: a member with a dying socket is skipped, not retried
        let mut delivered = 0;
        for connection in &members {
            match connection.send(bytes.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Send to {} failed: {}", connection.id, e),
            }
        }

        debug!(
            "Emitted {} to {}/{} members of '{}'",
            event,
            delivered,
            members.len(),
            room
        );
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::router::RoomRouter;
    use crate::test_support::RecordingSender;
    use roomcast_core::Identity;

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        router: RoomRouter,
        running: Arc<RwLock<bool>>,
        notifier: Notifier,
    }

    fn fixture(serving: bool) -> Fixture {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = RoomRouter::new(registry.clone());
        let running = Arc::new(RwLock::new(serving));
        let notifier = Notifier::new(registry.clone(), running.clone());
        Fixture {
            registry,
            router,
            running,
            notifier,
        }
    }

    fn join(fx: &Fixture, id: &str, role: &str) -> Arc<RecordingSender> {
        let sender = RecordingSender::new();
        let conn = Arc::new(Connection::new(sender.clone()));
        let sid = conn.id.clone();
        fx.registry.insert(conn);
        fx.router.register(&sid, &Identity::new(id, role));
        sender
    }

    #[tokio::test]
    async fn test_uninitialized_broker_emits_nothing() {
        let fx = fixture(false);
        let member = join(&fx, "user-1", "user");

        let result = fx
            .notifier
            .send_announcement(AnnouncementRequest::new("t", "m", "all"))
            .await;

        assert_eq!(result, Err(SendError::Uninitialized));
        assert_eq!(member.sent_count(), 0);

        let result = fx
            .notifier
            .send_notification(NotificationRequest::new("user-1", "t", "m"))
            .await;
        assert_eq!(result, Err(SendError::Uninitialized));
        assert_eq!(member.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_target_emits_nothing() {
        let fx = fixture(true);
        let member = join(&fx, "user-1", "user");

        let result = fx
            .notifier
            .send_announcement(AnnouncementRequest::new("t", "m", "everyone"))
            .await;

        assert_eq!(result, Err(SendError::InvalidTarget("everyone".to_string())));
        assert_eq!(member.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_announcement_reaches_cohort_only() {
        let fx = fixture(true);
        let creator_a = join(&fx, "creator-1", "creator");
        let creator_b = join(&fx, "creator-2", "creator");
        let user = join(&fx, "user-1", "user");

        let delivered = fx
            .notifier
            .send_announcement(AnnouncementRequest::new("Payouts", "Live now", "creators"))
            .await
            .unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(creator_a.sent_count(), 1);
        assert_eq!(creator_b.sent_count(), 1);
        assert_eq!(user.sent_count(), 0);

        match &creator_a.messages()[0] {
            Message::Event(ev) => {
                assert_eq!(ev.event, EVENT_ANNOUNCEMENT);
                assert_eq!(ev.notice.title, "Payouts");
                assert_eq!(ev.notice.kind, "announcement");
                assert!(ev.notice.timestamp > 0);
            }
            other => panic!("expected EVENT, got {}", other.type_name()),
        }
    }

    #[tokio::test]
    async fn test_announcement_all_reaches_every_cohort() {
        let fx = fixture(true);
        let user = join(&fx, "user-1", "user");
        let creator = join(&fx, "creator-1", "creator");
        let admin = join(&fx, "admin-1", "admin");
        let stranger = join(&fx, "ghost-1", "banned"); // unrecognized role

        let delivered = fx
            .notifier
            .send_announcement(AnnouncementRequest::new("Maint", "02:00 UTC", "all"))
            .await
            .unwrap();

        assert_eq!(delivered, 3);
        assert_eq!(user.sent_count(), 1);
        assert_eq!(creator.sent_count(), 1);
        assert_eq!(admin.sent_count(), 1);
        assert_eq!(stranger.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_notification_reaches_all_user_connections() {
        let fx = fixture(true);
        let phone = join(&fx, "user-1", "user");
        let laptop = join(&fx, "user-1", "user");
        let other = join(&fx, "user-2", "user");

        let delivered = fx
            .notifier
            .send_notification(
                NotificationRequest::new("user-1", "Order", "Shipped").with_kind("shipping"),
            )
            .await
            .unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(phone.sent_count(), 1);
        assert_eq!(laptop.sent_count(), 1);
        assert_eq!(other.sent_count(), 0);

        match &phone.messages()[0] {
            Message::Event(ev) => {
                assert_eq!(ev.event, EVENT_NOTIFICATION);
                assert_eq!(ev.notice.kind, "shipping");
            }
            other => panic!("expected EVENT, got {}", other.type_name()),
        }
    }

    #[tokio::test]
    async fn test_notification_to_offline_user_is_dropped() {
        let fx = fixture(true);
        let online = join(&fx, "user-1", "user");

        let delivered = fx
            .notifier
            .send_notification(NotificationRequest::new("user-404", "t", "m"))
            .await
            .unwrap();

        assert_eq!(delivered, 0);
        assert_eq!(online.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_user_id_rejected() {
        let fx = fixture(true);

        let result = fx
            .notifier
            .send_notification(NotificationRequest::new("", "t", "m"))
            .await;

        assert!(matches!(result, Err(SendError::InvalidTarget(_))));
    }

    #[tokio::test]
    async fn test_unrecognized_role_still_gets_direct_notifications() {
        let fx = fixture(true);
        let stranger = join(&fx, "user-9", "superuser");

        let delivered = fx
            .notifier
            .send_notification(NotificationRequest::new("user-9", "Hello", "Direct"))
            .await
            .unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(stranger.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_dead_member_is_skipped() {
        let fx = fixture(true);
        let alive = join(&fx, "user-1", "user");
        let dead = join(&fx, "user-2", "user");
        dead.disconnect();

        let delivered = fx
            .notifier
            .send_announcement(AnnouncementRequest::new("t", "m", "users"))
            .await
            .unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(alive.sent_count(), 1);
        assert_eq!(dead.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_flag_turns_sends_off_again() {
        let fx = fixture(true);
        join(&fx, "user-1", "user");

        assert!(fx
            .notifier
            .send_announcement(AnnouncementRequest::new("t", "m", "all"))
            .await
            .is_ok());

        *fx.running.write() = false;

        assert_eq!(
            fx.notifier
                .send_announcement(AnnouncementRequest::new("t", "m", "all"))
                .await,
            Err(SendError::Uninitialized)
        );
    }
}
