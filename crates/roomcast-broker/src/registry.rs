//! Connection registry and room membership table
//!
//! Rooms are flat string keys mapping to member session-id sets, with a
//! reverse index from session to joined rooms. The registry is the single
//! place membership lives; the room router mutates it, the notifier reads
//! it. A connection's own session-id room is joined at insert and never
//! left until the connection goes away.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

use crate::connection::{Connection, SessionId};

/// Live connections and their room memberships
pub struct ConnectionRegistry {
    /// Active connections by session id
    connections: DashMap<SessionId, Arc<Connection>>,
    /// Room name to member session ids
    rooms: DashMap<String, HashSet<SessionId>>,
    /// Session id to joined rooms (reverse index)
    memberships: DashMap<SessionId, HashSet<String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
            memberships: DashMap::new(),
        }
    }

    /// Track a new connection and join it to its own session room
    pub fn insert(&self, connection: Arc<Connection>) {
        let session_id = connection.id.clone();
        self.connections.insert(session_id.clone(), connection);
        self.memberships.insert(session_id.clone(), HashSet::new());
        self.join(&session_id, session_id.as_str());
    }

    /// Drop a connection and every membership it holds
    pub fn remove(&self, session_id: &SessionId) -> Option<Arc<Connection>> {
        if let Some((_, rooms)) = self.memberships.remove(session_id) {
            for room in rooms {
                self.drop_member(&room, session_id);
            }
        }
        self.connections.remove(session_id).map(|(_, c)| c)
    }

    /// Join a room; no-op for unknown sessions or repeated joins
    pub fn join(&self, session_id: &SessionId, room: &str) {
        let joined = match self.memberships.get_mut(session_id) {
            Some(mut rooms) => rooms.insert(room.to_string()),
            None => return,
        };

        if joined {
            self.rooms
                .entry(room.to_string())
                .or_default()
                .insert(session_id.clone());
            trace!("{} joined room '{}'", session_id, room);
        }
    }

    /// Leave a room; no-op when not a member
    pub fn leave(&self, session_id: &SessionId, room: &str) {
        let left = self
            .memberships
            .get_mut(session_id)
            .map(|mut rooms| rooms.remove(room))
            .unwrap_or(false);

        if left {
            self.drop_member(room, session_id);
            trace!("{} left room '{}'", session_id, room);
        }
    }

    /// Leave every joined room except `keep`
    pub fn leave_all_except(&self, session_id: &SessionId, keep: &str) {
        let to_leave: Vec<String> = self
            .memberships
            .get(session_id)
            .map(|rooms| {
                rooms
                    .iter()
                    .filter(|room| room.as_str() != keep)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        for room in to_leave {
            self.leave(session_id, &room);
        }
    }

    /// Resolve the live member connections of a room
    pub fn members(&self, room: &str) -> Vec<Arc<Connection>> {
        let ids: Vec<SessionId> = match self.rooms.get(room) {
            Some(members) => members.iter().cloned().collect(),
            None => return Vec::new(),
        };

        ids.iter()
            .filter_map(|id| self.connections.get(id).map(|c| c.value().clone()))
            .collect()
    }

    /// Rooms a session currently belongs to
    pub fn rooms_of(&self, session_id: &SessionId) -> HashSet<String> {
        self.memberships
            .get(session_id)
            .map(|rooms| rooms.clone())
            .unwrap_or_default()
    }

    /// Get a connection by session id
    pub fn get(&self, session_id: &SessionId) -> Option<Arc<Connection>> {
        self.connections.get(session_id).map(|c| c.value().clone())
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Number of non-empty rooms
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of members in a room
    pub fn member_count(&self, room: &str) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }

    fn drop_member(&self, room: &str, session_id: &SessionId) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(session_id);
        }
        // Empty rooms are garbage, not addresses
        self.rooms.remove_if(room, |_, members| members.is_empty());
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
