//! In-memory registry of rooms, members, and shared document state.
//!
//! Rooms are created on first join and removed the moment their member list
//! empties; a room in the registry always has at least one member. The
//! registry is a plain synchronous structure with no interior locking: the
//! router owns it behind a single lock, which stands in for the
//! single-dispatch atomicity the protocol assumes.
//!
//! The buffer is an opaque string replicated last-write-wins: an update
//! replaces the stored value verbatim, and a stale update delivered late
//! overwrites a newer one. The only ordering guarantee is that apply order
//! equals arrival order at the server.
//!
//! Reference: Kleppmann — Designing Data-Intensive Applications, Chapter 5

use std::collections::HashMap;
use uuid::Uuid;

/// Initial buffer for a freshly created room.
pub const DEFAULT_BUFFER: &str = "// start coding\n";

/// Initial language tag for a freshly created room.
pub const DEFAULT_LANGUAGE: &str = "javascript";

/// One member of a room: a live session under a display name.
///
/// Membership is keyed by session id, so two sessions sharing a display
/// name are tracked independently; their names collapse only in the
/// presence list.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub session: Uuid,
    pub name: String,
}

/// A named collaboration space: member list plus the shared document.
#[derive(Debug, Clone)]
pub struct Room {
    members: Vec<Member>,
    buffer: String,
    language: String,
}

impl Room {
    fn new() -> Self {
        Self {
            members: Vec::new(),
            buffer: DEFAULT_BUFFER.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    /// Display names in first-join order, deduplicated.
    fn presence(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.members.len());
        for member in &self.members {
            if !names.contains(&member.name) {
                names.push(member.name.clone());
            }
        }
        names
    }

    /// Current shared buffer.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Current language tag.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Number of member sessions (not deduplicated by name).
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Result of removing a member from a room.
#[derive(Debug, Clone, PartialEq)]
pub enum LeaveOutcome {
    /// The session was not a member; nothing changed.
    NotMember,
    /// Members remain; broadcast this presence snapshot.
    Remaining(Vec<String>),
    /// The last member left; the room and its document state are gone.
    RoomRemoved,
}

/// Registry of all live rooms.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// Add a session to a room, creating the room on first use.
    ///
    /// Any string is accepted as a room id or display name; the identifier
    /// is opaque and unvalidated. Returns the presence snapshot to
    /// broadcast.
    pub fn create_or_join(&mut self, room_id: &str, session: Uuid, name: &str) -> Vec<String> {
        let room = self.rooms.entry(room_id.to_string()).or_insert_with(|| {
            log::info!("room {room_id:?} created");
            Room::new()
        });
        room.members.push(Member {
            session,
            name: name.to_string(),
        });
        room.presence()
    }

    /// Remove a session from a room.
    ///
    /// Unknown rooms and non-members are silent no-ops, so a second leave
    /// for the same session reports nothing. The last departure deletes the
    /// room outright, reclaiming its document state.
    pub fn leave(&mut self, room_id: &str, session: Uuid) -> LeaveOutcome {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return LeaveOutcome::NotMember;
        };
        let before = room.members.len();
        room.members.retain(|m| m.session != session);
        if room.members.len() == before {
            return LeaveOutcome::NotMember;
        }
        let remaining = if room.members.is_empty() {
            None
        } else {
            Some(room.presence())
        };
        match remaining {
            Some(members) => LeaveOutcome::Remaining(members),
            None => {
                self.rooms.remove(room_id);
                log::info!("room {room_id:?} removed (empty)");
                LeaveOutcome::RoomRemoved
            }
        }
    }

    /// Replace the room's buffer verbatim. No diffing, no merge.
    ///
    /// Unknown rooms are ignored; an edit cannot create a room.
    pub fn update_buffer(&mut self, room_id: &str, buffer: String) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.buffer = buffer;
        }
    }

    /// Replace the room's language tag verbatim.
    pub fn update_language(&mut self, room_id: &str, language: String) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.language = language;
        }
    }

    /// Presence snapshot for a room; empty for unknown rooms.
    pub fn members(&self, room_id: &str) -> Vec<String> {
        self.rooms
            .get(room_id)
            .map(|r| r.presence())
            .unwrap_or_default()
    }

    /// Look up a room.
    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_creates_room_with_default_document() {
        let mut registry = RoomRegistry::new();
        let members = registry.create_or_join("r1", Uuid::new_v4(), "alice");

        assert_eq!(members, vec!["alice".to_string()]);
        let room = registry.room("r1").unwrap();
        assert_eq!(room.buffer(), DEFAULT_BUFFER);
        assert_eq!(room.language(), DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_presence_accumulates_in_join_order() {
        let mut registry = RoomRegistry::new();
        registry.create_or_join("r1", Uuid::new_v4(), "alice");
        registry.create_or_join("r1", Uuid::new_v4(), "bob");
        let members = registry.create_or_join("r1", Uuid::new_v4(), "carol");

        assert_eq!(members, vec!["alice", "bob", "carol"]);
        assert_eq!(registry.members("r1"), vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_duplicate_names_collapse_in_presence_only() {
        let mut registry = RoomRegistry::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        registry.create_or_join("r1", first, "alice");
        let members = registry.create_or_join("r1", second, "alice");

        // Both sessions are members, but the name appears once.
        assert_eq!(members, vec!["alice"]);
        assert_eq!(registry.room("r1").unwrap().member_count(), 2);

        // One leave removes exactly one of them.
        assert_eq!(
            registry.leave("r1", first),
            LeaveOutcome::Remaining(vec!["alice".to_string()])
        );
        assert_eq!(registry.leave("r1", second), LeaveOutcome::RoomRemoved);
    }

    #[test]
    fn test_last_leave_removes_room() {
        let mut registry = RoomRegistry::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        registry.create_or_join("r1", alice, "alice");
        registry.create_or_join("r1", bob, "bob");

        assert_eq!(
            registry.leave("r1", alice),
            LeaveOutcome::Remaining(vec!["bob".to_string()])
        );
        assert_eq!(registry.leave("r1", bob), LeaveOutcome::RoomRemoved);
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn test_rejoin_after_removal_starts_fresh() {
        let mut registry = RoomRegistry::new();
        let alice = Uuid::new_v4();
        registry.create_or_join("r1", alice, "alice");
        registry.update_buffer("r1", "x = 1".to_string());
        registry.update_language("r1", "python".to_string());
        registry.leave("r1", alice);

        registry.create_or_join("r1", Uuid::new_v4(), "carol");
        let room = registry.room("r1").unwrap();
        assert_eq!(room.buffer(), DEFAULT_BUFFER);
        assert_eq!(room.language(), DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_leave_is_idempotent() {
        let mut registry = RoomRegistry::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        registry.create_or_join("r1", alice, "alice");
        registry.create_or_join("r1", bob, "bob");

        registry.leave("r1", alice);
        assert_eq!(registry.leave("r1", alice), LeaveOutcome::NotMember);
        assert_eq!(registry.members("r1"), vec!["bob"]);
    }

    #[test]
    fn test_leave_unknown_room_is_noop() {
        let mut registry = RoomRegistry::new();
        assert_eq!(registry.leave("ghost", Uuid::new_v4()), LeaveOutcome::NotMember);
    }

    #[test]
    fn test_update_buffer_last_write_wins() {
        let mut registry = RoomRegistry::new();
        registry.create_or_join("r1", Uuid::new_v4(), "alice");

        registry.update_buffer("r1", "newer".to_string());
        // A stale update delivered later still overwrites.
        registry.update_buffer("r1", "older".to_string());
        assert_eq!(registry.room("r1").unwrap().buffer(), "older");
    }

    #[test]
    fn test_update_unknown_room_creates_nothing() {
        let mut registry = RoomRegistry::new();
        registry.update_buffer("ghost", "x = 1".to_string());
        registry.update_language("ghost", "python".to_string());
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn test_members_unknown_room_is_empty() {
        let registry = RoomRegistry::new();
        assert!(registry.members("ghost").is_empty());
    }

    #[test]
    fn test_any_string_is_a_valid_identifier() {
        let mut registry = RoomRegistry::new();
        let members = registry.create_or_join("", Uuid::new_v4(), "");
        assert_eq!(members, vec!["".to_string()]);
        assert_eq!(registry.room_count(), 1);
    }
}
