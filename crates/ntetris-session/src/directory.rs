//! Room and peer directories: what the server has announced so far.
//!
//! Announces arrive over UDP, so they can be lost, duplicated or
//! reordered. Both directories are keyed maps with overwrite-on-upsert
//! semantics, which makes applying the same announce twice harmless.

use std::collections::HashMap;

use ntetris_protocol::{PeerId, RoomId};

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

/// One room as last announced by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub max_players: u8,
    pub joined_players: u8,
    pub password_protected: bool,
    pub name: String,
}

/// Every room announced during this session, keyed by id.
///
/// There is no removal: the protocol has no "room closed" message, so an
/// entry stays until the same id is announced again.
#[derive(Debug, Clone, Default)]
pub struct RoomDirectory {
    rooms: HashMap<RoomId, RoomSummary>,
}

impl RoomDirectory {
    /// Inserts or wholesale replaces the entry for `room.room_id`.
    ///
    /// Returns `true` if the room wasn't known before.
    pub fn upsert(&mut self, room: RoomSummary) -> bool {
        self.rooms.insert(room.room_id, room).is_none()
    }

    pub fn get(&self, room_id: RoomId) -> Option<&RoomSummary> {
        self.rooms.get(&room_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// All rooms ordered by id, for display.
    pub fn sorted(&self) -> Vec<&RoomSummary> {
        let mut rooms: Vec<_> = self.rooms.values().collect();
        rooms.sort_by_key(|r| r.room_id);
        rooms
    }
}

// ---------------------------------------------------------------------------
// Peers
// ---------------------------------------------------------------------------

/// One peer as last announced by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSummary {
    pub peer_id: PeerId,
    pub name: String,
    /// `false` once the peer has parted. The entry itself is kept so chat
    /// from a departed peer still resolves to a name.
    pub present: bool,
}

/// Every peer announced during this session, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct PeerDirectory {
    peers: HashMap<PeerId, PeerSummary>,
}

impl PeerDirectory {
    /// Records a join: the peer is present under the announced name.
    pub fn join(&mut self, peer_id: PeerId, name: String) -> &PeerSummary {
        self.upsert(peer_id, name, true)
    }

    /// Records a part: the peer is kept but marked absent.
    ///
    /// A part for a peer we never saw join is still recorded, so the name
    /// is available if a late chat from that peer shows up.
    pub fn part(&mut self, peer_id: PeerId, name: String) -> &PeerSummary {
        self.upsert(peer_id, name, false)
    }

    fn upsert(&mut self, peer_id: PeerId, name: String, present: bool) -> &PeerSummary {
        let entry = self.peers.entry(peer_id).or_insert_with(|| PeerSummary {
            peer_id,
            name: String::new(),
            present,
        });
        // An empty name in a part announce shouldn't erase a known one.
        if !name.is_empty() || entry.name.is_empty() {
            entry.name = name;
        }
        entry.present = present;
        entry
    }

    pub fn get(&self, peer_id: PeerId) -> Option<&PeerSummary> {
        self.peers.get(&peer_id)
    }

    /// The display name for `peer_id`, if it was ever announced.
    pub fn name_of(&self, peer_id: PeerId) -> Option<&str> {
        self.peers.get(&peer_id).map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// All peers (present or not) ordered by id.
    pub fn sorted(&self) -> Vec<&PeerSummary> {
        let mut peers: Vec<_> = self.peers.values().collect();
        peers.sort_by_key(|p| p.peer_id);
        peers
    }
}
