use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::PeerId;

/// 1:1 bidirectional mapping between network peers and players.
///
/// Every connected device corresponds to exactly one player and vice versa.
/// Re-registering either side replaces the stale half of the old mapping,
/// which covers a device reconnecting under a fresh peer id.
#[derive(Debug, Default, Clone)]
pub struct PeerPlayerMap {
    peer_to_player: HashMap<PeerId, Uuid>,
    player_to_peer: HashMap<Uuid, PeerId>,
}

impl PeerPlayerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, peer: PeerId, player_id: Uuid) {
        if let Some(old_player) = self.peer_to_player.get(&peer) {
            self.player_to_peer.remove(old_player);
        }
        if let Some(old_peer) = self.player_to_peer.get(&player_id) {
            self.peer_to_player.remove(old_peer);
        }
        self.peer_to_player.insert(peer, player_id);
        self.player_to_peer.insert(player_id, peer);
    }

    pub fn remove_by_peer(&mut self, peer: &PeerId) -> Option<Uuid> {
        let player_id = self.peer_to_player.remove(peer)?;
        self.player_to_peer.remove(&player_id);
        Some(player_id)
    }

    pub fn remove_by_player(&mut self, player_id: &Uuid) -> Option<PeerId> {
        let peer = self.player_to_peer.remove(player_id)?;
        self.peer_to_player.remove(&peer);
        Some(peer)
    }

    pub fn player_for(&self, peer: &PeerId) -> Option<Uuid> {
        self.peer_to_player.get(peer).copied()
    }

    pub fn peer_for(&self, player_id: &Uuid) -> Option<PeerId> {
        self.player_to_peer.get(player_id).copied()
    }

    pub fn contains_peer(&self, peer: &PeerId) -> bool {
        self.peer_to_player.contains_key(peer)
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(
            self.peer_to_player.len(),
            self.player_to_peer.len(),
            "bidirectional map out of sync"
        );
        self.peer_to_player.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peer_to_player.is_empty()
    }

    pub fn clear(&mut self) {
        self.peer_to_player.clear();
        self.player_to_peer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut map = PeerPlayerMap::new();
        let peer = PeerId::random();
        let player = Uuid::new_v4();

        map.register(peer, player);

        assert_eq!(map.player_for(&peer), Some(player));
        assert_eq!(map.peer_for(&player), Some(peer));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_remove_by_peer_clears_both_directions() {
        let mut map = PeerPlayerMap::new();
        let peer = PeerId::random();
        let player = Uuid::new_v4();

        map.register(peer, player);
        assert_eq!(map.remove_by_peer(&peer), Some(player));
        assert_eq!(map.peer_for(&player), None);
        assert!(map.is_empty());
    }

    #[test]
    fn test_reconnect_replaces_old_peer() {
        let mut map = PeerPlayerMap::new();
        let old_peer = PeerId::random();
        let new_peer = PeerId::random();
        let player = Uuid::new_v4();

        map.register(old_peer, player);
        map.register(new_peer, player);

        assert_eq!(map.player_for(&old_peer), None);
        assert_eq!(map.player_for(&new_peer), Some(player));
        assert_eq!(map.peer_for(&player), Some(new_peer));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_peer_reuse_replaces_old_player() {
        let mut map = PeerPlayerMap::new();
        let peer = PeerId::random();
        let player1 = Uuid::new_v4();
        let player2 = Uuid::new_v4();

        map.register(peer, player1);
        map.register(peer, player2);

        assert_eq!(map.peer_for(&player1), None);
        assert_eq!(map.player_for(&peer), Some(player2));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_remove_missing_is_none() {
        let mut map = PeerPlayerMap::new();
        assert_eq!(map.remove_by_peer(&PeerId::random()), None);
        assert_eq!(map.remove_by_player(&Uuid::new_v4()), None);
    }

    #[test]
    fn test_clear() {
        let mut map = PeerPlayerMap::new();
        map.register(PeerId::random(), Uuid::new_v4());
        map.register(PeerId::random(), Uuid::new_v4());
        map.clear();
        assert!(map.is_empty());
    }
}
