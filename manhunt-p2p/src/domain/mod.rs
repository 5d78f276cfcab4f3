pub mod peer;
pub mod peer_player_map;

pub use peer::PeerId;
pub use peer_player_map::PeerPlayerMap;
