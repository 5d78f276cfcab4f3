use crate::domain::PeerId;
use crate::infrastructure::error::Result;

/// Raw events surfaced by a connection
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// A new peer completed the handshake
    PeerConnected(PeerId),
    /// A peer's link closed
    PeerDisconnected(PeerId),
    /// Raw bytes from a peer
    MessageReceived { from: PeerId, data: Vec<u8> },
}

/// Seam over the network stack (allows mocking in tests).
///
/// Advertising and browsing are idempotent toggles; calling a start twice
/// is a no-op, stop without start does nothing.
pub trait Connection {
    fn local_peer_id(&self) -> PeerId;

    fn connected_peers(&self) -> Vec<PeerId>;

    /// Begin advertising a room code to the local network
    fn start_hosting(&mut self, room_code: &str) -> Result<()>;

    fn stop_hosting(&mut self);

    /// Begin looking for advertised rooms and connecting to their hosts
    fn start_browsing(&mut self) -> Result<()>;

    fn stop_browsing(&mut self);

    fn send_to(&mut self, peer: PeerId, data: Vec<u8>) -> Result<()>;

    fn broadcast(&mut self, data: Vec<u8>) -> Result<()>;

    /// Drop every live link
    fn disconnect_all(&mut self);

    /// Drain pending events. Non-blocking.
    fn poll_events(&mut self) -> Vec<ConnectionEvent>;
}
