// Domain layer (peer identity, peer <-> player mapping)
pub mod domain;

// Application layer (session runtime)
pub mod application;

// Infrastructure layer (wire codec, transport, LAN connection)
pub mod infrastructure;

// Re-exports for convenience
pub use application::SessionRuntime;
pub use domain::{PeerId, PeerPlayerMap};
pub use infrastructure::{
    Connection, ConnectionEvent, DeliveryClass, LanConfig, LanConnection, MessagePayload, P2PError,
    PeerTransport, TransportEvent, WireMessage,
};
