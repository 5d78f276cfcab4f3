pub mod connection_trait;
pub mod error;
pub mod lan;
pub mod message;
pub mod transport;

pub use connection_trait::{Connection, ConnectionEvent};
pub use error::{P2PError, Result};
pub use lan::{LanConfig, LanConnection};
pub use message::{DeliveryClass, MessagePayload, WireMessage};
pub use transport::{PeerTransport, TransportEvent};
