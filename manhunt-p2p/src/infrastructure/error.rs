use crate::domain::PeerId;

/// Infrastructure layer errors
#[derive(Debug, thiserror::Error)]
pub enum P2PError {
    #[error("Peer not found: {0}")]
    PeerNotFound(PeerId),

    #[error("Send to {peer} failed: {reason}")]
    SendFailed { peer: PeerId, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connect to {addr} timed out")]
    ConnectTimeout { addr: std::net::SocketAddr },

    #[error("Channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, P2PError>;
