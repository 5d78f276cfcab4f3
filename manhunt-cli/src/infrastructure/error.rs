#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(#[from] manhunt_p2p::P2PError),

    #[error("invalid player: {0}")]
    Player(#[from] manhunt_core::PlayerError),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
