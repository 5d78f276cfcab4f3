use crate::domain::{Player, PositionSample, Room, RoomCode, RoundResult};
use uuid::Uuid;

/// Events emitted by the session engine, consumed via the [`EventBus`].
///
/// One variant per observable state change; the p2p layer translates a subset
/// of these into wire messages, the presentation layer renders them.
///
/// [`EventBus`]: crate::application::EventBus
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The local room copy changed (membership, settings, status)
    RoomUpdated { room: Room },

    /// The room no longer exists for this device (host left, or we were
    /// removed by a snapshot that doesn't contain us)
    RoomDissolved { code: RoomCode },

    /// A player was appended to the member list
    PlayerJoined { player: Player },

    /// A player left voluntarily
    PlayerLeft { player_id: Uuid },

    /// A player was removed by the host
    PlayerKicked { player_id: Uuid, kicked_by: Uuid },

    /// A member toggled their ready flag
    ReadyChanged { player_id: Uuid, is_ready: bool },

    /// Roles are assigned and the round is starting
    GameStarted { room: Room },

    /// A position sample was accepted into the position table
    PositionUpdated { sample: PositionSample },

    /// A runner entered the catch radius of the seeker
    PlayerCaught { player_id: Uuid },

    /// The round ended
    GameEnded {
        result: RoundResult,
        remaining_secs: u64,
        caught_count: usize,
    },

    /// The round state was cleared, back to the lobby
    RoundReset,

    /// Transport-level: a peer connected
    PeerConnected { peer: Uuid },

    /// Transport-level: a peer disconnected
    PeerDisconnected { peer: Uuid },

    /// A local operation was rejected (surfaced to this device only)
    CommandFailed { command: String, reason: String },
}

/// Discriminant used as the subscription key on the event bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RoomUpdated,
    RoomDissolved,
    PlayerJoined,
    PlayerLeft,
    PlayerKicked,
    ReadyChanged,
    GameStarted,
    PositionUpdated,
    PlayerCaught,
    GameEnded,
    RoundReset,
    PeerConnected,
    PeerDisconnected,
    CommandFailed,
}

impl EventKind {
    /// Every kind, for subscribe-all consumers
    pub const ALL: [EventKind; 14] = [
        EventKind::RoomUpdated,
        EventKind::RoomDissolved,
        EventKind::PlayerJoined,
        EventKind::PlayerLeft,
        EventKind::PlayerKicked,
        EventKind::ReadyChanged,
        EventKind::GameStarted,
        EventKind::PositionUpdated,
        EventKind::PlayerCaught,
        EventKind::GameEnded,
        EventKind::RoundReset,
        EventKind::PeerConnected,
        EventKind::PeerDisconnected,
        EventKind::CommandFailed,
    ];
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::RoomUpdated { .. } => EventKind::RoomUpdated,
            SessionEvent::RoomDissolved { .. } => EventKind::RoomDissolved,
            SessionEvent::PlayerJoined { .. } => EventKind::PlayerJoined,
            SessionEvent::PlayerLeft { .. } => EventKind::PlayerLeft,
            SessionEvent::PlayerKicked { .. } => EventKind::PlayerKicked,
            SessionEvent::ReadyChanged { .. } => EventKind::ReadyChanged,
            SessionEvent::GameStarted { .. } => EventKind::GameStarted,
            SessionEvent::PositionUpdated { .. } => EventKind::PositionUpdated,
            SessionEvent::PlayerCaught { .. } => EventKind::PlayerCaught,
            SessionEvent::GameEnded { .. } => EventKind::GameEnded,
            SessionEvent::RoundReset => EventKind::RoundReset,
            SessionEvent::PeerConnected { .. } => EventKind::PeerConnected,
            SessionEvent::PeerDisconnected { .. } => EventKind::PeerDisconnected,
            SessionEvent::CommandFailed { .. } => EventKind::CommandFailed,
        }
    }
}
