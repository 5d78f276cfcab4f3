// Domain layer (entities, invariants)
pub mod domain;

// Application layer (state machines, event bus)
pub mod application;

// Re-exports for convenience
pub use application::{
    EventBus, GameError, GameSession, GameState, RoomSession, SessionCommand,
};
pub use domain::{
    Coordinate, EventKind, GameRound, Player, PlayerError, PositionSample, PositionTable, Role,
    Room, RoomCode, RoomError, RoomStatus, RoundResult, SessionEvent, Timestamp, CATCH_RADIUS_M,
    DEFAULT_CAPACITY, DEFAULT_ROUND_DURATION, MIN_PLAYERS,
};
