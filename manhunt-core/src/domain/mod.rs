pub mod events;
pub mod geo;
pub mod player;
pub mod room;
pub mod round;
pub mod time;

pub use events::{EventKind, SessionEvent};
pub use geo::{Coordinate, PositionSample, PositionTable, CATCH_RADIUS_M};
pub use player::{Player, PlayerError, Role};
pub use room::{Room, RoomCode, RoomError, RoomStatus, DEFAULT_CAPACITY, DEFAULT_ROUND_DURATION, MIN_PLAYERS};
pub use round::{GameRound, RoundResult};
pub use time::Timestamp;
