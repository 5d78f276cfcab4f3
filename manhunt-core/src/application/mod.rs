pub mod commands;
pub mod event_bus;
pub mod game_session;
pub mod room_session;

pub use commands::SessionCommand;
pub use event_bus::EventBus;
pub use game_session::{GameError, GameSession, GameState};
pub use room_session::RoomSession;
