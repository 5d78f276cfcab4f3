use std::time::Duration;
use uuid::Uuid;

/// Commands the presentation layer submits to the session runtime.
///
/// Every mutation of room or game state enters through one of these; the
/// runtime applies them on its single owner context.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Create a room and start advertising it
    CreateRoom {
        capacity: usize,
        round_duration: Duration,
    },

    /// Join a discovered room by its six-digit code
    JoinRoom { code: String },

    /// Leave the current room (dissolves it if we are the host)
    LeaveRoom,

    /// Remove a member (host only)
    KickPlayer { player_id: Uuid },

    /// Toggle the local ready flag
    SetReady { is_ready: bool },

    /// Change capacity / round duration (host only, lobby only)
    UpdateSettings {
        capacity: usize,
        round_duration: Duration,
    },

    /// Assign roles and start the round (host only)
    StartGame,

    /// Local process is backgrounded - stop the clock
    PauseGame,

    /// Resume ticking from the frozen remaining time
    ResumeGame,

    /// Back from the result screen to the lobby
    ResetRound,

    /// A coordinate update from the location collaborator
    ReportPosition { lat: f64, lon: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_clone() {
        let cmd = SessionCommand::JoinRoom {
            code: "123456".to_string(),
        };
        assert_eq!(cmd.clone(), cmd);
    }

    #[test]
    fn test_command_debug() {
        let cmd = SessionCommand::SetReady { is_ready: true };
        let debug = format!("{:?}", cmd);
        assert!(debug.contains("SetReady"));
    }
}
