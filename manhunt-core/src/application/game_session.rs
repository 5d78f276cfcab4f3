use crate::domain::{
    GameRound, Player, PositionSample, PositionTable, RoundResult, SessionEvent, CATCH_RADIUS_M,
};
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle of the in-game clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameState {
    /// No round in progress
    #[default]
    Idle,
    /// Clock ticking, positions evaluated
    Running,
    /// Process backgrounded - clock stopped, remaining preserved
    Paused,
    /// Round decided, waiting for reset
    Ended,
}

/// Errors from game lifecycle guards
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GameError {
    #[error("A round is already running")]
    AlreadyRunning,

    #[error("No round is running")]
    NotRunning,

    #[error("The round is not paused")]
    NotPaused,

    #[error("Players must include exactly one seeker, found {0}")]
    SeekerCount(usize),

    #[error("At least one runner is required")]
    NoRunners,
}

/// Owns the in-game clock, the per-player position table, catch detection
/// and win/lose determination.
///
/// Catch detection runs identically on every device for every accepted
/// position sample, local or remote. There is no arbiter; duplicate catch
/// reports converge through the round's set semantics. The periodic tick is
/// scheduled by the runtime, which calls [`GameSession::tick`] once per
/// second while running.
#[derive(Debug, Default)]
pub struct GameSession {
    state: GameState,
    round: Option<GameRound>,
    positions: PositionTable,
    catch_radius_m: f64,
}

impl GameSession {
    pub fn new() -> Self {
        Self {
            state: GameState::Idle,
            round: None,
            positions: PositionTable::new(),
            catch_radius_m: CATCH_RADIUS_M,
        }
    }

    /// Override the catch radius (tests)
    #[cfg(test)]
    pub(crate) fn with_catch_radius(radius_m: f64) -> Self {
        Self {
            catch_radius_m: radius_m,
            ..Self::new()
        }
    }

    // ===== Getters =====

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn round(&self) -> Option<&GameRound> {
        self.round.as_ref()
    }

    pub fn remaining_secs(&self) -> Option<u64> {
        self.round.as_ref().map(GameRound::remaining_secs)
    }

    pub fn positions(&self) -> &PositionTable {
        &self.positions
    }

    // ===== Lifecycle =====

    /// Reset per-round state and enter Running. `players` must carry the
    /// roles assigned by the room: exactly one seeker, at least one runner.
    pub fn start(&mut self, duration: Duration, players: &[Player]) -> Result<(), GameError> {
        if matches!(self.state, GameState::Running | GameState::Paused) {
            return Err(GameError::AlreadyRunning);
        }

        let seekers: Vec<Uuid> = players.iter().filter(|p| p.is_seeker()).map(Player::id).collect();
        if seekers.len() != 1 {
            return Err(GameError::SeekerCount(seekers.len()));
        }
        let runner_ids: std::collections::HashSet<Uuid> =
            players.iter().filter(|p| p.is_runner()).map(Player::id).collect();
        if runner_ids.is_empty() {
            return Err(GameError::NoRunners);
        }

        self.positions.clear();
        self.round = Some(GameRound::new(duration, seekers[0], runner_ids));
        self.state = GameState::Running;
        tracing::info!(?duration, seeker = %seekers[0], "round started");
        Ok(())
    }

    /// Stop the clock without losing remaining time
    pub fn pause(&mut self) -> Result<(), GameError> {
        if self.state != GameState::Running {
            return Err(GameError::NotRunning);
        }
        self.state = GameState::Paused;
        tracing::debug!("round paused");
        Ok(())
    }

    /// Restart ticking from the preserved remaining time
    pub fn resume(&mut self) -> Result<(), GameError> {
        if self.state != GameState::Paused {
            return Err(GameError::NotPaused);
        }
        self.state = GameState::Running;
        tracing::debug!("round resumed");
        Ok(())
    }

    /// One second elapsed. Ignored unless running.
    pub fn tick(&mut self) -> Vec<SessionEvent> {
        if self.state != GameState::Running {
            return Vec::new();
        }
        if let Some(round) = &mut self.round {
            round.tick();
        }
        self.evaluate_end()
    }

    /// Apply a position sample (local or remote) and run catch detection.
    ///
    /// Stale samples (timestamp not newer than the stored one) are dropped,
    /// which also absorbs best-effort duplicates and reordering.
    pub fn update_position(&mut self, sample: PositionSample) -> Vec<SessionEvent> {
        if self.state != GameState::Running {
            return Vec::new();
        }
        if !self.positions.apply(sample) {
            return Vec::new();
        }

        let mut events = vec![SessionEvent::PositionUpdated { sample }];
        events.extend(self.detect_catches(sample.player_id));
        events.extend(self.evaluate_end());
        events
    }

    /// Apply a remote catch report. Idempotent.
    ///
    /// A report arriving while Paused still lands (the rest of the mesh
    /// kept playing); one arriving after the round ended is dropped, the
    /// frozen caught set is part of the recorded result.
    pub fn apply_catch(&mut self, player_id: Uuid) -> Vec<SessionEvent> {
        if self.state == GameState::Idle || self.state == GameState::Ended {
            return Vec::new();
        }
        let Some(round) = &mut self.round else {
            return Vec::new();
        };
        if !round.record_catch(player_id) {
            return Vec::new();
        }

        tracing::info!(%player_id, "caught (remote report)");
        let mut events = vec![SessionEvent::PlayerCaught { player_id }];
        events.extend(self.evaluate_end());
        events
    }

    /// Adopt a round result decided on another device
    pub fn apply_remote_end(&mut self, result: RoundResult) -> Vec<SessionEvent> {
        if self.state == GameState::Ended || result == RoundResult::Undecided {
            return Vec::new();
        }
        let Some(round) = &mut self.round else {
            return Vec::new();
        };

        round.adopt_result(result);
        self.state = GameState::Ended;
        tracing::info!(%result, "round ended (remote report)");
        vec![SessionEvent::GameEnded {
            result,
            remaining_secs: round.remaining_secs(),
            caught_count: round.caught().len(),
        }]
    }

    /// Clear everything and return to Idle
    pub fn reset(&mut self) -> Vec<SessionEvent> {
        self.round = None;
        self.positions.clear();
        self.state = GameState::Idle;
        vec![SessionEvent::RoundReset]
    }

    // ===== Internals =====

    /// Evaluate every seeker/runner pair involving the player that moved.
    /// Boundary inclusive: a distance of exactly the catch radius catches.
    fn detect_catches(&mut self, moved: Uuid) -> Vec<SessionEvent> {
        let Some(round) = &mut self.round else {
            return Vec::new();
        };
        let Some(moved_pos) = self.positions.get(&moved) else {
            return Vec::new();
        };

        let mut caught_now: Vec<Uuid> = Vec::new();
        if round.is_seeker(moved) {
            // Seeker moved: test every uncaught runner with a known position
            for (id, pos) in self.positions.iter() {
                if round.is_runner(*id)
                    && !round.is_caught(*id)
                    && moved_pos.coordinate.distance_m(&pos.coordinate) <= self.catch_radius_m
                {
                    caught_now.push(*id);
                }
            }
        } else if round.is_runner(moved) && !round.is_caught(moved) {
            // Runner moved: test against the seeker's last known position
            if let Some(seeker_pos) = self.positions.get(&round.seeker_id()) {
                if moved_pos.coordinate.distance_m(&seeker_pos.coordinate) <= self.catch_radius_m {
                    caught_now.push(moved);
                }
            }
        }

        let mut events = Vec::new();
        for id in caught_now {
            if round.record_catch(id) {
                tracing::info!(player_id = %id, "caught");
                events.push(SessionEvent::PlayerCaught { player_id: id });
            }
        }
        events
    }

    /// End the round if the result is decided. Freezes the clock and stops
    /// accepting position updates.
    fn evaluate_end(&mut self) -> Vec<SessionEvent> {
        let Some(round) = &mut self.round else {
            return Vec::new();
        };

        let result = round.evaluate();
        if result == RoundResult::Undecided || self.state == GameState::Ended {
            return Vec::new();
        }

        self.state = GameState::Ended;
        tracing::info!(%result, remaining = round.remaining_secs(), "round ended");
        vec![SessionEvent::GameEnded {
            result,
            remaining_secs: round.remaining_secs(),
            caught_count: round.caught().len(),
        }]
    }
}
