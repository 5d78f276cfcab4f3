use crate::domain::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Outcome of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RoundResult {
    /// Round still running
    #[default]
    Undecided,
    /// Every runner was caught before time ran out
    SeekerWin,
    /// The clock reached zero with at least one runner uncaught
    RunnerWin,
}

impl fmt::Display for RoundResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundResult::Undecided => write!(f, "undecided"),
            RoundResult::SeekerWin => write!(f, "seeker wins"),
            RoundResult::RunnerWin => write!(f, "runners win"),
        }
    }
}

/// Per-round state: clock, roles and the caught set.
///
/// Created on game start, dropped on reset. The caught set has set semantics
/// on purpose: every device detects catches independently and duplicate
/// reports must be absorbed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRound {
    started_at: Timestamp,
    duration: Duration,
    remaining_secs: u64,
    seeker_id: Uuid,
    runner_ids: HashSet<Uuid>,
    caught: HashSet<Uuid>,
    result: RoundResult,
}

impl GameRound {
    pub fn new(duration: Duration, seeker_id: Uuid, runner_ids: HashSet<Uuid>) -> Self {
        GameRound {
            started_at: Timestamp::now(),
            duration,
            remaining_secs: duration.as_secs(),
            seeker_id,
            runner_ids,
            caught: HashSet::new(),
            result: RoundResult::Undecided,
        }
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn seeker_id(&self) -> Uuid {
        self.seeker_id
    }

    pub fn is_runner(&self, player_id: Uuid) -> bool {
        self.runner_ids.contains(&player_id)
    }

    pub fn is_seeker(&self, player_id: Uuid) -> bool {
        self.seeker_id == player_id
    }

    pub fn caught(&self) -> &HashSet<Uuid> {
        &self.caught
    }

    pub fn is_caught(&self, player_id: Uuid) -> bool {
        self.caught.contains(&player_id)
    }

    pub fn runner_count(&self) -> usize {
        self.runner_ids.len()
    }

    pub fn all_runners_caught(&self) -> bool {
        !self.runner_ids.is_empty() && self.caught.len() == self.runner_ids.len()
    }

    pub fn result(&self) -> RoundResult {
        self.result
    }

    /// One second elapsed. Saturates at zero.
    pub fn tick(&mut self) {
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
    }

    /// Mark a runner as caught. Returns false for duplicates, non-runners and
    /// the seeker itself - the idempotent absorption point for remote reports.
    pub fn record_catch(&mut self, player_id: Uuid) -> bool {
        if !self.runner_ids.contains(&player_id) {
            return false;
        }
        self.caught.insert(player_id)
    }

    /// Re-evaluate the end condition. Checked after every tick and every
    /// catch; the first decided result sticks and freezes the clock.
    pub fn evaluate(&mut self) -> RoundResult {
        if self.result != RoundResult::Undecided {
            return self.result;
        }

        if self.all_runners_caught() {
            self.result = RoundResult::SeekerWin;
        } else if self.remaining_secs == 0 {
            self.result = RoundResult::RunnerWin;
        }
        self.result
    }

    /// Adopt a result decided elsewhere (remote GameEnd)
    pub fn adopt_result(&mut self, result: RoundResult) {
        if self.result == RoundResult::Undecided {
            self.result = result;
        }
    }
}
