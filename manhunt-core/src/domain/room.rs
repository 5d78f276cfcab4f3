use crate::domain::{Player, PlayerError, Role};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Default room capacity, carried from the reference lobby settings
pub const DEFAULT_CAPACITY: usize = 8;

/// Default round duration
pub const DEFAULT_ROUND_DURATION: Duration = Duration::from_secs(300);

/// Smallest playable room: one seeker, at least one runner
pub const MIN_PLAYERS: usize = 2;

/// Six-digit room code, typed by joining players.
///
/// A discovery hint only - not globally unique and not a credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomCode(String);

impl RoomCode {
    /// Generate a fresh zero-padded code from the given random source
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        RoomCode(format!("{:06}", rng.gen_range(0..1_000_000u32)))
    }

    /// Parse and validate a user-typed code
    pub fn parse(input: &str) -> Result<Self, RoomError> {
        if input.len() == 6 && input.bytes().all(|b| b.is_ascii_digit()) {
            Ok(RoomCode(input.to_string()))
        } else {
            Err(RoomError::InvalidRoomCode(input.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of the room. Transitions are monotonic per round:
/// Waiting -> Playing -> Finished, then an explicit reset back to Waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomStatus::Waiting => write!(f, "Waiting"),
            RoomStatus::Playing => write!(f, "Playing"),
            RoomStatus::Finished => write!(f, "Finished"),
        }
    }
}

/// Errors that can occur in room operations.
///
/// All of these surface to the initiating device only; they are never
/// broadcast and never fatal.
#[derive(Debug, thiserror::Error, PartialEq, Serialize, Deserialize)]
pub enum RoomError {
    #[error("No room with code {0} is known")]
    RoomNotFound(String),

    #[error("Room is full")]
    RoomFull,

    #[error("Game is already in progress")]
    GameInProgress,

    #[error("Invalid room code: {0:?}")]
    InvalidRoomCode(String),

    #[error("Player not found: {0}")]
    PlayerNotFound(Uuid),

    #[error("Player is already a member")]
    AlreadyJoined,

    #[error("Not currently in a room")]
    NotInRoom,

    #[error("Only the host may do that")]
    NotHost,

    #[error("The host cannot be removed from their own room")]
    CannotRemoveHost,

    #[error("Need at least {MIN_PLAYERS} players to start, have {have}")]
    NotEnoughPlayers { have: usize },

    #[error("Room is not in the waiting state")]
    NotWaiting,

    #[error("Capacity {requested} is below the current member count {members}")]
    CapacityTooSmall { requested: usize, members: usize },

    #[error("Capacity must be at least {MIN_PLAYERS}")]
    CapacityTooLow,

    #[error("Player error: {0}")]
    Player(#[from] PlayerError),
}

/// Room aggregate root: membership, settings and round status.
///
/// Every device holds an independent copy; convergence happens only through
/// snapshot exchange. Members are kept in join order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    /// Six-digit code advertised on the local network
    code: RoomCode,

    /// Current host's player ID - always a member
    host_id: Uuid,

    /// All members, ordered by join time, unique by id
    members: Vec<Player>,

    /// Maximum member count
    capacity: usize,

    /// Length of one round
    round_duration: Duration,

    /// Current lifecycle state
    status: RoomStatus,
}

impl Room {
    /// Create a new room owned by `host`
    pub fn new(
        code: RoomCode,
        host: Player,
        capacity: usize,
        round_duration: Duration,
    ) -> Result<Self, RoomError> {
        if capacity < MIN_PLAYERS {
            return Err(RoomError::CapacityTooLow);
        }

        let host_id = host.id();
        Ok(Room {
            code,
            host_id,
            members: vec![host],
            capacity,
            round_duration,
            status: RoomStatus::Waiting,
        })
    }

    // ===== Getters =====

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn host_id(&self) -> Uuid {
        self.host_id
    }

    pub fn host(&self) -> Option<&Player> {
        self.members.iter().find(|p| p.id() == self.host_id)
    }

    pub fn members(&self) -> &[Player] {
        &self.members
    }

    pub fn member(&self, player_id: Uuid) -> Option<&Player> {
        self.members.iter().find(|p| p.id() == player_id)
    }

    pub(crate) fn member_mut(&mut self, player_id: Uuid) -> Option<&mut Player> {
        self.members.iter_mut().find(|p| p.id() == player_id)
    }

    pub fn is_member(&self, player_id: Uuid) -> bool {
        self.member(player_id).is_some()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn round_duration(&self) -> Duration {
        self.round_duration
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }

    /// The unique seeker, if roles are assigned
    pub fn seeker(&self) -> Option<&Player> {
        self.members.iter().find(|p| p.is_seeker())
    }

    pub fn runners(&self) -> impl Iterator<Item = &Player> {
        self.members.iter().filter(|p| p.is_runner())
    }

    // ===== Membership =====

    /// Add a member. Guards are checked in-progress first, then capacity,
    /// then duplicate membership.
    pub fn add_member(&mut self, player: Player) -> Result<(), RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::GameInProgress);
        }
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }
        if self.is_member(player.id()) {
            return Err(RoomError::AlreadyJoined);
        }

        self.members.push(player);
        Ok(())
    }

    /// Remove a member. Removing the host dissolves the room at the session
    /// level; the aggregate refuses it so that path stays explicit.
    pub fn remove_member(&mut self, player_id: Uuid) -> Result<Player, RoomError> {
        if player_id == self.host_id {
            return Err(RoomError::CannotRemoveHost);
        }

        let index = self
            .members
            .iter()
            .position(|p| p.id() == player_id)
            .ok_or(RoomError::PlayerNotFound(player_id))?;

        Ok(self.members.remove(index))
    }

    /// Mark a member ready / not ready
    pub fn set_ready(&mut self, player_id: Uuid, is_ready: bool) -> Result<(), RoomError> {
        self.member_mut(player_id)
            .ok_or(RoomError::PlayerNotFound(player_id))?
            .set_ready(is_ready);
        Ok(())
    }

    // ===== Settings =====

    /// Change capacity and round duration. Legal only while waiting.
    pub fn update_settings(
        &mut self,
        capacity: usize,
        round_duration: Duration,
    ) -> Result<(), RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::NotWaiting);
        }
        if capacity < MIN_PLAYERS {
            return Err(RoomError::CapacityTooLow);
        }
        if capacity < self.members.len() {
            return Err(RoomError::CapacityTooSmall {
                requested: capacity,
                members: self.members.len(),
            });
        }

        self.capacity = capacity;
        self.round_duration = round_duration;
        Ok(())
    }

    // ===== Round lifecycle =====

    /// Assign exactly one uniformly random seeker; everyone else runs.
    /// The random source is injectable so tests can fix the outcome.
    pub fn assign_roles<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Uuid {
        let seeker_index = rng.gen_range(0..self.members.len());
        for (i, member) in self.members.iter_mut().enumerate() {
            member.set_role(if i == seeker_index {
                Role::Seeker
            } else {
                Role::Runner
            });
        }
        self.members[seeker_index].id()
    }

    /// Clear roles and ready flags after a round
    pub fn clear_round_state(&mut self) {
        for member in &mut self.members {
            member.set_role(Role::Runner);
            member.set_ready(false);
        }
    }

    /// Waiting -> Playing. Guards: waiting, enough players.
    pub fn begin_playing(&mut self) -> Result<(), RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::NotWaiting);
        }
        if self.members.len() < MIN_PLAYERS {
            return Err(RoomError::NotEnoughPlayers {
                have: self.members.len(),
            });
        }

        self.status = RoomStatus::Playing;
        Ok(())
    }

    /// Playing -> Finished
    pub fn finish(&mut self) {
        if self.status == RoomStatus::Playing {
            self.status = RoomStatus::Finished;
        }
    }

    /// Finished -> Waiting, clearing per-round member state
    pub fn reset(&mut self) {
        self.clear_round_state();
        self.status = RoomStatus::Waiting;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn room_with(capacity: usize) -> (Room, Uuid) {
        let host = Player::new_host("Alice").unwrap();
        let host_id = host.id();
        let room = Room::new(
            RoomCode::parse("123456").unwrap(),
            host,
            capacity,
            DEFAULT_ROUND_DURATION,
        )
        .unwrap();
        (room, host_id)
    }

    #[test]
    fn test_create_room() {
        let (room, host_id) = room_with(DEFAULT_CAPACITY);
        assert_eq!(room.status(), RoomStatus::Waiting);
        assert_eq!(room.host_id(), host_id);
        assert_eq!(room.members().len(), 1);
        assert_eq!(room.capacity(), 8);
    }

    #[test]
    fn test_room_code_generation_is_six_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let code = RoomCode::generate(&mut rng);
            assert_eq!(code.as_str().len(), 6);
            assert!(code.as_str().bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_room_code_rejects_garbage() {
        assert!(RoomCode::parse("12345").is_err());
        assert!(RoomCode::parse("1234567").is_err());
        assert!(RoomCode::parse("12a456").is_err());
        assert!(RoomCode::parse("").is_err());
        assert!(RoomCode::parse("000000").is_ok());
    }

    #[test]
    fn test_join_guards_capacity() {
        let (mut room, _) = room_with(2);
        room.add_member(Player::new_guest("Bob").unwrap()).unwrap();

        let result = room.add_member(Player::new_guest("Carol").unwrap());
        assert_eq!(result, Err(RoomError::RoomFull));
        assert_eq!(room.members().len(), 2);
    }

    #[test]
    fn test_join_rejected_while_playing() {
        let (mut room, _) = room_with(4);
        room.add_member(Player::new_guest("Bob").unwrap()).unwrap();
        room.begin_playing().unwrap();

        let result = room.add_member(Player::new_guest("Carol").unwrap());
        assert_eq!(result, Err(RoomError::GameInProgress));
    }

    #[test]
    fn test_duplicate_join_rejected() {
        let (mut room, _) = room_with(4);
        let bob = Player::new_guest("Bob").unwrap();
        room.add_member(bob.clone()).unwrap();

        assert_eq!(room.add_member(bob), Err(RoomError::AlreadyJoined));
    }

    #[test]
    fn test_members_never_exceed_capacity() {
        let (mut room, _) = room_with(3);
        for i in 0..10 {
            let _ = room.add_member(Player::new_guest(format!("P{i}")).unwrap());
        }
        assert!(room.members().len() <= room.capacity());
    }

    #[test]
    fn test_remove_member() {
        let (mut room, _) = room_with(4);
        let bob = Player::new_guest("Bob").unwrap();
        let bob_id = bob.id();
        room.add_member(bob).unwrap();

        let removed = room.remove_member(bob_id).unwrap();
        assert_eq!(removed.name(), "Bob");
        assert_eq!(room.members().len(), 1);
    }

    #[test]
    fn test_cannot_remove_host() {
        let (mut room, host_id) = room_with(4);
        assert_eq!(
            room.remove_member(host_id),
            Err(RoomError::CannotRemoveHost)
        );
    }

    #[test]
    fn test_remove_unknown_member() {
        let (mut room, _) = room_with(4);
        let ghost = Uuid::new_v4();
        assert_eq!(
            room.remove_member(ghost),
            Err(RoomError::PlayerNotFound(ghost))
        );
    }

    #[test]
    fn test_update_settings_only_while_waiting() {
        let (mut room, _) = room_with(4);
        room.add_member(Player::new_guest("Bob").unwrap()).unwrap();
        room.update_settings(6, Duration::from_secs(120)).unwrap();
        assert_eq!(room.capacity(), 6);
        assert_eq!(room.round_duration(), Duration::from_secs(120));

        room.begin_playing().unwrap();
        assert_eq!(
            room.update_settings(4, Duration::from_secs(60)),
            Err(RoomError::NotWaiting)
        );
    }

    #[test]
    fn test_capacity_cannot_drop_below_member_count() {
        let (mut room, _) = room_with(4);
        room.add_member(Player::new_guest("Bob").unwrap()).unwrap();
        room.add_member(Player::new_guest("Carol").unwrap())
            .unwrap();

        assert_eq!(
            room.update_settings(2, DEFAULT_ROUND_DURATION),
            Err(RoomError::CapacityTooSmall {
                requested: 2,
                members: 3
            })
        );
    }

    #[test]
    fn test_start_requires_two_players() {
        let (mut room, _) = room_with(4);
        assert_eq!(
            room.begin_playing(),
            Err(RoomError::NotEnoughPlayers { have: 1 })
        );
    }

    #[test]
    fn test_assign_roles_exactly_one_seeker() {
        let (mut room, _) = room_with(8);
        for i in 0..5 {
            room.add_member(Player::new_guest(format!("P{i}")).unwrap())
                .unwrap();
        }

        let mut rng = StdRng::seed_from_u64(42);
        let seeker_id = room.assign_roles(&mut rng);

        let seekers: Vec<_> = room.members().iter().filter(|p| p.is_seeker()).collect();
        assert_eq!(seekers.len(), 1);
        assert_eq!(seekers[0].id(), seeker_id);
        assert_eq!(room.runners().count(), 5);
    }

    #[test]
    fn test_assign_roles_deterministic_with_seed() {
        let (mut a, _) = room_with(8);
        let (mut b, _) = room_with(8);
        // Mirror the same membership into both rooms
        for i in 0..4 {
            let p = Player::new_guest(format!("P{i}")).unwrap();
            a.add_member(p.clone()).unwrap();
            b.add_member(p).unwrap();
        }

        let seeker_a = a.assign_roles(&mut StdRng::seed_from_u64(99));
        let seeker_b = b.assign_roles(&mut StdRng::seed_from_u64(99));
        assert_eq!(seeker_a, seeker_b);
    }

    #[test]
    fn test_status_round_trip() {
        let (mut room, _) = room_with(4);
        room.add_member(Player::new_guest("Bob").unwrap()).unwrap();
        room.assign_roles(&mut StdRng::seed_from_u64(1));

        room.begin_playing().unwrap();
        assert_eq!(room.status(), RoomStatus::Playing);

        room.finish();
        assert_eq!(room.status(), RoomStatus::Finished);

        room.reset();
        assert_eq!(room.status(), RoomStatus::Waiting);
        assert!(room.seeker().is_none());
        assert!(room.members().iter().all(|p| !p.is_ready()));
    }

    #[test]
    fn test_serialization_round_trip() {
        let (mut room, _) = room_with(4);
        room.add_member(Player::new_guest("Bob").unwrap()).unwrap();

        let json = serde_json::to_string(&room).unwrap();
        let back: Room = serde_json::from_str(&json).unwrap();
        assert_eq!(room, back);
    }
}
