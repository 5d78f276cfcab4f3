use crate::domain::{
    Player, Room, RoomCode, RoomError, RoomStatus, SessionEvent,
};
use rand::Rng;
use std::time::Duration;
use uuid::Uuid;

/// The authoritative-per-device view of room membership.
///
/// Holds at most one room: either the one we created (host) or the one we
/// learned about through snapshots (guest, before and after joining). All
/// mutations go through the operations here; remote state arrives only via
/// [`RoomSession::reconcile_snapshot`] under a last-writer-wins policy.
#[derive(Debug)]
pub struct RoomSession {
    self_player: Player,
    room: Option<Room>,
}

impl RoomSession {
    pub fn new(self_player: Player) -> Self {
        Self {
            self_player,
            room: None,
        }
    }

    // ===== Getters =====

    pub fn self_id(&self) -> Uuid {
        self.self_player.id()
    }

    pub fn self_player(&self) -> &Player {
        &self.self_player
    }

    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    /// Whether we appear in the member list of the current room
    pub fn is_joined(&self) -> bool {
        self.room
            .as_ref()
            .is_some_and(|r| r.is_member(self.self_player.id()))
    }

    pub fn is_host(&self) -> bool {
        self.room
            .as_ref()
            .is_some_and(|r| r.host_id() == self.self_player.id())
    }

    fn room_mut(&mut self) -> Result<&mut Room, RoomError> {
        self.room.as_mut().ok_or(RoomError::NotInRoom)
    }

    // ===== Operations =====

    /// Create a new room with self as host. Replaces any previous room.
    pub fn create<R: Rng + ?Sized>(
        &mut self,
        capacity: usize,
        round_duration: Duration,
        rng: &mut R,
    ) -> Result<Vec<SessionEvent>, RoomError> {
        let code = RoomCode::generate(rng);
        self.self_player.set_host(true);
        let room = Room::new(code, self.self_player.clone(), capacity, round_duration)?;

        tracing::info!(code = %room.code(), capacity, "room created");
        let event = SessionEvent::RoomUpdated { room: room.clone() };
        self.room = Some(room);
        Ok(vec![event])
    }

    /// Store a snapshot learned through browsing, before we are a member.
    /// A no-op once we hold a room of our own.
    pub fn offer_snapshot(&mut self, room: Room) {
        if self.room.is_none() {
            tracing::debug!(code = %room.code(), "discovered room snapshot stored");
            self.room = Some(room);
        }
    }

    /// Join the room previously learned via snapshot. Unknown codes are
    /// rejected before the membership guards run.
    pub fn join(&mut self, code: &RoomCode) -> Result<Vec<SessionEvent>, RoomError> {
        let self_player = self.self_player.clone();
        let room = match &mut self.room {
            Some(room) if room.code() == code => room,
            _ => return Err(RoomError::RoomNotFound(code.to_string())),
        };
        if room.is_member(self_player.id()) {
            return Err(RoomError::AlreadyJoined);
        }

        room.add_member(self_player.clone())?;
        tracing::info!(code = %code, player = %self_player.name(), "joined room");

        Ok(vec![
            SessionEvent::PlayerJoined {
                player: self_player,
            },
            SessionEvent::RoomUpdated { room: room.clone() },
        ])
    }

    /// Leave the current room. A leaving host dissolves the room for
    /// everyone; a leaving guest just shrinks the member list.
    pub fn leave(&mut self) -> Result<Vec<SessionEvent>, RoomError> {
        let self_id = self.self_player.id();
        let mut room = self.room.take().ok_or(RoomError::NotInRoom)?;

        if room.host_id() == self_id {
            tracing::info!(code = %room.code(), "host left, dissolving room");
            return Ok(vec![SessionEvent::RoomDissolved {
                code: room.code().clone(),
            }]);
        }

        room.remove_member(self_id)?;
        tracing::info!(code = %room.code(), "left room");
        Ok(vec![
            SessionEvent::PlayerLeft { player_id: self_id },
            SessionEvent::RoomUpdated { room },
        ])
    }

    /// Forcibly remove a member. Host only.
    pub fn kick(&mut self, player_id: Uuid) -> Result<Vec<SessionEvent>, RoomError> {
        if !self.is_host() {
            return Err(RoomError::NotHost);
        }
        let self_id = self.self_player.id();
        let room = self.room_mut()?;
        room.remove_member(player_id)?;

        tracing::info!(%player_id, "kicked player");
        Ok(vec![
            SessionEvent::PlayerKicked {
                player_id,
                kicked_by: self_id,
            },
            SessionEvent::RoomUpdated { room: room.clone() },
        ])
    }

    /// Toggle the local ready flag
    pub fn set_ready(&mut self, is_ready: bool) -> Result<Vec<SessionEvent>, RoomError> {
        let self_id = self.self_player.id();
        let room = self.room_mut()?;
        room.set_ready(self_id, is_ready)?;
        let room = room.clone();
        self.self_player.set_ready(is_ready);

        Ok(vec![
            SessionEvent::ReadyChanged {
                player_id: self_id,
                is_ready,
            },
            SessionEvent::RoomUpdated { room },
        ])
    }

    /// Change room settings. Host only, lobby only.
    pub fn update_settings(
        &mut self,
        capacity: usize,
        round_duration: Duration,
    ) -> Result<Vec<SessionEvent>, RoomError> {
        if !self.is_host() {
            return Err(RoomError::NotHost);
        }
        let room = self.room_mut()?;
        room.update_settings(capacity, round_duration)?;

        tracing::info!(capacity, ?round_duration, "settings updated");
        Ok(vec![SessionEvent::RoomUpdated { room: room.clone() }])
    }

    /// Assign roles and transition to Playing. Host only.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Vec<SessionEvent>, RoomError> {
        if !self.is_host() {
            return Err(RoomError::NotHost);
        }
        let room = self.room_mut()?;
        if room.status() != RoomStatus::Waiting {
            return Err(RoomError::NotWaiting);
        }
        if room.members().len() < crate::domain::MIN_PLAYERS {
            return Err(RoomError::NotEnoughPlayers {
                have: room.members().len(),
            });
        }

        let seeker_id = room.assign_roles(rng);
        room.begin_playing()?;

        tracing::info!(%seeker_id, members = room.members().len(), "game started");
        Ok(vec![SessionEvent::GameStarted { room: room.clone() }])
    }

    /// Playing -> Finished, once the local game session decided a result
    pub fn finish_round(&mut self) -> Result<Vec<SessionEvent>, RoomError> {
        let room = self.room_mut()?;
        room.finish();
        Ok(vec![SessionEvent::RoomUpdated { room: room.clone() }])
    }

    /// Finished -> Waiting, clearing roles and ready flags
    pub fn reset_round(&mut self) -> Result<Vec<SessionEvent>, RoomError> {
        let room = self.room_mut()?;
        room.reset();
        let room = room.clone();
        self.self_player.set_ready(false);
        self.self_player.set_role(crate::domain::Role::Runner);
        Ok(vec![SessionEvent::RoomUpdated { room }])
    }

    /// Host side: apply a remote player's announcement. An unknown player is
    /// admitted through the join guards; a known member updates their ready
    /// flag. Roles never change through announcements.
    pub fn apply_player_info(&mut self, player: Player) -> Result<Vec<SessionEvent>, RoomError> {
        let room = self.room_mut()?;
        if let Some(member) = room.member_mut(player.id()) {
            let changed = member.is_ready() != player.is_ready();
            member.set_ready(player.is_ready());
            let mut events = Vec::new();
            if changed {
                events.push(SessionEvent::ReadyChanged {
                    player_id: player.id(),
                    is_ready: player.is_ready(),
                });
            }
            events.push(SessionEvent::RoomUpdated { room: room.clone() });
            return Ok(events);
        }

        let mut guest = player;
        guest.set_host(false);
        room.add_member(guest.clone())?;
        tracing::info!(player = %guest.name(), "remote player joined");
        Ok(vec![
            SessionEvent::PlayerJoined { player: guest },
            SessionEvent::RoomUpdated { room: room.clone() },
        ])
    }

    /// Host side: a remote member's device disconnected without a goodbye.
    /// Removes them from the member list.
    pub fn apply_player_left(&mut self, player_id: Uuid) -> Result<Vec<SessionEvent>, RoomError> {
        let room = self.room_mut()?;
        room.remove_member(player_id)?;
        tracing::info!(%player_id, "remote player left");
        Ok(vec![
            SessionEvent::PlayerLeft { player_id },
            SessionEvent::RoomUpdated { room: room.clone() },
        ])
    }

    /// Apply a remote room snapshot: whole-room replace, most recently
    /// received wins. Only the locally known identity of self is preserved.
    ///
    /// Concurrent edits from two members in the same instant can be lost;
    /// that is the accepted cost of the serverless merge policy.
    pub fn reconcile_snapshot(&mut self, mut remote: Room) -> Vec<SessionEvent> {
        let self_id = self.self_player.id();
        let was_joined = self.is_joined();

        if let Some(local) = &self.room {
            if local.code() != remote.code() {
                tracing::warn!(
                    local = %local.code(),
                    remote = %remote.code(),
                    "ignoring snapshot for a different room"
                );
                return Vec::new();
            }
        }

        let mut events = Vec::new();
        match remote.member_mut(self_id) {
            Some(me) => {
                // Snapshot is authoritative for everything except who we are
                me.set_name(self.self_player.name().to_string());
                let mut me = me.clone();
                me.set_host(remote.host_id() == self_id);
                self.self_player = me;
                events.push(SessionEvent::RoomUpdated {
                    room: remote.clone(),
                });
                self.room = Some(remote);
            }
            None if was_joined => {
                // We were a member and the latest snapshot dropped us:
                // kicked, or the room was dissolved around us
                tracing::info!(code = %remote.code(), "removed from room by snapshot");
                events.push(SessionEvent::RoomDissolved {
                    code: remote.code().clone(),
                });
                self.room = None;
            }
            None => {
                // Browsing: remember the room so a join can be validated
                events.push(SessionEvent::RoomUpdated {
                    room: remote.clone(),
                });
                self.room = Some(remote);
            }
        }
        events
    }

    /// Drop the local room copy without emitting membership changes
    /// (used when the transport tells us the session is gone).
    pub fn clear(&mut self) -> Option<RoomCode> {
        self.room.take().map(|r| r.code().clone())
    }
}
