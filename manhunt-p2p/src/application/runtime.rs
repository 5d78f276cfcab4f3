use crate::domain::{PeerId, PeerPlayerMap};
use crate::infrastructure::{Connection, MessagePayload, PeerTransport, TransportEvent};
use manhunt_core::{
    Coordinate, EventBus, GameSession, GameState, Player, PositionSample, RoomCode, RoomSession,
    RoomStatus, SessionCommand, SessionEvent, Timestamp,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

/// Minimum movement before a new own position is broadcast
const LOCATION_THROTTLE_M: f64 = 10.0;

/// How often the inbound path is drained while running
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The single owner of all session state.
///
/// Every mutation, local commands and remote messages alike, is applied
/// here on one context; nothing else touches the room or the game. The
/// presentation layer talks to it through [`SessionCommand`]s in and
/// [`SessionEvent`]s out of the bus.
pub struct SessionRuntime<C: Connection> {
    transport: PeerTransport<C>,
    room: RoomSession,
    game: GameSession,
    bus: EventBus,
    peers: PeerPlayerMap,
    rng: StdRng,
    last_sent_position: Option<Coordinate>,
}

impl<C: Connection> SessionRuntime<C> {
    pub fn new(connection: C, self_player: Player) -> Self {
        Self::with_rng(connection, self_player, StdRng::from_entropy())
    }

    /// Seedable constructor, for deterministic role assignment in tests
    pub fn with_rng(connection: C, self_player: Player, rng: StdRng) -> Self {
        Self {
            transport: PeerTransport::new(connection),
            room: RoomSession::new(self_player),
            game: GameSession::new(),
            bus: EventBus::new(),
            peers: PeerPlayerMap::new(),
            rng,
            last_sent_position: None,
        }
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn room(&self) -> &RoomSession {
        &self.room
    }

    pub fn game(&self) -> &GameSession {
        &self.game
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.transport.local_peer_id()
    }

    /// Start listening for advertised rooms. Snapshots of discovered rooms
    /// surface as RoomUpdated events until one of them is joined.
    pub fn browse(&mut self) {
        if let Err(err) = self.transport.connection_mut().start_browsing() {
            tracing::warn!(%err, "browsing failed to start");
        }
    }

    /// Apply a local command. Rejections surface as CommandFailed events
    /// on the bus, never as panics or silent drops.
    pub fn submit(&mut self, command: SessionCommand) {
        if let Err(reason) = self.apply_command(&command) {
            tracing::warn!(?command, %reason, "command rejected");
            self.bus.publish(SessionEvent::CommandFailed {
                command: command_name(&command).to_string(),
                reason,
            });
        }
    }

    /// One second of game time
    pub fn tick(&mut self) {
        let events = self.game.tick();
        self.process_game_events(events);
    }

    /// Drain the network and apply everything that arrived
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        for event in self.transport.poll() {
            handled += 1;
            match event {
                TransportEvent::PeerJoined(peer) => self.on_peer_joined(peer),
                TransportEvent::PeerLeft(peer) => self.on_peer_left(peer),
                TransportEvent::Payload { from, payload } => self.on_payload(from, payload),
            }
        }
        handled
    }

    /// Drive the runtime until the command channel closes
    pub async fn run(mut self, mut commands: tokio::sync::mpsc::UnboundedReceiver<SessionCommand>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let mut poller = tokio::time::interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick(),
                _ = poller.tick() => {
                    self.poll();
                }
                command = commands.recv() => match command {
                    Some(command) => self.submit(command),
                    None => break,
                },
            }
        }
        tracing::info!("session runtime stopped");
    }

    // ===== Local commands =====

    fn apply_command(&mut self, command: &SessionCommand) -> std::result::Result<(), String> {
        match command {
            SessionCommand::CreateRoom {
                capacity,
                round_duration,
            } => {
                let events = self
                    .room
                    .create(*capacity, *round_duration, &mut self.rng)
                    .map_err(err_str)?;
                let code = self
                    .room
                    .room()
                    .map(|r| r.code().as_str().to_string())
                    .ok_or_else(|| "room missing after create".to_string())?;
                self.transport
                    .connection_mut()
                    .start_hosting(&code)
                    .map_err(err_str)?;
                self.publish_all(events);
                Ok(())
            }

            SessionCommand::JoinRoom { code } => {
                let code = RoomCode::parse(code).map_err(err_str)?;
                let events = self.room.join(&code).map_err(err_str)?;
                // Announce ourselves; the host admits us and snapshots back
                self.transport
                    .broadcast(MessagePayload::PlayerInfo {
                        player: self.room.self_player().clone(),
                    })
                    .map_err(err_str)?;
                // Advertise membership so later joiners link up with us too
                self.transport
                    .connection_mut()
                    .start_hosting(code.as_str())
                    .map_err(err_str)?;
                self.publish_all(events);
                Ok(())
            }

            SessionCommand::LeaveRoom => {
                let events = self.room.leave().map_err(err_str)?;
                self.reset_game_if_active();
                self.teardown_network();
                self.publish_all(events);
                Ok(())
            }

            SessionCommand::KickPlayer { player_id } => {
                let events = self.room.kick(*player_id).map_err(err_str)?;
                // The kicked member learns from the snapshot no longer
                // containing them
                self.broadcast_snapshot();
                self.publish_all(events);
                Ok(())
            }

            SessionCommand::SetReady { is_ready } => {
                let events = self.room.set_ready(*is_ready).map_err(err_str)?;
                if self.room.is_host() {
                    self.broadcast_snapshot();
                } else {
                    self.transport
                        .broadcast(MessagePayload::PlayerInfo {
                            player: self.room.self_player().clone(),
                        })
                        .map_err(err_str)?;
                }
                self.publish_all(events);
                Ok(())
            }

            SessionCommand::UpdateSettings {
                capacity,
                round_duration,
            } => {
                let events = self
                    .room
                    .update_settings(*capacity, *round_duration)
                    .map_err(err_str)?;
                self.broadcast_snapshot();
                self.publish_all(events);
                Ok(())
            }

            SessionCommand::StartGame => {
                let events = self.room.start(&mut self.rng).map_err(err_str)?;
                let room = self
                    .room
                    .room()
                    .cloned()
                    .ok_or_else(|| "room missing after start".to_string())?;
                self.game
                    .start(room.round_duration(), room.members())
                    .map_err(err_str)?;
                self.transport
                    .broadcast(MessagePayload::GameStart { room })
                    .map_err(err_str)?;
                self.publish_all(events);
                Ok(())
            }

            SessionCommand::PauseGame => self.game.pause().map_err(err_str),

            SessionCommand::ResumeGame => self.game.resume().map_err(err_str),

            SessionCommand::ResetRound => {
                let mut events = self.room.reset_round().map_err(err_str)?;
                events.extend(self.game.reset());
                if self.room.is_host() {
                    self.broadcast_snapshot();
                }
                self.publish_all(events);
                Ok(())
            }

            SessionCommand::ReportPosition { lat, lon } => {
                if self.game.state() != GameState::Running {
                    return Err("no round running".to_string());
                }
                let coordinate = Coordinate::new(*lat, *lon);
                let sample =
                    PositionSample::new(self.room.self_id(), coordinate, Timestamp::now());
                let events = self.game.update_position(sample);
                self.process_game_events(events);

                let moved_enough = self
                    .last_sent_position
                    .map_or(true, |last| last.distance_m(&coordinate) >= LOCATION_THROTTLE_M);
                if moved_enough {
                    self.last_sent_position = Some(coordinate);
                    self.transport
                        .broadcast(MessagePayload::PositionUpdate {
                            player_id: sample.player_id,
                            lat: coordinate.lat,
                            lon: coordinate.lon,
                            timestamp_ms: sample.timestamp.as_millis(),
                        })
                        .map_err(err_str)?;
                }
                Ok(())
            }
        }
    }

    // ===== Remote traffic =====

    fn on_peer_joined(&mut self, peer: PeerId) {
        self.bus.publish(SessionEvent::PeerConnected {
            peer: peer.as_uuid(),
        });
        // A browser just linked up; hand it the current room state
        if self.room.is_host() {
            if let Some(room) = self.room.room().cloned() {
                if let Err(err) = self
                    .transport
                    .send_to(peer, MessagePayload::RoomSnapshot { room })
                {
                    tracing::warn!(%peer, %err, "welcome snapshot failed");
                }
            }
        }
    }

    fn on_peer_left(&mut self, peer: PeerId) {
        self.bus.publish(SessionEvent::PeerDisconnected {
            peer: peer.as_uuid(),
        });
        let Some(player_id) = self.peers.remove_by_peer(&peer) else {
            return;
        };

        if self.room.is_host() {
            match self.room.apply_player_left(player_id) {
                Ok(events) => {
                    self.broadcast_snapshot();
                    self.publish_all(events);
                }
                Err(err) => tracing::debug!(%player_id, %err, "departed peer was not a member"),
            }
        } else if self.room.room().map(|r| r.host_id()) == Some(player_id) {
            // The host vanished; the room is gone for everyone
            if let Some(code) = self.room.clear() {
                self.bus.publish(SessionEvent::RoomDissolved { code });
            }
            self.reset_game_if_active();
            self.teardown_network();
        }
    }

    fn on_payload(&mut self, from: PeerId, payload: MessagePayload) {
        match payload {
            MessagePayload::PlayerInfo { player } => {
                self.peers.register(from, player.id());
                if !self.room.is_host() {
                    return;
                }
                match self.room.apply_player_info(player) {
                    Ok(events) => {
                        self.broadcast_snapshot();
                        self.publish_all(events);
                    }
                    Err(err) => tracing::warn!(%from, %err, "player info rejected"),
                }
            }

            MessagePayload::RoomSnapshot { room } => {
                self.peers.register(from, room.host_id());
                let events = self.room.reconcile_snapshot(room);
                let removed = events
                    .iter()
                    .any(|e| matches!(e, SessionEvent::RoomDissolved { .. }));
                self.publish_all(events);

                if removed {
                    // The latest snapshot dropped us: kicked
                    self.reset_game_if_active();
                    self.teardown_network();
                } else if self.game.state() != GameState::Idle
                    && self
                        .room
                        .room()
                        .is_some_and(|r| r.status() == RoomStatus::Waiting)
                {
                    // Host took the room back to the lobby
                    let events = self.game.reset();
                    self.publish_all(events);
                }
            }

            MessagePayload::GameStart { room } => {
                self.peers.register(from, room.host_id());
                let duration = room.round_duration();
                let events = self.room.reconcile_snapshot(room);
                self.publish_all(events);
                if !self.room.is_joined() {
                    return;
                }
                let Some(room) = self.room.room().cloned() else {
                    return;
                };
                match self.game.start(duration, room.members()) {
                    Ok(()) => self.bus.publish(SessionEvent::GameStarted { room }),
                    Err(err) => tracing::warn!(%err, "remote game start rejected"),
                }
            }

            MessagePayload::PositionUpdate {
                player_id,
                lat,
                lon,
                timestamp_ms,
            } => {
                let sample = PositionSample::new(
                    player_id,
                    Coordinate::new(lat, lon),
                    Timestamp::from_millis(timestamp_ms),
                );
                // Catches detected from this movement are ours to announce
                let events = self.game.update_position(sample);
                self.process_game_events(events);
            }

            MessagePayload::PlayerCaught { player_id } => {
                // Absorbed idempotently; never echoed back
                for event in self.game.apply_catch(player_id) {
                    if let SessionEvent::GameEnded { result, .. } = &event {
                        if let Err(err) = self
                            .transport
                            .broadcast(MessagePayload::GameEnd { result: *result })
                        {
                            tracing::warn!(%err, "game end broadcast failed");
                        }
                        self.finish_room();
                    }
                    self.bus.publish(event);
                }
            }

            MessagePayload::GameEnd { result } => {
                // A remote decision is applied, never re-announced
                let events = self.game.apply_remote_end(result);
                let ended = !events.is_empty();
                self.publish_all(events);
                if ended {
                    self.finish_room();
                }
            }
        }
    }

    // ===== Internals =====

    /// Publish game events and announce the ones other devices must learn
    /// about: catches we detected and ends we decided.
    fn process_game_events(&mut self, events: Vec<SessionEvent>) {
        for event in events {
            match &event {
                SessionEvent::PlayerCaught { player_id } => {
                    if let Err(err) = self.transport.broadcast(MessagePayload::PlayerCaught {
                        player_id: *player_id,
                    }) {
                        tracing::warn!(%err, "catch broadcast failed");
                    }
                }
                SessionEvent::GameEnded { result, .. } => {
                    if let Err(err) = self
                        .transport
                        .broadcast(MessagePayload::GameEnd { result: *result })
                    {
                        tracing::warn!(%err, "game end broadcast failed");
                    }
                    self.finish_room();
                }
                _ => {}
            }
            self.bus.publish(event);
        }
    }

    fn finish_room(&mut self) {
        match self.room.finish_round() {
            Ok(events) => self.publish_all(events),
            Err(err) => tracing::debug!(%err, "no room to finish"),
        }
    }

    fn broadcast_snapshot(&mut self) {
        let Some(room) = self.room.room().cloned() else {
            return;
        };
        if let Err(err) = self
            .transport
            .broadcast(MessagePayload::RoomSnapshot { room })
        {
            tracing::warn!(%err, "snapshot broadcast failed");
        }
    }

    fn reset_game_if_active(&mut self) {
        if self.game.state() != GameState::Idle {
            let events = self.game.reset();
            self.publish_all(events);
        }
    }

    fn teardown_network(&mut self) {
        let connection = self.transport.connection_mut();
        connection.stop_hosting();
        connection.stop_browsing();
        connection.disconnect_all();
        self.peers.clear();
        self.last_sent_position = None;
    }

    fn publish_all(&mut self, events: Vec<SessionEvent>) {
        self.bus.publish_all(events);
    }
}

fn err_str<E: std::fmt::Display>(err: E) -> String {
    err.to_string()
}

fn command_name(command: &SessionCommand) -> &'static str {
    match command {
        SessionCommand::CreateRoom { .. } => "create_room",
        SessionCommand::JoinRoom { .. } => "join_room",
        SessionCommand::LeaveRoom => "leave_room",
        SessionCommand::KickPlayer { .. } => "kick_player",
        SessionCommand::SetReady { .. } => "set_ready",
        SessionCommand::UpdateSettings { .. } => "update_settings",
        SessionCommand::StartGame => "start_game",
        SessionCommand::PauseGame => "pause_game",
        SessionCommand::ResumeGame => "resume_game",
        SessionCommand::ResetRound => "reset_round",
        SessionCommand::ReportPosition { .. } => "report_position",
    }
}
