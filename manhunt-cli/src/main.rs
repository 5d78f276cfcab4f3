use clap::{Parser, Subcommand};
use manhunt_cli::{CliError, LocationSource, LocationStatus, LogConfig, Result, Walker};
use manhunt_core::{Player, RoomStatus, SessionCommand, SessionEvent, MIN_PLAYERS};
use manhunt_p2p::{LanConfig, LanConnection, SessionRuntime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "manhunt")]
#[command(version, about = "LAN hide-and-seek sessions with simulated GPS")]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Latitude the simulated walk starts around
    #[arg(long, global = true, default_value_t = 52.5200)]
    lat: f64,

    /// Longitude the simulated walk starts around
    #[arg(long, global = true, default_value_t = 13.4050)]
    lon: f64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a room and start the round once everyone is ready
    Host {
        /// Host display name
        #[arg(short = 'n', long, default_value = "Host")]
        name: String,

        /// Maximum number of players
        #[arg(short = 'c', long, default_value_t = 8)]
        capacity: usize,

        /// Round length in seconds
        #[arg(short = 'd', long, default_value_t = 300)]
        round_secs: u64,
    },

    /// Browse for advertised rooms and join one
    Join {
        /// Guest display name
        #[arg(short = 'n', long, default_value = "Guest")]
        name: String,

        /// Room code; the first room heard is joined when omitted
        #[arg(short = 'r', long)]
        room: Option<String>,
    },
}

enum Mode {
    Host,
    Join { wanted_code: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log = if cli.verbose {
        LogConfig::dev()
    } else {
        LogConfig::default()
    };
    log.init().map_err(CliError::Logging)?;

    let connection = LanConnection::bind(LanConfig::default())?;
    let base = (cli.lat, cli.lon);

    match cli.command {
        Commands::Host {
            name,
            capacity,
            round_secs,
        } => {
            let player = Player::new_host(name)?;
            info!(name = player.name(), "hosting a room");
            let mut runtime = SessionRuntime::new(connection, player);
            runtime.submit(SessionCommand::CreateRoom {
                capacity,
                round_duration: Duration::from_secs(round_secs),
            });
            runtime.submit(SessionCommand::SetReady { is_ready: true });
            if let Some(room) = runtime.room().room() {
                info!("room code: {}", room.code());
                info!("on another machine: manhunt join --room {}", room.code());
            }
            run_session(runtime, Mode::Host, base).await;
        }
        Commands::Join { name, room } => {
            let player = Player::new_guest(name)?;
            info!(name = player.name(), "browsing for rooms");
            let mut runtime = SessionRuntime::new(connection, player);
            runtime.browse();
            run_session(runtime, Mode::Join { wanted_code: room }, base).await;
        }
    }

    Ok(())
}

/// Wire the event printer and the simulated walk to the runtime, then drive
/// it until Ctrl+C.
async fn run_session(
    mut runtime: SessionRuntime<LanConnection>,
    mode: Mode,
    base: (f64, f64),
) {
    let self_id = runtime.room().self_id();
    let events = runtime.bus_mut().subscribe_all();
    let (cmd_tx, cmd_rx) = tokio::sync::mpsc::unbounded_channel();

    let walking = Arc::new(AtomicBool::new(false));
    let walker = Walker::around(base.0, base.1);
    tokio::spawn(walk_loop(cmd_tx.clone(), walking.clone(), walker));

    let walking_flag = walking.clone();
    tokio::task::spawn_blocking(move || event_loop(events, cmd_tx, walking_flag, self_id, mode));

    info!("press Ctrl+C to leave");
    tokio::select! {
        _ = runtime.run(cmd_rx) => {}
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
}

/// Feed one position per second from the source while a round is running
async fn walk_loop<S: LocationSource>(
    cmd_tx: UnboundedSender<SessionCommand>,
    walking: Arc<AtomicBool>,
    mut source: S,
) {
    if source.status() == LocationStatus::Denied {
        warn!("location source denied, not reporting positions");
        return;
    }
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        interval.tick().await;
        if !walking.load(Ordering::Relaxed) {
            continue;
        }
        let Some((lat, lon)) = source.sample() else {
            continue;
        };
        if cmd_tx
            .send(SessionCommand::ReportPosition { lat, lon })
            .is_err()
        {
            break;
        }
    }
}

/// Print session events and drive the demo choreography: guests join the
/// first matching room and ready up, the host starts once the lobby is
/// ready, both sides walk while a round runs.
fn event_loop(
    events: Receiver<SessionEvent>,
    cmd_tx: UnboundedSender<SessionCommand>,
    walking: Arc<AtomicBool>,
    self_id: Uuid,
    mode: Mode,
) {
    let mut join_requested = false;
    let mut start_requested = false;

    while let Ok(event) = events.recv() {
        match &event {
            SessionEvent::RoomUpdated { room } => {
                info!(
                    code = %room.code(),
                    members = room.members().len(),
                    capacity = room.capacity(),
                    status = ?room.status(),
                    "room updated"
                );
                match &mode {
                    Mode::Join { wanted_code } if !join_requested && !room.is_member(self_id) => {
                        let code = room.code().as_str();
                        if wanted_code.as_deref().map_or(true, |wanted| wanted == code) {
                            info!(code, "joining");
                            let _ = cmd_tx.send(SessionCommand::JoinRoom {
                                code: code.to_string(),
                            });
                            join_requested = true;
                        }
                    }
                    Mode::Host
                        if !start_requested
                            && room.status() == RoomStatus::Waiting
                            && room.members().len() >= MIN_PLAYERS
                            && room.members().iter().all(Player::is_ready) =>
                    {
                        info!("lobby is ready, starting the round");
                        let _ = cmd_tx.send(SessionCommand::StartGame);
                        start_requested = true;
                    }
                    _ => {}
                }
            }

            SessionEvent::PlayerJoined { player } => {
                info!(name = player.name(), id = %player.id(), "player joined");
                if player.id() == self_id && matches!(mode, Mode::Join { .. }) {
                    let _ = cmd_tx.send(SessionCommand::SetReady { is_ready: true });
                }
            }

            SessionEvent::PlayerLeft { player_id } => {
                info!(%player_id, "player left");
            }

            SessionEvent::PlayerKicked { player_id, .. } => {
                info!(%player_id, "player kicked");
            }

            SessionEvent::ReadyChanged {
                player_id,
                is_ready,
            } => {
                info!(%player_id, is_ready, "ready changed");
            }

            SessionEvent::GameStarted { room } => {
                let role = room
                    .member(self_id)
                    .map(|player| format!("{:?}", player.role()))
                    .unwrap_or_else(|| "spectator".to_string());
                info!(role, "round started");
                walking.store(true, Ordering::Relaxed);
            }

            SessionEvent::PositionUpdated { sample } => {
                tracing::debug!(
                    player = %sample.player_id,
                    lat = sample.coordinate.lat,
                    lon = sample.coordinate.lon,
                    "position"
                );
            }

            SessionEvent::PlayerCaught { player_id } => {
                info!(%player_id, "caught!");
            }

            SessionEvent::GameEnded {
                result,
                remaining_secs,
                caught_count,
            } => {
                walking.store(false, Ordering::Relaxed);
                start_requested = false;
                info!(%result, remaining_secs, caught_count, "round over");
            }

            SessionEvent::RoundReset => {
                walking.store(false, Ordering::Relaxed);
                start_requested = false;
                info!("back to the lobby");
            }

            SessionEvent::RoomDissolved { code } => {
                walking.store(false, Ordering::Relaxed);
                info!(%code, "room closed");
            }

            SessionEvent::PeerConnected { peer } => {
                info!(%peer, "peer connected");
            }

            SessionEvent::PeerDisconnected { peer } => {
                info!(%peer, "peer disconnected");
            }

            SessionEvent::CommandFailed { command, reason } => {
                warn!(command, reason, "rejected");
            }
        }
    }
}
