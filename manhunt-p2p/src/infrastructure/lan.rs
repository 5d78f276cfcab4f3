//! LAN networking: UDP multicast beacons for discovery, length-prefixed
//! JSON frames over one TCP link per peer.
//!
//! Advertising means "I am a member of this room, connect to me", not "I am
//! the host"; every member advertises so that the room forms a full mesh.
//! Browsers connect to every advertiser they hear and decide at the session
//! layer which room, if any, they join.

use crate::domain::PeerId;
use crate::infrastructure::connection_trait::{Connection, ConnectionEvent};
use crate::infrastructure::error::{P2PError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;

const LEN_SIZE: usize = 4;
const MAX_FRAME_LEN: u32 = 1024 * 1024;
/// Outbound frames queued per peer before sends start failing
const SEND_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct LanConfig {
    pub discovery_port: u16,
    pub multicast_group: Ipv4Addr,
    pub beacon_interval: Duration,
    pub connect_timeout: Duration,
}

impl Default for LanConfig {
    fn default() -> Self {
        Self {
            discovery_port: 53630,
            multicast_group: Ipv4Addr::new(239, 255, 71, 84),
            beacon_interval: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Multicast advertisement, one per beacon interval while advertising
#[derive(Debug, Serialize, Deserialize)]
struct Beacon {
    peer_id: PeerId,
    room_code: String,
    port: u16,
}

/// First frame on every TCP link, in both directions
#[derive(Debug, Serialize, Deserialize)]
struct Hello {
    peer_id: PeerId,
}

/// One established TCP link. The token distinguishes a link from its
/// replacement after a simultaneous-connect race, so a dying link can tell
/// whether the map entry is still its own.
struct Link {
    token: u64,
    tx: mpsc::Sender<Vec<u8>>,
}

type Senders = Arc<Mutex<HashMap<PeerId, Link>>>;

static NEXT_LINK_TOKEN: AtomicU64 = AtomicU64::new(0);

/// Recover the guard even if a holder panicked; the maps stay usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Both ends of a simultaneous connect must keep the *same* link or the
/// pair flaps forever, each side closing the other's survivor. The link
/// dialed by the lower peer id wins; each side can decide that alone,
/// since the dialer knows it dialed and the acceptor knows it did not.
fn wins_glare(local: PeerId, remote: PeerId, initiated: bool) -> bool {
    (local < remote) == initiated
}

/// Queue a frame on a peer's outbound channel
fn queue_frame(senders: &Senders, peer: PeerId, data: Vec<u8>) -> Result<()> {
    let mut map = lock(senders);
    let link = map.get(&peer).ok_or(P2PError::PeerNotFound(peer))?;
    match link.tx.try_send(data) {
        Ok(()) => Ok(()),
        Err(mpsc::error::TrySendError::Full(_)) => Err(P2PError::SendFailed {
            peer,
            reason: "outbound queue full".to_string(),
        }),
        Err(mpsc::error::TrySendError::Closed(_)) => {
            map.remove(&peer);
            Err(P2PError::ChannelClosed)
        }
    }
}

/// [`Connection`] over the local network.
///
/// Must be created inside a tokio runtime; discovery and per-link I/O run on
/// background tasks, the trait surface stays synchronous and non-blocking.
pub struct LanConnection {
    local_peer_id: PeerId,
    advertised: Arc<Mutex<Option<String>>>,
    browsing: Arc<AtomicBool>,
    senders: Senders,
    events_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl LanConnection {
    /// Bind the discovery socket and the TCP listener, spawn the background
    /// tasks. The listener takes an ephemeral port advertised in beacons.
    pub fn bind(config: LanConfig) -> Result<Self> {
        let local_peer_id = PeerId::random();

        let udp = std::net::UdpSocket::bind(("0.0.0.0", config.discovery_port))?;
        udp.join_multicast_v4(&config.multicast_group, &Ipv4Addr::UNSPECIFIED)?;
        udp.set_multicast_ttl_v4(1)?;
        udp.set_nonblocking(true)?;
        let udp = Arc::new(UdpSocket::from_std(udp)?);

        let listener = std::net::TcpListener::bind(("0.0.0.0", 0))?;
        listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(listener)?;
        let listen_port = listener.local_addr()?.port();

        let advertised: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let browsing = Arc::new(AtomicBool::new(false));
        let senders: Senders = Arc::new(Mutex::new(HashMap::new()));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tracing::info!(%local_peer_id, listen_port, "lan connection bound");

        let beacon_task = tokio::spawn(beacon_loop(
            udp.clone(),
            local_peer_id,
            advertised.clone(),
            config.clone(),
            listen_port,
        ));
        let discovery_task = tokio::spawn(discovery_loop(
            udp,
            local_peer_id,
            browsing.clone(),
            senders.clone(),
            events_tx.clone(),
            config.connect_timeout,
        ));
        let accept_task = tokio::spawn(accept_loop(
            listener,
            local_peer_id,
            senders.clone(),
            events_tx,
        ));

        Ok(Self {
            local_peer_id,
            advertised,
            browsing,
            senders,
            events_rx,
            tasks: vec![beacon_task, discovery_task, accept_task],
        })
    }
}

impl Connection for LanConnection {
    fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        lock(&self.senders).keys().copied().collect()
    }

    fn start_hosting(&mut self, room_code: &str) -> Result<()> {
        *lock(&self.advertised) = Some(room_code.to_string());
        tracing::info!(room_code, "advertising");
        Ok(())
    }

    fn stop_hosting(&mut self) {
        *lock(&self.advertised) = None;
    }

    fn start_browsing(&mut self) -> Result<()> {
        self.browsing.store(true, Ordering::Relaxed);
        tracing::info!("browsing for rooms");
        Ok(())
    }

    fn stop_browsing(&mut self) {
        self.browsing.store(false, Ordering::Relaxed);
    }

    fn send_to(&mut self, peer: PeerId, data: Vec<u8>) -> Result<()> {
        queue_frame(&self.senders, peer, data)
    }

    fn broadcast(&mut self, data: Vec<u8>) -> Result<()> {
        for (peer, link) in lock(&self.senders).iter() {
            if let Err(err) = link.tx.try_send(data.clone()) {
                tracing::warn!(%peer, %err, "broadcast to peer dropped");
            }
        }
        Ok(())
    }

    fn disconnect_all(&mut self) {
        // Dropping the senders ends the writer tasks; readers follow when
        // the peer closes its end
        lock(&self.senders).clear();
    }

    fn poll_events(&mut self) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Drop for LanConnection {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn beacon_loop(
    socket: Arc<UdpSocket>,
    local_peer_id: PeerId,
    advertised: Arc<Mutex<Option<String>>>,
    config: LanConfig,
    listen_port: u16,
) {
    let dest = SocketAddr::from((config.multicast_group, config.discovery_port));
    loop {
        let room_code = lock(&advertised).clone();
        if let Some(room_code) = room_code {
            let beacon = Beacon {
                peer_id: local_peer_id,
                room_code,
                port: listen_port,
            };
            match serde_json::to_vec(&beacon) {
                Ok(frame) => {
                    if let Err(err) = socket.send_to(&frame, dest).await {
                        tracing::warn!(%err, "beacon send failed");
                    }
                }
                Err(err) => tracing::warn!(%err, "beacon encode failed"),
            }
        }
        tokio::time::sleep(config.beacon_interval).await;
    }
}

async fn discovery_loop(
    socket: Arc<UdpSocket>,
    local_peer_id: PeerId,
    browsing: Arc<AtomicBool>,
    senders: Senders,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    connect_timeout: Duration,
) {
    let connecting: Arc<Mutex<HashSet<PeerId>>> = Arc::new(Mutex::new(HashSet::new()));
    let mut buf = vec![0u8; 2048];
    loop {
        let (n, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(err) => {
                tracing::warn!(%err, "discovery socket error");
                return;
            }
        };
        let Ok(beacon) = serde_json::from_slice::<Beacon>(&buf[..n]) else {
            continue;
        };
        if beacon.peer_id == local_peer_id || !browsing.load(Ordering::Relaxed) {
            continue;
        }
        if lock(&senders).contains_key(&beacon.peer_id)
            || !lock(&connecting).insert(beacon.peer_id)
        {
            continue;
        }

        let addr = SocketAddr::new(from.ip(), beacon.port);
        tracing::debug!(peer = %beacon.peer_id, %addr, room = %beacon.room_code, "beacon heard");

        let senders = senders.clone();
        let events_tx = events_tx.clone();
        let connecting = connecting.clone();
        let peer = beacon.peer_id;
        tokio::spawn(async move {
            let result = connect_to_peer(
                addr,
                local_peer_id,
                senders,
                events_tx,
                connect_timeout,
            )
            .await;
            if let Err(err) = result {
                tracing::warn!(%peer, %addr, %err, "outbound connect failed");
            }
            lock(&connecting).remove(&peer);
        });
    }
}

async fn accept_loop(
    listener: TcpListener,
    local_peer_id: PeerId,
    senders: Senders,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
) {
    loop {
        let (mut stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::warn!(%err, "accept failed");
                return;
            }
        };
        tracing::debug!(%addr, "inbound link");
        let senders = senders.clone();
        let events_tx = events_tx.clone();
        tokio::spawn(async move {
            match handshake_accept(&mut stream, local_peer_id).await {
                Ok(peer) => {
                    run_link(stream, peer, local_peer_id, false, senders, events_tx).await
                }
                Err(err) => tracing::warn!(%addr, %err, "inbound handshake failed"),
            }
        });
    }
}

async fn connect_to_peer(
    addr: SocketAddr,
    local_peer_id: PeerId,
    senders: Senders,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    connect_timeout: Duration,
) -> Result<()> {
    let mut stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| P2PError::ConnectTimeout { addr })??;
    let peer = handshake_connect(&mut stream, local_peer_id).await?;
    run_link(stream, peer, local_peer_id, true, senders, events_tx).await;
    Ok(())
}

/// Initiator side: say hello first, then read the peer's hello
async fn handshake_connect(stream: &mut TcpStream, local_peer_id: PeerId) -> Result<PeerId> {
    let (mut reader, mut writer) = stream.split();
    write_frame(&mut writer, &serde_json::to_vec(&Hello { peer_id: local_peer_id })?).await?;
    let frame = read_frame(&mut reader).await?;
    let hello: Hello = serde_json::from_slice(&frame)?;
    Ok(hello.peer_id)
}

/// Acceptor side: read the initiator's hello, then answer
async fn handshake_accept(stream: &mut TcpStream, local_peer_id: PeerId) -> Result<PeerId> {
    let (mut reader, mut writer) = stream.split();
    let frame = read_frame(&mut reader).await?;
    let hello: Hello = serde_json::from_slice(&frame)?;
    write_frame(&mut writer, &serde_json::to_vec(&Hello { peer_id: local_peer_id })?).await?;
    Ok(hello.peer_id)
}

/// Pump one established link until either side closes it.
///
/// Simultaneous connects are resolved by [`wins_glare`]: the losing link
/// returns without registering, the winning link takes over the map entry
/// and the replaced link's teardown finds its token gone.
async fn run_link<S>(
    stream: S,
    peer: PeerId,
    local_peer_id: PeerId,
    initiated: bool,
    senders: Senders,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(SEND_QUEUE_DEPTH);
    let token = NEXT_LINK_TOKEN.fetch_add(1, Ordering::Relaxed);
    let replacing = {
        let mut map = lock(&senders);
        let existing = map.contains_key(&peer);
        if existing && !wins_glare(local_peer_id, peer, initiated) {
            tracing::debug!(%peer, "simultaneous connect, yielding to the other link");
            return;
        }
        if existing {
            tracing::debug!(%peer, "simultaneous connect, taking over");
        }
        map.insert(peer, Link { token, tx });
        existing
    };
    if !replacing {
        let _ = events_tx.send(ConnectionEvent::PeerConnected(peer));
        tracing::info!(%peer, "peer connected");
    }

    let (mut reader, mut writer) = tokio::io::split(stream);
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if write_frame(&mut writer, &frame).await.is_err() {
                break;
            }
        }
    });

    while let Ok(data) = read_frame(&mut reader).await {
        let _ = events_tx.send(ConnectionEvent::MessageReceived { from: peer, data });
    }

    writer_task.abort();
    let owned = {
        let mut map = lock(&senders);
        if map.get(&peer).is_some_and(|link| link.token == token) {
            map.remove(&peer);
            true
        } else {
            false
        }
    };
    if owned {
        let _ = events_tx.send(ConnectionEvent::PeerDisconnected(peer));
        tracing::info!(%peer, "peer disconnected");
    }
}

async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, data: &[u8]) -> Result<()> {
    let len = data.len() as u32;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; LEN_SIZE];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(P2PError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "frame too large",
        )));
    }
    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data).await?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn peer(n: u128) -> PeerId {
        PeerId::from_uuid(Uuid::from_u128(n))
    }

    fn link_token(senders: &Senders, peer: PeerId) -> Option<u64> {
        lock(senders).get(&peer).map(|link| link.token)
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not met in time");
    }

    #[test]
    fn test_default_config() {
        let config = LanConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert!(config.multicast_group.is_multicast());
    }

    #[test]
    fn test_glare_decision_agrees_on_both_sides() {
        let a = peer(1);
        let b = peer(2);

        // Each racing link gets the same verdict from both endpoints
        assert_eq!(wins_glare(a, b, true), wins_glare(b, a, false));
        assert_eq!(wins_glare(a, b, false), wins_glare(b, a, true));
        // and exactly one of the two links survives
        assert_ne!(wins_glare(a, b, true), wins_glare(a, b, false));
    }

    #[tokio::test]
    async fn test_glare_winner_takes_over_the_map_entry() {
        let local = peer(1);
        let remote = peer(2);
        let senders: Senders = Arc::new(Mutex::new(HashMap::new()));
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        // The remote's dial lands first
        let (inbound, _inbound_far) = tokio::io::duplex(4096);
        tokio::spawn(run_link(
            inbound,
            remote,
            local,
            false,
            senders.clone(),
            events_tx.clone(),
        ));
        wait_until(|| link_token(&senders, remote).is_some()).await;
        let first_token = link_token(&senders, remote);

        // Our own dial towards the same peer; the lower local id wins
        let (outbound, outbound_far) = tokio::io::duplex(4096);
        tokio::spawn(run_link(
            outbound,
            remote,
            local,
            true,
            senders.clone(),
            events_tx.clone(),
        ));
        wait_until(|| link_token(&senders, remote) != first_token).await;

        // Frames queued for the peer now leave through the surviving link
        queue_frame(&senders, remote, b"after".to_vec()).unwrap();
        let (mut far_reader, _far_writer) = tokio::io::split(outbound_far);
        let frame = tokio::time::timeout(Duration::from_secs(1), read_frame(&mut far_reader))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame, b"after");

        // One logical peer throughout: a single PeerConnected, no flap
        let mut connected = 0;
        while let Ok(event) = events_rx.try_recv() {
            match event {
                ConnectionEvent::PeerConnected(p) => {
                    assert_eq!(p, remote);
                    connected += 1;
                }
                ConnectionEvent::PeerDisconnected(_) => panic!("link flapped"),
                ConnectionEvent::MessageReceived { .. } => {}
            }
        }
        assert_eq!(connected, 1);
    }

    #[tokio::test]
    async fn test_glare_loser_yields_without_registering() {
        let local = peer(2);
        let remote = peer(1);
        let senders: Senders = Arc::new(Mutex::new(HashMap::new()));
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        // The lower-id remote dialed us; that link wins
        let (inbound, _inbound_far) = tokio::io::duplex(4096);
        tokio::spawn(run_link(
            inbound,
            remote,
            local,
            false,
            senders.clone(),
            events_tx.clone(),
        ));
        wait_until(|| link_token(&senders, remote).is_some()).await;
        let winner_token = link_token(&senders, remote);

        // Our own dial loses the race and returns without side effects
        let (outbound, _outbound_far) = tokio::io::duplex(4096);
        let loser = tokio::spawn(run_link(
            outbound,
            remote,
            local,
            true,
            senders.clone(),
            events_tx.clone(),
        ));
        tokio::time::timeout(Duration::from_secs(1), loser)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(link_token(&senders, remote), winner_token);
        let mut connected = 0;
        while let Ok(event) = events_rx.try_recv() {
            match event {
                ConnectionEvent::PeerConnected(_) => connected += 1,
                ConnectionEvent::PeerDisconnected(_) => panic!("link flapped"),
                ConnectionEvent::MessageReceived { .. } => {}
            }
        }
        assert_eq!(connected, 1);
    }

    #[test]
    fn test_send_to_dead_link_reports_channel_closed() {
        let senders: Senders = Arc::new(Mutex::new(HashMap::new()));
        let remote = peer(7);
        let (tx, rx) = mpsc::channel(1);
        lock(&senders).insert(remote, Link { token: 0, tx });
        drop(rx);

        let err = queue_frame(&senders, remote, b"x".to_vec()).unwrap_err();
        assert!(matches!(err, P2PError::ChannelClosed));
        // The dead link was dropped from the map on the way out
        let err = queue_frame(&senders, remote, b"x".to_vec()).unwrap_err();
        assert!(matches!(err, P2PError::PeerNotFound(p) if p == remote));
    }

    #[test]
    fn test_send_to_full_queue_reports_send_failure() {
        let senders: Senders = Arc::new(Mutex::new(HashMap::new()));
        let remote = peer(7);
        let (tx, _rx) = mpsc::channel(1);
        lock(&senders).insert(remote, Link { token: 0, tx });

        queue_frame(&senders, remote, b"first".to_vec()).unwrap();
        let err = queue_frame(&senders, remote, b"second".to_vec()).unwrap_err();
        assert!(matches!(err, P2PError::SendFailed { .. }));
        // The link stays registered; the queue may drain
        assert!(lock(&senders).contains_key(&remote));
    }

    #[tokio::test]
    async fn test_frame_round_trip() {
        let (client, server) = tokio::io::duplex(4096);
        let (_, mut writer) = tokio::io::split(client);
        let (mut reader, _) = tokio::io::split(server);

        write_frame(&mut writer, b"hello").await.unwrap();
        let frame = read_frame(&mut reader).await.unwrap();
        assert_eq!(frame, b"hello");
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (client, server) = tokio::io::duplex(64);
        let (_, mut writer) = tokio::io::split(client);
        let (mut reader, _) = tokio::io::split(server);

        let bad_len = (MAX_FRAME_LEN + 1).to_le_bytes();
        writer.write_all(&bad_len).await.unwrap();
        writer.flush().await.unwrap();
        assert!(read_frame(&mut reader).await.is_err());
    }
}
