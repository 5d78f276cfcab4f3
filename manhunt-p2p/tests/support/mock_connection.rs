use manhunt_p2p::{Connection, ConnectionEvent, P2PError, PeerId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

type Inbox = Arc<Mutex<VecDeque<(PeerId, Vec<u8>)>>>;

/// Shared in-memory network: every registered peer is linked to every other
pub struct MockNetwork {
    peers: HashMap<PeerId, Inbox>,
    events: VecDeque<(PeerId, ConnectionEvent)>,
}

pub fn create_mock_network() -> Arc<Mutex<MockNetwork>> {
    Arc::new(Mutex::new(MockNetwork {
        peers: HashMap::new(),
        events: VecDeque::new(),
    }))
}

/// In-memory [`Connection`] with synchronous delivery.
///
/// Advertise/browse are recorded but links form eagerly at creation; the
/// delivery-class machinery above this layer is what the tests exercise.
pub struct MockConnection {
    local_id: PeerId,
    network: Arc<Mutex<MockNetwork>>,
    inbox: Inbox,
    hosting: Option<String>,
    browsing: bool,
}

impl MockConnection {
    pub fn new(network: Arc<Mutex<MockNetwork>>) -> Self {
        let local_id = PeerId::random();
        let inbox: Inbox = Arc::new(Mutex::new(VecDeque::new()));

        let mut net = network.lock().unwrap();
        let existing: Vec<PeerId> = net.peers.keys().copied().collect();
        net.peers.insert(local_id, inbox.clone());
        for peer in existing {
            net.events
                .push_back((local_id, ConnectionEvent::PeerConnected(peer)));
            net.events
                .push_back((peer, ConnectionEvent::PeerConnected(local_id)));
        }
        drop(net);

        Self {
            local_id,
            network,
            inbox,
            hosting: None,
            browsing: false,
        }
    }

    pub fn hosting(&self) -> Option<&str> {
        self.hosting.as_deref()
    }
}

impl Connection for MockConnection {
    fn local_peer_id(&self) -> PeerId {
        self.local_id
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        self.network
            .lock()
            .unwrap()
            .peers
            .keys()
            .filter(|&&id| id != self.local_id)
            .copied()
            .collect()
    }

    fn start_hosting(&mut self, room_code: &str) -> Result<(), P2PError> {
        self.hosting = Some(room_code.to_string());
        Ok(())
    }

    fn stop_hosting(&mut self) {
        self.hosting = None;
    }

    fn start_browsing(&mut self) -> Result<(), P2PError> {
        self.browsing = true;
        Ok(())
    }

    fn stop_browsing(&mut self) {
        self.browsing = false;
    }

    fn send_to(&mut self, peer: PeerId, data: Vec<u8>) -> Result<(), P2PError> {
        let network = self.network.lock().unwrap();
        let inbox = network.peers.get(&peer).ok_or(P2PError::PeerNotFound(peer))?;
        inbox.lock().unwrap().push_back((self.local_id, data));
        Ok(())
    }

    fn broadcast(&mut self, data: Vec<u8>) -> Result<(), P2PError> {
        for peer in self.connected_peers() {
            self.send_to(peer, data.clone())?;
        }
        Ok(())
    }

    fn disconnect_all(&mut self) {
        let mut net = self.network.lock().unwrap();
        net.peers.remove(&self.local_id);
        let remaining: Vec<PeerId> = net.peers.keys().copied().collect();
        for peer in remaining {
            net.events
                .push_back((peer, ConnectionEvent::PeerDisconnected(self.local_id)));
            net.events
                .push_back((self.local_id, ConnectionEvent::PeerDisconnected(peer)));
        }
        self.inbox.lock().unwrap().clear();
    }

    fn poll_events(&mut self) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();

        let mut net = self.network.lock().unwrap();
        let mut remaining = VecDeque::new();
        for (target, event) in net.events.drain(..) {
            if target == self.local_id {
                events.push(event);
            } else {
                remaining.push_back((target, event));
            }
        }
        net.events = remaining;
        drop(net);

        let mut inbox = self.inbox.lock().unwrap();
        while let Some((from, data)) = inbox.pop_front() {
            events.push(ConnectionEvent::MessageReceived { from, data });
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peers_link_eagerly() {
        let network = create_mock_network();
        let peer1 = MockConnection::new(network.clone());
        let mut peer2 = MockConnection::new(network.clone());

        assert_eq!(peer1.connected_peers(), vec![peer2.local_peer_id()]);
        let events = peer2.poll_events();
        assert!(matches!(events[0], ConnectionEvent::PeerConnected(p) if p == peer1.local_peer_id()));
    }

    #[test]
    fn test_broadcast_reaches_everyone() {
        let network = create_mock_network();
        let mut sender = MockConnection::new(network.clone());
        let mut a = MockConnection::new(network.clone());
        let mut b = MockConnection::new(network.clone());

        sender.broadcast(b"hi".to_vec()).unwrap();

        for conn in [&mut a, &mut b] {
            let got = conn
                .poll_events()
                .into_iter()
                .any(|e| matches!(e, ConnectionEvent::MessageReceived { ref data, .. } if data == b"hi"));
            assert!(got);
        }
    }

    #[test]
    fn test_disconnect_notifies_peers() {
        let network = create_mock_network();
        let mut leaver = MockConnection::new(network.clone());
        let mut stayer = MockConnection::new(network.clone());

        leaver.disconnect_all();
        let saw_disconnect = stayer
            .poll_events()
            .into_iter()
            .any(|e| matches!(e, ConnectionEvent::PeerDisconnected(p) if p == leaver.local_peer_id()));
        assert!(saw_disconnect);
        assert!(stayer.connected_peers().is_empty());
    }
}
