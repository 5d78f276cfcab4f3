use crate::domain::PeerId;
use crate::infrastructure::connection_trait::{Connection, ConnectionEvent};
use crate::infrastructure::error::Result;
use crate::infrastructure::message::{DeliveryClass, MessagePayload, WireMessage};
use std::collections::{BTreeMap, HashMap};

/// Events handed up to the session runtime
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    PeerJoined(PeerId),
    PeerLeft(PeerId),
    Payload { from: PeerId, payload: MessagePayload },
}

/// Per-peer inbound bookkeeping
#[derive(Debug, Default)]
struct InboundState {
    /// Last reliable sequence delivered from this peer
    delivered: u64,
    /// Reliable messages that arrived ahead of a gap
    buffered: BTreeMap<u64, MessagePayload>,
    /// Highest best-effort sequence seen from this peer
    latest_best_effort: u64,
}

/// Message-level transport on top of a raw [`Connection`].
///
/// Assigns per-sender sequence numbers on the way out and enforces the two
/// delivery classes on the way in: reliable payloads are delivered exactly
/// once in send order (buffering ahead of gaps, dropping duplicates),
/// best-effort payloads are delivered at most once with stale ones dropped.
pub struct PeerTransport<C: Connection> {
    connection: C,
    next_reliable: u64,
    next_best_effort: u64,
    inbound: HashMap<PeerId, InboundState>,
}

impl<C: Connection> PeerTransport<C> {
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            next_reliable: 1,
            next_best_effort: 1,
            inbound: HashMap::new(),
        }
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.connection.local_peer_id()
    }

    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.connection.connected_peers()
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    /// Broadcast a payload under its delivery class.
    ///
    /// A failed best-effort send is dropped silently; that is the contract
    /// of the class. Reliable failures propagate.
    pub fn broadcast(&mut self, payload: MessagePayload) -> Result<()> {
        let msg = self.envelope(payload);
        let data = msg.encode()?;
        match msg.channel {
            DeliveryClass::Reliable => self.connection.broadcast(data),
            DeliveryClass::BestEffort => {
                if let Err(err) = self.connection.broadcast(data) {
                    tracing::debug!(%err, "best-effort broadcast dropped");
                }
                Ok(())
            }
        }
    }

    /// Send a payload to one peer
    pub fn send_to(&mut self, peer: PeerId, payload: MessagePayload) -> Result<()> {
        let msg = self.envelope(payload);
        let data = msg.encode()?;
        match msg.channel {
            DeliveryClass::Reliable => self.connection.send_to(peer, data),
            DeliveryClass::BestEffort => {
                if let Err(err) = self.connection.send_to(peer, data) {
                    tracing::debug!(%peer, %err, "best-effort send dropped");
                }
                Ok(())
            }
        }
    }

    /// Drain the connection and return ordered, deduplicated events
    pub fn poll(&mut self) -> Vec<TransportEvent> {
        let mut out = Vec::new();
        for event in self.connection.poll_events() {
            match event {
                ConnectionEvent::PeerConnected(peer) => {
                    self.inbound.entry(peer).or_default();
                    out.push(TransportEvent::PeerJoined(peer));
                }
                ConnectionEvent::PeerDisconnected(peer) => {
                    self.inbound.remove(&peer);
                    out.push(TransportEvent::PeerLeft(peer));
                }
                ConnectionEvent::MessageReceived { from, data } => {
                    match WireMessage::decode(&data) {
                        Ok(msg) => self.accept(from, msg, &mut out),
                        Err(err) => {
                            // Malformed bytes never reach the session layer
                            tracing::warn!(%from, %err, "dropping malformed message");
                        }
                    }
                }
            }
        }
        out
    }

    fn envelope(&mut self, payload: MessagePayload) -> WireMessage {
        let channel = payload.delivery_class();
        let sequence = match channel {
            DeliveryClass::Reliable => {
                let seq = self.next_reliable;
                self.next_reliable += 1;
                seq
            }
            DeliveryClass::BestEffort => {
                let seq = self.next_best_effort;
                self.next_best_effort += 1;
                seq
            }
        };
        WireMessage {
            sequence,
            channel,
            payload,
        }
    }

    fn accept(&mut self, from: PeerId, msg: WireMessage, out: &mut Vec<TransportEvent>) {
        let state = self.inbound.entry(from).or_default();
        match msg.channel {
            DeliveryClass::BestEffort => {
                if msg.sequence <= state.latest_best_effort {
                    tracing::trace!(%from, seq = msg.sequence, "stale best-effort dropped");
                    return;
                }
                state.latest_best_effort = msg.sequence;
                out.push(TransportEvent::Payload {
                    from,
                    payload: msg.payload,
                });
            }
            DeliveryClass::Reliable => {
                if msg.sequence <= state.delivered {
                    tracing::trace!(%from, seq = msg.sequence, "duplicate reliable dropped");
                    return;
                }
                if msg.sequence > state.delivered + 1 {
                    tracing::debug!(
                        %from,
                        seq = msg.sequence,
                        expected = state.delivered + 1,
                        "reliable message buffered ahead of gap"
                    );
                    state.buffered.insert(msg.sequence, msg.payload);
                    return;
                }

                state.delivered = msg.sequence;
                out.push(TransportEvent::Payload {
                    from,
                    payload: msg.payload,
                });
                while let Some(payload) = state.buffered.remove(&(state.delivered + 1)) {
                    state.delivered += 1;
                    out.push(TransportEvent::Payload { from, payload });
                }
            }
        }
    }
}
