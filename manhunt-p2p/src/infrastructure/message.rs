use crate::infrastructure::error::Result;
use manhunt_core::{Player, Room, RoundResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery guarantees requested for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryClass {
    /// Must arrive, in send order per sender
    Reliable,
    /// May be dropped or reordered under pressure
    BestEffort,
}

/// Wire envelope: per-sender sequence number, delivery class, payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub sequence: u64,
    pub channel: DeliveryClass,
    #[serde(flatten)]
    pub payload: MessagePayload,
}

/// The closed set of messages peers exchange.
///
/// There is no removal message on purpose: a kicked or dropped member learns
/// about it from the next room snapshot that no longer contains them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MessagePayload {
    /// Announce or update the sending player (join request, ready toggle)
    #[serde(rename = "player_info")]
    PlayerInfo { player: Player },

    /// A coordinate report. Timestamp disambiguates reordered samples.
    #[serde(rename = "position_update")]
    PositionUpdate {
        player_id: Uuid,
        lat: f64,
        lon: f64,
        timestamp_ms: u64,
    },

    /// Full room state, host to everyone. Last received wins.
    #[serde(rename = "room_snapshot")]
    RoomSnapshot { room: Room },

    /// Round start with roles assigned, host to everyone
    #[serde(rename = "game_start")]
    GameStart { room: Room },

    /// A catch detected on the sending device
    #[serde(rename = "player_caught")]
    PlayerCaught { player_id: Uuid },

    /// Round outcome decided on the sending device
    #[serde(rename = "game_end")]
    GameEnd { result: RoundResult },
}

impl MessagePayload {
    /// Positions tolerate loss; everything else must arrive
    pub fn delivery_class(&self) -> DeliveryClass {
        match self {
            MessagePayload::PositionUpdate { .. } => DeliveryClass::BestEffort,
            _ => DeliveryClass::Reliable,
        }
    }
}

impl WireMessage {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
