use crate::infrastructure::error::Result;
use mesh_session_core::{EndpointId, Timestamp, Vec3};
use serde::{Deserialize, Serialize};

/// Wire messages exchanged over a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MeshMessage {
    /// Joiner → host/member: request current membership
    JoinRoom {
        #[serde(rename = "peerId")]
        peer_id: EndpointId,
    },

    /// Recipient → joiner: full membership snapshot
    RoomPeers { peers: Vec<EndpointId> },

    /// Member → other members: someone new joined
    NewPeer {
        #[serde(rename = "peerId")]
        peer_id: EndpointId,
    },

    /// Periodic state sync
    Position {
        position: Vec3,
        heading: f32,
        timestamp: Timestamp,
    },

    /// Liveness probe
    Ping { timestamp: Timestamp },

    /// Liveness response echoing the probe's timestamp
    Pong { timestamp: Timestamp },
}

impl MeshMessage {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Liveness traffic stays out of regular logs
    pub fn is_probe(&self) -> bool {
        matches!(self, MeshMessage::Ping { .. } | MeshMessage::Pong { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MeshMessage::JoinRoom { .. } => "join-room",
            MeshMessage::RoomPeers { .. } => "room-peers",
            MeshMessage::NewPeer { .. } => "new-peer",
            MeshMessage::Position { .. } => "position",
            MeshMessage::Ping { .. } => "ping",
            MeshMessage::Pong { .. } => "pong",
        }
    }
}
