use crate::domain::ChannelId;
use mesh_session_core::{CoreError, EndpointId};

/// P2P mesh errors
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Refusing to connect to own endpoint {0}")]
    SelfConnect(EndpointId),

    #[error("Unknown channel {0}")]
    UnknownChannel(ChannelId),

    #[error("Channel {0} is closed")]
    ChannelClosed(ChannelId),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Room error: {0}")]
    Room(#[from] CoreError),

    #[error("Session is disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, MeshError>;
