// Domain layer (channels, registry, pending set)
pub mod domain;

// Application layer (mesh loop, liveness, runtime, session)
pub mod application;

// Infrastructure layer (transports, wire format)
pub mod infrastructure;

// Re-exports for convenience
pub use application::{
    LivenessAction, LivenessConfig, LivenessMonitor, MeshCommand, MeshConfig, MeshLoop,
    MeshSnapshot,
};
#[cfg(feature = "native")]
pub use application::{MeshRuntime, MeshSession};
pub use domain::{Channel, ChannelId, ChannelRegistry, ChannelStatus, IceServer, PendingPeers, PutOutcome};
pub use infrastructure::error::{MeshError, Result};
pub use infrastructure::{
    LinkState, MatchboxTransport, MemoryNetwork, MemoryTransport, MeshMessage, SignallingConfig,
    Transport, TransportEvent,
};
pub use mesh_session_core::{EndpointId, ParticipantTable, RemoteParticipant, RoomState, Transform, Vec3};
