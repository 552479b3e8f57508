pub mod domain;
pub mod error;

pub use domain::{
    EndpointId, ParticipantTable, RemoteParticipant, RoomState, RoomTransition, Timestamp,
    Transform, Vec3,
};
pub use error::{CoreError, Result};
