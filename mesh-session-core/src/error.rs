use crate::domain::RoomState;

/// Domain errors for identities and room state
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid endpoint ID: {0}")]
    InvalidEndpointId(String),

    #[error("Cannot {action} while {state}")]
    InvalidRoomTransition {
        action: &'static str,
        state: RoomState,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;
