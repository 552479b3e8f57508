use crate::domain::EndpointId;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Room membership of the local participant.
///
/// `Idle → Hosting | Joining → Member → Left`. A room is identified by its
/// creator's endpoint ID, so `Hosting` needs no room field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoomState {
    #[default]
    Idle,
    /// We created the room; its ID is our own endpoint ID
    Hosting,
    /// Dialing the room's creator (or any member reachable under that ID)
    Joining { room: EndpointId },
    /// Channel to the room is open; peer discovery may still be running
    Member { room: EndpointId },
    Left,
}

/// A state change, reported for logging and snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomTransition {
    pub from: RoomState,
    pub to: RoomState,
}

impl RoomTransition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

impl RoomState {
    /// Room we are in (or trying to get into)
    pub fn room_id(&self, local: &EndpointId) -> Option<EndpointId> {
        match self {
            RoomState::Hosting => Some(local.clone()),
            RoomState::Joining { room } | RoomState::Member { room } => Some(room.clone()),
            RoomState::Idle | RoomState::Left => None,
        }
    }

    /// Whether we are part of a room and should answer join requests and announcements
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RoomState::Hosting | RoomState::Joining { .. } | RoomState::Member { .. }
        )
    }

    pub fn is_hosting(&self) -> bool {
        matches!(self, RoomState::Hosting)
    }

    /// Create a room under our own endpoint ID
    pub fn create(&mut self) -> Result<RoomTransition> {
        match self {
            RoomState::Idle | RoomState::Left | RoomState::Hosting => {
                Ok(self.transition(RoomState::Hosting))
            }
            RoomState::Joining { .. } | RoomState::Member { .. } => {
                Err(CoreError::InvalidRoomTransition {
                    action: "create a room",
                    state: self.clone(),
                })
            }
        }
    }

    /// Start joining `room`. Joining our own ID means hosting.
    pub fn join(&mut self, room: EndpointId, local: &EndpointId) -> Result<RoomTransition> {
        if &room == local {
            return self.create();
        }

        match self {
            RoomState::Idle | RoomState::Left => Ok(self.transition(RoomState::Joining { room })),
            RoomState::Joining { room: current } | RoomState::Member { room: current }
                if *current == room =>
            {
                Ok(self.transition(self.clone()))
            }
            _ => Err(CoreError::InvalidRoomTransition {
                action: "join another room",
                state: self.clone(),
            }),
        }
    }

    /// A channel to `remote` opened. Returns `true` if this completes a pending join,
    /// in which case the caller sends the join request.
    pub fn channel_opened(&mut self, remote: &EndpointId) -> bool {
        match self {
            RoomState::Joining { room } if room == remote => {
                let room = room.clone();
                self.transition(RoomState::Member { room });
                true
            }
            _ => false,
        }
    }

    /// The connect attempt to the room failed before it opened
    pub fn join_failed(&mut self, remote: &EndpointId) -> bool {
        match self {
            RoomState::Joining { room } if room == remote => {
                self.transition(RoomState::Idle);
                true
            }
            _ => false,
        }
    }

    /// An idle endpoint that receives a join request becomes the host of its own room
    pub fn adopt_as_host(&mut self) -> bool {
        if matches!(self, RoomState::Idle) {
            self.transition(RoomState::Hosting);
            true
        } else {
            false
        }
    }

    /// Leave the current room. Idempotent.
    pub fn leave(&mut self) -> RoomTransition {
        match self {
            RoomState::Idle | RoomState::Left => self.transition(self.clone()),
            _ => self.transition(RoomState::Left),
        }
    }

    fn transition(&mut self, to: RoomState) -> RoomTransition {
        let from = std::mem::replace(self, to.clone());
        RoomTransition { from, to }
    }
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomState::Idle => write!(f, "idle"),
            RoomState::Hosting => write!(f, "hosting"),
            RoomState::Joining { room } => write!(f, "joining {}", room),
            RoomState::Member { room } => write!(f, "member of {}", room),
            RoomState::Left => write!(f, "left"),
        }
    }
}
