use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in world space (x, y, z)
pub type Vec3 = [f32; 3];

/// Wall-clock timestamp in milliseconds since the UNIX epoch.
///
/// Only informational on the wire: peers' clocks are not synchronized, so
/// nothing orders updates by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn now() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        Timestamp(u64::try_from(millis).unwrap_or_default())
    }

    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Local state broadcast to the mesh: where a participant stands and which way it faces
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    /// Rotation around the vertical axis, in radians
    pub heading: f32,
}

impl Transform {
    pub const ORIGIN: Transform = Transform {
        position: [0.0, 0.0, 0.0],
        heading: 0.0,
    };

    pub fn new(position: Vec3, heading: f32) -> Self {
        Self { position, heading }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::ORIGIN
    }
}

/// Last known state of a remote participant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RemoteParticipant {
    pub transform: Transform,
    /// Sender's timestamp of the last applied update (`None` while seeded at origin)
    pub last_update: Option<Timestamp>,
}

impl RemoteParticipant {
    /// Placeholder record for a peer we are connected to but have not heard from yet
    pub fn at_origin() -> Self {
        Self {
            transform: Transform::ORIGIN,
            last_update: None,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    pub fn heading(&self) -> f32 {
        self.transform.heading
    }
}
