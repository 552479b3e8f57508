use crate::application::liveness::LivenessConfig;
use crate::domain::IceServer;
use crate::infrastructure::SignallingConfig;
use instant::Duration;
use serde::Deserialize;

/// Floor for the poll and ping periods
const MIN_INTERVAL_MS: u64 = 1;

/// Configuration for a mesh session
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Matchbox signalling server URL
    pub signalling_server: String,

    /// Prefix for per-endpoint inbox rooms on the signalling server
    pub room_namespace: String,

    pub ice_servers: Vec<IceServer>,

    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,

    pub ping_interval_ms: u64,

    /// How long a disconnected channel may recover before it counts as lost
    pub grace_period_ms: u64,

    /// Unanswered ping older than this marks the channel as lost.
    /// Defaults to twice the ping interval when unset.
    pub pong_timeout_ms: Option<u64>,

    pub connect_timeout_ms: u64,

    /// `None` retries lost peers for as long as the session lives
    pub max_reconnect_attempts: Option<u32>,

    /// Capacity of the runtime command inbox
    pub command_queue_size: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            signalling_server: "wss://match.konnektoren.help".to_string(),
            room_namespace: "mesh".to_string(),
            ice_servers: IceServer::default_stun_servers(),
            poll_interval_ms: 100,
            ping_interval_ms: 10_000,
            grace_period_ms: 2_000,
            pong_timeout_ms: None,
            connect_timeout_ms: 10_000,
            max_reconnect_attempts: None,
            command_queue_size: 100,
        }
    }
}

impl MeshConfig {
    pub fn new(signalling_server: String) -> Self {
        Self {
            signalling_server,
            ..Default::default()
        }
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_room_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.room_namespace = namespace.into();
        self
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServer>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    pub fn with_ping_interval(mut self, ms: u64) -> Self {
        self.ping_interval_ms = ms;
        self
    }

    pub fn with_grace_period(mut self, ms: u64) -> Self {
        self.grace_period_ms = ms;
        self
    }

    pub fn with_pong_timeout(mut self, ms: u64) -> Self {
        self.pong_timeout_ms = Some(ms);
        self
    }

    pub fn with_connect_timeout(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    pub fn with_command_queue_size(mut self, size: usize) -> Self {
        self.command_queue_size = size;
        self
    }

    /// Never zero: a zero period would stall the runtime timer
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_INTERVAL_MS))
    }

    pub fn liveness(&self) -> LivenessConfig {
        let ping_interval = Duration::from_millis(self.ping_interval_ms.max(MIN_INTERVAL_MS));
        LivenessConfig {
            ping_interval,
            grace_period: Duration::from_millis(self.grace_period_ms),
            pong_timeout: self
                .pong_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(ping_interval * 2),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            max_reconnect_attempts: self.max_reconnect_attempts,
        }
    }

    pub fn signalling(&self) -> SignallingConfig {
        SignallingConfig {
            server: self.signalling_server.clone(),
            namespace: self.room_namespace.clone(),
            ice_servers: self.ice_servers.clone(),
            open_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }
}
