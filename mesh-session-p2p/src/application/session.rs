use crate::application::runtime::{MeshRuntime, MeshSnapshot};
use crate::application::{MeshConfig, MeshLoop};
use crate::infrastructure::error::Result;
use crate::infrastructure::{MatchboxTransport, Transport};
use mesh_session_core::{EndpointId, Transform, Vec3};
use tokio::sync::watch;

/// Application service: the public surface handed to the rendering/UI layer.
///
/// Opening never fails from the caller's point of view. If the transport
/// cannot be established the session stays visibly disconnected, every room
/// operation is a logged no-op, and [`MeshSession::reopen`] can retry.
pub struct MeshSession {
    config: MeshConfig,
    runtime: Option<MeshRuntime>,
    last_error: Option<String>,
}

impl MeshSession {
    /// Open over the matchbox signalling server from `config`
    pub async fn open(config: MeshConfig) -> Self {
        let transport = MatchboxTransport::open(config.signalling()).await;
        Self::from_transport(transport, config)
    }

    /// Start a session from the outcome of opening any transport
    pub fn from_transport<T>(transport: Result<T>, config: MeshConfig) -> Self
    where
        T: Transport + Send + 'static,
    {
        let mut session = Self {
            config,
            runtime: None,
            last_error: None,
        };
        session.attach(transport);
        session
    }

    /// Retry opening over matchbox after a failure. No-op while connected.
    pub async fn reopen(&mut self) {
        if self.is_connected() {
            return;
        }
        let transport = MatchboxTransport::open(self.config.signalling()).await;
        self.attach(transport);
    }

    /// Retry with an already opened transport. No-op while connected.
    pub fn reopen_with<T>(&mut self, transport: Result<T>)
    where
        T: Transport + Send + 'static,
    {
        if self.is_connected() {
            return;
        }
        self.attach(transport);
    }

    fn attach<T>(&mut self, transport: Result<T>)
    where
        T: Transport + Send + 'static,
    {
        match transport {
            Ok(transport) => {
                let mesh_loop = MeshLoop::new(transport, self.config.liveness());
                tracing::info!("✅ Session open as {}", mesh_loop.local_id());
                self.runtime = Some(MeshRuntime::spawn(mesh_loop, &self.config));
                self.last_error = None;
            }
            Err(e) => {
                tracing::error!("❌ Session disconnected: {}", e);
                self.runtime = None;
                self.last_error = Some(e.to_string());
            }
        }
    }

    /// Connection status flag
    pub fn is_connected(&self) -> bool {
        self.runtime.as_ref().is_some_and(MeshRuntime::is_running)
    }

    pub fn local_id(&self) -> Option<&EndpointId> {
        self.runtime.as_ref().map(MeshRuntime::local_id)
    }

    /// Why the last open attempt failed
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Host a room; its identifier is our endpoint ID.
    /// `None` while disconnected, joining, or a member of another room.
    pub fn create_room(&self) -> Option<EndpointId> {
        let runtime = self.runtime("create room")?;
        runtime
            .create_room()
            .map_err(|e| tracing::warn!("create room: {}", e))
            .ok()
    }

    pub fn join_room(&self, room: &EndpointId) {
        if let Some(runtime) = self.runtime("join room") {
            if let Err(e) = runtime.join_room(room.clone()) {
                tracing::warn!("join room: {}", e);
            }
        }
    }

    pub fn leave_room(&self) {
        if let Some(runtime) = self.runtime("leave room") {
            if let Err(e) = runtime.leave_room() {
                tracing::warn!("leave room: {}", e);
            }
        }
    }

    pub fn broadcast_position(&self, position: Vec3, heading: f32) {
        let Some(runtime) = self.runtime.as_ref() else {
            // Called every frame; stay quiet while disconnected
            return;
        };
        if let Err(e) = runtime.broadcast_position(Transform::new(position, heading)) {
            tracing::trace!("broadcast position: {}", e);
        }
    }

    /// Latest mesh state (participants, room, status)
    pub fn snapshot(&self) -> MeshSnapshot {
        self.runtime
            .as_ref()
            .map(MeshRuntime::snapshot)
            .unwrap_or_default()
    }

    pub fn subscribe(&self) -> Option<watch::Receiver<MeshSnapshot>> {
        self.runtime.as_ref().map(MeshRuntime::subscribe)
    }

    /// Current room identifier, if any
    pub fn room_id(&self) -> Option<EndpointId> {
        self.snapshot().room_id
    }

    /// Tear down: leave the room, close every channel, drop the endpoint
    pub async fn close(mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown().await;
        }
    }

    fn runtime(&self, operation: &str) -> Option<&MeshRuntime> {
        if self.runtime.is_none() {
            tracing::warn!("⚠️  Cannot {} while disconnected", operation);
        }
        self.runtime.as_ref()
    }
}
