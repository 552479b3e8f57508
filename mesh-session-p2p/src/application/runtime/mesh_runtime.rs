use crate::application::runtime::{MeshCommand, MeshSnapshot};
use crate::application::{MeshConfig, MeshLoop};
use crate::infrastructure::error::{MeshError, Result};
use crate::infrastructure::Transport;
use mesh_session_core::{EndpointId, Transform};
use tokio::sync::{mpsc, watch};

/// Background runtime for a [`MeshLoop`].
///
/// The loop lives in its own task and is the only owner of mesh state.
/// Callers talk to it through a bounded command inbox and read the latest
/// [`MeshSnapshot`] from a watch channel.
pub struct MeshRuntime {
    local_id: EndpointId,

    /// Send commands to the loop
    cmd_tx: mpsc::Sender<MeshCommand>,

    /// Receive state snapshots (latest always available)
    state_rx: watch::Receiver<MeshSnapshot>,

    /// Handle to background task
    task_handle: tokio::task::JoinHandle<()>,
}

impl MeshRuntime {
    /// Spawn the loop onto the current tokio runtime
    pub fn spawn<T>(mut mesh_loop: MeshLoop<T>, config: &MeshConfig) -> Self
    where
        T: Transport + Send + 'static,
    {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<MeshCommand>(config.command_queue_size.max(1));
        let (state_tx, state_rx) = watch::channel(MeshSnapshot::capture(&mesh_loop));

        let local_id = mesh_loop.local_id().clone();
        let poll_interval = config.poll_interval();

        let task_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!("MeshRuntime started for endpoint {}", mesh_loop.local_id());

            loop {
                interval.tick().await;

                // 1. Process incoming commands
                let mut stop = false;
                loop {
                    match cmd_rx.try_recv() {
                        Ok(MeshCommand::Shutdown) => {
                            stop = true;
                            break;
                        }
                        Ok(cmd) => apply_command(&mut mesh_loop, cmd),
                        Err(mpsc::error::TryRecvError::Empty) => break,
                        // Every handle is gone
                        Err(mpsc::error::TryRecvError::Disconnected) => {
                            stop = true;
                            break;
                        }
                    }
                }

                if stop {
                    mesh_loop.leave_room();
                    state_tx.send_replace(MeshSnapshot::disconnected(Some(
                        mesh_loop.local_id().clone(),
                    )));
                    tracing::info!("MeshRuntime stopped for endpoint {}", mesh_loop.local_id());
                    break;
                }

                // 2. Poll transport + liveness
                let processed = mesh_loop.poll();

                if processed > 0 {
                    tracing::trace!("MeshRuntime processed {} events", processed);
                }

                // 3. Publish snapshot (only if changed)
                let snapshot = MeshSnapshot::capture(&mesh_loop);
                state_tx.send_if_modified(|current| {
                    if *current == snapshot {
                        false
                    } else {
                        *current = snapshot;
                        true
                    }
                });
            }
        });

        Self {
            local_id,
            cmd_tx,
            state_rx,
            task_handle,
        }
    }

    pub fn local_id(&self) -> &EndpointId {
        &self.local_id
    }

    /// Submit a command without waiting.
    ///
    /// A full inbox drops position updates (the next one supersedes them);
    /// any other command is reported as a send failure.
    pub fn submit(&self, cmd: MeshCommand) -> Result<()> {
        match self.cmd_tx.try_send(cmd) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(cmd)) if cmd.is_droppable() => {
                tracing::trace!("Command inbox full, dropping {:?}", cmd);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(cmd)) => Err(MeshError::SendFailed(format!(
                "command inbox full, dropped {:?}",
                cmd
            ))),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(MeshError::Disconnected),
        }
    }

    /// Host a room under our own endpoint ID.
    ///
    /// Refused up front when the latest snapshot shows us joining or in another
    /// room. A join submitted but not yet applied is not visible here; the loop
    /// then rejects the create and logs it.
    pub fn create_room(&self) -> Result<EndpointId> {
        let mut state = self.snapshot().room_state;
        state.create()?;

        self.submit(MeshCommand::CreateRoom)?;
        Ok(self.local_id.clone())
    }

    pub fn join_room(&self, room: EndpointId) -> Result<()> {
        self.submit(MeshCommand::JoinRoom(room))
    }

    pub fn leave_room(&self) -> Result<()> {
        self.submit(MeshCommand::LeaveRoom)
    }

    pub fn broadcast_position(&self, transform: Transform) -> Result<()> {
        self.submit(MeshCommand::BroadcastPosition(transform))
    }

    /// Get latest state snapshot (never blocks)
    pub fn snapshot(&self) -> MeshSnapshot {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<MeshSnapshot> {
        self.state_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task_handle.is_finished()
    }

    /// Leave the room, close every channel and stop the loop
    pub async fn shutdown(self) {
        if self.cmd_tx.send(MeshCommand::Shutdown).await.is_err() {
            self.task_handle.abort();
        }
        let _ = self.task_handle.await;
    }
}

fn apply_command<T: Transport>(mesh_loop: &mut MeshLoop<T>, cmd: MeshCommand) {
    let result = match cmd {
        MeshCommand::CreateRoom => mesh_loop.create_room().map(|_| ()),
        MeshCommand::JoinRoom(room) => mesh_loop.join_room(&room),
        MeshCommand::LeaveRoom => {
            mesh_loop.leave_room();
            Ok(())
        }
        MeshCommand::BroadcastPosition(transform) => {
            mesh_loop.broadcast_position(transform);
            Ok(())
        }
        MeshCommand::Shutdown => Ok(()),
    };

    if let Err(e) = result {
        tracing::error!("Failed to apply command: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::LivenessConfig;
    use crate::infrastructure::MemoryNetwork;
    use mesh_session_core::RoomState;

    #[tokio::test(start_paused = true)]
    async fn test_full_inbox_drops_positions_only() {
        let network = MemoryNetwork::new();
        let transport = network.open().unwrap();
        let config = MeshConfig::default()
            .with_command_queue_size(1)
            .with_poll_interval(60_000);
        let runtime = MeshRuntime::spawn(MeshLoop::new(transport, LivenessConfig::default()), &config);

        runtime.submit(MeshCommand::LeaveRoom).unwrap();
        assert!(runtime.broadcast_position(Transform::ORIGIN).is_ok());
        assert!(matches!(
            runtime.submit(MeshCommand::CreateRoom),
            Err(MeshError::SendFailed(_))
        ));

        runtime.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_poll_interval_keeps_running() {
        let network = MemoryNetwork::new();
        let transport = network.open().unwrap();
        let config = MeshConfig::default().with_poll_interval(0);
        let runtime = MeshRuntime::spawn(MeshLoop::new(transport, config.liveness()), &config);

        runtime.create_room().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(runtime.is_running());
        assert_eq!(runtime.snapshot().room_state, RoomState::Hosting);
        runtime.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_room_refused_while_member() {
        let network = MemoryNetwork::new();
        let config = MeshConfig::default();
        let alice = network.open_as(EndpointId::parse("alice").unwrap()).unwrap();
        let bob = network.open_as(EndpointId::parse("bob").unwrap()).unwrap();
        let host = MeshRuntime::spawn(MeshLoop::new(alice, config.liveness()), &config);
        let guest = MeshRuntime::spawn(MeshLoop::new(bob, config.liveness()), &config);

        host.create_room().unwrap();
        guest.join_room(host.local_id().clone()).unwrap();

        let mut updates = guest.subscribe();
        let joined = matches!(
            tokio::time::timeout(
                std::time::Duration::from_secs(5),
                updates.wait_for(|s| matches!(s.room_state, RoomState::Member { .. })),
            )
            .await,
            Ok(Ok(_))
        );
        assert!(joined);

        assert!(matches!(guest.create_room(), Err(MeshError::Room(_))));

        guest.shutdown().await;
        host.shutdown().await;
    }
}
