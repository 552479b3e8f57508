#![allow(dead_code)]

use instant::{Duration, Instant};
use mesh_session_p2p::{
    EndpointId, LivenessConfig, MemoryNetwork, MemoryTransport, MeshLoop, Transform,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Simulated time advanced per tick
pub const STEP: Duration = Duration::from_millis(100);

pub fn init_test_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

pub fn id(name: &str) -> EndpointId {
    EndpointId::parse(name).unwrap()
}

/// Test fixture: a set of mesh loops on one in-memory network, driven by a
/// simulated clock
pub struct MeshFixture {
    pub network: MemoryNetwork,
    pub names: Vec<String>,
    pub nodes: Vec<MeshLoop<MemoryTransport>>,
    pub now: Instant,
    config: LivenessConfig,
}

impl MeshFixture {
    pub fn new(names: &[&str]) -> Self {
        Self::with_config(names, LivenessConfig::default())
    }

    pub fn with_config(names: &[&str], config: LivenessConfig) -> Self {
        init_test_tracing();

        let mut fixture = Self {
            network: MemoryNetwork::new(),
            names: Vec::new(),
            nodes: Vec::new(),
            now: Instant::now(),
            config,
        };
        for name in names {
            fixture.add(name);
        }
        fixture
    }

    /// Open another endpoint on the network
    pub fn add(&mut self, name: &str) {
        let transport = self.network.open_as(id(name)).unwrap();
        self.names.push(name.to_string());
        self.nodes.push(MeshLoop::new(transport, self.config.clone()));
    }

    fn index(&self, name: &str) -> usize {
        self.names
            .iter()
            .position(|n| n == name)
            .unwrap_or_else(|| panic!("no node named {}", name))
    }

    pub fn node(&self, name: &str) -> &MeshLoop<MemoryTransport> {
        &self.nodes[self.index(name)]
    }

    pub fn node_mut(&mut self, name: &str) -> &mut MeshLoop<MemoryTransport> {
        let index = self.index(name);
        &mut self.nodes[index]
    }

    /// Remove a node; dropping it closes its channels and its endpoint
    pub fn remove(&mut self, name: &str) -> MeshLoop<MemoryTransport> {
        let index = self.index(name);
        self.names.remove(index);
        self.nodes.remove(index)
    }

    pub fn create_room(&mut self, name: &str) -> EndpointId {
        self.node_mut(name).create_room().unwrap()
    }

    pub fn join(&mut self, name: &str, room: &str) {
        let now = self.now;
        self.node_mut(name).join_room_at(&id(room), now).unwrap();
    }

    pub fn connect(&mut self, from: &str, to: &str) {
        let now = self.now;
        self.node_mut(from).connect_at(&id(to), now);
    }

    pub fn broadcast(&mut self, name: &str, position: [f32; 3], heading: f32) -> usize {
        self.node_mut(name)
            .broadcast_position(Transform::new(position, heading))
    }

    /// Advance the clock one step and poll every node, in insertion order
    pub fn tick(&mut self, count: usize) {
        for _ in 0..count {
            self.now += STEP;
            let now = self.now;
            for node in self.nodes.iter_mut() {
                node.poll_at(now);
            }
        }
    }

    /// Tick until `duration` of simulated time has passed
    pub fn advance(&mut self, duration: Duration) {
        let steps = (duration.as_millis() / STEP.as_millis()).max(1) as usize;
        self.tick(steps);
    }

    /// Enough ticks for announcements to propagate through a small mesh
    pub fn settle(&mut self) {
        self.tick(20);
    }

    /// Registry keys of a node, sorted
    pub fn peers_of(&self, name: &str) -> Vec<EndpointId> {
        let mut ids = self.node(name).registry().ids();
        ids.sort();
        ids
    }

    /// Every node holds exactly one open channel to every other node
    pub fn assert_full_mesh(&self) {
        let n = self.nodes.len();
        for name in &self.names {
            let node = self.node(name);
            assert_eq!(
                node.registry().len(),
                n - 1,
                "{} should have {} peers, has {:?}",
                name,
                n - 1,
                self.peers_of(name)
            );
            for other in self.names.iter().filter(|o| *o != name) {
                assert!(
                    node.registry().is_open(&id(other)),
                    "{} should have an open channel to {}",
                    name,
                    other
                );
            }
            assert!(
                node.pending_peers().is_empty(),
                "{} still has pending peers",
                name
            );
        }
    }

    /// Both ends of every pair hold the same channel
    pub fn assert_channels_agree(&self) {
        for a in &self.names {
            for b in self.names.iter().filter(|b| *b != a) {
                let ab = self.node(a).registry().get(&id(b)).map(|c| c.id);
                let ba = self.node(b).registry().get(&id(a)).map(|c| c.id);
                assert_eq!(ab, ba, "{} and {} disagree on their channel", a, b);
            }
        }
    }

    pub fn print_state(&self) {
        println!("\n📊 Current State:");
        for name in &self.names {
            let node = self.node(name);
            println!(
                "   {} ({}): peers {:?}, pending {}, participants {}",
                name,
                node.room_state(),
                self.peers_of(name),
                node.pending_peers().len(),
                node.participants().len()
            );
        }
    }
}
