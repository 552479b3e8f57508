use cucumber::World;
use instant::{Duration, Instant};
use mesh_session_p2p::{EndpointId, LivenessConfig, MemoryNetwork, MemoryTransport, MeshLoop};
use std::collections::BTreeMap;
use std::fmt;

/// Simulated time advanced per tick
pub const STEP: Duration = Duration::from_millis(100);

/// Ticks that let announcements propagate through a small mesh
pub const SETTLE_TICKS: usize = 20;

#[derive(World)]
pub struct MeshWorld {
    /// In-process network shared by every endpoint
    pub network: MemoryNetwork,

    /// Mesh loops under test, polled in name order
    pub nodes: BTreeMap<String, MeshLoop<MemoryTransport>>,

    /// Simulated clock
    pub now: Instant,

    pub liveness: LivenessConfig,

    /// Peers reached by the last broadcast
    pub last_broadcast_reach: Option<usize>,
}

impl Default for MeshWorld {
    fn default() -> Self {
        Self {
            network: MemoryNetwork::new(),
            nodes: BTreeMap::new(),
            now: Instant::now(),
            liveness: LivenessConfig::default(),
            last_broadcast_reach: None,
        }
    }
}

impl fmt::Debug for MeshWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, node) in &self.nodes {
            map.entry(
                name,
                &format!(
                    "{} peers={:?} pending={} participants={}",
                    node.room_state(),
                    node.registry().ids(),
                    node.pending_peers().len(),
                    node.participants().len()
                ),
            );
        }
        map.finish()
    }
}

impl MeshWorld {
    pub fn id(name: &str) -> EndpointId {
        EndpointId::parse(name).unwrap_or_else(|e| panic!("bad endpoint name '{}': {}", name, e))
    }

    /// Open an endpoint on the network
    pub fn open(&mut self, name: &str) {
        let transport = self
            .network
            .open_as(Self::id(name))
            .unwrap_or_else(|e| panic!("cannot open '{}': {}", name, e));
        self.nodes
            .insert(name.to_string(), MeshLoop::new(transport, self.liveness.clone()));
    }

    pub fn node(&self, name: &str) -> &MeshLoop<MemoryTransport> {
        self.nodes
            .get(name)
            .unwrap_or_else(|| panic!("Endpoint '{}' not found", name))
    }

    pub fn node_mut(&mut self, name: &str) -> &mut MeshLoop<MemoryTransport> {
        self.nodes
            .get_mut(name)
            .unwrap_or_else(|| panic!("Endpoint '{}' not found", name))
    }

    /// Advance the clock one step at a time, polling every endpoint
    pub fn tick(&mut self, count: usize) {
        for _ in 0..count {
            self.now += STEP;
            let now = self.now;
            for node in self.nodes.values_mut() {
                node.poll_at(now);
            }
        }
    }

    pub fn advance(&mut self, duration: Duration) {
        let steps = (duration.as_millis() / STEP.as_millis()).max(1) as usize;
        self.tick(steps);
    }

    pub fn settle(&mut self) {
        self.tick(SETTLE_TICKS);
    }

    /// Registry keys of an endpoint, sorted
    pub fn peers_of(&self, name: &str) -> Vec<EndpointId> {
        let mut ids = self.node(name).registry().ids();
        ids.sort();
        ids
    }
}

/// Split "alice, bob and carol" into names
pub fn parse_names(list: &str) -> Vec<String> {
    list.replace(" and ", ", ")
        .split(',')
        .map(|name| name.trim().trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
        .collect()
}
