use crate::domain::{elapsed, ChannelId, ChannelRegistry, ChannelStatus};
use instant::{Duration, Instant};
use mesh_session_core::EndpointId;
use std::collections::HashMap;

/// Liveness timings
#[derive(Debug, Clone, PartialEq)]
pub struct LivenessConfig {
    /// Interval between ping rounds (and reconnect retries)
    pub ping_interval: Duration,
    /// How long a disconnected channel may recover on its own
    pub grace_period: Duration,
    /// Unanswered ping older than this counts as a transport disconnect
    pub pong_timeout: Duration,
    /// Outbound connects still pending after this are abandoned
    pub connect_timeout: Duration,
    pub max_reconnect_attempts: Option<u32>,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(10),
            grace_period: Duration::from_secs(2),
            pong_timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
            max_reconnect_attempts: None,
        }
    }
}

/// What the mesh loop should do after a liveness tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LivenessAction {
    /// Send a ping on this open channel
    Ping(ChannelId),
    /// Pong overdue: treat the channel as disconnected (starts the grace period)
    Suspect { remote: EndpointId, channel: ChannelId },
    /// Grace period over without recovery: drop the channel, then reconnect
    Expire { remote: EndpointId, channel: ChannelId },
    /// Outbound connect never opened: connect-failure path
    Abandon { remote: EndpointId, channel: ChannelId },
    /// Dial a peer lost through an expired grace period
    Reconnect(EndpointId),
}

#[derive(Debug, Default)]
struct ReconnectCandidate {
    attempts: u32,
}

/// Liveness monitor: probes open channels and schedules repair of lost ones.
///
/// Deterministic: every decision is a function of registry state and the
/// `now` handed to [`LivenessMonitor::tick`].
#[derive(Debug)]
pub struct LivenessMonitor {
    config: LivenessConfig,
    last_round: Option<Instant>,
    candidates: HashMap<EndpointId, ReconnectCandidate>,
}

impl LivenessMonitor {
    pub fn new(config: LivenessConfig) -> Self {
        Self {
            config,
            last_round: None,
            candidates: HashMap::new(),
        }
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    /// Compute the actions due at `now`.
    ///
    /// Channel health is checked on every tick. Pings and reconnect retries
    /// only go out once per `ping_interval`; a freshly lost peer gets its
    /// first reconnect attempt right away.
    pub fn tick(&mut self, registry: &ChannelRegistry, now: Instant) -> Vec<LivenessAction> {
        let mut actions = Vec::new();

        for channel in registry.values() {
            match channel.status {
                ChannelStatus::Connecting { .. }
                    if channel.connect_timed_out(self.config.connect_timeout, now) =>
                {
                    actions.push(LivenessAction::Abandon {
                        remote: channel.remote.clone(),
                        channel: channel.id,
                    });
                }
                ChannelStatus::Disconnected { .. }
                    if channel.grace_period_expired(self.config.grace_period, now) =>
                {
                    actions.push(LivenessAction::Expire {
                        remote: channel.remote.clone(),
                        channel: channel.id,
                    });
                }
                ChannelStatus::Open if channel.pong_overdue(self.config.pong_timeout, now) => {
                    actions.push(LivenessAction::Suspect {
                        remote: channel.remote.clone(),
                        channel: channel.id,
                    });
                }
                _ => {}
            }
        }

        let round_due = match self.last_round {
            None => {
                self.last_round = Some(now);
                false
            }
            Some(last) => elapsed(last, now) >= self.config.ping_interval,
        };

        if round_due {
            self.last_round = Some(now);
            actions.extend(
                registry
                    .values()
                    .filter(|c| c.is_open() && !c.pong_overdue(self.config.pong_timeout, now))
                    .map(|c| LivenessAction::Ping(c.id)),
            );
        }

        actions.extend(self.due_reconnects(registry, round_due));
        actions
    }

    fn due_reconnects(&mut self, registry: &ChannelRegistry, round_due: bool) -> Vec<LivenessAction> {
        let max_attempts = self.config.max_reconnect_attempts;
        let mut exhausted = Vec::new();
        let mut actions = Vec::new();

        for (remote, candidate) in self.candidates.iter_mut() {
            // An attempt is already under way (or someone dialed us)
            if registry.is_live(remote) {
                continue;
            }
            if candidate.attempts > 0 && !round_due {
                continue;
            }
            if max_attempts.is_some_and(|max| candidate.attempts >= max) {
                exhausted.push(remote.clone());
                continue;
            }

            candidate.attempts += 1;
            actions.push(LivenessAction::Reconnect(remote.clone()));
        }

        for remote in exhausted {
            tracing::warn!("⛔ Giving up on {} after reconnect attempts", remote);
            self.candidates.remove(&remote);
        }

        actions
    }

    /// Peer was lost through an expired grace period; schedule a reconnect
    pub fn mark_lost(&mut self, remote: EndpointId) {
        self.candidates.entry(remote).or_default();
    }

    /// Stop trying to reach `remote` (channel opened, closed or failed for good)
    pub fn forget(&mut self, remote: &EndpointId) -> bool {
        self.candidates.remove(remote).is_some()
    }

    pub fn is_candidate(&self, remote: &EndpointId) -> bool {
        self.candidates.contains_key(remote)
    }

    pub fn candidates(&self) -> impl Iterator<Item = &EndpointId> {
        self.candidates.keys()
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
    }
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new(LivenessConfig::default())
    }
}
