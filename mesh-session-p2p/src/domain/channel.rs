use instant::{Duration, Instant};
use mesh_session_core::EndpointId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport-assigned handle of one pairwise channel.
///
/// Two channels to the same remote (e.g. both sides dialing at once) have
/// different handles, which is what lets the registry tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle status of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Outbound connect issued (or inbound accepted), not open yet
    Connecting { since: Instant },
    /// Open and healthy
    Open,
    /// Transport reported a transient problem; within grace period
    Disconnected { since: Instant },
    /// Terminal transport failure; a registry entry in this state may be replaced
    Failed,
}

/// A pairwise channel between the local endpoint and one remote identity
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: ChannelId,
    pub remote: EndpointId,
    /// Endpoint that dialed this channel (used to break duplicate-channel ties)
    pub initiator: EndpointId,
    pub status: ChannelStatus,
    pub created_at: Instant,
    /// Last time anything was received on this channel
    pub last_activity: Instant,
    /// Set when a ping goes out, cleared by the matching pong
    pub awaiting_pong_since: Option<Instant>,
}

impl Channel {
    /// Channel we dialed
    pub fn outbound(id: ChannelId, local: EndpointId, remote: EndpointId, now: Instant) -> Self {
        Self::new(id, remote, local, now)
    }

    /// Channel the remote dialed
    pub fn inbound(id: ChannelId, remote: EndpointId, now: Instant) -> Self {
        let initiator = remote.clone();
        Self::new(id, remote, initiator, now)
    }

    fn new(id: ChannelId, remote: EndpointId, initiator: EndpointId, now: Instant) -> Self {
        Self {
            id,
            remote,
            initiator,
            status: ChannelStatus::Connecting { since: now },
            created_at: now,
            last_activity: now,
            awaiting_pong_since: None,
        }
    }

    pub fn is_outbound(&self) -> bool {
        self.initiator != self.remote
    }

    /// Connecting, open, or inside a disconnect grace period
    pub fn is_live(&self) -> bool {
        matches!(
            self.status,
            ChannelStatus::Connecting { .. } | ChannelStatus::Open | ChannelStatus::Disconnected { .. }
        )
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, ChannelStatus::Open)
    }

    pub fn mark_open(&mut self, now: Instant) {
        self.status = ChannelStatus::Open;
        self.last_activity = now;
        self.awaiting_pong_since = None;
    }

    /// Start the grace period (keeps the original start if already disconnected)
    pub fn mark_disconnected(&mut self, now: Instant) {
        if !matches!(self.status, ChannelStatus::Disconnected { .. }) {
            self.status = ChannelStatus::Disconnected { since: now };
        }
    }

    /// Transport recovered on its own within the grace period
    pub fn mark_recovered(&mut self, now: Instant) {
        if matches!(self.status, ChannelStatus::Disconnected { .. }) {
            self.mark_open(now);
        }
    }

    pub fn mark_failed(&mut self) {
        self.status = ChannelStatus::Failed;
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn ping_sent(&mut self, now: Instant) {
        if self.awaiting_pong_since.is_none() {
            self.awaiting_pong_since = Some(now);
        }
    }

    pub fn pong_received(&mut self, now: Instant) {
        self.awaiting_pong_since = None;
        self.touch(now);
    }

    /// Outstanding ping older than `timeout`
    pub fn pong_overdue(&self, timeout: Duration, now: Instant) -> bool {
        self.awaiting_pong_since
            .map(|since| elapsed(since, now) >= timeout)
            .unwrap_or(false)
    }

    /// Disconnected for at least `grace_period`
    pub fn grace_period_expired(&self, grace_period: Duration, now: Instant) -> bool {
        match self.status {
            ChannelStatus::Disconnected { since } => {
                elapsed(since, now) >= grace_period
            }
            _ => false,
        }
    }

    /// Still connecting after `timeout`
    pub fn connect_timed_out(&self, timeout: Duration, now: Instant) -> bool {
        match self.status {
            ChannelStatus::Connecting { since } => elapsed(since, now) >= timeout,
            _ => false,
        }
    }
}

/// Time from `since` to `now`, zero if the clock went backwards
pub(crate) fn elapsed(since: Instant, now: Instant) -> Duration {
    if now > since {
        now - since
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> EndpointId {
        EndpointId::parse(s).unwrap()
    }

    #[test]
    fn test_channel_status_transitions() {
        let now = Instant::now();
        let mut channel = Channel::outbound(ChannelId(1), id("me"), id("you"), now);
        assert!(channel.is_live());
        assert!(!channel.is_open());
        assert!(channel.is_outbound());

        channel.mark_open(now);
        assert!(channel.is_open());

        channel.mark_disconnected(now);
        assert!(channel.is_live());
        assert!(!channel.is_open());

        channel.mark_recovered(now);
        assert!(channel.is_open());

        channel.mark_failed();
        assert!(!channel.is_live());
    }

    #[test]
    fn test_inbound_initiator_is_remote() {
        let channel = Channel::inbound(ChannelId(7), id("you"), Instant::now());
        assert_eq!(channel.initiator, id("you"));
        assert!(!channel.is_outbound());
    }

    #[test]
    fn test_grace_period_expiry() {
        let start = Instant::now();
        let mut channel = Channel::inbound(ChannelId(1), id("you"), start);
        channel.mark_open(start);
        channel.mark_disconnected(start);

        let grace = Duration::from_secs(2);
        assert!(!channel.grace_period_expired(grace, start + Duration::from_secs(1)));
        assert!(channel.grace_period_expired(grace, start + Duration::from_secs(2)));
    }

    #[test]
    fn test_repeated_disconnect_keeps_original_start() {
        let start = Instant::now();
        let mut channel = Channel::inbound(ChannelId(1), id("you"), start);
        channel.mark_open(start);

        channel.mark_disconnected(start);
        channel.mark_disconnected(start + Duration::from_secs(1));

        assert!(channel.grace_period_expired(Duration::from_secs(2), start + Duration::from_secs(2)));
    }

    #[test]
    fn test_pong_tracking() {
        let start = Instant::now();
        let timeout = Duration::from_secs(20);
        let mut channel = Channel::inbound(ChannelId(1), id("you"), start);
        channel.mark_open(start);

        assert!(!channel.pong_overdue(timeout, start + Duration::from_secs(60)));

        channel.ping_sent(start);
        // A second ping does not reset the outstanding one
        channel.ping_sent(start + Duration::from_secs(10));
        assert!(channel.pong_overdue(timeout, start + Duration::from_secs(20)));

        channel.pong_received(start + Duration::from_secs(21));
        assert!(!channel.pong_overdue(timeout, start + Duration::from_secs(60)));
    }

    #[test]
    fn test_connect_timeout() {
        let start = Instant::now();
        let channel = Channel::outbound(ChannelId(1), id("me"), id("you"), start);
        let timeout = Duration::from_secs(10);

        assert!(!channel.connect_timed_out(timeout, start + Duration::from_secs(9)));
        assert!(channel.connect_timed_out(timeout, start + Duration::from_secs(10)));
    }
}
