//! Client-side collaboration settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff between listener reconnect attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: u32,
    /// Consecutive failed connects before giving up (None = never)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based), capped at `max_delay_ms`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.multiplier.max(1)).saturating_pow(attempt.saturating_sub(1));
        let millis = self.initial_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(millis)
    }

    /// Whether `failures` consecutive failures exhaust the policy.
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts.is_some_and(|max| failures >= max)
    }
}

/// Relay endpoint and listener tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollabConfig {
    /// Relay base address; the room is appended as a path segment
    pub relay_url: String,
    /// Listener → render loop queue depth
    pub channel_capacity: usize,
    /// Upper bound on a publisher connect + send
    pub publish_timeout_ms: u64,
    pub reconnect: ReconnectPolicy,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:6789".to_string(),
            channel_capacity: 256,
            publish_timeout_ms: 5_000,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl CollabConfig {
    /// Upper bound on one publish round trip.
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CollabConfig::default();
        assert_eq!(config.relay_url, "ws://127.0.0.1:6789");
        assert_eq!(config.channel_capacity, 256);
        assert_eq!(config.publish_timeout(), Duration::from_secs(5));
        assert!(config.reconnect.max_attempts.is_none());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = ReconnectPolicy {
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            multiplier: 2,
            max_attempts: None,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(500), Duration::from_millis(1_000));
    }

    #[test]
    fn test_exhausted() {
        let unlimited = ReconnectPolicy::default();
        assert!(!unlimited.exhausted(u32::MAX));

        let limited = ReconnectPolicy {
            max_attempts: Some(3),
            ..ReconnectPolicy::default()
        };
        assert!(!limited.exhausted(2));
        assert!(limited.exhausted(3));
    }
}
