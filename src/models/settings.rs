use crate::utils::error::{ForwardError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for one forwarding run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForwarderSettings {
    /// direct-tcpip channels opened up front, one worker each
    #[serde(default = "default_channel_count")]
    pub channel_count: usize,

    /// Relay buffer per worker, in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Bounded wait for one accept attempt
    #[serde(default = "default_accept_poll_interval_ms")]
    pub accept_poll_interval_ms: u64,

    /// Bounded wait for local data while relaying
    #[serde(default = "default_relay_poll_interval_ms")]
    pub relay_poll_interval_ms: u64,

    /// Stop accepting after this long without filling every worker.
    /// `None` keeps waiting until cancelled.
    #[serde(default)]
    pub accept_timeout_ms: Option<u64>,

    #[serde(default = "default_listen_backlog")]
    pub listen_backlog: u32,

    /// Pending requests the transport actor buffers before workers wait
    #[serde(default = "default_transport_queue_depth")]
    pub transport_queue_depth: usize,

    /// SSH inactivity timeout; `None` disables it
    #[serde(default)]
    pub inactivity_timeout_secs: Option<u64>,

    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: Option<u64>,

    /// Log entries kept in memory
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,
}

fn default_channel_count() -> usize {
    10
}

fn default_buffer_size() -> usize {
    16 * 1024
}

fn default_accept_poll_interval_ms() -> u64 {
    2010
}

fn default_relay_poll_interval_ms() -> u64 {
    10
}

fn default_listen_backlog() -> u32 {
    2
}

fn default_transport_queue_depth() -> usize {
    64
}

fn default_keepalive_interval_secs() -> Option<u64> {
    Some(30)
}

fn default_max_log_entries() -> usize {
    500
}

impl Default for ForwarderSettings {
    fn default() -> Self {
        Self {
            channel_count: default_channel_count(),
            buffer_size: default_buffer_size(),
            accept_poll_interval_ms: default_accept_poll_interval_ms(),
            relay_poll_interval_ms: default_relay_poll_interval_ms(),
            accept_timeout_ms: None,
            listen_backlog: default_listen_backlog(),
            transport_queue_depth: default_transport_queue_depth(),
            inactivity_timeout_secs: None,
            keepalive_interval_secs: default_keepalive_interval_secs(),
            max_log_entries: default_max_log_entries(),
        }
    }
}

impl ForwarderSettings {
    pub fn with_channel_count(mut self, count: usize) -> Self {
        self.channel_count = count;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_accept_poll_interval(mut self, interval: Duration) -> Self {
        self.accept_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn accept_poll_interval(&self) -> Duration {
        Duration::from_millis(self.accept_poll_interval_ms)
    }

    pub fn relay_poll_interval(&self) -> Duration {
        Duration::from_millis(self.relay_poll_interval_ms)
    }

    pub fn accept_timeout(&self) -> Option<Duration> {
        self.accept_timeout_ms.map(Duration::from_millis)
    }

    pub fn inactivity_timeout(&self) -> Option<Duration> {
        self.inactivity_timeout_secs.map(Duration::from_secs)
    }

    pub fn keepalive_interval(&self) -> Option<Duration> {
        self.keepalive_interval_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_count == 0 {
            return Err(ForwardError::ConfigError(
                "channel_count must be at least 1".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(ForwardError::ConfigError(
                "buffer_size must be at least 1".to_string(),
            ));
        }
        if self.accept_poll_interval_ms == 0 || self.relay_poll_interval_ms == 0 {
            return Err(ForwardError::ConfigError(
                "poll intervals must be non-zero".to_string(),
            ));
        }
        if self.transport_queue_depth == 0 {
            return Err(ForwardError::ConfigError(
                "transport_queue_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ForwarderSettings::default();
        assert_eq!(settings.channel_count, 10);
        assert_eq!(settings.buffer_size, 16384);
        assert_eq!(settings.accept_poll_interval(), Duration::from_millis(2010));
        assert_eq!(settings.relay_poll_interval(), Duration::from_millis(10));
        assert_eq!(settings.accept_timeout(), None);
        assert_eq!(settings.listen_backlog, 2);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: ForwarderSettings =
            toml::from_str("channel_count = 4\naccept_timeout_ms = 30000").unwrap();
        assert_eq!(settings.channel_count, 4);
        assert_eq!(settings.accept_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(settings.buffer_size, 16384);
    }

    #[test]
    fn test_sub_second_accept_timeout_is_kept() {
        let settings = ForwarderSettings::default().with_accept_timeout(Duration::from_millis(250));
        assert_eq!(settings.accept_timeout_ms, Some(250));
        assert_eq!(settings.accept_timeout(), Some(Duration::from_millis(250)));

        let settings = ForwarderSettings::default().with_accept_timeout(Duration::from_millis(1500));
        assert_eq!(settings.accept_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        assert!(ForwarderSettings::default().with_channel_count(0).validate().is_err());
        assert!(ForwarderSettings::default().with_buffer_size(0).validate().is_err());

        let mut settings = ForwarderSettings::default();
        settings.relay_poll_interval_ms = 0;
        assert!(settings.validate().is_err());
    }
}
