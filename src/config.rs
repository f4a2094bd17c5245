use std::time::Duration;

use crate::{Error, Result};

/// Fan-out-level settings: how many GOPs to retain, how long a publisher or
/// subscriber may go quiet before being timed out, how big a subscriber's
/// drop-policy queue is, and how often the registry sweeper runs. Kept
/// separate from [`crate::ServerConfig`], which governs the RTMP
/// connection-accept layer this crate inherited from its TCP server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of complete GOPs retained per stream.
    pub gop_num: usize,
    /// Deadline for a single publisher read.
    pub read_timeout: Duration,
    /// Deadline for a single subscriber write.
    pub write_timeout: Duration,
    /// Capacity of each subscriber's drop-policy queue.
    pub subscriber_queue_capacity: usize,
    /// How often the registry sweeper scans for stale streams.
    pub sweep_interval: Duration,
    /// How long a stream may sit idle (no publisher, no subscribers)
    /// before the sweeper removes it.
    pub stale_after: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gop_num: 1,
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            subscriber_queue_capacity: 1024,
            sweep_interval: Duration::from_secs(5),
            stale_after: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        // gop_num == 0 is a valid, explicit way to disable GOP caching.
        if self.subscriber_queue_capacity < 32 {
            return Err(Error::invalid_config("subscriber_queue_capacity must be at least 32"));
        }
        if self.read_timeout.is_zero() {
            return Err(Error::invalid_config("read_timeout must be non-zero"));
        }
        if self.write_timeout.is_zero() {
            return Err(Error::invalid_config("write_timeout must be non-zero"));
        }
        if self.sweep_interval.is_zero() {
            return Err(Error::invalid_config("sweep_interval must be non-zero"));
        }
        Ok(())
    }
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        ConfigBuilder { config: Config::default() }
    }

    pub fn gop_num(mut self, n: usize) -> Self {
        self.config.gop_num = n;
        self
    }

    pub fn read_timeout(mut self, d: Duration) -> Self {
        self.config.read_timeout = d;
        self
    }

    pub fn write_timeout(mut self, d: Duration) -> Self {
        self.config.write_timeout = d;
        self
    }

    pub fn subscriber_queue_capacity(mut self, n: usize) -> Self {
        self.config.subscriber_queue_capacity = n;
        self
    }

    pub fn sweep_interval(mut self, d: Duration) -> Self {
        self.config.sweep_interval = d;
        self
    }

    pub fn stale_after(mut self, d: Duration) -> Self {
        self.config.stale_after = d;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        ConfigBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_undersized_queue_capacity() {
        let result = Config::builder().subscriber_queue_capacity(4).build();
        assert!(result.is_err());
    }
}
