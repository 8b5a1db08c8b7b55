use std::time::Duration;

use weft_api::{WeftError, WeftResult};

pub const DEFAULT_THREAD_NAME_PREFIX: &str = "weft-unit";
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

// --- Pool Configuration ---

/// Configuration for a `PoolContext`.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// The number of execution units (one thread each).
    pub size: usize,

    /// Capacity of each unit's inbox and reply channel; `None` is unbounded.
    pub mailbox_capacity: Option<usize>,

    /// How long a call waits for its reply; `None` waits forever.
    pub call_timeout: Option<Duration>,

    /// How long deployment waits for each unit's registration reply; `None` waits forever.
    pub register_timeout: Option<Duration>,

    /// How long terminating a unit waits for its thread to exit; `None` waits forever.
    pub shutdown_timeout: Option<Duration>,

    /// Unit threads are named `<prefix>-<unit id>`.
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: num_cpus::get(),
            mailbox_capacity: None,
            call_timeout: None,
            register_timeout: None,
            shutdown_timeout: Some(DEFAULT_SHUTDOWN_TIMEOUT),
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl PoolConfig {
    /// A default configuration with `size` units.
    pub fn with_size(size: usize) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = Some(capacity);
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn register_timeout(mut self, timeout: Duration) -> Self {
        self.register_timeout = Some(timeout);
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Reject configurations no pool can be built from.
    pub fn validate(&self) -> WeftResult<()> {
        if self.size == 0 {
            return Err(WeftError::InvalidConfig("pool size must be at least 1".to_string()));
        }
        if self.mailbox_capacity == Some(0) {
            return Err(WeftError::InvalidConfig("mailbox capacity must be at least 1".to_string()));
        }
        for (field, timeout) in [
            ("call_timeout", self.call_timeout),
            ("register_timeout", self.register_timeout),
            ("shutdown_timeout", self.shutdown_timeout),
        ] {
            if timeout == Some(Duration::ZERO) {
                return Err(WeftError::InvalidConfig(format!("{} must be non-zero", field)));
            }
        }
        Ok(())
    }

    /// The settings each unit proxy is created with.
    pub fn unit_config(&self) -> UnitConfig {
        UnitConfig {
            mailbox_capacity: self.mailbox_capacity,
            call_timeout: self.call_timeout,
            register_timeout: self.register_timeout,
            shutdown_timeout: self.shutdown_timeout,
            thread_name_prefix: self.thread_name_prefix.clone(),
        }
    }
}

// --- Unit Configuration ---

/// Per-unit settings, derived from the pool configuration.
#[derive(Clone, Debug)]
pub struct UnitConfig {
    pub mailbox_capacity: Option<usize>,
    pub call_timeout: Option<Duration>,
    pub register_timeout: Option<Duration>,
    pub shutdown_timeout: Option<Duration>,
    pub thread_name_prefix: String,
}

impl Default for UnitConfig {
    fn default() -> Self {
        PoolConfig::default().unit_config()
    }
}
