/// Configuration for the spindle engine.
#[derive(Clone)]
pub struct Config {
    /// Worker/thread configuration.
    pub worker: WorkerConfig,
    /// How long a worker blocks on the submission queue before checking the
    /// shutdown flag, in microseconds. Default: 1000 (1ms).
    pub tick_timeout_us: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker: WorkerConfig::default(),
            tick_timeout_us: 1000,
        }
    }
}

impl Config {
    /// Validate configuration values. Returns an error if any value is out of range.
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if self.tick_timeout_us == 0 {
            return Err(crate::error::Error::Config(
                "tick_timeout_us must be > 0".into(),
            ));
        }
        if self.worker.threads > 1024 {
            return Err(crate::error::Error::Config(
                "worker.threads must be <= 1024".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the worker thread pool.
#[derive(Clone)]
pub struct WorkerConfig {
    /// Number of worker threads. 0 = number of CPUs.
    pub threads: usize,
    /// Pin each worker to a CPU core (best effort).
    pub pin_to_core: bool,
    /// First core index used when pinning.
    pub core_offset: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            pin_to_core: false,
            core_offset: 0,
        }
    }
}
