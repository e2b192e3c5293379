use crate::error::{Error, Result};
use crate::executor::PanicStrategy;
use std::str::FromStr;
use std::time::Duration;

const MAX_WORKERS: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub num_workers: Option<usize>,
    pub queue_size: usize,
    /// One scheduler time unit.
    pub tick_interval: Duration,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
    pub panic_strategy: PanicStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_workers: None,
            queue_size: 1000,
            tick_interval: Duration::from_secs(1),
            thread_name_prefix: "tickpool-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
            panic_strategy: PanicStrategy::default(),
        }
    }
}

fn env_get<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Defaults overridden by `TICKPOOL_WORKERS`, `TICKPOOL_QUEUE_SIZE` and
    /// `TICKPOOL_TICK_MS`. Unset or unparseable variables are ignored.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Some(n) = env_get::<usize>("TICKPOOL_WORKERS") {
            config.num_workers = Some(n);
        }
        if let Some(q) = env_get::<usize>("TICKPOOL_QUEUE_SIZE") {
            config.queue_size = q;
        }
        if let Some(ms) = env_get::<u64>("TICKPOOL_TICK_MS") {
            config.tick_interval = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_workers {
            if n == 0 {
                return Err(Error::config("num_workers must be > 0"));
            }
            if n > MAX_WORKERS {
                return Err(Error::config("num_workers too large (max 1024)"));
            }
        }

        if self.queue_size == 0 {
            return Err(Error::config("queue_size must be > 0"));
        }

        if self.tick_interval.is_zero() {
            return Err(Error::config("tick_interval must be non-zero"));
        }

        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        self.num_workers.unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.config.num_workers = Some(n);
        self
    }

    pub fn queue_size(mut self, size: usize) -> Self {
        self.config.queue_size = size;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval = interval;
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
