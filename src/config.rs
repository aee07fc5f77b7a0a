//! Pool configuration and the resolvers that produce it.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Worker count used when nothing else is configured.
pub const DEFAULT_MAX_WORKERS: usize = 1000;

/// Largest accepted worker count, bounded by the dispatch queue's channel.
pub const MAX_WORKERS_LIMIT: usize = tokio::sync::Semaphore::MAX_PERMITS;

/// Environment variable holding the worker count.
pub const MAX_WORKERS_ENV: &str = "POOL_MAX_WORKERS";

/// Configuration for the worker pool.
///
/// # Example
///
/// ```rust
/// use handoff_pool::PoolConfig;
///
/// let config = PoolConfig::default();
/// assert_eq!(config.max_workers, 1000);
///
/// let config = PoolConfig { max_workers: 8 };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker tasks, and the capacity of the dispatch queue.
    ///
    /// Must be at least 1. A pool with no workers could never accept a job.
    pub max_workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl PoolConfig {
    /// Check the configuration invariants.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MaxWorkersMustBePositive`] if `max_workers` is 0
    /// - [`ConfigError::MaxWorkersTooLarge`] if it exceeds [`MAX_WORKERS_LIMIT`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::MaxWorkersMustBePositive { value: 0 });
        }
        if self.max_workers > MAX_WORKERS_LIMIT {
            return Err(ConfigError::MaxWorkersTooLarge {
                value: self.max_workers,
                max: MAX_WORKERS_LIMIT,
            });
        }
        Ok(())
    }
}

/// Anything that can produce a [`PoolConfig`].
///
/// This is the seam through which the pool receives its configuration;
/// loading it from files, flags or a settings service is up to the caller.
pub trait ConfigSource {
    /// Resolve the configuration.
    fn resolve(&self) -> Result<PoolConfig, ConfigError>;
}

impl ConfigSource for PoolConfig {
    fn resolve(&self) -> Result<PoolConfig, ConfigError> {
        Ok(self.clone())
    }
}

impl<S: ConfigSource + ?Sized> ConfigSource for &S {
    fn resolve(&self) -> Result<PoolConfig, ConfigError> {
        (**self).resolve()
    }
}

/// Resolves [`PoolConfig`] from process environment variables.
///
/// | Env Var                     | Default |
/// |-----------------------------|---------|
/// | `{prefix}POOL_MAX_WORKERS`  | `1000`  |
///
/// # Example
///
/// ```rust,no_run
/// use handoff_pool::{ConfigSource, EnvConfig};
///
/// let config = EnvConfig::new()
///     .prefix("APP_")
///     .dotenv(".env")
///     .resolve()?;
/// # Ok::<(), handoff_pool::ConfigError>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    prefix: String,
    dotenv: Option<PathBuf>,
}

impl EnvConfig {
    /// Read unprefixed variables from the process environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend `prefix` to every variable name.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Load a dotenv file before reading variables.
    ///
    /// Variables already present in the environment take precedence over
    /// the file.
    #[must_use]
    pub fn dotenv(mut self, path: impl Into<PathBuf>) -> Self {
        self.dotenv = Some(path.into());
        self
    }

    /// Full name of the worker count variable.
    #[must_use]
    pub fn max_workers_key(&self) -> String {
        format!("{}{}", self.prefix, MAX_WORKERS_ENV)
    }

    fn resolve_with<F>(&self, lookup: F) -> Result<PoolConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = self.max_workers_key();
        let Some(raw) = lookup(&key) else {
            return Ok(PoolConfig::default());
        };

        let value: i64 = raw
            .trim()
            .parse()
            .map_err(|source| ConfigError::InvalidValue {
                key: key.clone(),
                value: raw.clone(),
                source,
            })?;

        if value < 1 {
            return Err(ConfigError::MaxWorkersMustBePositive { value });
        }

        let config = PoolConfig {
            max_workers: usize::try_from(value).unwrap_or(usize::MAX),
        };
        config.validate()?;
        Ok(config)
    }
}

impl ConfigSource for EnvConfig {
    fn resolve(&self) -> Result<PoolConfig, ConfigError> {
        if let Some(path) = &self.dotenv {
            dotenvy::from_path(path)?;
        }
        self.resolve_with(|key| std::env::var(key).ok())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
