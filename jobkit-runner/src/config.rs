//! Runner configuration
//!
//! Defines the defaults a runner applies to launches that do not override
//! them: the execution policy and the job timeout.

use jobkit_core::domain::ExecutionPolicy;
use jobkit_core::{JobError, Result};
use std::time::Duration;

/// Default timeout applied to timed launches: 10 seconds
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Environment variable selecting the default policy (`pool`, `io`, `inline`)
pub const ENV_DEFAULT_POLICY: &str = "JOBKIT_DEFAULT_POLICY";

/// Environment variable holding the default timeout in milliseconds
pub const ENV_DEFAULT_TIMEOUT_MS: &str = "JOBKIT_DEFAULT_TIMEOUT_MS";

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Policy used by launches without an override
    pub default_policy: ExecutionPolicy,

    /// Timeout used by timed launches without an override
    pub default_timeout: Duration,
}

impl RunnerConfig {
    /// Creates a configuration with the built-in defaults
    pub fn new() -> Self {
        Self {
            default_policy: ExecutionPolicy::Pool,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - JOBKIT_DEFAULT_POLICY (optional, default: pool)
    /// - JOBKIT_DEFAULT_TIMEOUT_MS (optional, default: 10000)
    ///
    /// Unset variables fall back to defaults; malformed values are errors.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::new();

        if let Some(policy) = lookup(ENV_DEFAULT_POLICY) {
            config.default_policy = policy.parse()?;
        }

        if let Some(timeout) = lookup(ENV_DEFAULT_TIMEOUT_MS) {
            let millis = timeout.trim().parse::<u64>().map_err(|e| {
                JobError::invalid_argument(format!(
                    "{} must be a number of milliseconds: {}",
                    ENV_DEFAULT_TIMEOUT_MS, e
                ))
            })?;
            config.default_timeout = Duration::from_millis(millis);
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the default policy
    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Sets the default timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Validates the configuration
    ///
    /// Custom policies are accepted here; only [`from_env`](Self::from_env)
    /// is limited to the built-in policy names.
    pub fn validate(&self) -> Result<()> {
        validate_timeout(self.default_timeout)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Rejects timeouts that would cancel a job before it could start
pub(crate) fn validate_timeout(timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        return Err(JobError::invalid_argument("timeout must be greater than 0"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::PoolDispatcher;
    use std::collections::HashMap;
    use tokio::runtime::Handle;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.default_policy, ExecutionPolicy::Pool);
        assert_eq!(config.default_timeout, Duration::from_millis(10_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = RunnerConfig::default().with_timeout(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(JobError::InvalidArgument(_))
        ));

        let config = config.with_timeout(Duration::from_millis(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_reads_values() {
        let config = RunnerConfig::from_lookup(lookup_from(&[
            (ENV_DEFAULT_POLICY, "io"),
            (ENV_DEFAULT_TIMEOUT_MS, "2500"),
        ]))
        .unwrap();

        assert_eq!(config.default_policy, ExecutionPolicy::Io);
        assert_eq!(config.default_timeout, Duration::from_millis(2_500));
    }

    #[test]
    fn test_from_lookup_falls_back_to_defaults() {
        let config = RunnerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, RunnerConfig::default());
    }

    #[test]
    fn test_from_lookup_rejects_malformed_values() {
        let malformed = [
            (ENV_DEFAULT_TIMEOUT_MS, "soon"),
            (ENV_DEFAULT_TIMEOUT_MS, "0"),
            (ENV_DEFAULT_POLICY, "gpu"),
        ];
        for pair in malformed {
            assert!(RunnerConfig::from_lookup(lookup_from(&[pair])).is_err());
        }
    }

    #[tokio::test]
    async fn test_custom_policy_only_from_code() {
        let named = lookup_from(&[(ENV_DEFAULT_POLICY, "reports")]);
        assert!(RunnerConfig::from_lookup(named).is_err());

        let dispatcher = PoolDispatcher::named(Handle::current(), "reports");
        let config = RunnerConfig::default().with_policy(ExecutionPolicy::custom(dispatcher));

        assert!(config.validate().is_ok());
        assert!(config.default_policy.is_custom());
        assert_eq!(config.default_policy.name(), "reports");
    }
}
