//! Store configuration.
//!
//! [`StoreConfig`] decides where records live in the key space and how long
//! mutating calls may take; [`CasRetryConfig`] bounds the optimistic
//! concurrency loop. Both validate on construction, whether built in code or
//! deserialized:
//!
//! ```
//! use std::time::Duration;
//!
//! use cmdb_store::{CasRetryConfig, StoreConfig};
//!
//! let config = StoreConfig::builder()
//!     .path_prefix("/cmdb")
//!     .operation_timeout(Duration::from_secs(5))
//!     .cas_retry(CasRetryConfig::builder().max_retries(4).build()?)
//!     .build()?;
//! assert_eq!(config.path_prefix(), "/cmdb");
//!
//! let parsed: StoreConfig = serde_json::from_str(r#"{ "operation_timeout": "2s" }"#)?;
//! assert_eq!(parsed.operation_timeout(), Duration::from_secs(2));
//! assert_eq!(parsed.path_prefix(), "/registry");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default root of every key the store writes.
pub const DEFAULT_PATH_PREFIX: &str = "/registry";

/// Default bound on one mutating call, retries included.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after a conflicting write.
pub const DEFAULT_MAX_RETRIES: u32 = 16;

/// Default pause between conflicting attempts, before jitter.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(5);

/// Upper bound accepted for [`CasRetryConfig::base_delay`].
pub const MAX_BASE_DELAY: Duration = Duration::from_secs(1);

fn default_path_prefix() -> String {
    DEFAULT_PATH_PREFIX.to_owned()
}

fn default_operation_timeout() -> Duration {
    DEFAULT_OPERATION_TIMEOUT
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_base_delay() -> Duration {
    DEFAULT_BASE_DELAY
}

/// Bounds for the compare-and-swap retry loop.
///
/// After a conflicting write the loop sleeps `base_delay` plus a random
/// jitter of up to `base_delay`, then re-reads and tries again, at most
/// `max_retries` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCasRetryConfig")]
pub struct CasRetryConfig {
    pub(crate) max_retries: u32,
    #[serde(with = "humantime_serde")]
    pub(crate) base_delay: Duration,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCasRetryConfig {
    #[serde(default = "default_max_retries")]
    max_retries: u32,
    #[serde(with = "humantime_serde", default = "default_base_delay")]
    base_delay: Duration,
}

impl TryFrom<RawCasRetryConfig> for CasRetryConfig {
    type Error = ConfigError;

    fn try_from(raw: RawCasRetryConfig) -> Result<Self, Self::Error> {
        Self::builder().max_retries(raw.max_retries).base_delay(raw.base_delay).build()
    }
}

impl Default for CasRetryConfig {
    fn default() -> Self {
        Self { max_retries: DEFAULT_MAX_RETRIES, base_delay: DEFAULT_BASE_DELAY }
    }
}

#[bon::bon]
impl CasRetryConfig {
    /// Creates a retry configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `max_retries` is zero or `base_delay`
    /// exceeds [`MAX_BASE_DELAY`].
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_MAX_RETRIES)] max_retries: u32,
        #[builder(default = DEFAULT_BASE_DELAY)] base_delay: Duration,
    ) -> Result<Self, ConfigError> {
        if max_retries == 0 {
            return Err(ConfigError::new("max_retries", "must be at least 1"));
        }
        if base_delay > MAX_BASE_DELAY {
            return Err(ConfigError::new(
                "base_delay",
                format!("must not exceed {MAX_BASE_DELAY:?}, got {base_delay:?}"),
            ));
        }
        Ok(Self { max_retries, base_delay })
    }

    /// Retries allowed after the first attempt.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Pause between attempts, before jitter.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }
}

/// Configuration for [`Store`](crate::Store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStoreConfig")]
pub struct StoreConfig {
    pub(crate) path_prefix: String,
    #[serde(with = "humantime_serde")]
    pub(crate) operation_timeout: Duration,
    pub(crate) cas_retry: CasRetryConfig,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStoreConfig {
    #[serde(default = "default_path_prefix")]
    path_prefix: String,
    #[serde(with = "humantime_serde", default = "default_operation_timeout")]
    operation_timeout: Duration,
    #[serde(default)]
    cas_retry: CasRetryConfig,
}

impl TryFrom<RawStoreConfig> for StoreConfig {
    type Error = ConfigError;

    fn try_from(raw: RawStoreConfig) -> Result<Self, Self::Error> {
        Self::builder()
            .path_prefix(raw.path_prefix)
            .operation_timeout(raw.operation_timeout)
            .cas_retry(raw.cas_retry)
            .build()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path_prefix: default_path_prefix(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            cas_retry: CasRetryConfig::default(),
        }
    }
}

#[bon::bon]
impl StoreConfig {
    /// Creates a store configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - `path_prefix` does not start with `/`, ends with `/`, or contains an empty segment
    /// - `operation_timeout` is zero
    #[builder]
    pub fn new(
        #[builder(into, default = default_path_prefix())] path_prefix: String,
        #[builder(default = DEFAULT_OPERATION_TIMEOUT)] operation_timeout: Duration,
        #[builder(default)] cas_retry: CasRetryConfig,
    ) -> Result<Self, ConfigError> {
        if !path_prefix.starts_with('/') {
            return Err(ConfigError::new("path_prefix", "must start with '/'"));
        }
        if path_prefix.len() > 1 && path_prefix.ends_with('/') {
            return Err(ConfigError::new("path_prefix", "must not end with '/'"));
        }
        if path_prefix.len() > 1 && path_prefix[1..].split('/').any(str::is_empty) {
            return Err(ConfigError::new("path_prefix", "must not contain empty segments"));
        }
        if operation_timeout.is_zero() {
            return Err(ConfigError::new("operation_timeout", "must be greater than zero"));
        }
        Ok(Self { path_prefix, operation_timeout, cas_retry })
    }

    /// Root of every key the store writes.
    #[must_use]
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    /// Bound on one mutating call, retries included.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Retry loop bounds.
    #[must_use]
    pub fn cas_retry(&self) -> &CasRetryConfig {
        &self.cas_retry
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.path_prefix(), "/registry");
        assert_eq!(config.operation_timeout(), Duration::from_secs(30));
        assert_eq!(config.cas_retry().max_retries(), 16);
        assert_eq!(config.cas_retry().base_delay(), Duration::from_millis(5));
        assert_eq!(StoreConfig::builder().build().unwrap(), config);
    }

    #[rstest]
    #[case("registry")]
    #[case("/registry/")]
    #[case("/a//b")]
    fn bad_prefixes_are_rejected(#[case] prefix: &str) {
        let err = StoreConfig::builder().path_prefix(prefix).build().unwrap_err();
        assert_eq!(err.field, "path_prefix");
    }

    #[rstest]
    #[case("/")]
    #[case("/registry")]
    #[case("/cmdb/prod")]
    fn good_prefixes_are_accepted(#[case] prefix: &str) {
        assert!(StoreConfig::builder().path_prefix(prefix).build().is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = StoreConfig::builder().operation_timeout(Duration::ZERO).build().unwrap_err();
        assert_eq!(err.field, "operation_timeout");
    }

    #[test]
    fn retry_bounds_are_checked() {
        assert_eq!(CasRetryConfig::builder().max_retries(0).build().unwrap_err().field, "max_retries");
        assert_eq!(
            CasRetryConfig::builder().base_delay(Duration::from_secs(2)).build().unwrap_err().field,
            "base_delay"
        );
    }

    #[test]
    fn deserialize_applies_defaults_and_validation() {
        let config: StoreConfig = serde_json::from_str(
            r#"{ "path_prefix": "/cmdb", "cas_retry": { "base_delay": "20ms" } }"#,
        )
        .unwrap();
        assert_eq!(config.path_prefix(), "/cmdb");
        assert_eq!(config.cas_retry().base_delay(), Duration::from_millis(20));
        assert_eq!(config.cas_retry().max_retries(), DEFAULT_MAX_RETRIES);

        assert!(serde_json::from_str::<StoreConfig>(r#"{ "path_prefix": "cmdb" }"#).is_err());
        assert!(serde_json::from_str::<StoreConfig>(r#"{ "timeout": "1s" }"#).is_err());
    }

    #[test]
    fn serialize_round_trips() {
        let config = StoreConfig::builder()
            .operation_timeout(Duration::from_millis(1500))
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"1s 500ms\""));
        assert_eq!(serde_json::from_str::<StoreConfig>(&json).unwrap(), config);
    }
}
