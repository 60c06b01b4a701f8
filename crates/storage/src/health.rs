//! Health check types for key-value backends.
//!
//! [`KvBackend::health_check`](crate::KvBackend::health_check) takes a
//! [`HealthProbe`] and answers with a [`HealthStatus`]. Liveness only asks
//! whether the backend object is responsive; readiness asks whether it can
//! serve reads and commits right now.

use std::{collections::BTreeMap, fmt, time::Duration};

/// The kind of health question being asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthProbe {
    /// The backend is responsive (not deadlocked).
    Liveness,
    /// The backend can serve reads and transactions.
    Readiness,
}

impl fmt::Display for HealthProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Liveness => write!(f, "liveness"),
            Self::Readiness => write!(f, "readiness"),
        }
    }
}

/// Outcome of a health probe.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use cmdb_storage::{HealthMetadata, HealthStatus};
///
/// let status = HealthStatus::healthy(HealthMetadata::new(Duration::from_millis(2), "memory"));
/// assert!(status.is_healthy());
/// assert_eq!(status.to_string(), "memory healthy (2ms)");
/// ```
#[derive(Debug, Clone)]
pub enum HealthStatus {
    /// Fully operational.
    Healthy(HealthMetadata),
    /// Serving, with a stated limitation.
    Degraded(HealthMetadata, String),
    /// Not able to serve.
    Unhealthy(HealthMetadata, String),
}

impl HealthStatus {
    /// Creates a `Healthy` status.
    #[must_use = "creating a status has no side effects"]
    pub fn healthy(metadata: HealthMetadata) -> Self {
        Self::Healthy(metadata)
    }

    /// Creates a `Degraded` status with a reason.
    #[must_use = "creating a status has no side effects"]
    pub fn degraded(metadata: HealthMetadata, reason: impl Into<String>) -> Self {
        Self::Degraded(metadata, reason.into())
    }

    /// Creates an `Unhealthy` status with a reason.
    #[must_use = "creating a status has no side effects"]
    pub fn unhealthy(metadata: HealthMetadata, reason: impl Into<String>) -> Self {
        Self::Unhealthy(metadata, reason.into())
    }

    /// Returns `true` only for [`HealthStatus::Healthy`].
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy(_))
    }

    /// Returns `true` when traffic can be served, degraded or not.
    #[must_use]
    pub fn is_serving(&self) -> bool {
        !matches!(self, Self::Unhealthy(..))
    }

    /// The metadata attached to this status.
    #[must_use]
    pub fn metadata(&self) -> &HealthMetadata {
        match self {
            Self::Healthy(m) | Self::Degraded(m, _) | Self::Unhealthy(m, _) => m,
        }
    }

    /// The degradation or failure reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Healthy(_) => None,
            Self::Degraded(_, reason) | Self::Unhealthy(_, reason) => Some(reason),
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.metadata();
        let millis = m.check_duration.as_millis();
        match self {
            Self::Healthy(_) => write!(f, "{} healthy ({millis}ms)", m.backend),
            Self::Degraded(_, reason) => write!(f, "{} degraded: {reason} ({millis}ms)", m.backend),
            Self::Unhealthy(_, reason) => {
                write!(f, "{} unhealthy: {reason} ({millis}ms)", m.backend)
            },
        }
    }
}

/// Timing and identification attached to a [`HealthStatus`].
#[derive(Debug, Clone)]
pub struct HealthMetadata {
    /// How long the check took.
    pub check_duration: Duration,
    /// Backend identifier, e.g. `"memory"`.
    pub backend: String,
    /// Backend-specific details such as `revision` or `key_count`.
    pub details: BTreeMap<String, String>,
}

impl HealthMetadata {
    /// Creates metadata with no details.
    #[must_use]
    pub fn new(check_duration: Duration, backend: impl Into<String>) -> Self {
        Self { check_duration, backend: backend.into(), details: BTreeMap::new() }
    }

    /// Adds a detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.insert(key.into(), value.to_string());
        self
    }
}
