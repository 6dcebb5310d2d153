use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry and timeout policy for one remote-backed service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationPolicy {
    /// Retries after the first attempt; only transient failures are retried.
    pub max_retries: u32,
    /// Deadline for a single attempt.
    pub timeout: Duration,
    /// Base delay before the first retry, doubled on each further retry.
    pub backoff: Duration,
}

impl InvocationPolicy {
    const MAX_BACKOFF_SHIFT: u32 = 6;

    /// Delay before retry number `retry` (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(Self::MAX_BACKOFF_SHIFT);
        self.backoff.saturating_mul(1 << shift)
    }

    /// Total attempts allowed for one call.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for InvocationPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(5),
            backoff: Duration::from_millis(100),
        }
    }
}

/// Where a remote-backed service lives and how to call it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteLocation {
    /// Transport URL, e.g. `tcp://10.0.0.4:7700` or `local://billing`.
    pub url: String,
    /// Qualified name of the service inside the remote kernel.
    pub service: String,
    /// Interface name used to pick the proxy adapter.
    pub interface: String,
    pub policy: InvocationPolicy,
}

impl RemoteLocation {
    pub fn new(url: impl Into<String>, service: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            service: service.into(),
            interface: interface.into(),
            policy: InvocationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: InvocationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// URL scheme, used to pick a transport.
    pub fn scheme(&self) -> &str {
        self.url.split_once("://").map(|(scheme, _)| scheme).unwrap_or("")
    }

    /// Everything after `scheme://`.
    pub fn authority(&self) -> &str {
        self.url.split_once("://").map(|(_, rest)| rest).unwrap_or(&self.url)
    }
}

impl fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.service, self.url)
    }
}
