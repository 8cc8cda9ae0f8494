//! Retry decisions for a single logical request
//!
//! Counters live in [`Attempts`], created fresh for every call to
//! [`ApiClient::send`](crate::ApiClient::send) and never shared between requests.

use crate::config::RetryConfig;
use std::time::Duration;

/// What to do with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Wait, then resubmit the identical request
    Retry(Duration),
    /// Renew the access token, then replay with it
    Refresh,
    /// Hand the failure to the caller
    Surface,
}

/// Per-request retry bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attempts {
    pub network: u32,
    pub server: u32,
    pub auth_retried: bool,
}

/// Retry limits and backoff delays shared by every request of a client
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    network_retries: u32,
    network_base: Duration,
    server_retries: u32,
    server_step: Duration,
    retry_statuses: Vec<u16>,
}

impl RetryPolicy {
    /// Create a policy from configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            network_retries: config.network_retries,
            network_base: Duration::from_millis(config.network_base_ms),
            server_retries: config.server_retries,
            server_step: Duration::from_millis(config.server_step_ms),
            retry_statuses: config.retry_statuses.clone(),
        }
    }

    /// Delay before network retry number `attempt` (1-based): `2^attempt * base`
    pub fn network_delay(&self, attempt: u32) -> Duration {
        self.network_base.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Delay before server retry number `attempt` (1-based): `attempt * step`
    pub fn server_delay(&self, attempt: u32) -> Duration {
        self.server_step.saturating_mul(attempt)
    }

    /// No response was received
    pub fn on_network_error(&self, attempts: &mut Attempts) -> Disposition {
        if attempts.network >= self.network_retries {
            return Disposition::Surface;
        }
        attempts.network += 1;
        Disposition::Retry(self.network_delay(attempts.network))
    }

    /// A response arrived with a non-success status
    pub fn on_status(&self, status: u16, attempts: &mut Attempts) -> Disposition {
        match status {
            401 if !attempts.auth_retried => {
                attempts.auth_retried = true;
                Disposition::Refresh
            }
            s if self.retry_statuses.contains(&s) => {
                attempts.server += 1;
                if attempts.server <= self.server_retries {
                    Disposition::Retry(self.server_delay(attempts.server))
                } else {
                    Disposition::Surface
                }
            }
            _ => Disposition::Surface,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
