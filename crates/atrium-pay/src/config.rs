//! Gateway configuration.
//!
//! Loaded from environment variables per provider, with a prefix so both
//! backends can coexist (`ATRIUM_CARD_*`, `ATRIUM_BANK_*`).

use std::env;
use std::time::Duration;

use crate::error::PaymentError;

/// Default timeout for provider HTTP calls.
///
/// Gateway calls must never hang an order transaction - there is no
/// network I/O inside any database transaction, and even outside one a
/// hung provider should surface as a processor error quickly.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for one payment provider backend.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Provider API base URL, no trailing slash.
    pub api_base: String,

    /// Secret API key for outbound calls.
    pub secret_key: String,

    /// Shared secret for webhook signature verification.
    pub webhook_secret: String,

    /// Bounded timeout applied to every provider call.
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Creates a configuration with the default timeout.
    pub fn new(
        api_base: impl Into<String>,
        secret_key: impl Into<String>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        GatewayConfig {
            api_base: api_base.into(),
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// ## Variables (for prefix `ATRIUM_CARD`)
    /// - `ATRIUM_CARD_API_BASE` (required)
    /// - `ATRIUM_CARD_SECRET_KEY` (required)
    /// - `ATRIUM_CARD_WEBHOOK_SECRET` (required)
    /// - `ATRIUM_CARD_TIMEOUT_SECS` (default 10)
    pub fn from_env(prefix: &str) -> Result<Self, PaymentError> {
        let require = |suffix: &str| {
            let key = format!("{prefix}_{suffix}");
            env::var(&key).map_err(|_| PaymentError::Config(format!("{key} is not set")))
        };

        let timeout_key = format!("{prefix}_TIMEOUT_SECS");
        let timeout = match env::var(&timeout_key) {
            Ok(value) => Duration::from_secs(
                value
                    .parse()
                    .map_err(|_| PaymentError::Config(format!("{timeout_key} is not a number")))?,
            ),
            Err(_) => DEFAULT_TIMEOUT,
        };

        Ok(GatewayConfig {
            api_base: require("API_BASE")?,
            secret_key: require("SECRET_KEY")?,
            webhook_secret: require("WEBHOOK_SECRET")?,
            timeout,
        })
    }
}
