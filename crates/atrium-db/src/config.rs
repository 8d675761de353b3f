//! Checkout configuration.
//!
//! Loaded from environment variables with fallback to defaults, so the
//! excluded web layer can tune the engine without recompiling.

use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use atrium_core::{ShippingTable, TaxRate};

/// Configuration for the order workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Prefix for human-readable order numbers (`PREFIX-YYYY-NNNNNN`).
    pub order_prefix: String,

    /// Sales tax rate in basis points (825 = 8.25%).
    pub tax_rate_bps: u32,

    /// Orders older than this many hours can no longer be cancelled.
    pub cancellation_window_hours: i64,

    /// Flat-tier shipping costs keyed by destination.
    pub shipping: ShippingTable,
}

impl CheckoutConfig {
    /// Returns the tax rate as a typed value.
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    /// Load configuration from environment variables.
    ///
    /// ## Variables
    /// - `ATRIUM_ORDER_PREFIX` (default `ORD`)
    /// - `ATRIUM_TAX_RATE_BPS` (default `825`)
    /// - `ATRIUM_CANCEL_WINDOW_HOURS` (default `24`)
    /// - `ATRIUM_SHIP_DOMESTIC_CENTS` / `ATRIUM_SHIP_REGIONAL_CENTS` /
    ///   `ATRIUM_SHIP_INTERNATIONAL_CENTS`
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = CheckoutConfig::default();

        let mut shipping = defaults.shipping;
        shipping.domestic_cents =
            env_parse("ATRIUM_SHIP_DOMESTIC_CENTS", shipping.domestic_cents)?;
        shipping.regional_cents =
            env_parse("ATRIUM_SHIP_REGIONAL_CENTS", shipping.regional_cents)?;
        shipping.international_cents = env_parse(
            "ATRIUM_SHIP_INTERNATIONAL_CENTS",
            shipping.international_cents,
        )?;

        Ok(CheckoutConfig {
            order_prefix: env::var("ATRIUM_ORDER_PREFIX").unwrap_or(defaults.order_prefix),
            tax_rate_bps: env_parse("ATRIUM_TAX_RATE_BPS", defaults.tax_rate_bps)?,
            cancellation_window_hours: env_parse(
                "ATRIUM_CANCEL_WINDOW_HOURS",
                defaults.cancellation_window_hours,
            )?,
            shipping,
        })
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        CheckoutConfig {
            order_prefix: "ORD".to_string(),
            tax_rate_bps: 825,
            cancellation_window_hours: 24,
            shipping: ShippingTable::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = CheckoutConfig::default();
        assert_eq!(config.order_prefix, "ORD");
        assert_eq!(config.tax_rate().bps(), 825);
        assert_eq!(config.cancellation_window_hours, 24);
        assert_eq!(config.shipping.domestic_cents, 599);
    }
}
