//! # Shipping Cost Table
//!
//! Flat-tier shipping pricing keyed by destination country.
//!
//! The real pricing source is an external collaborator of the transaction
//! engine; this module is its contract expressed as a pure lookup table so
//! the order workflow can compute totals without I/O.
//!
//! ```text
//! destination country ──► zone ──► flat cost
//!
//!   US (home)            Domestic       $5.99
//!   CA, MX               Regional      $14.99
//!   everything else      International $29.99
//! ```

use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Shipping Zone
// =============================================================================

/// Pricing tier for a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingZone {
    Domestic,
    Regional,
    International,
}

// =============================================================================
// Shipping Table
// =============================================================================

/// Flat shipping costs per zone, plus the country → zone mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingTable {
    /// Home country (ISO 3166-1 alpha-2).
    pub domestic_country: String,
    /// Countries billed at the regional tier.
    pub regional_countries: Vec<String>,
    pub domestic_cents: i64,
    pub regional_cents: i64,
    pub international_cents: i64,
}

impl ShippingTable {
    /// Resolves the zone for a destination country code.
    ///
    /// Comparison is case-insensitive; unknown countries fall into the
    /// international tier.
    pub fn zone_for(&self, country: &str) -> ShippingZone {
        let country = country.trim();
        if country.eq_ignore_ascii_case(&self.domestic_country) {
            return ShippingZone::Domestic;
        }
        if self
            .regional_countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(country))
        {
            return ShippingZone::Regional;
        }
        ShippingZone::International
    }

    /// Returns the flat cost for shipping to a destination country.
    pub fn cost_for(&self, country: &str) -> Money {
        match self.zone_for(country) {
            ShippingZone::Domestic => Money::from_cents(self.domestic_cents),
            ShippingZone::Regional => Money::from_cents(self.regional_cents),
            ShippingZone::International => Money::from_cents(self.international_cents),
        }
    }
}

impl Default for ShippingTable {
    fn default() -> Self {
        ShippingTable {
            domestic_country: "US".to_string(),
            regional_countries: vec!["CA".to_string(), "MX".to_string()],
            domestic_cents: 599,
            regional_cents: 1499,
            international_cents: 2999,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
