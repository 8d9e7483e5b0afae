//! # Shipping Rules
//!
//! Maps a destination to a flat shipping fee in the canonical currency.
//!
//! ```text
//! country == domestic && region ∈ local_regions  ──►  free
//! country == domestic                             ──►  domestic_rate
//! anything else                                   ──►  international_rate
//! ```
//!
//! Comparisons trim whitespace and ignore ASCII case.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::Destination;

/// Flat-rate shipping table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRules {
    pub domestic_country: String,
    /// Regions inside the domestic country that ship free.
    pub local_regions: Vec<String>,
    pub domestic_rate: Money,
    pub international_rate: Money,
}

impl Default for ShippingRules {
    fn default() -> Self {
        Self {
            domestic_country: "CA".to_string(),
            local_regions: vec!["ON".to_string()],
            domestic_rate: Money::from_cents(1_500),
            international_rate: Money::from_cents(3_000),
        }
    }
}

impl ShippingRules {
    /// Shipping fee for a country/region pair.
    ///
    /// ```rust
    /// use shopfront_core::money::Money;
    /// use shopfront_core::shipping::ShippingRules;
    ///
    /// let rules = ShippingRules::default();
    /// assert_eq!(rules.shipping_cost("CA", "ON"), Money::zero());
    /// assert_eq!(rules.shipping_cost("CA", "BC").cents(), 1_500);
    /// assert_eq!(rules.shipping_cost("US", "NY").cents(), 3_000);
    /// ```
    pub fn shipping_cost(&self, country: &str, region: &str) -> Money {
        if !self.is_domestic(country) {
            return self.international_rate;
        }

        let region = region.trim();
        if self
            .local_regions
            .iter()
            .any(|local| local.trim().eq_ignore_ascii_case(region))
        {
            Money::zero()
        } else {
            self.domestic_rate
        }
    }

    pub fn cost_for(&self, destination: &Destination) -> Money {
        self.shipping_cost(&destination.country, &destination.region)
    }

    pub fn is_domestic(&self, country: &str) -> bool {
        country
            .trim()
            .eq_ignore_ascii_case(self.domestic_country.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let rules = ShippingRules::default();
        assert_eq!(rules.shipping_cost(" ca ", "on"), Money::zero());
        assert_eq!(rules.shipping_cost("Ca", " qc"), Money::from_cents(1_500));
    }

    #[test]
    fn test_region_ignored_outside_domestic_country() {
        let rules = ShippingRules::default();
        // ON is free only inside CA
        assert_eq!(rules.shipping_cost("US", "ON"), Money::from_cents(3_000));
        assert_eq!(rules.shipping_cost("GB", ""), Money::from_cents(3_000));
    }

    #[test]
    fn test_empty_region_in_domestic_country_pays_domestic_rate() {
        let rules = ShippingRules::default();
        assert_eq!(rules.shipping_cost("CA", ""), Money::from_cents(1_500));
    }

    #[test]
    fn test_custom_rules() {
        let rules = ShippingRules {
            domestic_country: "US".into(),
            local_regions: vec!["NY".into(), "NJ".into()],
            domestic_rate: Money::from_cents(800),
            international_rate: Money::from_cents(2_500),
        };
        assert_eq!(rules.cost_for(&Destination::new("US", "NJ")), Money::zero());
        assert_eq!(rules.cost_for(&Destination::new("US", "CA")), Money::from_cents(800));
        assert_eq!(rules.cost_for(&Destination::new("CA", "ON")), Money::from_cents(2_500));
    }
}
