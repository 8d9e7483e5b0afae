//! # Price Formatter
//!
//! Renders canonical-currency amounts in the shopper's display currency.
//!
//! ```text
//! Money (CAD cents) ──► RateCache::get_rate(CAD, target) ──► amount × rate
//!                                                               │
//!                        currency table (symbol, locale) ◄──────┘
//!                                   │
//!                                   ▼
//!                     "1.234,56 €"  [+ " EUR"]  [+ " (C$1,815.53 CAD)"]
//! ```
//!
//! Formatting never fails. When no usable rate exists or the conversion
//! overflows, the amount is shown in the canonical currency instead.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::warn;

use crate::currency_store::DisplayCurrencyStore;
use crate::rates::RateCache;
use shopfront_core::currency::{format_amount, format_compact};
use shopfront_core::{CurrencyCode, Money};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatOptions {
    /// Append the canonical amount in parentheses.
    pub show_canonical_equivalent: bool,
    /// Abbreviate amounts of 1000 or more (K, M, B, T).
    pub compact: bool,
    /// Append the ISO code.
    pub show_currency_code: bool,
}

impl FormatOptions {
    pub fn compact() -> Self {
        FormatOptions {
            compact: true,
            ..Default::default()
        }
    }

    pub fn with_code() -> Self {
        FormatOptions {
            show_currency_code: true,
            ..Default::default()
        }
    }

    pub fn with_canonical_equivalent() -> Self {
        FormatOptions {
            show_canonical_equivalent: true,
            ..Default::default()
        }
    }
}

pub struct PriceFormatter {
    rates: Arc<RateCache>,
    display: Arc<DisplayCurrencyStore>,
    canonical: CurrencyCode,
}

impl PriceFormatter {
    pub fn new(
        rates: Arc<RateCache>,
        display: Arc<DisplayCurrencyStore>,
        canonical: CurrencyCode,
    ) -> Self {
        PriceFormatter {
            rates,
            display,
            canonical,
        }
    }

    /// Formats in the currency currently selected in the display store.
    pub async fn format_display(&self, amount: Money, options: FormatOptions) -> String {
        self.format(amount, self.display.get(), options).await
    }

    pub async fn format(&self, amount: Money, target: CurrencyCode, options: FormatOptions) -> String {
        if target == self.canonical {
            return render(amount.to_decimal(), self.canonical, options.compact);
        }

        let quote = self.rates.get_rate(self.canonical, target).await;
        if !quote.is_authoritative(self.canonical, target) {
            warn!(
                %target,
                amount = %amount,
                "No exchange rate available, showing canonical price"
            );
            return self.canonical_text(amount, options.compact);
        }

        let converted = match amount.convert(quote.rate) {
            Some(converted) => converted,
            None => {
                warn!(
                    %target,
                    amount = %amount,
                    rate = %quote.rate,
                    "Currency conversion overflowed, showing canonical price"
                );
                return self.canonical_text(amount, options.compact);
            }
        };

        let mut text = render(converted, target, options.compact);
        if options.show_currency_code {
            text.push(' ');
            text.push_str(target.as_str());
        }
        if options.show_canonical_equivalent {
            text.push_str(&format!(
                " ({} {})",
                format_amount(amount.to_decimal(), self.canonical),
                self.canonical
            ));
        }
        text
    }

    fn canonical_text(&self, amount: Money, compact: bool) -> String {
        render(amount.to_decimal(), self.canonical, compact)
    }
}

fn render(amount: Decimal, currency: CurrencyCode, compact: bool) -> String {
    if compact {
        format_compact(amount, currency)
    } else {
        format_amount(amount, currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{memory_db, ManualClock, ScriptedRateProvider};
    use shopfront_db::Database;

    async fn formatter(rate: Option<&str>) -> (Database, PriceFormatter) {
        let db = memory_db().await;
        let primary = match rate {
            Some(r) => ScriptedRateProvider::returning("primary", r.parse().unwrap()),
            None => ScriptedRateProvider::failing("primary"),
        };
        let rates = RateCache::new(
            db.rates(),
            Arc::new(primary),
            Arc::new(ScriptedRateProvider::failing("fallback")),
            Arc::new(ManualClock::new()),
        );
        let display = DisplayCurrencyStore::load(db.preferences(), CurrencyCode::Cad).await;
        let formatter = PriceFormatter::new(Arc::new(rates), Arc::new(display), CurrencyCode::Cad);
        (db, formatter)
    }

    #[tokio::test]
    async fn test_converts_and_formats_per_locale() {
        let (_db, f) = formatter(Some("0.5")).await;
        let amount = Money::from_cents(246_913);

        assert_eq!(
            f.format(amount, CurrencyCode::Eur, FormatOptions::default()).await,
            "1.234,57 €"
        );
        assert_eq!(
            f.format(amount, CurrencyCode::Usd, FormatOptions::with_code()).await,
            "$1,234.57 USD"
        );
        assert_eq!(
            f.format(Money::from_cents(2_000), CurrencyCode::Usd, FormatOptions::with_canonical_equivalent())
                .await,
            "$10.00 (C$20.00 CAD)"
        );
    }

    #[tokio::test]
    async fn test_options_are_no_ops_for_canonical() {
        let (_db, f) = formatter(Some("0.5")).await;
        let options = FormatOptions {
            show_canonical_equivalent: true,
            compact: false,
            show_currency_code: true,
        };
        assert_eq!(
            f.format(Money::from_cents(1_099), CurrencyCode::Cad, options).await,
            "C$10.99"
        );
    }

    #[tokio::test]
    async fn test_compact_only_from_one_thousand() {
        let (_db, f) = formatter(Some("1")).await;

        assert_eq!(
            f.format(Money::from_cents(150_000), CurrencyCode::Usd, FormatOptions::compact())
                .await,
            "$1.5K"
        );
        assert_eq!(
            f.format(Money::from_cents(99_900), CurrencyCode::Usd, FormatOptions::compact())
                .await,
            "$999.00"
        );
    }

    #[tokio::test]
    async fn test_no_rate_falls_back_to_canonical() {
        let (_db, f) = formatter(None).await;
        assert_eq!(
            f.format(Money::from_cents(4_250), CurrencyCode::Eur, FormatOptions::with_code())
                .await,
            "C$42.50"
        );
    }

    #[tokio::test]
    async fn test_zero_never_shows_a_sign() {
        let (_db, f) = formatter(Some("0.73")).await;
        for code in CurrencyCode::ALL {
            let text = f.format(Money::zero(), code, FormatOptions::default()).await;
            assert!(!text.contains('-'), "{code}: {text}");
        }
    }

    #[tokio::test]
    async fn test_format_display_follows_store() {
        let (_db, f) = formatter(Some("0.5")).await;
        assert_eq!(
            f.format_display(Money::from_cents(1_000), FormatOptions::default()).await,
            "C$10.00"
        );

        f.display.set(CurrencyCode::Usd).await;
        assert_eq!(
            f.format_display(Money::from_cents(1_000), FormatOptions::default()).await,
            "$5.00"
        );
    }
}
