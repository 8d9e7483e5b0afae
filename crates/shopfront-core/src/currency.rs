//! # Currency Module
//!
//! The closed set of display currencies, their symbols and locales, and
//! locale-aware number rendering.
//!
//! ## Lookup Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  "eur" ──► CurrencyCode::from_str ──► Eur ──► config()                  │
//! │                   │                            │                        │
//! │                   │ unknown code               ├── symbol  "€"          │
//! │                   ▼                            └── locale  de-DE        │
//! │        parse_or_canonical ──► Cad                    │                  │
//! │                                                      ▼                  │
//! │                                 NumberStyle { group ".", decimal "," }  │
//! │                                                      │                  │
//! │                                                      ▼                  │
//! │                                               "1.234,56 €"             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Grouping separators are rendered as plain ASCII spaces where a locale
//! uses a space. Digits are always Latin.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;

// =============================================================================
// Currency Code
// =============================================================================

/// ISO 4217 codes the storefront can display prices in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum CurrencyCode {
    Cad,
    Usd,
    Eur,
    Gbp,
    Jpy,
    Aud,
    Chf,
    Cny,
    Inr,
    Ngn,
    Zar,
    Brl,
    Mxn,
    Krw,
    Sgd,
    Hkd,
    Nok,
    Sek,
    Dkk,
    Pln,
    Czk,
    Huf,
    Rub,
    Try,
    Ils,
    Aed,
    Sar,
    Egp,
    Thb,
    Myr,
    Idr,
    Php,
    Vnd,
}

impl CurrencyCode {
    /// Every supported currency, in table order.
    pub const ALL: [CurrencyCode; 33] = [
        CurrencyCode::Cad,
        CurrencyCode::Usd,
        CurrencyCode::Eur,
        CurrencyCode::Gbp,
        CurrencyCode::Jpy,
        CurrencyCode::Aud,
        CurrencyCode::Chf,
        CurrencyCode::Cny,
        CurrencyCode::Inr,
        CurrencyCode::Ngn,
        CurrencyCode::Zar,
        CurrencyCode::Brl,
        CurrencyCode::Mxn,
        CurrencyCode::Krw,
        CurrencyCode::Sgd,
        CurrencyCode::Hkd,
        CurrencyCode::Nok,
        CurrencyCode::Sek,
        CurrencyCode::Dkk,
        CurrencyCode::Pln,
        CurrencyCode::Czk,
        CurrencyCode::Huf,
        CurrencyCode::Rub,
        CurrencyCode::Try,
        CurrencyCode::Ils,
        CurrencyCode::Aed,
        CurrencyCode::Sar,
        CurrencyCode::Egp,
        CurrencyCode::Thb,
        CurrencyCode::Myr,
        CurrencyCode::Idr,
        CurrencyCode::Php,
        CurrencyCode::Vnd,
    ];

    /// The three-letter ISO code.
    pub const fn as_str(&self) -> &'static str {
        self.config().code_str
    }

    /// Symbol and locale for this currency.
    pub const fn config(&self) -> CurrencyConfig {
        use CurrencyCode::*;
        use Locale::*;

        let (code_str, symbol, locale) = match self {
            Cad => ("CAD", "C$", EnCa),
            Usd => ("USD", "$", EnUs),
            Eur => ("EUR", "€", DeDe),
            Gbp => ("GBP", "£", EnGb),
            Jpy => ("JPY", "¥", JaJp),
            Aud => ("AUD", "A$", EnAu),
            Chf => ("CHF", "CHF", DeCh),
            Cny => ("CNY", "¥", ZhCn),
            Inr => ("INR", "₹", EnIn),
            Ngn => ("NGN", "₦", EnNg),
            Zar => ("ZAR", "R", EnZa),
            Brl => ("BRL", "R$", PtBr),
            Mxn => ("MXN", "$", EsMx),
            Krw => ("KRW", "₩", KoKr),
            Sgd => ("SGD", "S$", EnSg),
            Hkd => ("HKD", "HK$", EnHk),
            Nok => ("NOK", "kr", NbNo),
            Sek => ("SEK", "kr", SvSe),
            Dkk => ("DKK", "kr", DaDk),
            Pln => ("PLN", "zł", PlPl),
            Czk => ("CZK", "Kč", CsCz),
            Huf => ("HUF", "Ft", HuHu),
            Rub => ("RUB", "₽", RuRu),
            Try => ("TRY", "₺", TrTr),
            Ils => ("ILS", "₪", HeIl),
            Aed => ("AED", "د.إ", ArAe),
            Sar => ("SAR", "﷼", ArSa),
            Egp => ("EGP", "E£", ArEg),
            Thb => ("THB", "฿", ThTh),
            Myr => ("MYR", "RM", MsMy),
            Idr => ("IDR", "Rp", IdId),
            Php => ("PHP", "₱", EnPh),
            Vnd => ("VND", "₫", ViVn),
        };

        CurrencyConfig {
            code: *self,
            code_str,
            symbol,
            locale,
        }
    }

    /// Parses a code, falling back to the canonical currency when unknown.
    ///
    /// ```rust
    /// use shopfront_core::currency::CurrencyCode;
    ///
    /// assert_eq!(CurrencyCode::parse_or_canonical("eur"), CurrencyCode::Eur);
    /// assert_eq!(CurrencyCode::parse_or_canonical("XYZ"), CurrencyCode::Cad);
    /// ```
    pub fn parse_or_canonical(code: &str) -> CurrencyCode {
        code.parse().unwrap_or(crate::CANONICAL_CURRENCY)
    }
}

impl FromStr for CurrencyCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        CurrencyCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == wanted)
            .ok_or_else(|| CoreError::UnsupportedCurrency(s.trim().to_string()))
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        crate::CANONICAL_CURRENCY
    }
}

// =============================================================================
// Currency Config
// =============================================================================

/// One row of the currency table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyConfig {
    pub code: CurrencyCode,
    pub code_str: &'static str,
    pub symbol: &'static str,
    pub locale: Locale,
}

/// Returns the display symbol for a code, or the code itself if unknown.
pub fn currency_symbol(code: &str) -> String {
    match code.parse::<CurrencyCode>() {
        Ok(currency) => currency.config().symbol.to_string(),
        Err(_) => code.to_string(),
    }
}

// =============================================================================
// Locales
// =============================================================================

/// Locales referenced by the currency table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locale {
    EnCa,
    EnUs,
    DeDe,
    EnGb,
    JaJp,
    EnAu,
    DeCh,
    ZhCn,
    EnIn,
    EnNg,
    EnZa,
    PtBr,
    EsMx,
    KoKr,
    EnSg,
    EnHk,
    NbNo,
    SvSe,
    DaDk,
    PlPl,
    CsCz,
    HuHu,
    RuRu,
    TrTr,
    HeIl,
    ArAe,
    ArSa,
    ArEg,
    ThTh,
    MsMy,
    IdId,
    EnPh,
    ViVn,
}

/// Where the symbol goes relative to the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolPlacement {
    /// `$1,234.56`
    Prefix,
    /// `R$ 1.234,56`
    PrefixSpaced,
    /// `1.234,56 €`
    SuffixSpaced,
}

/// How integer digits are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// 1,234,567
    Thousands,
    /// 12,34,567
    Indian,
}

/// Number rendering rules for a locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberStyle {
    pub group_separator: &'static str,
    pub decimal_separator: &'static str,
    pub placement: SymbolPlacement,
    pub grouping: Grouping,
}

impl Locale {
    /// BCP 47 tag.
    pub const fn tag(&self) -> &'static str {
        use Locale::*;
        match self {
            EnCa => "en-CA",
            EnUs => "en-US",
            DeDe => "de-DE",
            EnGb => "en-GB",
            JaJp => "ja-JP",
            EnAu => "en-AU",
            DeCh => "de-CH",
            ZhCn => "zh-CN",
            EnIn => "en-IN",
            EnNg => "en-NG",
            EnZa => "en-ZA",
            PtBr => "pt-BR",
            EsMx => "es-MX",
            KoKr => "ko-KR",
            EnSg => "en-SG",
            EnHk => "en-HK",
            NbNo => "nb-NO",
            SvSe => "sv-SE",
            DaDk => "da-DK",
            PlPl => "pl-PL",
            CsCz => "cs-CZ",
            HuHu => "hu-HU",
            RuRu => "ru-RU",
            TrTr => "tr-TR",
            HeIl => "he-IL",
            ArAe => "ar-AE",
            ArSa => "ar-SA",
            ArEg => "ar-EG",
            ThTh => "th-TH",
            MsMy => "ms-MY",
            IdId => "id-ID",
            EnPh => "en-PH",
            ViVn => "vi-VN",
        }
    }

    pub const fn style(&self) -> NumberStyle {
        use Grouping::*;
        use Locale::*;
        use SymbolPlacement::*;

        let (group_separator, decimal_separator, placement, grouping) = match self {
            EnCa | EnUs | EnGb | EnAu | EnNg | EnSg | EnHk | EnPh | JaJp | ZhCn | KoKr
            | ThTh | MsMy | EsMx => (",", ".", Prefix, Thousands),
            EnIn => (",", ".", Prefix, Indian),
            EnZa => (" ", ",", Prefix, Thousands),
            TrTr => (".", ",", Prefix, Thousands),
            DeCh => ("’", ".", PrefixSpaced, Thousands),
            PtBr | IdId => (".", ",", PrefixSpaced, Thousands),
            DeDe | DaDk | ViVn => (".", ",", SuffixSpaced, Thousands),
            NbNo | SvSe | PlPl | CsCz | HuHu | RuRu => (" ", ",", SuffixSpaced, Thousands),
            HeIl | ArAe | ArSa | ArEg => (",", ".", SuffixSpaced, Thousands),
        };

        NumberStyle {
            group_separator,
            decimal_separator,
            placement,
            grouping,
        }
    }
}

// =============================================================================
// Formatting
// =============================================================================

/// Formats an amount already in `currency`, with two fraction digits.
///
/// No conversion happens here. Zero and amounts that round to zero never
/// carry a minus sign.
///
/// ```rust
/// use rust_decimal::Decimal;
/// use shopfront_core::currency::{format_amount, CurrencyCode};
///
/// assert_eq!(format_amount(Decimal::new(123456, 2), CurrencyCode::Usd), "$1,234.56");
/// assert_eq!(format_amount(Decimal::new(123456, 2), CurrencyCode::Eur), "1.234,56 €");
/// ```
pub fn format_amount(amount: Decimal, currency: CurrencyCode) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let config = currency.config();
    let style = config.locale.style();
    let number = format!(
        "{}{}{}",
        group_digits(int_part, style.group_separator, style.grouping),
        style.decimal_separator,
        frac_part
    );

    place_symbol(&number, config.symbol, style.placement, negative)
}

/// Formats with a K/M/B/T suffix once the amount reaches 1000.
///
/// Below 1000 this is identical to [`format_amount`].
///
/// ```rust
/// use rust_decimal::Decimal;
/// use shopfront_core::currency::{format_compact, CurrencyCode};
///
/// assert_eq!(format_compact(Decimal::new(1500, 0), CurrencyCode::Usd), "$1.5K");
/// assert_eq!(format_compact(Decimal::new(999, 0), CurrencyCode::Usd), "$999.00");
/// ```
pub fn format_compact(amount: Decimal, currency: CurrencyCode) -> String {
    const UNITS: [(i64, &str); 4] = [
        (1_000, "K"),
        (1_000_000, "M"),
        (1_000_000_000, "B"),
        (1_000_000_000_000, "T"),
    ];

    let magnitude = amount.abs();
    if magnitude < Decimal::from(1_000) {
        return format_amount(amount, currency);
    }

    let mut unit = 0;
    while unit + 1 < UNITS.len() && magnitude >= Decimal::from(UNITS[unit + 1].0) {
        unit += 1;
    }

    let mut scaled = (magnitude / Decimal::from(UNITS[unit].0))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    // 999_950 rounds to 1000.0K, which reads better as 1M
    if scaled >= Decimal::from(1_000) && unit + 1 < UNITS.len() {
        unit += 1;
        scaled = (magnitude / Decimal::from(UNITS[unit].0))
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    }

    let config = currency.config();
    let style = config.locale.style();
    let number = format!(
        "{}{}",
        scaled.normalize().to_string().replace('.', style.decimal_separator),
        UNITS[unit].1
    );

    place_symbol(&number, config.symbol, style.placement, amount.is_sign_negative())
}

fn place_symbol(number: &str, symbol: &str, placement: SymbolPlacement, negative: bool) -> String {
    let sign = if negative { "-" } else { "" };
    match placement {
        SymbolPlacement::Prefix => format!("{sign}{symbol}{number}"),
        SymbolPlacement::PrefixSpaced => format!("{sign}{symbol} {number}"),
        SymbolPlacement::SuffixSpaced => format!("{sign}{number} {symbol}"),
    }
}

fn group_digits(digits: &str, separator: &str, grouping: Grouping) -> String {
    let bytes = digits.as_bytes();
    let len = bytes.len();
    if len <= 3 {
        return digits.to_string();
    }

    // Indices (from the left) before which a separator goes.
    let mut breaks = Vec::new();
    let mut pos = len - 3;
    breaks.push(pos);
    let step = match grouping {
        Grouping::Thousands => 3,
        Grouping::Indian => 2,
    };
    while pos > step {
        pos -= step;
        breaks.push(pos);
    }

    let mut out = String::with_capacity(len + breaks.len() * separator.len());
    for (i, ch) in digits.chars().enumerate() {
        if breaks.contains(&i) {
            out.push_str(separator);
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: i64, scale: u32) -> Decimal {
        Decimal::new(value, scale)
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("usd".parse::<CurrencyCode>().unwrap(), CurrencyCode::Usd);
        assert_eq!(" GBP ".parse::<CurrencyCode>().unwrap(), CurrencyCode::Gbp);
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_table_is_complete_and_unique() {
        let mut codes: Vec<&str> = CurrencyCode::ALL.iter().map(|c| c.as_str()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 33);
        for code in CurrencyCode::ALL {
            assert_eq!(code.as_str().parse::<CurrencyCode>().unwrap(), code);
        }
    }

    #[test]
    fn test_serde_uses_iso_codes() {
        assert_eq!(serde_json::to_string(&CurrencyCode::Hkd).unwrap(), "\"HKD\"");
        let parsed: CurrencyCode = serde_json::from_str("\"JPY\"").unwrap();
        assert_eq!(parsed, CurrencyCode::Jpy);
    }

    #[test]
    fn test_currency_symbol_falls_back_to_code() {
        assert_eq!(currency_symbol("EUR"), "€");
        assert_eq!(currency_symbol("CAD"), "C$");
        assert_eq!(currency_symbol("XYZ"), "XYZ");
    }

    #[test]
    fn test_format_amount_per_locale() {
        let amount = dec(123456789, 2); // 1234567.89
        assert_eq!(format_amount(amount, CurrencyCode::Cad), "C$1,234,567.89");
        assert_eq!(format_amount(amount, CurrencyCode::Eur), "1.234.567,89 €");
        assert_eq!(format_amount(amount, CurrencyCode::Brl), "R$ 1.234.567,89");
        assert_eq!(format_amount(amount, CurrencyCode::Sek), "1 234 567,89 kr");
        assert_eq!(format_amount(amount, CurrencyCode::Inr), "₹12,34,567.89");
        assert_eq!(format_amount(amount, CurrencyCode::Chf), "CHF 1’234’567.89");
    }

    #[test]
    fn test_format_amount_rounds_half_away_from_zero() {
        assert_eq!(format_amount(dec(21_8927, 4), CurrencyCode::Usd), "$21.89");
        assert_eq!(format_amount(dec(1_005, 3), CurrencyCode::Usd), "$1.01");
        assert_eq!(format_amount(dec(-550, 2), CurrencyCode::Usd), "-$5.50");
    }

    #[test]
    fn test_zero_never_shows_a_sign() {
        for currency in CurrencyCode::ALL {
            let plain = format_amount(Decimal::ZERO, currency);
            assert!(!plain.contains('-'), "{currency}: {plain}");

            let negative_zero = format_amount(dec(-1, 3), currency);
            assert!(!negative_zero.contains('-'), "{currency}: {negative_zero}");

            let compact = format_compact(Decimal::ZERO, currency);
            assert!(!compact.contains('-'), "{currency}: {compact}");
        }
    }

    #[test]
    fn test_format_compact() {
        assert_eq!(format_compact(dec(1_500, 0), CurrencyCode::Usd), "$1.5K");
        assert_eq!(format_compact(dec(2_000_000, 0), CurrencyCode::Usd), "$2M");
        assert_eq!(format_compact(dec(999_950, 0), CurrencyCode::Usd), "$1M");
        assert_eq!(format_compact(dec(1_250, 0), CurrencyCode::Eur), "1,3K €");
    }

    #[test]
    fn test_group_digits_short_numbers_untouched() {
        assert_eq!(group_digits("0", ",", Grouping::Thousands), "0");
        assert_eq!(group_digits("999", ",", Grouping::Indian), "999");
        assert_eq!(group_digits("1000", ",", Grouping::Thousands), "1,000");
        assert_eq!(group_digits("100000", ",", Grouping::Indian), "1,00,000");
    }
}
