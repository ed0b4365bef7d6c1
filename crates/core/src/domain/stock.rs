use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One weekly closing price sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// An analyst recommendation as it appears in the dataset. Date and sentiment
/// may be missing in scraped data; such entries are skipped by the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub date: Option<NaiveDate>,
    pub sentiment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_at_report: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    pub ticker: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub weekly_prices: Vec<PricePoint>,
    /// None when the source carried no usable recommendation list; the
    /// aggregator skips such stocks for the pass.
    #[serde(default)]
    pub recommendations: Option<Vec<Recommendation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_quote: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fundamentals: Option<serde_json::Value>,
}

/// Snapshot of all known stocks, keyed by ticker.
pub type StockDataset = BTreeMap<String, Stock>;

/// Forward time window measured in calendar days from a recommendation date.
/// Variant order matters: it drives map ordering in serialized reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "2Y")]
    TwoYears,
    #[serde(rename = "5Y")]
    FiveYears,
}

impl Horizon {
    pub const ALL: [Horizon; 5] = [
        Horizon::ThreeMonths,
        Horizon::SixMonths,
        Horizon::OneYear,
        Horizon::TwoYears,
        Horizon::FiveYears,
    ];

    pub const SHORT_TERM: [Horizon; 2] = [Horizon::ThreeMonths, Horizon::SixMonths];
    pub const LONG_TERM: [Horizon; 3] = [Horizon::OneYear, Horizon::TwoYears, Horizon::FiveYears];

    /// Calendar days, not trading days. Weekends and market closures are
    /// deliberately not accounted for.
    pub fn days(self) -> i64 {
        match self {
            Horizon::ThreeMonths => 90,
            Horizon::SixMonths => 180,
            Horizon::OneYear => 365,
            Horizon::TwoYears => 730,
            Horizon::FiveYears => 1825,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Horizon::ThreeMonths => "3M",
            Horizon::SixMonths => "6M",
            Horizon::OneYear => "1Y",
            Horizon::TwoYears => "2Y",
            Horizon::FiveYears => "5Y",
        }
    }

    pub fn is_short_term(self) -> bool {
        matches!(self, Horizon::ThreeMonths | Horizon::SixMonths)
    }
}

/// Categorical recommendation label. Unrecognized labels stay as plain
/// strings in the analysis output and never contribute to accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Sentiment {
    pub const ALL: [Sentiment; 5] = [
        Sentiment::StrongBuy,
        Sentiment::Buy,
        Sentiment::Hold,
        Sentiment::Sell,
        Sentiment::StrongSell,
    ];

    /// Case-insensitive match against the five known labels.
    pub fn parse(s: &str) -> Option<Sentiment> {
        match s.to_uppercase().as_str() {
            "STRONG BUY" => Some(Sentiment::StrongBuy),
            "BUY" => Some(Sentiment::Buy),
            "HOLD" => Some(Sentiment::Hold),
            "SELL" => Some(Sentiment::Sell),
            "STRONG SELL" => Some(Sentiment::StrongSell),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Sentiment::StrongBuy => "STRONG BUY",
            Sentiment::Buy => "BUY",
            Sentiment::Hold => "HOLD",
            Sentiment::Sell => "SELL",
            Sentiment::StrongSell => "STRONG SELL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizon_serializes_as_period_label() {
        for horizon in Horizon::ALL {
            let s = serde_json::to_value(horizon).unwrap();
            assert_eq!(s, serde_json::Value::String(horizon.label().to_string()));
        }
    }

    #[test]
    fn horizon_groups_partition_all() {
        let mut grouped: Vec<Horizon> = Horizon::SHORT_TERM
            .iter()
            .chain(Horizon::LONG_TERM.iter())
            .copied()
            .collect();
        grouped.sort();
        assert_eq!(grouped, Horizon::ALL);
    }

    #[test]
    fn sentiment_parse_is_case_insensitive() {
        assert_eq!(Sentiment::parse("strong buy"), Some(Sentiment::StrongBuy));
        assert_eq!(Sentiment::parse("Hold"), Some(Sentiment::Hold));
        assert_eq!(Sentiment::parse("SELL"), Some(Sentiment::Sell));
        assert_eq!(Sentiment::parse("WATCH"), None);
        assert_eq!(Sentiment::parse(""), None);
    }
}
