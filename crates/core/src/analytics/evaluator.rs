use crate::analytics::matcher::find_closest_price;
use crate::domain::stock::{Horizon, Sentiment, Stock};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// Retrospective judgment of a single recommendation. Pure derivation from
/// the stock's price series; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationAnalysis {
    pub ticker: String,
    pub date: NaiveDate,
    /// Upper-cased sentiment label, kept even when unrecognized.
    pub sentiment: String,
    pub initial_price: Option<f64>,
    pub prices: BTreeMap<Horizon, Option<f64>>,
    pub returns: BTreeMap<Horizon, Option<f64>>,
    pub accuracy_by_period: BTreeMap<Horizon, Option<bool>>,
    pub accurate: bool,
    pub has_valid_period: bool,
    pub short_term_accurate: bool,
    pub long_term_accurate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// Directional-correctness rule applied to a percent return.
#[derive(Debug, Clone, Copy)]
enum Rule {
    Above(f64),
    Below(f64),
    WithinAbs(f64),
}

impl Rule {
    fn check(self, r: f64) -> bool {
        match self {
            Rule::Above(t) => r > t,
            Rule::Below(t) => r < t,
            Rule::WithinAbs(t) => r.abs() <= t,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Thresholds {
    short_term: Rule,
    long_term: Rule,
}

fn thresholds(sentiment: Sentiment) -> Thresholds {
    match sentiment {
        Sentiment::StrongBuy => Thresholds {
            short_term: Rule::Above(5.0),
            long_term: Rule::Above(15.0),
        },
        Sentiment::Buy => Thresholds {
            short_term: Rule::Above(3.0),
            long_term: Rule::Above(10.0),
        },
        Sentiment::Hold => Thresholds {
            short_term: Rule::WithinAbs(10.0),
            long_term: Rule::Above(0.0),
        },
        Sentiment::Sell => Thresholds {
            short_term: Rule::Below(-3.0),
            long_term: Rule::Below(-10.0),
        },
        Sentiment::StrongSell => Thresholds {
            short_term: Rule::Below(-5.0),
            long_term: Rule::Below(-15.0),
        },
    }
}

/// Percentage return from `start` to `end`, rounded to two decimal places.
/// None when either price is missing the way the dataset encodes missing
/// (zero) or is not a finite number.
pub fn percent_return(start: f64, end: f64) -> Option<f64> {
    if !start.is_finite() || !end.is_finite() || start == 0.0 || end == 0.0 {
        return None;
    }
    Some(((end - start) / start * 100.0 * 100.0).round() / 100.0)
}

/// Evaluates one recommendation against the stock's weekly price series.
///
/// The initial price is matched at the recommendation date itself; without it
/// the whole recommendation is void and no horizon is evaluated. Otherwise
/// each horizon resolves independently: target date is plain calendar
/// arithmetic, the matched price feeds the return, and the sentiment rule for
/// the horizon's group decides the accuracy flag. A resolved return marks its
/// group valid even when the sentiment is unrecognized, so such
/// recommendations can still count as having a valid period.
pub fn analyze_recommendation(
    ticker: &str,
    stock: &Stock,
    date: NaiveDate,
    sentiment: &str,
) -> RecommendationAnalysis {
    let sentiment_label = sentiment.to_uppercase();

    let Some(initial) = find_closest_price(&stock.weekly_prices, date) else {
        tracing::debug!(ticker, %date, "no price within tolerance of recommendation date");
        return RecommendationAnalysis {
            ticker: ticker.to_string(),
            date,
            sentiment: sentiment_label,
            initial_price: None,
            prices: BTreeMap::new(),
            returns: BTreeMap::new(),
            accuracy_by_period: BTreeMap::new(),
            accurate: false,
            has_valid_period: false,
            short_term_accurate: false,
            long_term_accurate: false,
            error: Some("Missing initial price"),
        };
    };

    let rules = Sentiment::parse(&sentiment_label).map(thresholds);

    let mut prices = BTreeMap::new();
    let mut returns = BTreeMap::new();
    let mut accuracy_by_period = BTreeMap::new();
    let mut has_valid_short_term = false;
    let mut has_valid_long_term = false;

    for horizon in Horizon::ALL {
        let target = date + Duration::days(horizon.days());
        let period_price = find_closest_price(&stock.weekly_prices, target).map(|p| p.close);
        let ret = period_price.and_then(|p| percent_return(initial.close, p));

        let flag = match ret {
            Some(r) => {
                if horizon.is_short_term() {
                    has_valid_short_term = true;
                } else {
                    has_valid_long_term = true;
                }
                rules.map(|rules| {
                    if horizon.is_short_term() {
                        rules.short_term.check(r)
                    } else {
                        rules.long_term.check(r)
                    }
                })
            }
            None => None,
        };

        prices.insert(horizon, period_price);
        returns.insert(horizon, ret);
        accuracy_by_period.insert(horizon, flag);
    }

    let short_term_accurate = has_valid_short_term
        && Horizon::SHORT_TERM
            .iter()
            .any(|h| accuracy_by_period.get(h) == Some(&Some(true)));
    let long_term_accurate = has_valid_long_term
        && Horizon::LONG_TERM
            .iter()
            .any(|h| accuracy_by_period.get(h) == Some(&Some(true)));

    RecommendationAnalysis {
        ticker: ticker.to_string(),
        date,
        sentiment: sentiment_label,
        initial_price: Some(initial.close),
        prices,
        returns,
        accuracy_by_period,
        accurate: short_term_accurate || long_term_accurate,
        has_valid_period: has_valid_short_term || has_valid_long_term,
        short_term_accurate,
        long_term_accurate,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stock::PricePoint;

    fn stock_with_prices(points: &[(&str, f64)]) -> Stock {
        Stock {
            ticker: "TEST".to_string(),
            company_name: None,
            market: None,
            sector: None,
            weekly_prices: points
                .iter()
                .map(|(date, close)| PricePoint {
                    date: date.parse().unwrap(),
                    close: *close,
                })
                .collect(),
            recommendations: Some(Vec::new()),
            current_quote: None,
            fundamentals: None,
        }
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn percent_return_rounds_to_two_decimals() {
        assert_eq!(percent_return(100.0, 106.0), Some(6.0));
        assert_eq!(percent_return(3.0, 4.0), Some(33.33));
        assert_eq!(percent_return(100.0, 98.0), Some(-2.0));
    }

    #[test]
    fn percent_return_rejects_zero_and_non_finite_prices() {
        assert_eq!(percent_return(0.0, 106.0), None);
        assert_eq!(percent_return(100.0, 0.0), None);
        assert_eq!(percent_return(f64::NAN, 106.0), None);
        assert_eq!(percent_return(100.0, f64::INFINITY), None);
    }

    #[test]
    fn missing_initial_price_voids_the_recommendation() {
        // Later data exists, but nothing within 5 days of the recommendation.
        let stock = stock_with_prices(&[("2023-04-01", 120.0)]);
        let analysis = analyze_recommendation("TEST", &stock, date("2023-01-01"), "BUY");

        assert!(!analysis.has_valid_period);
        assert!(!analysis.accurate);
        assert_eq!(analysis.initial_price, None);
        assert!(analysis.prices.is_empty());
        assert!(analysis.returns.is_empty());
        assert!(analysis.accuracy_by_period.is_empty());
        assert_eq!(analysis.error, Some("Missing initial price"));
    }

    #[test]
    fn unresolvable_horizon_yields_null_return_and_null_flag() {
        // Scenario A: only the initial price exists.
        let stock = stock_with_prices(&[("2023-01-01", 100.0)]);
        let analysis = analyze_recommendation("TEST", &stock, date("2023-01-01"), "BUY");

        assert_eq!(analysis.returns[&Horizon::ThreeMonths], None);
        assert_eq!(analysis.accuracy_by_period[&Horizon::ThreeMonths], None);
        assert!(!analysis.has_valid_period);
        assert!(!analysis.accurate);
    }

    #[test]
    fn buy_short_term_gain_above_threshold_is_accurate() {
        // Scenario B: 3M target 2023-04-01, price found 2023-04-02.
        let stock = stock_with_prices(&[("2023-01-01", 100.0), ("2023-04-02", 106.0)]);
        let analysis = analyze_recommendation("TEST", &stock, date("2023-01-01"), "BUY");

        assert_eq!(analysis.returns[&Horizon::ThreeMonths], Some(6.0));
        assert_eq!(analysis.accuracy_by_period[&Horizon::ThreeMonths], Some(true));
        assert!(analysis.short_term_accurate);
        assert!(!analysis.long_term_accurate);
        assert!(analysis.accurate);
        assert!(analysis.has_valid_period);
    }

    #[test]
    fn hold_long_term_requires_positive_return() {
        // Scenario C: 1Y return of -2% fails the long-term HOLD rule.
        let stock = stock_with_prices(&[("2023-01-01", 100.0), ("2024-01-01", 98.0)]);
        let analysis = analyze_recommendation("TEST", &stock, date("2023-01-01"), "HOLD");

        assert_eq!(analysis.returns[&Horizon::OneYear], Some(-2.0));
        assert_eq!(analysis.accuracy_by_period[&Horizon::OneYear], Some(false));
        assert!(!analysis.long_term_accurate);
        assert!(!analysis.accurate);
    }

    #[test]
    fn hold_short_term_tolerates_moves_within_ten_percent() {
        let stock = stock_with_prices(&[("2023-01-01", 100.0), ("2023-04-01", 92.0)]);
        let analysis = analyze_recommendation("TEST", &stock, date("2023-01-01"), "HOLD");

        assert_eq!(analysis.returns[&Horizon::ThreeMonths], Some(-8.0));
        assert_eq!(analysis.accuracy_by_period[&Horizon::ThreeMonths], Some(true));
        assert!(analysis.short_term_accurate);
    }

    #[test]
    fn sell_sentiments_need_sufficient_declines() {
        let stock = stock_with_prices(&[("2023-01-01", 100.0), ("2023-04-01", 96.0)]);

        let sell = analyze_recommendation("TEST", &stock, date("2023-01-01"), "SELL");
        assert_eq!(sell.accuracy_by_period[&Horizon::ThreeMonths], Some(true));

        // -4% is not enough for STRONG SELL (needs < -5%).
        let strong = analyze_recommendation("TEST", &stock, date("2023-01-01"), "STRONG SELL");
        assert_eq!(strong.accuracy_by_period[&Horizon::ThreeMonths], Some(false));
    }

    #[test]
    fn strong_buy_long_term_threshold_is_fifteen_percent() {
        let stock = stock_with_prices(&[("2023-01-01", 100.0), ("2024-01-01", 115.0)]);
        let analysis = analyze_recommendation("TEST", &stock, date("2023-01-01"), "strong buy");

        // Exactly +15% does not clear the strict > 15 rule.
        assert_eq!(analysis.returns[&Horizon::OneYear], Some(15.0));
        assert_eq!(analysis.accuracy_by_period[&Horizon::OneYear], Some(false));
    }

    #[test]
    fn unrecognized_sentiment_resolves_returns_but_never_accuracy() {
        // Scenario D: returns exist for every horizon, flags stay null.
        let stock = stock_with_prices(&[
            ("2023-01-01", 100.0),
            ("2023-04-01", 110.0),
            ("2023-06-30", 120.0),
            ("2024-01-01", 130.0),
            ("2024-12-31", 140.0),
            ("2027-12-31", 150.0),
        ]);
        let analysis = analyze_recommendation("TEST", &stock, date("2023-01-01"), "WATCH");

        assert_eq!(analysis.sentiment, "WATCH");
        assert!(analysis.returns.values().all(|r| r.is_some()));
        assert!(analysis.accuracy_by_period.values().all(|f| f.is_none()));
        assert!(analysis.has_valid_period);
        assert!(!analysis.accurate);
        assert!(!analysis.short_term_accurate);
        assert!(!analysis.long_term_accurate);
    }

    #[test]
    fn analysis_is_deterministic() {
        let stock = stock_with_prices(&[("2023-01-01", 100.0), ("2023-04-02", 106.0)]);
        let a = analyze_recommendation("TEST", &stock, date("2023-01-01"), "BUY");
        let b = analyze_recommendation("TEST", &stock, date("2023-01-01"), "BUY");
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn serialized_field_names_match_the_dashboard_contract() {
        let stock = stock_with_prices(&[("2023-01-01", 100.0), ("2023-04-02", 106.0)]);
        let analysis = analyze_recommendation("TEST", &stock, date("2023-01-01"), "BUY");
        let value = serde_json::to_value(&analysis).unwrap();

        for key in [
            "ticker",
            "date",
            "sentiment",
            "initialPrice",
            "prices",
            "returns",
            "accuracyByPeriod",
            "accurate",
            "hasValidPeriod",
            "shortTermAccurate",
            "longTermAccurate",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert!(value.get("error").is_none());
        assert_eq!(value["returns"]["3M"], serde_json::json!(6.0));
    }
}
