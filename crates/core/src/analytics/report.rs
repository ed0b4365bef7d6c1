use crate::analytics::evaluator::{analyze_recommendation, RecommendationAnalysis};
use crate::domain::stock::{Horizon, Sentiment, StockDataset};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-sentiment accuracy counters. `correct <= valid <= total` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentimentStats {
    pub total: u64,
    pub correct: u64,
    pub valid: u64,
}

/// The full accuracy report over a dataset snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub total: u64,
    pub accurate: u64,
    #[serde(rename = "validRecommendations")]
    pub valid_recommendations: u64,
    #[serde(rename = "byType")]
    pub by_type: BTreeMap<String, SentimentStats>,
    pub details: Vec<RecommendationAnalysis>,
}

/// Runs the evaluator over every recommendation of every stock.
///
/// Recommendations missing a date or a sentiment are skipped before they can
/// count toward `total`. Unknown sentiment labels have no bucket in `byType`
/// and silently skip the bucket update while still counting toward
/// `validRecommendations`; their analyses land in `details` like any other.
pub fn analyze_all(dataset: &StockDataset) -> AnalysisReport {
    let mut report = AnalysisReport {
        total: 0,
        accurate: 0,
        valid_recommendations: 0,
        by_type: Sentiment::ALL
            .iter()
            .map(|s| (s.label().to_string(), SentimentStats::default()))
            .collect(),
        details: Vec::new(),
    };

    for (ticker, stock) in dataset {
        let Some(recommendations) = &stock.recommendations else {
            tracing::debug!(ticker, "no recommendation list; skipping stock");
            continue;
        };

        for rec in recommendations {
            let (Some(date), Some(sentiment)) = (rec.date, rec.sentiment.as_deref()) else {
                tracing::debug!(ticker, "recommendation missing date or sentiment; skipping");
                continue;
            };

            let analysis = analyze_recommendation(ticker, stock, date, sentiment);
            report.total += 1;

            if analysis.has_valid_period {
                report.valid_recommendations += 1;
                if let Some(stats) = report.by_type.get_mut(&analysis.sentiment) {
                    stats.valid += 1;
                    stats.total += 1;
                    if analysis.accurate {
                        stats.correct += 1;
                        report.accurate += 1;
                    }
                }
            }

            report.details.push(analysis);
        }
    }

    tracing::info!(
        total = report.total,
        valid = report.valid_recommendations,
        accurate = report.accurate,
        "recommendation analysis complete"
    );

    report
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PeriodTypeStats {
    pub total: u64,
    pub correct: u64,
}

/// Accuracy counters for one horizon, with a per-sentiment breakdown keyed by
/// the label seen in the details (unknown labels included).
#[derive(Debug, Clone, Default, Serialize)]
pub struct PeriodStats {
    pub total: u64,
    pub correct: u64,
    #[serde(rename = "byType")]
    pub by_type: BTreeMap<String, PeriodTypeStats>,
}

/// Coarse single-threshold judgment used for the per-horizon breakdown. Zero
/// and unknown sentiments are never correct.
fn directional_accuracy(sentiment: &str, r: f64) -> bool {
    if r == 0.0 {
        return false;
    }
    match Sentiment::parse(sentiment) {
        Some(Sentiment::StrongBuy) => r >= 10.0,
        Some(Sentiment::Buy) => r >= 5.0,
        Some(Sentiment::Hold) => r.abs() < 5.0,
        Some(Sentiment::Sell) => r <= -5.0,
        Some(Sentiment::StrongSell) => r <= -10.0,
        None => false,
    }
}

/// Breaks a finished report down by horizon: how many recommendations had a
/// resolvable return at that horizon, and how many were directionally right.
pub fn period_accuracy(report: &AnalysisReport) -> BTreeMap<Horizon, PeriodStats> {
    let mut out: BTreeMap<Horizon, PeriodStats> = Horizon::ALL
        .iter()
        .map(|h| (*h, PeriodStats::default()))
        .collect();

    for detail in &report.details {
        for horizon in Horizon::ALL {
            let Some(Some(r)) = detail.returns.get(&horizon) else {
                continue;
            };
            let stats = out.entry(horizon).or_default();
            stats.total += 1;
            let by_type = stats.by_type.entry(detail.sentiment.clone()).or_default();
            by_type.total += 1;
            if directional_accuracy(&detail.sentiment, *r) {
                stats.correct += 1;
                by_type.correct += 1;
            }
        }
    }

    out
}
