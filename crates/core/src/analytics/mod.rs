pub mod evaluator;
pub mod matcher;
pub mod report;

pub use evaluator::{analyze_recommendation, percent_return, RecommendationAnalysis};
pub use matcher::{find_closest_price, MATCH_TOLERANCE_DAYS};
pub use report::{analyze_all, period_accuracy, AnalysisReport, PeriodStats, SentimentStats};
