use crate::domain::stock::{PricePoint, Recommendation, Stock, StockDataset};
use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Stock record as it appears in the snapshot file, before normalization.
/// The ticker lives in the map key, descriptive fields are optional, and
/// recommendation lists from scraped sources can be arbitrarily malformed.
#[derive(Debug, Deserialize)]
struct RawStock {
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    market: Option<String>,
    #[serde(default)]
    weekly_prices: Vec<RawPricePoint>,
    #[serde(default)]
    recommendations: Option<Value>,
    #[serde(default)]
    current_quote: Option<Value>,
    #[serde(default)]
    company_info: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawPricePoint {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawRecommendation {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    sentiment: Option<String>,
    #[serde(default)]
    price_at_report: Option<f64>,
}

/// Reads a ticker-keyed dataset snapshot from disk.
pub fn load_dataset(path: impl AsRef<Path>) -> anyhow::Result<StockDataset> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset file {}", path.display()))?;
    parse_dataset(&raw)
}

/// Parses and normalizes a raw dataset snapshot. Stocks without prices or
/// without any recommendation data are dropped; a present-but-malformed
/// recommendation list keeps the stock with `recommendations = None` so the
/// aggregator can skip it.
pub fn parse_dataset(raw: &str) -> anyhow::Result<StockDataset> {
    let raw_stocks: BTreeMap<String, RawStock> =
        serde_json::from_str(raw).context("dataset is not a ticker-keyed JSON object")?;

    let mut dataset = StockDataset::new();
    for (ticker, raw_stock) in raw_stocks {
        match normalize_stock(&ticker, raw_stock) {
            Some(stock) => {
                dataset.insert(ticker, stock);
            }
            None => {
                tracing::warn!(ticker, "dropping stock without prices or recommendations");
            }
        }
    }

    tracing::info!(stocks = dataset.len(), "dataset loaded");
    Ok(dataset)
}

fn normalize_stock(ticker: &str, raw: RawStock) -> Option<Stock> {
    let weekly_prices = normalize_prices(ticker, raw.weekly_prices);
    if weekly_prices.is_empty() {
        return None;
    }

    let recommendations = match raw.recommendations {
        None | Some(Value::Null) => return None,
        Some(Value::Array(items)) => {
            if items.is_empty() {
                return None;
            }
            Some(normalize_recommendations(ticker, items, &weekly_prices))
        }
        Some(other) => {
            tracing::warn!(ticker, kind = json_kind(&other), "recommendation list is not an array");
            None
        }
    };

    let sector = raw
        .company_info
        .as_ref()
        .and_then(|info| info.get("sector"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(Stock {
        ticker: ticker.to_string(),
        company_name: raw.company_name,
        market: raw.market,
        sector,
        weekly_prices,
        recommendations,
        current_quote: raw.current_quote,
        fundamentals: raw.company_info,
    })
}

fn normalize_prices(ticker: &str, raw: Vec<RawPricePoint>) -> Vec<PricePoint> {
    let mut out = Vec::with_capacity(raw.len());
    for row in raw {
        let date = row.date.as_deref().and_then(|s| s.parse::<NaiveDate>().ok());
        match (date, row.close) {
            (Some(date), Some(close)) if close > 0.0 && close.is_finite() => {
                out.push(PricePoint { date, close });
            }
            _ => {
                tracing::warn!(ticker, date = ?row.date, close = ?row.close, "dropping unusable price row");
            }
        }
    }
    out.sort_by_key(|p| p.date);
    out
}

fn normalize_recommendations(
    ticker: &str,
    items: Vec<Value>,
    prices: &[PricePoint],
) -> Vec<Recommendation> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let raw: RawRecommendation = match serde_json::from_value(item) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(ticker, error = %err, "dropping malformed recommendation entry");
                continue;
            }
        };

        let date = raw.date.as_deref().and_then(parse_recommendation_date);
        if date.is_none() && raw.date.is_some() {
            tracing::warn!(ticker, date = ?raw.date, "unparseable recommendation date");
        }

        // The scraped snapshot often lacks the price at report time; backfill
        // it from the last weekly close on or before the recommendation date.
        let price_at_report = raw
            .price_at_report
            .or_else(|| date.and_then(|d| price_on_or_before(prices, d)));

        out.push(Recommendation {
            date,
            sentiment: raw.sentiment,
            price_at_report,
        });
    }
    out
}

fn price_on_or_before(prices: &[PricePoint], date: NaiveDate) -> Option<f64> {
    // Prices are sorted ascending by normalize_prices.
    prices.iter().rev().find(|p| p.date <= date).map(|p| p.close)
}

/// Accepts both ISO dates and the scraped "Sep. 6, 2019" style, with or
/// without the abbreviation dot.
fn parse_recommendation_date(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    if let Ok(date) = trimmed.parse::<NaiveDate>() {
        return Some(date);
    }

    let cleaned = trimmed.replace('.', "");
    NaiveDate::parse_from_str(&cleaned, "%b %d, %Y")
        .or_else(|_| NaiveDate::parse_from_str(&cleaned, "%B %d, %Y"))
        .ok()
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
