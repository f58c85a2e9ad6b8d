//! Side-by-side metrics for a selection of accounts

use crate::aggregator::{average, weekly_trend};
use crate::lead::Lead;
use crate::timeseries::group_by_day;
use crate::ComparisonEntry;
use rayon::prelude::*;
use serde::Serialize;

/// Trend beyond which an account is considered moving, in percent.
const TREND_THRESHOLD: f64 = 5.0;

/// One entry per requested account, in request order. Duplicated names get
/// independent entries; unknown names get a zeroed entry.
pub fn compare_accounts<S>(account_names: &[S], leads: &[Lead]) -> Vec<ComparisonEntry>
where
    S: AsRef<str> + Sync,
{
    account_names
        .par_iter()
        .map(|name| compare_account(name.as_ref(), leads))
        .collect()
}

fn compare_account(name: &str, leads: &[Lead]) -> ComparisonEntry {
    let scoped: Vec<&Lead> = leads.iter().filter(|l| l.account == name).collect();
    let total_count = scoped.len() as u64;
    let time_series = group_by_day(scoped, false);

    ComparisonEntry {
        account_name: name.to_string(),
        total_count,
        daily_average: average(total_count, time_series.len() as u64),
        weekly_trend_percent: weekly_trend(&time_series),
        time_series,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

impl TrendDirection {
    pub fn arrow(self) -> &'static str {
        match self {
            TrendDirection::Up => "↑",
            TrendDirection::Down => "↓",
            TrendDirection::Flat => "→",
        }
    }
}

pub fn trend_direction(trend: f64) -> TrendDirection {
    if trend > TREND_THRESHOLD {
        TrendDirection::Up
    } else if trend < -TREND_THRESHOLD {
        TrendDirection::Down
    } else {
        TrendDirection::Flat
    }
}

/// Leaders of a comparison. Ties go to the earlier entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonSummary {
    pub best_total: String,
    pub best_daily_average: String,
    pub best_trend: String,
}

pub fn summarize_comparison(entries: &[ComparisonEntry]) -> Option<ComparisonSummary> {
    let best_total = leader(entries, |e| e.total_count as f64)?;
    let best_daily_average = leader(entries, |e| e.daily_average)?;
    let best_trend = leader(entries, |e| e.weekly_trend_percent)?;

    Some(ComparisonSummary {
        best_total: best_total.account_name.clone(),
        best_daily_average: best_daily_average.account_name.clone(),
        best_trend: best_trend.account_name.clone(),
    })
}

fn leader<F>(entries: &[ComparisonEntry], metric: F) -> Option<&ComparisonEntry>
where
    F: Fn(&ComparisonEntry) -> f64,
{
    entries.iter().fold(None, |best, entry| match best {
        Some(b) if metric(entry) <= metric(b) => Some(b),
        _ => Some(entry),
    })
}
