#![deny(clippy::all)]

mod aggregator;
mod comparison;
pub mod dashboard;
pub mod error;
mod filter;
mod heatmap;
pub mod insights;
mod lead;
pub mod source;
pub mod state;
mod timeseries;

pub use aggregator::*;
pub use comparison::*;
pub use error::FetchError;
pub use filter::Filter;
pub use heatmap::*;
pub use lead::{format_day, parse_day, parse_instant, Lead, ACTIVITY_PV};
pub use timeseries::*;

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AccountStat {
    pub name: String,
    pub count: u64,
    pub percentage_of_total: f64,
    pub pv_count: u64,
    pub activities: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ActivityStat {
    pub name: String,
    pub count: u64,
    pub percentage_of_total: f64,
    pub color: &'static str,
}

/// One calendar day of a time series. Days without leads are never
/// materialized.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DateStat {
    pub date: String,
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_account: Option<BTreeMap<String, u64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HeatmapCell {
    pub account: String,
    pub date: String,
    pub value: u64,
}

/// Dense account × date matrix rebuilt from sparse heatmap cells.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct HeatmapGrid {
    pub accounts: Vec<String>,
    pub dates: Vec<String>,
    /// `values[account_index][date_index]`, 0 where no lead was observed.
    pub values: Vec<Vec<u64>>,
    /// Colour bucket 0..=4 per cell, relative to `max_value`.
    pub intensities: Vec<Vec<u8>>,
    pub max_value: u64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ComparisonEntry {
    pub account_name: String,
    pub total_count: u64,
    pub daily_average: f64,
    pub weekly_trend_percent: f64,
    pub time_series: Vec<DateStat>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TopAccount {
    pub name: String,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TopActivity {
    pub name: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BestDay {
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Stats {
    pub total: u64,
    pub by_account: Vec<AccountStat>,
    pub by_activity: Vec<ActivityStat>,
    pub by_date: Vec<DateStat>,
    pub top_account: TopAccount,
    pub top_activity: TopActivity,
    pub active_accounts: u64,
    pub daily_average: f64,
    pub total_days: u64,
    pub best_day: BestDay,
    pub weekly_trend: f64,
}
