//! Parallel aggregation of lead records
//!
//! Uses rayon for parallel map-reduce operations.

use crate::lead::Lead;
use crate::timeseries::compute_time_series;
use crate::{AccountStat, ActivityStat, BestDay, DateStat, Stats, TopAccount, TopActivity};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

const NOT_AVAILABLE: &str = "N/A";
const WEEK_DAYS: usize = 7;

/// Compute the headline statistics for a filtered lead set
pub fn compute_stats(leads: &[Lead]) -> Stats {
    let total = leads.len() as u64;

    let by_account = compute_account_stats(leads);
    let by_activity = compute_activity_stats(leads);
    let by_date = compute_time_series(leads, false);

    let top_account = by_account
        .first()
        .map(|a| TopAccount {
            name: a.name.clone(),
            count: a.count,
            percentage: a.percentage_of_total,
        })
        .unwrap_or_else(|| TopAccount {
            name: NOT_AVAILABLE.to_string(),
            count: 0,
            percentage: 0.0,
        });

    let top_activity = by_activity
        .first()
        .map(|a| TopActivity {
            name: a.name.clone(),
            percentage: a.percentage_of_total,
        })
        .unwrap_or_else(|| TopActivity {
            name: NOT_AVAILABLE.to_string(),
            percentage: 0.0,
        });

    let active_accounts = by_account.iter().filter(|a| a.count > 0).count() as u64;
    let total_days = by_date.len() as u64;
    let daily_average = average(total, total_days);
    let best_day = best_day(&by_date);
    let weekly_trend = weekly_trend(&by_date);

    Stats {
        total,
        by_account,
        by_activity,
        by_date,
        top_account,
        top_activity,
        active_accounts,
        daily_average,
        total_days,
        best_day,
        weekly_trend,
    }
}

/// Per-account counts, busiest first. Ties keep the order in which accounts
/// first appear in `leads`.
pub fn compute_account_stats(leads: &[Lead]) -> Vec<AccountStat> {
    let total = leads.len() as u64;
    let mut groups = group_ordered(leads, |lead| lead.account.as_str());

    sort_groups(&mut groups);

    groups
        .into_iter()
        .map(|(name, acc)| AccountStat {
            name,
            count: acc.count,
            percentage_of_total: percentage(acc.count, total),
            pv_count: acc.pv_count,
            activities: acc.activities,
        })
        .collect()
}

/// Per-activity counts with their chart colours, busiest first.
pub fn compute_activity_stats(leads: &[Lead]) -> Vec<ActivityStat> {
    let total = leads.len() as u64;
    let mut groups = group_ordered(leads, |lead| lead.activity.as_str());

    sort_groups(&mut groups);

    groups
        .into_iter()
        .map(|(name, acc)| {
            let color = activity_color(&name);
            ActivityStat {
                name,
                count: acc.count,
                percentage_of_total: percentage(acc.count, total),
                color,
            }
        })
        .collect()
}

/// Week-over-week change of a daily series, in percent.
///
/// Compares the last 7 entries with the (up to) 7 entries before them. With
/// fewer than 14 days the windows shrink; an empty or zero previous window
/// yields 0.
pub fn weekly_trend(series: &[DateStat]) -> f64 {
    let len = series.len();
    let split = len.saturating_sub(WEEK_DAYS);
    let last_week: u64 = series[split..].iter().map(|d| d.count).sum();
    let prev_week: u64 = series[len.saturating_sub(2 * WEEK_DAYS)..split]
        .iter()
        .map(|d| d.count)
        .sum();

    if prev_week > 0 {
        (last_week as f64 - prev_week as f64) / prev_week as f64 * 100.0
    } else {
        0.0
    }
}

/// Day with the most leads; the earliest one wins a tie.
pub fn best_day(series: &[DateStat]) -> BestDay {
    let best = series
        .iter()
        .fold(None, |best: Option<&DateStat>, day| match best {
            Some(b) if b.count >= day.count => Some(b),
            _ => Some(day),
        });

    best.map(|d| BestDay {
        date: d.date.clone(),
        count: d.count,
    })
    .unwrap_or_else(|| BestDay {
        date: String::new(),
        count: 0,
    })
}

pub(crate) fn average(count: u64, days: u64) -> f64 {
    if days > 0 {
        count as f64 / days as f64
    } else {
        0.0
    }
}

fn percentage(count: u64, total: u64) -> f64 {
    if total > 0 {
        count as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Hex colour used for an activity in charts and tables.
pub fn activity_color(activity: &str) -> &'static str {
    match activity {
        "PV" => "#3b82f6",
        "ITE" => "#f97316",
        "PAC" => "#10b981",
        _ => "#6b7280",
    }
}

fn group_ordered<F>(leads: &[Lead], key: F) -> Vec<(String, GroupAccumulator)>
where
    F: Fn(&Lead) -> &str + Sync,
{
    let group_map: HashMap<String, GroupAccumulator> = leads
        .par_iter()
        .enumerate()
        .fold(
            HashMap::new,
            |mut acc: HashMap<String, GroupAccumulator>, (index, lead)| {
                acc.entry(key(lead).to_string())
                    .or_insert_with(|| GroupAccumulator::new(index))
                    .add_lead(lead, index);
                acc
            },
        )
        .reduce(HashMap::new, |mut a, b| {
            for (name, group) in b {
                match a.get_mut(&name) {
                    Some(existing) => existing.merge(group),
                    None => {
                        a.insert(name, group);
                    }
                }
            }
            a
        });

    group_map.into_iter().collect()
}

fn sort_groups(groups: &mut [(String, GroupAccumulator)]) {
    groups.sort_by(|(_, a), (_, b)| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.first_seen.cmp(&b.first_seen))
    });
}

struct GroupAccumulator {
    first_seen: usize,
    count: u64,
    pv_count: u64,
    activities: BTreeMap<String, u64>,
}

impl GroupAccumulator {
    fn new(first_seen: usize) -> Self {
        Self {
            first_seen,
            count: 0,
            pv_count: 0,
            activities: BTreeMap::new(),
        }
    }

    fn add_lead(&mut self, lead: &Lead, index: usize) {
        self.first_seen = self.first_seen.min(index);
        self.count += 1;
        if lead.is_pv() {
            self.pv_count += 1;
        }
        *self.activities.entry(lead.activity.clone()).or_default() += 1;
    }

    fn merge(&mut self, other: GroupAccumulator) {
        self.first_seen = self.first_seen.min(other.first_seen);
        self.count += other.count;
        self.pv_count += other.pv_count;
        for (activity, count) in other.activities {
            *self.activities.entry(activity).or_default() += count;
        }
    }
}
