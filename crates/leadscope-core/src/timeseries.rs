//! Daily time series, optionally split by account
//!
//! Uses rayon fold/reduce to bucket leads per calendar day.

use crate::lead::{day_key_or_warn, Lead};
use crate::DateStat;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

/// Lead counts per day, ascending by `YYYY-MM-DD`.
///
/// Leads with an unparsable collection date are skipped. With
/// `split_by_account` every entry carries the per-account breakdown of its
/// day; `count` is always the day total.
pub fn compute_time_series(leads: &[Lead], split_by_account: bool) -> Vec<DateStat> {
    group_by_day(leads, split_by_account)
}

/// Shared day bucketing for any parallel source of leads (a full slice or
/// an account-scoped subset).
pub(crate) fn group_by_day<'a, I>(leads: I, split_by_account: bool) -> Vec<DateStat>
where
    I: IntoParallelIterator<Item = &'a Lead>,
{
    let day_map: HashMap<String, DayAccumulator> = leads
        .into_par_iter()
        .fold(HashMap::new, |mut acc: HashMap<String, DayAccumulator>, lead| {
            if let Some(date) = day_key_or_warn(lead) {
                acc.entry(date)
                    .or_default()
                    .add_lead(lead, split_by_account);
            }
            acc
        })
        .reduce(HashMap::new, |mut a, b| {
            for (date, day) in b {
                a.entry(date).or_default().merge(day);
            }
            a
        });

    let mut series: Vec<DateStat> = Vec::with_capacity(day_map.len());
    series.extend(
        day_map
            .into_iter()
            .map(|(date, day)| day.into_date_stat(date, split_by_account)),
    );

    series.sort_by(|a, b| a.date.cmp(&b.date));
    series
}

#[derive(Default)]
struct DayAccumulator {
    count: u64,
    by_account: BTreeMap<String, u64>,
}

impl DayAccumulator {
    fn add_lead(&mut self, lead: &Lead, split_by_account: bool) {
        self.count += 1;
        if split_by_account {
            *self.by_account.entry(lead.account.clone()).or_default() += 1;
        }
    }

    fn merge(&mut self, other: DayAccumulator) {
        self.count += other.count;
        for (account, count) in other.by_account {
            *self.by_account.entry(account).or_default() += count;
        }
    }

    fn into_date_stat(self, date: String, split_by_account: bool) -> DateStat {
        DateStat {
            date,
            count: self.count,
            by_account: split_by_account.then_some(self.by_account),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(account: &str, at: &str) -> Lead {
        Lead::new(account, "PV", at)
    }

    #[test]
    fn test_time_series_empty() {
        assert!(compute_time_series(&[], false).is_empty());
        assert!(compute_time_series(&[], true).is_empty());
    }

    #[test]
    fn test_time_series_sorted_and_unique() {
        let leads = vec![
            lead("A", "2024-01-03T10:00:00"),
            lead("A", "2024-01-01T10:00:00"),
            lead("B", "2024-01-03T18:00:00"),
            lead("B", "2024-01-02T09:00:00"),
            lead("A", "2024-01-01T22:00:00"),
        ];

        let series = compute_time_series(&leads, false);
        let dates: Vec<&str> = series.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-01", "2024-01-02", "2024-01-03"]);
        assert_eq!(
            series.iter().map(|d| d.count).collect::<Vec<_>>(),
            vec![2, 1, 2]
        );
        assert!(series.iter().all(|d| d.by_account.is_none()));
    }

    #[test]
    fn test_time_series_split_by_account() {
        let leads = vec![
            lead("A", "2024-01-01"),
            lead("B", "2024-01-01"),
            lead("A", "2024-01-01"),
            lead("B", "2024-01-02"),
        ];

        let series = compute_time_series(&leads, true);
        assert_eq!(series.len(), 2);

        let first = &series[0];
        assert_eq!(first.date, "2024-01-01");
        assert_eq!(first.count, 3);
        let by_account = first.by_account.as_ref().unwrap();
        assert_eq!(by_account.get("A"), Some(&2));
        assert_eq!(by_account.get("B"), Some(&1));

        let second = series[1].by_account.as_ref().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second.get("B"), Some(&1));
    }

    #[test]
    fn test_time_series_skips_invalid_dates() {
        let leads = vec![
            lead("A", "2024-01-01"),
            lead("A", "yesterday"),
            lead("A", ""),
        ];

        let series = compute_time_series(&leads, false);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].count, 1);
    }

    #[test]
    fn test_time_series_split_counts_match_totals() {
        let mut leads = Vec::new();
        for day in 1..=10 {
            for (i, account) in ["A", "B", "C"].iter().enumerate() {
                for _ in 0..(day % 3 + i) {
                    leads.push(lead(account, &format!("2024-02-{:02}T12:00:00", day)));
                }
            }
        }

        let series = compute_time_series(&leads, true);
        for day in &series {
            let sum: u64 = day.by_account.as_ref().unwrap().values().sum();
            assert_eq!(sum, day.count);
        }
        let total: u64 = series.iter().map(|d| d.count).sum();
        assert_eq!(total as usize, leads.len());
    }

    #[test]
    fn test_time_series_is_idempotent() {
        let leads = vec![
            lead("A", "2024-01-02"),
            lead("B", "2024-01-01"),
            lead("A", "2024-01-01"),
        ];
        assert_eq!(
            compute_time_series(&leads, true),
            compute_time_series(&leads, true)
        );
    }
}
