//! Sparse account × day heatmap and its dense charting grid

use crate::lead::{day_key_or_warn, Lead};
use crate::{HeatmapCell, HeatmapGrid};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};

/// One cell per observed (account, day) pair, sorted by account then date.
/// Pairs without leads are omitted.
pub fn compute_heatmap(leads: &[Lead]) -> Vec<HeatmapCell> {
    let cell_map: HashMap<(String, String), u64> = leads
        .par_iter()
        .fold(HashMap::new, |mut acc: HashMap<(String, String), u64>, lead| {
            if let Some(date) = day_key_or_warn(lead) {
                *acc.entry((lead.account.clone(), date)).or_default() += 1;
            }
            acc
        })
        .reduce(HashMap::new, |mut a, b| {
            for (key, count) in b {
                *a.entry(key).or_default() += count;
            }
            a
        });

    let mut cells: Vec<HeatmapCell> = Vec::with_capacity(cell_map.len());
    cells.extend(
        cell_map
            .into_iter()
            .map(|((account, date), value)| HeatmapCell {
                account,
                date,
                value,
            }),
    );

    cells.sort_by(|a, b| a.account.cmp(&b.account).then_with(|| a.date.cmp(&b.date)));
    cells
}

/// Expand sparse cells into a dense matrix. Missing pairs are 0.
pub fn heatmap_grid(cells: &[HeatmapCell]) -> HeatmapGrid {
    if cells.is_empty() {
        return HeatmapGrid::default();
    }

    let accounts: Vec<String> = cells
        .iter()
        .map(|c| c.account.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect();
    let dates: Vec<String> = cells
        .iter()
        .map(|c| c.date.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect();

    let account_index: HashMap<&str, usize> = accounts
        .iter()
        .enumerate()
        .map(|(i, a)| (a.as_str(), i))
        .collect();
    let date_index: HashMap<&str, usize> = dates
        .iter()
        .enumerate()
        .map(|(i, d)| (d.as_str(), i))
        .collect();

    let mut values = vec![vec![0u64; dates.len()]; accounts.len()];
    for cell in cells {
        if let (Some(&row), Some(&col)) = (
            account_index.get(cell.account.as_str()),
            date_index.get(cell.date.as_str()),
        ) {
            values[row][col] += cell.value;
        }
    }

    let max_value = values.iter().flatten().copied().max().unwrap_or(0);
    let intensities = values
        .iter()
        .map(|row| row.iter().map(|&v| intensity(v, max_value)).collect())
        .collect();

    HeatmapGrid {
        accounts,
        dates,
        values,
        intensities,
        max_value,
    }
}

/// Colour bucket 0..=4 of `value` relative to `max_value`.
pub fn intensity(value: u64, max_value: u64) -> u8 {
    let ratio = value as f64 / max_value.max(1) as f64;
    if ratio == 0.0 {
        0
    } else if ratio < 0.25 {
        1
    } else if ratio < 0.5 {
        2
    } else if ratio < 0.75 {
        3
    } else {
        4
    }
}
