//! Terminal rendering. All rounding of percentages and averages happens
//! here, never in the computed results.

use colored::{ColoredString, Colorize};
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use leadscope_core::insights::{InsightKind, InsightReport};
use leadscope_core::{
    trend_direction, AccountStat, ActivityStat, ComparisonEntry, DateStat, HeatmapCell,
    HeatmapGrid, Lead, TrendDirection,
};
use std::collections::BTreeSet;

/// Heatmap cell shades, from empty to busiest.
const SHADES: [&str; 5] = ["·", "░", "▒", "▓", "█"];

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

pub fn format_average(value: f64) -> String {
    format!("{:.1}", value)
}

/// Arrow and signed percentage, e.g. `↑ +12.3%`.
pub fn trend_text(trend: f64) -> String {
    let sign = if trend > 0.0 { "+" } else { "" };
    format!("{} {}{:.1}%", trend_direction(trend).arrow(), sign, trend)
}

pub fn format_trend(trend: f64) -> ColoredString {
    let text = trend_text(trend);
    match trend_direction(trend) {
        TrendDirection::Up => text.green(),
        TrendDirection::Down => text.red(),
        TrendDirection::Flat => text.bright_black(),
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

fn number_cell(text: String) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

pub fn account_table(accounts: &[AccountStat]) -> Table {
    let mut table = new_table(vec!["Account", "Leads", "Share", "PV"]);
    for account in accounts {
        table.add_row(vec![
            Cell::new(&account.name),
            number_cell(format_number(account.count)),
            number_cell(format_percent(account.percentage_of_total)),
            number_cell(format_number(account.pv_count)),
        ]);
    }
    table
}

pub fn activity_table(activities: &[ActivityStat]) -> Table {
    let mut table = new_table(vec!["Activity", "Leads", "Share", "Color"]);
    for activity in activities {
        table.add_row(vec![
            Cell::new(&activity.name),
            number_cell(format_number(activity.count)),
            number_cell(format_percent(activity.percentage_of_total)),
            Cell::new(activity.color),
        ]);
    }
    table
}

/// One row per day. With a per-account split, every account seen in the
/// series gets a column.
pub fn timeline_table(series: &[DateStat]) -> Table {
    let accounts: BTreeSet<&str> = series
        .iter()
        .filter_map(|d| d.by_account.as_ref())
        .flat_map(|m| m.keys().map(String::as_str))
        .collect();

    let mut header = vec!["Date", "Leads"];
    header.extend(accounts.iter().copied());
    let mut table = new_table(header);

    for day in series {
        let mut row = vec![Cell::new(&day.date), number_cell(format_number(day.count))];
        if let Some(by_account) = &day.by_account {
            for account in &accounts {
                let count = by_account.get(*account).copied().unwrap_or(0);
                row.push(number_cell(format_number(count)));
            }
        }
        table.add_row(row);
    }
    table
}

pub fn heatmap_table(cells: &[HeatmapCell]) -> Table {
    let mut table = new_table(vec!["Account", "Date", "Leads"]);
    for cell in cells {
        table.add_row(vec![
            Cell::new(&cell.account),
            Cell::new(&cell.date),
            number_cell(format_number(cell.value)),
        ]);
    }
    table
}

/// Dense account × day matrix, shaded by intensity.
pub fn heatmap_grid_table(grid: &HeatmapGrid) -> Table {
    let short_dates: Vec<String> = grid
        .dates
        .iter()
        .map(|d| d.get(5..).unwrap_or(d).to_string())
        .collect();

    let mut header = vec!["Account"];
    header.extend(short_dates.iter().map(String::as_str));
    let mut table = new_table(header);

    for (row, account) in grid.accounts.iter().enumerate() {
        let mut cells = vec![Cell::new(account)];
        for (col, value) in grid.values[row].iter().enumerate() {
            let level = grid.intensities[row][col] as usize;
            let shade = SHADES[level.min(SHADES.len() - 1)];
            let text = if *value > 0 {
                format!("{} {}", shade, value)
            } else {
                shade.to_string()
            };
            cells.push(Cell::new(text).set_alignment(CellAlignment::Center));
        }
        table.add_row(cells);
    }
    table
}

pub fn comparison_table(entries: &[ComparisonEntry]) -> Table {
    let mut table = new_table(vec!["Account", "Leads", "Days", "Daily avg", "Weekly trend"]);
    for entry in entries {
        table.add_row(vec![
            Cell::new(&entry.account_name),
            number_cell(format_number(entry.total_count)),
            number_cell(format_number(entry.time_series.len() as u64)),
            number_cell(format_average(entry.daily_average)),
            number_cell(trend_text(entry.weekly_trend_percent)),
        ]);
    }
    table
}

pub fn leads_table(leads: &[Lead]) -> Table {
    let mut table = new_table(vec![
        "Collected", "Account", "Activity", "Name", "Email", "Postal code",
    ]);
    for lead in leads {
        table.add_row(vec![
            lead.collected_at.clone(),
            lead.account.clone(),
            lead.activity.clone(),
            lead.name.clone().unwrap_or_default(),
            lead.email.clone().unwrap_or_default(),
            lead.postal_code.clone().unwrap_or_default(),
        ]);
    }
    table
}

pub fn print_insights(report: &InsightReport) {
    if report.is_empty() {
        println!("\n  {}\n", "No leads to analyze".bright_black());
        return;
    }

    println!("\n  {}", "Insights".bold());
    for insight in &report.insights {
        let (icon, title) = match insight.kind {
            InsightKind::Success => ("✓".green(), insight.title.green()),
            InsightKind::Warning => ("!".yellow(), insight.title.yellow()),
            InsightKind::Info => ("i".cyan(), insight.title.cyan()),
        };
        match &insight.metric {
            Some(metric) => println!("  {} {} ({})", icon, title.bold(), metric),
            None => println!("  {} {}", icon, title.bold()),
        }
        println!("    {}", insight.description);
    }

    if !report.recommendations.is_empty() {
        println!("\n  {}", "Recommendations".bold());
        for (i, rec) in report.recommendations.iter().enumerate() {
            println!("  {}. {}", i + 1, rec);
        }
    }
    println!();
}
