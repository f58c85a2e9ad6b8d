mod format;
mod settings;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Duration, Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use leadscope_core::dashboard::Dashboard;
use leadscope_core::source::{LeadSource, MemorySource, SupabaseSource};
use leadscope_core::{Filter, Lead};
use settings::Settings;
use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "leadscope")]
#[command(author, version, about = "Lead analytics for marketing accounts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(
        long,
        global = true,
        help = "Read leads from a JSON file instead of the hosted backend"
    )]
    input: Option<PathBuf>,

    #[arg(long, global = true, help = "Output as JSON")]
    json: bool,

    #[arg(long, global = true, help = "Enable debug logging")]
    debug: bool,

    #[arg(long, global = true, help = "Disable spinner")]
    no_spinner: bool,
}

#[derive(Args, Clone, Debug, Default)]
struct FilterArgs {
    #[arg(long, help = "Show only today's leads")]
    today: bool,

    #[arg(long, help = "Show last 7 days")]
    week: bool,

    #[arg(long, help = "Show current month")]
    month: bool,

    #[arg(long, help = "Start date (YYYY-MM-DD)")]
    since: Option<String>,

    #[arg(long, help = "End date (YYYY-MM-DD)")]
    until: Option<String>,

    #[arg(long = "account", value_name = "NAME", help = "Only include this account (repeatable)")]
    accounts: Vec<String>,

    #[arg(long, help = "Only include this activity (PV, PAC, ITE, or 'all')")]
    activity: Option<String>,

    #[arg(long, help = "Case-insensitive match on name or email")]
    search: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show lead statistics by account and activity")]
    Stats {
        #[command(flatten)]
        filter: FilterArgs,
    },
    #[command(about = "Show daily lead counts")]
    Timeline {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, help = "Break each day down by account")]
        split: bool,
    },
    #[command(about = "Show lead counts per account and day")]
    Heatmap {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, help = "Render a dense account x day grid")]
        grid: bool,
    },
    #[command(about = "Compare accounts side by side")]
    Compare {
        #[arg(required = true, value_name = "ACCOUNT", help = "Accounts to compare")]
        names: Vec<String>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    #[command(about = "Show insights and recommendations")]
    Insights {
        #[command(flatten)]
        filter: FilterArgs,
    },
    #[command(about = "List matching leads, most recent first")]
    Leads {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value = "20", help = "Maximum number of leads to show")]
        limit: usize,
    },
    #[command(about = "Export matching leads as CSV")]
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, short, help = "Output file path")]
        output: PathBuf,
    },
    #[command(about = "Export every report for the filter as one JSON document")]
    Dashboard {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, value_name = "ACCOUNT", help = "Account to include in the comparison (repeatable)")]
        compare: Vec<String>,
    },
}

struct RunOptions {
    input: Option<PathBuf>,
    json: bool,
    no_spinner: bool,
    settings: Settings,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let opts = RunOptions {
        input: cli.input,
        json: cli.json,
        no_spinner: cli.no_spinner,
        settings: Settings::load()?,
    };

    match cli.command {
        Commands::Stats { filter } => run_stats(&opts, &filter),
        Commands::Timeline { filter, split } => run_timeline(&opts, &filter, split),
        Commands::Heatmap { filter, grid } => run_heatmap(&opts, &filter, grid),
        Commands::Compare { names, filter } => run_compare(&opts, &filter, &names),
        Commands::Insights { filter } => run_insights(&opts, &filter),
        Commands::Leads { filter, limit } => run_leads(&opts, &filter, limit),
        Commands::Export { filter, output } => run_export(&opts, &filter, &output),
        Commands::Dashboard { filter, compare } => run_dashboard(&opts, &filter, &compare),
    }
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_date(value: &str, flag: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid {} date '{}', expected YYYY-MM-DD", flag, value))
}

/// Resolve the date flags against `today`. Shortcuts win over explicit
/// bounds.
fn build_date_filter(
    args: &FilterArgs,
    today: NaiveDate,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>)> {
    if args.today {
        return Ok((Some(today), Some(today)));
    }

    if args.week {
        return Ok((Some(today - Duration::days(6)), Some(today)));
    }

    if args.month {
        let start = today.with_day(1).unwrap_or(today);
        return Ok((Some(start), Some(today)));
    }

    let since = args
        .since
        .as_deref()
        .map(|s| parse_date(s, "--since"))
        .transpose()?;
    let until = args
        .until
        .as_deref()
        .map(|s| parse_date(s, "--until"))
        .transpose()?;

    if let (Some(from), Some(to)) = (since, until) {
        if from > to {
            bail!("--since {} is after --until {}", from, to);
        }
    }

    Ok((since, until))
}

fn build_filter(args: &FilterArgs, settings: &Settings, today: NaiveDate) -> Result<Filter> {
    let (from, to) = build_date_filter(args, today)?;

    let accounts = if args.accounts.is_empty() {
        settings.default_accounts.clone()
    } else {
        args.accounts.clone()
    };

    let activity = match args.activity.as_deref() {
        Some(a) if a.eq_ignore_ascii_case("all") => None,
        Some(a) => Some(a.to_string()),
        None => settings.default_activity.clone(),
    };

    Ok(Filter::new()
        .with_range(from, to)
        .with_accounts(accounts)
        .with_activity(activity)
        .with_search(args.search.clone().unwrap_or_default()))
}

fn build_source(opts: &RunOptions) -> Result<Arc<dyn LeadSource>> {
    match &opts.input {
        Some(path) => {
            let source = MemorySource::from_json_file(path)
                .with_context(|| format!("Failed to load leads from {}", path.display()))?;
            Ok(Arc::new(source))
        }
        None => {
            let config = opts.settings.supabase_config()?;
            Ok(Arc::new(SupabaseSource::new(config)?))
        }
    }
}

fn spinner(opts: &RunOptions, message: &str) -> Option<indicatif::ProgressBar> {
    use indicatif::{ProgressBar, ProgressStyle};

    if opts.no_spinner || opts.json {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner());
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Some(pb)
}

fn fetch_leads(opts: &RunOptions, filter: &Filter) -> Result<Vec<Lead>> {
    let source = build_source(opts)?;
    let pb = spinner(opts, "Fetching leads...");

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async { source.fetch_leads(filter).await });

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let leads = result.context("Failed to fetch leads")?;
    tracing::debug!(rows = leads.len(), "Fetched leads");
    Ok(leads)
}

fn load(opts: &RunOptions, args: &FilterArgs) -> Result<Vec<Lead>> {
    let filter = build_filter(args, &opts.settings, Local::now().date_naive())?;
    fetch_leads(opts, &filter)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_empty() {
    println!("\n  {}\n", "No leads found for this filter".bright_black());
}

fn run_stats(opts: &RunOptions, args: &FilterArgs) -> Result<()> {
    use format::{account_table, activity_table, format_average, format_number, format_percent};

    let leads = load(opts, args)?;
    let stats = leadscope_core::compute_stats(&leads);

    if opts.json {
        return print_json(&stats);
    }
    if stats.total == 0 {
        print_empty();
        return Ok(());
    }

    println!("{}", account_table(&stats.by_account));
    println!("{}", activity_table(&stats.by_activity));
    println!(
        "\nTotal: {} leads | Active accounts: {} | Days: {}",
        format_number(stats.total).bold(),
        stats.active_accounts,
        stats.total_days
    );
    println!(
        "Top account: {} ({}) | Top activity: {} ({})",
        stats.top_account.name.bold(),
        format_percent(stats.top_account.percentage),
        stats.top_activity.name,
        format_percent(stats.top_activity.percentage)
    );
    if stats.total_days > 0 {
        println!(
            "Daily average: {} | Best day: {} ({})",
            format_average(stats.daily_average),
            stats.best_day.date,
            format_number(stats.best_day.count)
        );
    }
    println!(
        "Weekly trend: {}",
        format::format_trend(stats.weekly_trend)
    );

    Ok(())
}

fn run_timeline(opts: &RunOptions, args: &FilterArgs, split: bool) -> Result<()> {
    let leads = load(opts, args)?;
    let series = leadscope_core::compute_time_series(&leads, split);

    if opts.json {
        return print_json(&series);
    }
    if series.is_empty() {
        print_empty();
        return Ok(());
    }

    println!("{}", format::timeline_table(&series));
    Ok(())
}

fn run_heatmap(opts: &RunOptions, args: &FilterArgs, grid: bool) -> Result<()> {
    let leads = load(opts, args)?;
    let cells = leadscope_core::compute_heatmap(&leads);

    if grid {
        let grid = leadscope_core::heatmap_grid(&cells);
        if opts.json {
            return print_json(&grid);
        }
        if grid.accounts.is_empty() {
            print_empty();
            return Ok(());
        }
        println!("{}", format::heatmap_grid_table(&grid));
        println!(
            "{}",
            format!("  Peak: {} leads in one day", grid.max_value).bright_black()
        );
        return Ok(());
    }

    if opts.json {
        return print_json(&cells);
    }
    if cells.is_empty() {
        print_empty();
        return Ok(());
    }
    println!("{}", format::heatmap_table(&cells));
    Ok(())
}

fn run_compare(opts: &RunOptions, args: &FilterArgs, names: &[String]) -> Result<()> {
    let mut args = args.clone();
    if args.accounts.is_empty() {
        args.accounts = names.to_vec();
    }

    let leads = load(opts, &args)?;
    let entries = leadscope_core::compare_accounts(names, &leads);
    let summary = leadscope_core::summarize_comparison(&entries);

    if opts.json {
        #[derive(serde::Serialize)]
        struct CompareJson<'a> {
            entries: &'a [leadscope_core::ComparisonEntry],
            #[serde(skip_serializing_if = "Option::is_none")]
            summary: Option<&'a leadscope_core::ComparisonSummary>,
        }

        return print_json(&CompareJson {
            entries: &entries,
            summary: summary.as_ref(),
        });
    }

    println!("{}", format::comparison_table(&entries));
    if let Some(summary) = summary {
        println!("\n  Most leads:       {}", summary.best_total.bold());
        println!("  Best daily avg:   {}", summary.best_daily_average.bold());
        println!("  Best trend:       {}", summary.best_trend.bold());
    }
    Ok(())
}

fn run_insights(opts: &RunOptions, args: &FilterArgs) -> Result<()> {
    let leads = load(opts, args)?;
    let stats = leadscope_core::compute_stats(&leads);
    let report = leadscope_core::insights::generate_insights(&stats);

    if opts.json {
        return print_json(&report);
    }
    format::print_insights(&report);
    Ok(())
}

fn run_leads(opts: &RunOptions, args: &FilterArgs, limit: usize) -> Result<()> {
    let mut leads = load(opts, args)?;
    let total = leads.len();
    // Most recent first; unparsable timestamps go last.
    leads.sort_by_cached_key(|lead| Reverse(lead.collected_instant()));
    leads.truncate(limit);

    if opts.json {
        return print_json(&leads);
    }
    if leads.is_empty() {
        print_empty();
        return Ok(());
    }

    println!("{}", format::leads_table(&leads));
    if total > leads.len() {
        println!(
            "{}",
            format!("  Showing {} of {} leads", leads.len(), total).bright_black()
        );
    }
    Ok(())
}

const CSV_HEADER: [&str; 10] = [
    "account",
    "activity",
    "name",
    "postal_code",
    "email",
    "phone",
    "collected_at",
    "paris_time",
    "source",
    "form_id",
];

fn write_csv(path: &Path, leads: &[Lead]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record(CSV_HEADER)?;
    for lead in leads {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        writer.write_record([
            lead.account.clone(),
            lead.activity.clone(),
            opt(&lead.name),
            opt(&lead.postal_code),
            opt(&lead.email),
            opt(&lead.phone),
            lead.collected_at.clone(),
            opt(&lead.paris_time),
            opt(&lead.source),
            opt(&lead.form_id),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn run_export(opts: &RunOptions, args: &FilterArgs, output: &Path) -> Result<()> {
    let leads = load(opts, args)?;
    write_csv(output, &leads)?;

    if opts.json {
        #[derive(serde::Serialize)]
        struct ExportJson<'a> {
            path: &'a str,
            rows: usize,
        }
        let path = output.to_string_lossy();
        return print_json(&ExportJson {
            path: &path,
            rows: leads.len(),
        });
    }

    eprintln!(
        "{}",
        format!("✓ Exported {} leads to {}", leads.len(), output.display()).green()
    );
    Ok(())
}

fn run_dashboard(opts: &RunOptions, args: &FilterArgs, compare: &[String]) -> Result<()> {
    let filter = build_filter(args, &opts.settings, Local::now().date_naive())?;
    let dashboard = Dashboard::new(build_source(opts)?);
    let pb = spinner(opts, "Building dashboard...");

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async { dashboard.refresh(&filter, compare).await });

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let snapshot = result.context("Failed to fetch leads")?;
    print_json(&snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_date_shortcuts() {
        let today = day("2024-03-15");

        let args = FilterArgs {
            today: true,
            ..Default::default()
        };
        assert_eq!(
            build_date_filter(&args, today).unwrap(),
            (Some(today), Some(today))
        );

        let args = FilterArgs {
            week: true,
            since: Some("2020-01-01".into()),
            ..Default::default()
        };
        assert_eq!(
            build_date_filter(&args, today).unwrap(),
            (Some(day("2024-03-09")), Some(today))
        );

        let args = FilterArgs {
            month: true,
            ..Default::default()
        };
        assert_eq!(
            build_date_filter(&args, today).unwrap(),
            (Some(day("2024-03-01")), Some(today))
        );
    }

    #[test]
    fn test_explicit_range() {
        let today = day("2024-03-15");
        let args = FilterArgs {
            since: Some("2024-01-01".into()),
            until: Some("2024-01-31".into()),
            ..Default::default()
        };
        assert_eq!(
            build_date_filter(&args, today).unwrap(),
            (Some(day("2024-01-01")), Some(day("2024-01-31")))
        );

        let inverted = FilterArgs {
            since: Some("2024-02-01".into()),
            until: Some("2024-01-01".into()),
            ..Default::default()
        };
        assert!(build_date_filter(&inverted, today).is_err());

        let invalid = FilterArgs {
            since: Some("01/02/2024".into()),
            ..Default::default()
        };
        let err = build_date_filter(&invalid, today).unwrap_err();
        assert!(err.to_string().contains("--since"));
    }

    #[test]
    fn test_filter_uses_settings_defaults() {
        let settings = Settings {
            default_accounts: vec!["INVF".into(), "INVC3".into()],
            default_activity: Some("PV".into()),
            ..Default::default()
        };
        let today = day("2024-03-15");

        let filter = build_filter(&FilterArgs::default(), &settings, today).unwrap();
        assert_eq!(filter.accounts.len(), 2);
        assert_eq!(filter.activity.as_deref(), Some("PV"));

        let args = FilterArgs {
            accounts: vec!["INVC4".into()],
            activity: Some("all".into()),
            search: Some("dupont".into()),
            ..Default::default()
        };
        let filter = build_filter(&args, &settings, today).unwrap();
        assert_eq!(filter.accounts.iter().collect::<Vec<_>>(), vec!["INVC4"]);
        assert_eq!(filter.activity, None);
        assert_eq!(filter.search_term(), Some("dupont"));
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("leads.csv");
        let mut lead = Lead::new("INVF", "PV", "2024-01-01T10:00:00");
        lead.name = Some("Dupont, Jean".into());

        write_csv(&path, &[lead]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("account,activity,name,postal_code,email,phone,collected_at,paris_time,source,form_id")
        );
        assert_eq!(
            lines.next(),
            Some("INVF,PV,\"Dupont, Jean\",,,,2024-01-01T10:00:00,,,")
        );
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "leadscope", "compare", "A", "B", "--json", "--account", "A", "--input", "x.json",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.input, Some(PathBuf::from("x.json")));
        match cli.command {
            Commands::Compare { names, filter } => {
                assert_eq!(names, vec!["A", "B"]);
                assert_eq!(filter.accounts, vec!["A"]);
            }
            _ => panic!("expected compare"),
        }
    }
}
