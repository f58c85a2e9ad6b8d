//! Human-readable observations and recommendations derived from [`Stats`].
//!
//! Figures inside the generated text are rounded for display; the underlying
//! statistics are left untouched.

use crate::{AccountStat, Stats};
use serde::Serialize;

const GAP_RATIO: f64 = 0.3;
const VARIANCE_THRESHOLD: f64 = 50.0;
const UNDERPERFORMER_RATIO: f64 = 0.7;
const DOMINANT_SHARE: f64 = 40.0;
const TREND_ALERT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Success,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InsightReport {
    pub insights: Vec<Insight>,
    pub recommendations: Vec<String>,
}

impl InsightReport {
    pub fn is_empty(&self) -> bool {
        self.insights.is_empty() && self.recommendations.is_empty()
    }
}

/// Rank accounts on their PV volume and turn the numbers into insights.
/// An empty account list produces an empty report.
pub fn generate_insights(stats: &Stats) -> InsightReport {
    let accounts = &stats.by_account;
    if accounts.is_empty() {
        return InsightReport::default();
    }

    let ctx = Context::new(stats);
    InsightReport {
        insights: ctx.insights(),
        recommendations: ctx.recommendations(),
    }
}

struct Context<'a> {
    stats: &'a Stats,
    best: &'a AccountStat,
    worst: &'a AccountStat,
    days: u64,
    avg_per_account: f64,
}

impl<'a> Context<'a> {
    /// Callers guarantee `stats.by_account` is non-empty.
    fn new(stats: &'a Stats) -> Self {
        let mut ranked: Vec<&AccountStat> = stats.by_account.iter().collect();
        ranked.sort_by(|a, b| b.pv_count.cmp(&a.pv_count));

        Self {
            stats,
            best: ranked[0],
            worst: ranked[ranked.len() - 1],
            days: stats.total_days,
            avg_per_account: stats.daily_average / stats.by_account.len() as f64,
        }
    }

    fn accounts(&self) -> &'a [AccountStat] {
        &self.stats.by_account
    }

    fn pv_per_day(&self, account: &AccountStat) -> Option<f64> {
        (self.days > 0).then(|| account.pv_count as f64 / self.days as f64)
    }

    fn insights(&self) -> Vec<Insight> {
        let mut insights = Vec::new();
        let best = self.best;

        insights.push(Insight {
            kind: InsightKind::Success,
            title: "Best account".to_string(),
            description: format!(
                "{} generates {} PV ({:.1}% of total)",
                best.name, best.pv_count, best.percentage_of_total
            ),
            metric: Some(format!("{} PV", best.pv_count)),
        });

        if self.accounts().len() > 1 {
            let gap = best.pv_count - self.worst.pv_count;
            if gap as f64 > best.pv_count as f64 * GAP_RATIO {
                let gap_pct = gap as f64 / best.pv_count as f64 * 100.0;
                insights.push(Insight {
                    kind: InsightKind::Warning,
                    title: "Large performance gap".to_string(),
                    description: format!(
                        "{:.0}% gap between {} and {}. Compare their strategies.",
                        gap_pct, best.name, self.worst.name
                    ),
                    metric: Some(format!("{} PV", gap)),
                });
            }
        }

        let above: Vec<&str> = self
            .accounts()
            .iter()
            .filter(|a| self.pv_per_day(a).is_some_and(|v| v > self.avg_per_account))
            .map(|a| a.name.as_str())
            .collect();
        if !above.is_empty() {
            insights.push(Insight {
                kind: InsightKind::Info,
                title: "Above average".to_string(),
                description: format!(
                    "{} account(s) exceed the average of {:.1} PV/day",
                    above.len(),
                    self.avg_per_account
                ),
                metric: Some(above.join(", ")),
            });
        }

        let trend = self.stats.weekly_trend;
        if trend != 0.0 {
            let rising = trend > 0.0;
            insights.push(Insight {
                kind: if rising {
                    InsightKind::Success
                } else {
                    InsightKind::Warning
                },
                title: if rising {
                    "Positive trend"
                } else {
                    "Negative trend"
                }
                .to_string(),
                description: format!(
                    "{} of {:.1}% over the last 7 days",
                    if rising { "Growth" } else { "Decline" },
                    trend.abs()
                ),
                metric: Some(format!("{}{:.1}%", if rising { "+" } else { "" }, trend)),
            });
        }

        if self.distribution_variance() > VARIANCE_THRESHOLD {
            insights.push(Insight {
                kind: InsightKind::Info,
                title: "Uneven distribution".to_string(),
                description: "Performance varies significantly between accounts. \
                              Consider aligning their strategies."
                    .to_string(),
                metric: None,
            });
        }

        insights
    }

    fn distribution_variance(&self) -> f64 {
        let distribution: Vec<f64> = self
            .accounts()
            .iter()
            .filter_map(|a| self.pv_per_day(a))
            .map(|v| v * 100.0)
            .collect();
        if distribution.is_empty() {
            return 0.0;
        }

        distribution
            .iter()
            .map(|v| (v - self.avg_per_account).powi(2))
            .sum::<f64>()
            / distribution.len() as f64
    }

    fn recommendations(&self) -> Vec<String> {
        let mut recs = Vec::new();
        let best = self.best;

        let under: Vec<&str> = self
            .accounts()
            .iter()
            .filter(|a| {
                self.pv_per_day(a)
                    .is_some_and(|v| v < self.avg_per_account * UNDERPERFORMER_RATIO)
            })
            .map(|a| a.name.as_str())
            .collect();
        if !under.is_empty() {
            recs.push(format!(
                "Optimize {} by applying the practices of {}",
                under.join(", "),
                best.name
            ));
        }

        if best.percentage_of_total > DOMINANT_SHARE {
            recs.push(format!(
                "Increase the budget of {}, which generates {:.0}% of leads",
                best.name, best.percentage_of_total
            ));
        }

        let trend = self.stats.weekly_trend;
        if trend < -TREND_ALERT {
            recs.push("The trend is negative. Review creatives and targeting quickly".to_string());
        } else if trend > TREND_ALERT {
            recs.push("The trend is positive. Capitalize by increasing budgets".to_string());
        }

        if self.accounts().len() > 1 && self.days > 0 {
            let daily: Vec<f64> = self
                .accounts()
                .iter()
                .filter_map(|a| self.pv_per_day(a))
                .collect();
            let max = daily.iter().copied().fold(f64::MIN, f64::max);
            let min = daily.iter().copied().fold(f64::MAX, f64::min);
            if max > min * 2.0 {
                recs.push("Rebalance performance across accounts for more stability".to_string());
            }
        }

        recs
    }
}
