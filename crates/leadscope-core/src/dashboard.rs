//! Fetch once, then run every builder over the same snapshot.

use crate::comparison::{compare_accounts, summarize_comparison, ComparisonSummary};
use crate::error::FetchError;
use crate::filter::Filter;
use crate::heatmap::compute_heatmap;
use crate::insights::{generate_insights, InsightReport};
use crate::lead::Lead;
use crate::source::LeadSource;
use crate::state::{FetchState, LeadsController};
use crate::timeseries::compute_time_series;
use crate::{aggregator::compute_stats, ComparisonEntry, DateStat, HeatmapCell, Stats};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub stats: Stats,
    pub timeline: Vec<DateStat>,
    pub timeline_by_account: Vec<DateStat>,
    pub heatmap: Vec<HeatmapCell>,
    pub comparison: Vec<ComparisonEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison_summary: Option<ComparisonSummary>,
    pub insights: InsightReport,
}

/// Run all builders over `leads`. They are independent, so they run in
/// parallel.
pub fn build_snapshot<S>(leads: &[Lead], compare: &[S]) -> DashboardSnapshot
where
    S: AsRef<str> + Sync,
{
    let ((stats, heatmap), ((timeline, timeline_by_account), comparison)) = rayon::join(
        || rayon::join(|| compute_stats(leads), || compute_heatmap(leads)),
        || {
            rayon::join(
                || {
                    rayon::join(
                        || compute_time_series(leads, false),
                        || compute_time_series(leads, true),
                    )
                },
                || compare_accounts(compare, leads),
            )
        },
    );

    let insights = generate_insights(&stats);
    let comparison_summary = summarize_comparison(&comparison);

    DashboardSnapshot {
        stats,
        timeline,
        timeline_by_account,
        heatmap,
        comparison,
        comparison_summary,
        insights,
    }
}

/// Orchestrates fetch and aggregation around an injected source, tracking
/// the loading state of the latest refresh.
pub struct Dashboard {
    source: Arc<dyn LeadSource>,
    controller: Mutex<LeadsController>,
}

impl Dashboard {
    pub fn new(source: Arc<dyn LeadSource>) -> Self {
        Self {
            source,
            controller: Mutex::new(LeadsController::new()),
        }
    }

    pub fn source(&self) -> &Arc<dyn LeadSource> {
        &self.source
    }

    /// State left by the most recent refresh.
    pub fn state(&self) -> FetchState {
        self.controller().state().clone()
    }

    fn controller(&self) -> MutexGuard<'_, LeadsController> {
        self.controller.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetch the leads for `filter` and build a snapshot. A fetch failure is
    /// returned unchanged and nothing is computed. When refreshes overlap,
    /// only the latest one updates [`Dashboard::state`].
    pub async fn refresh<S>(
        &self,
        filter: &Filter,
        compare: &[S],
    ) -> Result<DashboardSnapshot, FetchError>
    where
        S: AsRef<str> + Sync,
    {
        let ticket = self.controller().begin(filter.clone());

        match self.source.fetch_leads(filter).await {
            Ok(leads) => {
                let leads = Arc::new(leads);
                self.controller()
                    .apply(ticket, FetchState::Success(Arc::clone(&leads)));
                tracing::debug!(rows = leads.len(), "Building dashboard snapshot");
                Ok(build_snapshot(&leads, compare))
            }
            Err(e) => {
                self.controller()
                    .apply(ticket, FetchState::Error(e.to_string()));
                Err(e)
            }
        }
    }
}
