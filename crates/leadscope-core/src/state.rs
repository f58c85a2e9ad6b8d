//! Loading state of the current lead set, with last-request-wins semantics.

use crate::error::FetchError;
use crate::filter::Filter;
use crate::lead::Lead;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum FetchState {
    #[default]
    Idle,
    Loading,
    Success(Arc<Vec<Lead>>),
    Error(String),
}

impl FetchState {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }

    /// Leads of a successful fetch; any other state means no data.
    pub fn leads(&self) -> Option<&[Lead]> {
        match self {
            FetchState::Success(leads) => Some(leads.as_slice()),
            _ => None,
        }
    }
}

/// Identifies one in-flight fetch. Only the most recent ticket may update
/// the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestTicket(u64);

#[derive(Debug, Default)]
pub struct LeadsController {
    state: FetchState,
    filter: Option<Filter>,
    latest: u64,
}

impl LeadsController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    /// Filter of the most recent request.
    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Start a fetch for `filter`, superseding any fetch still in flight.
    pub fn begin(&mut self, filter: Filter) -> RequestTicket {
        self.latest += 1;
        self.filter = Some(filter);
        self.state = FetchState::Loading;
        RequestTicket(self.latest)
    }

    /// Apply the outcome of a fetch. Results of superseded tickets are
    /// discarded; returns whether the state changed.
    pub fn complete(
        &mut self,
        ticket: RequestTicket,
        result: Result<Vec<Lead>, FetchError>,
    ) -> bool {
        let state = match result {
            Ok(leads) => FetchState::Success(Arc::new(leads)),
            Err(e) => FetchState::Error(e.to_string()),
        };
        self.apply(ticket, state)
    }

    pub(crate) fn apply(&mut self, ticket: RequestTicket, state: FetchState) -> bool {
        if ticket.0 != self.latest {
            tracing::debug!(
                ticket = ticket.0,
                latest = self.latest,
                "Discarding stale fetch result"
            );
            return false;
        }

        self.state = state;
        true
    }
}
