//! Lead selection criteria shared by every source.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::lead::Lead;

/// Criteria the fetch boundary applies before any aggregation runs.
///
/// `date_from`/`date_to` are inclusive whole days. An empty `accounts` set
/// means every account; `activity: None` means every activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[serde(default)]
    pub accounts: BTreeSet<String>,
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub search: String,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn with_accounts<I, S>(mut self, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accounts = accounts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_activity(mut self, activity: Option<String>) -> Self {
        self.activity = activity;
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn has_date_bounds(&self) -> bool {
        self.date_from.is_some() || self.date_to.is_some()
    }

    /// Trimmed search needle, `None` when the search box is empty.
    pub fn search_term(&self) -> Option<&str> {
        let term = self.search.trim();
        (!term.is_empty()).then_some(term)
    }

    /// Client-side evaluation of the filter, mirroring the query the hosted
    /// backend runs with day bounds taken from the record's own date. A lead whose collection date cannot be parsed
    /// never satisfies a date bound.
    pub fn matches(&self, lead: &Lead) -> bool {
        if !self.accounts.is_empty() && !self.accounts.contains(&lead.account) {
            return false;
        }

        if let Some(activity) = &self.activity {
            if &lead.activity != activity {
                return false;
            }
        }

        if self.has_date_bounds() {
            let Some(day) = lead.day() else {
                return false;
            };
            if self.date_from.is_some_and(|from| day < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| day > to) {
                return false;
            }
        }

        if let Some(term) = self.search_term() {
            let needle = term.to_lowercase();
            let hit = |field: &Option<String>| {
                field
                    .as_deref()
                    .is_some_and(|v| v.to_lowercase().contains(&needle))
            };
            if !hit(&lead.name) && !hit(&lead.email) {
                return false;
            }
        }

        true
    }

    pub fn apply(&self, leads: Vec<Lead>) -> Vec<Lead> {
        let mut filtered = leads;
        filtered.retain(|lead| self.matches(lead));
        filtered
    }
}
