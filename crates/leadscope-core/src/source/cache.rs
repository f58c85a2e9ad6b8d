use super::LeadSource;
use crate::error::FetchError;
use crate::filter::Filter;
use crate::lead::Lead;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// How long a fetched lead set stays fresh.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    fetched_at: Instant,
    leads: Arc<Vec<Lead>>,
}

/// Per-filter memoization in front of another source. Failed fetches are
/// never stored, so the next call retries the inner source.
pub struct CachedSource<S> {
    inner: S,
    ttl: Duration,
    entries: Mutex<HashMap<Filter, CacheEntry>>,
}

impl<S: LeadSource> CachedSource<S> {
    pub fn new(inner: S) -> Self {
        Self::with_ttl(inner, DEFAULT_TTL)
    }

    pub fn with_ttl(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn invalidate(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Filter, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn fresh(&self, filter: &Filter) -> Option<Arc<Vec<Lead>>> {
        let mut entries = self.lock();
        match entries.get(filter) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => Some(Arc::clone(&entry.leads)),
            Some(_) => {
                entries.remove(filter);
                None
            }
            None => None,
        }
    }
}

#[async_trait::async_trait]
impl<S: LeadSource> LeadSource for CachedSource<S> {
    async fn fetch_leads(&self, filter: &Filter) -> Result<Vec<Lead>, FetchError> {
        if let Some(leads) = self.fresh(filter) {
            tracing::debug!(rows = leads.len(), "Lead cache hit");
            return Ok(leads.as_ref().clone());
        }

        let leads = self.inner.fetch_leads(filter).await?;
        self.lock().insert(
            filter.clone(),
            CacheEntry {
                fetched_at: Instant::now(),
                leads: Arc::new(leads.clone()),
            },
        );
        Ok(leads)
    }
}
