//! Fetch boundary: where lead records come from.
//!
//! Every source is an explicitly constructed handle injected into the
//! orchestrating code, so the hosted backend can be swapped for an in-memory
//! set in tests and offline use.

mod cache;
mod memory;
mod supabase;

pub use cache::{CachedSource, DEFAULT_TTL};
pub use memory::MemorySource;
pub use supabase::{build_query, SupabaseConfig, SupabaseSource, DEFAULT_TABLE};

use crate::error::FetchError;
use crate::filter::Filter;
use crate::lead::Lead;
use std::sync::Arc;

#[async_trait::async_trait]
pub trait LeadSource: Send + Sync {
    /// Leads matching `filter`: account allow-list, activity equality,
    /// inclusive day bounds and case-insensitive name/email search.
    ///
    /// Day bounds are compared against the date written in each record by
    /// [`MemorySource`]. [`SupabaseSource`] sends them as midnight literals,
    /// which the database reads in its session timezone, so a lead stamped
    /// close to midnight with a foreign offset can fall on different sides
    /// of a bound depending on the source.
    async fn fetch_leads(&self, filter: &Filter) -> Result<Vec<Lead>, FetchError>;
}

#[async_trait::async_trait]
impl<S: LeadSource + ?Sized> LeadSource for Arc<S> {
    async fn fetch_leads(&self, filter: &Filter) -> Result<Vec<Lead>, FetchError> {
        (**self).fetch_leads(filter).await
    }
}
