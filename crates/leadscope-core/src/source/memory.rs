use super::LeadSource;
use crate::error::FetchError;
use crate::filter::Filter;
use crate::lead::Lead;
use std::path::Path;

/// Leads held in memory, filtered client-side with [`Filter::matches`].
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    leads: Vec<Lead>,
}

impl MemorySource {
    pub fn new(leads: Vec<Lead>) -> Self {
        Self { leads }
    }

    /// Load a JSON array of rows, using either the backend column names or
    /// the English field names.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FetchError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let source = Self::from_json_str(&content)?;
        tracing::debug!(
            path = %path.as_ref().display(),
            rows = source.leads.len(),
            "Loaded leads from file"
        );
        Ok(source)
    }

    pub fn from_json_str(content: &str) -> Result<Self, FetchError> {
        let leads: Vec<Lead> = serde_json::from_str(content)?;
        Ok(Self { leads })
    }

    pub fn len(&self) -> usize {
        self.leads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leads.is_empty()
    }
}

#[async_trait::async_trait]
impl LeadSource for MemorySource {
    async fn fetch_leads(&self, filter: &Filter) -> Result<Vec<Lead>, FetchError> {
        Ok(self
            .leads
            .iter()
            .filter(|lead| filter.matches(lead))
            .cloned()
            .collect())
    }
}
