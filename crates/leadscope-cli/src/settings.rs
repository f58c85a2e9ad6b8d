use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use leadscope_core::source::{SupabaseConfig, DEFAULT_TABLE};
use serde::{Deserialize, Serialize};

const DEFAULT_TIMEOUT_MS: u64 = 30_000; // 30 seconds
const MIN_TIMEOUT_MS: u64 = 1_000; // 1 second
const MAX_TIMEOUT_MS: u64 = 120_000; // 2 minutes

const ENV_CONFIG: &str = "LEADSCOPE_CONFIG";
const ENV_URL: &str = "LEADSCOPE_SUPABASE_URL";
const ENV_KEY: &str = "LEADSCOPE_SUPABASE_KEY";
const ENV_TABLE: &str = "LEADSCOPE_TABLE";
const ENV_TIMEOUT: &str = "LEADSCOPE_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub table: String,
    pub timeout_ms: u64,
    /// Accounts queried when no `--account` flag is given. Empty means all.
    pub default_accounts: Vec<String>,
    /// Activity queried when no `--activity` flag is given.
    pub default_activity: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_key: None,
            table: DEFAULT_TABLE.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            default_accounts: Vec::new(),
            default_activity: None,
        }
    }
}

impl Settings {
    /// `$LEADSCOPE_CONFIG`, or `<config dir>/leadscope/config.toml`.
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(ENV_CONFIG) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        dirs::config_dir().map(|dir| dir.join("leadscope").join("config.toml"))
    }

    /// Load the config file (missing file means defaults), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let settings = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        Ok(settings.with_env_overrides())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Priority: env var > config file > default.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(url) = env_value(ENV_URL) {
            self.supabase_url = Some(url);
        }
        if let Some(key) = env_value(ENV_KEY) {
            self.supabase_key = Some(key);
        }
        if let Some(table) = env_value(ENV_TABLE) {
            self.table = table;
        }
        if let Some(timeout) = env_value(ENV_TIMEOUT).and_then(|v| v.parse::<u64>().ok()) {
            self.timeout_ms = timeout;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS))
    }

    pub fn supabase_config(&self) -> Result<SupabaseConfig> {
        let url = self.supabase_url.clone().with_context(|| {
            format!("No backend configured. Set {} or pass --input <FILE>", ENV_URL)
        })?;
        let key = self
            .supabase_key
            .clone()
            .with_context(|| format!("No API key configured. Set {}", ENV_KEY))?;

        Ok(SupabaseConfig::new(url, key)
            .with_table(self.table.clone())
            .with_timeout(self.timeout()))
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
