use crate::policy::{PolicyTable, ReportPolicy};
use crate::types::ReportType;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// Default value functions for serde
fn default_base_url() -> String {
    "https://www.dmc.gov.lk".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string()
}

fn default_listing_timeout_secs() -> u64 {
    30
}

fn default_document_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff_ms() -> u64 {
    2000
}

fn default_listing_urls() -> BTreeMap<ReportType, String> {
    let listing = |item_id: u32, type_id: u32| {
        format!(
            "https://www.dmc.gov.lk/index.php?option=com_dmcreports&view=reports&Itemid={item_id}&report_type_id={type_id}&lang=en"
        )
    };
    BTreeMap::from([
        (ReportType::Situation, listing(273, 1)),
        (ReportType::Weather, listing(274, 2)),
        (ReportType::Landslide, listing(276, 5)),
        (ReportType::RiverFlood, listing(277, 6)),
    ])
}

fn default_row_tolerance() -> f32 {
    0.5
}

fn default_word_gap_ratio() -> f32 {
    0.45
}

fn default_api_key_env() -> String {
    "DMC_MODEL_API_KEY".to_string()
}

fn default_model_timeout_secs() -> u64 {
    120
}

/// Top-level configuration, loaded from YAML. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    /// Replace the built-in policy of a report type
    #[serde(default)]
    pub policies: Vec<ReportPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_listing_urls")]
    pub listing_urls: BTreeMap<ReportType, String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_listing_timeout_secs")]
    pub listing_timeout_secs: u64,
    #[serde(default = "default_document_timeout_secs")]
    pub document_timeout_secs: u64,
    /// Attempts per HTTP request; 1 means no retry
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff between attempts, doubled each retry
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl SourceConfig {
    pub fn listing_url(&self, report_type: ReportType) -> Option<&str> {
        self.listing_urls.get(&report_type).map(String::as_str)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            listing_urls: default_listing_urls(),
            user_agent: default_user_agent(),
            listing_timeout_secs: default_listing_timeout_secs(),
            document_timeout_secs: default_document_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Snapshot directory; defaults to the platform data dir
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl StoreConfig {
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("dmc-monitor")
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    #[default]
    Layout,
    Model,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub extractor: ExtractorKind,
    /// Spans whose vertical centers differ by less than this fraction of
    /// their height share a row
    #[serde(default = "default_row_tolerance")]
    pub row_tolerance: f32,
    /// Horizontal gap (fraction of span height) below which header words join
    #[serde(default = "default_word_gap_ratio")]
    pub word_gap_ratio: f32,
    /// Read "-" cells as 0 instead of unknown
    #[serde(default)]
    pub dash_as_zero: bool,
    /// Model endpoint used when `extractor: model`, or as a fallback
    #[serde(default)]
    pub model: Option<ModelConfig>,
    /// Retry with the model extractor when layout extraction fails
    #[serde(default)]
    pub model_fallback: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            extractor: ExtractorKind::default(),
            row_tolerance: default_row_tolerance(),
            word_gap_ratio: default_word_gap_ratio(),
            dash_as_zero: false,
            model: None,
            model_fallback: false,
        }
    }
}

/// OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the bearer token
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
}

impl MonitorConfig {
    /// Load config from file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path}"))?;
        let config: MonitorConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config file {path}"))?;
        Ok(config)
    }

    /// Load config with fallback to default
    pub fn load_with_fallback(path: Option<&str>) -> Self {
        match path {
            Some(p) => Self::load_from_file(p).unwrap_or_else(|e| {
                tracing::warn!("failed to load config from {}: {:#}; using defaults", p, e);
                Self::default()
            }),
            None => Self::default(),
        }
    }

    /// Built-in policies with this config's overrides applied
    pub fn policy_table(&self) -> PolicyTable {
        let mut table = PolicyTable::new();
        for policy in &self.policies {
            table.insert(policy.clone());
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config: MonitorConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.source.max_attempts, 1);
        assert_eq!(config.source.listing_timeout_secs, 30);
        assert!(!config.extraction.dash_as_zero);
        assert_eq!(config.extraction.extractor, ExtractorKind::Layout);
        assert!(config
            .source
            .listing_url(ReportType::Landslide)
            .unwrap()
            .contains("report_type_id=5"));
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let yaml = r#"
source:
  max_attempts: 3
  listing_urls:
    situation: "http://localhost:8080/sitreps"
store:
  data_dir: /tmp/dmc
extraction:
  dash_as_zero: true
"#;
        let config: MonitorConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.source.max_attempts, 3);
        assert_eq!(config.source.base_url, "https://www.dmc.gov.lk");
        assert_eq!(
            config.source.listing_url(ReportType::Situation),
            Some("http://localhost:8080/sitreps")
        );
        assert_eq!(config.source.listing_url(ReportType::Weather), None);
        assert_eq!(config.store.resolved_data_dir(), PathBuf::from("/tmp/dmc"));
        assert!(config.extraction.dash_as_zero);
    }

    #[test]
    fn load_with_fallback_tolerates_missing_file() {
        let config = MonitorConfig::load_with_fallback(Some("/nonexistent/dmc.yaml"));
        assert_eq!(config.source.max_attempts, 1);
    }

    #[test]
    fn policy_overrides_replace_builtins() {
        let mut policy = PolicyTable::new().get(ReportType::Weather).unwrap().clone();
        policy.listing_keywords = vec!["met".to_string()];
        let config = MonitorConfig {
            policies: vec![policy],
            ..MonitorConfig::default()
        };
        let table = config.policy_table();
        assert_eq!(
            table.get(ReportType::Weather).unwrap().listing_keywords,
            vec!["met".to_string()]
        );
    }
}
