use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub columns: ColumnsConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Candidate header names for each semantic field, matched case-insensitively
/// and trimmed. Export format revisions rename columns, so these are
/// configurable rather than hard-coded positions.
#[derive(Debug, Deserialize, Clone)]
pub struct ColumnsConfig {
    #[serde(default = "default_business_id_columns")]
    pub business_id: Vec<String>,
    #[serde(default = "default_title_columns")]
    pub title: Vec<String>,
    #[serde(default = "default_description_columns")]
    pub description: Vec<String>,
    #[serde(default = "default_value_columns")]
    pub value: Vec<String>,
    #[serde(default = "default_categories_columns")]
    pub categories: Vec<String>,
    #[serde(default = "default_notes_columns")]
    pub notes: Vec<String>,
    #[serde(default = "default_expiration_columns")]
    pub expiration: Vec<String>,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            business_id: default_business_id_columns(),
            title: default_title_columns(),
            description: default_description_columns(),
            value: default_value_columns(),
            categories: default_categories_columns(),
            notes: default_notes_columns(),
            expiration: default_expiration_columns(),
        }
    }
}

fn default_business_id_columns() -> Vec<String> {
    vec![
        "item #".to_string(),
        "item number".to_string(),
        "item no".to_string(),
    ]
}
fn default_title_columns() -> Vec<String> {
    vec![
        "title".to_string(),
        "item name".to_string(),
        "package name".to_string(),
    ]
}
fn default_description_columns() -> Vec<String> {
    vec!["description".to_string(), "item description".to_string()]
}
fn default_value_columns() -> Vec<String> {
    vec![
        "value".to_string(),
        "fair market value".to_string(),
        "fmv".to_string(),
        "retail value".to_string(),
    ]
}
fn default_categories_columns() -> Vec<String> {
    vec![
        "categories".to_string(),
        "category".to_string(),
        "tags".to_string(),
    ]
}
fn default_notes_columns() -> Vec<String> {
    vec![
        "notes".to_string(),
        "restrictions".to_string(),
        "notes / restrictions".to_string(),
    ]
}
fn default_expiration_columns() -> Vec<String> {
    vec![
        "expiration".to_string(),
        "expiration date".to_string(),
        "expires".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            api_base: default_api_base(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

impl ExtractionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
        }
    }
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("out")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate columns
    if config.columns.business_id.is_empty() {
        anyhow::bail!("columns.business_id must list at least one header name");
    }

    // Validate extraction
    if config.extraction.is_enabled() && config.extraction.model.is_none() {
        anyhow::bail!(
            "extraction.model must be specified when provider is '{}'",
            config.extraction.provider
        );
    }

    match config.extraction.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown extraction provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}
