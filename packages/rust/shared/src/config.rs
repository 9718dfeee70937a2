//! Application configuration for QueryHarvest.
//!
//! User config lives at `~/.queryharvest/queryharvest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HarvestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "queryharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".queryharvest";

// ---------------------------------------------------------------------------
// Config structs (matching queryharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Outbound HTTP behaviour (throttle, retries).
    #[serde(default)]
    pub http: HttpConfig,

    /// Catalog location and pagination bounds.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// SPARQL endpoint settings.
    #[serde(default)]
    pub sparql: SparqlConfig,
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving one JSON file per example.
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Stamp each example with its extraction time.
    #[serde(default = "default_true")]
    pub timestamps: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            timestamps: true,
        }
    }
}

fn default_output_dir() -> String {
    "queryharvest_dataset".into()
}
fn default_true() -> bool {
    true
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Minimum seconds between the end of one request and the start of the next.
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Retries for transient failures (timeouts, connection errors, 5xx).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff step; attempt `n` waits `n * retry_backoff_ms`.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_delay_secs(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_delay_secs() -> f64 {
    0.1
}
fn default_timeout_secs() -> f64 {
    10.0
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    concat!("QueryHarvest/", env!("CARGO_PKG_VERSION"), " (Educational/Research Purpose)").into()
}

/// `[catalog]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the catalog API.
    #[serde(default = "default_catalog_url")]
    pub base_url: String,

    /// Safety bound on pagination.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_url(),
            max_pages: default_max_pages(),
        }
    }
}

fn default_catalog_url() -> String {
    "https://data.labs.kadaster.nl/_api".into()
}
fn default_max_pages() -> u32 {
    1000
}

/// How the query is placed in the execution request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestFormat {
    /// SPARQL 1.1 protocol: form-encoded `query=` POST body.
    Form,
    /// JSON `{"query": ...}` POST body, as the catalog's own query service expects.
    Json,
}

/// `[sparql]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparqlConfig {
    /// Endpoint receiving every execution.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Whether extracted queries are executed at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Execution timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    #[serde(default = "default_request_format")]
    pub request_format: RequestFormat,

    /// Optional `Referer` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,

    /// Name of the env var holding a session cookie (never store the cookie itself).
    #[serde(default = "default_cookie_env")]
    pub cookie_env: String,
}

impl Default for SparqlConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            enabled: true,
            timeout_secs: default_timeout_secs(),
            request_format: default_request_format(),
            referer: None,
            cookie_env: default_cookie_env(),
        }
    }
}

fn default_endpoint() -> String {
    "https://data.labs.kadaster.nl/_api/datasets/kadaster/kkg/services/kkg/sparql".into()
}
fn default_request_format() -> RequestFormat {
    RequestFormat::Json
}
fn default_cookie_env() -> String {
    "QUERYHARVEST_COOKIE".into()
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration. Built once, read-only for the run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub timestamps: bool,
    pub request_delay: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub user_agent: String,
    pub catalog_url: Url,
    pub max_pages: u32,
    pub endpoint: Url,
    pub execute: bool,
    pub execution_timeout: Duration,
    pub request_format: RequestFormat,
    pub referer: Option<String>,
    pub cookie: Option<String>,
}

impl TryFrom<&AppConfig> for PipelineConfig {
    type Error = HarvestError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let cookie = std::env::var(&config.sparql.cookie_env)
            .ok()
            .filter(|v| !v.is_empty());

        Ok(Self {
            output_dir: PathBuf::from(&config.output.dir),
            timestamps: config.output.timestamps,
            request_delay: seconds("http.delay_secs", config.http.delay_secs)?,
            request_timeout: seconds("http.timeout_secs", config.http.timeout_secs)?,
            max_retries: config.http.max_retries,
            retry_backoff: Duration::from_millis(config.http.retry_backoff_ms),
            user_agent: config.http.user_agent.clone(),
            catalog_url: parse_url("catalog.base_url", &config.catalog.base_url)?,
            max_pages: config.catalog.max_pages.max(1),
            endpoint: parse_url("sparql.endpoint", &config.sparql.endpoint)?,
            execute: config.sparql.enabled,
            execution_timeout: seconds("sparql.timeout_secs", config.sparql.timeout_secs)?,
            request_format: config.sparql.request_format,
            referer: config.sparql.referer.clone(),
            cookie,
        })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        // Every default is a valid literal, so conversion cannot fail.
        Self::try_from(&AppConfig::default()).unwrap_or_else(|e| unreachable!("{e}"))
    }
}

/// Convert a seconds value from the config file into a `Duration`.
pub fn seconds(field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        HarvestError::config(format!("{field} must be a non-negative number, got {value}"))
    })
}

fn parse_url(field: &str, value: &str) -> Result<Url> {
    Url::parse(value)
        .map_err(|e| HarvestError::config(format!("{field} '{value}' is not a URL: {e}")))
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.queryharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.queryharvest/queryharvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        HarvestError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
