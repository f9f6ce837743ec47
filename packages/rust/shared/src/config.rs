//! Application configuration for rivalscope.
//!
//! User config lives at `~/.rivalscope/rivalscope.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored here: the config only names the env vars.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, RivalscopeError};
use crate::types::SearchDepth;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "rivalscope.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".rivalscope";

// ---------------------------------------------------------------------------
// Config structs (matching rivalscope.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Text generation and embedding provider.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Web search provider.
    #[serde(default)]
    pub tavily: TavilyConfig,

    /// Competitive-analysis workflow knobs.
    #[serde(default)]
    pub research: ResearchConfig,

    /// Where report artifacts are written.
    #[serde(default)]
    pub output: OutputConfig,

    /// Document question-answering settings.
    #[serde(default)]
    pub docqa: DocQaConfig,
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,

    /// Generation model.
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// Embedding model used by document QA.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// API root (overridable for proxies and tests).
    #[serde(default = "default_gemini_base_url")]
    pub base_url: Url,

    /// Per-request timeout.
    #[serde(default = "default_gemini_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_key_env(),
            model: default_gemini_model(),
            embedding_model: default_embedding_model(),
            base_url: default_gemini_base_url(),
            timeout_secs: default_gemini_timeout(),
        }
    }
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_gemini_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_embedding_model() -> String {
    "text-embedding-004".into()
}
fn default_gemini_base_url() -> Url {
    Url::parse("https://generativelanguage.googleapis.com").expect("static URL")
}
fn default_gemini_timeout() -> u64 {
    120
}

/// `[tavily]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TavilyConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_tavily_key_env")]
    pub api_key_env: String,

    /// API root.
    #[serde(default = "default_tavily_base_url")]
    pub base_url: Url,

    /// Depth requested for every research query.
    #[serde(default)]
    pub search_depth: SearchDepth,

    /// Results requested per query.
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// Per-request timeout.
    #[serde(default = "default_tavily_timeout")]
    pub timeout_secs: u64,
}

impl Default for TavilyConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_tavily_key_env(),
            base_url: default_tavily_base_url(),
            search_depth: SearchDepth::default(),
            max_results: default_max_results(),
            timeout_secs: default_tavily_timeout(),
        }
    }
}

fn default_tavily_key_env() -> String {
    "TAVILY_API_KEY".into()
}
fn default_tavily_base_url() -> Url {
    Url::parse("https://api.tavily.com").expect("static URL")
}
fn default_max_results() -> u32 {
    3
}
fn default_tavily_timeout() -> u64 {
    30
}

/// `[research]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Lower bound on planned search queries (prompt hint only).
    #[serde(default = "default_min_queries")]
    pub min_queries: u32,

    /// Upper bound on planned search queries (prompt hint only).
    #[serde(default = "default_max_queries")]
    pub max_queries: u32,

    /// Characters of each finding's content fed to report synthesis.
    #[serde(default = "default_excerpt_chars")]
    pub content_excerpt_chars: usize,

    /// Language the report is written in.
    #[serde(default = "default_language")]
    pub report_language: String,

    /// Optional JSON fact table enabling the reconciled workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facts_file: Option<PathBuf>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            min_queries: default_min_queries(),
            max_queries: default_max_queries(),
            content_excerpt_chars: default_excerpt_chars(),
            report_language: default_language(),
            facts_file: None,
        }
    }
}

fn default_min_queries() -> u32 {
    5
}
fn default_max_queries() -> u32 {
    7
}
fn default_excerpt_chars() -> usize {
    1000
}
fn default_language() -> String {
    "English".into()
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the `.md` / `.csv` artifacts.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

/// `[docqa]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocQaConfig {
    /// Directory scanned for documents.
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,

    /// Directory holding the persisted vector index.
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    /// Window size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by consecutive windows.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Chunks retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// File extensions loaded (without the dot).
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for DocQaConfig {
    fn default() -> Self {
        Self {
            docs_dir: default_docs_dir(),
            index_dir: default_index_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            extensions: default_extensions(),
        }
    }
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_index_dir() -> PathBuf {
    PathBuf::from("vectorstore/db_index")
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    150
}
fn default_top_k() -> usize {
    3
}
fn default_extensions() -> Vec<String> {
    vec!["md".into(), "csv".into()]
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.rivalscope/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RivalscopeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.rivalscope/rivalscope.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| RivalscopeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        RivalscopeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RivalscopeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RivalscopeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RivalscopeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject settings that would make a stage misbehave.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let research = &config.research;
    if research.min_queries == 0 || research.min_queries > research.max_queries {
        return Err(RivalscopeError::config(format!(
            "research.min_queries ({}) must be >= 1 and <= research.max_queries ({})",
            research.min_queries, research.max_queries
        )));
    }
    if config.tavily.max_results == 0 {
        return Err(RivalscopeError::config("tavily.max_results must be >= 1"));
    }
    let docqa = &config.docqa;
    if docqa.chunk_size == 0 || docqa.chunk_overlap >= docqa.chunk_size {
        return Err(RivalscopeError::config(format!(
            "docqa.chunk_overlap ({}) must be smaller than docqa.chunk_size ({})",
            docqa.chunk_overlap, docqa.chunk_size
        )));
    }
    if docqa.top_k == 0 {
        return Err(RivalscopeError::config("docqa.top_k must be >= 1"));
    }
    Ok(())
}

/// Read a required secret from the environment.
///
/// Absent or empty values are fatal: nothing downstream can run without them.
pub fn require_api_key(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(RivalscopeError::MissingCredential {
            var: var_name.to_string(),
        }),
    }
}
