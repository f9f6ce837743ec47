//! Shared types, error model, and configuration for rivalscope.
//!
//! This crate is the foundation depended on by all other rivalscope crates.
//! It provides:
//! - [`RivalscopeError`]: the unified error type
//! - Domain types ([`WebFinding`], [`Record`], [`SearchDepth`], [`RunId`])
//! - Configuration ([`AppConfig`], config loading, credential checks)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DocQaConfig, GeminiConfig, OutputConfig, ResearchConfig, TavilyConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, require_api_key,
    validate_config,
};
pub use error::{Result, RivalscopeError};
pub use types::{Record, RunId, SearchDepth, WebFinding};
