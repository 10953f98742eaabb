//! Error types for the sky crate

use thiserror::Error;

/// Main error type for the crate
///
/// Only configuration loading is fallible. The per-frame surface of
/// [`crate::sky::SkyManager`] clamps or ignores bad input instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
