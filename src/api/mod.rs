//! Upstream music-aggregation API.
//!
//! Every JSON endpoint answers `{code, data, message}` where `code == 200`
//! means success. `type=url` answers with a redirect to the audio file.

pub mod client;
pub mod endpoints;
pub mod models;

pub use client::ApiClient;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("upstream error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("malformed response: {0}")]
    Serde(#[from] serde_json::Error),
}
