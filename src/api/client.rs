use crate::api::endpoints::Endpoints;
use crate::api::models::{self, ApiEnvelope, Provider, SearchScope, SongInfo, Track};
use crate::api::ApiError;
use crate::config::ApiConfig;
use anyhow::Context;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct Inner {
    http: reqwest::Client,
    endpoints: Endpoints,
}

/// Client for the music-aggregation API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    pub fn new(cfg: &ApiConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, */*"));

        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .default_headers(headers)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build reqwest client")?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                endpoints: Endpoints::new(&cfg.base_url),
            }),
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.inner.endpoints
    }

    pub async fn search(&self, scope: SearchScope, keyword: &str) -> Result<Vec<Track>, ApiError> {
        let url = self.inner.endpoints.search(scope, keyword);
        let data = self.get_envelope(&url).await?;
        Ok(models::tracks_from_search_data(&data, scope.provider()))
    }

    pub async fn info(&self, provider: Provider, id: &str) -> Result<SongInfo, ApiError> {
        let url = self.inner.endpoints.info(provider, id);
        let data = self.get_envelope(&url).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// HEAD the URL, following redirects, and return the final location.
    pub async fn head_final_url(&self, url: &str) -> Result<String, ApiError> {
        let resp = self
            .inner
            .http
            .head(url)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.url().to_string())
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String, ApiError> {
        let text = self
            .inner
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(text)
    }

    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let bytes = self
            .inner
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }

    /// GET a JSON endpoint and unwrap the `{code, data, message}` envelope.
    async fn get_envelope(&self, url: &str) -> Result<serde_json::Value, ApiError> {
        tracing::debug!(%url, "api request");
        let body = self
            .inner
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let envelope: ApiEnvelope = serde_json::from_str(&body)?;
        unwrap_envelope(envelope)
    }
}

fn unwrap_envelope(envelope: ApiEnvelope) -> Result<serde_json::Value, ApiError> {
    if envelope.code == 200 {
        Ok(envelope.data)
    } else {
        Err(ApiError::Api {
            code: envelope.code,
            message: envelope
                .message
                .unwrap_or_else(|| "request failed".to_string()),
        })
    }
}
