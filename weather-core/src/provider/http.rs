use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::FetchError;

use super::JsonFetcher;

/// [`JsonFetcher`] backed by a shared `reqwest` client with a per-call timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, timeout })
    }

    fn request_error(&self, url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            return FetchError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            };
        }

        // The full URL carries the API key in its query string.
        FetchError::Request {
            url: url.to_string(),
            message: err.without_url().to_string(),
        }
    }
}

#[async_trait]
impl JsonFetcher for HttpFetcher {
    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, FetchError> {
        let res = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.request_error(url, e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| self.request_error(url, e))?;

        tracing::debug!(%url, %status, bytes = body.len(), "upstream responded");

        serde_json::from_str(&body).map_err(|_| FetchError::InvalidBody {
            url: url.to_string(),
            status: status.as_u16(),
            body: truncate_body(&body),
        })
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
