//! Upstream access: the fetcher seam and the OpenWeather payload shapes.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

use crate::error::FetchError;

pub mod http;
pub mod openweather;

pub use http::HttpFetcher;
pub use openweather::Endpoints;

/// Fetch a JSON document with a GET request.
///
/// Implementations return the parsed body whenever it is valid JSON, even for
/// non-2xx responses: OpenWeather reports its own status inside the payload.
#[async_trait]
pub trait JsonFetcher: Send + Sync + Debug {
    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, FetchError>;
}
