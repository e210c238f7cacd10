//! The weather aggregation handler: one city in, one combined result out.

use std::sync::Arc;

use chrono::{FixedOffset, Local};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    error::WeatherError,
    model::{AggregatedResult, ForecastDay, WeatherQuery},
    provider::{
        Endpoints, JsonFetcher,
        openweather::{
            OwCurrentResponse, air_quality_index, daily_forecast, embedded_failure,
            forecast_samples,
        },
    },
};

const DEFAULT_NOT_FOUND: &str = "City not found";

/// Combines current conditions, the daily forecast and the air quality index
/// for a city.
///
/// Upstream calls run strictly in order: current conditions, forecast, then
/// air quality, which needs the coordinates from the first call. Any
/// top-level failure ends the request; no partial result is returned.
#[derive(Debug, Clone)]
pub struct WeatherAggregator {
    fetcher: Arc<dyn JsonFetcher>,
    api_key: Option<String>,
    endpoints: Endpoints,
    utc_offset: Option<FixedOffset>,
}

impl WeatherAggregator {
    /// `api_key` is `None` only when running in test mode; every request then
    /// fails with [`WeatherError::Configuration`].
    pub fn new(fetcher: Arc<dyn JsonFetcher>, api_key: Option<String>, endpoints: Endpoints) -> Self {
        Self {
            fetcher,
            api_key,
            endpoints,
            utc_offset: None,
        }
    }

    /// Bucket forecast samples by dates at a fixed offset instead of the
    /// server's local timezone.
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = Some(offset);
        self
    }

    pub async fn aggregate(&self, city: &str) -> Result<AggregatedResult, WeatherError> {
        let query = WeatherQuery::parse(city)?;
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            WeatherError::Configuration("API key is not configured".to_string())
        })?;

        info!(city = query.city(), "aggregating weather");

        let result = self.run(&query, api_key).await;
        match &result {
            Err(err) if err.is_client_error() => {
                info!(city = query.city(), status = err.status_code(), error = %err, "lookup rejected");
            }
            Err(err) => {
                warn!(city = query.city(), status = err.status_code(), error = %err, "aggregation failed");
            }
            Ok(_) => {}
        }
        result
    }

    async fn run(&self, query: &WeatherQuery, api_key: &str) -> Result<AggregatedResult, WeatherError> {
        let city_params = [("q", query.city()), ("appid", api_key), ("units", "metric")];

        let current_payload = self.fetch(&self.endpoints.current, &city_params).await?;
        if let Some(failure) = embedded_failure(&current_payload) {
            debug!(code = ?failure.code, "current weather reported failure");
            return Err(WeatherError::NotFound(
                failure.message.unwrap_or_else(|| DEFAULT_NOT_FOUND.to_string()),
            ));
        }
        let current = OwCurrentResponse::deserialize(&current_payload).map_err(|e| {
            WeatherError::Upstream(format!("malformed current weather payload: {e}"))
        })?;

        let forecast_payload = self.fetch(&self.endpoints.forecast, &city_params).await?;
        let forecast = self.forecast_days(&forecast_payload)?;

        let lat = current.coord.lat.to_string();
        let lon = current.coord.lon.to_string();
        let aqi_params = [("lat", lat.as_str()), ("lon", lon.as_str()), ("appid", api_key)];
        let aqi_payload = self.fetch(&self.endpoints.air_quality, &aqi_params).await?;
        let aqi = air_quality_index(&aqi_payload);

        Ok(AggregatedResult {
            current: current.into_conditions(aqi),
            forecast,
        })
    }

    async fn fetch(&self, url: &str, params: &[(&str, &str)]) -> Result<Value, WeatherError> {
        debug!(%url, "calling upstream");
        Ok(self.fetcher.get_json(url, params).await?)
    }

    fn forecast_days(&self, payload: &Value) -> Result<Vec<ForecastDay>, WeatherError> {
        if let Some(failure) = embedded_failure(payload) {
            return Err(WeatherError::Upstream(format!(
                "forecast request failed: {}",
                failure.message.as_deref().unwrap_or("unknown error")
            )));
        }

        let samples = forecast_samples(payload);
        let days = match self.utc_offset {
            Some(offset) => daily_forecast(&samples, &offset),
            None => daily_forecast(&samples, &Local),
        };
        debug!(samples = samples.len(), days = days.len(), "forecast deduplicated");

        Ok(days)
    }
}
