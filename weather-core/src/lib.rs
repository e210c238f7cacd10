//! Core library for the weather aggregation service.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The upstream fetcher abstraction and OpenWeather payload normalization
//! - Shared domain models (query, current conditions, daily forecast)
//! - The aggregation handler that ties the three upstream calls together
//!
//! It is used by `weather-server`, but can also be reused by other binaries or services.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use aggregate::WeatherAggregator;
pub use config::Config;
pub use error::{FetchError, WeatherError};
pub use model::{AggregatedResult, CurrentConditions, ForecastDay, WeatherQuery};
pub use provider::{Endpoints, HttpFetcher, JsonFetcher};
