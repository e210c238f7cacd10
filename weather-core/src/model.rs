use serde::{Deserialize, Serialize};

use crate::error::WeatherError;

/// A validated city lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherQuery {
    city: String,
}

impl WeatherQuery {
    /// Trim the raw input and reject it when nothing is left.
    pub fn parse(raw: &str) -> Result<Self, WeatherError> {
        let city = raw.trim();
        if city.is_empty() {
            return Err(WeatherError::Validation("City name is required".to_string()));
        }

        Ok(Self { city: city.to_string() })
    }

    pub fn city(&self) -> &str {
        &self.city
    }
}

/// Current conditions for the requested city, including its air quality index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub name: String,
    pub country: String,
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub pressure: u32,
    /// Weather category label, e.g. "Clear" or "Rain".
    pub main: String,
    pub description: String,
    pub aqi: u8,
}

/// One representative forecast sample per calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    /// Display label such as "Tue, Nov 14".
    pub date: String,
    pub temp: f64,
    pub humidity: u8,
    pub description: String,
    pub main: String,
}

/// The reply to a successful lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub current: CurrentConditions,
    pub forecast: Vec<ForecastDay>,
}
