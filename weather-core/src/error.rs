use std::time::Duration;

use thiserror::Error;

/// Failure of a single aggregation request.
///
/// The `Display` text is what the caller sees in the `error` field of the
/// JSON reply; [`WeatherError::status_code`] picks the HTTP status.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Bad input from the caller (empty or missing city).
    #[error("{0}")]
    Validation(String),

    /// The current-weather upstream does not know the city.
    #[error("{0}")]
    NotFound(String),

    /// Network failure, unparsable payload or any other unexpected error
    /// while talking to the upstream services.
    #[error("Unexpected error: {0}")]
    Upstream(String),

    /// The service is missing its API credential.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl WeatherError {
    pub fn status_code(&self) -> u16 {
        match self {
            WeatherError::Validation(_) => 400,
            WeatherError::NotFound(_) => 404,
            WeatherError::Upstream(_) | WeatherError::Configuration(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

/// Transport-level failure of a [`crate::provider::JsonFetcher`].
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("{url} responded with status {status} and a non-JSON body: {body}")]
    InvalidBody { url: String, status: u16, body: String },
}

impl From<FetchError> for WeatherError {
    fn from(err: FetchError) -> Self {
        WeatherError::Upstream(err.to_string())
    }
}
