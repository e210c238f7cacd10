//! Deterministic fakes for tests. Enabled by the `test-util` feature.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::{error::FetchError, provider::JsonFetcher};

/// One call seen by [`ScriptedFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl RecordedCall {
    /// Last path segment of the URL, e.g. `weather` or `air_pollution`.
    pub fn endpoint(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or_default()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// [`JsonFetcher`] that replays canned replies keyed by the URL's last path
/// segment and records every call it receives.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    replies: HashMap<String, Result<Value, FetchError>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, endpoint: &str, body: Value) -> Self {
        self.replies.insert(endpoint.to_string(), Ok(body));
        self
    }

    pub fn fail(mut self, endpoint: &str, error: FetchError) -> Self {
        self.replies.insert(endpoint.to_string(), Err(error));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Endpoints called so far, in order.
    pub fn endpoints_called(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.endpoint().to_string()).collect()
    }
}

#[async_trait]
impl JsonFetcher for ScriptedFetcher {
    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, FetchError> {
        let call = RecordedCall {
            url: url.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        let endpoint = call.endpoint().to_string();
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);

        self.replies.get(&endpoint).cloned().unwrap_or_else(|| {
            Err(FetchError::Request {
                url: url.to_string(),
                message: "no scripted reply".to_string(),
            })
        })
    }
}
