//! HTTP transport for an OpenAI-compatible endpoint
//!
//! One throttled POST helper. Two layers: a permit pool bounding
//! in-flight requests and a minimum spacing between request starts, both
//! derived from the configured requests-per-minute.

use super::types::ApiError;
use crate::providers::{invalid_response, rate_limited, request_failed};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Instant;
use tokio::sync::{Mutex, Semaphore};
use vigil_core::VigilResult;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAIClient {
    http: Client,
    api_key: String,
    base_url: String,
    permits: Semaphore,
    next_slot: Mutex<Option<Instant>>,
    spacing: std::time::Duration,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>, requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute.max(1);
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            permits: Semaphore::new(rpm as usize),
            next_slot: Mutex::new(None),
            spacing: std::time::Duration::from_millis((60_000 / u64::from(rpm)).max(10)),
        }
    }

    /// Point the client at a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// POST a JSON body to `endpoint` and decode the JSON response.
    pub async fn request<Req: Serialize, Res: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Req,
    ) -> VigilResult<Res> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| request_failed("openai", 0, format!("rate limiter closed: {e}")))?;
        self.wait_for_slot().await;

        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed("openai", 0, format!("request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| invalid_response("openai", format!("undecodable response: {e}")));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited("openai", retry_after_ms(response.headers())));
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiError>(&body)
            .map(|api| api.error.message)
            .unwrap_or(body);
        Err(request_failed("openai", i32::from(status.as_u16()), message))
    }

    /// Sleep until this request's paced start slot. The lock is held
    /// across the sleep so concurrent callers queue behind it.
    async fn wait_for_slot(&self) {
        let mut next = self.next_slot.lock().await;
        if let Some(at) = *next {
            let now = Instant::now();
            if at > now {
                tokio::time::sleep(at - now).await;
            }
        }
        *next = Some(Instant::now() + self.spacing);
    }
}

fn retry_after_ms(headers: &reqwest::header::HeaderMap) -> i64 {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<f64>().ok())
        .map(|seconds| (seconds * 1000.0) as i64)
        .unwrap_or(0)
}

impl std::fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
