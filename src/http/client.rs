use crate::api::ApiError;
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use moka::future::Cache;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Rate-limited JSON client for the backend API, with a short-lived GET cache
#[derive(Debug, Clone)]
pub struct RateLimitedHttpClient {
    http: reqwest::Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    cache: Cache<String, Value>,
    base_url: String,
    api_token: Option<String>,
}

impl RateLimitedHttpClient {
    /// Create a new rate-limited client rooted at `base_url`
    pub fn new(
        base_url: &str,
        api_token: Option<String>,
        requests_per_second: u32,
        burst_capacity: u32,
        cache_ttl: Duration,
    ) -> Result<Self, ApiError> {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::new(burst_capacity).unwrap_or(NonZeroU32::MIN));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        // No request timeout: a hung provider call leaves its step pending
        let http = reqwest::Client::builder()
            .user_agent(concat!("integration-provisioner/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::from)?;

        let cache = Cache::builder()
            .max_capacity(100)
            .time_to_live(cache_ttl)
            .build();

        Ok(Self {
            http,
            rate_limiter,
            cache,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    /// POST a JSON payload and decode the JSON answer (empty bodies become `null`)
    pub async fn post_json(&self, path: &str, payload: &Value) -> Result<Value, ApiError> {
        self.wait_for_permit().await;

        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "POST backend request");

        let mut request = self.http.post(&url).json(payload);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        Self::decode(response).await
    }

    /// GET a JSON document, served from cache while fresh
    pub async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        if let Some(cached) = self.cache.get(path).await {
            debug!(path = %path, "Cache hit");
            return Ok(cached);
        }

        self.wait_for_permit().await;

        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET backend request");

        let mut request = self.http.get(&url);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let value = Self::decode(response).await?;
        self.cache.insert(path.to_string(), value.clone()).await;
        Ok(value)
    }

    /// Drop every cached entry whose key contains `pattern`
    pub async fn invalidate_cache_pattern(&self, pattern: &str) {
        let keys_to_remove: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.contains(pattern))
            .map(|(key, _)| key.as_ref().clone())
            .collect();

        for key in keys_to_remove {
            self.cache.invalidate(&key).await;
        }

        debug!("Invalidated cache entries matching pattern: {}", pattern);
    }

    async fn wait_for_permit(&self) {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
            .await;
    }

    async fn decode(response: reqwest::Response) -> Result<Value, ApiError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16(), &body));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse {
            message: e.to_string(),
        })
    }
}
