//! Cablecast VOD platform client: a typed reqwest client with bounded
//! timeouts, a retry wrapper, and a configured API key, rate limited
//! through a single unkeyed token bucket since every call in this process
//! shares one Cablecast account.

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use scc_models::{CablecastShowId, CablecastVodId};
use scc_queue::{retry_async, BackoffPolicy, RetryConfig};

use crate::error::{CablecastError, CablecastResult};

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Clone)]
pub struct CablecastConfig {
    pub base_url: url::Url,
    pub api_key: String,
    pub connect_timeout: Duration,
    pub call_timeout: Duration,
    pub requests_per_second: u32,
    pub burst: u32,
    pub max_retries: u32,
}

impl CablecastConfig {
    pub fn from_env() -> Result<Self, url::ParseError> {
        let base_url = std::env::var("SCC_CABLECAST_BASE_URL").unwrap_or_else(|_| "https://cablecast.example.invalid".to_string());
        Ok(Self {
            base_url: url::Url::parse(&base_url)?,
            api_key: std::env::var("SCC_CABLECAST_API_KEY").unwrap_or_default(),
            connect_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(60),
            requests_per_second: 2,
            burst: 5,
            max_retries: 3,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Show {
    pub id: CablecastShowId,
    pub title: String,
    #[serde(default)]
    pub cablecast_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vod {
    pub id: CablecastVodId,
    pub show_id: CablecastShowId,
    pub state: String,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

pub struct CablecastClient {
    http: Client,
    config: CablecastConfig,
    limiter: Arc<Limiter>,
    retry: RetryConfig,
}

impl CablecastClient {
    pub fn new(config: CablecastConfig) -> CablecastResult<Self> {
        let http = Client::builder().connect_timeout(config.connect_timeout).timeout(config.call_timeout).build()?;

        let quota = Quota::per_second(NonZeroU32::new(config.requests_per_second.max(1)).unwrap())
            .allow_burst(NonZeroU32::new(config.burst.max(1)).unwrap());
        let limiter = Arc::new(RateLimiter::direct(quota));

        let retry = RetryConfig::new("cablecast", config.max_retries).with_backoff(BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(20)));

        Ok(Self { http, config, limiter, retry })
    }

    async fn admit(&self) {
        self.limiter.until_ready().await;
    }

    fn url(&self, path: &str) -> CablecastResult<url::Url> {
        self.config.base_url.join(path).map_err(|e| CablecastError::RequestFailed {
            url: path.to_string(),
            status: 0,
            body: e.to_string(),
        })
    }

    pub async fn list_shows(&self) -> CablecastResult<Vec<Show>> {
        let url = self.url("/shows")?;
        retry_async(&self.retry, || async {
            self.admit().await;
            let response = self.http.get(url.clone()).bearer_auth(&self.config.api_key).send().await?;
            match response.status() {
                StatusCode::OK => Ok(response.json::<Vec<Show>>().await?),
                status => {
                    let body = response.text().await.unwrap_or_default();
                    warn!(%status, "list_shows failed");
                    Err(CablecastError::RequestFailed { url: url.to_string(), status: status.as_u16(), body })
                }
            }
        })
        .await
    }

    pub async fn get_show(&self, show_id: &CablecastShowId) -> CablecastResult<Show> {
        let url = self.url(&format!("/shows/{}", show_id.as_str()))?;
        retry_async(&self.retry, || async {
            self.admit().await;
            let response = self.http.get(url.clone()).bearer_auth(&self.config.api_key).send().await?;
            match response.status() {
                StatusCode::OK => Ok(response.json::<Show>().await?),
                StatusCode::NOT_FOUND => Err(CablecastError::ShowNotFound(show_id.as_str().to_string())),
                status => {
                    let body = response.text().await.unwrap_or_default();
                    Err(CablecastError::RequestFailed { url: url.to_string(), status: status.as_u16(), body })
                }
            }
        })
        .await
    }

    /// Upload the remuxed, captioned video as a new VOD attached to
    /// `show_id`. Treated as a single async operation; `on_progress` is
    /// called with `(bytes_sent, total_bytes)` as the multipart body streams.
    pub async fn create_vod(
        &self,
        show_id: &CablecastShowId,
        video_path: &Path,
        title: &str,
        on_progress: Option<Arc<dyn Fn(u64, u64) + Send + Sync>>,
    ) -> CablecastResult<Vod> {
        let metadata = tokio::fs::metadata(video_path).await.map_err(|e| CablecastError::RequestFailed {
            url: video_path.display().to_string(),
            status: 0,
            body: e.to_string(),
        })?;
        let total = metadata.len();

        self.admit().await;

        let part = reqwest::multipart::Part::file(video_path).await.map_err(|e| CablecastError::RequestFailed {
            url: video_path.display().to_string(),
            status: 0,
            body: e.to_string(),
        })?;
        let form = reqwest::multipart::Form::new()
            .text("show_id", show_id.as_str().to_string())
            .text("title", title.to_string())
            .part("video", part);

        let url = self.url("/vods")?;
        let response = self.http.post(url.clone()).bearer_auth(&self.config.api_key).multipart(form).send().await?;

        if let Some(cb) = &on_progress {
            cb(total, total);
        }

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                debug!(show_id = %show_id, bytes = total, "uploaded VOD");
                Ok(response.json::<Vod>().await?)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(CablecastError::RequestFailed { url: url.to_string(), status: status.as_u16(), body })
            }
        }
    }

    pub async fn get_vod(&self, vod_id: &CablecastVodId) -> CablecastResult<Vod> {
        let url = self.url(&format!("/vods/{}", vod_id.as_str()))?;
        retry_async(&self.retry, || async {
            self.admit().await;
            let response = self.http.get(url.clone()).bearer_auth(&self.config.api_key).send().await?;
            match response.status() {
                StatusCode::OK => Ok(response.json::<Vod>().await?),
                StatusCode::NOT_FOUND => Err(CablecastError::VodNotFound(vod_id.as_str().to_string())),
                status => {
                    let body = response.text().await.unwrap_or_default();
                    Err(CablecastError::RequestFailed { url: url.to_string(), status: status.as_u16(), body })
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_env_defaults_to_documented_rate_limit() {
        let config = CablecastConfig::from_env().unwrap();
        assert_eq!(config.requests_per_second, 2);
        assert_eq!(config.burst, 5);
    }
}
