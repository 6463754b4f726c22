//! Platform HTTP Client - Rate-limited Social API Client
//!
//! Wraps reqwest with bounded concurrency and retries for the external
//! platform's user, thumbnail and friends APIs. The platform may fail or
//! rate-limit at any time; transient statuses are retried with
//! exponential backoff, everything else surfaces as an error for the
//! caller's schedule to absorb.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::types::{
    DataEnvelope, FriendshipRecord, ThumbnailRecord, UserRecord, UsernameLookupRequest,
};
use crate::adapters::metrics::MetricsRegistry;
use crate::config::SocialConfig;
use crate::ports::social::{FriendshipState, PlatformUser, SocialPlatform};

/// Configuration for the platform client.
#[derive(Debug, Clone)]
pub struct SocialClientConfig {
    /// Users (username resolution) API base URL.
    pub users_base_url: String,
    /// Friends API base URL.
    pub friends_base_url: String,
    /// Thumbnails API base URL.
    pub thumbnails_base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum concurrent requests.
    pub max_concurrent: usize,
    /// Maximum retries on transient errors.
    pub max_retries: u32,
    /// Base delay between retries (exponential backoff).
    pub retry_base_delay: Duration,
}

impl From<&SocialConfig> for SocialClientConfig {
    fn from(config: &SocialConfig) -> Self {
        Self {
            users_base_url: config.users_base_url.clone(),
            friends_base_url: config.friends_base_url.clone(),
            thumbnails_base_url: config.thumbnails_base_url.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            max_concurrent: config.max_concurrent,
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }
}

/// Rate-limited HTTP client for the platform APIs.
pub struct SocialClient {
    /// Underlying HTTP client.
    http: Client,
    /// Client configuration.
    config: SocialClientConfig,
    /// Concurrency limiter.
    semaphore: Arc<Semaphore>,
    /// Service metrics (per-endpoint call outcomes).
    metrics: Arc<MetricsRegistry>,
}

impl SocialClient {
    /// Create a new platform client.
    pub fn new(config: SocialClientConfig, metrics: Arc<MetricsRegistry>) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(5)
            .build()
            .context("Failed to build HTTP client")?;

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));

        Ok(Self {
            http,
            config,
            semaphore,
            metrics,
        })
    }

    /// Execute a request with concurrency limiting and retries.
    ///
    /// Retries transport errors, 429 and 5xx; any other non-success
    /// status is permanent and returned immediately.
    async fn execute_with_retry(
        &self,
        request: RequestBuilder,
        endpoint: &'static str,
    ) -> Result<Response> {
        let _permit = self.semaphore.acquire().await.context("Semaphore closed")?;

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
                debug!(endpoint, attempt, delay_ms = delay.as_millis(), "Retrying request");
                sleep(delay).await;
            }

            let req = request.try_clone().context("Failed to clone request")?;

            match req.send().await {
                Ok(response) => match response.status() {
                    StatusCode::OK | StatusCode::CREATED => {
                        self.record(endpoint, "ok");
                        return Ok(response);
                    }
                    StatusCode::TOO_MANY_REQUESTS => {
                        warn!(endpoint, "Rate limited by platform, backing off");
                        sleep(Duration::from_secs(2)).await;
                        last_error = Some(anyhow::anyhow!("Rate limited"));
                        continue;
                    }
                    status if status.is_server_error() => {
                        warn!(endpoint, status = %status, "Server error, retrying");
                        last_error = Some(anyhow::anyhow!("Server error: {status}"));
                        continue;
                    }
                    status => {
                        let body = response.text().await.unwrap_or_default();
                        self.record(endpoint, "error");
                        return Err(anyhow::anyhow!("Platform error {status}: {body}"));
                    }
                },
                Err(e) => {
                    warn!(endpoint, error = %e, attempt, "Request failed");
                    last_error = Some(e.into());
                    continue;
                }
            }
        }

        self.record(endpoint, "error");
        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Max retries exceeded")))
    }

    fn record(&self, endpoint: &'static str, outcome: &'static str) {
        self.metrics
            .social_calls_total
            .with_label_values(&[endpoint, outcome])
            .inc();
    }
}

#[async_trait]
impl SocialPlatform for SocialClient {
    async fn resolve_user(&self, username: &str) -> Result<PlatformUser> {
        let url = format!("{}/v1/usernames/users", self.config.users_base_url);
        let body = UsernameLookupRequest {
            usernames: vec![username.to_string()],
            exclude_banned_users: true,
        };

        let response = self
            .execute_with_retry(self.http.post(&url).json(&body), "resolve_user")
            .await?;
        let envelope: DataEnvelope<UserRecord> = response
            .json()
            .await
            .context("Malformed username lookup response")?;

        let record = envelope
            .data
            .into_iter()
            .next()
            .with_context(|| format!("Unknown platform username: {username}"))?;

        Ok(PlatformUser {
            user_id: record.id,
            username: record.name,
            display_name: record.display_name,
        })
    }

    async fn avatar_url(&self, user_id: u64) -> Result<String> {
        let url = format!(
            "{}/v1/users/avatar-headshot?userIds={user_id}&size=150x150&format=Png",
            self.config.thumbnails_base_url
        );

        let response = self
            .execute_with_retry(self.http.get(&url), "avatar_url")
            .await?;
        let envelope: DataEnvelope<ThumbnailRecord> = response
            .json()
            .await
            .context("Malformed thumbnail response")?;

        envelope
            .data
            .into_iter()
            .find(|t| t.target_id == user_id && t.state == "Completed")
            .and_then(|t| t.image_url)
            .with_context(|| format!("No avatar available for user {user_id}"))
    }

    async fn friendship_state(
        &self,
        bot_user_id: u64,
        user_id: u64,
    ) -> Result<FriendshipState> {
        let url = format!(
            "{}/v1/users/{bot_user_id}/friends/statuses?userIds={user_id}",
            self.config.friends_base_url
        );

        let response = self
            .execute_with_retry(self.http.get(&url), "friendship_state")
            .await?;
        let envelope: DataEnvelope<FriendshipRecord> = response
            .json()
            .await
            .context("Malformed friendship status response")?;

        let record = envelope
            .data
            .into_iter()
            .find(|r| r.id == user_id)
            .with_context(|| format!("No friendship record for user {user_id}"))?;

        match record.status.as_str() {
            "Friends" => Ok(FriendshipState::Friends),
            "RequestSent" => Ok(FriendshipState::RequestSent),
            _ => Ok(FriendshipState::NotFriends),
        }
    }

    async fn send_friend_request(&self, bot_user_id: u64, user_id: u64) -> Result<()> {
        let url = format!(
            "{}/v1/users/{user_id}/request-friendship",
            self.config.friends_base_url
        );

        self.execute_with_retry(
            self.http
                .post(&url)
                .header("X-Bot-User-Id", bot_user_id.to_string()),
            "send_friend_request",
        )
        .await?;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        let url = format!("{}/v1/metadata", self.config.users_base_url);
        self.execute_with_retry(self.http.get(&url), "metadata")
            .await
            .is_ok()
    }
}
