/// Roblox public REST API client
use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{ROBLOX_BACKOFF_STEP, ROBLOX_MAX_ATTEMPTS};

const USERS_API: &str = "https://users.roblox.com";
const THUMBNAILS_API: &str = "https://thumbnails.roblox.com";

/// Roblox API errors
#[derive(Debug, thiserror::Error)]
pub enum RobloxError {
    #[error("Roblox user '{0}' not found")]
    UserNotFound(String),

    #[error("Roblox API is rate limiting us (gave up after {0} attempts)")]
    RateLimited(u32),

    #[error("Roblox API request timed out")]
    Timeout,

    #[error("Roblox API request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// A Roblox account as returned by the users API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobloxUser {
    pub id: u64,
    pub name: String,
    pub display_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UsernameLookup<'a> {
    usernames: [&'a str; 1],
    exclude_banned_users: bool,
}

#[derive(Deserialize)]
struct DataList<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Thumbnail {
    state: String,
    image_url: Option<String>,
}

/// Delay before retry number `attempt` (1-based): linear backoff
fn backoff_delay(step: Duration, attempt: u32) -> Duration {
    step * attempt
}

#[derive(Clone)]
pub struct RobloxClient {
    http: reqwest::Client,
    timeout: Duration,
    backoff_step: Duration,
    users_api: String,
    thumbnails_api: String,
}

impl RobloxClient {
    pub fn new(timeout: Duration) -> Result<Self, RobloxError> {
        Self::with_endpoints(timeout, ROBLOX_BACKOFF_STEP, USERS_API, THUMBNAILS_API)
    }

    /// Client against other base URLs, e.g. a local stand-in server
    pub(crate) fn with_endpoints(
        timeout: Duration,
        backoff_step: Duration,
        users_api: &str,
        thumbnails_api: &str,
    ) -> Result<Self, RobloxError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("dvbot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            timeout,
            backoff_step,
            users_api: users_api.trim_end_matches('/').to_string(),
            thumbnails_api: thumbnails_api.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve a username to an account
    pub async fn user_by_username(&self, username: &str) -> Result<RobloxUser, RobloxError> {
        let body = UsernameLookup {
            usernames: [username],
            exclude_banned_users: true,
        };

        let response = self
            .send(|| {
                self.http
                    .post(format!("{}/v1/usernames/users", self.users_api))
                    .json(&body)
            })
            .await?;

        let list: DataList<RobloxUser> = response.json().await.map_err(classify)?;
        list.data
            .into_iter()
            .next()
            .ok_or_else(|| RobloxError::UserNotFound(username.to_string()))
    }

    /// Fetch the current profile (display name) of an account
    pub async fn profile(&self, user_id: u64) -> Result<RobloxUser, RobloxError> {
        let response = self
            .send(|| self.http.get(format!("{}/v1/users/{}", self.users_api, user_id)))
            .await;

        match response {
            Err(RobloxError::Http(e)) if e.status() == Some(StatusCode::NOT_FOUND) => {
                Err(RobloxError::UserNotFound(user_id.to_string()))
            }
            Err(e) => Err(e),
            Ok(response) => response.json().await.map_err(classify),
        }
    }

    /// Headshot image URL, if the thumbnail is ready
    pub async fn avatar_headshot(&self, user_id: u64) -> Result<Option<String>, RobloxError> {
        let response = self
            .send(|| {
                self.http
                    .get(format!("{}/v1/users/avatar-headshot", self.thumbnails_api))
                    .query(&[
                        ("userIds", user_id.to_string()),
                        ("size", "150x150".to_string()),
                        ("format", "Png".to_string()),
                        ("isCircular", "false".to_string()),
                    ])
            })
            .await?;

        let list: DataList<Thumbnail> = response.json().await.map_err(classify)?;
        Ok(list
            .data
            .into_iter()
            .find(|t| t.state == "Completed")
            .and_then(|t| t.image_url))
    }

    /// Send a request with the fixed timeout, retrying on HTTP 429
    async fn send<F>(&self, build: F) -> Result<Response, RobloxError>
    where
        F: Fn() -> RequestBuilder,
    {
        for attempt in 1..=ROBLOX_MAX_ATTEMPTS {
            let response = build().timeout(self.timeout).send().await.map_err(classify)?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempt < ROBLOX_MAX_ATTEMPTS {
                    let delay = backoff_delay(self.backoff_step, attempt);
                    warn!(
                        "Roblox API rate limited (attempt {}/{}), retrying in {:?}",
                        attempt, ROBLOX_MAX_ATTEMPTS, delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                break;
            }

            return response.error_for_status().map_err(classify);
        }

        Err(RobloxError::RateLimited(ROBLOX_MAX_ATTEMPTS))
    }
}

fn classify(error: reqwest::Error) -> RobloxError {
    if error.is_timeout() {
        RobloxError::Timeout
    } else {
        RobloxError::Http(error)
    }
}
