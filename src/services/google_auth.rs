use std::time::Duration;

use anyhow::{bail, Context};
use reqwest::Client;
use serde::Deserialize;
use tokio::{sync::RwLock, time::Instant};

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Tokens are swapped out this long before google says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// An authorized-user credential as exported by `gcloud` or an installed-app flow.
#[derive(Debug, Clone, Deserialize)]
struct AuthorizedUser {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

pub struct GoogleAuth {
    credentials: AuthorizedUser,
    client: Client,
    cached_token: RwLock<Option<CachedToken>>,
}

impl GoogleAuth {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read google credentials from {}", path))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let credentials: AuthorizedUser =
            serde_json::from_str(json).context("Malformed google credentials")?;

        Ok(GoogleAuth {
            credentials,
            client: Client::new(),
            cached_token: RwLock::new(None),
        })
    }

    /// Returns a live access token, exchanging the refresh token when the cached one is stale.
    pub async fn access_token(&self) -> anyhow::Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > Instant::now() + EXPIRY_MARGIN {
                    return Ok(token.token.clone());
                }
            }
        }

        let mut cached = self.cached_token.write().await;
        let response = self.refresh().await?;
        let token = response.access_token.clone();
        *cached = Some(CachedToken {
            token: response.access_token,
            expires_at: Instant::now() + Duration::from_secs(response.expires_in),
        });
        log::info!("Refreshed google access token");

        Ok(token)
    }

    async fn refresh(&self) -> anyhow::Result<TokenResponse> {
        let res = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
            ])
            .send()
            .await
            .context("Token endpoint unreachable")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            bail!("Token refresh failed ({}): {}", status, body);
        }

        Ok(res.json::<TokenResponse>().await?)
    }
}
