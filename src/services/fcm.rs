//! Firebase Cloud Messaging HTTP v1 client.
//!
//! Access tokens are minted from a Google service account: an RS256-signed
//! JWT assertion is exchanged at the account's `token_uri` and cached until
//! shortly before it expires.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::FcmConfig;
use crate::error::{AppError, AppResult};
use crate::services::push::{redact_token, PushGateway, PushMessage};

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the token actually expires.
const TOKEN_REFRESH_MARGIN_SECONDS: i64 = 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The subset of a Google service-account key file this client needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: Option<String>,
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccount {
    pub fn from_file(path: &str) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read FCM credentials {}: {}", path, e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| AppError::Config(format!("Invalid FCM credentials {}: {}", path, e)))
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    message: &'a PushMessage,
}

#[derive(Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECONDS) < self.expires_at
    }
}

pub struct FcmService {
    client: reqwest::Client,
    account: ServiceAccount,
    project_id: String,
    api_base_url: String,
    token: RwLock<Option<CachedToken>>,
}

impl FcmService {
    pub fn new(config: &FcmConfig) -> AppResult<Self> {
        let account = ServiceAccount::from_file(&config.credentials_file)?;
        Self::from_service_account(account, config.project_id.clone(), &config.api_base_url)
    }

    pub fn from_service_account(
        account: ServiceAccount,
        project_override: Option<String>,
        api_base_url: &str,
    ) -> AppResult<Self> {
        let project_id = project_override
            .or_else(|| account.project_id.clone())
            .ok_or_else(|| {
                AppError::Config(
                    "FCM project id missing: set FCM_PROJECT_ID or use a key file with project_id"
                        .to_string(),
                )
            })?;

        tracing::info!(
            "FCM client configured: project={}, account={}",
            project_id,
            account.client_email
        );

        Ok(Self {
            client: reqwest::Client::new(),
            account,
            project_id,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.api_base_url, self.project_id
        )
    }

    fn signed_assertion(&self, now: DateTime<Utc>) -> AppResult<String> {
        let claims = Claims {
            iss: &self.account.client_email,
            scope: FCM_SCOPE,
            aud: &self.account.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let key = EncodingKey::from_rsa_pem(self.account.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }

    async fn fetch_access_token(&self) -> AppResult<CachedToken> {
        let now = Utc::now();
        let assertion = self.signed_assertion(now)?;

        let response = self
            .client
            .post(&self.account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Push(format!(
                "Token exchange failed ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await?;
        tracing::debug!("Fetched FCM access token, expires in {}s", token.expires_in);

        Ok(CachedToken {
            value: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }

    async fn access_token(&self) -> AppResult<String> {
        let now = Utc::now();
        if let Some(cached) = self.token.read().await.as_ref() {
            if cached.is_fresh(now) {
                return Ok(cached.value.clone());
            }
        }

        let mut slot = self.token.write().await;
        // Another sender may have refreshed while we waited for the lock.
        if let Some(cached) = slot.as_ref() {
            if cached.is_fresh(now) {
                return Ok(cached.value.clone());
            }
        }

        let fresh = self.fetch_access_token().await?;
        let value = fresh.value.clone();
        *slot = Some(fresh);
        Ok(value)
    }

    #[cfg(test)]
    async fn seed_access_token(&self, value: &str) {
        *self.token.write().await = Some(CachedToken {
            value: value.to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        });
    }
}

#[async_trait]
impl PushGateway for FcmService {
    async fn send(&self, message: &PushMessage) -> AppResult<String> {
        let access_token = self.access_token().await?;

        let response = self
            .client
            .post(self.send_url())
            .bearer_auth(access_token)
            .json(&SendRequest { message })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                *self.token.write().await = None;
            }
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Push(format!(
                "FCM error ({}) for token {}: {}",
                status,
                redact_token(&message.token),
                body
            )));
        }

        let sent: SendResponse = response.json().await?;
        Ok(sent.name)
    }
}
