use crate::{
    config::Credential,
    error::{AuthError, CrmResult},
    token_store::TokenStore,
};
use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Source of bearer tokens for the request executor
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return the token currently believed to be valid, fetching one if none is known
    async fn ensure_token(&self) -> CrmResult<Token>;

    /// Obtain a fresh token from the identity provider
    async fn refresh(&self) -> CrmResult<Token>;

    /// Forget the current token, in memory and in persistent storage
    async fn clear(&self) -> CrmResult<()>;
}

/// Bearer token issued by the SuiteCRM OAuth2 server
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Token {
    pub fn new(access_token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_at,
        }
    }

    /// Restore a token from its persisted form.
    ///
    /// A bare JSON string is taken as the access token. Any other content that
    /// is not a serialized token is used verbatim.
    pub fn from_raw(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(token) = serde_json::from_str::<Token>(raw) {
            return token;
        }
        match serde_json::from_str::<String>(raw) {
            Ok(access_token) => Self::new(access_token, None),
            Err(_) => Self::new(raw, None),
        }
    }

    /// Persisted form of the token
    pub fn to_raw(&self) -> CrmResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// A token without a known expiry never reports itself as expired
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    error_description: Option<String>,
    message: Option<String>,
}

/// OAuth error codes that signal a temporary condition on the server side
const TRANSIENT_OAUTH_ERRORS: &[&str] = &["server_error", "temporarily_unavailable"];

/// Absolute expiry for a lifetime in seconds, `None` when it cannot be represented
fn expiry_after(secs: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(secs).and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
}

/// Classify a non-success token endpoint response.
///
/// Server errors and transient OAuth codes are transport failures. Other
/// rejections (400, 401 or an OAuth error body) mean the credentials are bad.
fn classify_rejection(status: StatusCode, body: &str) -> AuthError {
    let oauth_error = serde_json::from_str::<OAuthErrorResponse>(body).ok();
    let transient = status.is_server_error()
        || oauth_error
            .as_ref()
            .is_some_and(|e| TRANSIENT_OAUTH_ERRORS.contains(&e.error.as_str()));

    if transient {
        return AuthError::TransportFailure(format!("HTTP {} - {}", status, body));
    }

    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED || oauth_error.is_some() {
        let message = oauth_error
            .map(|e| {
                e.error_description
                    .or(e.message)
                    .map(|d| format!("{}: {}", e.error, d))
                    .unwrap_or(e.error)
            })
            .unwrap_or_else(|| format!("HTTP {}", status));
        return AuthError::InvalidCredentials(message);
    }

    AuthError::TransportFailure(format!("HTTP {} - {}", status, body))
}

/// Token endpoint: the base URL with its last path segment replaced by `access_token`.
///
/// `https://crm.example.com/Api/V8` becomes `https://crm.example.com/Api/access_token`.
pub fn token_endpoint(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, _)) if !parent.ends_with('/') => format!("{}/access_token", parent),
        _ => format!("{}/access_token", trimmed),
    }
}

/// OAuth2 client-credentials grant against the SuiteCRM token endpoint
pub struct ClientCredentialsAuth {
    credential: Credential,
    store: Arc<dyn TokenStore>,
    http: Client,
    token: RwLock<Option<Token>>,
}

impl ClientCredentialsAuth {
    /// No network activity happens until the first token is needed
    pub fn new(credential: Credential, store: Arc<dyn TokenStore>, http: Client) -> Self {
        Self {
            credential,
            store,
            http,
            token: RwLock::new(None),
        }
    }

    pub fn token_url(&self) -> String {
        token_endpoint(&self.credential.base_url)
    }

    /// Token currently held in memory
    pub async fn current_token(&self) -> Option<Token> {
        self.token.read().await.clone()
    }

    async fn request_token(&self) -> Result<Token, AuthError> {
        let url = self.token_url();
        debug!("HTTP POST {} (grant_type=client_credentials)", url);

        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credential.client_id.as_str()),
                ("client_secret", self.credential.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::TransportFailure(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::TransportFailure(e.to_string()))?;
        debug!("Token endpoint responded with {}", status);

        if status.is_success() {
            let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
                AuthError::TransportFailure(format!("Malformed token response: {}", e))
            })?;
            let expires_at = parsed.expires_in.and_then(|secs| {
                let at = expiry_after(secs);
                if at.is_none() {
                    warn!("Ignoring out-of-range expires_in: {}", secs);
                }
                at
            });
            return Ok(Token {
                access_token: parsed.access_token,
                token_type: parsed.token_type,
                expires_at,
            });
        }

        let failure = classify_rejection(status, &body);
        if let AuthError::InvalidCredentials(message) = &failure {
            error!("Token request rejected: {}", message);
        }
        Err(failure)
    }
}

#[async_trait::async_trait]
impl TokenProvider for ClientCredentialsAuth {
    async fn ensure_token(&self) -> CrmResult<Token> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }

        if let Some(raw) = self.store.load()? {
            debug!("Using persisted access token");
            let token = Token::from_raw(&raw);
            *self.token.write().await = Some(token.clone());
            return Ok(token);
        }

        info!("No access token available, requesting a new one");
        self.refresh().await
    }

    async fn refresh(&self) -> CrmResult<Token> {
        let mut slot = self.token.write().await;
        info!("Fetching access token from {}", self.token_url());

        let token = self.request_token().await?;
        self.store.save(&token.to_raw()?)?;
        *slot = Some(token.clone());

        info!("Access token refreshed");
        Ok(token)
    }

    async fn clear(&self) -> CrmResult<()> {
        self.token.write().await.take();
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear persisted token: {}", e);
            return Err(e);
        }
        Ok(())
    }
}
