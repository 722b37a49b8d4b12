use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable holding the API base URL, e.g. `https://crm.example.com/Api/V8`
pub const ENV_URL: &str = "SUITECRM_URL";
pub const ENV_CLIENT_ID: &str = "SUITECRM_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SUITECRM_CLIENT_SECRET";
pub const ENV_TOKEN_FILE: &str = "SUITECRM_TOKEN_FILE";
pub const ENV_LOGOUT_ON_EXIT: &str = "SUITECRM_LOGOUT_ON_EXIT";

/// OAuth2 client credentials and the API base URL
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: String,
    #[serde(rename = "url")]
    pub base_url: String,
}

impl Credential {
    /// Build a validated credential
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let credential = Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: base_url.into(),
        };
        credential.validate()?;
        Ok(credential)
    }

    /// Check that every field is present and the base URL is absolute
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::MissingField("client_id"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(ConfigError::MissingField("client_secret"));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField("url"));
        }
        Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Base URL without a trailing slash
    pub fn api_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// A CRM module exposed under a caller-chosen alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomModule {
    pub client_name: String,
    pub crm_name: String,
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    #[serde(flatten)]
    pub credential: Credential,
    #[serde(default)]
    pub custom_modules: Vec<CustomModule>,
    /// Log out and clear the persisted token when the client is closed
    #[serde(default)]
    pub logout_on_exit: bool,
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl CrmConfig {
    pub fn new(
        url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            credential: Credential::new(client_id, client_secret, url)?,
            custom_modules: Vec::new(),
            logout_on_exit: false,
            token_file: None,
            user_agent: None,
        })
    }

    /// Read the configuration from `SUITECRM_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let var = |name: &'static str, field: &'static str| {
            std::env::var(name).map_err(|_| ConfigError::MissingField(field))
        };

        let mut config = Self::new(
            var(ENV_URL, "url")?,
            var(ENV_CLIENT_ID, "client_id")?,
            var(ENV_CLIENT_SECRET, "client_secret")?,
        )?;
        config.token_file = std::env::var(ENV_TOKEN_FILE).ok().map(PathBuf::from);
        config.logout_on_exit = std::env::var(ENV_LOGOUT_ON_EXIT)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Ok(config)
    }

    /// Read the configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.credential.validate()?;
        Ok(config)
    }

    pub fn with_custom_module(
        mut self,
        client_name: impl Into<String>,
        crm_name: impl Into<String>,
    ) -> Self {
        self.custom_modules.push(CustomModule {
            client_name: client_name.into(),
            crm_name: crm_name.into(),
        });
        self
    }

    pub fn with_logout_on_exit(mut self, logout_on_exit: bool) -> Self {
        self.logout_on_exit = logout_on_exit;
        self
    }

    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = Some(path.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}
