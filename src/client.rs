use crate::{
    apis::Module,
    auth::{ClientCredentialsAuth, Token, TokenProvider},
    config::CrmConfig,
    error::{CrmError, CrmResult},
    executor::RequestExecutor,
    token_store::{FileTokenStore, TokenStore, DEFAULT_TOKEN_FILE},
};
use log::{debug, info, warn};
use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// User-Agent sent with every request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/97.0.4692.99 Safari/537.36";

/// Modules every SuiteCRM instance exposes, registered under their own names
pub const BUILTIN_MODULES: &[&str] = &[
    "Accounts",
    "Bugs",
    "Calendar",
    "Calls",
    "Cases",
    "Campaigns",
    "Contacts",
    "Documents",
    "Email",
    "Emails",
    "Employees",
    "Leads",
    "Lists",
    "Meetings",
    "Notes",
    "Opportunities",
    "Projects",
    "Spots",
    "Surveys",
    "Target",
    "Targets",
    "Tasks",
    "Templates",
];

/// Main SuiteCRM client
pub struct SuiteCrmClient {
    config: CrmConfig,
    executor: RequestExecutor,
    modules: HashMap<String, String>,
}

impl SuiteCrmClient {
    /// Create a client persisting its token in `config.token_file`
    /// (`AccessToken.txt` by default).
    pub fn new(config: CrmConfig) -> CrmResult<Self> {
        let path = config
            .token_file
            .clone()
            .unwrap_or_else(|| DEFAULT_TOKEN_FILE.into());
        Self::with_token_store(config, Arc::new(FileTokenStore::new(path)))
    }

    /// Create a client with a custom token store
    pub fn with_token_store(config: CrmConfig, store: Arc<dyn TokenStore>) -> CrmResult<Self> {
        config.credential.validate()?;

        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let http = Client::builder().user_agent(user_agent).build()?;

        let auth = ClientCredentialsAuth::new(config.credential.clone(), store, http.clone());
        Ok(Self::with_executor(config, RequestExecutor::new(http, Arc::new(auth))))
    }

    /// Create a client around an existing executor
    pub fn with_executor(config: CrmConfig, executor: RequestExecutor) -> Self {
        let mut client = Self {
            config,
            executor,
            modules: BUILTIN_MODULES
                .iter()
                .map(|name| (name.to_string(), name.to_string()))
                .collect(),
        };
        client.load_custom_modules();
        client
    }

    fn load_custom_modules(&mut self) {
        for custom in self.config.custom_modules.clone() {
            if let Err(e) = self.register_module(&custom.client_name, &custom.crm_name) {
                warn!(
                    "Attempted to load {} module multiple times, keeping the first registration: {}",
                    custom.client_name, e
                );
            }
        }
    }

    /// Base API URL, without a trailing slash
    pub fn base_url(&self) -> &str {
        self.config.credential.api_url()
    }

    pub fn config(&self) -> &CrmConfig {
        &self.config
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Expose a CRM module under an alias
    pub fn register_module(
        &mut self,
        alias: impl Into<String>,
        crm_name: impl Into<String>,
    ) -> CrmResult<()> {
        let alias = alias.into();
        if self.modules.contains_key(&alias) {
            return Err(CrmError::DuplicateModule(alias));
        }
        let crm_name = crm_name.into();
        debug!("Registering module {} as {}", crm_name, alias);
        self.modules.insert(alias, crm_name);
        Ok(())
    }

    /// Registered module aliases, sorted
    pub fn modules(&self) -> Vec<&str> {
        let mut aliases: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        aliases.sort_unstable();
        aliases
    }

    /// Look up a module by alias
    pub fn module(&self, alias: &str) -> CrmResult<Module<'_>> {
        self.modules
            .get(alias)
            .map(|crm_name| Module::new(self, crm_name.clone()))
            .ok_or_else(|| CrmError::UnknownModule(alias.to_string()))
    }

    /// Access a module by its CRM name without registering it
    pub fn module_named(&self, crm_name: impl Into<String>) -> Module<'_> {
        Module::new(self, crm_name.into())
    }

    /// Obtain a token now instead of on the first request
    pub async fn authenticate(&self) -> CrmResult<Token> {
        self.executor.token_provider().ensure_token().await
    }

    /// Execute a call against an absolute URL
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        payload: Option<&Value>,
    ) -> CrmResult<Value> {
        self.executor.execute(method, url, payload).await
    }

    /// End the session: call the logout endpoint, then clear the token
    /// whatever the outcome of that call.
    pub async fn logout(&self) -> CrmResult<()> {
        info!("Logging out of {}", self.base_url());
        let url = self.url("/logout");
        if let Err(e) = self.executor.execute(Method::POST, &url, None).await {
            warn!("Logout call failed: {}", e);
        }
        self.executor.token_provider().clear().await
    }

    /// Close the client, logging out first when `logout_on_exit` is set
    pub async fn close(self) -> CrmResult<()> {
        if self.config.logout_on_exit {
            self.logout().await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SuiteCrmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuiteCrmClient")
            .field("config", &self.config)
            .field("modules", &self.modules.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_store::MemoryTokenStore;

    fn config() -> CrmConfig {
        CrmConfig::new("https://crm.example.com/Api/V8/", "id", "secret").unwrap()
    }

    fn client(config: CrmConfig) -> SuiteCrmClient {
        SuiteCrmClient::with_token_store(config, Arc::new(MemoryTokenStore::new())).unwrap()
    }

    #[test]
    fn test_builtin_modules_registered() {
        let client = client(config());
        assert_eq!(client.modules().len(), BUILTIN_MODULES.len());
        assert_eq!(client.module("Contacts").unwrap().name(), "Contacts");
        assert!(matches!(
            client.module("Contact"),
            Err(CrmError::UnknownModule(name)) if name == "Contact"
        ));
    }

    #[test]
    fn test_custom_modules_from_config() {
        let config = config()
            .with_custom_module("Invoices", "AOS_Invoices")
            .with_custom_module("Invoices", "AOS_Quotes")
            .with_custom_module("Contacts", "Custom_Contacts");
        let client = client(config);

        // First registration wins, built-ins are not shadowed
        assert_eq!(client.module("Invoices").unwrap().name(), "AOS_Invoices");
        assert_eq!(client.module("Contacts").unwrap().name(), "Contacts");
        assert_eq!(client.modules().len(), BUILTIN_MODULES.len() + 1);
    }

    #[test]
    fn test_register_duplicate_alias_is_recoverable() {
        let mut client = client(config());
        client.register_module("Quotes", "AOS_Quotes").unwrap();

        let err = client.register_module("Quotes", "Other").unwrap_err();
        assert!(matches!(err, CrmError::DuplicateModule(alias) if alias == "Quotes"));
        assert_eq!(client.module("Quotes").unwrap().name(), "AOS_Quotes");
    }

    #[test]
    fn test_url_joins_base_without_double_slash() {
        let client = client(config());
        assert_eq!(client.base_url(), "https://crm.example.com/Api/V8");
        assert_eq!(client.url("/logout"), "https://crm.example.com/Api/V8/logout");
    }

    #[test]
    fn test_module_named_bypasses_registry() {
        let client = client(config());
        assert_eq!(client.module_named("AOS_Products").name(), "AOS_Products");
    }
}
