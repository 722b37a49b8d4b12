/*
 * SuiteCRM client - Rust client for the SuiteCRM V8 JSON:API
 */

// Internal modules
mod client;
pub mod models;
mod apis;
mod error;
pub mod auth;
pub mod config;
pub mod executor;
pub mod query;
pub mod token_store;

// Re-export public types and interfaces
pub use client::{SuiteCrmClient, BUILTIN_MODULES, DEFAULT_USER_AGENT};
pub use models::*;
pub use apis::Module;
pub use error::{AuthError, ConfigError, CrmError, CrmResult, QueryError, RequestError};
pub use auth::{ClientCredentialsAuth, Token, TokenProvider};
pub use config::{CrmConfig, Credential, CustomModule};
pub use executor::RequestExecutor;
pub use query::{FilterSpec, FilterValue, Operator, QueryBuilder};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};

// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        SuiteCrmClient, Module,
        CrmConfig, Credential,
        CrmError, CrmResult,
        FilterSpec, FilterValue, Operator, QueryBuilder,
        TokenStore, FileTokenStore, MemoryTokenStore,
        // Common model types
        Record, ListDocument,
    };
}
