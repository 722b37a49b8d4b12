use thiserror::Error;

/// Configuration errors, raised before any network activity
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration value: {0}")]
    MissingField(&'static str),

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures of the client-credentials grant
#[derive(Error, Debug)]
pub enum AuthError {
    /// The identity provider rejected the client id/secret. Not retryable.
    #[error("401 (Unauthorized) - invalid client id/secret: {0}")]
    InvalidCredentials(String),

    #[error("Token request failed: {0}")]
    TransportFailure(String),
}

/// Terminal classifications made by the request executor
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("401 (Unauthorized) - token has been revoked, a new token was obtained and rejected as well")]
    Unauthorized,

    #[error("Access token expired again after a refresh")]
    TokenExpired,

    /// SuiteCRM cannot filter on some custom fields and answers with a 400.
    #[error("Backend query unsupported: {body}")]
    BackendQueryUnsupported { body: String },
}

/// Filter construction errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unknown filter operator: '{0}'")]
    UnknownOperator(String),
}

/// SuiteCRM client error types
#[derive(Error, Debug)]
pub enum CrmError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Token store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Unexpected response: {status} - {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Module alias already registered: {0}")]
    DuplicateModule(String),
}

/// Result type for SuiteCRM operations
pub type CrmResult<T> = Result<T, CrmError>;

impl CrmError {
    /// Create an invalid parameter error
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Returns `true` for conditions that end the whole operation and must
    /// not be retried by the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CrmError::Config(_)
                | CrmError::Auth(AuthError::InvalidCredentials(_))
                | CrmError::Request(RequestError::Unauthorized)
                | CrmError::Request(RequestError::TokenExpired)
        )
    }

    /// Returns `true` for the known SuiteCRM limitation on filtering by
    /// custom fields.
    pub fn is_backend_query_unsupported(&self) -> bool {
        matches!(
            self,
            CrmError::Request(RequestError::BackendQueryUnsupported { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(CrmError::from(AuthError::InvalidCredentials("bad".into())).is_fatal());
        assert!(CrmError::from(RequestError::Unauthorized).is_fatal());
        assert!(CrmError::from(RequestError::TokenExpired).is_fatal());
        assert!(CrmError::from(ConfigError::MissingField("client_id")).is_fatal());

        assert!(!CrmError::from(AuthError::TransportFailure("timeout".into())).is_fatal());
        assert!(!CrmError::from(QueryError::UnknownOperator("~".into())).is_fatal());
        assert!(!CrmError::invalid_param("page_size").is_fatal());
    }

    #[test]
    fn test_backend_query_unsupported_keeps_body() {
        let err = CrmError::from(RequestError::BackendQueryUnsupported {
            body: "Database failure. Please contact your administrator".into(),
        });
        assert!(err.is_backend_query_unsupported());
        assert!(err.to_string().contains("Database failure."));
    }
}
