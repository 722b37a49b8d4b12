use crate::{
    auth::{Token, TokenProvider},
    error::{CrmError, CrmResult, RequestError},
};
use log::{debug, error, warn};
use reqwest::{header, Client, Method, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;

/// Marker in a 400 body meaning SuiteCRM cannot run the query, typically a
/// filter on a custom field.
pub const BACKEND_QUERY_FAILURE_MARKER: &str = "Database failure.";

/// Characters kept literal by [`encode_url`] besides the unreserved set
const SAFE_SEPARATORS: &[char] = &['/', ':', '?', '=', '&'];

/// Percent-encode a URL, keeping `/:?=&` as literal separators
pub fn encode_url(url: &str) -> String {
    let mut encoded = String::with_capacity(url.len());
    let mut buf = [0u8; 4];
    for ch in url.chars() {
        if SAFE_SEPARATORS.contains(&ch) {
            encoded.push(ch);
        } else {
            encoded.push_str(&urlencoding::encode(ch.encode_utf8(&mut buf)));
        }
    }
    encoded
}

/// Wrap a payload in the JSON:API `data` envelope
pub fn request_body(payload: &Value) -> Value {
    serde_json::json!({ "data": payload })
}

/// Issues authenticated calls and re-authenticates on expired or revoked tokens.
///
/// Each trigger (a locally expired token, an HTTP 401) gets at most one
/// refresh-and-retry per call.
#[derive(Clone)]
pub struct RequestExecutor {
    http: Client,
    auth: Arc<dyn TokenProvider>,
}

impl RequestExecutor {
    pub fn new(http: Client, auth: Arc<dyn TokenProvider>) -> Self {
        Self { http, auth }
    }

    pub fn token_provider(&self) -> &Arc<dyn TokenProvider> {
        &self.auth
    }

    /// Execute a call and return the parsed JSON body.
    ///
    /// Non-2xx statuses other than 401 and the backend query failure are
    /// returned as their parsed body.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        payload: Option<&Value>,
    ) -> CrmResult<Value> {
        let url = encode_url(url);
        let body = payload.map(request_body);

        let mut expired_retried = false;
        let mut revoked_retried = false;

        let mut token = self.auth.ensure_token().await?;
        loop {
            if token.is_expired() {
                if expired_retried {
                    error!("Access token still expired after refresh: {} {}", method, url);
                    return Err(RequestError::TokenExpired.into());
                }
                warn!("Access token expired, refreshing before {} {}", method, url);
                expired_retried = true;
                token = self.auth.refresh().await?;
                continue;
            }

            let response = self.send(&token, method.clone(), &url, body.as_ref()).await?;

            if response.status() == StatusCode::UNAUTHORIZED {
                if revoked_retried {
                    error!("401 (Unauthorized) after token refresh: {} {}", method, url);
                    return Err(RequestError::Unauthorized.into());
                }
                warn!("401 (Unauthorized), token revoked; refreshing and retrying {} {}", method, url);
                revoked_retried = true;
                token = self.auth.refresh().await?;
                continue;
            }

            return self.handle_response(response).await;
        }
    }

    async fn send(
        &self,
        token: &Token,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> CrmResult<Response> {
        debug!("HTTP {} {}", method, url);

        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(&token.access_token)
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(body) = body {
            debug!("Request body: {}", body);
            request = request.body(serde_json::to_vec(body)?);
        }

        Ok(request.send().await?)
    }

    async fn handle_response(&self, response: Response) -> CrmResult<Value> {
        let status = response.status();
        let text = response.text().await?;
        debug!("Response status: {}", status);

        if status == StatusCode::BAD_REQUEST && text.contains(BACKEND_QUERY_FAILURE_MARKER) {
            error!("Backend query unsupported: {}", text);
            return Err(RequestError::BackendQueryUnsupported { body: text }.into());
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        match serde_json::from_str(&text) {
            Ok(value) => {
                if !status.is_success() {
                    debug!("Returning error document for HTTP {}", status);
                }
                Ok(value)
            }
            Err(_) => Err(CrmError::UnexpectedResponse {
                status: status.as_u16(),
                body: text,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_url_keeps_separators() {
        assert_eq!(
            encode_url("https://crm.example.com/Api/V8/module/Contacts?fields[Contacts]=name,email&filter[status][eq]=Active"),
            "https://crm.example.com/Api/V8/module/Contacts?fields%5BContacts%5D=name%2Cemail&filter%5Bstatus%5D%5Beq%5D=Active"
        );
    }

    #[test]
    fn test_encode_url_escapes_values() {
        assert_eq!(
            encode_url("/module/Calls?filter[date_start][GT]=2020-05-08T09:59:00+00:00"),
            "/module/Calls?filter%5Bdate_start%5D%5BGT%5D=2020-05-08T09:59:00%2B00:00"
        );
        assert_eq!(encode_url("/module/Accounts?filter[name][eq]=Acme Inc"), "/module/Accounts?filter%5Bname%5D%5Beq%5D=Acme%20Inc");
        assert_eq!(encode_url("a_b.c-d~e"), "a_b.c-d~e");
        assert_eq!(encode_url("é"), "%C3%A9");
    }

    #[test]
    fn test_request_body_envelope() {
        let payload = serde_json::json!({"type": "Accounts", "id": "1", "attributes": {"name": "Acme"}});
        assert_eq!(
            request_body(&payload),
            serde_json::json!({"data": {"type": "Accounts", "id": "1", "attributes": {"name": "Acme"}}})
        );
    }
}
