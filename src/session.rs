//! Shared API session.
//!
//! A [`Session`] bundles the executor, the API base URL, the client id and
//! the cached access token. It is shared (behind an `Arc`) by the registry
//! and every conduit it owns. The token is written only by token
//! acquisition and read by every call.

use reqwest::Method;
use std::sync::{PoisonError, RwLock};

use crate::error::{ConduitError, Result};
use crate::executor::{ApiRequest, ApiResponse, RequestExecutor};

/// Credentials and transport shared by every API call.
#[derive(Debug)]
pub struct Session {
    executor: RequestExecutor,
    api_base_url: String,
    client_id: String,
    token: RwLock<Option<String>>,
}

impl Session {
    /// Creates a session with no access token yet.
    pub fn new(
        executor: RequestExecutor,
        api_base_url: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        let api_base_url: String = api_base_url.into();
        Self {
            executor,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            token: RwLock::new(None),
        }
    }

    /// Returns the application client id.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the API base URL, without trailing slash.
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Returns the underlying executor.
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Replaces the cached access token.
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    /// Returns `true` once a token has been acquired.
    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Returns a copy of the cached access token.
    pub fn token(&self) -> Result<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ConduitError::MissingToken)
    }

    /// Builds an authorized request for an API path such as
    /// `/eventsub/conduits`.
    pub fn request(&self, method: Method, path: &str) -> Result<ApiRequest> {
        let token = self.token()?;
        Ok(
            ApiRequest::new(method, format!("{}{}", self.api_base_url, path))
                .header("Authorization", format!("Bearer {token}"))
                .header("Client-Id", self.client_id.as_str()),
        )
    }

    /// Sends a request through the executor.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.executor.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;

    fn session() -> Session {
        let executor = RequestExecutor::with_client(reqwest::Client::new(), RetryPolicy::default());
        Session::new(executor, "https://api.example.com/helix/", "client-abc")
    }

    #[test]
    fn test_request_requires_token() {
        let session = session();
        assert!(!session.has_token());
        assert!(matches!(
            session.request(Method::GET, "/eventsub/conduits"),
            Err(ConduitError::MissingToken)
        ));
    }

    #[test]
    fn test_request_carries_auth_headers() {
        let session = session();
        session.set_token("tok123");

        let request = session.request(Method::GET, "/eventsub/conduits").unwrap();
        assert_eq!(request.url, "https://api.example.com/helix/eventsub/conduits");
        assert!(request
            .headers
            .contains(&("Authorization".to_string(), "Bearer tok123".to_string())));
        assert!(request
            .headers
            .contains(&("Client-Id".to_string(), "client-abc".to_string())));
    }

    #[test]
    fn test_token_can_be_replaced() {
        let session = session();
        session.set_token("first");
        session.set_token("second");
        assert_eq!(session.token().unwrap(), "second");
    }
}
