//! Client-credentials token acquisition.
//!
//! Tokens are fetched once at startup and cached in the [`Session`]. Nothing
//! here refreshes them on expiry: a caller that starts seeing 401s re-runs
//! acquisition explicitly.
//!
//! [`Session`]: crate::session::Session

use reqwest::Method;
use serde::Deserialize;

use crate::error::{ConduitError, Result};
use crate::executor::{ApiRequest, RequestExecutor};

/// Successful response from the token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// The app access token.
    pub access_token: String,
    /// Seconds until the token expires.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Token type (typically "bearer").
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Successful response from the validation endpoint.
#[derive(Debug, Deserialize)]
pub struct ValidateResponse {
    /// Client id the token was issued to.
    pub client_id: String,
    /// Seconds until the token expires.
    pub expires_in: u64,
}

/// Exchanges client credentials for an app access token.
pub async fn acquire_token(
    executor: &RequestExecutor,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<TokenResponse> {
    let request = ApiRequest::new(Method::POST, token_url).form(&[
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("grant_type", "client_credentials"),
    ]);

    let token: TokenResponse = executor.send(&request).await?.expect_status(200)?.json()?;
    if token.access_token.is_empty() {
        return Err(ConduitError::InvalidResponse(
            "token endpoint returned an empty access_token".to_string(),
        ));
    }

    log::info!(
        "Acquired app access token (expires in {}s)",
        token.expires_in.unwrap_or_default()
    );
    Ok(token)
}

/// Checks whether a token is still accepted.
///
/// Returns `Ok(None)` when the token has been rejected (401), and the
/// validation details otherwise.
pub async fn validate_token(
    executor: &RequestExecutor,
    validate_url: &str,
    token: &str,
) -> Result<Option<ValidateResponse>> {
    let request =
        ApiRequest::new(Method::GET, validate_url).header("Authorization", format!("OAuth {token}"));

    let response = executor.send(&request).await?;
    if response.status == 401 {
        log::warn!("Access token rejected by validation endpoint");
        return Ok(None);
    }
    Ok(Some(response.expect_status(200)?.json()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_deserialize() {
        let json = r#"{
            "access_token": "jostpf5q0uzmxmkba9iyug38kjtgh",
            "expires_in": 5011271,
            "token_type": "bearer"
        }"#;
        let resp: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.access_token, "jostpf5q0uzmxmkba9iyug38kjtgh");
        assert_eq!(resp.expires_in, Some(5_011_271));
    }

    #[test]
    fn test_token_response_minimal() {
        let resp: TokenResponse = serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(resp.access_token, "abc");
        assert!(resp.token_type.is_none());
    }

    #[test]
    fn test_validate_response_deserialize() {
        let json = r#"{"client_id": "wbmytr93xzw8zbg0p1izqyzzc5mbiz", "scopes": [], "expires_in": 5520838}"#;
        let resp: ValidateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.client_id, "wbmytr93xzw8zbg0p1izqyzzc5mbiz");
        assert_eq!(resp.expires_in, 5_520_838);
    }
}
