//! Authorization for wicket
//!
//! A request is authorized when its `Authorization: Bearer <token>` header
//! carries a token from the static allowlist. The collection-name presence
//! check belongs to the same guard: clients that omit it are rejected with
//! 401, exactly like clients that omit the token.

use hyper::header::AUTHORIZATION;
use hyper::HeaderMap;
use serde_json::Value;
use std::collections::HashSet;

use crate::types::{GatewayError, Result};

/// Extract the bearer token from an `Authorization` header value.
///
/// Accepts any case of the `Bearer` scheme. Returns None when the header
/// is absent, carries another scheme, or carries an empty token.
pub fn extract_token_from_header(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Static set of accepted bearer tokens, loaded once from configuration
#[derive(Debug, Clone)]
pub struct TokenAllowlist {
    tokens: HashSet<String>,
}

impl TokenAllowlist {
    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Authorize a request from its headers
pub fn authorize(headers: &HeaderMap, allowlist: &TokenAllowlist) -> Result<()> {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    let token = extract_token_from_header(header)
        .ok_or_else(|| GatewayError::Unauthorized("No bearer token provided".to_string()))?;

    if !allowlist.contains(token) {
        return Err(GatewayError::Unauthorized("Invalid token".to_string()));
    }

    Ok(())
}

/// Require the collection name in a request payload.
///
/// Absence is an authorization failure (401), not a parameter error.
pub fn require_collection(params: &Value) -> Result<&str> {
    params
        .get("collection")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| GatewayError::Unauthorized("Collection name is required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;
    use serde_json::json;

    fn allowlist() -> TokenAllowlist {
        TokenAllowlist::new(vec!["alpha".to_string(), "beta".to_string()])
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(extract_token_from_header(Some("Bearer abc")), Some("abc"));
        assert_eq!(extract_token_from_header(Some("bearer abc")), Some("abc"));
        assert_eq!(extract_token_from_header(Some("BEARER  abc ")), Some("abc"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert_eq!(extract_token_from_header(Some("Basic abc")), None);
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(Some("Bearer")), None);
        assert_eq!(extract_token_from_header(None), None);
    }

    #[test]
    fn authorize_accepts_listed_token() {
        assert!(authorize(&headers_with("Bearer alpha"), &allowlist()).is_ok());
    }

    #[test]
    fn authorize_rejects_unknown_token() {
        let err = authorize(&headers_with("Bearer gamma"), &allowlist()).unwrap_err();
        assert!(matches!(err, GatewayError::Unauthorized(_)));
    }

    #[test]
    fn authorize_rejects_missing_header() {
        let err = authorize(&HeaderMap::new(), &allowlist()).unwrap_err();
        assert!(matches!(err, GatewayError::Unauthorized(_)));
    }

    #[test]
    fn collection_presence_is_an_authorization_rule() {
        assert_eq!(
            require_collection(&json!({"collection": "users"})).unwrap(),
            "users"
        );

        for payload in [json!({}), json!({"collection": ""}), json!({"collection": 7})] {
            let err = require_collection(&payload).unwrap_err();
            assert!(matches!(err, GatewayError::Unauthorized(_)));
        }
    }
}
