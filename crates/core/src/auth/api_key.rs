//! API key authentication.

use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Validates requests against the configured API key.
///
/// The key may be supplied as:
/// - `Authorization: Bearer <key>` header
/// - `X-Api-Key: <key>` header
/// - `apikey=<key>` query parameter
pub struct ApiKeyAuthenticator {
    expected_key: String,
}

impl ApiKeyAuthenticator {
    pub fn new(api_key: String) -> Self {
        Self {
            expected_key: api_key,
        }
    }

    fn extract_key<'a>(&self, request: &'a AuthRequest) -> Option<&'a str> {
        if let Some(header) = request.headers.get("authorization") {
            let key = header
                .strip_prefix("Bearer ")
                .or_else(|| header.strip_prefix("bearer "));
            if key.is_some() {
                return key;
            }
        }

        request
            .headers
            .get("x-api-key")
            .or_else(|| request.query.get("apikey"))
            .map(String::as_str)
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let provided = self
            .extract_key(request)
            .ok_or(AuthError::NotAuthenticated)?;

        if constant_time_eq(provided.as_bytes(), self.expected_key.as_bytes()) {
            Ok(Identity {
                user_id: "api_key_user".to_string(),
                method: "api_key".to_string(),
            })
        } else {
            Err(AuthError::InvalidCredentials("Invalid API key".to_string()))
        }
    }

    fn method_name(&self) -> &'static str {
        "api_key"
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
