use serde::Serialize;
use std::collections::HashMap;
use std::net::IpAddr;

/// What the authenticator gets to see of an HTTP request.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    /// Decoded query string parameters.
    pub query: HashMap<String, String>,
    pub source_ip: IpAddr,
}

impl AuthRequest {
    /// Parse a raw query string (`a=1&b=2`) into the request.
    pub fn with_query_string(mut self, query: Option<&str>) -> Self {
        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                let value = urlencoding::decode(value)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| value.to_string());
                self.query.insert(key.to_string(), value);
            }
        }
        self
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
        }
    }
}
