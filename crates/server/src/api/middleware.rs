//! Authentication and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use medusa_core::{AuthError, AuthRequest, Identity};

use super::error::ApiError;
use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Metrics middleware that tracks HTTP request duration and counts.
///
/// This middleware records:
/// - Request duration (histogram)
/// - Request count (counter)
/// - Requests in flight (gauge)
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Authentication middleware that validates requests using the configured authenticator.
///
/// Credentials may come from the `Authorization` or `X-Api-Key` headers or
/// from the `apikey` query parameter. Failures are answered with a JSON
/// error body.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let authenticator = state.authenticator();

    // Skip auth check if using NoneAuthenticator, but still insert anonymous identity
    if authenticator.method_name() == "none" {
        request.extensions_mut().insert(Identity::anonymous());
        return next.run(request).await;
    }

    let headers: HashMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    // Source IP is only known when served with connect info
    let source_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    let auth_request = AuthRequest {
        headers,
        query: HashMap::new(),
        source_ip,
    }
    .with_query_string(request.uri().query());

    match authenticator.authenticate(&auth_request).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            let (reason, status) = match &e {
                AuthError::NotAuthenticated => ("not_authenticated", StatusCode::UNAUTHORIZED),
                AuthError::InvalidCredentials(_) => {
                    ("invalid_credentials", StatusCode::UNAUTHORIZED)
                }
                AuthError::ConfigurationError(_) => {
                    ("internal_error", StatusCode::INTERNAL_SERVER_ERROR)
                }
            };
            AUTH_FAILURES_TOTAL.with_label_values(&[reason]).inc();
            tracing::debug!(%source_ip, reason, "Rejected request");
            ApiError::new(status, e.to_string()).into_response()
        }
    }
}

/// Extractor for authenticated user ID.
///
/// Falls back to "anonymous" if no identity is present.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let user_id = parts
            .extensions
            .get::<Identity>()
            .map(|id| id.user_id.clone())
            .unwrap_or_else(|| "anonymous".to_string());
        std::future::ready(Ok(AuthUser(user_id)))
    }
}
