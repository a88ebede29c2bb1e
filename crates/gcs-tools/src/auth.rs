//! Bearer-token resolution against an external auth gateway.
//!
//! The gateway contract is small: `POST <url>` with the caller's bearer token
//! in the `Authorization` header. A 200 response carries
//! `{"user_id": ..., "role": ...}`; anything else carries `{"error": ...}`.
//!
//! When no gateway is configured authentication is disabled and every
//! request runs anonymously, without sandboxing or role checks.

use serde::Deserialize;

use crate::identity::{Identity, Role};

/// Reasons a request could not be authenticated.
///
/// The `Display` text is what the caller sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The `Authorization` header was missing or not `Bearer <token>`.
    #[error("Invalid Authorization header format. Must be 'Bearer <token>'.")]
    InvalidAuthHeader,
    /// The gateway rejected the token.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    /// The gateway could not be reached.
    #[error("Error contacting authentication gateway: {0}")]
    GatewayUnreachable(String),
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Result<&str, AuthError> {
    match header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AuthError::InvalidAuthHeader),
    }
}

#[derive(Deserialize)]
struct GatewayIdentity {
    user_id: String,
    role: String,
}

#[derive(Deserialize)]
struct GatewayRejection {
    error: Option<String>,
}

/// HTTP client for the auth gateway.
#[derive(Debug, Clone)]
pub struct AuthGateway {
    url: String,
    http: reqwest::Client,
}

impl AuthGateway {
    /// Create a gateway client for the given validation URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    /// Create a gateway client reusing an existing HTTP client.
    pub fn with_client(url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            http,
        }
    }

    /// The validation URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Validate a token and return the caller's identity.
    pub async fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::GatewayUnreachable(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let reason = response
                .json::<GatewayRejection>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(AuthError::AuthenticationFailed(reason));
        }

        let body: GatewayIdentity = response.json().await.map_err(|e| {
            AuthError::AuthenticationFailed(format!("malformed gateway response: {}", e))
        })?;
        let role: Role = body
            .role
            .parse()
            .map_err(|e: crate::identity::UnknownRole| {
                AuthError::AuthenticationFailed(e.to_string())
            })?;

        Ok(Identity::new(body.user_id, role))
    }
}

/// Resolves the identity for a single tool invocation.
#[derive(Debug, Clone, Default)]
pub struct AuthResolver {
    gateway: Option<AuthGateway>,
}

impl AuthResolver {
    /// A resolver with authentication disabled.
    pub fn disabled() -> Self {
        Self { gateway: None }
    }

    /// A resolver that validates tokens against `gateway`.
    pub fn with_gateway(gateway: AuthGateway) -> Self {
        Self {
            gateway: Some(gateway),
        }
    }

    /// Build from an optional gateway URL. A missing or blank URL disables auth.
    pub fn from_url(url: Option<&str>) -> Self {
        match url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => {
                let gateway = AuthGateway::new(url);
                tracing::info!("Validating tokens against {}", gateway.url());
                Self::with_gateway(gateway)
            }
            None => {
                tracing::warn!("AUTH_GATEWAY_URL is not set. Authentication is disabled.");
                Self::disabled()
            }
        }
    }

    /// Returns true if requests are validated against a gateway.
    pub fn is_enabled(&self) -> bool {
        self.gateway.is_some()
    }

    /// Resolve the caller.
    ///
    /// Returns `Ok(None)` for anonymous mode. A `supplied` identity is used as-is
    /// without contacting the gateway.
    pub async fn resolve(
        &self,
        supplied: Option<Identity>,
        authorization: Option<&str>,
    ) -> Result<Option<Identity>, AuthError> {
        if let Some(identity) = supplied {
            return Ok(Some(identity));
        }

        let Some(gateway) = &self.gateway else {
            return Ok(None);
        };

        let token = bearer_token(authorization.ok_or(AuthError::InvalidAuthHeader)?)?;
        match gateway.validate(token).await {
            Ok(identity) => {
                tracing::info!(
                    "Authenticated user {} with role {}",
                    identity.user_id,
                    identity.role
                );
                Ok(Some(identity))
            }
            Err(e) => {
                tracing::warn!("Authentication rejected: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc123"), Ok("abc123"));
        assert_eq!(bearer_token("Bearer "), Err(AuthError::InvalidAuthHeader));
        assert_eq!(bearer_token("Basic abc"), Err(AuthError::InvalidAuthHeader));
        assert_eq!(bearer_token("bearer abc"), Err(AuthError::InvalidAuthHeader));
        assert_eq!(bearer_token("abc"), Err(AuthError::InvalidAuthHeader));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            AuthError::AuthenticationFailed("Invalid token".into()).to_string(),
            "Authentication failed: Invalid token"
        );
        assert!(
            AuthError::InvalidAuthHeader
                .to_string()
                .contains("Bearer <token>")
        );
    }

    #[test]
    fn test_from_url_blank_disables() {
        assert!(!AuthResolver::from_url(None).is_enabled());
        assert!(!AuthResolver::from_url(Some("  ")).is_enabled());
        assert!(AuthResolver::from_url(Some("http://gw/validate")).is_enabled());
    }

    #[test]
    fn test_from_url_trims_gateway_url() {
        let resolver = AuthResolver::from_url(Some("  http://gw/validate\n"));
        let gateway = resolver.gateway.as_ref().unwrap();
        assert_eq!(gateway.url(), "http://gw/validate");
    }

    #[tokio::test]
    async fn test_disabled_resolves_anonymous() {
        let resolver = AuthResolver::disabled();
        assert_eq!(resolver.resolve(None, None).await, Ok(None));
        // Headers are ignored entirely without a gateway.
        assert_eq!(resolver.resolve(None, Some("garbage")).await, Ok(None));
    }

    #[tokio::test]
    async fn test_supplied_identity_skips_gateway() {
        // Unroutable gateway: any network call would fail.
        let resolver = AuthResolver::with_gateway(AuthGateway::new("http://127.0.0.1:1/validate"));
        let id = Identity::new("user-1", Role::Agent);
        let resolved = resolver.resolve(Some(id.clone()), None).await.unwrap();
        assert_eq!(resolved, Some(id));
    }

    #[tokio::test]
    async fn test_missing_header_rejected_when_enabled() {
        let resolver = AuthResolver::with_gateway(AuthGateway::new("http://127.0.0.1:1/validate"));
        assert_eq!(
            resolver.resolve(None, None).await,
            Err(AuthError::InvalidAuthHeader)
        );
        assert_eq!(
            resolver.resolve(None, Some("Token abc")).await,
            Err(AuthError::InvalidAuthHeader)
        );
    }
}
