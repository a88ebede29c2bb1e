//! Auth resolution against a fake gateway served on an ephemeral port.

#![allow(clippy::unwrap_used)] // unwrap is acceptable in tests

use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::post;
use serde_json::{Value, json};

use gcs_tools::{AuthError, AuthGateway, AuthResolver, Identity, Role};

async fn validate(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let auth = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    match auth {
        Some("Bearer TEST_TOKEN_ADMIN") => (
            StatusCode::OK,
            Json(json!({"user_id": "user-123-admin", "role": "agent-admin"})),
        ),
        Some("Bearer TEST_TOKEN_USER") => (
            StatusCode::OK,
            Json(json!({"user_id": "user-456-basic", "role": "agent"})),
        ),
        Some("Bearer TEST_TOKEN_ODD_ROLE") => (
            StatusCode::OK,
            Json(json!({"user_id": "user-789", "role": "superuser"})),
        ),
        Some("Bearer TEST_TOKEN_NO_BODY") => (StatusCode::OK, Json(json!({"hello": "world"}))),
        Some("Bearer TEST_TOKEN_EXPIRED") => (StatusCode::FORBIDDEN, Json(json!({}))),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid token"})),
        ),
    }
}

/// Serve the fake gateway and return its validation URL.
async fn spawn_gateway() -> String {
    let app = Router::new().route("/validate-token", post(validate));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/validate-token", addr)
}

async fn resolver() -> AuthResolver {
    AuthResolver::with_gateway(AuthGateway::new(spawn_gateway().await))
}

#[tokio::test]
async fn test_admin_token_resolves() {
    let resolver = resolver().await;
    let identity = resolver
        .resolve(None, Some("Bearer TEST_TOKEN_ADMIN"))
        .await
        .unwrap();
    assert_eq!(
        identity,
        Some(Identity::new("user-123-admin", Role::AgentAdmin))
    );
}

#[tokio::test]
async fn test_user_token_resolves() {
    let resolver = resolver().await;
    let identity = resolver
        .resolve(None, Some("Bearer TEST_TOKEN_USER"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(identity.user_id, "user-456-basic");
    assert!(!identity.is_admin());
}

#[tokio::test]
async fn test_rejected_token_carries_gateway_reason() {
    let resolver = resolver().await;
    let err = resolver
        .resolve(None, Some("Bearer nope"))
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::AuthenticationFailed("Invalid token".into()));
    assert_eq!(err.to_string(), "Authentication failed: Invalid token");
}

#[tokio::test]
async fn test_rejection_without_reason() {
    let resolver = resolver().await;
    let err = resolver
        .resolve(None, Some("Bearer TEST_TOKEN_EXPIRED"))
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::AuthenticationFailed("Unknown error".into()));
}

#[tokio::test]
async fn test_unknown_role_fails_authentication() {
    let resolver = resolver().await;
    let err = resolver
        .resolve(None, Some("Bearer TEST_TOKEN_ODD_ROLE"))
        .await
        .unwrap_err();
    assert!(
        matches!(&err, AuthError::AuthenticationFailed(reason) if reason.contains("superuser")),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn test_malformed_success_body_fails_authentication() {
    let resolver = resolver().await;
    let err = resolver
        .resolve(None, Some("Bearer TEST_TOKEN_NO_BODY"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn test_unreachable_gateway() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let resolver =
        AuthResolver::with_gateway(AuthGateway::new(format!("http://{}/validate-token", addr)));
    let err = resolver
        .resolve(None, Some("Bearer TEST_TOKEN_USER"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::GatewayUnreachable(_)), "{:?}", err);
}
