//! Client-credentials exchange against a local token endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use voxrelay_oauth::{
    ClientCredentials, ClientCredentialsExchanger, CredentialSource, OAuthConfig, OAuthError,
};

/// What the fake endpoint saw on its last request.
#[derive(Debug, Default, Clone)]
struct Seen {
    authorization: Option<String>,
    content_type: Option<String>,
    body: Option<String>,
}

#[derive(Clone)]
struct Endpoint {
    status: StatusCode,
    body: &'static str,
    seen: Arc<Mutex<Seen>>,
}

async fn token(
    State(endpoint): State<Endpoint>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    *endpoint.seen.lock().await = Seen {
        authorization: header("authorization"),
        content_type: header("content-type"),
        body: Some(body),
    };
    (endpoint.status, endpoint.body.to_string())
}

async fn start_endpoint(
    status: StatusCode,
    body: &'static str,
) -> Result<(SocketAddr, Arc<Mutex<Seen>>)> {
    let seen = Arc::new(Mutex::new(Seen::default()));
    let app = Router::new()
        .route("/oauth2-cc/token", post(token))
        .with_state(Endpoint {
            status,
            body,
            seen: seen.clone(),
        });

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok((addr, seen))
}

fn exchanger(addr: SocketAddr) -> ClientCredentialsExchanger {
    ClientCredentialsExchanger::new(
        OAuthConfig::with_token_url(format!("http://{}/oauth2-cc/token", addr)),
        ClientCredentials::new("key", "secret"),
    )
}

#[tokio::test]
async fn test_exchange_success_sends_basic_auth_and_form() -> Result<()> {
    let (addr, seen) =
        start_endpoint(StatusCode::OK, r#"{"access_token":"abc123","expires_in":1800}"#).await?;

    let credential = exchanger(addr).fetch().await?;
    assert_eq!(credential.access_token(), "abc123");
    assert_eq!(credential.expires_in, Some(1800));

    let seen = seen.lock().await.clone();
    assert_eq!(seen.authorization.as_deref(), Some("Basic a2V5OnNlY3JldA=="));
    assert_eq!(
        seen.content_type.as_deref(),
        Some("application/x-www-form-urlencoded")
    );
    assert_eq!(seen.body.as_deref(), Some("grant_type=client_credentials"));
    Ok(())
}

#[tokio::test]
async fn test_exchange_unauthorized() -> Result<()> {
    let (addr, _) =
        start_endpoint(StatusCode::UNAUTHORIZED, r#"{"error":"invalid_client"}"#).await?;

    let err = exchanger(addr).fetch().await.unwrap_err();
    assert_eq!(
        err,
        OAuthError::TokenRequestFailed {
            status: 401,
            status_text: "Unauthorized".to_string()
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_exchange_malformed_body() -> Result<()> {
    let (addr, _) = start_endpoint(StatusCode::OK, "<html>oops</html>").await?;

    let err = exchanger(addr).fetch().await.unwrap_err();
    assert!(matches!(err, OAuthError::TokenResponseInvalid(_)));
    Ok(())
}

#[tokio::test]
async fn test_exchange_missing_token() -> Result<()> {
    let (addr, _) = start_endpoint(StatusCode::OK, r#"{"token_type":"Bearer"}"#).await?;

    let err = exchanger(addr).fetch().await.unwrap_err();
    assert_eq!(err, OAuthError::TokenMissing);
    Ok(())
}
