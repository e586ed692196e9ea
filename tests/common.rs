// Not all functions are used by all tests, so we enable allow(dead_code) to avoid
// compiler warnings during testing.
#![allow(dead_code)]

use httpmock::Method::POST;
use httpmock::{Mock, MockServer};
use serde_json::json;

use gander::config::{AuthVersion, OAuthConfig};
use gander::session::{Session, SessionCache};

pub const LOGIN_PATH: &str = "/session/v1/login";
pub const TOKEN_PATH: &str = "/oauth/client/authority/tokens";
pub const LEGACY_PATH: &str = "/legacy/login";
pub const DOMAIN: &str = "test";
pub const USERNAME: &str = "alice";

/// Mocked handshake endpoints.
pub struct OAuthMocks<'a> {
    pub login: Mock<'a>,
    pub token: Mock<'a>,
}

/// The session every mocked login returns.
pub fn session() -> Session {
    serde_json::from_value(json!({
        "identityStatement": "assertion+value==",
        "clientMnemonic": "client",
        "authority": "authority",
        "username": USERNAME
    }))
    .expect("failed to build session")
}

/// The following options are configured by default:
///  Host/Port: the mock server, over plain HTTP
///  URL: LOGIN_PATH
///  Version: 2
pub fn build_config(server: &MockServer) -> OAuthConfig {
    OAuthConfig {
        host: server.host(),
        port: server.port(),
        login_path: LOGIN_PATH.to_string(),
        use_http: true,
        concept: "demo".to_string(),
        username: USERNAME.to_string(),
        password: "secret".to_string(),
        version: AuthVersion::V2,
        consumer_key: "consumer-key".to_string(),
        consumer_secret: "consumer secret/&".to_string(),
        domain: DOMAIN.to_string(),
    }
}

/// A version 1 configuration logging in against LEGACY_PATH.
pub fn build_legacy_config(server: &MockServer) -> OAuthConfig {
    OAuthConfig {
        login_path: LEGACY_PATH.to_string(),
        version: AuthVersion::V1,
        ..build_config(server)
    }
}

/// Mock the login and token endpoints. Expiries are in seconds; 0 expires at once.
pub async fn mock_oauth(
    server: &MockServer,
    session_expires_in: u64,
    token_expires_in: u64,
) -> OAuthMocks<'_> {
    let login = server
        .mock_async(|when, then| {
            when.method(POST).path(LOGIN_PATH);
            then.status(200)
                .json_body(json!({ "session": serde_json::to_value(session()).unwrap() }));
        })
        .await;
    let token = server
        .mock_async(|when, then| {
            when.method(POST).path(TOKEN_PATH);
            then.status(200).json_body(json!({
                "response": {
                    "oauth_parameter": {
                        "oauth_token": "token",
                        "oauth_token_secret": "token-secret",
                        "oauth_authorization_expires_in": session_expires_in,
                        "oauth_expires_in": token_expires_in
                    }
                }
            }));
        })
        .await;
    OAuthMocks { login, token }
}

/// Mock the legacy (version 1) login endpoint.
pub async fn mock_legacy(server: &MockServer) -> Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST).path(LEGACY_PATH);
            then.status(200).json_body(json!({
                "consumerKey": "consumer-key",
                "consumerSecret": "consumer-secret",
                "token": "token",
                "tokenSecret": "token-secret"
            }));
        })
        .await
}

/// A session cache in a fresh temporary directory, removed when the guard drops.
pub fn build_cache() -> (tempfile::TempDir, SessionCache) {
    let directory = tempfile::tempdir().expect("failed to create temporary directory");
    let cache = SessionCache::new(directory.path());
    (directory, cache)
}
