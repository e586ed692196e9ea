//! Session login, token acquisition and the on-disk session cache.
//!
//! A [`Session`] comes from a username/password login and carries the identity
//! assertion that is exchanged for a [`Token`]. Sessions are cached in
//! `oauth_session_<domain>_<username>.json`, a plain JSON dump of the session. The
//! file is not encrypted: treat it as a local secret.

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::config::OAuthConfig;
use crate::signature::{self, Credentials, TokenRequest};
use crate::transport::{GanderResponse, HttpTransport};
use crate::util;
use crate::GanderError;

/// Headers sent with both handshake requests.
const HANDSHAKE_HEADERS: [(&str, &str); 2] = [
    ("Accept", "application/json"),
    ("Content-Type", "application/x-www-form-urlencoded"),
];

/// Server-issued identity record returned by the login call.
///
/// Fields other than the three Gander needs are kept verbatim so a cached session
/// round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Identity assertion exchanged for a token, sent as `x_auth_assertion`.
    pub identity_statement: String,
    pub client_mnemonic: String,
    pub authority: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    session: Session,
}

/// The `oauth_parameter` object returned by the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPayload {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    /// How long the session behind this token stays authorized.
    #[serde(deserialize_with = "util::deserialize_seconds")]
    pub oauth_authorization_expires_in: Duration,
    /// How long the token itself stays valid.
    #[serde(deserialize_with = "util::deserialize_seconds")]
    pub oauth_expires_in: Duration,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    response: TokenResponseBody,
}

#[derive(Debug, Deserialize)]
struct TokenResponseBody {
    oauth_parameter: TokenPayload,
}

/// An issued OAuth1 token and the two expiry instants that came with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token: String,
    pub token_secret: String,
    pub session_expires_at: DateTime<Utc>,
    pub token_expires_at: DateTime<Utc>,
}
impl Token {
    /// Turn relative expiries into instants counted from `now`.
    ///
    /// An expiry too far in the future to represent is rejected.
    pub fn from_payload(payload: TokenPayload, now: DateTime<Utc>) -> Result<Token, GanderError> {
        let expires_at = |name: &str, delta: Duration| {
            now.checked_add_signed(delta)
                .ok_or_else(|| GanderError::Authentication {
                    stage: "token".to_string(),
                    status: None,
                    detail: format!("`{}` is out of range: {}", name, delta),
                })
        };
        Ok(Token {
            session_expires_at: expires_at(
                "oauth_authorization_expires_in",
                payload.oauth_authorization_expires_in,
            )?,
            token_expires_at: expires_at("oauth_expires_in", payload.oauth_expires_in)?,
            token: payload.oauth_token,
            token_secret: payload.oauth_token_secret,
        })
    }
}

/// Credentials returned in one piece by the legacy (version 1) login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyLoginResponse {
    consumer_key: String,
    consumer_secret: String,
    token: String,
    token_secret: String,
}

// Non-2xx replies are reported with their status; the body is kept for context.
fn check_status(stage: &str, response: &GanderResponse) -> Result<(), GanderError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(GanderError::Authentication {
            stage: stage.to_string(),
            status: Some(response.status),
            detail: util::cut_msg(&response.body, 200),
        })
    }
}

/// Log in with username and password, returning the `session` object of the reply.
pub async fn login(
    transport: &HttpTransport,
    host: &str,
    port: u16,
    path: &str,
    username: &str,
    password: &str,
) -> Result<Session, GanderError> {
    let body = signature::form_encode(&[
        ("username", username),
        ("password", password),
        ("login_method", "PASSWORD"),
    ]);
    info!("requesting session for {} from {}", username, host);
    let response = transport
        .send(host, port, &HANDSHAKE_HEADERS, Method::POST, path, Some(body))
        .await?;
    check_status("session", &response)?;
    let login: LoginResponse = response.json()?;
    Ok(login.session)
}

/// Exchange a session's identity assertion for a token.
pub async fn acquire_token(
    transport: &HttpTransport,
    port: u16,
    request: &TokenRequest,
) -> Result<TokenPayload, GanderError> {
    debug!(
        "requesting token from {}{} (nonce {}, timestamp {})",
        request.host,
        request.path(),
        request.nonce,
        request.timestamp
    );
    let response = transport
        .send(
            &request.host,
            port,
            &HANDSHAKE_HEADERS,
            Method::POST,
            &request.path(),
            Some(request.form_body()),
        )
        .await?;
    check_status("token", &response)?;
    let token: TokenResponse = response.json()?;
    Ok(token.response.oauth_parameter)
}

/// Build a token request for `session` with a fresh nonce and timestamp.
pub fn token_request(config: &OAuthConfig, session: &Session) -> TokenRequest {
    TokenRequest {
        host: config.host.clone(),
        client_mnemonic: session.client_mnemonic.clone(),
        authority: session.authority.clone(),
        consumer_key: config.consumer_key.clone(),
        consumer_secret: config.consumer_secret.clone(),
        identity_assertion: session.identity_statement.clone(),
        nonce: signature::token_nonce(),
        timestamp: signature::timestamp(),
    }
}

/// Legacy (version 1) login: a single call returns the complete credential set.
pub async fn legacy_login(
    transport: &HttpTransport,
    config: &OAuthConfig,
) -> Result<Credentials, GanderError> {
    let body = signature::form_encode(&[
        ("concept", config.concept.as_str()),
        ("username", config.username.as_str()),
        ("password", config.password.as_str()),
    ]);
    debug!("requesting legacy credentials for {}", config.username);
    let response = transport
        .send(
            &config.host,
            config.port,
            &HANDSHAKE_HEADERS,
            Method::POST,
            &config.login_path,
            Some(body),
        )
        .await?;
    check_status("legacy", &response)?;
    let credentials: LegacyLoginResponse = response.json()?;
    Ok(Credentials {
        consumer_key: credentials.consumer_key,
        consumer_secret: credentials.consumer_secret,
        token: credentials.token,
        token_secret: credentials.token_secret,
    })
}

/// Sessions cached on disk, one file per domain and username.
#[derive(Debug, Clone)]
pub struct SessionCache {
    directory: PathBuf,
}
impl SessionCache {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        SessionCache {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    /// `<directory>/oauth_session_<domain>_<username>.json`
    pub fn path(&self, domain: &str, username: &str) -> PathBuf {
        self.directory
            .join(format!("oauth_session_{}_{}.json", domain, username))
    }

    /// Load a cached session. A missing, unreadable or malformed file is a miss.
    pub async fn load(&self, domain: &str, username: &str) -> Option<Session> {
        let path = self.path(domain, username);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("failed to read session cache {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str::<Session>(&contents) {
            Ok(session) => {
                info!("Session cache hit: {}", path.display());
                Some(session)
            }
            Err(e) => {
                warn!("ignoring malformed session cache {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Persist a session. The file is written to a temporary file in the cache
    /// directory and renamed into place, so concurrent writers never leave a torn
    /// file behind. The temporary file is removed on every error path.
    pub async fn store(
        &self,
        domain: &str,
        username: &str,
        session: &Session,
    ) -> Result<(), GanderError> {
        let path = self.path(domain, username);
        let contents = serde_json::to_vec(session)?;
        tokio::fs::create_dir_all(&self.directory).await?;
        let directory = self.directory.clone();
        let final_path = path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), std::io::Error> {
            let mut file = NamedTempFile::new_in(&directory)?;
            file.write_all(&contents)?;
            file.persist(&final_path)?;
            Ok(())
        })
        .await??;
        debug!("cached session in {}", path.display());
        Ok(())
    }
}
