//! The credential lifecycle manager.
//!
//! An [`OAuthClient`] moves through three states:
//!
//! - [`CredentialState::Uninitialized`]: nothing acquired yet.
//! - [`CredentialState::SessionOnly`]: a session is held (from the cache or a login)
//!   but no token has been derived from it.
//! - [`CredentialState::Authorized`]: a token is held, with both its own expiry and
//!   the expiry of the session that produced it.
//!
//! Every [`AuthorizedDispatch::authorized_request`] first refreshes what has expired. A
//! new session always discards the current token, so a token never outlives the
//! session it came from.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::config::{AuthVersion, OAuthConfig};
use crate::session::{self, Session, SessionCache, Token};
use crate::signature::{self, Credentials};
use crate::transport::{GanderResponse, HttpTransport};
use crate::GanderError;

/// The methods an authorized request can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
    Put,
    Delete,
}
impl RequestMethod {
    /// `POST` when a body is given, `GET` otherwise.
    pub fn default_for(body: Option<&Value>) -> RequestMethod {
        if body.is_some() {
            RequestMethod::Post
        } else {
            RequestMethod::Get
        }
    }

    pub fn as_method(&self) -> Method {
        match self {
            RequestMethod::Get => Method::GET,
            RequestMethod::Post => Method::POST,
            RequestMethod::Put => Method::PUT,
            RequestMethod::Delete => Method::DELETE,
        }
    }
}
impl FromStr for RequestMethod {
    type Err = GanderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(RequestMethod::Get),
            "POST" => Ok(RequestMethod::Post),
            "PUT" => Ok(RequestMethod::Put),
            "DELETE" => Ok(RequestMethod::Delete),
            _ => Err(GanderError::UnsupportedMethod {
                method: s.to_string(),
            }),
        }
    }
}
impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_method())
    }
}

/// Anything that can dispatch an OAuth-signed request.
///
/// [`OAuthClient`] is the real implementation; the scenario runner only depends on
/// this trait.
#[async_trait]
pub trait AuthorizedDispatch: Send {
    /// Send `method url` with an optional JSON body. `method` defaults to `POST`
    /// with a body and `GET` without one; anything but `GET`, `POST`, `PUT` and
    /// `DELETE` fails before a request is made.
    async fn authorized_request(
        &mut self,
        url: &str,
        method: Option<&str>,
        body: Option<&Value>,
    ) -> Result<GanderResponse, GanderError>;
}

/// Where the client is in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    Uninitialized,
    SessionOnly,
    Authorized,
}

/// Unset and reached expiry instants both count as expired.
fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expires_at {
        Some(instant) => instant <= now,
        None => true,
    }
}

/// Owns one session and the token derived from it.
#[derive(Debug)]
pub struct OAuthClient {
    config: OAuthConfig,
    transport: HttpTransport,
    api: Client,
    cache: SessionCache,
    session: Option<Session>,
    token: Option<Token>,
    session_expires_at: Option<DateTime<Utc>>,
    token_expires_at: Option<DateTime<Utc>>,
    session_acquisitions: usize,
    token_acquisitions: usize,
}
impl OAuthClient {
    /// Build a client without touching the network.
    pub fn new(config: OAuthConfig, cache: SessionCache) -> Result<Self, GanderError> {
        let transport = HttpTransport::new(config.use_http)?;
        Ok(OAuthClient {
            config,
            transport,
            api: Client::builder().build()?,
            cache,
            session: None,
            token: None,
            session_expires_at: None,
            token_expires_at: None,
            session_acquisitions: 0,
            token_acquisitions: 0,
        })
    }

    /// Build a client and complete the handshake: load the cached session (or log
    /// in and cache the result), then acquire a token.
    pub async fn connect(config: OAuthConfig, cache: SessionCache) -> Result<Self, GanderError> {
        let mut client = OAuthClient::new(config, cache)?;
        if client.config.version == AuthVersion::V2 {
            client.initialize_session().await?;
            client.refresh_token().await?;
        }
        Ok(client)
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn state(&self) -> CredentialState {
        match (&self.session, &self.token) {
            (Some(_), Some(_)) => CredentialState::Authorized,
            (Some(_), None) => CredentialState::SessionOnly,
            _ => CredentialState::Uninitialized,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn session_expires_at(&self) -> Option<DateTime<Utc>> {
        self.session_expires_at
    }

    pub fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.token_expires_at
    }

    /// How many sessions were fetched over the network, cache hits excluded.
    pub fn session_acquisitions(&self) -> usize {
        self.session_acquisitions
    }

    pub fn token_acquisitions(&self) -> usize {
        self.token_acquisitions
    }

    // Startup: prefer the cached session.
    async fn initialize_session(&mut self) -> Result<(), GanderError> {
        match self
            .cache
            .load(&self.config.domain, &self.config.username)
            .await
        {
            Some(session) => {
                debug!("using cached session for {}", self.config.username);
                self.session = Some(session);
                self.token = None;
                Ok(())
            }
            None => self.refresh_session().await,
        }
    }

    /// Log in over the network, bypassing the cache, and persist the new session.
    /// The current token is discarded.
    pub async fn refresh_session(&mut self) -> Result<(), GanderError> {
        let session = session::login(
            &self.transport,
            &self.config.host,
            self.config.port,
            &self.config.login_path,
            &self.config.username,
            &self.config.password,
        )
        .await?;
        self.session_acquisitions += 1;
        if let Err(e) = self
            .cache
            .store(&self.config.domain, &self.config.username, &session)
            .await
        {
            warn!("failed to cache session: {}", e);
        }
        self.session = Some(session);
        // A token derived from the previous session is no longer valid.
        self.token = None;
        self.token_expires_at = None;
        Ok(())
    }

    /// Exchange the current session for a new token.
    pub async fn refresh_token(&mut self) -> Result<(), GanderError> {
        if self.session.is_none() {
            self.initialize_session().await?;
        }
        let session = match self.session.as_ref() {
            Some(session) => session,
            None => {
                return Err(GanderError::Authentication {
                    stage: "token".to_string(),
                    status: None,
                    detail: "no session to derive a token from".to_string(),
                })
            }
        };
        let request = session::token_request(&self.config, session);
        let payload = session::acquire_token(&self.transport, self.config.port, &request).await?;
        self.token_acquisitions += 1;
        let token = Token::from_payload(payload, Utc::now())?;
        debug!(
            "token valid until {}, session until {}",
            token.token_expires_at, token.session_expires_at
        );
        self.session_expires_at = Some(token.session_expires_at);
        self.token_expires_at = Some(token.token_expires_at);
        self.token = Some(token);
        Ok(())
    }

    /// Refresh whatever has expired, session first.
    pub async fn ensure_authorized(&mut self) -> Result<(), GanderError> {
        let now = Utc::now();
        if is_expired(self.session_expires_at, now) {
            info!("session expired, requesting a new one");
            self.refresh_session().await?;
        }
        if is_expired(self.token_expires_at, now) {
            info!("token expired, requesting a new one");
            self.refresh_token().await?;
        }
        Ok(())
    }

    // Credentials to sign the next request with, refreshing first as needed.
    async fn credentials(&mut self) -> Result<Credentials, GanderError> {
        match self.config.version {
            // The legacy handshake carries no expiry: re-acquire every time.
            AuthVersion::V1 => session::legacy_login(&self.transport, &self.config).await,
            AuthVersion::V2 => {
                self.ensure_authorized().await?;
                match self.token.as_ref() {
                    Some(token) => Ok(Credentials {
                        consumer_key: self.config.consumer_key.clone(),
                        consumer_secret: self.config.consumer_secret.clone(),
                        token: token.token.clone(),
                        token_secret: token.token_secret.clone(),
                    }),
                    None => Err(GanderError::Authentication {
                        stage: "token".to_string(),
                        status: None,
                        detail: "no token after refresh".to_string(),
                    }),
                }
            }
        }
    }

    /// Sign and send a request with the current token.
    pub async fn send(
        &mut self,
        url: &str,
        method: RequestMethod,
        body: Option<&Value>,
    ) -> Result<GanderResponse, GanderError> {
        let parsed = Url::parse(url).map_err(|e| GanderError::InvalidOption {
            option: "url".to_string(),
            value: url.to_string(),
            detail: e.to_string(),
        })?;
        let credentials = self.credentials().await?;
        let http_method = method.as_method();
        let authorization = signature::authorization_header(
            &http_method,
            &parsed,
            &credentials,
            &signature::request_nonce(),
            signature::timestamp(),
        );

        let mut request_builder = self
            .api
            .request(http_method, parsed)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, authorization);
        // A GET never carries a body.
        if let (Some(body), false) = (body, method == RequestMethod::Get) {
            request_builder = request_builder.body(serde_json::to_string(body)?);
        }
        debug!("{} {}", method, url);
        let response = request_builder.send().await?;
        GanderResponse::from_reqwest(response).await
    }
}

#[async_trait]
impl AuthorizedDispatch for OAuthClient {
    async fn authorized_request(
        &mut self,
        url: &str,
        method: Option<&str>,
        body: Option<&Value>,
    ) -> Result<GanderResponse, GanderError> {
        // Validate before any credential refresh or network traffic.
        let method = match method {
            Some(m) => RequestMethod::from_str(m)?,
            None => RequestMethod::default_for(body),
        };
        self.send(url, method, body).await
    }
}
