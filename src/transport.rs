//! Single-shot HTTP requests for the OAuth handshake.
//!
//! The login and token endpoints are addressed by host, port and path rather than
//! by URL. Two flavors exist: cleartext HTTP, and TLS with certificate verification
//! disabled. The latter is deliberately insecure and only meant for internal test
//! environments with self-signed certificates.
//!
//! No retry happens at this layer: connection failures are returned to the caller
//! as [`GanderError::Reqwest`](../enum.GanderError.html#variant.Reqwest).

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;

use crate::GanderError;

/// Which scheme the handshake transport speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Cleartext `http://`.
    Plain,
    /// `https://` without certificate verification.
    InsecureTls,
}

/// A response as seen by Gander: status code, headers and the body as text.
#[derive(Debug, Clone)]
pub struct GanderResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}
impl GanderResponse {
    /// Read a `reqwest` response to completion.
    pub async fn from_reqwest(response: reqwest::Response) -> Result<Self, GanderError> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;
        Ok(GanderResponse {
            status,
            headers,
            body,
        })
    }

    /// True for 2xx status codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, GanderError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Issues handshake requests over one of the two [`TransportKind`]s.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    kind: TransportKind,
    client: Client,
}
impl HttpTransport {
    /// Build a transport, cleartext when `use_http` is set, TLS otherwise.
    pub fn new(use_http: bool) -> Result<Self, GanderError> {
        if use_http {
            HttpTransport::plain()
        } else {
            HttpTransport::insecure_tls()
        }
    }

    /// Cleartext HTTP transport.
    pub fn plain() -> Result<Self, GanderError> {
        Ok(HttpTransport {
            kind: TransportKind::Plain,
            client: Client::builder().build()?,
        })
    }

    /// TLS transport that accepts any certificate.
    pub fn insecure_tls() -> Result<Self, GanderError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(HttpTransport {
            kind: TransportKind::InsecureTls,
            client,
        })
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// The absolute URL a request for `path` on `host:port` is sent to.
    pub fn url(&self, host: &str, port: u16, path: &str) -> String {
        let scheme = match self.kind {
            TransportKind::Plain => "http",
            TransportKind::InsecureTls => "https",
        };
        format!("{}://{}:{}{}", scheme, host, port, path)
    }

    /// Send a single request and read the whole response.
    pub async fn send(
        &self,
        host: &str,
        port: u16,
        headers: &[(&str, &str)],
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<GanderResponse, GanderError> {
        let url = self.url(host, port, path);
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                GanderError::InvalidOption {
                    option: "header".to_string(),
                    value: name.to_string(),
                    detail: e.to_string(),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| GanderError::InvalidOption {
                option: name.to_string(),
                value: value.to_string(),
                detail: e.to_string(),
            })?;
            header_map.insert(name, value);
        }

        debug!("{} {}", method, url);
        let mut request_builder = self.client.request(method, &url).headers(header_map);
        if let Some(body) = body {
            request_builder = request_builder.body(body);
        }
        let response = request_builder.send().await?;
        let response = GanderResponse::from_reqwest(response).await?;
        debug!("{}: status_code {}", url, response.status);
        Ok(response)
    }
}
