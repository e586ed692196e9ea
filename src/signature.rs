//! OAuth1 HMAC-SHA1 signatures.
//!
//! Two different signatures are computed here:
//!
//! - [`TokenRequest`] signs the two-legged token request exactly the way the token
//!   endpoint verifies it. This is *not* standard OAuth1: parameters are signed in
//!   insertion order rather than sorted, values are form-encoded (`+` for spaces)
//!   before being percent-encoded again, and the consumer secret travels as the
//!   plaintext parameter `oauth_consumer_secret`. All three quirks must be kept
//!   bit-for-bit or the server rejects the signature.
//! - [`authorization_header`] produces a standard RFC 5849 `Authorization` header for
//!   API requests signed with an issued token.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use rand::distr::Alphanumeric;
use rand::Rng;
use reqwest::Method;
use sha1::Sha1;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

/// Upper bound (inclusive) of the numeric nonce sent with token requests.
pub const TOKEN_NONCE_MAX: u32 = 100_000_000;

/// RFC 3986 percent-encoding: everything but `A-Z a-z 0-9 - . _ ~` is escaped.
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Form-style encoding where spaces become `+` and everything else follows
/// [`percent_encode`].
///
/// # Example
/// ```rust
/// use gander::signature;
///
/// assert_eq!(signature::quote_plus("a b/c&d"), "a+b%2Fc%26d");
/// ```
pub fn quote_plus(value: &str) -> String {
    percent_encode(value).replace("%20", "+")
}

/// Encode `key=value` pairs joined with `&`, keeping the given order.
pub fn form_encode<K: AsRef<str>, V: AsRef<str>>(parameters: &[(K, V)]) -> String {
    parameters
        .iter()
        .map(|(k, v)| format!("{}={}", quote_plus(k.as_ref()), quote_plus(v.as_ref())))
        .collect::<Vec<String>>()
        .join("&")
}

/// Base64 encoded HMAC-SHA1 of `message` under `key`.
pub fn hmac_sha1_base64(key: &str, message: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// A fresh numeric nonce for token requests.
pub fn token_nonce() -> u32 {
    rand::rng().random_range(0..=TOKEN_NONCE_MAX)
}

/// A fresh alphanumeric nonce for signed API requests.
pub fn request_nonce() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Current Unix timestamp in seconds.
pub fn timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Everything needed to sign a token request for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRequest {
    /// Host used in the signed URL; the port is never part of it.
    pub host: String,
    pub client_mnemonic: String,
    pub authority: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    /// The session's identity assertion, sent as `x_auth_assertion`.
    pub identity_assertion: String,
    pub nonce: u32,
    pub timestamp: i64,
}
impl TokenRequest {
    /// Path of the token endpoint, `/oauth/<client mnemonic>/<authority>/tokens`.
    pub fn path(&self) -> String {
        format!("/oauth/{}/{}/tokens", self.client_mnemonic, self.authority)
    }

    /// The absolute URL covered by the signature, always `https`.
    pub fn url(&self) -> String {
        format!("https://{}{}", self.host, self.path())
    }

    /// The unsigned parameters, in the order the server expects them.
    pub fn parameters(&self) -> Vec<(&'static str, String)> {
        vec![
            ("oauth_consumer_key", self.consumer_key.clone()),
            ("oauth_consumer_secret", self.consumer_secret.clone()),
            ("oauth_nonce", self.nonce.to_string()),
            ("oauth_signature_method", "HMAC-SHA1".to_string()),
            ("oauth_timestamp", self.timestamp.to_string()),
            ("oauth_version", "1.0".to_string()),
            ("x_auth_assertion", self.identity_assertion.clone()),
        ]
    }

    /// `POST&<encoded url>&<encoded form parameters>`.
    pub fn signature_base_string(&self) -> String {
        format!(
            "POST&{}&{}",
            quote_plus(&self.url()),
            quote_plus(&form_encode(&self.parameters()))
        )
    }

    /// The encoded consumer secret followed by `&`: there is no token secret yet.
    pub fn signing_key(&self) -> String {
        format!("{}&", quote_plus(&self.consumer_secret))
    }

    pub fn signature(&self) -> String {
        hmac_sha1_base64(&self.signing_key(), &self.signature_base_string())
    }

    /// The form-encoded POST body: every parameter plus `oauth_signature`.
    pub fn form_body(&self) -> String {
        let mut parameters = self.parameters();
        parameters.push(("oauth_signature", self.signature()));
        form_encode(&parameters)
    }
}

/// Credentials used to sign API requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

/// Lowercased scheme and host, non-default port kept, no query or fragment.
fn base_string_uri(url: &Url) -> String {
    let scheme = url.scheme().to_ascii_lowercase();
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let port = match (scheme.as_str(), url.port()) {
        ("http", Some(80)) | ("https", Some(443)) | (_, None) => String::new(),
        (_, Some(port)) => format!(":{}", port),
    };
    format!("{}://{}{}{}", scheme, host, port, url.path())
}

/// Compute a standard OAuth1 HMAC-SHA1 signature for `method url`.
///
/// Query parameters are signed together with the protocol parameters, all sorted by
/// encoded name then encoded value.
pub fn request_signature(
    method: &Method,
    url: &Url,
    credentials: &Credentials,
    nonce: &str,
    timestamp: i64,
) -> String {
    let mut parameters: Vec<(String, String)> = oauth_parameters(credentials, nonce, timestamp)
        .into_iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(&v)))
        .collect();
    for (k, v) in url.query_pairs() {
        parameters.push((percent_encode(&k), percent_encode(&v)));
    }
    parameters.sort();
    let normalized = parameters
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<String>>()
        .join("&");

    let base_string = format!(
        "{}&{}&{}",
        method.as_str().to_ascii_uppercase(),
        percent_encode(&base_string_uri(url)),
        percent_encode(&normalized)
    );
    let key = format!(
        "{}&{}",
        percent_encode(&credentials.consumer_secret),
        percent_encode(&credentials.token_secret)
    );
    trace!("signature base string: {}", base_string);
    hmac_sha1_base64(&key, &base_string)
}

fn oauth_parameters(
    credentials: &Credentials,
    nonce: &str,
    timestamp: i64,
) -> Vec<(&'static str, String)> {
    vec![
        ("oauth_consumer_key", credentials.consumer_key.clone()),
        ("oauth_nonce", nonce.to_string()),
        ("oauth_signature_method", "HMAC-SHA1".to_string()),
        ("oauth_timestamp", timestamp.to_string()),
        ("oauth_token", credentials.token.clone()),
        ("oauth_version", "1.0".to_string()),
    ]
}

/// Build the `Authorization: OAuth ...` header value for an API request.
pub fn authorization_header(
    method: &Method,
    url: &Url,
    credentials: &Credentials,
    nonce: &str,
    timestamp: i64,
) -> String {
    let signature = request_signature(method, url, credentials, nonce, timestamp);
    let mut parameters = oauth_parameters(credentials, nonce, timestamp);
    parameters.push(("oauth_signature", signature));
    let fields = parameters
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, percent_encode(v)))
        .collect::<Vec<String>>()
        .join(", ");
    format!("OAuth {}", fields)
}
