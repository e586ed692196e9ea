//! # Gander
//!
//! Gander exercises REST APIs that sit behind a two-legged OAuth1 handshake: a
//! username/password login produces a session, the session's identity assertion is
//! exchanged for an OAuth1 token, and the token signs every API request.
//!
//! Two tools are built on top of the library:
//!
//! - `rest_test` runs a list of named test cases once each and prints a summary table.
//! - `load_test` runs a templated multi-step scenario for every configured test-data
//!   record in parallel, folding values extracted from each response back into the
//!   variables used by later steps.
//!
//! ## Credential lifecycle
//!
//! [`OAuthClient`](./oauth/struct.OAuthClient.html) owns the session and the token
//! derived from it, each with its own expiry instant. Before every authorized request
//! it refreshes whatever has expired: an expired session is re-acquired over the
//! network and always invalidates the token, an expired token is re-acquired against
//! the current session. Sessions are cached on disk per domain and username so
//! repeated runs don't log in again.
//!
//! ```rust,no_run
//! use gander::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), GanderError> {
//!     let config = OAuthConfig::from_file("config.conf")?;
//!     let cache = SessionCache::new(".");
//!     let mut client = OAuthClient::connect(config, cache).await?;
//!
//!     let response = client
//!         .authorized_request("https://api.example.com/v1/patients/12", None, None)
//!         .await?;
//!     println!("{}: {}", response.status, response.body);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Scenarios
//!
//! A load test plan is a JSON document:
//!
//! ```json
//! {
//!   "TestIteration": 2,
//!   "TestData": [{"name": "alice", "patient": "12"}],
//!   "Scenario": [
//!     {
//!       "name": "create",
//!       "url": "https://api.example.com/v1/patients/{{patient}}/notes",
//!       "method": "POST",
//!       "data": {"text": "hello from {{name}}"},
//!       "variables": {"noteId": {"type": "terminal", "key": "id"}},
//!       "delayToNext": 1
//!     },
//!     {
//!       "name": "read",
//!       "url": "https://api.example.com/v1/notes/{{noteId}}",
//!       "method": "GET"
//!     }
//!   ]
//! }
//! ```
//!
//! Every `{{name}}` placeholder is rendered from the worker's current variables right
//! before the step runs, so the second step above reads the note created by the first.
//!
//! ## License
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! you may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//! <http://www.apache.org/licenses/LICENSE-2.0>
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

#[macro_use]
extern crate log;

pub mod config;
pub mod extract;
pub mod oauth;
pub mod prelude;
pub mod scenario;
pub mod session;
pub mod signature;
pub mod template;
pub mod transport;
pub mod util;

use std::{fmt, io};

pub use crate::config::{GanderConfiguration, OAuthConfig};

/// An enumeration of all errors Gander can return.
#[derive(Debug)]
pub enum GanderError {
    /// Wraps a [`std::io::Error`](https://doc.rust-lang.org/std/io/struct.Error.html).
    Io(io::Error),
    /// Wraps a [`reqwest::Error`](https://docs.rs/reqwest/*/reqwest/struct.Error.html).
    Reqwest(reqwest::Error),
    /// Wraps a [`serde_json::Error`](https://docs.rs/serde_json/*/serde_json/struct.Error.html).
    Json(serde_json::Error),
    /// Wraps an [`ini::Error`](https://docs.rs/rust-ini/*/ini/enum.Error.html).
    Ini(ini::Error),
    /// Wraps a [`minijinja::Error`](https://docs.rs/minijinja/*/minijinja/struct.Error.html).
    Template(minijinja::Error),
    /// Wraps a [`tokio::task::JoinError`](https://docs.rs/tokio/*/tokio/task/struct.JoinError.html).
    TokioJoin(tokio::task::JoinError),
    /// Invalid option or value specified, may only be invalid in context.
    InvalidOption {
        /// The invalid option that caused this error.
        option: String,
        /// The invalid value that caused this error.
        value: String,
        /// An optional explanation of the error.
        detail: String,
    },
    /// A test case or load test plan file was rejected while loading.
    InvalidTestPlan {
        /// An optional explanation of the error.
        detail: String,
    },
    /// Only `GET`, `POST`, `PUT` and `DELETE` can be dispatched.
    UnsupportedMethod {
        /// The method that was requested.
        method: String,
    },
    /// The login or token endpoint refused the handshake.
    Authentication {
        /// Which leg of the handshake failed: `session`, `token` or `legacy`.
        stage: String,
        /// The HTTP status code returned, if any.
        status: Option<u16>,
        /// An optional explanation of the error.
        detail: String,
    },
    /// A variable could not be pulled out of a response body.
    Extraction {
        /// The variable being extracted.
        variable: String,
        /// The path walked so far, for example `items[0].id`.
        path: String,
        /// An optional explanation of the error.
        detail: String,
    },
}
/// Implement a helper to provide a text description of all possible types of errors.
impl GanderError {
    fn describe(&self) -> &str {
        match *self {
            GanderError::Io(_) => "io::Error",
            GanderError::Reqwest(_) => "reqwest::Error",
            GanderError::Json(_) => "serde_json::Error",
            GanderError::Ini(_) => "ini::Error",
            GanderError::Template(_) => "minijinja::Error",
            GanderError::TokioJoin(_) => "tokio::task::JoinError",
            GanderError::InvalidOption { .. } => "invalid option or value specified",
            GanderError::InvalidTestPlan { .. } => "invalid test plan",
            GanderError::UnsupportedMethod { .. } => "unsupported HTTP request method",
            GanderError::Authentication { .. } => "authentication failed",
            GanderError::Extraction { .. } => "variable extraction failed",
        }
    }
}

/// Implement format trait to allow displaying errors.
impl fmt::Display for GanderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            GanderError::Io(ref source) => write!(f, "GanderError: {} ({})", self.describe(), source),
            GanderError::Reqwest(ref source) => {
                write!(f, "GanderError: {} ({})", self.describe(), source)
            }
            GanderError::Json(ref source) => {
                write!(f, "GanderError: {} ({})", self.describe(), source)
            }
            GanderError::Ini(ref source) => {
                write!(f, "GanderError: {} ({})", self.describe(), source)
            }
            GanderError::Template(ref source) => {
                write!(f, "GanderError: {} ({})", self.describe(), source)
            }
            GanderError::TokioJoin(ref source) => {
                write!(f, "GanderError: {} ({})", self.describe(), source)
            }
            GanderError::InvalidOption {
                ref option,
                ref value,
                ref detail,
            } => write!(
                f,
                "GanderError: {} ({} = {:?}): {}",
                self.describe(),
                option,
                value,
                detail
            ),
            GanderError::InvalidTestPlan { ref detail } => {
                write!(f, "GanderError: {}: {}", self.describe(), detail)
            }
            GanderError::UnsupportedMethod { ref method } => {
                write!(f, "GanderError: {} ({})", self.describe(), method)
            }
            GanderError::Authentication {
                ref stage,
                status,
                ref detail,
            } => match status {
                Some(code) => write!(
                    f,
                    "GanderError: {} during {} (status {}): {}",
                    self.describe(),
                    stage,
                    code,
                    detail
                ),
                None => write!(
                    f,
                    "GanderError: {} during {}: {}",
                    self.describe(),
                    stage,
                    detail
                ),
            },
            GanderError::Extraction {
                ref variable,
                ref path,
                ref detail,
            } => write!(
                f,
                "GanderError: {} for `{}` at `{}`: {}",
                self.describe(),
                variable,
                path,
                detail
            ),
        }
    }
}

// Define the lower level source of this error, if any.
impl std::error::Error for GanderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            GanderError::Io(ref source) => Some(source),
            GanderError::Reqwest(ref source) => Some(source),
            GanderError::Json(ref source) => Some(source),
            GanderError::Ini(ref source) => Some(source),
            GanderError::Template(ref source) => Some(source),
            GanderError::TokioJoin(ref source) => Some(source),
            _ => None,
        }
    }
}

/// Auto-convert Reqwest errors.
impl From<reqwest::Error> for GanderError {
    fn from(err: reqwest::Error) -> GanderError {
        GanderError::Reqwest(err)
    }
}

/// Auto-convert IO errors.
impl From<io::Error> for GanderError {
    fn from(err: io::Error) -> GanderError {
        GanderError::Io(err)
    }
}

/// Auto-convert JSON errors.
impl From<serde_json::Error> for GanderError {
    fn from(err: serde_json::Error) -> GanderError {
        GanderError::Json(err)
    }
}

/// Auto-convert INI errors.
impl From<ini::Error> for GanderError {
    fn from(err: ini::Error) -> GanderError {
        GanderError::Ini(err)
    }
}

/// Auto-convert template errors.
impl From<minijinja::Error> for GanderError {
    fn from(err: minijinja::Error) -> GanderError {
        GanderError::Template(err)
    }
}

/// Auto-convert TokioJoin errors.
impl From<tokio::task::JoinError> for GanderError {
    fn from(err: tokio::task::JoinError) -> GanderError {
        GanderError::TokioJoin(err)
    }
}
