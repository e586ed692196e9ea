//! Functions and structures related to configuring a Gander run.
//!
//! Run-time options are passed on the command line and parsed into
//! [`GanderConfiguration`]. OAuth connection details live in an INI file with a
//! single `[OAuth]` section, parsed into [`OAuthConfig`]:
//!
//! ```ini
//! [OAuth]
//! Host = auth.example.com
//! Port = 443
//! URL = /session/v1/login
//! UseHTTP = false
//! Concept = demo
//! UserName = alice
//! Password = secret
//! Version = 2
//! consumer_key = my-consumer-key
//! consumer_secret = my-consumer-secret
//! domain = demo
//! ```

use chrono::Local;
use gumdrop::Options;
use ini::Ini;
use simplelog::*;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::util;
use crate::GanderError;

/// The `[OAuth]` section name in the INI file.
const OAUTH_SECTION: &str = "OAuth";

/// Runtime options available when launching `rest_test` or `load_test`.
///
/// Gander leverages [`gumdrop`](https://docs.rs/gumdrop/) to derive help from the
/// below structure.
#[derive(Options, Debug, Clone, Default)]
#[options(
    help = r#"Gander runs REST API tests through a two-legged OAuth1 handshake.

The following runtime options are available:"#
)]
pub struct GanderConfiguration {
    /// Displays this help
    #[options(short = "h")]
    pub help: bool,
    /// Prints version information
    #[options(short = "V", help = "Prints version information\n")]
    pub version: bool,

    /// Sets the OAuth config file (default: config.conf)
    #[options(short = "c", meta = "FILE", default = "config.conf")]
    pub config_file: String,
    /// Sets the test case file (required)
    #[options(short = "t", meta = "FILE")]
    pub test_case: String,
    /// Prints test results in detail
    #[options(short = "d")]
    pub detail: bool,
    /// Decreases verbosity (-q, -qq, etc)
    #[options(count, short = "q")]
    pub quiet: u8,
    /// Increases verbosity (-v, -vv, etc)
    #[options(
        count,
        short = "v",
        help = "Increases verbosity (-v, -vv, etc)\n\nLogging and caching:"
    )]
    pub verbose: u8,

    /// Sets the directory for load test log files (default: logs)
    #[options(no_short, meta = "DIR", default = "logs")]
    pub log_dir: String,
    /// Doesn't write a load test log file
    #[options(no_short)]
    pub no_log_file: bool,
    /// Sets the directory for cached sessions (default: .)
    #[options(no_short, meta = "DIR", default = ".")]
    pub session_cache_dir: String,
    /// Disables colored output
    #[options(no_short)]
    pub no_color: bool,
}

impl GanderConfiguration {
    /// Confirm both the config file and the test case file were named.
    pub fn validate(&self) -> Result<(), GanderError> {
        if self.config_file.is_empty() {
            return Err(GanderError::InvalidOption {
                option: "--config-file".to_string(),
                value: self.config_file.clone(),
                detail: "No config file is provided.".to_string(),
            });
        }
        if self.test_case.is_empty() {
            return Err(GanderError::InvalidOption {
                option: "--test-case".to_string(),
                value: self.test_case.clone(),
                detail: "No test file is provided.".to_string(),
            });
        }
        Ok(())
    }

    /// Console log level derived from `--detail`, `-v` and `-q`.
    pub fn console_level(&self) -> LevelFilter {
        match self.verbose {
            0 if self.detail => LevelFilter::Debug,
            0 => match self.quiet {
                0 => LevelFilter::Info,
                _ => LevelFilter::Warn,
            },
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Path of the per-run load test log file, `<log_dir>/load_test_<user>_<timestamp>.log`.
    pub fn load_test_log_path(&self, username: &str) -> PathBuf {
        Path::new(&self.log_dir).join(format!(
            "load_test_{}_{}.log",
            username,
            Local::now().format("%Y%m%d-%H%M%S")
        ))
    }

    /// Initialize the Gander logger which writes to standard out and optionally to
    /// a log file. The log file always receives DEBUG and higher.
    pub fn initialize_logger(&self, log_file: Option<PathBuf>) -> Result<(), GanderError> {
        let console_level = self.console_level();

        if self.no_color {
            colored::control::set_override(false);
        }

        if let Some(log_to_file) = log_file {
            if let Some(parent) = log_to_file.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = std::fs::File::create(&log_to_file)?;
            match CombinedLogger::init(vec![
                SimpleLogger::new(console_level, Config::default()),
                WriteLogger::new(LevelFilter::Debug, Config::default(), file),
            ]) {
                Ok(_) => (),
                Err(e) => {
                    info!("failed to initialize CombinedLogger: {}", e);
                }
            }
            info!("Writing to log file: {}", log_to_file.display());
        } else {
            match CombinedLogger::init(vec![SimpleLogger::new(console_level, Config::default())]) {
                Ok(_) => (),
                Err(e) => {
                    info!("failed to initialize CombinedLogger: {}", e);
                }
            }
        }

        debug!("Output verbosity level: {}", console_level);
        Ok(())
    }
}

/// Which handshake the server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthVersion {
    /// One login call returns the complete consumer and token credential set.
    V1,
    /// Session login, then a signed token request against the session's assertion.
    V2,
}
impl FromStr for AuthVersion {
    type Err = GanderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" | "1.0" | "v1" => Ok(AuthVersion::V1),
            "2" | "2.0" | "v2" => Ok(AuthVersion::V2),
            _ => Err(GanderError::InvalidOption {
                option: "Version".to_string(),
                value: s.to_string(),
                detail: "Version must be 1 or 2.".to_string(),
            }),
        }
    }
}

/// Typed contents of the `[OAuth]` INI section.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthConfig {
    /// Host of the login and token endpoints.
    pub host: String,
    /// Port of the login and token endpoints.
    pub port: u16,
    /// Path of the login endpoint.
    pub login_path: String,
    /// Use cleartext HTTP instead of TLS for the handshake.
    pub use_http: bool,
    /// Login concept, only used by the legacy handshake.
    pub concept: String,
    pub username: String,
    pub password: String,
    pub version: AuthVersion,
    pub consumer_key: String,
    pub consumer_secret: String,
    /// Namespaces the session cache file.
    pub domain: String,
}

impl OAuthConfig {
    /// Load and validate the `[OAuth]` section of an INI file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<OAuthConfig, GanderError> {
        let ini = Ini::load_from_file(path)?;
        OAuthConfig::from_ini(&ini)
    }

    /// Load and validate the `[OAuth]` section from INI text.
    pub fn from_ini_str(contents: &str) -> Result<OAuthConfig, GanderError> {
        let ini = Ini::load_from_str(contents).map_err(|e| GanderError::InvalidOption {
            option: "config file".to_string(),
            value: String::new(),
            detail: e.to_string(),
        })?;
        OAuthConfig::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<OAuthConfig, GanderError> {
        let section = ini
            .section(Some(OAUTH_SECTION))
            .ok_or_else(|| GanderError::InvalidOption {
                option: format!("[{}]", OAUTH_SECTION),
                value: String::new(),
                detail: "The config file has no [OAuth] section.".to_string(),
            })?;

        let optional = |key: &str| section.get(key).map(|v| v.trim().to_string());
        let required = |key: &str| match optional(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(GanderError::InvalidOption {
                option: key.to_string(),
                value: String::new(),
                detail: format!("[{}] {} is required.", OAUTH_SECTION, key),
            }),
        };

        let port_value = required("Port")?;
        let port = port_value
            .parse::<u16>()
            .map_err(|_| GanderError::InvalidOption {
                option: "Port".to_string(),
                value: port_value.clone(),
                detail: "Port must be a number between 0 and 65535.".to_string(),
            })?;

        let use_http = match optional("UseHTTP") {
            Some(value) if !value.is_empty() => {
                util::parse_bool(&value).ok_or_else(|| GanderError::InvalidOption {
                    option: "UseHTTP".to_string(),
                    value: value.clone(),
                    detail: "UseHTTP must be true or false.".to_string(),
                })?
            }
            _ => false,
        };

        let version = match optional("Version") {
            Some(value) if !value.is_empty() => AuthVersion::from_str(&value)?,
            _ => AuthVersion::V2,
        };

        let config = OAuthConfig {
            host: required("Host")?,
            port,
            login_path: required("URL")?,
            use_http,
            concept: optional("Concept").unwrap_or_default(),
            username: required("UserName")?,
            password: required("Password")?,
            version,
            consumer_key: optional("consumer_key").unwrap_or_default(),
            consumer_secret: optional("consumer_secret").unwrap_or_default(),
            domain: optional("domain").unwrap_or_default(),
        };

        // Each handshake needs a different subset of the optional keys.
        match config.version {
            AuthVersion::V1 => {
                required("Concept")?;
            }
            AuthVersion::V2 => {
                required("consumer_key")?;
                required("consumer_secret")?;
                required("domain")?;
            }
        }

        Ok(config)
    }
}
