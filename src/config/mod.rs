#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::adapters::http::HttpClientOptions;
use crate::adapters::tls::TlsOptions;
use crate::domain::model::Target;
use crate::protocol::xmlrpc::{DEFAULT_ECHO_FILL, DEFAULT_ECHO_LEN, DEFAULT_REQUESTED_SIZE};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_fingerprint, validate_non_empty_string, validate_positive_number, validate_range,
    validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3344;
pub const DEFAULT_THRESHOLD_SECONDS: f64 = 1.0;
pub const MAX_TIMEOUT_SECONDS: u64 = 3600;
/// 16 MiB
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

fn default_requested_size() -> i32 {
    DEFAULT_REQUESTED_SIZE
}

fn default_payload_len() -> usize {
    DEFAULT_ECHO_LEN
}

fn default_fill() -> char {
    DEFAULT_ECHO_FILL
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD_SECONDS
}

fn default_clients() -> usize {
    4
}

fn default_calls_per_client() -> usize {
    1
}

fn validate_timeout(field_name: &str, timeout: Option<u64>) -> Result<()> {
    match timeout {
        Some(secs) => validate_range(field_name, secs, 1, MAX_TIMEOUT_SECONDS),
        None => Ok(()),
    }
}

/// Settings of the abrupt-disconnect probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisconnectSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub tls: bool,
    #[serde(flatten)]
    pub tls_options: TlsOptions,
    #[serde(default = "default_requested_size")]
    pub requested_size: i32,
    /// Content-Length to announce instead of the real body length.
    pub declared_length: Option<usize>,
    /// Write only this many bytes of the framed request.
    pub send_bytes: Option<usize>,
    pub timeout_seconds: Option<u64>,
    pub user_agent: Option<String>,
}

impl Default for DisconnectSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls: true,
            tls_options: TlsOptions::default(),
            requested_size: default_requested_size(),
            declared_length: None,
            send_bytes: None,
            timeout_seconds: None,
            user_agent: None,
        }
    }
}

impl DisconnectSettings {
    pub fn target(&self) -> Target {
        Target::new(self.host.clone(), self.port)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

impl Validate for DisconnectSettings {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("disconnect.host", &self.host)?;
        validate_range("disconnect.port", self.port, 1, u16::MAX)?;
        validate_range("disconnect.requested_size", self.requested_size, 0, i32::MAX)?;
        if let Some(send_bytes) = self.send_bytes {
            validate_positive_number("disconnect.send_bytes", send_bytes, 1)?;
        }
        if let Some(fingerprint) = &self.tls_options.server_fingerprint {
            validate_fingerprint("disconnect.server_fingerprint", fingerprint)?;
        }
        validate_timeout("disconnect.timeout_seconds", self.timeout_seconds)
    }
}

/// Settings of the timed echo probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StallSettings {
    pub url: String,
    #[serde(default = "default_payload_len")]
    pub payload_len: usize,
    #[serde(default = "default_fill")]
    pub fill: char,
    #[serde(default = "default_threshold")]
    pub threshold_seconds: f64,
    /// Announce `Expect: 100-continue` and hold the body until the server
    /// answers `100 Continue` or the threshold runs out.
    #[serde(default = "default_true")]
    pub expect_continue: bool,
    #[serde(flatten)]
    pub client: HttpClientOptions,
}

impl StallSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            payload_len: default_payload_len(),
            fill: default_fill(),
            threshold_seconds: default_threshold(),
            expect_continue: true,
            client: HttpClientOptions::default(),
        }
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_secs_f64(self.threshold_seconds)
    }
}

impl Validate for StallSettings {
    fn validate(&self) -> Result<()> {
        validate_url("stall.url", &self.url)?;
        validate_range("stall.payload_len", self.payload_len, 0, MAX_PAYLOAD_LEN)?;
        validate_range(
            "stall.threshold_seconds",
            self.threshold_seconds,
            0.0,
            MAX_TIMEOUT_SECONDS as f64,
        )?;
        if let Some(proxy) = &self.client.proxy {
            validate_url("stall.proxy", proxy)?;
        }
        validate_timeout("stall.timeout_seconds", self.client.timeout_seconds)
    }
}

/// Concurrent echo calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressSettings {
    #[serde(flatten)]
    pub stall: StallSettings,
    #[serde(default = "default_clients")]
    pub clients: usize,
    #[serde(default = "default_calls_per_client")]
    pub calls_per_client: usize,
}

impl StressSettings {
    pub fn new(stall: StallSettings) -> Self {
        Self {
            stall,
            clients: default_clients(),
            calls_per_client: default_calls_per_client(),
        }
    }
}

impl Validate for StressSettings {
    fn validate(&self) -> Result<()> {
        self.stall.validate()?;
        validate_range("stress.clients", self.clients, 1, 1024)?;
        validate_positive_number("stress.calls_per_client", self.calls_per_client, 1)
    }
}
