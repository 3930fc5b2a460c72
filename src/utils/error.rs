use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("OpenSSL error: {0}")]
    SslError(#[from] openssl::error::ErrorStack),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Connection to {target} failed: {source}")]
    ConnectionError {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS handshake with {target} failed: {message}")]
    TlsError { target: String, message: String },

    #[error("Server fingerprint mismatch: expected {expected}, got {actual}")]
    FingerprintMismatch { expected: String, actual: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed at '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Probe '{probe}' failed: {details}")]
    ProbeFailed { probe: String, details: String },

    #[error("Background task failed: {message}")]
    TaskError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Tls,
    Configuration,
    Probe,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ProbeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProbeError::HttpError(_) | ProbeError::ConnectionError { .. } => ErrorCategory::Network,
            ProbeError::SslError(_)
            | ProbeError::TlsError { .. }
            | ProbeError::FingerprintMismatch { .. } => ErrorCategory::Tls,
            ProbeError::UrlError(_)
            | ProbeError::InvalidConfigValueError { .. }
            | ProbeError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            ProbeError::ProbeFailed { .. } => ErrorCategory::Probe,
            ProbeError::IoError(_)
            | ProbeError::SerializationError(_)
            | ProbeError::TaskError { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 目標伺服器無回應通常可以重試
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Tls | ErrorCategory::Configuration | ErrorCategory::Probe => {
                ErrorSeverity::High
            }
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ProbeError::HttpError(e) if e.is_timeout() => {
                "The server did not answer before the request timeout".to_string()
            }
            ProbeError::HttpError(e) if e.is_connect() => {
                "Could not connect to the server".to_string()
            }
            ProbeError::ConnectionError { target, .. } => {
                format!("Could not open a connection to {}", target)
            }
            ProbeError::TlsError { target, .. } => {
                format!("TLS negotiation with {} failed", target)
            }
            ProbeError::FingerprintMismatch { .. } => {
                "The server presented an unexpected certificate".to_string()
            }
            ProbeError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting '{}': {}", field, reason)
            }
            other => other.to_string(),
        }
    }

    /// Process exit status for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check that the server is running and the host/port or URL is correct",
            ErrorCategory::Tls => "Check --no-tls / --verify and the expected --server-fingerprint",
            ErrorCategory::Configuration => "Review the command line options or the suite TOML file",
            ErrorCategory::Probe => "Re-run with --verbose to see the full probe trace",
            ErrorCategory::System => "Check local resources (file permissions, open descriptors)",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;
