use thiserror::Error;

/// Application-wide error types for ssblc.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid operator configuration (bad option value, missing directory).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The context file could not be read or parsed.
    #[error("Context error: {0}")]
    ContextError(String),

    /// The static file server could not bind its port.
    #[error("Port {0} is already in use")]
    PortInUse(u16),

    /// The static file server failed for another reason.
    #[error("Server error: {0}")]
    ServerError(String),

    /// Launching the browser or preparing a fetch worker failed.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// A single navigation failed (DNS, TLS, connection reset, ...).
    #[error("Navigation error: {0}")]
    NavigationError(String),

    /// A single navigation exceeded the page-load timeout.
    #[error("Navigation timed out after {0} ms")]
    Timeout(u64),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AppError {
    /// Returns true if this error aborts the whole run.
    ///
    /// Per-link failures are recorded into the frontier instead.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AppError::NavigationError(_) | AppError::Timeout(_))
    }
}
