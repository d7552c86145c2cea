//! Error types for the Quarterdeck core library.

/// Errors that can occur while generating or delivering a deck.
///
/// All error variants are marked with `#[non_exhaustive]` to allow
/// adding new error types without breaking changes.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Insights API error (HTTP failures, bad payloads, etc.)
    #[error("Insights error: {message}")]
    Insights {
        /// Human-readable error message
        message: String,
        /// Source error if available
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Message queue error (publish, pull, or acknowledge failures)
    #[error("Queue error: {message}")]
    Queue {
        /// Human-readable error message
        message: String,
        /// Source error if available
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Cloud storage error while uploading a finished deck
    #[error("Upload error: {message}")]
    Upload {
        /// Human-readable error message
        message: String,
        /// Source error if available
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Deck templating error (malformed archive or slide markup)
    #[error("Render error: {message}")]
    Render {
        /// What went wrong while rewriting the deck
        message: String,
    },

    /// Credential or token exchange error
    #[error("Auth error: {message}")]
    Auth {
        /// What went wrong while authenticating
        message: String,
    },

    /// Request validation error
    #[error("Validation error: {}", .field.as_deref().map_or_else(|| .message.clone(), |f| format!("{f} {}", .message)))]
    Validation {
        /// Field or aspect that failed validation
        field: Option<String>,
        /// What went wrong
        message: String,
    },

    /// Timed out waiting for a correlated reply
    #[error("Timed out after {seconds}s waiting for a reply")]
    Timeout {
        /// Timeout duration in seconds
        seconds: u64,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// What configuration is problematic
        message: String,
    },

    /// I/O error (file operations, network, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience `Result` type alias for Quarterdeck operations.
///
/// This is the standard Result type used throughout the Quarterdeck codebase.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns whether this error is retryable.
    ///
    /// Retryable errors include transient failures like rate limits,
    /// network timeouts, and temporary service unavailability.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Insights { .. } => true, // Upstream API errors are generally transient
            Error::Queue { .. } => true,
            Error::Upload { .. } => true,
            Error::Io(_) => true,
            Error::Timeout { .. } => true,
            Error::Render { .. } => false, // A malformed template stays malformed
            Error::Auth { .. } => false,
            Error::Validation { .. } => false,
            Error::Serialization(_) => false,
            Error::Config { .. } => false,
        }
    }

    /// Creates a new insights error with a message.
    pub fn insights<S: Into<String>>(message: S) -> Self {
        Error::Insights {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new insights error with a message and source error.
    pub fn insights_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Insights {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new queue error with a message.
    pub fn queue<S: Into<String>>(message: S) -> Self {
        Error::Queue {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new queue error with a message and source error.
    pub fn queue_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Queue {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new upload error with a message.
    pub fn upload<S: Into<String>>(message: S) -> Self {
        Error::Upload {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new upload error with a message and source error.
    pub fn upload_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Upload {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new render error.
    pub fn render<S: Into<String>>(message: S) -> Self {
        Error::Render {
            message: message.into(),
        }
    }

    /// Creates a new auth error.
    pub fn auth<S: Into<String>>(message: S) -> Self {
        Error::Auth {
            message: message.into(),
        }
    }

    /// Creates a new validation error.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Error::Validation {
            field: None,
            message: message.into(),
        }
    }

    /// Creates a new validation error with a field name.
    pub fn validation_field<F, M>(field: F, message: M) -> Self
    where
        F: Into<String>,
        M: Into<String>,
    {
        Error::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}
