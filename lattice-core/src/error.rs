// Error types for the Lattice framework

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Param \"{0}\" is not optional.")]
    MissingParameter(String),

    #[error("Invalid `{name}` param: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// A collection or document is absent. Carries the client-facing message.
    #[error("{0}")]
    NotFound(String),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    /// Duplicate route, unknown resource, dependency cycle. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream store error: {0}")]
    UpstreamStore(String),

    /// Failure before a route was identified, e.g. a malformed raw request.
    #[error("Adapter fault: {0}")]
    Adapter(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::MissingParameter(_) | Error::InvalidParameter { .. } => 400,
            Error::NotFound(_) | Error::RouteNotFound(_) => 404,
            _ => 500,
        }
    }

    /// Stable label for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MissingParameter(_) => "missing_parameter",
            Error::InvalidParameter { .. } => "invalid_parameter",
            Error::NotFound(_) => "not_found",
            Error::RouteNotFound(_) => "route_not_found",
            Error::Configuration(_) => "configuration",
            Error::UpstreamStore(_) => "upstream_store",
            Error::Adapter(_) => "adapter_fault",
            Error::Serialization(_) => "serialization",
            Error::Internal(_) => "internal",
            Error::Io(_) => "io",
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
