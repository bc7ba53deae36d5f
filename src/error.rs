//! Error types for the MythTV services layer
//!
//! The core (resolver, binding, records, queries) never swallows errors;
//! everything propagates as a `MythError` and the binaries decide how to
//! report it and which exit status to use.

use thiserror::Error;

/// Result type alias for MythTV operations.
pub type Result<T> = std::result::Result<T, MythError>;

/// Errors raised by the MythTV client library.
#[derive(Debug, Error)]
pub enum MythError {
    /// Service name not in the fixed list of backend services.
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// Record class name not in the registry.
    #[error("Unknown class name: {0}")]
    UnknownClass(String),

    /// None of the configured temporary directories exist.
    #[error("Unable to find tmp directory (tried: {tried})")]
    TmpDir { tried: String },

    /// Settings file could not be read or written.
    #[error("Settings error: {0}")]
    Settings(String),

    /// The WSDL does not describe what we expected of it.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Read or write of a field the record type doesn't have.
    #[error("'{class}' object has no attribute '{name}'")]
    UnknownAttribute { class: String, name: String },

    /// Write of a field outside the writable set.
    #[error("'{class}' attribute '{name}' is read-only")]
    ReadOnlyAttribute { class: String, name: String },

    /// Filter on a field the record type doesn't have.
    #[error("Attempt to filter on non-existent attribute: {0}")]
    UnknownFilterField(String),

    /// Filter pattern is not a valid regular expression.
    #[error("Invalid filter pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Profile section missing from the profile text.
    #[error("Profile feature '{0}' not found")]
    FeatureNotFound(String),

    /// Profile section found but its text doesn't fit the declared type.
    #[error("Unable to read feature '{name}' as {kind}: {message}")]
    Coercion {
        name: String,
        kind: &'static str,
        message: String,
    },

    /// Record type has no write operation.
    #[error("'{0}' records cannot be saved")]
    NotSaveable(String),

    /// Connection refused, DNS failure, broken transfer.
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with a non-success status.
    #[error("HTTP error {status} from {url}")]
    Http { status: u16, url: String },

    /// The remote rejected a SOAP call.
    #[error("SOAP fault ({code}): {message}")]
    SoapFault { code: String, message: String },

    /// Document could not be parsed as XML.
    #[error("XML error: {0}")]
    Xml(String),

    /// Local filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MythError {
    /// True for failures to reach the backend at all.
    ///
    /// Callers use this to decide whether to print the host/port hint.
    pub fn is_network(&self) -> bool {
        matches!(self, MythError::Network(_) | MythError::Http { .. })
    }

    pub(crate) fn schema(message: impl Into<String>) -> Self {
        MythError::Schema(message.into())
    }
}

impl From<quick_xml::Error> for MythError {
    fn from(err: quick_xml::Error) -> Self {
        MythError::Xml(err.to_string())
    }
}
