use thiserror::Error;

/// Failure reported by the transport adapter.
///
/// `status` is `None` when no HTTP response was received at all
/// (connection refused, DNS failure, timeout).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Unexpected response: {0}")]
    Decode(String),

    /// The service accepted the uninstall, but the follow-up scan failed,
    /// so the inventory may still list the package.
    #[error("Uninstalled {package} but refreshing the scan failed: {source}")]
    Refresh {
        package: String,
        #[source]
        source: Box<ScanError>,
    },

    #[error("Export error: {0}")]
    Export(String),
}

impl ScanError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ScanError::Validation(_))
    }
}

impl From<ScanError> for String {
    fn from(err: ScanError) -> Self {
        err.to_string()
    }
}
