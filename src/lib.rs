pub mod config;
pub mod error;
pub mod scanner;

pub use config::ClientConfig;
pub use error::{ScanError, TransportError};
pub use scanner::http_client::{HttpTransport, Transport};
pub use scanner::selection::{bulk_uninstall, BatchError, BatchReport, Selection};
pub use scanner::types::{AppEntry, DeviceInfo, InventorySummary, ScanResult, SessionState};
pub use scanner::ScanController;

/// Install the global tracing subscriber. Filter comes from `RUST_LOG`,
/// defaulting to `info`.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Build a controller talking HTTP to the endpoint in `config`.
pub fn connect(config: &ClientConfig) -> Result<ScanController<HttpTransport>, TransportError> {
    Ok(ScanController::new(HttpTransport::new(config)?))
}
