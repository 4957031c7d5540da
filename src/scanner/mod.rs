pub mod export;
pub mod http_client;
pub mod selection;
pub mod types;

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{info, warn};

use self::export::ExportHandle;
use self::http_client::{Request, Transport};
use self::types::{
    AppEntry, ExportInfo, ExportRequest, ScanResult, SessionState, UninstallResponse,
};
use crate::error::ScanError;

pub const SCAN_PATH: &str = "/scan/";
pub const UNINSTALL_PATH: &str = "/uninstall/";
pub const EXPORT_PATH: &str = "/export/";

/// Drives the scanning service and owns the client-visible session state.
///
/// Every operation follows the same protocol: set `loading` and clear
/// `error` on entry, run the transport calls, then clear `loading` and
/// either apply the result or record the error message. Errors are always
/// returned to the caller as well.
///
/// Overlapping calls are not serialized here; front-ends must not start an
/// operation while `loading` is set.
pub struct ScanController<T: Transport> {
    transport: T,
    state: watch::Sender<SessionState>,
    export: Mutex<Option<ExportHandle>>,
}

impl<T: Transport> ScanController<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: watch::Sender::new(SessionState::default()),
            export: Mutex::new(None),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn dismiss_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }

    /// Fetch device info and the app inventory, replacing both wholesale.
    pub async fn scan(&self) -> Result<ScanResult, ScanError> {
        info!("Starting scan");
        self.begin();
        let result = self.fetch_scan().await;
        if let Ok(scan) = &result {
            self.apply_scan(scan);
        }
        self.finish(result)
    }

    /// Ask the service to uninstall `package`, then rescan.
    ///
    /// A blank package name fails before any state change.
    pub async fn uninstall(&self, package: &str) -> Result<UninstallResponse, ScanError> {
        let package = package.trim();
        if package.is_empty() {
            return Err(ScanError::Validation("No package name provided".to_string()));
        }

        info!("Uninstalling {}", package);
        self.begin();
        let result = self.uninstall_then_refresh(package).await;
        self.finish(result)
    }

    /// Generate a report and hold it as the controller's export handle.
    ///
    /// `subset` limits the report to the given entries; `None` lets the
    /// service report its default set. Any previous handle is released first.
    pub async fn export_report(
        &self,
        subset: Option<&[AppEntry]>,
    ) -> Result<ExportInfo, ScanError> {
        info!(
            "Exporting report ({})",
            subset.map_or_else(|| "service default".to_string(), |a| format!("{} apps", a.len()))
        );
        self.begin();
        let result = self.replace_export(subset).await;
        self.finish(result)
    }

    /// Release the live export handle. Does nothing when none is held.
    pub fn release_export_handle(&self) -> Result<(), ScanError> {
        let handle = self.export_slot().take();
        match handle {
            Some(handle) => {
                self.state.send_modify(|s| s.export = None);
                handle.release()
            }
            None => Ok(()),
        }
    }

    /// Copy the live report to `dest`.
    pub fn save_export_to(&self, dest: &Path) -> Result<u64, ScanError> {
        match self.export_slot().as_ref() {
            Some(handle) => handle.save_to(dest),
            None => Err(ScanError::Export("No report has been exported".to_string())),
        }
    }

    fn begin(&self) {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    fn finish<R>(&self, result: Result<R, ScanError>) -> Result<R, ScanError> {
        match &result {
            Ok(_) => self.state.send_modify(|s| s.loading = false),
            Err(e) => {
                warn!("Operation failed: {}", e);
                let msg = e.to_string();
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(msg);
                });
            }
        }
        result
    }

    async fn fetch_scan(&self) -> Result<ScanResult, ScanError> {
        let json = self
            .transport
            .request(Request::get_json(SCAN_PATH))
            .await?
            .into_json()?;
        serde_json::from_value(json)
            .map_err(|e| ScanError::Decode(format!("Malformed scan result: {}", e)))
    }

    fn apply_scan(&self, scan: &ScanResult) {
        let apps = scan.apps.clone().unwrap_or_default();
        info!(
            "Scan returned {} apps ({} suspicious), device: {}",
            apps.len(),
            apps.iter().filter(|a| a.is_suspicious()).count(),
            scan.device.as_ref().map_or("none", |d| d.model.as_str())
        );
        self.state.send_modify(|s| {
            s.device_info = scan.device.clone();
            s.apps = apps;
        });
    }

    async fn uninstall_then_refresh(&self, package: &str) -> Result<UninstallResponse, ScanError> {
        let body = serde_json::json!({ "package": package });
        let json = self
            .transport
            .request(Request::post_json(UNINSTALL_PATH, body))
            .await?
            .into_json()?;
        let response: UninstallResponse = serde_json::from_value(json)
            .map_err(|e| ScanError::Decode(format!("Malformed uninstall response: {}", e)))?;
        if response.device_rejected() {
            warn!(
                "Device did not confirm uninstall of {}: {}",
                package,
                response.response.as_deref().unwrap_or("no output")
            );
        }

        // The inventory must not stay stale once the uninstall was accepted.
        let refreshed = self.fetch_scan().await.map_err(|e| ScanError::Refresh {
            package: package.to_string(),
            source: Box::new(e),
        })?;
        self.apply_scan(&refreshed);
        Ok(response)
    }

    async fn replace_export(&self, subset: Option<&[AppEntry]>) -> Result<ExportInfo, ScanError> {
        self.release_export_handle()?;

        let body = serde_json::to_value(ExportRequest { apps: subset })
            .map_err(|e| ScanError::Decode(format!("Failed to encode export request: {}", e)))?;
        let bytes = self
            .transport
            .request(Request::post_binary(EXPORT_PATH, body))
            .await?
            .into_bytes()?;

        let handle = tokio::task::spawn_blocking(move || ExportHandle::create(&bytes))
            .await
            .map_err(|e| ScanError::Export(format!("Report file task panicked: {}", e)))??;
        let info = handle.info().clone();
        {
            let mut slot = self.export_slot();
            // Only reachable if another export raced this one.
            if let Some(stale) = slot.replace(handle) {
                warn!("Replacing an export handle created concurrently");
                if let Err(e) = stale.release() {
                    warn!("Failed to release stale export handle: {}", e);
                }
            }
        }
        self.state.send_modify(|s| s.export = Some(info.clone()));
        Ok(info)
    }

    fn export_slot(&self) -> MutexGuard<'_, Option<ExportHandle>> {
        self.export.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport> Drop for ScanController<T> {
    fn drop(&mut self) {
        let handle = self
            .export
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.release() {
                warn!("Failed to release export handle on teardown: {}", e);
            }
        }
    }
}
