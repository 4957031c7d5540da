use thiserror::Error;
use tracing::{info, warn};

use super::http_client::Transport;
use super::types::AppEntry;
use super::ScanController;
use crate::error::ScanError;

/// Packages the user has marked, in the order they were marked.
///
/// Entries are not checked against the current inventory; an entry whose
/// package disappeared after a rescan simply matches no row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    packages: Vec<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `package` if absent, remove it if present.
    /// Returns whether the package is selected afterwards.
    pub fn toggle(&mut self, package: &str) -> bool {
        if self.remove(package) {
            false
        } else {
            self.packages.push(package.to_string());
            true
        }
    }

    pub fn remove(&mut self, package: &str) -> bool {
        let before = self.packages.len();
        self.packages.retain(|p| p != package);
        self.packages.len() != before
    }

    pub fn is_selected(&self, package: &str) -> bool {
        self.packages.iter().any(|p| p == package)
    }

    /// Mark every suspicious entry of `apps` that is not already selected.
    /// Returns how many were added.
    pub fn select_suspicious(&mut self, apps: &[AppEntry]) -> usize {
        let mut added = 0;
        for app in apps.iter().filter(|a| a.is_suspicious()) {
            if !self.is_selected(&app.package) {
                self.packages.push(app.package.clone());
                added += 1;
            }
        }
        added
    }

    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn clear(&mut self) {
        self.packages.clear();
    }
}

impl<S: Into<String>> FromIterator<S> for Selection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut selection = Selection::new();
        for package in iter {
            let package = package.into();
            if !selection.is_selected(&package) {
                selection.packages.push(package);
            }
        }
        selection
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Select at least one package to uninstall")]
    EmptySelection,

    #[error("Uninstall of {package} failed: {source}")]
    Failed {
        package: String,
        /// Packages uninstalled before the failure, in order.
        completed: Vec<String>,
        #[source]
        source: ScanError,
    },
}

/// Result of a fully successful batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub uninstalled: Vec<String>,
    /// Accepted by the service but reported as failed by the device.
    pub rejected_by_device: Vec<String>,
}

/// Uninstall every selected package, one at a time, in selection order.
///
/// Each uninstall (including its rescan) finishes before the next starts.
/// Uninstalled packages leave the selection as they complete; the batch
/// stops at the first failure, leaving that package and the rest selected.
pub async fn bulk_uninstall<T: Transport>(
    controller: &ScanController<T>,
    selection: &mut Selection,
) -> Result<BatchReport, BatchError> {
    if selection.is_empty() {
        return Err(BatchError::EmptySelection);
    }

    let pending = selection.packages().to_vec();
    let total = pending.len();
    let mut report = BatchReport::default();

    for (i, package) in pending.into_iter().enumerate() {
        info!("Batch uninstall {}/{}: {}", i + 1, total, package);
        match controller.uninstall(&package).await {
            Ok(response) => {
                selection.remove(&package);
                if response.device_rejected() {
                    report.rejected_by_device.push(package.clone());
                }
                report.uninstalled.push(package);
            }
            Err(source) => {
                warn!(
                    "Batch stopped at {} after {} of {} packages",
                    package,
                    report.uninstalled.len(),
                    total
                );
                return Err(BatchError::Failed {
                    package,
                    completed: report.uninstalled,
                    source,
                });
            }
        }
    }

    info!("Batch uninstall finished: {} packages", report.uninstalled.len());
    Ok(report)
}
