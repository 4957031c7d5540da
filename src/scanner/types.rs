use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the connected device taken by the last successful scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub model: String,
    pub serial: String,
    pub android_version: String,
    /// Raw `dumpsys battery` output as reported by the service.
    pub battery_info: String,
}

/// One installed application as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppEntry {
    pub package: String,
    pub installer: String,
    pub status: String,
    pub dangerous_permissions: Vec<String>,
}

impl AppEntry {
    /// An entry is suspicious when it requests at least one dangerous permission.
    pub fn is_suspicious(&self) -> bool {
        !self.dangerous_permissions.is_empty()
    }
}

/// Body of `GET /scan/`. Both fields may be null or missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanResult {
    pub device: Option<DeviceInfo>,
    pub apps: Option<Vec<AppEntry>>,
}

/// Body of a successful `POST /uninstall/`.
///
/// `success` reflects what the package manager on the device printed;
/// a `false` here is still an HTTP success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UninstallResponse {
    pub success: Option<bool>,
    pub response: Option<String>,
}

impl UninstallResponse {
    pub fn device_rejected(&self) -> bool {
        self.success == Some(false)
    }
}

/// Request body of `POST /export/`. `apps` is omitted to let the service
/// choose its default subset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apps: Option<&'a [AppEntry]>,
}

/// Public description of the live export handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportInfo {
    pub path: PathBuf,
    pub size_bytes: usize,
    pub created_at: DateTime<Utc>,
}

/// Client-visible state owned by [`super::ScanController`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub loading: bool,
    pub device_info: Option<DeviceInfo>,
    pub apps: Vec<AppEntry>,
    pub error: Option<String>,
    pub export: Option<ExportInfo>,
}

impl SessionState {
    pub fn find_app(&self, package: &str) -> Option<&AppEntry> {
        self.apps.iter().find(|a| a.package == package)
    }

    pub fn suspicious_count(&self) -> usize {
        self.apps.iter().filter(|a| a.is_suspicious()).count()
    }
}

/// Counts derived from an inventory, for list headers and logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InventorySummary {
    pub total: usize,
    pub suspicious: usize,
    pub by_installer: BTreeMap<String, usize>,
}

impl InventorySummary {
    pub fn from_apps(apps: &[AppEntry]) -> Self {
        let mut by_installer = BTreeMap::new();
        for app in apps {
            *by_installer.entry(app.installer.clone()).or_insert(0) += 1;
        }
        Self {
            total: apps.len(),
            suspicious: apps.iter().filter(|a| a.is_suspicious()).count(),
            by_installer,
        }
    }
}

pub fn suspicious_apps(apps: &[AppEntry]) -> Vec<AppEntry> {
    apps.iter().filter(|a| a.is_suspicious()).cloned().collect()
}
