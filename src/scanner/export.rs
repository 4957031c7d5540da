use std::io::Write;
use std::path::Path;

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::info;

use super::types::ExportInfo;
use crate::error::ScanError;

/// A downloaded report held in a process-local temporary file.
///
/// The file path is the handle's address. `release` deletes the file;
/// a handle that is dropped without `release` is deleted as well.
#[derive(Debug)]
pub struct ExportHandle {
    file: NamedTempFile,
    info: ExportInfo,
}

impl ExportHandle {
    /// Write `bytes` to a new temp file. Blocking; async callers should
    /// go through `spawn_blocking`.
    pub fn create(bytes: &[u8]) -> Result<Self, ScanError> {
        let mut file = tempfile::Builder::new()
            .prefix("droidscan-report-")
            .suffix(".csv")
            .tempfile()
            .map_err(|e| ScanError::Export(format!("Failed to create report file: {}", e)))?;
        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| ScanError::Export(format!("Failed to write report file: {}", e)))?;

        let info = ExportInfo {
            path: file.path().to_path_buf(),
            size_bytes: bytes.len(),
            created_at: Utc::now(),
        };
        info!("Created export handle {:?} ({} bytes)", info.path, info.size_bytes);
        Ok(Self { file, info })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn info(&self) -> &ExportInfo {
        &self.info
    }

    pub fn read(&self) -> Result<Vec<u8>, ScanError> {
        std::fs::read(self.file.path())
            .map_err(|e| ScanError::Export(format!("Failed to read report file: {}", e)))
    }

    /// Copy the report to `dest`, returning the number of bytes written.
    pub fn save_to(&self, dest: &Path) -> Result<u64, ScanError> {
        let written = std::fs::copy(self.file.path(), dest).map_err(|e| {
            ScanError::Export(format!("Failed to save report to {:?}: {}", dest, e))
        })?;
        info!("Saved report to {:?} ({} bytes)", dest, written);
        Ok(written)
    }

    pub fn release(self) -> Result<(), ScanError> {
        let path = self.info.path;
        self.file
            .close()
            .map_err(|e| ScanError::Export(format!("Failed to remove report {:?}: {}", path, e)))?;
        info!("Released export handle {:?}", path);
        Ok(())
    }
}
