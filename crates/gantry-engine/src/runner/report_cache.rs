//! Disk-backed cache of formatted report artifacts
//!
//! Formatted reports are materialized on demand, keyed per run id,
//! and written once: the file is produced under a temporary name and
//! renamed into place, so concurrent readers only ever see complete
//! artifacts.

use crate::error::EngineResult;
use crate::framework::ReportManager;
use crate::model::report::Report;
use crate::progress::monitor::ProgressMonitor;
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

pub struct ReportCache {
    root: PathBuf,
}

impl ReportCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache directory one run's artifacts live under
    pub fn run_dir(&self, run_id: Uuid) -> PathBuf {
        self.root.join(run_id.to_string())
    }

    /// Materialize a formatted report, reusing a previously written
    /// artifact when present
    pub fn materialize(
        &self,
        run_id: Uuid,
        report: &Report,
        format: &str,
        manager: &dyn ReportManager,
    ) -> EngineResult<PathBuf> {
        if !manager.supports(format) {
            return Err(crate::error::EngineError::UnknownFormat(format.to_string()));
        }

        let dir = self.run_dir(run_id).join(format);
        let file = dir.join(format!("report.{}", manager.file_extension(format)));
        if file.exists() {
            return Ok(file);
        }

        fs::create_dir_all(&dir)?;
        let staging = dir.join(format!(".report-{}.tmp", std::process::id()));
        {
            let mut writer = fs::File::create(&staging)?;
            let monitor = ProgressMonitor::new();
            manager.write_report(report, format, &mut writer, &monitor)?;
        }
        match fs::rename(&staging, &file) {
            Ok(()) => Ok(file),
            // A concurrent writer got there first; its artifact is
            // equivalent.
            Err(_) if file.exists() => {
                let _ = fs::remove_file(&staging);
                Ok(file)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for ReportCache {
    fn default() -> Self {
        Self::new(default_cache_root())
    }
}

/// Process-wide default location for formatted report artifacts
pub fn default_cache_root() -> PathBuf {
    std::env::temp_dir().join("gantry-report-cache")
}
