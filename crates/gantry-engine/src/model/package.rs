//! Test package configuration and loaded artifacts

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Immutable description of the artifacts a harness should load.
///
/// A package is created once per harness lifetime and never mutated
/// after loading begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestPackage {
    /// Display name of the package
    pub name: String,
    /// Paths to test artifacts (files or directories handed to explorers)
    pub artifact_paths: Vec<PathBuf>,
    /// Extra directories consulted when resolving relative artifact paths
    #[serde(default)]
    pub hint_dirs: Vec<PathBuf>,
    /// Working directory the run executes under
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Whether artifacts should be copied aside before loading
    #[serde(default)]
    pub shadow_copy: bool,
    /// Treat any artifact load failure as fatal
    #[serde(default)]
    pub fail_fast: bool,
}

/// On-disk package manifest (`gantry.toml`)
#[derive(Debug, Deserialize)]
struct PackageManifest {
    package: PackageSection,
}

#[derive(Debug, Deserialize)]
struct PackageSection {
    name: String,
    roots: Vec<PathBuf>,
    #[serde(default)]
    hint_dirs: Vec<PathBuf>,
    #[serde(default)]
    working_dir: Option<PathBuf>,
    #[serde(default)]
    shadow_copy: bool,
    #[serde(default)]
    fail_fast: bool,
}

impl TestPackage {
    /// Create a package for a set of artifact paths
    pub fn new(name: impl Into<String>, artifact_paths: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            artifact_paths,
            hint_dirs: Vec::new(),
            working_dir: None,
            shadow_copy: false,
            fail_fast: false,
        }
    }

    /// Add a hint directory for artifact resolution
    pub fn with_hint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.hint_dirs.push(dir.into());
        self
    }

    /// Treat any artifact load failure as fatal
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Read a package from a `gantry.toml` manifest.
    ///
    /// Relative paths in the manifest are resolved against the
    /// manifest's own directory.
    pub fn from_manifest(path: &Path) -> EngineResult<Self> {
        let text =
            fs::read_to_string(path).map_err(|e| EngineError::manifest_read(path, e))?;
        let manifest: PackageManifest =
            toml::from_str(&text).map_err(|e| EngineError::manifest_read(path, e))?;

        let section = manifest.package;
        if section.roots.is_empty() {
            return Err(EngineError::InvalidPackage(format!(
                "manifest {} declares no artifact roots",
                path.display()
            )));
        }

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let rebase = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };

        Ok(Self {
            name: section.name,
            artifact_paths: section.roots.into_iter().map(rebase).collect(),
            hint_dirs: section.hint_dirs.into_iter().map(rebase).collect(),
            working_dir: section.working_dir.map(rebase),
            shadow_copy: section.shadow_copy,
            fail_fast: section.fail_fast,
        })
    }

    /// Fail fast on obviously invalid configuration, before any
    /// background work is started
    pub fn validate(&self) -> EngineResult<()> {
        if self.name.is_empty() {
            return Err(EngineError::InvalidPackage(
                "package name must not be empty".into(),
            ));
        }
        if self.artifact_paths.is_empty() {
            return Err(EngineError::InvalidPackage(
                "package declares no artifact paths".into(),
            ));
        }
        Ok(())
    }

    /// Resolve an artifact path against the working directory and the
    /// hint directories, in that order
    pub fn resolve_artifact(&self, path: &Path) -> Option<PathBuf> {
        if path.is_absolute() {
            return path.exists().then(|| path.to_path_buf());
        }

        let mut candidates = Vec::new();
        if let Some(dir) = &self.working_dir {
            candidates.push(dir.join(path));
        }
        candidates.push(path.to_path_buf());
        for hint in &self.hint_dirs {
            candidates.push(hint.join(path));
        }

        candidates.into_iter().find(|c| c.exists())
    }
}

/// One successfully loaded artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestArtifact {
    /// Resolved on-disk location
    pub path: PathBuf,
    /// Short display name (file stem or directory name)
    pub name: String,
}

impl TestArtifact {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }
}
