//! Collects survey logs scattered over a source tree into one flat directory.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Statistics about one harvest.
#[derive(Debug, Default, Clone)]
pub struct HarvestStats {
    /// Total time spent walking and copying (milliseconds)
    pub total_duration_ms: u64,

    /// Matching files found under the source root
    pub files_scanned: usize,

    /// Files copied into the staging directory
    pub files_copied: usize,

    /// Copies that replaced a file with the same name from this harvest
    pub name_collisions: usize,

    /// Files or directories that could not be read or copied
    pub files_failed: usize,

    /// Total bytes copied
    pub total_size_bytes: u64,
}

/// Errors that stop a harvest before any file is copied.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// The source root does not exist or is not a directory
    #[error("Source directory not found: {}", .0.display())]
    SourceMissing(PathBuf),

    /// Failed to create the staging directory
    #[error("Failed to create staging directory: {0}")]
    StagingCreation(#[from] std::io::Error),
}

/// Returns `true` when `path` ends in `.{extension}`.
pub fn matches_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(extension)
}

/// Walks a source tree and copies every file with the wanted extension into
/// a staging directory, dropping the directory structure.
#[derive(Debug, Clone)]
pub struct Harvester {
    extension: String,
}

impl Default for Harvester {
    fn default() -> Self {
        Self::new("xml")
    }
}

impl Harvester {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    /// Copies matching files from `source_root` into `staging_dir`.
    ///
    /// Unreadable entries and failed copies are logged and counted; the walk
    /// carries on. When two files share a name the later one wins.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] if the source root is missing or the staging
    /// directory cannot be created.
    pub fn harvest(
        &self,
        source_root: &Path,
        staging_dir: &Path,
    ) -> Result<HarvestStats, HarvestError> {
        let start = std::time::Instant::now();
        let mut stats = HarvestStats::default();

        let root = match source_root.canonicalize() {
            Ok(root) if root.is_dir() => root,
            _ => return Err(HarvestError::SourceMissing(source_root.to_path_buf())),
        };
        std::fs::create_dir_all(staging_dir)?;

        // Never harvest our own output when staging sits inside the source tree.
        let staging = staging_dir
            .canonicalize()
            .unwrap_or_else(|_| staging_dir.to_path_buf());
        let mut copied_names: HashSet<OsString> = HashSet::new();

        info!(source = %source_root.display(), "Traversing directory");

        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !entry.path().starts_with(&staging));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Cannot read entry");
                    stats.files_failed += 1;
                    continue;
                }
            };

            if !entry.file_type().is_file() || !matches_extension(entry.path(), &self.extension) {
                continue;
            }
            stats.files_scanned += 1;

            let file_name = entry.file_name().to_os_string();
            let destination = staging_dir.join(&file_name);

            debug!(from = %entry.path().display(), to = %destination.display(), "Copying");
            match std::fs::copy(entry.path(), &destination) {
                Ok(bytes) => {
                    if !copied_names.insert(file_name) {
                        stats.name_collisions += 1;
                        warn!(
                            file = %destination.display(),
                            source = %entry.path().display(),
                            "Name collision, replaced earlier copy"
                        );
                    }
                    stats.files_copied += 1;
                    stats.total_size_bytes += bytes;
                }
                Err(e) => {
                    warn!(file = %entry.path().display(), error = %e, "Copy failed");
                    stats.files_failed += 1;
                }
            }
        }

        stats.total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            copied = stats.files_copied,
            collisions = stats.name_collisions,
            failed = stats.files_failed,
            size_bytes = stats.total_size_bytes,
            "Harvest completed"
        );

        Ok(stats)
    }
}
