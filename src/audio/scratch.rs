//! # Scratch File Management
//!
//! Uploaded and transcoded audio lives in a scratch directory for the
//! duration of a single request and must be gone afterwards, no matter
//! which pipeline step failed. Two pieces enforce that:
//!
//! - [`ScratchDir`]: the directory itself, created at startup, handing out
//!   collision-free (timestamp + random suffix) file paths.
//! - [`ScratchSet`]: a per-request tracker that removes every file it was
//!   told about, exactly once, either on an explicit [`ScratchSet::cleanup`]
//!   call or on drop. Handlers register every file they create the moment
//!   they create it, so early returns cannot leak files.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Directory for transient per-request audio files.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Open the scratch directory, creating it (and parents) if missing.
    pub fn create(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Produce a fresh path inside the scratch directory. Names carry a
    /// millisecond timestamp plus a random suffix so concurrent requests
    /// in the same millisecond cannot collide.
    pub fn allocate(&self, label: &str, extension: &str) -> PathBuf {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let suffix = Uuid::new_v4().simple().to_string();
        self.root
            .join(format!("{}-{}-{}.{}", label, timestamp, &suffix[..8], extension))
    }
}

/// Tracker for the scratch files created while serving one request.
///
/// Every tracked file is removed exactly once: `cleanup` drains the list,
/// so a second call (or the drop after an explicit call) is a no-op.
#[derive(Debug, Default)]
pub struct ScratchSet {
    paths: Vec<PathBuf>,
    created: usize,
    removed: usize,
}

impl ScratchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file for end-of-request removal. Call this immediately
    /// after creating the file, before any fallible step.
    pub fn track(&mut self, path: PathBuf) -> PathBuf {
        self.created += 1;
        self.paths.push(path.clone());
        path
    }

    /// Number of files registered so far.
    pub fn created(&self) -> usize {
        self.created
    }

    /// Number of files actually removed so far.
    pub fn removed(&self) -> usize {
        self.removed
    }

    /// Remove every tracked file. Files that were never written (tracked
    /// but the producing step failed first) count as removed.
    pub fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    self.removed += 1;
                    debug!(path = %path.display(), "removed scratch file");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    self.removed += 1;
                }
                Err(e) => {
                    // Still counts against us; surface it loudly.
                    warn!(path = %path.display(), error = %e, "failed to remove scratch file");
                }
            }
        }
    }
}

impl Drop for ScratchSet {
    fn drop(&mut self) {
        self.cleanup();
    }
}
