//! Per-request scratch directory
//!
//! A [`Workspace`] is created under the shared scratch root with a fresh UUID
//! and is owned by exactly one request. It is removed either explicitly with
//! [`Workspace::cleanup`] or, failing that, when the guard is dropped.

use std::io;
use std::path::{Path, PathBuf};

use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, warn};
use uuid::Uuid;

use super::pipeline::Artifact;

/// Exclusively owned scratch directory for one request
#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    path: PathBuf,
    released: bool,
}

impl Workspace {
    /// Create a new uniquely named directory under `scratch_root`
    ///
    /// Uses `create_dir`, not `create_dir_all`: the root must already exist and
    /// an existing directory with the same name is an error, never shared.
    pub async fn create(scratch_root: &Path) -> io::Result<Self> {
        let id = Uuid::new_v4();
        let path = scratch_root.join(id.to_string());
        tokio::fs::create_dir(&path).await?;
        debug!("Created workspace {}", path.display());

        Ok(Self {
            id,
            path,
            released: false,
        })
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file inside the workspace
    #[must_use]
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Where a stage writes its artifact
    #[must_use]
    pub fn artifact(&self, artifact: Artifact) -> PathBuf {
        self.path.join(artifact.file_name())
    }

    /// Remove the directory and everything in it
    ///
    /// Removing an already missing directory succeeds.
    pub async fn cleanup(mut self) -> io::Result<()> {
        self.released = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                debug!("CLEANUP: removed {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        // On a multi-thread runtime, hand this worker's queue to another
        // thread while the blocking removal runs
        match Handle::try_current() {
            Ok(handle) if matches!(handle.runtime_flavor(), RuntimeFlavor::MultiThread) => {
                tokio::task::block_in_place(|| remove_now(&self.path));
            }
            _ => remove_now(&self.path),
        }
    }
}

fn remove_now(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => debug!("CLEANUP: removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove workspace {}: {e}", path.display()),
    }
}
