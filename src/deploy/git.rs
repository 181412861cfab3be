//! Git invocations for the node template base clone
//!
//! A single shallow clone is made per deploy run and copied into each
//! instance directory. The clone lives in a temp dir under the working
//! directory and is removed when the run ends.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::core::constants;
use crate::errors::{GitError, SnapshotterResult};

async fn run_git(args: &[&str], cwd: &Path) -> SnapshotterResult<()> {
    debug!(args = ?args, cwd = %cwd.display(), "Running git");
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::new("`git` command not found. Is git installed?")
            } else {
                GitError::new(format!("Failed to run git: {e}"))
            }
        })?;

    if !output.status.success() {
        return Err(GitError::with_stderr(
            format!("git {} failed", args.join(" ")),
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        )
        .into());
    }
    Ok(())
}

/// Base clone of the node template, removed on drop.
pub struct BaseClone {
    path: PathBuf,
}

impl BaseClone {
    /// Shallow-clone `repo_url` at `branch` into the temp clone dir beneath
    /// `workdir`. A stale temp dir from an aborted run is removed first.
    pub async fn create(workdir: &Path, repo_url: &str, branch: &str) -> SnapshotterResult<Self> {
        let path = workdir.join(constants::BASE_CLONE_DIR);
        if path.exists() {
            debug!(path = %path.display(), "Removing stale base clone");
            std::fs::remove_dir_all(&path)?;
        }

        info!(repo = repo_url, branch, "Cloning node template");
        run_git(
            &[
                "clone",
                "--depth",
                "1",
                "--branch",
                branch,
                repo_url,
                &path.to_string_lossy(),
            ],
            workdir,
        )
        .await?;

        Ok(Self { path })
    }

    /// Path of the clone on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy the clone's contents into `dest` (which must exist).
    pub fn copy_into(&self, dest: &Path) -> SnapshotterResult<()> {
        copy_dir_recursive(&self.path, dest)
    }
}

impl Drop for BaseClone {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove base clone");
            }
        }
    }
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> SnapshotterResult<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
            copy_dir_recursive(&entry.path(), &target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)?;
        } else if file_type.is_symlink() {
            // build.sh trees use relative symlinks; recreate them as-is
            let link_target = std::fs::read_link(entry.path())?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(link_target, &target)?;
        }
    }
    // Executable bits matter for build.sh; std::fs::copy preserves them.
    Ok(())
}
