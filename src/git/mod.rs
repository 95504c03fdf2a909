mod client;
pub mod worktree;

pub use client::GitClient;
pub use worktree::{Worktree, WorktreeDirectory};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("not in a git repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("git {args}: {stderr}")]
    Command { args: String, stderr: String },

    #[error("merge {branch} into {target} failed (merge aborted): {detail}")]
    MergeConflict {
        branch: String,
        target: String,
        detail: String,
    },

    #[error("unexpected git output: {0}")]
    UnexpectedOutput(String),

    #[error("git io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One entry of `git worktree list`, before status enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeEntry {
    pub path: PathBuf,
    /// Short branch name; empty when detached
    pub branch: String,
}

/// Version-control operations, each stateless and scoped to a directory.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Top-level directory of the checkout containing `path`.
    async fn repo_root(&self, path: &Path) -> Result<PathBuf, VcsError>;

    /// Primary checkout of the repository, even when `path` is a secondary worktree.
    async fn main_repo_root(&self, path: &Path) -> Result<PathBuf, VcsError>;

    /// Branches on `origin`, short names without the remote prefix.
    async fn list_remote_branches(&self, root: &Path) -> Result<Vec<String>, VcsError>;

    /// Commits (ahead, behind) relative to upstream; (0, 0) without one.
    async fn ahead_behind(&self, path: &Path) -> Result<(u32, u32), VcsError>;

    async fn is_dirty(&self, path: &Path) -> Result<bool, VcsError>;

    async fn default_branch(&self, root: &Path) -> Result<String, VcsError>;

    /// Merge `source` into `target`, aborting the merge on conflict.
    async fn merge_branch(&self, root: &Path, source: &str, target: &str)
        -> Result<(), VcsError>;

    /// Delete a fully merged branch; refuses unmerged ones.
    async fn delete_branch(&self, root: &Path, branch: &str) -> Result<(), VcsError>;

    async fn list_worktrees(&self, root: &Path) -> Result<Vec<WorktreeEntry>, VcsError>;

    /// Create `path` on a new branch `name` starting at `base_ref`.
    async fn add_worktree(
        &self,
        root: &Path,
        name: &str,
        path: &Path,
        base_ref: &str,
    ) -> Result<(), VcsError>;

    /// Remove a worktree; without `force` git refuses dirty trees.
    async fn remove_worktree(&self, root: &Path, path: &Path, force: bool)
        -> Result<(), VcsError>;
}

/// Directory name of the repository root, used for naming sessions.
pub fn repo_name(root: &Path) -> String {
    root.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| root.to_string_lossy().to_string())
}

/// Parse `git branch -r --format=%(refname:short)` output, keeping `origin` only.
pub fn parse_remote_branches(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("origin/"))
        .filter(|name| !name.is_empty() && *name != "HEAD")
        .map(str::to_string)
        .collect()
}

/// Parse `git worktree list --porcelain` output.
pub fn parse_worktree_list(output: &str) -> Vec<WorktreeEntry> {
    let mut entries = Vec::new();
    let mut current: Option<WorktreeEntry> = None;

    for line in output.lines().map(str::trim) {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(done) = current.take() {
                entries.push(done);
            }
            current = Some(WorktreeEntry {
                path: PathBuf::from(path),
                branch: String::new(),
            });
        } else if let Some(reference) = line.strip_prefix("branch ") {
            if let Some(entry) = current.as_mut() {
                // refs/heads/feat/x -> x, matching the worktree naming
                entry.branch = reference.rsplit('/').next().unwrap_or(reference).to_string();
            }
        } else if line.is_empty() {
            if let Some(done) = current.take() {
                entries.push(done);
            }
        }
    }

    if let Some(done) = current {
        entries.push(done);
    }

    entries
}
