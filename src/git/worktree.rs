use std::path::{Path, PathBuf};

use super::{Vcs, VcsError};

/// A git worktree with its branch status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worktree {
    /// Final path component
    pub name: String,
    pub path: PathBuf,
    pub branch: String,
    /// First entry of `git worktree list`
    pub is_primary: bool,
    pub ahead: u32,
    pub behind: u32,
    pub dirty: bool,
}

/// Enumerates the worktrees of a repository. Nothing is cached.
pub struct WorktreeDirectory<V> {
    vcs: V,
}

impl<V: Vcs> WorktreeDirectory<V> {
    pub fn new(vcs: V) -> Self {
        Self { vcs }
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    /// List all worktrees in `git worktree list` order, enriched with status.
    ///
    /// A failing status query degrades that entry to zero counts and a clean
    /// tree instead of failing the whole listing.
    pub async fn list(&self, repo_root: &Path) -> Result<Vec<Worktree>, VcsError> {
        let entries = self.vcs.list_worktrees(repo_root).await?;
        let mut worktrees = Vec::with_capacity(entries.len());

        for (i, entry) in entries.into_iter().enumerate() {
            let (ahead, behind) = match self.vcs.ahead_behind(&entry.path).await {
                Ok(counts) => counts,
                Err(e) => {
                    tracing::warn!(path = %entry.path.display(), error = %e, "ahead/behind unavailable");
                    (0, 0)
                }
            };
            let dirty = match self.vcs.is_dirty(&entry.path).await {
                Ok(dirty) => dirty,
                Err(e) => {
                    tracing::warn!(path = %entry.path.display(), error = %e, "dirty status unavailable");
                    false
                }
            };

            worktrees.push(Worktree {
                name: worktree_name(&entry.path),
                path: entry.path,
                branch: entry.branch,
                is_primary: i == 0,
                ahead,
                behind,
                dirty,
            });
        }

        Ok(worktrees)
    }

    /// Create a worktree on a new branch `name` at the default location.
    pub async fn add(&self, repo_root: &Path, name: &str, base_ref: &str) -> Result<Worktree, VcsError> {
        let path = default_path(repo_root, name);
        tracing::info!(name, base_ref, path = %path.display(), "adding worktree");
        self.vcs.add_worktree(repo_root, name, &path, base_ref).await?;

        Ok(Worktree {
            name: name.to_string(),
            path,
            branch: name.to_string(),
            is_primary: false,
            ahead: 0,
            behind: 0,
            dirty: false,
        })
    }

    /// Remote branches a new worktree can start from, default branch first.
    ///
    /// Falls back to the default branch alone when `origin` cannot be listed.
    pub async fn base_candidates(&self, repo_root: &Path) -> Result<Vec<String>, VcsError> {
        let mut branches = match self.vcs.list_remote_branches(repo_root).await {
            Ok(branches) => branches,
            Err(e) => {
                tracing::debug!(error = %e, "remote branches unavailable");
                Vec::new()
            }
        };
        if branches.is_empty() {
            return Ok(vec![self.vcs.default_branch(repo_root).await?]);
        }

        if let Ok(default) = self.vcs.default_branch(repo_root).await {
            if let Some(i) = branches.iter().position(|b| *b == default) {
                let default = branches.remove(i);
                branches.insert(0, default);
            }
        }
        Ok(branches)
    }

    /// Remove a worktree; git refuses dirty trees unless `force` is set.
    pub async fn remove(&self, repo_root: &Path, path: &Path, force: bool) -> Result<(), VcsError> {
        tracing::info!(path = %path.display(), force, "removing worktree");
        self.vcs.remove_worktree(repo_root, path, force).await
    }
}

/// Standard worktree location, outside the repo: `<parent>/.worktrees/<repo>/<name>`.
pub fn default_path(repo_root: &Path, name: &str) -> PathBuf {
    let parent = repo_root.parent().unwrap_or(repo_root);
    parent
        .join(".worktrees")
        .join(super::repo_name(repo_root))
        .join(name)
}

pub fn find_by_name<'a>(worktrees: &'a [Worktree], name: &str) -> Option<&'a Worktree> {
    worktrees.iter().find(|wt| wt.name == name)
}

fn worktree_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
