use chrono::{DateTime, Local};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use super::parse::read_log_meta;
use super::Session;

/// Discovers the agent's conversation logs for a worktree.
///
/// Logs live in `<projects_root>/<encoded worktree path>/<id>.jsonl`. The
/// directory is shared by every path that encodes the same way, so each log's
/// recorded cwd is checked against the worktree before it is returned.
#[derive(Debug, Clone)]
pub struct SessionCatalog {
    projects_root: PathBuf,
}

impl SessionCatalog {
    pub fn new(projects_root: impl Into<PathBuf>) -> Self {
        Self {
            projects_root: projects_root.into(),
        }
    }

    /// Catalog rooted at `~/.claude/projects`.
    pub fn from_home() -> Self {
        let home = dirs::home_dir().unwrap_or_default();
        Self::new(home.join(".claude").join("projects"))
    }

    pub fn project_dir(&self, worktree: &Path) -> PathBuf {
        self.projects_root
            .join(encode_path(&worktree.to_string_lossy()))
    }

    /// Sessions run in `worktree`, most recently modified first.
    ///
    /// A missing project directory yields an empty list. Unreadable logs are
    /// skipped.
    pub fn list(&self, worktree: &Path) -> std::io::Result<Vec<Session>> {
        let dir = self.project_dir(worktree);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            let is_log = path.extension().and_then(|e| e.to_str()) == Some("jsonl");
            if !entry.file_type().is_file() || !is_log {
                continue;
            }

            match self.load(path, worktree) {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping log"),
            }
        }

        sessions.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| a.id.cmp(&b.id))
        });

        tracing::debug!(worktree = %worktree.display(), count = sessions.len(), "listed sessions");
        Ok(sessions)
    }

    /// Read one log; `None` when it belongs to a different (or unknown) cwd.
    fn load(&self, path: &Path, worktree: &Path) -> std::io::Result<Option<Session>> {
        let meta = read_log_meta(path)?;
        if meta.cwd.is_empty() || !paths_match(Path::new(&meta.cwd), worktree) {
            return Ok(None);
        }

        let modified: DateTime<Local> = std::fs::metadata(path)?.modified()?.into();
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Some(Session {
            id,
            cwd: PathBuf::from(meta.cwd),
            first_prompt: meta.first_prompt,
            full_prompt: meta.full_prompt,
            modified,
            git_branch: meta.git_branch,
        }))
    }
}

/// The agent's project directory encoding: '/' and '.' both become '-'.
fn encode_path(path: &str) -> String {
    path.replace(['/', '.'], "-")
}

/// Compare two paths after lexical cleaning (trailing slashes, `.`, `..`).
fn paths_match(a: &Path, b: &Path) -> bool {
    clean(a) == clean(b)
}

fn clean(path: &Path) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // ".." at the root stays at the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().collect()
}
