use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{parse_remote_branches, parse_worktree_list, Vcs, VcsError, WorktreeEntry};

/// Client for interacting with git via CLI
pub struct GitClient {
    /// Path to git binary
    git_path: String,
}

impl GitClient {
    pub fn new(git_path: impl Into<String>) -> Self {
        Self {
            git_path: git_path.into(),
        }
    }

    /// Run git in `dir` and return trimmed stdout
    async fn run(&self, dir: &Path, args: &[&str]) -> Result<String, VcsError> {
        tracing::trace!(dir = %dir.display(), ?args, "git");
        let output = Command::new(&self.git_path)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VcsError::Command {
                args: args.join(" "),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for GitClient {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl Vcs for GitClient {
    async fn repo_root(&self, path: &Path) -> Result<PathBuf, VcsError> {
        match self.run(path, &["rev-parse", "--show-toplevel"]).await {
            Ok(out) => Ok(PathBuf::from(out)),
            Err(VcsError::Command { .. }) => Err(VcsError::NotARepository(path.to_path_buf())),
            Err(e) => Err(e),
        }
    }

    async fn main_repo_root(&self, path: &Path) -> Result<PathBuf, VcsError> {
        let root = self.repo_root(path).await?;
        resolve_main_root(&root).await
    }

    async fn list_remote_branches(&self, root: &Path) -> Result<Vec<String>, VcsError> {
        let out = self
            .run(root, &["branch", "-r", "--format=%(refname:short)"])
            .await?;
        Ok(parse_remote_branches(&out))
    }

    async fn ahead_behind(&self, path: &Path) -> Result<(u32, u32), VcsError> {
        let out = match self
            .run(
                path,
                &["rev-list", "--left-right", "--count", "HEAD...@{upstream}"],
            )
            .await
        {
            Ok(out) => out,
            Err(VcsError::Command { stderr, .. })
                if stderr.contains("no upstream") || stderr.contains("unknown revision") =>
            {
                return Ok((0, 0));
            }
            Err(e) => return Err(e),
        };

        parse_ahead_behind(&out)
    }

    async fn is_dirty(&self, path: &Path) -> Result<bool, VcsError> {
        let out = self.run(path, &["status", "--porcelain"]).await?;
        Ok(!out.is_empty())
    }

    async fn default_branch(&self, root: &Path) -> Result<String, VcsError> {
        if let Ok(out) = self
            .run(root, &["symbolic-ref", "refs/remotes/origin/HEAD"])
            .await
        {
            // refs/remotes/origin/main -> main
            if let Some(name) = out.rsplit('/').next().filter(|n| !n.is_empty()) {
                return Ok(name.to_string());
            }
        }

        for candidate in ["main", "master"] {
            let reference = format!("refs/heads/{candidate}");
            if self
                .run(root, &["rev-parse", "--verify", &reference])
                .await
                .is_ok()
            {
                return Ok(candidate.to_string());
            }
        }

        Err(VcsError::UnexpectedOutput(
            "cannot determine default branch".to_string(),
        ))
    }

    async fn merge_branch(&self, root: &Path, source: &str, target: &str) -> Result<(), VcsError> {
        self.run(root, &["checkout", target]).await?;

        if let Err(e) = self.run(root, &["merge", source]).await {
            if let Err(abort) = self.run(root, &["merge", "--abort"]).await {
                tracing::warn!(error = %abort, "merge --abort failed");
            }
            return Err(VcsError::MergeConflict {
                branch: source.to_string(),
                target: target.to_string(),
                detail: e.to_string(),
            });
        }

        Ok(())
    }

    async fn delete_branch(&self, root: &Path, branch: &str) -> Result<(), VcsError> {
        self.run(root, &["branch", "-d", branch]).await?;
        Ok(())
    }

    async fn list_worktrees(&self, root: &Path) -> Result<Vec<WorktreeEntry>, VcsError> {
        let out = self.run(root, &["worktree", "list", "--porcelain"]).await?;
        Ok(parse_worktree_list(&out))
    }

    async fn add_worktree(
        &self,
        root: &Path,
        name: &str,
        path: &Path,
        base_ref: &str,
    ) -> Result<(), VcsError> {
        let path = path.to_string_lossy();
        self.run(root, &["worktree", "add", "-b", name, &path, base_ref])
            .await?;
        Ok(())
    }

    async fn remove_worktree(&self, root: &Path, path: &Path, force: bool) -> Result<(), VcsError> {
        let path = path.to_string_lossy();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path);
        self.run(root, &args).await?;
        Ok(())
    }
}

/// Follow a secondary worktree's `.git` pointer file back to the primary checkout.
async fn resolve_main_root(root: &Path) -> Result<PathBuf, VcsError> {
    let dot_git = root.join(".git");
    let meta = tokio::fs::metadata(&dot_git).await?;
    if meta.is_dir() {
        return Ok(root.to_path_buf());
    }

    let content = tokio::fs::read_to_string(&dot_git).await?;
    let main_root = main_root_from_pointer(root, &content)?;

    if tokio::fs::metadata(main_root.join(".git")).await.is_err() {
        return Err(VcsError::NotARepository(main_root));
    }
    Ok(main_root)
}

/// "gitdir: /repo/.git/worktrees/<name>" -> /repo
fn main_root_from_pointer(root: &Path, content: &str) -> Result<PathBuf, VcsError> {
    let line = content.trim();
    let gitdir = line
        .strip_prefix("gitdir: ")
        .ok_or_else(|| VcsError::UnexpectedOutput(format!(".git file content: {line}")))?;

    let gitdir = if Path::new(gitdir).is_absolute() {
        PathBuf::from(gitdir)
    } else {
        root.join(gitdir)
    };

    gitdir
        .parent() // .git/worktrees
        .and_then(Path::parent) // .git
        .and_then(Path::parent) // repo
        .map(Path::to_path_buf)
        .ok_or_else(|| VcsError::UnexpectedOutput(format!("gitdir {}", gitdir.display())))
}

fn parse_ahead_behind(out: &str) -> Result<(u32, u32), VcsError> {
    let counts: Vec<u32> = out
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| VcsError::UnexpectedOutput(format!("rev-list output: {out:?}")))?;

    match counts.as_slice() {
        [ahead, behind] => Ok((*ahead, *behind)),
        _ => Err(VcsError::UnexpectedOutput(format!("rev-list output: {out:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ahead_behind() {
        assert_eq!(parse_ahead_behind("3\t1").unwrap(), (3, 1));
        assert_eq!(parse_ahead_behind("0 0").unwrap(), (0, 0));
        assert!(parse_ahead_behind("garbage").is_err());
        assert!(parse_ahead_behind("1").is_err());
    }

    #[test]
    fn test_main_root_from_absolute_pointer() {
        let root = main_root_from_pointer(
            Path::new("/home/u/git/.worktrees/app/feat"),
            "gitdir: /home/u/git/app/.git/worktrees/feat\n",
        )
        .unwrap();
        assert_eq!(root, PathBuf::from("/home/u/git/app"));
    }

    #[test]
    fn test_main_root_from_bad_pointer() {
        assert!(main_root_from_pointer(Path::new("/x"), "nonsense").is_err());
    }

    #[tokio::test]
    async fn test_resolve_main_root_for_primary_checkout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let root = resolve_main_root(dir.path()).await.unwrap();
        assert_eq!(root, dir.path());
    }

    #[tokio::test]
    async fn test_resolve_main_root_for_secondary_worktree() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("app");
        let secondary = dir.path().join("feat");
        std::fs::create_dir_all(main.join(".git/worktrees/feat")).unwrap();
        std::fs::create_dir_all(&secondary).unwrap();
        std::fs::write(
            secondary.join(".git"),
            format!("gitdir: {}\n", main.join(".git/worktrees/feat").display()),
        )
        .unwrap();

        assert_eq!(resolve_main_root(&secondary).await.unwrap(), main);
    }

    #[tokio::test]
    async fn test_repo_root_outside_repository() {
        let dir = tempfile::tempdir().unwrap();
        let err = GitClient::default().repo_root(dir.path()).await.unwrap_err();
        assert!(matches!(
            err,
            VcsError::NotARepository(_) | VcsError::Io(_)
        ));
    }
}
