mod client;
mod heuristics;

pub use client::TmuxClient;
pub use heuristics::{AgentStatus, StateInferenceEngine};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Pane holding the editor in a worktree window
pub const EDITOR_PANE: usize = 0;
/// Pane holding the agent in a worktree window
pub const AGENT_PANE: usize = 1;
/// First window of every repo-level session
pub const DASHBOARD_WINDOW: &str = "dashboard";

#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("tmux {args}: {stderr}")]
    CommandFailed { args: String, stderr: String },

    #[error("tmux io error: {0}")]
    Io(#[from] std::io::Error),
}

/// How the caller should hand the terminal over to a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attach {
    /// Already inside a client: switch it and keep running
    Switch { target: String },
    /// Outside any client: replace this process with the attach command
    Exec { program: String, args: Vec<String> },
}

/// The terminal multiplexer operations the orchestrator relies on.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    /// Returns false (not an error) when the server is not running.
    async fn session_exists(&self, session: &str) -> bool;

    async fn window_exists(&self, session: &str, window: &str) -> bool;

    /// Create a detached session whose first window is named `first_window`.
    async fn create_session(
        &self,
        session: &str,
        first_window: &str,
        dir: &Path,
    ) -> Result<(), TmuxError>;

    async fn create_window(&self, session: &str, window: &str, dir: &Path)
        -> Result<(), TmuxError>;

    async fn kill_window(&self, session: &str, window: &str) -> Result<(), TmuxError>;

    /// Split the target side-by-side, starting the new pane in `dir`.
    async fn split_pane(&self, target: &str, dir: &Path) -> Result<(), TmuxError>;

    async fn send_keys_and_enter(&self, target: &str, text: &str) -> Result<(), TmuxError>;

    /// Capture the last `lines` lines of a pane. Returns "" when the target is gone.
    async fn capture_pane_trailing(&self, target: &str, lines: usize)
        -> Result<String, TmuxError>;

    /// Decide how to attach to `target` from the current process.
    fn attach_plan(&self, target: &str) -> Attach;

    async fn switch_client(&self, target: &str) -> Result<(), TmuxError>;
}

/// Session/window naming for one repository.
#[derive(Debug, Clone)]
pub struct Naming {
    prefix: String,
}

impl Naming {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Repo-level session name, e.g. "pr-myrepo".
    pub fn session_name(&self, repo: &str) -> String {
        sanitize(&format!("{}{}", self.prefix, repo))
    }

    pub fn window_name(&self, worktree: &str) -> String {
        sanitize(worktree)
    }

    pub fn window_target(&self, repo: &str, worktree: &str) -> String {
        format!("{}:{}", self.session_name(repo), self.window_name(worktree))
    }

    pub fn pane_target(&self, repo: &str, worktree: &str, pane: usize) -> String {
        format!("{}.{}", self.window_target(repo, worktree), pane)
    }
}

impl Default for Naming {
    fn default() -> Self {
        Self::new("pr-")
    }
}

/// tmux forbids '.' and ':' in session and window names
fn sanitize(name: &str) -> String {
    name.replace(['.', ':'], "-")
}
