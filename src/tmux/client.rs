use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::{Attach, Multiplexer, TmuxError};

/// Client for interacting with tmux via CLI
pub struct TmuxClient {
    /// Path to tmux binary
    tmux_path: String,
    /// Whether this process runs inside a tmux client ($TMUX set)
    inside: bool,
}

impl TmuxClient {
    pub fn new(tmux_path: impl Into<String>) -> Self {
        Self {
            tmux_path: tmux_path.into(),
            inside: std::env::var_os("TMUX").is_some_and(|v| !v.is_empty()),
        }
    }

    /// Run tmux and return trimmed stdout
    async fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        tracing::trace!(?args, "tmux");
        let output = Command::new(&self.tmux_path)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TmuxError::CommandFailed {
                args: args.join(" "),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run tmux, only caring whether it succeeded
    async fn succeeds(&self, args: &[&str]) -> bool {
        Command::new(&self.tmux_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self::new("tmux")
    }
}

#[async_trait]
impl Multiplexer for TmuxClient {
    async fn session_exists(&self, session: &str) -> bool {
        // "=" forces an exact match instead of tmux's prefix matching
        self.succeeds(&["has-session", "-t", &format!("={session}")])
            .await
    }

    async fn window_exists(&self, session: &str, window: &str) -> bool {
        let Ok(out) = self
            .run(&[
                "list-windows",
                "-t",
                &format!("={session}"),
                "-F",
                "#{window_name}",
            ])
            .await
        else {
            return false;
        };
        out.lines().any(|name| name == window)
    }

    async fn create_session(
        &self,
        session: &str,
        first_window: &str,
        dir: &Path,
    ) -> Result<(), TmuxError> {
        let dir = dir.to_string_lossy();
        self.run(&[
            "new-session",
            "-d",
            "-s",
            session,
            "-n",
            first_window,
            "-c",
            &dir,
        ])
        .await?;
        Ok(())
    }

    async fn create_window(
        &self,
        session: &str,
        window: &str,
        dir: &Path,
    ) -> Result<(), TmuxError> {
        let dir = dir.to_string_lossy();
        // Trailing ':' appends at the next free index of the session
        self.run(&[
            "new-window",
            "-d",
            "-t",
            &format!("{session}:"),
            "-n",
            window,
            "-c",
            &dir,
        ])
        .await?;
        Ok(())
    }

    async fn kill_window(&self, session: &str, window: &str) -> Result<(), TmuxError> {
        self.run(&["kill-window", "-t", &format!("{session}:{window}")])
            .await?;
        Ok(())
    }

    async fn split_pane(&self, target: &str, dir: &Path) -> Result<(), TmuxError> {
        let dir = dir.to_string_lossy();
        self.run(&["split-window", "-h", "-t", target, "-c", &dir])
            .await?;
        Ok(())
    }

    async fn send_keys_and_enter(&self, target: &str, text: &str) -> Result<(), TmuxError> {
        self.run(&["send-keys", "-t", target, text, "Enter"]).await?;
        Ok(())
    }

    async fn capture_pane_trailing(
        &self,
        target: &str,
        lines: usize,
    ) -> Result<String, TmuxError> {
        let start = format!("-{lines}");
        match self
            .run(&["capture-pane", "-p", "-J", "-t", target, "-S", &start])
            .await
        {
            // -S reaches into history but the visible screen still comes along
            Ok(out) => Ok(last_lines(&out, lines)),
            // Pane is gone; nothing to read is not a failure here
            Err(TmuxError::CommandFailed { stderr, .. }) => {
                tracing::debug!(target, %stderr, "capture-pane failed");
                Ok(String::new())
            }
            Err(e) => Err(e),
        }
    }

    fn attach_plan(&self, target: &str) -> Attach {
        if self.inside {
            Attach::Switch {
                target: target.to_string(),
            }
        } else {
            Attach::Exec {
                program: self.tmux_path.clone(),
                args: vec![
                    "attach-session".to_string(),
                    "-t".to_string(),
                    target.to_string(),
                ],
            }
        }
    }

    async fn switch_client(&self, target: &str) -> Result<(), TmuxError> {
        self.run(&["switch-client", "-t", target]).await?;
        Ok(())
    }
}

/// Keep the bottom `n` lines, ignoring trailing blank ones.
fn last_lines(text: &str, n: usize) -> String {
    let mut lines: Vec<&str> = text.lines().collect();
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
