use clap::Args;
use std::path::PathBuf;

use crate::orchestrator::LaunchConfig;
use crate::session::SessionCatalog;
use crate::tmux::Naming;

/// Options shared by every subcommand; each falls back to an environment variable.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// tmux binary
    #[arg(long, global = true, env = "PARKRANGER_TMUX", default_value = "tmux")]
    pub tmux: String,

    /// git binary
    #[arg(long, global = true, env = "PARKRANGER_GIT", default_value = "git")]
    pub git: String,

    /// Agent command launched in the agent pane
    #[arg(long, global = true, env = "PARKRANGER_AGENT", default_value = "claude")]
    pub agent: String,

    /// Editor launched in the editor pane
    #[arg(long, global = true, env = "EDITOR", default_value = "nvim")]
    pub editor: String,

    /// Directory holding the agent's per-project conversation logs
    #[arg(long, global = true, env = "PARKRANGER_PROJECTS_DIR")]
    pub projects_dir: Option<PathBuf>,

    /// Prefix of the repo-level tmux session name
    #[arg(long, global = true, env = "PARKRANGER_SESSION_PREFIX", default_value = "pr-")]
    pub session_prefix: String,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub tmux_path: String,
    pub git_path: String,
    pub naming: Naming,
    pub launch: LaunchConfig,
    pub projects_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_args(args: &GlobalArgs) -> Self {
        // The dashboard window re-runs this binary with no arguments
        let dashboard_command = std::env::current_exe()
            .ok()
            .map(|exe| exe.to_string_lossy().to_string());

        Self {
            tmux_path: args.tmux.clone(),
            git_path: args.git.clone(),
            naming: Naming::new(args.session_prefix.clone()),
            launch: LaunchConfig {
                agent: args.agent.clone(),
                editor: args.editor.clone(),
                dashboard_command,
            },
            projects_dir: args.projects_dir.clone(),
        }
    }

    pub fn catalog(&self) -> SessionCatalog {
        match &self.projects_dir {
            Some(dir) => SessionCatalog::new(dir),
            None => SessionCatalog::from_home(),
        }
    }
}
