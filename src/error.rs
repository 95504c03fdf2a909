use thiserror::Error;

use crate::git::VcsError;
use crate::tmux::TmuxError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("worktree {0:?} not found")]
    WorktreeNotFound(String),

    #[error("cannot {action} the primary worktree")]
    PrimaryWorktree { action: &'static str },

    #[error(transparent)]
    Tmux(#[from] TmuxError),

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
