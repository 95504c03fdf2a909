//! Agent conversation history and live pane detection for worktrees.

mod catalog;
pub(crate) mod live;
mod parse;

pub use catalog::SessionCatalog;
pub use live::{snapshot, Detector, DetectorSet, LiveInfo};

use chrono::{DateTime, Local};
use std::path::PathBuf;

/// A persisted agent conversation that was run inside one worktree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Log file stem, passed back to the agent's `--resume`
    pub id: String,
    pub cwd: PathBuf,
    /// Single-line excerpt for list labels
    pub first_prompt: String,
    /// Longer excerpt with line breaks kept, for previews
    pub full_prompt: String,
    pub modified: DateTime<Local>,
    pub git_branch: String,
}

impl Session {
    /// First eight characters of the id.
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(8) {
            Some((end, _)) => &self.id[..end],
            None => &self.id,
        }
    }
}
