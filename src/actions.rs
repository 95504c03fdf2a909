use crossterm::event::KeyEvent;

use crate::orchestrator::WorktreeRow;

/// Actions that can be dispatched through the application
#[derive(Debug, Clone)]
pub enum Action {
    /// A key was pressed
    KeyPress(KeyEvent),
    /// Fresh worktree rows from the poller
    RowsUpdated(Vec<WorktreeRow>),
    /// An error occurred
    Error(String),
    /// Open the named worktree (pick a session, then attach)
    Open(String),
    /// Create a worktree with this name
    CreateWorktree(String),
    /// Merge the named worktree into the default branch
    Merge(String),
    /// Remove the named worktree and its branch
    Delete(String),
}
