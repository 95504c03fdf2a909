//! Plain-text formatting shared by `ls`, the menu and the session picker.

use chrono::{DateTime, Local};

use crate::git::Worktree;
use crate::orchestrator::{PickerEntry, WorktreeRow};
use crate::session::{LiveInfo, Session};
use crate::tmux::AgentStatus;

pub const INDICATOR_LIVE: &str = "●";
pub const INDICATOR_PRIMARY: &str = "*";

/// Width of the worktree name column in `ls`
const NAME_WIDTH: usize = 24;
/// Width of the prompt column in picker labels
const PROMPT_WIDTH: usize = 40;

/// Branch (when it differs from the name), ahead/behind and dirty, e.g.
/// `(feature/x, 2 ahead, dirty)`. Empty when there is nothing to report.
pub fn format_status(wt: &Worktree) -> String {
    let mut parts = Vec::new();

    if !wt.branch.is_empty() && wt.branch != wt.name {
        parts.push(wt.branch.clone());
    }
    if wt.ahead > 0 {
        parts.push(format!("{} ahead", wt.ahead));
    }
    if wt.behind > 0 {
        parts.push(format!("{} behind", wt.behind));
    }
    if wt.dirty {
        parts.push("dirty".to_string());
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!("({})", parts.join(", "))
    }
}

/// Window state and history size, e.g. `● busy, 7 sessions` or `1 session`.
pub fn format_session_info(live: &LiveInfo, session_count: usize) -> String {
    let mut parts = Vec::new();

    if live.has_agent {
        parts.push(format!("{INDICATOR_LIVE} {}", live.status));
    } else if live.exists {
        parts.push(format!("{INDICATOR_LIVE} live"));
    }

    match session_count {
        0 => {}
        1 => parts.push("1 session".to_string()),
        n => parts.push(format!("{n} sessions")),
    }

    parts.join(", ")
}

/// Human age relative to `now`: `just now`, `5m ago`, `3h ago`, `yesterday`, `4d ago`.
pub fn format_age(when: DateTime<Local>, now: DateTime<Local>) -> String {
    let elapsed = now.signed_duration_since(when);

    if elapsed.num_minutes() < 1 {
        "just now".to_string()
    } else if elapsed.num_hours() < 1 {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed.num_hours() < 24 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_hours() < 48 {
        "yesterday".to_string()
    } else {
        format!("{}d ago", elapsed.num_days())
    }
}

/// One `ls` line for a worktree row.
pub fn format_row(row: &WorktreeRow) -> String {
    let marker = if row.worktree.is_primary {
        format!("{INDICATOR_PRIMARY} ")
    } else {
        "  ".to_string()
    };
    let mut line = format!(" {marker}{:<width$}", row.worktree.name, width = NAME_WIDTH);

    let info = format_session_info(&row.live, row.session_count);
    if !info.is_empty() {
        line.push_str("  ");
        line.push_str(&info);
    }
    let status = format_status(&row.worktree);
    if !status.is_empty() {
        line.push_str("  ");
        line.push_str(&status);
    }
    line
}

/// Single-line picker label.
pub fn entry_label(entry: &PickerEntry, now: DateTime<Local>) -> String {
    match entry {
        PickerEntry::Live(live) if live.has_agent => format!("{INDICATOR_LIVE} LIVE ({})", live.status),
        PickerEntry::Live(_) => format!("{INDICATOR_LIVE} LIVE"),
        PickerEntry::Session(s) => session_label(s, now),
        PickerEntry::New => "[n] New session".to_string(),
    }
}

fn session_label(session: &Session, now: DateTime<Local>) -> String {
    let prompt = if session.first_prompt.is_empty() {
        session.short_id()
    } else {
        session.first_prompt.as_str()
    };
    format!(
        "{}  {:<width$}  {}",
        session.short_id(),
        prompt,
        format_age(session.modified, now),
        width = PROMPT_WIDTH
    )
}

/// Header line of a session preview: short id, branch and age.
pub fn session_header(session: &Session, now: DateTime<Local>) -> String {
    let mut header = session.short_id().to_string();
    if !session.git_branch.is_empty() {
        header.push_str(" · ");
        header.push_str(&session.git_branch);
    }
    header.push_str(" · ");
    header.push_str(&format_age(session.modified, now));
    header
}

/// Sentence describing a live window, for previews and details.
pub fn describe_live(live: &LiveInfo) -> String {
    if !live.exists {
        "No window".to_string()
    } else if live.has_agent {
        format!("Agent is {}", live.status)
    } else {
        "Session running".to_string()
    }
}

/// Status worth highlighting; `None` unless an agent was recognised.
pub fn agent_status(live: &LiveInfo) -> Option<AgentStatus> {
    live.has_agent.then_some(live.status)
}
