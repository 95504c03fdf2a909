use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Status of the agent running in a worktree's agent pane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AgentStatus {
    /// Status cannot be determined
    #[default]
    Unknown,
    /// Agent is sitting at its prompt
    Idle,
    /// Agent is actively processing (spinning, thinking, streaming)
    Busy,
    /// Agent is blocked on a user decision
    Waiting,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Unknown => "unknown",
            AgentStatus::Idle => "idle",
            AgentStatus::Busy => "busy",
            AgentStatus::Waiting => "waiting",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one pane capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status: AgentStatus,
    /// Whether the capture looks like the agent's UI at all
    pub has_agent: bool,
}

impl Classification {
    const fn new(status: AgentStatus, has_agent: bool) -> Self {
        Self { status, has_agent }
    }

    pub const UNKNOWN: Classification = Classification::new(AgentStatus::Unknown, false);
}

const SEARCH_OVERLAY: char = '\u{2315}';
const SPINNER: char = '\u{2722}';
const PROMPT: char = '❯';

/// Activity stats line, e.g. "↓ 20.1k tokens · thought for 288s"
static RE_ACTIVITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d+\.?\d*k?\s+tokens?\s*·\s*(?:thinking|thought)").unwrap()
});

/// A capture split into the trailing windows the rules look at.
///
/// Status chrome, prompts and the input box always render at the bottom of the
/// pane; older output that scrolled up but is still inside the capture must not
/// influence the result, so each signal only trusts a bounded tail.
struct Capture<'a> {
    raw: &'a str,
    lower: String,
    raw5: String,
    raw15: String,
    low5: String,
    low10: String,
}

impl<'a> Capture<'a> {
    /// Returns `None` for empty or all-blank input.
    fn new(raw: &'a str) -> Option<Self> {
        let mut lines: Vec<&str> = raw.split('\n').collect();
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }
        if lines.is_empty() {
            return None;
        }

        let tail = |n: usize| lines[lines.len().saturating_sub(n)..].join("\n");
        let raw5 = tail(5);
        let raw15 = tail(15);
        let low5 = raw5.to_lowercase();
        let low10 = tail(10).to_lowercase();

        Some(Self {
            raw,
            lower: raw.to_lowercase(),
            raw5,
            raw15,
            low5,
            low10,
        })
    }

    fn has_prompt(&self) -> bool {
        self.raw5.contains(PROMPT)
            || self.low10.contains("type a message")
            || self.low10.contains("type your message")
    }

    fn has_hints(&self) -> bool {
        self.low10.contains("/help") || self.low10.contains("shift+")
    }

    fn has_model_bar(&self) -> bool {
        ["ctx:", "opus", "sonnet", "haiku"]
            .iter()
            .any(|p| self.low5.contains(p))
    }
}

fn search_overlay(c: &Capture) -> bool {
    c.raw.contains(SEARCH_OVERLAY)
}

fn history_search(c: &Capture) -> bool {
    c.low10.contains("ctrl+r to toggle")
}

fn awaiting_decision(c: &Capture) -> bool {
    c.low5.contains("esc to cancel")
        || c.low10.contains("no, and tell claude what to do differently")
        || c.low5.contains("do you want")
        || c.low5.contains("would you like")
}

fn working(c: &Capture) -> bool {
    c.raw15.contains(SPINNER)
        || RE_ACTIVITY.is_match(&c.low10)
        || c.low5.contains("esc to interrupt")
        || c.low5.contains("ctrl+c to interrupt")
}

fn at_prompt(c: &Capture) -> bool {
    let prompt = c.has_prompt();
    let hints = c.has_hints();
    (c.lower.contains("claude") && (prompt || hints))
        // branding scrolled off, but prompt and hints are still on screen
        || (prompt && hints)
        || (c.has_model_bar() && prompt)
}

type Signal = fn(&Capture) -> bool;

/// Evaluated top to bottom; the first signal that fires decides.
const RULES: &[(Signal, Classification)] = &[
    // Search overlay is a shell feature, not the agent
    (search_overlay, Classification::new(AgentStatus::Idle, false)),
    // History search: hold whatever was known before
    (history_search, Classification::new(AgentStatus::Unknown, false)),
    (awaiting_decision, Classification::new(AgentStatus::Waiting, true)),
    (working, Classification::new(AgentStatus::Busy, true)),
    (at_prompt, Classification::new(AgentStatus::Idle, true)),
];

/// Engine for inferring agent status from pane content
pub struct StateInferenceEngine;

impl StateInferenceEngine {
    /// Classify a raw pane capture.
    pub fn classify(content: &str) -> Classification {
        let Some(capture) = Capture::new(content) else {
            return Classification::UNKNOWN;
        };

        RULES
            .iter()
            .find(|(signal, _)| signal(&capture))
            .map(|(_, outcome)| *outcome)
            .unwrap_or(Classification::UNKNOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(content: &str) -> (AgentStatus, bool) {
        let c = StateInferenceEngine::classify(content);
        (c.status, c.has_agent)
    }

    fn filler(n: usize) -> String {
        (0..n).map(|i| format!("output line {i}\n")).collect()
    }

    #[test]
    fn test_search_overlay_overrides_everything() {
        let content = "some stuff\n⌕ Search…\nmore stuff";
        assert_eq!(classify(content), (AgentStatus::Idle, false));

        let content = "Do you want to proceed?\n✢ Working\nesc to interrupt\n⌕";
        assert_eq!(classify(content), (AgentStatus::Idle, false));

        let content = format!("⌕ search\n{}Claude\n❯ \n/help", filler(40));
        assert_eq!(classify(&content), (AgentStatus::Idle, false));
    }

    #[test]
    fn test_history_search_holds_unknown() {
        let content = "bck-search: something\nctrl+r to toggle";
        assert_eq!(classify(content), (AgentStatus::Unknown, false));

        let content = "Do you want to proceed?\nCTRL+R to toggle";
        assert_eq!(classify(content), (AgentStatus::Unknown, false));
    }

    #[test]
    fn test_detect_waiting() {
        for content in [
            "Do you want to proceed?\n❯ Yes",
            "Press esc to cancel",
            "No, and tell Claude what to do differently",
            "Would you like to continue?",
        ] {
            assert_eq!(
                classify(content),
                (AgentStatus::Waiting, true),
                "content: {content:?}"
            );
        }
    }

    #[test]
    fn test_waiting_after_busy_wins() {
        let content = "✢ Pondering…\n12.3k tokens · thinking\nesc to interrupt\nDo you want to make this edit?\n❯ 1. Yes";
        assert_eq!(classify(content), (AgentStatus::Waiting, true));
    }

    #[test]
    fn test_stale_waiting_prompt_is_ignored() {
        // Answered prompt scrolled above the 5-line window; agent now busy.
        let content = "Do you want to proceed?\n❯ 1. Yes\nline\nline\nline\nline\nesc to interrupt";
        assert_eq!(classify(content), (AgentStatus::Busy, true));
    }

    #[test]
    fn test_waiting_window_sizes() {
        // "no, and tell claude" is trusted for 10 lines, "esc to cancel" for 5
        let content = format!("No, and tell Claude what to do differently\n{}", filler(9));
        assert_eq!(classify(&content).0, AgentStatus::Waiting);

        let content = format!("esc to cancel\n{}", filler(5));
        assert_eq!(classify(&content).0, AgentStatus::Unknown);
    }

    #[test]
    fn test_detect_busy() {
        for content in [
            "Working on it...\nesc to interrupt",
            "Processing...\nctrl+c to interrupt",
            "✢ Crunching…",
            "↓ 20.1k tokens · thought for 288s",
            "1234 tokens · thinking",
        ] {
            assert_eq!(
                classify(content),
                (AgentStatus::Busy, true),
                "content: {content:?}"
            );
        }
    }

    #[test]
    fn test_spinner_window_is_fifteen_lines() {
        let inside = format!("✢ Crunching…\n{}", filler(14));
        assert_eq!(classify(&inside).0, AgentStatus::Busy);

        let outside = format!("✢ Crunching…\n{}", filler(15));
        assert_eq!(classify(&outside).0, AgentStatus::Unknown);
    }

    #[test]
    fn test_interrupt_hint_window_is_five_lines() {
        let outside = format!("esc to interrupt\n{}", filler(5));
        assert_eq!(classify(&outside).0, AgentStatus::Unknown);
    }

    #[test]
    fn test_activity_stats_window_is_ten_lines() {
        let inside = format!("1234 tokens · thinking\n{}", filler(9));
        assert_eq!(classify(&inside), (AgentStatus::Busy, true));

        let outside = format!("1234 tokens · thinking\n{}", filler(10));
        assert_eq!(classify(&outside), (AgentStatus::Unknown, false));
    }

    #[test]
    fn test_history_search_window_is_ten_lines() {
        // A spinner below shows whether the toggle hint still masks it
        let inside = format!("ctrl+r to toggle\n{}✢ Crunching…", filler(8));
        assert_eq!(classify(&inside), (AgentStatus::Unknown, false));

        let outside = format!("ctrl+r to toggle\n{}✢ Crunching…", filler(9));
        assert_eq!(classify(&outside), (AgentStatus::Busy, true));
    }

    #[test]
    fn test_prompt_glyph_window_is_five_lines() {
        let inside = format!("Claude Code\n❯ \n{}", filler(4));
        assert_eq!(classify(&inside), (AgentStatus::Idle, true));

        let outside = format!("Claude Code\n❯ \n{}", filler(5));
        assert_eq!(classify(&outside), (AgentStatus::Unknown, false));
    }

    #[test]
    fn test_message_box_window_is_ten_lines() {
        for placeholder in ["Type a message", "Type your message"] {
            let inside = format!("Claude Code\n{placeholder}\n{}", filler(9));
            assert_eq!(classify(&inside), (AgentStatus::Idle, true), "{placeholder}");

            let outside = format!("Claude Code\n{placeholder}\n{}", filler(10));
            assert_eq!(classify(&outside), (AgentStatus::Unknown, false), "{placeholder}");
        }
    }

    #[test]
    fn test_hint_window_is_ten_lines() {
        for hint in ["/help for help", "shift+tab to cycle"] {
            let inside = format!("{hint}\n{}❯ ", filler(8));
            assert_eq!(classify(&inside), (AgentStatus::Idle, true), "{hint}");

            let outside = format!("{hint}\n{}❯ ", filler(9));
            assert_eq!(classify(&outside), (AgentStatus::Unknown, false), "{hint}");
        }
    }

    #[test]
    fn test_model_bar_window_is_five_lines() {
        for bar in ["ctx: 42%", "Opus 4", "Sonnet 4", "Haiku 3.5"] {
            let inside = format!("{bar}\n{}❯ ", filler(3));
            assert_eq!(classify(&inside), (AgentStatus::Idle, true), "{bar}");

            let outside = format!("{bar}\n{}❯ ", filler(4));
            assert_eq!(classify(&outside), (AgentStatus::Unknown, false), "{bar}");
        }
    }

    #[test]
    fn test_detect_idle() {
        let content = "Claude Code v1.0.0\n❯ type a message\n/help for commands";
        assert_eq!(classify(content), (AgentStatus::Idle, true));
    }

    #[test]
    fn test_idle_without_branding() {
        let content = format!("{}❯ \n? for shortcuts · shift+tab to cycle", filler(20));
        assert_eq!(classify(&content), (AgentStatus::Idle, true));

        let content = "❯ \nOpus 4 · ctx: 42%";
        assert_eq!(classify(content), (AgentStatus::Idle, true));
    }

    #[test]
    fn test_branding_without_prompt_is_unknown() {
        let content = "Claude said hello\nplain output";
        assert_eq!(classify(content), (AgentStatus::Unknown, false));
    }

    #[test]
    fn test_detect_unknown() {
        let content = "$ ls\nfile1.rs  file2.rs";
        assert_eq!(classify(content), (AgentStatus::Unknown, false));
    }

    #[test]
    fn test_blank_capture_is_unknown() {
        assert_eq!(classify(""), (AgentStatus::Unknown, false));
        assert_eq!(classify("\n\n   \n\t\n"), (AgentStatus::Unknown, false));
    }

    #[test]
    fn test_trailing_blank_lines_are_stripped() {
        // Without stripping, the blanks would push the hint out of the 5-line tail
        let content = "esc to interrupt\n\n\n\n\n\n\n";
        assert_eq!(classify(content), (AgentStatus::Busy, true));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(AgentStatus::Unknown.to_string(), "unknown");
        assert_eq!(AgentStatus::Idle.to_string(), "idle");
        assert_eq!(AgentStatus::Busy.to_string(), "busy");
        assert_eq!(AgentStatus::Waiting.to_string(), "waiting");
    }
}
