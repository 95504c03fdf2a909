use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Records read from the head of a log before giving up on metadata
const HEAD_RECORDS: usize = 20;
const SHORT_EXCERPT: usize = 80;
const LONG_EXCERPT: usize = 500;

/// Metadata pulled from the first records of a conversation log.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct LogMeta {
    pub cwd: String,
    pub git_branch: String,
    pub first_prompt: String,
    pub full_prompt: String,
}

#[derive(Debug, Deserialize)]
struct Record {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    cwd: String,
    #[serde(rename = "gitBranch", default)]
    git_branch: String,
    // Kept loose: a malformed message must not hide the record's cwd
    #[serde(default)]
    message: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Content,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Content {
    Text(String),
    Blocks(Vec<Block>),
}

#[derive(Debug, Deserialize)]
struct Block {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Read the head of a JSONL log. Lines that are not JSON records are skipped.
pub(crate) fn read_log_meta(path: &Path) -> io::Result<LogMeta> {
    let reader = BufReader::new(File::open(path)?);
    let mut meta = LogMeta::default();

    // An unreadable line ends the scan; whatever was found so far stands
    for line in reader.lines().take(HEAD_RECORDS).map_while(Result::ok) {
        let Ok(record) = serde_json::from_str::<Record>(&line) else {
            continue;
        };

        if meta.cwd.is_empty() && !record.cwd.is_empty() {
            meta.cwd = record.cwd;
        }
        if meta.git_branch.is_empty() && !record.git_branch.is_empty() {
            meta.git_branch = record.git_branch;
        }
        if meta.first_prompt.is_empty() && record.kind == "user" {
            let text = record.message.map(message_text).unwrap_or_default();
            if !text.trim().is_empty() && !is_boilerplate(&text) {
                meta.first_prompt = excerpt(&text, SHORT_EXCERPT, true);
                meta.full_prompt = excerpt(&text, LONG_EXCERPT, false);
            }
        }
    }

    Ok(meta)
}

/// Text of a `{role, content}` message: the string itself, or the first text block.
pub(crate) fn message_text(message: Value) -> String {
    let Ok(message) = serde_json::from_value::<Message>(message) else {
        return String::new();
    };

    match message.content {
        Content::Text(text) => text,
        Content::Blocks(blocks) => blocks
            .into_iter()
            .find(|b| b.kind == "text" && !b.text.is_empty())
            .map(|b| b.text)
            .unwrap_or_default(),
    }
}

/// Messages that say nothing about what the session was for.
fn is_boilerplate(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.starts_with("[request interrupted") || lower.starts_with("resume")
}

/// Trim and cut to at most `max` chars, ending in "..." when cut.
pub(crate) fn excerpt(text: &str, max: usize, single_line: bool) -> String {
    let text = if single_line {
        text.replace('\n', " ")
    } else {
        text.to_string()
    };
    let text = text.trim();

    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_log(dir: &Path, name: &str, lines: &[String]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }

    #[test]
    fn test_message_text_string() {
        let msg = json!({"role": "user", "content": "Fix the tooltip positioning bug"});
        assert_eq!(message_text(msg), "Fix the tooltip positioning bug");
    }

    #[test]
    fn test_message_text_blocks() {
        let msg = json!({"role": "user", "content": [
            {"type": "image", "source": {}},
            {"type": "text", "text": ""},
            {"type": "text", "text": "Add tooltip component"},
            {"type": "text", "text": "second"}
        ]});
        assert_eq!(message_text(msg), "Add tooltip component");
    }

    #[test]
    fn test_message_text_unexpected_shape() {
        assert_eq!(message_text(json!(null)), "");
        assert_eq!(message_text(json!({"content": 42})), "");
    }

    #[test]
    fn test_excerpt_short() {
        assert_eq!(excerpt("hello", 80, true), "hello");
    }

    #[test]
    fn test_excerpt_cut() {
        let long = "This is a very long message that definitely exceeds the eighty character limit we set for display purposes here";
        let got = excerpt(long, 80, true);
        assert_eq!(got.chars().count(), 80);
        assert!(got.ends_with("..."));
    }

    #[test]
    fn test_excerpt_counts_chars_not_bytes() {
        let got = excerpt(&"ü".repeat(100), 10, true);
        assert_eq!(got, format!("{}...", "ü".repeat(7)));
    }

    #[test]
    fn test_excerpt_newlines() {
        assert_eq!(excerpt("line one\nline two\n", 80, true), "line one line two");
        assert_eq!(excerpt("line one\nline two\n", 500, false), "line one\nline two");
    }

    #[test]
    fn test_boilerplate() {
        assert!(is_boilerplate("[Request interrupted by user]"));
        assert!(is_boilerplate("Resume the previous task"));
        assert!(!is_boilerplate("Please resume work on the parser"));
    }

    #[test]
    fn test_boilerplate_prefix_is_not_trimmed() {
        assert!(!is_boilerplate("  resume the work"));
        assert!(!is_boilerplate("\n[Request interrupted by user]"));
    }

    #[test]
    fn test_read_log_meta() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = "/Users/u/git/thegrid/.trees/dev-1301";
        let path = write_log(
            dir.path(),
            "abc123.jsonl",
            &[
                json!({"type": "system", "cwd": cwd, "gitBranch": "dev-1301", "content": "init"}).to_string(),
                json!({"type": "user", "cwd": cwd, "message": {"role": "user", "content": "[Request interrupted by user]"}}).to_string(),
                json!({"type": "user", "cwd": cwd, "message": {"role": "user", "content": "Fix the tooltip\npositioning bug"}}).to_string(),
                json!({"type": "assistant", "cwd": cwd, "message": {"role": "assistant", "content": "On it."}}).to_string(),
            ],
        );

        let meta = read_log_meta(&path).unwrap();
        assert_eq!(meta.cwd, cwd);
        assert_eq!(meta.git_branch, "dev-1301");
        assert_eq!(meta.first_prompt, "Fix the tooltip positioning bug");
        assert_eq!(meta.full_prompt, "Fix the tooltip\npositioning bug");
    }

    #[test]
    fn test_read_log_meta_skips_garbage_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(
            dir.path(),
            "x.jsonl",
            &[
                "not json".to_string(),
                json!({"type": "user", "cwd": "/tmp/test", "message": "odd"}).to_string(),
                json!({"type": "user", "message": {"content": [{"type": "text", "text": "Hello world"}]}}).to_string(),
            ],
        );

        let meta = read_log_meta(&path).unwrap();
        assert_eq!(meta.cwd, "/tmp/test");
        assert_eq!(meta.first_prompt, "Hello world");
    }

    #[test]
    fn test_read_log_meta_only_reads_head() {
        let dir = tempfile::tempdir().unwrap();
        let mut lines: Vec<String> = (0..HEAD_RECORDS)
            .map(|_| json!({"type": "progress"}).to_string())
            .collect();
        lines.push(json!({"type": "user", "cwd": "/late"}).to_string());
        let path = write_log(dir.path(), "late.jsonl", &lines);

        assert_eq!(read_log_meta(&path).unwrap().cwd, "");
    }
}
