use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::tmux::{AgentStatus, Multiplexer, StateInferenceEngine, AGENT_PANE};

/// Lines captured from the bottom of the agent pane
const CAPTURE_LINES: usize = 30;

/// Point-in-time view of a worktree's tmux window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveInfo {
    /// The worktree's window exists
    pub exists: bool,
    /// The agent's UI was recognised in the agent pane
    pub has_agent: bool,
    pub status: AgentStatus,
    /// Raw capture, for previews
    pub pane_content: Option<String>,
}

type Fingerprint = [u8; 32];

fn fingerprint(content: &str) -> Fingerprint {
    Sha256::digest(content.as_bytes()).into()
}

/// Stateful detection for one worktree.
///
/// Between polls it remembers the fingerprint of the last capture, so an
/// inconclusive capture whose content keeps changing is read as the agent
/// streaming output. Keep one per worktree; never reuse across worktrees.
#[derive(Debug, Default)]
pub struct Detector {
    previous: Option<Fingerprint>,
}

impl Detector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn detect<M: Multiplexer + ?Sized>(
        &mut self,
        mux: &M,
        session: &str,
        window: &str,
    ) -> LiveInfo {
        let Some(content) = capture(mux, session, window).await else {
            return LiveInfo::default();
        };
        if content.is_empty() {
            return LiveInfo {
                exists: true,
                ..Default::default()
            };
        }

        let info = self.observe(content);
        tracing::trace!(session, window, status = %info.status, "detected");
        info
    }

    /// Classify a capture and fold it into the change-tracking state.
    fn observe(&mut self, content: String) -> LiveInfo {
        let mut result = StateInferenceEngine::classify(&content);
        let hash = fingerprint(&content);

        if result.status == AgentStatus::Unknown
            && self.previous.is_some_and(|prev| prev != hash)
        {
            tracing::debug!("pane changed without a recognised pattern, assuming busy");
            result.status = AgentStatus::Busy;
            result.has_agent = true;
        }

        self.previous = Some(hash);

        LiveInfo {
            exists: true,
            has_agent: result.has_agent,
            status: result.status,
            pane_content: Some(content),
        }
    }
}

/// One-shot detection without change tracking.
pub async fn snapshot<M: Multiplexer + ?Sized>(mux: &M, session: &str, window: &str) -> LiveInfo {
    let Some(content) = capture(mux, session, window).await else {
        return LiveInfo::default();
    };
    if content.is_empty() {
        return LiveInfo {
            exists: true,
            ..Default::default()
        };
    }

    let result = StateInferenceEngine::classify(&content);
    LiveInfo {
        exists: true,
        has_agent: result.has_agent,
        status: result.status,
        pane_content: Some(content),
    }
}

/// `None` when the window is missing; "" when it exists but nothing was readable.
async fn capture<M: Multiplexer + ?Sized>(mux: &M, session: &str, window: &str) -> Option<String> {
    if !mux.window_exists(session, window).await {
        return None;
    }

    let target = format!("{session}:{window}.{AGENT_PANE}");
    match mux.capture_pane_trailing(&target, CAPTURE_LINES).await {
        Ok(content) => Some(content),
        Err(e) => {
            tracing::debug!(%target, error = %e, "capture failed");
            Some(String::new())
        }
    }
}

/// Detectors owned by a single poller, one per worktree path.
#[derive(Debug, Default)]
pub struct DetectorSet {
    detectors: HashMap<PathBuf, Detector>,
}

impl DetectorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The detector for `path`, created on first use.
    pub fn for_path(&mut self, path: &Path) -> &mut Detector {
        self.detectors.entry(path.to_path_buf()).or_default()
    }

    /// Drop detectors for worktrees that no longer exist.
    pub fn retain_paths<'a>(&mut self, live: impl IntoIterator<Item = &'a Path>) {
        let keep: Vec<&Path> = live.into_iter().collect();
        self.detectors.retain(|path, _| keep.contains(&path.as_path()));
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}
