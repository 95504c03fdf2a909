//! Attach-or-create decisions for worktree windows.
//!
//! For a requested worktree the orchestrator combines live pane detection with
//! the conversation history, lets the user pick when there is something to pick
//! from, and then drives tmux so the right window exists with the right agent
//! session running in it.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::git::{repo_name, Vcs, VcsError, Worktree, WorktreeDirectory};
use crate::session::{snapshot, Detector, DetectorSet, LiveInfo, Session, SessionCatalog};
use crate::tmux::{Attach, Multiplexer, Naming, AGENT_PANE, DASHBOARD_WINDOW, EDITOR_PANE};

/// Commands typed into new panes
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub agent: String,
    pub editor: String,
    /// Sent to the dashboard window when the repo session is first created
    pub dashboard_command: Option<String>,
}

impl LaunchConfig {
    /// Command line starting the agent for `choice`; `None` for `Choice::Live`.
    pub fn agent_command(&self, choice: &Choice) -> Option<String> {
        match choice {
            Choice::Live => None,
            Choice::Fresh => Some(self.agent.clone()),
            Choice::Resume(id) => Some(format!("{} --resume {}", self.agent, id)),
        }
    }

    fn editor_command(&self) -> String {
        format!("{} .", self.editor)
    }
}

/// The repository being managed, identified by its primary checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoContext {
    pub root: PathBuf,
    pub name: String,
}

impl RepoContext {
    /// Resolve the primary checkout of the repository containing `cwd`.
    pub async fn discover<V: Vcs + ?Sized>(vcs: &V, cwd: &Path) -> Result<Self> {
        let root = vcs.main_repo_root(cwd).await?;
        Ok(Self {
            name: repo_name(&root),
            root,
        })
    }
}

/// What to run in a worktree's window
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    /// Attach to the window that is already running
    Live,
    /// Resume a previous conversation by id
    Resume(String),
    /// Start the agent without history
    Fresh,
}

/// Live state and history of one worktree
#[derive(Debug, Clone)]
pub struct Survey {
    pub live: LiveInfo,
    pub sessions: Vec<Session>,
}

/// One selectable line of the session picker
#[derive(Debug, Clone)]
pub enum PickerEntry {
    Live(LiveInfo),
    Session(Session),
    New,
}

impl PickerEntry {
    pub fn choice(&self) -> Choice {
        match self {
            PickerEntry::Live(_) => Choice::Live,
            PickerEntry::Session(s) => Choice::Resume(s.id.clone()),
            PickerEntry::New => Choice::Fresh,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Plan {
    /// Nothing to choose between
    Immediate(Choice),
    /// Ask the user, entries in display order
    Present(Vec<PickerEntry>),
}

/// Interactive selection among picker entries.
pub trait Picker {
    /// Index of the chosen entry, or `None` when the user backed out.
    fn pick(&mut self, title: &str, entries: &[PickerEntry]) -> std::io::Result<Option<usize>>;

    /// Index of the chosen branch, or `None` when the user backed out.
    fn pick_branch(&mut self, title: &str, branches: &[String]) -> std::io::Result<Option<usize>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The window is ready; hand the terminal over as described
    Attach(Attach),
    /// The user abandoned the picker; nothing was touched
    Cancelled,
}

/// A worktree with everything the menu shows about it
#[derive(Debug, Clone)]
pub struct WorktreeRow {
    pub worktree: Worktree,
    pub live: LiveInfo,
    pub session_count: usize,
}

/// Result of tearing down a worktree
#[derive(Debug)]
pub struct Removal {
    pub window_killed: bool,
    /// Branch deletion failed; the worktree itself is gone
    pub branch_error: Option<VcsError>,
}

pub struct Orchestrator<M> {
    mux: M,
    catalog: SessionCatalog,
    naming: Naming,
    launch: LaunchConfig,
}

impl<M: Multiplexer> Orchestrator<M> {
    pub fn new(mux: M, catalog: SessionCatalog, naming: Naming, launch: LaunchConfig) -> Self {
        Self {
            mux,
            catalog,
            naming,
            launch,
        }
    }

    pub fn mux(&self) -> &M {
        &self.mux
    }

    /// Gather live state and history for one worktree.
    pub async fn query(
        &self,
        repo: &RepoContext,
        worktree: &Worktree,
        detector: &mut Detector,
    ) -> Result<Survey> {
        let session = self.naming.session_name(&repo.name);
        let window = self.naming.window_name(&worktree.name);

        let live = detector.detect(&self.mux, &session, &window).await;
        let sessions = self.catalog.list(&worktree.path)?;

        Ok(Survey { live, sessions })
    }

    /// Decide whether the user needs to be asked.
    pub fn plan(survey: &Survey) -> Plan {
        match (survey.live.exists, survey.sessions.is_empty()) {
            (false, true) => Plan::Immediate(Choice::Fresh),
            (true, true) => Plan::Immediate(Choice::Live),
            (live, false) => {
                let mut entries = Vec::with_capacity(survey.sessions.len() + 2);
                if live {
                    entries.push(PickerEntry::Live(survey.live.clone()));
                }
                entries.extend(survey.sessions.iter().cloned().map(PickerEntry::Session));
                entries.push(PickerEntry::New);
                Plan::Present(entries)
            }
        }
    }

    /// Query, let the user choose if needed, then make the window match the choice.
    pub async fn open<P: Picker + ?Sized>(
        &self,
        repo: &RepoContext,
        worktree: &Worktree,
        detector: &mut Detector,
        picker: &mut P,
    ) -> Result<Outcome> {
        let survey = self.query(repo, worktree, detector).await?;

        let choice = match Self::plan(&survey) {
            Plan::Immediate(choice) => choice,
            Plan::Present(entries) => {
                let title = format!("{} / {}", repo.name, worktree.name);
                match picker.pick(&title, &entries)? {
                    Some(i) => match entries.get(i) {
                        Some(entry) => entry.choice(),
                        None => return Ok(Outcome::Cancelled),
                    },
                    None => {
                        tracing::info!(worktree = %worktree.name, "selection cancelled");
                        return Ok(Outcome::Cancelled);
                    }
                }
            }
        };

        let attach = self.resolve(repo, worktree, &choice).await?;
        Ok(Outcome::Attach(attach))
    }

    /// Make the worktree's window run `choice` and describe how to attach to it.
    pub async fn resolve(
        &self,
        repo: &RepoContext,
        worktree: &Worktree,
        choice: &Choice,
    ) -> Result<Attach> {
        let session = self.naming.session_name(&repo.name);
        let window = self.naming.window_name(&worktree.name);
        let target = self.naming.window_target(&repo.name, &worktree.name);
        let agent_pane = self
            .naming
            .pane_target(&repo.name, &worktree.name, AGENT_PANE);

        let Some(agent) = self.launch.agent_command(choice) else {
            tracing::info!(%target, "attaching to live window");
            return Ok(self.mux.attach_plan(&target));
        };

        if self.mux.window_exists(&session, &window).await {
            tracing::info!(%target, %agent, "relaunching agent in existing window");
            self.mux.send_keys_and_enter(&agent_pane, &agent).await?;
            return Ok(self.mux.attach_plan(&target));
        }

        self.ensure_session(&session, &repo.root).await?;

        tracing::info!(%target, path = %worktree.path.display(), "creating window");
        self.mux
            .create_window(&session, &window, &worktree.path)
            .await?;
        self.mux
            .send_keys_and_enter(
                &self.naming.pane_target(&repo.name, &worktree.name, EDITOR_PANE),
                &self.launch.editor_command(),
            )
            .await?;
        self.mux.split_pane(&target, &worktree.path).await?;
        self.mux.send_keys_and_enter(&agent_pane, &agent).await?;

        Ok(self.mux.attach_plan(&target))
    }

    /// Create the repo-level session if missing. Returns whether it was created.
    async fn ensure_session(&self, session: &str, root: &Path) -> Result<bool> {
        if self.mux.session_exists(session).await {
            return Ok(false);
        }

        tracing::info!(session, "creating session");
        self.mux
            .create_session(session, DASHBOARD_WINDOW, root)
            .await?;

        if let Some(command) = &self.launch.dashboard_command {
            let dashboard = format!("{session}:{DASHBOARD_WINDOW}");
            if let Err(e) = self.mux.send_keys_and_enter(&dashboard, command).await {
                tracing::warn!(error = %e, "could not start dashboard");
            }
        }
        Ok(true)
    }

    /// Rows for every worktree, recomputed from scratch.
    ///
    /// With `detectors` each worktree is classified by its own detector, which
    /// the caller keeps across refreshes. Without, a one-shot snapshot is used.
    pub async fn survey_all<V: Vcs>(
        &self,
        directory: &WorktreeDirectory<V>,
        repo: &RepoContext,
        mut detectors: Option<&mut DetectorSet>,
    ) -> Result<Vec<WorktreeRow>> {
        let worktrees = directory.list(&repo.root).await?;
        if let Some(set) = detectors.as_deref_mut() {
            set.retain_paths(worktrees.iter().map(|wt| wt.path.as_path()));
        }

        let session = self.naming.session_name(&repo.name);
        let mut rows = Vec::with_capacity(worktrees.len());
        for worktree in worktrees {
            let window = self.naming.window_name(&worktree.name);
            let live = match detectors.as_deref_mut() {
                Some(set) => {
                    set.for_path(&worktree.path)
                        .detect(&self.mux, &session, &window)
                        .await
                }
                None => snapshot(&self.mux, &session, &window).await,
            };
            let session_count = self.catalog.list(&worktree.path)?.len();

            rows.push(WorktreeRow {
                worktree,
                live,
                session_count,
            });
        }
        Ok(rows)
    }

    /// Ref a new worktree should start from, e.g. `origin/main`.
    ///
    /// The picker is only shown when `origin` has more than one branch.
    /// `None` means the user cancelled.
    pub async fn choose_base<V: Vcs, P: Picker + ?Sized>(
        directory: &WorktreeDirectory<V>,
        repo: &RepoContext,
        picker: &mut P,
    ) -> Result<Option<String>> {
        let branches = directory.base_candidates(&repo.root).await?;
        let branch = match branches.as_slice() {
            [only] => only,
            _ => match picker.pick_branch("Base branch (origin)", &branches)? {
                Some(i) => match branches.get(i) {
                    Some(branch) => branch,
                    None => return Ok(None),
                },
                None => {
                    tracing::debug!(repo = %repo.name, "base branch picker cancelled");
                    return Ok(None);
                }
            },
        };
        Ok(Some(format!("origin/{branch}")))
    }

    /// Merge a worktree's branch into the repository's default branch.
    /// Returns the branch merged into.
    pub async fn merge<V: Vcs>(
        &self,
        directory: &WorktreeDirectory<V>,
        repo: &RepoContext,
        worktree: &Worktree,
    ) -> Result<String> {
        if worktree.is_primary {
            return Err(Error::PrimaryWorktree { action: "merge" });
        }

        let vcs = directory.vcs();
        let target = vcs.default_branch(&repo.root).await?;
        tracing::info!(branch = %worktree.branch, %target, "merging");
        vcs.merge_branch(&repo.root, &worktree.branch, &target)
            .await?;
        Ok(target)
    }

    /// Kill the worktree's window, remove the worktree, then delete its branch.
    pub async fn remove<V: Vcs>(
        &self,
        directory: &WorktreeDirectory<V>,
        repo: &RepoContext,
        worktree: &Worktree,
        force: bool,
    ) -> Result<Removal> {
        if worktree.is_primary {
            return Err(Error::PrimaryWorktree { action: "delete" });
        }

        let session = self.naming.session_name(&repo.name);
        let window = self.naming.window_name(&worktree.name);
        let window_killed = if self.mux.window_exists(&session, &window).await {
            self.mux.kill_window(&session, &window).await?;
            true
        } else {
            false
        };

        directory.remove(&repo.root, &worktree.path, force).await?;

        let branch_error = if worktree.branch.is_empty() {
            None
        } else {
            directory
                .vcs()
                .delete_branch(&repo.root, &worktree.branch)
                .await
                .err()
        };

        Ok(Removal {
            window_killed,
            branch_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::worktree::tests::FakeVcs;
    use crate::session::live::tests::FakeMux;
    use crate::tmux::AgentStatus;
    use serde_json::json;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    /// Returns a fixed answer and remembers what it was shown
    struct ScriptedPicker {
        answer: Option<usize>,
        shown: Vec<Vec<Choice>>,
        branches_shown: Vec<Vec<String>>,
    }

    impl ScriptedPicker {
        fn answering(answer: Option<usize>) -> Self {
            Self {
                answer,
                shown: Vec::new(),
                branches_shown: Vec::new(),
            }
        }
    }

    impl Picker for ScriptedPicker {
        fn pick(&mut self, _title: &str, entries: &[PickerEntry]) -> std::io::Result<Option<usize>> {
            self.shown.push(entries.iter().map(PickerEntry::choice).collect());
            Ok(self.answer)
        }

        fn pick_branch(&mut self, _title: &str, branches: &[String]) -> std::io::Result<Option<usize>> {
            self.branches_shown.push(branches.to_vec());
            Ok(self.answer)
        }
    }

    struct Fixture {
        _projects: tempfile::TempDir,
        catalog: SessionCatalog,
        repo: RepoContext,
        worktree: Worktree,
    }

    impl Fixture {
        fn new() -> Self {
            let projects = tempfile::tempdir().unwrap();
            let catalog = SessionCatalog::new(projects.path());
            Self {
                _projects: projects,
                catalog,
                repo: RepoContext {
                    root: PathBuf::from("/git/app"),
                    name: "app".to_string(),
                },
                worktree: Worktree {
                    name: "feat-x".to_string(),
                    path: PathBuf::from("/git/.worktrees/app/feat-x"),
                    branch: "feat-x".to_string(),
                    is_primary: false,
                    ahead: 0,
                    behind: 0,
                    dirty: false,
                },
            }
        }

        fn add_session(&self, id: &str, age_secs: u64) {
            let dir = self.catalog.project_dir(&self.worktree.path);
            std::fs::create_dir_all(&dir).unwrap();
            let cwd = self.worktree.path.to_string_lossy();
            let path = dir.join(format!("{id}.jsonl"));
            std::fs::write(
                &path,
                json!({"type": "user", "cwd": cwd, "message": {"content": format!("task {id}")}})
                    .to_string(),
            )
            .unwrap();
            File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(SystemTime::now() - Duration::from_secs(age_secs))
                .unwrap();
        }

        fn orchestrator(&self, mux: FakeMux) -> Orchestrator<FakeMux> {
            Orchestrator::new(
                mux,
                self.catalog.clone(),
                Naming::default(),
                LaunchConfig {
                    agent: "claude".to_string(),
                    editor: "nvim".to_string(),
                    dashboard_command: Some("/usr/bin/parkranger".to_string()),
                },
            )
        }
    }

    fn is_creation(call: &str) -> bool {
        call.starts_with("create-") || call.starts_with("split ")
    }

    #[tokio::test]
    async fn test_busy_live_window_attaches_without_creating() {
        let fx = Fixture::new();
        let mux = FakeMux::with_window("pr-app", "feat-x");
        mux.push_capture("✢ Reading files…\nsome output\n\nesc to interrupt\n");
        let orch = fx.orchestrator(mux);

        let mut detector = Detector::new();
        let survey = orch.query(&fx.repo, &fx.worktree, &mut detector).await.unwrap();
        assert!(survey.live.exists);
        assert_eq!(survey.live.status, AgentStatus::Busy);

        let attach = orch
            .resolve(&fx.repo, &fx.worktree, &Choice::Live)
            .await
            .unwrap();
        assert_eq!(
            attach,
            Attach::Exec {
                program: "tmux".to_string(),
                args: vec!["attach-session".into(), "-t".into(), "pr-app:feat-x".into()],
            }
        );
        let calls = orch.mux().calls();
        assert!(!calls.iter().any(|c| is_creation(c) || c.starts_with("send ")), "{calls:?}");
    }

    #[tokio::test]
    async fn test_live_window_without_history_attaches_immediately() {
        let fx = Fixture::new();
        let mux = FakeMux::with_window("pr-app", "feat-x");
        mux.push_capture("Working\nesc to interrupt");
        let orch = fx.orchestrator(mux);
        let mut picker = ScriptedPicker::answering(None);

        let outcome = orch
            .open(&fx.repo, &fx.worktree, &mut Detector::new(), &mut picker)
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Attach(_)));
        assert!(picker.shown.is_empty(), "picker must not be shown");
        assert!(!orch.mux().calls().iter().any(|c| is_creation(c)));
    }

    #[tokio::test]
    async fn test_picking_live_entry_with_history_is_attach_only() {
        let fx = Fixture::new();
        fx.add_session("a1", 600);
        let mux = FakeMux::with_window("pr-app", "feat-x");
        mux.push_capture("Working\nesc to interrupt");
        let orch = fx.orchestrator(mux);
        let mut picker = ScriptedPicker::answering(Some(0));

        let outcome = orch
            .open(&fx.repo, &fx.worktree, &mut Detector::new(), &mut picker)
            .await
            .unwrap();

        assert_eq!(
            picker.shown,
            [vec![Choice::Live, Choice::Resume("a1".into()), Choice::Fresh]]
        );
        assert!(matches!(outcome, Outcome::Attach(_)));
        let calls = orch.mux().calls();
        assert!(!calls.iter().any(|c| is_creation(c) || c.starts_with("send ")), "{calls:?}");
    }

    #[tokio::test]
    async fn test_resume_creates_window_and_launches_agent() {
        let fx = Fixture::new();
        fx.add_session("a1", 3_600);
        fx.add_session("b2", 60);
        let orch = fx.orchestrator(FakeMux::default());
        let mut picker = ScriptedPicker::answering(Some(1));

        let outcome = orch
            .open(&fx.repo, &fx.worktree, &mut Detector::new(), &mut picker)
            .await
            .unwrap();

        assert_eq!(
            picker.shown,
            [vec![
                Choice::Resume("b2".into()),
                Choice::Resume("a1".into()),
                Choice::Fresh
            ]]
        );
        assert!(matches!(outcome, Outcome::Attach(Attach::Exec { .. })));
        assert_eq!(
            orch.mux().calls(),
            [
                "create-session pr-app dashboard /git/app",
                "send pr-app:dashboard /usr/bin/parkranger",
                "create-window pr-app:feat-x /git/.worktrees/app/feat-x",
                "send pr-app:feat-x.0 nvim .",
                "split pr-app:feat-x /git/.worktrees/app/feat-x",
                "send pr-app:feat-x.1 claude --resume a1",
            ]
        );
    }

    #[tokio::test]
    async fn test_nothing_to_pick_starts_fresh() {
        let fx = Fixture::new();
        let orch = fx.orchestrator(FakeMux::default());
        let mut picker = ScriptedPicker::answering(Some(0));

        orch.open(&fx.repo, &fx.worktree, &mut Detector::new(), &mut picker)
            .await
            .unwrap();

        assert!(picker.shown.is_empty());
        assert_eq!(
            orch.mux().calls().last().map(String::as_str),
            Some("send pr-app:feat-x.1 claude")
        );
    }

    #[tokio::test]
    async fn test_cancelled_pick_has_no_side_effects() {
        let fx = Fixture::new();
        fx.add_session("a1", 60);
        let orch = fx.orchestrator(FakeMux::default());
        let mut picker = ScriptedPicker::answering(None);

        let outcome = orch
            .open(&fx.repo, &fx.worktree, &mut Detector::new(), &mut picker)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Cancelled);
        assert!(orch.mux().calls().is_empty());
    }

    #[tokio::test]
    async fn test_existing_window_relaunches_in_agent_pane() {
        let fx = Fixture::new();
        let orch = fx.orchestrator(FakeMux::with_window("pr-app", "feat-x"));

        orch.resolve(&fx.repo, &fx.worktree, &Choice::Resume("a1".into()))
            .await
            .unwrap();

        assert_eq!(orch.mux().calls(), ["send pr-app:feat-x.1 claude --resume a1"]);
    }

    #[tokio::test]
    async fn test_existing_session_skips_dashboard() {
        let fx = Fixture::new();
        let mux = FakeMux::default();
        mux.sessions.lock().unwrap().insert("pr-app".to_string());
        let orch = fx.orchestrator(mux);

        orch.resolve(&fx.repo, &fx.worktree, &Choice::Fresh)
            .await
            .unwrap();

        let calls = orch.mux().calls();
        assert_eq!(calls[0], "create-window pr-app:feat-x /git/.worktrees/app/feat-x");
        assert!(!calls.iter().any(|c| c.contains("dashboard")));
    }

    #[tokio::test]
    async fn test_repeated_open_creates_one_window() {
        let fx = Fixture::new();
        let orch = fx.orchestrator(FakeMux::default());

        for _ in 0..2 {
            orch.resolve(&fx.repo, &fx.worktree, &Choice::Fresh)
                .await
                .unwrap();
        }

        let creates = orch
            .mux()
            .calls()
            .iter()
            .filter(|c| c.starts_with("create-window"))
            .count();
        assert_eq!(creates, 1);
    }

    #[tokio::test]
    async fn test_inside_tmux_switches() {
        let fx = Fixture::new();
        let mux = FakeMux {
            inside: true,
            ..FakeMux::with_window("pr-app", "feat-x")
        };
        let orch = fx.orchestrator(mux);

        let attach = orch
            .resolve(&fx.repo, &fx.worktree, &Choice::Live)
            .await
            .unwrap();
        assert_eq!(
            attach,
            Attach::Switch {
                target: "pr-app:feat-x".into()
            }
        );
    }

    #[test]
    fn test_plan_shapes() {
        let fx = Fixture::new();
        fx.add_session("a1", 60);
        let sessions = fx.catalog.list(&fx.worktree.path).unwrap();
        let live = LiveInfo {
            exists: true,
            ..Default::default()
        };

        let plan = |live: &LiveInfo, sessions: &[Session]| {
            Orchestrator::<FakeMux>::plan(&Survey {
                live: live.clone(),
                sessions: sessions.to_vec(),
            })
        };

        assert!(matches!(plan(&LiveInfo::default(), &[]), Plan::Immediate(Choice::Fresh)));
        assert!(matches!(plan(&live, &[]), Plan::Immediate(Choice::Live)));
        match plan(&LiveInfo::default(), &sessions) {
            Plan::Present(entries) => {
                let choices: Vec<_> = entries.iter().map(PickerEntry::choice).collect();
                assert_eq!(choices, [Choice::Resume("a1".into()), Choice::Fresh]);
            }
            other => panic!("expected picker, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_survey_all_reports_each_worktree() {
        let fx = Fixture::new();
        fx.add_session("a1", 60);
        let mux = FakeMux::with_window("pr-app", "feat-x");
        mux.push_capture("Claude\n❯ \n/help");
        let orch = fx.orchestrator(mux);
        let directory = WorktreeDirectory::new(FakeVcs::with_paths(&[
            "/git/app",
            "/git/.worktrees/app/feat-x",
        ]));

        let mut detectors = DetectorSet::new();
        let rows = orch
            .survey_all(&directory, &fx.repo, Some(&mut detectors))
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert!(!rows[0].live.exists);
        assert_eq!(rows[0].session_count, 0);
        assert_eq!(rows[1].live.status, AgentStatus::Idle);
        assert_eq!(rows[1].session_count, 1);
        assert_eq!(detectors.len(), 2);
    }

    #[tokio::test]
    async fn test_survey_all_without_detectors_takes_snapshots() {
        let fx = Fixture::new();
        let mux = FakeMux::with_window("pr-app", "feat-x");
        mux.push_capture("Working\nesc to interrupt");
        let orch = fx.orchestrator(mux);
        let directory = WorktreeDirectory::new(FakeVcs::with_paths(&["/git/.worktrees/app/feat-x"]));

        let rows = orch.survey_all(&directory, &fx.repo, None).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert!(rows[0].live.exists);
        assert_eq!(rows[0].live.status, AgentStatus::Busy);
    }

    #[tokio::test]
    async fn test_remove_kills_window_and_deletes_branch() {
        let fx = Fixture::new();
        let orch = fx.orchestrator(FakeMux::with_window("pr-app", "feat-x"));
        let directory = WorktreeDirectory::new(FakeVcs::default());

        let removal = orch
            .remove(&directory, &fx.repo, &fx.worktree, false)
            .await
            .unwrap();

        assert!(removal.window_killed);
        assert!(removal.branch_error.is_none());
        assert_eq!(orch.mux().calls(), ["kill-window pr-app:feat-x"]);
        assert_eq!(
            directory.vcs().calls.lock().unwrap().as_slice(),
            ["remove /git/.worktrees/app/feat-x force=false", "delete-branch feat-x"]
        );
    }

    #[tokio::test]
    async fn test_primary_worktree_is_protected() {
        let mut fx = Fixture::new();
        fx.worktree.is_primary = true;
        let orch = fx.orchestrator(FakeMux::default());
        let directory = WorktreeDirectory::new(FakeVcs::default());

        assert!(matches!(
            orch.merge(&directory, &fx.repo, &fx.worktree).await,
            Err(Error::PrimaryWorktree { action: "merge" })
        ));
        assert!(matches!(
            orch.remove(&directory, &fx.repo, &fx.worktree, true).await,
            Err(Error::PrimaryWorktree { action: "delete" })
        ));
        assert!(directory.vcs().calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_merge_targets_default_branch() {
        let fx = Fixture::new();
        let orch = fx.orchestrator(FakeMux::default());
        let directory = WorktreeDirectory::new(FakeVcs::default());

        let target = orch.merge(&directory, &fx.repo, &fx.worktree).await.unwrap();
        assert_eq!(target, "main");
        assert_eq!(
            directory.vcs().calls.lock().unwrap().as_slice(),
            ["merge feat-x main"]
        );
    }

    fn with_remotes(branches: &[&str]) -> WorktreeDirectory<FakeVcs> {
        WorktreeDirectory::new(FakeVcs {
            remote_branches: Some(branches.iter().map(|b| b.to_string()).collect()),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_choose_base_offers_default_first() {
        let fx = Fixture::new();
        let directory = with_remotes(&["dev", "main", "release"]);
        let mut picker = ScriptedPicker::answering(Some(2));

        let base = Orchestrator::<FakeMux>::choose_base(&directory, &fx.repo, &mut picker)
            .await
            .unwrap();

        assert_eq!(base.as_deref(), Some("origin/release"));
        assert_eq!(picker.branches_shown, [["main", "dev", "release"]]);
    }

    #[tokio::test]
    async fn test_choose_base_single_branch_skips_picker() {
        let fx = Fixture::new();
        let directory = with_remotes(&["trunk"]);
        let mut picker = ScriptedPicker::answering(None);

        let base = Orchestrator::<FakeMux>::choose_base(&directory, &fx.repo, &mut picker)
            .await
            .unwrap();

        assert_eq!(base.as_deref(), Some("origin/trunk"));
        assert!(picker.branches_shown.is_empty());
    }

    #[tokio::test]
    async fn test_choose_base_without_remotes_uses_default() {
        let fx = Fixture::new();
        let directory = WorktreeDirectory::new(FakeVcs::default());
        let mut picker = ScriptedPicker::answering(None);

        let base = Orchestrator::<FakeMux>::choose_base(&directory, &fx.repo, &mut picker)
            .await
            .unwrap();

        assert_eq!(base.as_deref(), Some("origin/main"));
        assert!(picker.branches_shown.is_empty());
    }

    #[tokio::test]
    async fn test_choose_base_cancel() {
        let fx = Fixture::new();
        let directory = with_remotes(&["main", "dev"]);
        let mut picker = ScriptedPicker::answering(None);

        let base = Orchestrator::<FakeMux>::choose_base(&directory, &fx.repo, &mut picker)
            .await
            .unwrap();

        assert_eq!(base, None);
        assert_eq!(picker.branches_shown.len(), 1);
    }
}
