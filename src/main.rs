use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::io::Write;
use std::os::unix::process::CommandExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod actions;
mod app;
mod config;
mod display;
mod error;
mod git;
mod orchestrator;
mod picker;
mod session;
mod tmux;

use actions::Action;
use app::App;
use config::{Config, GlobalArgs};
use error::Error;
use git::{worktree::find_by_name, GitClient, Vcs, Worktree, WorktreeDirectory};
use orchestrator::{Orchestrator, Outcome, RepoContext};
use picker::TerminalPicker;
use session::DetectorSet;
use tmux::{Attach, Multiplexer, TmuxClient};

/// How often the menu refreshes worktree rows
const REFRESH_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Parser)]
#[command(
    name = "parkranger",
    version,
    about = "Manage parallel git worktrees and the tmux windows running an agent in each"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List worktrees with window and branch status
    #[command(visible_alias = "list")]
    Ls,
    /// Open (or attach to) the tmux window of a worktree
    Open { name: String },
    /// Create a worktree on a new branch and open it
    New {
        name: String,
        /// Ref to branch from [default: origin/<default branch>]
        #[arg(long)]
        base: Option<String>,
    },
    /// Merge a worktree's branch into the default branch
    Merge {
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Remove the worktree and its branch after merging
        #[arg(long)]
        cleanup: bool,
    },
    /// Kill a worktree's window, remove the worktree and delete its branch
    #[command(visible_alias = "rm")]
    Delete {
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Everything a command needs, resolved once from the working directory
struct Shell {
    repo: RepoContext,
    directory: WorktreeDirectory<GitClient>,
    orchestrator: Arc<Orchestrator<TmuxClient>>,
    config: Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stderr keeps log lines out of the TUI's alternate screen
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("PARKRANGER_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_args(&cli.global);
    if let Err(e) = run(cli.command, config).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(command: Option<Commands>, config: Config) -> Result<()> {
    let shell = Shell::resolve(config).await?;

    match command {
        None => shell.interactive().await,
        Some(Commands::Ls) => shell.cmd_list().await,
        Some(Commands::Open { name }) => shell.cmd_open(&name).await,
        Some(Commands::New { name, base }) => shell.cmd_new(&name, base).await,
        Some(Commands::Merge { name, yes, cleanup }) => shell.cmd_merge(&name, yes, cleanup).await,
        Some(Commands::Delete { name, yes }) => shell.cmd_delete(&name, yes).await,
    }
}

impl Shell {
    async fn resolve(config: Config) -> Result<Self> {
        let cwd = std::env::current_dir().context("cannot read the working directory")?;
        let directory = WorktreeDirectory::new(GitClient::new(config.git_path.clone()));
        let repo = RepoContext::discover(directory.vcs(), &cwd).await?;
        tracing::debug!(repo = %repo.name, root = %repo.root.display(), "resolved repository");

        let orchestrator = Orchestrator::new(
            TmuxClient::new(config.tmux_path.clone()),
            config.catalog(),
            config.naming.clone(),
            config.launch.clone(),
        );

        Ok(Self {
            repo,
            directory,
            orchestrator: Arc::new(orchestrator),
            config,
        })
    }

    async fn find(&self, name: &str) -> Result<Worktree> {
        let worktrees = self.directory.list(&self.repo.root).await?;
        find_by_name(&worktrees, name)
            .cloned()
            .ok_or_else(|| Error::WorktreeNotFound(name.to_string()).into())
    }

    async fn cmd_list(&self) -> Result<()> {
        let rows = self
            .orchestrator
            .survey_all(&self.directory, &self.repo, None)
            .await?;

        println!(" {}\n", self.repo.name);
        for row in &rows {
            println!("{}", display::format_row(row));
        }
        Ok(())
    }

    async fn cmd_open(&self, name: &str) -> Result<()> {
        let worktree = self.find(name).await?;
        self.open(&worktree).await
    }

    async fn open(&self, worktree: &Worktree) -> Result<()> {
        let mut detector = session::Detector::new();
        let outcome = self
            .orchestrator
            .open(&self.repo, worktree, &mut detector, &mut TerminalPicker::new())
            .await?;

        match outcome {
            Outcome::Cancelled => Ok(()),
            Outcome::Attach(attach) => perform_attach(self.orchestrator.mux(), attach).await,
        }
    }

    async fn cmd_new(&self, name: &str, base: Option<String>) -> Result<()> {
        let base = match base {
            Some(base) => base,
            None => match self.choose_base().await? {
                Some(base) => base,
                None => return Ok(()),
            },
        };

        println!("Creating worktree {name:?} from {base}");
        let worktree = self.directory.add(&self.repo.root, name, &base).await?;
        self.open(&worktree).await
    }

    async fn cmd_merge(&self, name: &str, yes: bool, cleanup: bool) -> Result<()> {
        let worktree = self.find(name).await?;
        if worktree.is_primary {
            return Err(Error::PrimaryWorktree { action: "merge" }.into());
        }

        let target = self.directory.vcs().default_branch(&self.repo.root).await?;
        if !yes && !confirm(&format!("Merge {} into {target}?", worktree.branch))? {
            return Ok(());
        }

        println!("Merging {} into {target}", worktree.branch);
        self.orchestrator
            .merge(&self.directory, &self.repo, &worktree)
            .await?;

        if !cleanup {
            println!("Merge complete. Worktree kept.");
            return Ok(());
        }

        let removal = self
            .orchestrator
            .remove(&self.directory, &self.repo, &worktree, false)
            .await?;
        if let Some(e) = removal.branch_error {
            return Err(anyhow::Error::new(e).context(format!("delete branch {}", worktree.branch)));
        }
        println!("Merge complete. Worktree and branch deleted.");
        Ok(())
    }

    async fn cmd_delete(&self, name: &str, yes: bool) -> Result<()> {
        let worktree = self.find(name).await?;
        if worktree.is_primary {
            return Err(Error::PrimaryWorktree { action: "delete" }.into());
        }

        let question = format!("Delete worktree {name:?} and kill its tmux window?");
        if !yes && !confirm(&question)? {
            return Ok(());
        }

        println!("Removing worktree {}", worktree.path.display());
        let removal = self
            .orchestrator
            .remove(&self.directory, &self.repo, &worktree, false)
            .await?;

        if removal.window_killed {
            println!("Killed window {}", self.window_target(&worktree));
        }
        match removal.branch_error {
            Some(e) => println!("Warning: could not delete branch {}: {e}", worktree.branch),
            None => println!("Deleted branch {}", worktree.branch),
        }
        Ok(())
    }

    fn window_target(&self, worktree: &Worktree) -> String {
        self.config
            .naming
            .window_target(&self.repo.name, &worktree.name)
    }

    /// The worktree menu. Rows refresh in the background; opening a worktree
    /// hands the terminal to the session picker and then to tmux.
    async fn interactive(&self) -> Result<()> {
        let (poll_tx, mut rx) = mpsc::unbounded_channel::<Action>();

        let orchestrator = Arc::clone(&self.orchestrator);
        let repo = self.repo.clone();
        let directory = WorktreeDirectory::new(GitClient::new(self.config.git_path.clone()));
        let poller = tokio::spawn(async move {
            let mut detectors = DetectorSet::new();
            loop {
                let action = match orchestrator
                    .survey_all(&directory, &repo, Some(&mut detectors))
                    .await
                {
                    Ok(rows) => Action::RowsUpdated(rows),
                    Err(e) => Action::Error(format!("Refresh: {e}")),
                };
                if poll_tx.send(action).is_err() {
                    break;
                }
                tokio::time::sleep(REFRESH_INTERVAL).await;
            }
        });

        let mut terminal = ratatui::init();
        let mut app = App::new(self.repo.name.clone());
        let result = self.menu_loop(&mut terminal, &mut app, &mut rx).await;

        poller.abort();
        ratatui::restore();
        result
    }

    async fn menu_loop(
        &self,
        terminal: &mut DefaultTerminal,
        app: &mut App,
        rx: &mut mpsc::UnboundedReceiver<Action>,
    ) -> Result<()> {
        loop {
            terminal.draw(|f| app.render(f))?;

            for pending_action in app.take_pending_actions() {
                match pending_action {
                    Action::Open(name) => {
                        // The picker and tmux both need the real terminal
                        ratatui::restore();
                        let opened = self.open_from_menu(&name).await;
                        *terminal = ratatui::init();
                        if let Err(e) = opened {
                            app.error(format!("Open failed: {e:#}"));
                        }
                    }
                    Action::CreateWorktree(name) => {
                        // The base branch picker takes over the terminal
                        ratatui::restore();
                        let created = self.create_from_menu(&name).await;
                        *terminal = ratatui::init();
                        match created {
                            Ok(Some(wt)) => app.info(format!("Created worktree '{}'", wt.name)),
                            Ok(None) => app.info("Cancelled"),
                            Err(e) => app.error(format!("Create failed: {e:#}")),
                        }
                    }
                    Action::Merge(name) => match self.merge_from_menu(&name).await {
                        Ok(target) => app.info(format!("Merged '{name}' into {target}")),
                        Err(e) => app.error(format!("Merge failed: {e:#}")),
                    },
                    Action::Delete(name) => match self.delete_from_menu(&name).await {
                        Ok(msg) => app.info(msg),
                        Err(e) => app.error(format!("Delete failed: {e:#}")),
                    },
                    _ => {}
                }
            }

            let mut quit = false;
            while let Ok(action) = rx.try_recv() {
                quit |= app.handle_action(action)?;
            }

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        quit |= app.handle_action(Action::KeyPress(key))?;
                    }
                }
            }

            if quit {
                return Ok(());
            }
        }
    }

    /// Open from the menu; only returns when attaching did not replace the process.
    async fn open_from_menu(&self, name: &str) -> Result<()> {
        let worktree = self.find(name).await?;
        let mut detector = session::Detector::new();
        let outcome = self
            .orchestrator
            .open(&self.repo, &worktree, &mut detector, &mut TerminalPicker::new())
            .await?;

        if let Outcome::Attach(attach) = outcome {
            perform_attach(self.orchestrator.mux(), attach).await?;
        }
        Ok(())
    }

    /// `None` when the base branch picker was cancelled.
    async fn create_from_menu(&self, name: &str) -> Result<Option<Worktree>> {
        let Some(base) = self.choose_base().await? else {
            return Ok(None);
        };
        let worktree = self.directory.add(&self.repo.root, name, &base).await?;
        Ok(Some(worktree))
    }

    async fn choose_base(&self) -> Result<Option<String>> {
        let mut picker = TerminalPicker::new();
        let base = Orchestrator::<TmuxClient>::choose_base(&self.directory, &self.repo, &mut picker)
            .await?;
        Ok(base)
    }

    async fn merge_from_menu(&self, name: &str) -> Result<String> {
        let worktree = self.find(name).await?;
        let target = self
            .orchestrator
            .merge(&self.directory, &self.repo, &worktree)
            .await?;
        Ok(target)
    }

    async fn delete_from_menu(&self, name: &str) -> Result<String> {
        let worktree = self.find(name).await?;
        let removal = self
            .orchestrator
            .remove(&self.directory, &self.repo, &worktree, false)
            .await?;

        Ok(match removal.branch_error {
            Some(e) => format!("Deleted '{name}' (branch kept: {e})"),
            None => format!("Deleted '{name}' and branch {}", worktree.branch),
        })
    }
}

/// Hand the terminal to tmux. Outside tmux this replaces the process and
/// only returns on failure.
async fn perform_attach<M: Multiplexer>(mux: &M, attach: Attach) -> Result<()> {
    match attach {
        Attach::Switch { target } => {
            tracing::info!(%target, "switching client");
            mux.switch_client(&target).await?;
            Ok(())
        }
        Attach::Exec { program, args } => {
            tracing::info!(%program, ?args, "exec attach");
            let err = std::process::Command::new(&program).args(&args).exec();
            Err(anyhow::Error::new(err).context(format!("exec {program}")))
        }
    }
}

/// y/N prompt on stdin; anything but "y" or "yes" declines.
fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
