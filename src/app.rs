use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::actions::Action;
use crate::display;
use crate::orchestrator::WorktreeRow;
use crate::tmux::AgentStatus;

/// Theme colors
pub struct Theme {
    pub fg: Color,
    pub accent: Color,
    pub dim: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: Color::Rgb(220, 220, 220),
            accent: Color::Rgb(217, 119, 87),
            dim: Color::Rgb(100, 100, 100),
            success: Color::Rgb(80, 200, 120),
            warning: Color::Rgb(255, 193, 7),
            error: Color::Rgb(220, 53, 69),
        }
    }
}

impl Theme {
    fn status_color(&self, status: AgentStatus) -> Color {
        match status {
            AgentStatus::Busy => self.warning,
            AgentStatus::Idle => self.success,
            AgentStatus::Waiting => self.accent,
            AgentStatus::Unknown => self.dim,
        }
    }
}

/// Destructive operation awaiting a y/n answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    Merge,
    Delete,
}

/// Input mode for the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Creating,
    Confirming(Confirm),
}

/// Footer message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub is_error: bool,
}

/// Interactive worktree menu state
pub struct App {
    /// Repository name shown in the header
    pub repo_name: String,
    pub rows: Vec<WorktreeRow>,
    /// Currently selected row index
    pub list_state: ListState,
    pub notice: Option<Notice>,
    pub theme: Theme,
    pub input_mode: InputMode,
    /// Text input buffer
    pub input_buffer: String,
    /// Pending action queue
    pub pending_actions: Vec<Action>,
}

impl App {
    pub fn new(repo_name: impl Into<String>) -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        Self {
            repo_name: repo_name.into(),
            rows: Vec::new(),
            list_state,
            notice: None,
            theme: Theme::default(),
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            pending_actions: Vec::new(),
        }
    }

    pub fn selected_row(&self) -> Option<&WorktreeRow> {
        self.list_state.selected().and_then(|i| self.rows.get(i))
    }

    /// Take pending actions (drains the queue)
    pub fn take_pending_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.pending_actions)
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            is_error: false,
        });
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            is_error: true,
        });
    }

    /// Handle an action and return whether to quit
    pub fn handle_action(&mut self, action: Action) -> Result<bool> {
        match action {
            Action::KeyPress(key) => self.handle_key(key),
            Action::RowsUpdated(rows) => {
                self.set_rows(rows);
                Ok(false)
            }
            Action::Error(msg) => {
                self.error(msg);
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    /// Replace the rows, keeping the selection on the same worktree when it survives.
    fn set_rows(&mut self, rows: Vec<WorktreeRow>) {
        let selected_path = self.selected_row().map(|r| r.worktree.path.clone());
        self.rows = rows;

        let index = selected_path
            .and_then(|path| self.rows.iter().position(|r| r.worktree.path == path))
            .or_else(|| {
                self.list_state
                    .selected()
                    .map(|i| i.min(self.rows.len().saturating_sub(1)))
            });
        self.list_state.select(index);
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if self.notice.is_some() && self.input_mode == InputMode::Normal {
            self.notice = None;
        }

        match self.input_mode {
            InputMode::Normal => self.handle_normal_key(key),
            InputMode::Creating => self.handle_creating_key(key),
            InputMode::Confirming(confirm) => self.handle_confirming_key(key, confirm),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('j') | KeyCode::Down => self.next_row(),
            KeyCode::Char('k') | KeyCode::Up => self.previous_row(),
            KeyCode::Enter => {
                if let Some(row) = self.selected_row() {
                    self.pending_actions
                        .push(Action::Open(row.worktree.name.clone()));
                }
            }
            KeyCode::Char('n') => {
                self.input_mode = InputMode::Creating;
                self.input_buffer.clear();
            }
            KeyCode::Char('m') => self.confirm(Confirm::Merge),
            KeyCode::Char('d') => self.confirm(Confirm::Delete),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(true);
            }
            _ => {}
        }
        Ok(false)
    }

    fn confirm(&mut self, confirm: Confirm) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if row.worktree.is_primary {
            let verb = match confirm {
                Confirm::Merge => "merge",
                Confirm::Delete => "delete",
            };
            self.error(format!("Cannot {verb} the primary worktree"));
            return;
        }
        self.input_mode = InputMode::Confirming(confirm);
    }

    fn handle_creating_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Enter => {
                if !self.input_buffer.is_empty() {
                    let name = std::mem::take(&mut self.input_buffer);
                    self.pending_actions.push(Action::CreateWorktree(name));
                }
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Esc => {
                self.input_buffer.clear();
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Char(c) => {
                // Valid in both a branch name and a directory name
                if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    self.input_buffer.push(c);
                }
            }
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_confirming_key(&mut self, key: KeyEvent, confirm: Confirm) -> Result<bool> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                if let Some(row) = self.selected_row() {
                    let name = row.worktree.name.clone();
                    self.pending_actions.push(match confirm {
                        Confirm::Merge => Action::Merge(name),
                        Confirm::Delete => Action::Delete(name),
                    });
                }
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
            }
            _ => {}
        }
        Ok(false)
    }

    fn next_row(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) if i + 1 < self.rows.len() => i + 1,
            _ => 0,
        };
        self.list_state.select(Some(i));
    }

    fn previous_row(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => self.rows.len() - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Main content
                Constraint::Length(3), // Footer/status
            ])
            .split(frame.area());

        self.render_header(frame, chunks[0]);
        self.render_main(frame, chunks[1]);
        self.render_footer(frame, chunks[2]);

        match self.input_mode {
            InputMode::Creating => self.render_create_dialog(frame),
            InputMode::Confirming(confirm) => self.render_confirm_dialog(frame, confirm),
            InputMode::Normal => {}
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let title = Paragraph::new(Line::from(vec![
            Span::styled(
                " parkranger ",
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("│ {}", self.repo_name), Style::default().fg(self.theme.dim)),
        ]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        );
        frame.render_widget(title, area);
    }

    fn render_main(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(area);

        self.render_worktree_list(frame, chunks[0]);
        self.render_detail_pane(frame, chunks[1]);
    }

    fn render_worktree_list(&mut self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = if self.rows.is_empty() {
            vec![ListItem::new(Line::from(Span::styled(
                "  Loading worktrees...",
                Style::default().fg(self.theme.dim),
            )))]
        } else {
            self.rows
                .iter()
                .map(|row| {
                    let icon = match display::agent_status(&row.live) {
                        Some(AgentStatus::Waiting) => "? ",
                        Some(_) => "● ",
                        None if row.live.exists => "○ ",
                        None => "  ",
                    };
                    let color = display::agent_status(&row.live)
                        .map(|s| self.theme.status_color(s))
                        .unwrap_or(self.theme.dim);

                    let mut spans = vec![
                        Span::styled(icon, Style::default().fg(color)),
                        Span::styled(row.worktree.name.clone(), Style::default().fg(self.theme.fg)),
                    ];
                    if row.worktree.is_primary {
                        spans.push(Span::styled(
                            format!(" {}", display::INDICATOR_PRIMARY),
                            Style::default().fg(self.theme.accent),
                        ));
                    }
                    if row.session_count > 0 {
                        spans.push(Span::styled(
                            format!("  {}", row.session_count),
                            Style::default().fg(self.theme.dim),
                        ));
                    }
                    ListItem::new(Line::from(spans))
                })
                .collect()
        };

        let list = List::new(items)
            .block(
                Block::default()
                    .title(" Worktrees ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(self.theme.dim)),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::Rgb(50, 50, 50))
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");

        frame.render_stateful_widget(list, area, &mut self.list_state);
    }

    fn render_detail_pane(&self, frame: &mut Frame, area: Rect) {
        let label = |text: &'static str| Span::styled(text, Style::default().fg(self.theme.dim));
        let value = |text: String| Span::styled(text, Style::default().fg(self.theme.fg));

        let content = if let Some(row) = self.selected_row() {
            let wt = &row.worktree;
            let status_color = display::agent_status(&row.live)
                .map(|s| self.theme.status_color(s))
                .unwrap_or(self.theme.dim);
            let status = display::format_status(wt);

            let mut lines = vec![
                Line::from(vec![label("Path: "), value(wt.path.display().to_string())]),
                Line::from(vec![label("Branch: "), value(wt.branch.clone())]),
                Line::from(vec![
                    label("Window: "),
                    Span::styled(
                        display::describe_live(&row.live),
                        Style::default().fg(status_color),
                    ),
                ]),
                Line::from(vec![label("Sessions: "), value(row.session_count.to_string())]),
            ];
            if !status.is_empty() {
                lines.push(Line::from(vec![label("Status: "), value(status)]));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Enter: open │ m: merge │ d: delete",
                Style::default().fg(self.theme.dim),
            )));
            lines
        } else {
            vec![Line::from(Span::styled(
                "No worktree selected",
                Style::default().fg(self.theme.dim),
            ))]
        };

        let detail = Paragraph::new(content).block(
            Block::default()
                .title(" Details ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        );
        frame.render_widget(detail, area);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let help_text = " q: Quit │ j/k: Navigate │ Enter: Open │ n: New │ m: Merge │ d: Delete ";

        let content = match &self.notice {
            Some(notice) => {
                let color = if notice.is_error {
                    self.theme.error
                } else {
                    self.theme.success
                };
                Line::from(Span::styled(format!(" {} ", notice.text), Style::default().fg(color)))
            }
            None => Line::from(Span::styled(help_text, Style::default().fg(self.theme.dim))),
        };

        let footer = Paragraph::new(content).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        );
        frame.render_widget(footer, area);
    }

    fn render_create_dialog(&self, frame: &mut Frame) {
        let area = centered_rect(50, 20, frame.area());

        frame.render_widget(Clear, area);

        let block = Block::default()
            .title(" New Worktree ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.accent));

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let text = vec![
            Line::from(""),
            Line::from(Span::styled(
                "Branch / worktree name:",
                Style::default().fg(self.theme.fg),
            )),
            Line::from(""),
            Line::from(Span::styled(
                format!("▶ {}_", self.input_buffer),
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Press Enter to create, Esc to cancel",
                Style::default().fg(self.theme.dim),
            )),
        ];

        frame.render_widget(Paragraph::new(text), inner);
    }

    fn render_confirm_dialog(&self, frame: &mut Frame, confirm: Confirm) {
        let area = centered_rect(50, 20, frame.area());

        frame.render_widget(Clear, area);

        let (title, color) = match confirm {
            Confirm::Merge => (" Confirm Merge ", self.theme.warning),
            Confirm::Delete => (" Confirm Delete ", self.theme.error),
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color));

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let (question, warning) = match (confirm, self.selected_row()) {
            (Confirm::Merge, Some(row)) => (
                format!("Merge '{}' into the default branch?", row.worktree.branch),
                "The merge is aborted on conflict.",
            ),
            (Confirm::Delete, Some(row)) => (
                format!("Delete worktree '{}'?", row.worktree.name),
                "The window, the worktree and its branch are removed.",
            ),
            (_, None) => ("Nothing selected".to_string(), ""),
        };

        let text = vec![
            Line::from(""),
            Line::from(Span::styled(question, Style::default().fg(self.theme.fg))),
            Line::from(""),
            Line::from(Span::styled(warning, Style::default().fg(self.theme.warning))),
            Line::from(""),
            Line::from(Span::styled(
                "Press 'y' to confirm, 'n' or Esc to cancel",
                Style::default().fg(self.theme.dim),
            )),
        ];

        frame.render_widget(Paragraph::new(text), inner);
    }
}

/// Helper function to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
