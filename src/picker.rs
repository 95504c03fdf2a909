use chrono::{DateTime, Local};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    DefaultTerminal, Frame,
};

use crate::app::Theme;
use crate::display;
use crate::orchestrator::{Picker, PickerEntry};

/// Full-screen picker. Takes over the terminal for the duration of one pick
/// and restores it before returning.
#[derive(Default)]
pub struct TerminalPicker {
    theme: Theme,
}

impl TerminalPicker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Picker for TerminalPicker {
    fn pick(&mut self, title: &str, entries: &[PickerEntry]) -> std::io::Result<Option<usize>> {
        if entries.is_empty() {
            return Ok(None);
        }

        let now = Local::now();
        let theme = &self.theme;
        let mut terminal = ratatui::init();
        let result = run(&mut terminal, PickerState::new(entries.len()), |frame, state| {
            render(frame, theme, title, entries, state, now)
        });
        ratatui::restore();
        result
    }

    fn pick_branch(&mut self, title: &str, branches: &[String]) -> std::io::Result<Option<usize>> {
        if branches.is_empty() {
            return Ok(None);
        }

        let theme = &self.theme;
        let mut terminal = ratatui::init();
        let state = PickerState::without_shortcut(branches.len());
        let result = run(&mut terminal, state, |frame, state| {
            render_branches(frame, theme, title, branches, state)
        });
        ratatui::restore();
        result
    }
}

/// Draw and read keys until the user picks or backs out.
fn run(
    terminal: &mut DefaultTerminal,
    mut state: PickerState,
    mut draw: impl FnMut(&mut Frame, &mut PickerState),
) -> std::io::Result<Option<usize>> {
    loop {
        terminal.draw(|frame| draw(frame, &mut state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match state.handle_key(key) {
                Some(Step::Chosen(i)) => return Ok(Some(i)),
                Some(Step::Cancelled) => return Ok(None),
                None => {}
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Chosen(usize),
    Cancelled,
}

/// Cursor over `len` entries.
struct PickerState {
    list_state: ListState,
    len: usize,
    /// `n` jumps to the last entry ("new session")
    new_shortcut: bool,
}

impl PickerState {
    fn new(len: usize) -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));
        Self {
            list_state,
            len,
            new_shortcut: true,
        }
    }

    fn without_shortcut(len: usize) -> Self {
        Self {
            new_shortcut: false,
            ..Self::new(len)
        }
    }

    fn cursor(&self) -> usize {
        self.list_state.selected().unwrap_or(0)
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<Step> {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if self.cursor() + 1 < self.len {
                    self.list_state.select(Some(self.cursor() + 1));
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.list_state.select(Some(self.cursor().saturating_sub(1)));
            }
            KeyCode::Enter => return Some(Step::Chosen(self.cursor())),
            KeyCode::Char('n') if self.new_shortcut => return Some(Step::Chosen(self.len - 1)),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Some(Step::Cancelled);
            }
            KeyCode::Char('q') | KeyCode::Esc => return Some(Step::Cancelled),
            _ => {}
        }
        None
    }
}

fn titled_list<'a>(theme: &Theme, title: &str, items: Vec<ListItem<'a>>) -> List<'a> {
    List::new(items)
        .block(
            Block::default()
                .title(Span::styled(
                    format!(" {title} "),
                    Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.dim)),
        )
        .style(Style::default().fg(theme.dim))
        .highlight_style(Style::default().fg(theme.success).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ")
}

fn render(
    frame: &mut Frame,
    theme: &Theme,
    title: &str,
    entries: &[PickerEntry],
    state: &mut PickerState,
    now: DateTime<Local>,
) {
    let list_height = entries.len() as u16 + 2;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(list_height), Constraint::Min(5)])
        .split(frame.area());

    let items: Vec<ListItem> = entries
        .iter()
        .map(|entry| ListItem::new(display::entry_label(entry, now)))
        .collect();
    let list = titled_list(theme, title, items);
    frame.render_stateful_widget(list, chunks[0], &mut state.list_state);

    if let Some(entry) = entries.get(state.cursor()) {
        render_preview(frame, theme, entry, chunks[1], now);
    }
}

fn render_branches(
    frame: &mut Frame,
    theme: &Theme,
    title: &str,
    branches: &[String],
    state: &mut PickerState,
) {
    let items: Vec<ListItem> = branches
        .iter()
        .map(|branch| ListItem::new(branch.as_str()))
        .collect();
    let list = titled_list(theme, title, items);
    frame.render_stateful_widget(list, frame.area(), &mut state.list_state);
}

fn render_preview(frame: &mut Frame, theme: &Theme, entry: &PickerEntry, area: Rect, now: DateTime<Local>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.dim));
    let inner = block.inner(area);
    let width = (inner.width as usize).max(20);
    // header + blank line
    let body_lines = (inner.height as usize).saturating_sub(2).max(3);

    let (header, body) = match entry {
        PickerEntry::Live(live) => {
            let mut body = vec![display::describe_live(live)];
            if let Some(content) = &live.pane_content {
                body.push(String::new());
                let tail: Vec<&str> = content.lines().collect();
                let skip = tail.len().saturating_sub(body_lines.saturating_sub(2));
                body.extend(tail[skip..].iter().map(|l| l.to_string()));
            }
            (format!("{} LIVE", display::INDICATOR_LIVE), body)
        }
        PickerEntry::New => (
            "[n] New session".to_string(),
            vec!["Start a fresh agent session".to_string()],
        ),
        PickerEntry::Session(session) => {
            let text = if !session.full_prompt.is_empty() {
                session.full_prompt.as_str()
            } else if !session.first_prompt.is_empty() {
                session.first_prompt.as_str()
            } else {
                "(no prompt)"
            };
            let wrapped = word_wrap(text, width);
            (display::session_header(session, now), elide(wrapped, body_lines))
        }
    };

    let mut lines = vec![
        Line::from(Span::styled(header, Style::default().fg(theme.dim))),
        Line::from(""),
    ];
    lines.extend(body.into_iter().map(|l| {
        if l == ELISION {
            Line::from(Span::styled(l, Style::default().fg(theme.dim)))
        } else {
            Line::from(Span::styled(l, Style::default().fg(theme.fg)))
        }
    }));

    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(lines), inner);
}

const ELISION: &str = "  ···";

/// Break text at word boundaries so no line exceeds `width` columns
/// (words longer than `width` stay whole). Existing line breaks are kept.
fn word_wrap(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.lines() {
        let mut current = String::new();
        let mut col = 0;
        for word in line.split_whitespace() {
            let len = word.chars().count();
            if col > 0 && col + 1 + len > width {
                out.push(std::mem::take(&mut current));
                col = 0;
            } else if col > 0 {
                current.push(' ');
                col += 1;
            }
            current.push_str(word);
            col += len;
        }
        out.push(current);
    }
    out
}

/// Keep the beginning and end of `lines` when they do not fit in `max`,
/// with a marker line between them.
fn elide(lines: Vec<String>, max: usize) -> Vec<String> {
    if lines.len() <= max {
        return lines;
    }
    let room = max.saturating_sub(1);
    let top = (room / 2).max(1);
    let bottom = room.saturating_sub(top).max(1);

    let mut out = lines[..top].to_vec();
    out.push(ELISION.to_string());
    out.extend_from_slice(&lines[lines.len() - bottom..]);
    out
}
