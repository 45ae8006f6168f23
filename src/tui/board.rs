//! The four-quadrant board.
//!
//! Columns are the quadrants in board order; cards are tasks in list order.
//! Mouse drag-and-drop becomes a keyboard gesture: Space grabs the selected
//! card, the arrow keys pick a target, and `[` / `]` drop it above or below
//! the target card (Enter drops it at the end of the column). A drop maps onto
//! exactly one board move, so the keyboard follows the same reorder rule as
//! the CLI.
//!
//! Requests to the language model block. They are queued as a pending action
//! so the "working" status is on screen before the call starts.

use std::io;
use std::time::Duration;

use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};

use crate::db::today;
use crate::fields::Quadrant;
use crate::llm::ChatService;
use crate::session::Session;
use crate::task::Task;
use crate::tui::colors::{quadrant_color, text_on, GRABBED};
use crate::tui::input::InputField;
use crate::tui::utils::{centered_rect, wrap_words};

const CARD_HEIGHT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Normal,
    Adding,
    Editing,
    BrainDump,
    Brainstorm,
    ConfirmDelete,
    Detail,
    Help,
    Reply(String),
}

/// Where a grabbed card lands relative to the selected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Above,
    Below,
    End,
}

/// A model request waiting for the next frame.
#[derive(Debug, Clone)]
enum Pending {
    Organize(String),
    Brainstorm {
        quadrant: Quadrant,
        index: usize,
        template: Option<String>,
        request: String,
    },
}

pub struct BoardApp<'a> {
    session: &'a mut Session,
    service: &'a dyn ChatService,
    mode: Mode,
    selected: Quadrant,
    selected_card: usize,
    scroll_offsets: [usize; 4],
    grabbed: Option<(Quadrant, usize)>,
    input: InputField,
    /// Id of the template picked in the brainstorm prompt.
    brainstorm_template: Option<String>,
    pending: Option<Pending>,
    status_message: String,
    status_is_error: bool,
}

impl<'a> BoardApp<'a> {
    pub fn new(session: &'a mut Session, service: &'a dyn ChatService) -> Self {
        BoardApp {
            session,
            service,
            mode: Mode::Normal,
            selected: Quadrant::Triggers,
            selected_card: 0,
            scroll_offsets: [0; 4],
            grabbed: None,
            input: InputField::new(),
            brainstorm_template: None,
            pending: None,
            status_message: String::new(),
            status_is_error: false,
        }
    }

    fn lane_len(&self, quadrant: Quadrant) -> usize {
        self.session.board().lane(quadrant).len()
    }

    fn selected_task(&self) -> Option<&Task> {
        self.session.board().get(self.selected, self.selected_card)
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
        self.status_is_error = false;
    }

    fn set_error(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
        self.status_is_error = true;
    }

    fn clear_status(&mut self) {
        self.status_message.clear();
        self.status_is_error = false;
    }

    fn clamp_selection(&mut self) {
        let len = self.lane_len(self.selected);
        if len == 0 {
            self.selected_card = 0;
        } else if self.selected_card >= len {
            self.selected_card = len - 1;
        }
    }

    /// Put the selection on the task with `id`, wherever it ended up.
    fn select_task(&mut self, id: &str) {
        if let Some((quadrant, index)) = self.session.board().find(id) {
            self.selected = quadrant;
            self.selected_card = index;
        }
        self.clamp_selection();
    }

    fn select_column(&mut self, quadrant: Quadrant) {
        self.selected = quadrant;
        self.clamp_selection();
    }

    fn neighbour(&self, forward: bool) -> Option<Quadrant> {
        let index = self.selected.index();
        if forward {
            Quadrant::from_index(index + 1)
        } else {
            index.checked_sub(1).and_then(Quadrant::from_index)
        }
    }

    /// Handle one key press. Returns true when the user asked to quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return true;
        }
        match self.mode.clone() {
            Mode::Normal => return self.handle_normal_key(key),
            Mode::Adding | Mode::Editing | Mode::BrainDump | Mode::Brainstorm => self.handle_input_key(key),
            Mode::ConfirmDelete => {
                if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                    self.delete_selected();
                } else {
                    self.set_status("Delete cancelled");
                }
                self.mode = Mode::Normal;
            }
            Mode::Detail | Mode::Help | Mode::Reply(_) => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                    self.mode = Mode::Normal;
                }
            }
        }
        false
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> bool {
        self.clear_status();
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);

        match key.code {
            KeyCode::Esc if self.grabbed.is_some() => {
                self.grabbed = None;
                self.set_status("Drop cancelled");
            }
            KeyCode::Esc | KeyCode::Char('q') => return true,

            // Card movement, checked before plain navigation
            KeyCode::Left if ctrl && self.grabbed.is_none() => self.move_to_neighbour(false),
            KeyCode::Right if ctrl && self.grabbed.is_none() => self.move_to_neighbour(true),
            KeyCode::Up if shift && self.grabbed.is_none() => self.nudge(true),
            KeyCode::Down if shift && self.grabbed.is_none() => self.nudge(false),

            KeyCode::Left | KeyCode::Char('h') => {
                if let Some(q) = self.neighbour(false) {
                    self.select_column(q);
                }
            }
            KeyCode::Right | KeyCode::Char('l') => {
                if let Some(q) = self.neighbour(true) {
                    self.select_column(q);
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_card = self.selected_card.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_card + 1 < self.lane_len(self.selected) {
                    self.selected_card += 1;
                }
            }

            // Keyboard drag and drop
            KeyCode::Char(' ') => self.toggle_grab(),
            KeyCode::Char('[') if self.grabbed.is_some() => self.drop_grabbed(Placement::Above),
            KeyCode::Char(']') if self.grabbed.is_some() => self.drop_grabbed(Placement::Below),
            KeyCode::Enter if self.grabbed.is_some() => self.drop_grabbed(Placement::End),
            _ if self.grabbed.is_some() => {
                self.set_status("Holding a task: [ drop above, ] drop below, Enter drop at end, Esc cancel");
            }

            KeyCode::Enter => {
                if self.selected_task().is_some() {
                    self.mode = Mode::Detail;
                }
            }
            KeyCode::Char('a') => {
                self.input.clear();
                self.mode = Mode::Adding;
            }
            KeyCode::Char('e') => {
                if let Some(task) = self.selected_task() {
                    self.input = InputField::with_value(&task.text);
                    self.mode = Mode::Editing;
                }
            }
            KeyCode::Char('x') | KeyCode::Delete => {
                if self.selected_task().is_some() {
                    self.mode = Mode::ConfirmDelete;
                }
            }
            KeyCode::Char('c') => self.complete_selected(),
            KeyCode::Char('u') => self.undo_last(),
            KeyCode::Char('n') => {
                self.input.clear();
                self.mode = Mode::BrainDump;
            }
            KeyCode::Char('b') => {
                if self.selected_task().is_some() {
                    self.input.clear();
                    self.brainstorm_template = None;
                    self.mode = Mode::Brainstorm;
                } else {
                    self.set_status("Select a task to brainstorm about");
                }
            }
            KeyCode::Char('?') => self.mode = Mode::Help,
            _ => {}
        }
        false
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.input.clear();
                self.mode = Mode::Normal;
                self.clear_status();
            }
            KeyCode::Enter => self.submit_input(),
            KeyCode::Tab if self.mode == Mode::Brainstorm => self.cycle_template(),
            KeyCode::Backspace => self.input.handle_backspace(),
            KeyCode::Delete => self.input.handle_delete(),
            KeyCode::Left => self.input.move_cursor_left(),
            KeyCode::Right => self.input.move_cursor_right(),
            KeyCode::Home => self.input.home(),
            KeyCode::End => self.input.end(),
            KeyCode::Char(c) => self.input.handle_char(c),
            _ => {}
        }
    }

    /// Step through no template, then each template by most recent use.
    fn cycle_template(&mut self) {
        let ids: Vec<String> = self.session.templates().all().iter().map(|t| t.id.clone()).collect();
        if ids.is_empty() {
            self.set_status("No templates yet. Create one with `bsort template create`");
            return;
        }
        let next = match &self.brainstorm_template {
            None => Some(0),
            Some(id) => ids.iter().position(|i| i == id).map(|p| p + 1).filter(|&p| p < ids.len()),
        };
        self.brainstorm_template = next.map(|i| ids[i].clone());
    }

    fn submit_input(&mut self) {
        let text = self.input.value.clone();
        match self.mode {
            Mode::Adding => match self.session.add_task(self.selected, &text) {
                Ok(task) => {
                    self.input.clear();
                    self.mode = Mode::Normal;
                    self.select_task(&task.id);
                    self.set_status(format!("Added to {}", self.selected.display_name()));
                }
                // Keep the text so it can be fixed
                Err(e) => self.set_error(e.to_string()),
            },
            Mode::Editing => {
                let index = self.selected_card;
                if self.input.is_blank() {
                    self.set_status("Empty text discarded, task unchanged");
                } else {
                    match self.session.edit_task(self.selected, index, &text) {
                        Ok(true) => self.set_status("Task updated"),
                        Ok(false) => self.set_status("No changes"),
                        Err(e) => self.set_error(format!("Error saving: {}", e)),
                    }
                }
                self.input.clear();
                self.mode = Mode::Normal;
            }
            Mode::BrainDump => {
                if self.input.is_blank() {
                    self.set_error("Please enter some thoughts first");
                    return;
                }
                self.pending = Some(Pending::Organize(text));
                self.set_status(format!("Organizing with {}...", self.session.model()));
            }
            Mode::Brainstorm => {
                self.pending = Some(Pending::Brainstorm {
                    quadrant: self.selected,
                    index: self.selected_card,
                    template: self.brainstorm_template.clone(),
                    request: text,
                });
                self.set_status("Thinking...");
            }
            _ => {}
        }
    }

    /// Run a queued model request. Failures leave the prompt open with the
    /// typed text intact.
    fn run_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        match pending {
            Pending::Organize(text) => match self.session.organize(&text, self.service) {
                Ok(organized) => {
                    self.input.clear();
                    self.mode = Mode::Normal;
                    self.clamp_selection();
                    self.set_status(format!("Organized {} task(s)", organized.added));
                }
                Err(e) => self.set_error(format!("Error: {}", e)),
            },
            Pending::Brainstorm { quadrant, index, template, request } => {
                match self.session.brainstorm(quadrant, index, template.as_deref(), &request, self.service) {
                    Ok(reply) => {
                        self.input.clear();
                        self.clear_status();
                        self.mode = Mode::Reply(reply);
                    }
                    Err(e) => self.set_error(format!("Error: {}", e)),
                }
            }
        }
    }

    fn delete_selected(&mut self) {
        match self.session.delete_task(self.selected, self.selected_card) {
            Ok(Some(task)) => self.set_status(format!("Deleted: {}", task.text)),
            Ok(None) => {}
            Err(e) => self.set_error(format!("Error saving: {}", e)),
        }
        self.clamp_selection();
    }

    fn complete_selected(&mut self) {
        match self.session.complete_task(self.selected, self.selected_card) {
            Ok(Some(record)) => self.set_status(format!("Completed: {} (u to undo)", record.text)),
            Ok(None) => {}
            Err(e) => self.set_error(format!("Error saving: {}", e)),
        }
        self.clamp_selection();
    }

    fn undo_last(&mut self) {
        let Some(id) = self.session.completed().iter().map(|r| r.id).max() else {
            self.set_status("Nothing to undo");
            return;
        };
        match self.session.undo_completed(id) {
            Ok(task) => {
                self.select_task(&task.id);
                self.set_status(format!("Restored: {}", task.text));
            }
            Err(e) => self.set_error(e.to_string()),
        }
    }

    fn toggle_grab(&mut self) {
        if self.grabbed.take().is_some() {
            self.set_status("Drop cancelled");
            return;
        }
        if self.selected_task().is_some() {
            self.grabbed = Some((self.selected, self.selected_card));
            self.set_status("Grabbed: move to a target, then [ above, ] below, Enter at end");
        }
    }

    fn drop_grabbed(&mut self, placement: Placement) {
        let Some((from, from_index)) = self.grabbed.take() else {
            return;
        };
        let Some(id) = self.session.board().get(from, from_index).map(|t| t.id.clone()) else {
            return;
        };
        let target = match placement {
            Placement::End => None,
            _ if self.lane_len(self.selected) == 0 => None,
            _ => Some(self.selected_card),
        };
        let above = placement == Placement::Above;

        match self.session.move_across(from, from_index, self.selected, target, above) {
            Ok(true) => {
                self.select_task(&id);
                self.set_status(format!("Moved to {}", self.selected.display_name()));
            }
            Ok(false) => {
                self.select_task(&id);
                self.set_status("Nothing moved");
            }
            Err(e) => self.set_error(format!("Error saving: {}", e)),
        }
    }

    /// Move the selected card one place up or down its own column.
    fn nudge(&mut self, up: bool) {
        let len = self.lane_len(self.selected);
        let from = self.selected_card;
        if len == 0 || (up && from == 0) || (!up && from + 1 >= len) {
            return;
        }
        let to = if up { from - 1 } else { from + 1 };
        let Some(id) = self.selected_task().map(|t| t.id.clone()) else {
            return;
        };
        match self.session.move_within(self.selected, from, to, up) {
            Ok(_) => self.select_task(&id),
            Err(e) => self.set_error(format!("Error saving: {}", e)),
        }
    }

    /// Append the selected card to the next column left or right.
    fn move_to_neighbour(&mut self, forward: bool) {
        let Some(target) = self.neighbour(forward) else {
            return;
        };
        let Some(id) = self.selected_task().map(|t| t.id.clone()) else {
            return;
        };
        match self.session.move_across(self.selected, self.selected_card, target, None, false) {
            Ok(true) => {
                self.select_task(&id);
                self.set_status(format!("Moved task to {}", target.display_name()));
            }
            Ok(false) => {}
            Err(e) => self.set_error(format!("Error saving: {}", e)),
        }
    }

    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Board
                Constraint::Length(1), // Status bar
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);
        self.render_board(f, chunks[1]);
        self.render_status_bar(f, chunks[2]);

        match &self.mode {
            Mode::Adding | Mode::Editing | Mode::BrainDump | Mode::Brainstorm => self.render_input_popup(f),
            Mode::ConfirmDelete => self.render_confirm_popup(f),
            Mode::Detail => self.render_detail_popup(f),
            Mode::Help => self.render_help_popup(f),
            Mode::Reply(reply) => self.render_text_popup(f, "Brainstorm (Enter to close)", reply),
            Mode::Normal => {}
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let done_today = self
            .session
            .completed()
            .iter()
            .filter(|r| r.completed_date == today())
            .count();
        let context = format!(
            "User: {}  Model: {}  Tasks: {}  Done today: {}",
            self.session.user(),
            self.session.model(),
            self.session.board().total(),
            done_today
        );
        let header = Paragraph::new(Line::from(vec![
            Span::styled("BRAINSORT", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(context, Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC)),
        ]))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
        f.render_widget(header, area);
    }

    fn render_board(&mut self, f: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Percentage(25); 4])
            .split(area);

        for quadrant in Quadrant::ALL {
            self.render_column(f, columns[quadrant.index()], quadrant);
        }
    }

    fn render_column(&mut self, f: &mut Frame, area: Rect, quadrant: Quadrant) {
        let is_selected = quadrant == self.selected;
        let color = quadrant_color(quadrant);
        let border_style = if is_selected {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let len = self.lane_len(quadrant);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("{} ({})", quadrant.display_name(), len))
            .border_style(border_style);
        let inner = block.inner(area);
        f.render_widget(block, area);

        if len == 0 {
            let hint = Paragraph::new(quadrant.description())
                .style(Style::default().fg(Color::DarkGray))
                .wrap(Wrap { trim: true });
            f.render_widget(hint, inner);
            return;
        }

        let available_height = inner.height as usize;
        let visible_cards = (available_height / CARD_HEIGHT).max(1);
        let column = quadrant.index();

        let scroll_offset = if is_selected {
            let start = self.scroll_offsets[column];
            if self.selected_card < start {
                self.selected_card
            } else if self.selected_card >= start + visible_cards {
                self.selected_card + 1 - visible_cards
            } else {
                start
            }
        } else {
            self.scroll_offsets[column].min(len.saturating_sub(1))
        };
        self.scroll_offsets[column] = scroll_offset;

        let mut current_y = 0;
        let mut rendered = 0;
        for (index, task) in self.session.board().lane(quadrant).iter().enumerate().skip(scroll_offset) {
            if current_y + CARD_HEIGHT > available_height {
                break;
            }
            let card_area = Rect {
                x: inner.x,
                y: inner.y + current_y as u16,
                width: inner.width,
                height: CARD_HEIGHT as u16,
            };
            let is_grabbed = self.grabbed == Some((quadrant, index));
            let is_cursor = is_selected && index == self.selected_card;
            self.render_card(f, card_area, task, quadrant, is_cursor, is_grabbed);
            current_y += CARD_HEIGHT;
            rendered += 1;
        }

        if scroll_offset > 0 {
            let indicator = Paragraph::new(format!("▲ +{} above", scroll_offset)).style(Style::default().fg(Color::Cyan));
            f.render_widget(indicator, Rect { x: inner.x, y: inner.y, width: inner.width, height: 1 });
        }
        let remaining = len.saturating_sub(scroll_offset + rendered);
        if remaining > 0 && inner.height > 0 {
            let indicator = Paragraph::new(format!("▼ +{} below", remaining)).style(Style::default().fg(Color::Cyan));
            f.render_widget(
                indicator,
                Rect { x: inner.x, y: inner.y + inner.height - 1, width: inner.width, height: 1 },
            );
        }
    }

    fn render_card(&self, f: &mut Frame, area: Rect, task: &Task, quadrant: Quadrant, is_cursor: bool, is_grabbed: bool) {
        let color = quadrant_color(quadrant);
        let style = if is_grabbed {
            Style::default().bg(GRABBED).fg(text_on(GRABBED)).add_modifier(Modifier::BOLD)
        } else if is_cursor {
            Style::default().bg(color).fg(text_on(color)).add_modifier(Modifier::BOLD)
        } else {
            Style::default().bg(Color::DarkGray)
        };

        let mut block = Block::default().borders(Borders::ALL);
        if is_cursor && self.grabbed.is_some() && !is_grabbed {
            block = block.title("[ above | ] below");
        }

        let width = area.width.saturating_sub(2) as usize;
        let lines: Vec<Line> = wrap_words(&task.text, width, CARD_HEIGHT - 2)
            .into_iter()
            .map(Line::from)
            .collect();

        f.render_widget(Paragraph::new(lines).block(block).style(style), area);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let text = if !self.status_message.is_empty() {
            self.status_message.clone()
        } else if self.grabbed.is_some() {
            "[: Drop above | ]: Drop below | Enter: Drop at end | Esc: Cancel".to_string()
        } else {
            "a: Add | e: Edit | x: Delete | c: Complete | u: Undo | Space: Grab | n: Brain dump | b: Brainstorm | ?: Help | q: Quit"
                .to_string()
        };
        let (bg, fg) = if self.status_is_error {
            (Color::Red, Color::White)
        } else {
            let color = quadrant_color(self.selected);
            (color, text_on(color))
        };
        f.render_widget(Paragraph::new(text).style(Style::default().bg(bg).fg(fg)), area);
    }

    fn render_input_popup(&self, f: &mut Frame) {
        let title = match self.mode {
            Mode::Adding => format!("Add to {} (Enter to save, Esc to cancel)", self.selected.display_name()),
            Mode::Editing => "Edit task (Enter to save, Esc to cancel)".to_string(),
            Mode::BrainDump => "Brain dump: what's on your mind? (Enter to organize)".to_string(),
            _ => "Ask about this task (Enter to send, Tab: template)".to_string(),
        };
        let area = centered_rect(70, 25, f.area());
        let (before, after) = self.input.split_at_cursor();
        let mut chars = after.chars();
        let under = chars.next().map(String::from).unwrap_or_else(|| " ".to_string());
        let rest: String = chars.collect();

        let mut lines = vec![Line::from(vec![
            Span::raw(before.to_string()),
            Span::styled(under, Style::default().add_modifier(Modifier::REVERSED)),
            Span::raw(rest),
        ])];
        if self.mode == Mode::Brainstorm {
            lines.push(Line::from(""));
            let picked = self
                .brainstorm_template
                .as_deref()
                .and_then(|id| self.session.templates().get(id));
            match picked {
                Some(t) => {
                    lines.push(Line::from(Span::styled(
                        format!("Template: {}", t.name),
                        Style::default().add_modifier(Modifier::BOLD),
                    )));
                    if !t.description.is_empty() {
                        lines.push(Line::from(Span::styled(
                            t.description.clone(),
                            Style::default().fg(Color::Gray),
                        )));
                    }
                }
                None => lines.push(Line::from(Span::styled(
                    "Template: none",
                    Style::default().fg(Color::DarkGray),
                ))),
            }
        }
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(quadrant_color(self.selected)).add_modifier(Modifier::BOLD));

        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new(lines).block(block).wrap(Wrap { trim: false }).style(Style::default().bg(Color::Black)),
            area,
        );
    }

    fn render_confirm_popup(&self, f: &mut Frame) {
        let text = self.selected_task().map(|t| t.text.clone()).unwrap_or_default();
        self.render_text_popup(f, "Delete this task? (y/N)", &text);
    }

    fn render_detail_popup(&self, f: &mut Frame) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let created = task.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        let mut text = format!(
            "{}\n\nQuadrant: {} ({})\nCreated:  {}\nId:       {}",
            task.text,
            self.selected.display_name(),
            self.selected.description(),
            created,
            task.id
        );
        if let Some(dump) = self.session.dump_for(task) {
            text.push_str(&format!("\n\nFrom brain dump:\n{}", dump.brain_dump));
        }
        self.render_text_popup(f, "Task Details (Enter to close)", &text);
    }

    fn render_help_popup(&self, f: &mut Frame) {
        let help = "\
Arrows / hjkl   Move the selection
Shift+Up/Down   Move the task up or down its column
Ctrl+Left/Right Move the task to the next column
Space           Grab the task to drag it
  [ / ]         Drop the grabbed task above / below the selected task
  Enter         Drop the grabbed task at the end of the column
  Esc           Cancel the drag
Enter           Task details
a               Add a task to this column
e               Edit the task
x / Delete      Delete the task
c               Complete the task
u               Undo the most recent completion
n               New brain dump
b               Brainstorm about the task
  Tab           Pick a template in the brainstorm prompt
q / Esc         Quit";
        self.render_text_popup(f, "Help (Enter to close)", help);
    }

    fn render_text_popup(&self, f: &mut Frame, title: &str, text: &str) {
        let area = centered_rect(80, 80, f.area());
        f.render_widget(Clear, area);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title.to_string())
            .title_alignment(Alignment::Center)
            .border_style(Style::default().fg(quadrant_color(self.selected)).add_modifier(Modifier::BOLD));
        let paragraph = Paragraph::new(text.to_string())
            .block(block)
            .wrap(Wrap { trim: false })
            .style(Style::default().bg(Color::Black));
        f.render_widget(paragraph, area);
    }

    /// Main event loop
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if self.pending.is_some() {
                self.run_pending();
                continue;
            }

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::llm::testing::CannedService;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn with_mods(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn type_text(app: &mut BoardApp, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    fn texts(session: &Session, quadrant: Quadrant) -> Vec<String> {
        session.board().lane(quadrant).iter().map(|t| t.text.clone()).collect()
    }

    fn session_with(dir: &std::path::Path, tasks: &[(Quadrant, &str)]) -> Session {
        let store = Store::open(dir).unwrap();
        let mut session = Session::open(&store, "tester", "m/x").unwrap();
        for (q, t) in tasks {
            session.add_task(*q, t).unwrap();
        }
        session
    }

    #[test]
    fn test_grab_and_drop_below_uses_reorder_rule() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(
            dir.path(),
            &[(Quadrant::Triggers, "A"), (Quadrant::Triggers, "B"), (Quadrant::Triggers, "C")],
        );
        let service = CannedService::replying("{}");
        {
            let mut app = BoardApp::new(&mut session, &service);
            app.handle_key(key(KeyCode::Char(' ')));
            app.handle_key(key(KeyCode::Down));
            app.handle_key(key(KeyCode::Down));
            app.handle_key(key(KeyCode::Char(']')));
            assert!(app.grabbed.is_none());
            assert_eq!(app.selected_card, 2);
        }
        assert_eq!(texts(&session, Quadrant::Triggers), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_drop_above_in_other_column() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(
            dir.path(),
            &[(Quadrant::Triggers, "A"), (Quadrant::Marinate, "X"), (Quadrant::Marinate, "Y")],
        );
        let service = CannedService::replying("{}");
        {
            let mut app = BoardApp::new(&mut session, &service);
            app.handle_key(key(KeyCode::Char(' ')));
            app.handle_key(key(KeyCode::Right));
            app.handle_key(key(KeyCode::Down));
            app.handle_key(key(KeyCode::Char('[')));
            assert_eq!(app.selected, Quadrant::Marinate);
            assert_eq!(app.selected_card, 1);
        }
        assert!(texts(&session, Quadrant::Triggers).is_empty());
        assert_eq!(texts(&session, Quadrant::Marinate), vec!["X", "A", "Y"]);
    }

    #[test]
    fn test_drop_at_end_of_own_column_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(dir.path(), &[(Quadrant::Deepwork, "A"), (Quadrant::Deepwork, "B")]);
        let service = CannedService::replying("{}");
        {
            let mut app = BoardApp::new(&mut session, &service);
            app.select_column(Quadrant::Deepwork);
            app.handle_key(key(KeyCode::Char(' ')));
            app.handle_key(key(KeyCode::Enter));
            assert_eq!(app.mode, Mode::Normal);
        }
        assert_eq!(texts(&session, Quadrant::Deepwork), vec!["A", "B"]);
    }

    #[test]
    fn test_nudge_and_move_to_neighbour() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(dir.path(), &[(Quadrant::Quickwins, "A"), (Quadrant::Quickwins, "B")]);
        let service = CannedService::replying("{}");
        {
            let mut app = BoardApp::new(&mut session, &service);
            app.select_column(Quadrant::Quickwins);
            app.handle_key(with_mods(KeyCode::Down, KeyModifiers::SHIFT));
            assert_eq!(app.selected_card, 1);
            app.handle_key(with_mods(KeyCode::Left, KeyModifiers::CONTROL));
            assert_eq!(app.selected, Quadrant::Deepwork);
        }
        assert_eq!(texts(&session, Quadrant::Quickwins), vec!["B"]);
        assert_eq!(texts(&session, Quadrant::Deepwork), vec!["A"]);
    }

    #[test]
    fn test_add_keeps_text_on_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(dir.path(), &[]);
        let service = CannedService::replying("{}");
        {
            let mut app = BoardApp::new(&mut session, &service);
            app.handle_key(key(KeyCode::Char('a')));
            type_text(&mut app, "  ");
            app.handle_key(key(KeyCode::Enter));
            assert_eq!(app.mode, Mode::Adding);
            assert!(app.status_is_error);

            app.handle_key(key(KeyCode::Backspace));
            type_text(&mut app, "call mom");
            app.handle_key(key(KeyCode::Enter));
            assert_eq!(app.mode, Mode::Normal);
        }
        assert_eq!(texts(&session, Quadrant::Triggers), vec!["call mom"]);
    }

    #[test]
    fn test_edit_with_blank_text_keeps_task() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(dir.path(), &[(Quadrant::Triggers, "original")]);
        let service = CannedService::replying("{}");
        {
            let mut app = BoardApp::new(&mut session, &service);
            app.handle_key(key(KeyCode::Char('e')));
            for _ in 0.."original".len() {
                app.handle_key(key(KeyCode::Backspace));
            }
            app.handle_key(key(KeyCode::Enter));
        }
        assert_eq!(texts(&session, Quadrant::Triggers), vec!["original"]);
    }

    #[test]
    fn test_complete_undo_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(dir.path(), &[(Quadrant::Triggers, "A"), (Quadrant::Triggers, "B")]);
        let service = CannedService::replying("{}");
        {
            let mut app = BoardApp::new(&mut session, &service);
            app.handle_key(key(KeyCode::Char('c')));
            assert_eq!(app.session.completed().len(), 1);
            app.handle_key(key(KeyCode::Char('u')));
            assert!(app.session.completed().is_empty());
            // "A" came back at the end and is selected
            assert_eq!(app.selected_card, 1);

            app.handle_key(key(KeyCode::Char('x')));
            app.handle_key(key(KeyCode::Char('n')));
            assert_eq!(app.mode, Mode::Normal);
            app.handle_key(key(KeyCode::Char('x')));
            app.handle_key(key(KeyCode::Char('y')));
        }
        assert_eq!(texts(&session, Quadrant::Triggers), vec!["B"]);
    }

    #[test]
    fn test_brain_dump_runs_as_pending_request() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(dir.path(), &[]);
        let service = CannedService::replying(r#"{"quickwins":["pay rent"],"marinate":["learn piano"]}"#);
        {
            let mut app = BoardApp::new(&mut session, &service);
            app.handle_key(key(KeyCode::Char('n')));
            type_text(&mut app, "rent, piano");
            app.handle_key(key(KeyCode::Enter));
            assert!(app.pending.is_some());
            assert!(service.requests.borrow().is_empty());

            app.run_pending();
            assert_eq!(app.mode, Mode::Normal);
            assert!(app.status_message.contains("2"));
        }
        assert_eq!(texts(&session, Quadrant::Quickwins), vec!["pay rent"]);
    }

    #[test]
    fn test_brainstorm_tab_cycles_templates() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(dir.path(), &[(Quadrant::Deepwork, "write report")]);
        let outline = session
            .create_template("Outline", "Break it down", "Outline {task} for {user}", vec![])
            .unwrap();
        let risks = session.create_template("Risks", "", "What could go wrong?", vec![]).unwrap();
        let service = CannedService::replying("1. Gather data");
        {
            let mut app = BoardApp::new(&mut session, &service);
            app.selected = Quadrant::Deepwork;
            app.handle_key(key(KeyCode::Char('b')));
            assert_eq!(app.mode, Mode::Brainstorm);
            assert_eq!(app.brainstorm_template, None);

            app.handle_key(key(KeyCode::Tab));
            assert_eq!(app.brainstorm_template.as_deref(), Some(outline.id.as_str()));
            app.handle_key(key(KeyCode::Tab));
            assert_eq!(app.brainstorm_template.as_deref(), Some(risks.id.as_str()));
            app.handle_key(key(KeyCode::Tab));
            assert_eq!(app.brainstorm_template, None);
            app.handle_key(key(KeyCode::Tab));
            assert_eq!(app.brainstorm_template.as_deref(), Some(outline.id.as_str()));
            assert!(app.input.value.is_empty());

            // A template alone is enough to send
            app.handle_key(key(KeyCode::Enter));
            app.run_pending();
            assert_eq!(app.mode, Mode::Reply("1. Gather data".to_string()));
        }
        let requests = service.requests.borrow();
        assert!(requests[0].messages[1].content.contains("Outline write report for tester"));
        assert_eq!(session.templates().get(&outline.id).unwrap().use_count, 1);
    }

    #[test]
    fn test_brainstorm_tab_without_templates() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(dir.path(), &[(Quadrant::Triggers, "call Sam")]);
        let service = CannedService::replying("x");
        let mut app = BoardApp::new(&mut session, &service);
        app.handle_key(key(KeyCode::Char('b')));
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.brainstorm_template, None);
        assert!(app.status_message.contains("No templates"));
        assert_eq!(app.mode, Mode::Brainstorm);
    }

    #[test]
    fn test_failed_brain_dump_keeps_prompt_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(dir.path(), &[]);
        let service = CannedService::failing("HTTP 401");
        let mut app = BoardApp::new(&mut session, &service);
        app.handle_key(key(KeyCode::Char('n')));
        type_text(&mut app, "stuff");
        app.handle_key(key(KeyCode::Enter));
        app.run_pending();
        assert_eq!(app.mode, Mode::BrainDump);
        assert_eq!(app.input.value, "stuff");
        assert!(app.status_is_error);
    }
}
