//! Application state and key handling for the TUI.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use todaytasks_core::command::{self, NoteTarget};
use todaytasks_core::{AppContext, Directive, Outcome, Selection, ViewMode};

/// Which screen is showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Main,
    /// Notes of a ticket, a subtask or a calendar day
    Notes(NoteTarget),
}

/// Main application state.
pub struct App {
    /// Shared with the background workers
    pub ctx: Arc<AppContext>,
    pub screen: Screen,
    /// Command line being typed
    pub input: String,
    /// Highlighted subtask on the main screen
    pub selected_subtask: Option<usize>,
    /// Highlighted note on a notes screen
    pub selected_note: Option<usize>,
    pub show_help: bool,
    /// Status line message from the last command
    pub notice: Option<String>,
    pub should_quit: bool,
    /// Set by the `login` command; the main loop suspends the UI for it
    pub login_requested: bool,
}

impl App {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            screen: Screen::Main,
            input: String::new(),
            selected_subtask: None,
            selected_note: None,
            show_help: false,
            notice: None,
            should_quit: false,
            login_requested: false,
        }
    }

    pub fn view_mode(&self) -> ViewMode {
        match &self.screen {
            Screen::Main => ViewMode::Main,
            Screen::Notes(NoteTarget::Day(_)) => ViewMode::DailyNotes,
            Screen::Notes(_) => ViewMode::EntityNotes,
        }
    }

    pub fn selection(&self) -> Selection {
        Selection {
            subtask: self.selected_subtask,
            note: self.selected_note,
        }
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    /// Handle a key press.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        match self.screen {
            Screen::Main => self.handle_main_key(key),
            Screen::Notes(_) => self.handle_notes_key(key),
        }
    }

    fn handle_main_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.submit(),
            KeyCode::Down => {
                let count = self.ctx.snapshot().visible_subtasks().len();
                self.selected_subtask = step_down(self.selected_subtask, count);
            }
            KeyCode::Up => {
                let count = self.ctx.snapshot().visible_subtasks().len();
                self.selected_subtask = step_up(self.selected_subtask, count);
            }
            KeyCode::BackTab => self.open_entity_notes(),
            KeyCode::Left => self.open_notes(NoteTarget::Day(Self::today())),
            KeyCode::Esc => self.input.clear(),
            _ => self.edit_input(key),
        }
    }

    fn handle_notes_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.submit(),
            KeyCode::Esc => self.close_notes(),
            KeyCode::Down => {
                let count = self.active_notes().len();
                self.selected_note = step_down(self.selected_note, count);
            }
            KeyCode::Up => {
                let count = self.active_notes().len();
                self.selected_note = step_up(self.selected_note, count);
            }
            KeyCode::Left | KeyCode::Right => {
                if let Screen::Notes(NoteTarget::Day(day)) = self.screen {
                    self.change_day(day, key.code == KeyCode::Left);
                }
            }
            _ => self.edit_input(key),
        }
    }

    fn edit_input(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) => self.input.push(c),
            KeyCode::Backspace => {
                self.input.pop();
            }
            _ => {}
        }
    }

    // ============================================
    // Screens
    // ============================================

    fn open_notes(&mut self, target: NoteTarget) {
        self.screen = Screen::Notes(target);
        self.selected_note = None;
        self.input.clear();
    }

    /// Notes of the selected subtask, or of the current ticket when no
    /// subtask is selected.
    fn open_entity_notes(&mut self) {
        let target = {
            let work = self.ctx.snapshot();
            let Some(ticket) = work.current_ticket.clone() else {
                return;
            };
            match self
                .selected_subtask
                .and_then(|i| work.visible_subtask_name(i))
            {
                Some(name) => NoteTarget::Subtask { ticket, name },
                None => NoteTarget::Ticket(ticket),
            }
        };
        self.open_notes(target);
    }

    fn close_notes(&mut self) {
        self.screen = Screen::Main;
        self.selected_note = None;
        self.input.clear();
    }

    /// Step the daily notes screen one day; stepping past today returns to
    /// the main screen.
    fn change_day(&mut self, day: NaiveDate, back: bool) {
        let next = if back { day.pred_opt() } else { day.succ_opt() };
        match next {
            Some(next) if next <= Self::today() => {
                self.screen = Screen::Notes(NoteTarget::Day(next));
                self.selected_note = None;
            }
            _ => self.close_notes(),
        }
    }

    /// Notes shown on the current notes screen.
    pub fn active_notes(&self) -> Vec<String> {
        match &self.screen {
            Screen::Notes(target) => target.notes(&self.ctx.snapshot()).to_vec(),
            Screen::Main => Vec::new(),
        }
    }

    // ============================================
    // Commands
    // ============================================

    /// Run the command line. On notes screens anything but a single-letter
    /// command is appended as a note; on the main screen an empty line
    /// toggles the selected subtask.
    fn submit(&mut self) {
        let line = std::mem::take(&mut self.input);
        let tokens = command::tokenize(&line);

        if let Screen::Notes(target) = &self.screen {
            if tokens.is_empty() {
                return;
            }
            let is_command = matches!(
                tokens.as_slice(),
                [one] if matches!(one.to_lowercase().as_str(), "q" | "h" | "d")
            );
            if !is_command {
                let text = line.trim();
                let target = target.clone();
                if self.ctx.update_store(|work| target.append(work, text)) {
                    self.notice = None;
                }
                return;
            }
        }

        let ticket_before = self.ctx.snapshot().current_ticket.clone();
        let outcome = self
            .ctx
            .run_command(&tokens, self.view_mode(), self.selection(), Local::now());
        self.apply(outcome);

        // A selection index means nothing against another ticket's subtasks.
        if self.ctx.snapshot().current_ticket != ticket_before {
            self.selected_subtask = None;
        }
    }

    fn apply(&mut self, outcome: Outcome) {
        self.notice = outcome.notice;
        match outcome.directive {
            Directive::Quit => self.should_quit = true,
            Directive::ToggleHelp => self.show_help = !self.show_help,
            Directive::DeleteNote => self.delete_selected_note(),
            Directive::RunLogin => self.login_requested = true,
            Directive::Mutated(_) => self.clamp_selection(),
            Directive::NoChange => {}
        }
    }

    fn delete_selected_note(&mut self) {
        let (Screen::Notes(target), Some(index)) = (&self.screen, self.selected_note) else {
            return;
        };
        let target = target.clone();
        if self.ctx.update_store(|work| target.delete(work, index)) {
            self.clamp_selection();
        }
    }

    fn clamp_selection(&mut self) {
        let work = self.ctx.snapshot();
        let subtasks = work.visible_subtasks().len();
        self.selected_subtask = self.selected_subtask.filter(|i| *i < subtasks);
        if let Screen::Notes(target) = &self.screen {
            let notes = target.notes(&work).len();
            self.selected_note = self.selected_note.filter(|i| *i < notes);
        }
    }
}

/// Next row down; past the last row wraps to no selection.
fn step_down(current: Option<usize>, count: usize) -> Option<usize> {
    match current {
        _ if count == 0 => None,
        None => Some(0),
        Some(i) if i + 1 < count => Some(i + 1),
        Some(_) => None,
    }
}

/// Next row up; above the first row wraps to no selection.
fn step_up(current: Option<usize>, count: usize) -> Option<usize> {
    match current {
        _ if count == 0 => None,
        None => Some(count - 1),
        Some(0) => None,
        Some(i) => Some(i.min(count) - 1),
    }
}
