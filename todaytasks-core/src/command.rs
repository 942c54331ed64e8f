//! Command interpreter
//!
//! [`interpret`] takes the store, one tokenized command line and the UI's
//! selection state, and returns a [`Directive`] plus an optional notice for
//! the status line. It is pure: the input store is never touched, a change
//! comes back as [`Directive::Mutated`] with a new store, and the caller
//! swaps it in under the store lock and persists it.
//!
//! | Command | Effect |
//! |---------|--------|
//! | *(empty)* | toggle done on the selected subtask |
//! | `n <name>` | start a new ticket, pausing the current one |
//! | `a <name>` | add a subtask to the current ticket |
//! | `d` | hide the selected subtask |
//! | `x` | complete the current ticket |
//! | `f` | toggle focus on the selected subtask |
//! | `focus [id]` | focus a subtask or ticket by name or number, or clear focus |
//! | `pr <url>` | link a pull request to the selected subtask |
//! | `note <text>` | note on the selected subtask or the current ticket |
//! | `p`/`k [weekday] <HH:MM> <text>` | meeting / interruption, one-off or weekly |
//! | `h` | toggle help |
//! | `q` | quit |
//! | `login` | re-authenticate with the issue tracker |
//! | *anything else* | switch to a ticket by number or name |

use crate::issues::issue_key;
use crate::store::migrate_subtasks;
use crate::translate::Translator;
use crate::types::{EventKind, OneTimeEvent, RecurringEvent, Subtask, WorkStore};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime};
use std::fmt::Display;

/// Two-letter weekday tokens, Finnish and English, Monday = 0.
pub const WEEKDAYS: [(&str, u8); 13] = [
    ("ma", 0),
    ("mo", 0),
    ("ti", 1),
    ("tu", 1),
    ("ke", 2),
    ("we", 2),
    ("to", 3),
    ("th", 3),
    ("pe", 4),
    ("fr", 4),
    ("la", 5),
    ("sa", 5),
    ("su", 6),
];

pub fn weekday_from_token(token: &str) -> Option<u8> {
    let token = token.to_lowercase();
    WEEKDAYS
        .iter()
        .find(|(name, _)| *name == token)
        .map(|(_, day)| *day)
}

/// One-off events entered up to this long after their time stay today.
const ONE_OFF_GRACE_MINUTES: i64 = 5;

/// At most this many candidates are named in an ambiguity notice.
const AMBIGUITY_LIST_LIMIT: usize = 3;

/// Which screen the command line belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    Main,
    /// Notes of one ticket or subtask
    EntityNotes,
    /// Notes of one calendar day
    DailyNotes,
}

/// Highlighted rows in the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    /// Index into [`WorkStore::visible_subtasks`]
    pub subtask: Option<usize>,
    /// Index into the notes list of the active notes view
    pub note: Option<usize>,
}

/// What the caller should do after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Quit,
    NoChange,
    ToggleHelp,
    /// Remove the selected note of the active notes view
    DeleteNote,
    /// Suspend the UI and run the issue tracker login
    RunLogin,
    /// Replace the store with this one and persist it
    Mutated(Box<WorkStore>),
}

/// Result of interpreting one command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub directive: Directive,
    /// Transient status-line message
    pub notice: Option<String>,
    /// Issue keys to fetch right away once the change is committed
    pub issue_fetches: Vec<String>,
}

impl Outcome {
    fn directive(directive: Directive) -> Self {
        Self {
            directive,
            notice: None,
            issue_fetches: Vec::new(),
        }
    }

    fn rejected(notice: String) -> Self {
        Self {
            directive: Directive::NoChange,
            notice: Some(notice),
            issue_fetches: Vec::new(),
        }
    }

    fn changed(store: WorkStore, notice: String) -> Self {
        Self {
            directive: Directive::Mutated(Box::new(store)),
            notice: Some(notice),
            issue_fetches: Vec::new(),
        }
    }

    /// The new store, when the command changed anything.
    pub fn mutated(&self) -> Option<&WorkStore> {
        match &self.directive {
            Directive::Mutated(store) => Some(store),
            _ => None,
        }
    }
}

/// Split a command line on whitespace.
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

/// Interpret one tokenized command line.
pub fn interpret(
    store: &WorkStore,
    tokens: &[&str],
    view: ViewMode,
    selection: Selection,
    now: DateTime<Local>,
    tr: &Translator,
) -> Outcome {
    let cx = Interpreter {
        store,
        selection,
        now,
        tr,
    };

    let command = tokens.first().map(|c| c.to_lowercase()).unwrap_or_default();

    if view != ViewMode::Main {
        return match command.as_str() {
            "q" => Outcome::directive(Directive::Quit),
            "h" => Outcome::directive(Directive::ToggleHelp),
            "d" if selection.note.is_some() => Outcome::directive(Directive::DeleteNote),
            _ => Outcome::rejected(tr.t("cmd_exclusively_in_main_view", &[])),
        };
    }

    if tokens.is_empty() {
        return cx.toggle_done();
    }

    let args = &tokens[1..];
    match command.as_str() {
        "q" => Outcome::directive(Directive::Quit),
        "h" => Outcome::directive(Directive::ToggleHelp),
        "login" => Outcome::directive(Directive::RunLogin),
        "n" => cx.new_task(args),
        "a" => cx.add_subtask(args),
        "d" => cx.hide_subtask(),
        "x" => cx.complete_task(),
        "f" => cx.toggle_focus(),
        "focus" => cx.focus(args),
        "pr" => cx.link_pull_request(args),
        "note" => cx.add_note(args),
        "p" => cx.add_event(EventKind::Meeting, &command, args),
        "k" => cx.add_event(EventKind::Interruption, &command, args),
        _ => cx.switch_to(tokens),
    }
}

struct Interpreter<'a> {
    store: &'a WorkStore,
    selection: Selection,
    now: DateTime<Local>,
    tr: &'a Translator,
}

impl Interpreter<'_> {
    fn t(&self, key: &str, params: &[(&str, &dyn Display)]) -> String {
        self.tr.t(key, params)
    }

    /// Current ticket and the name of the selected visible subtask.
    fn selected_subtask(&self) -> Option<(String, String)> {
        let ticket = self.store.current_ticket.clone()?;
        let name = self.store.visible_subtask_name(self.selection.subtask?)?;
        Some((ticket, name))
    }

    fn toggle_done(&self) -> Outcome {
        let Some((ticket, name)) = self.selected_subtask() else {
            return Outcome::directive(Directive::NoChange);
        };

        let mut store = self.store.clone();
        let Some(subtask) = subtask_mut(&mut store, &ticket, &name) else {
            return Outcome::directive(Directive::NoChange);
        };
        subtask.done = !subtask.done;
        let done = subtask.done;
        if done && subtask.focused {
            store.clear_focus();
        }

        let key = if done {
            "cmd_info_subtask_done"
        } else {
            "cmd_info_subtask_undone"
        };
        let notice = self.t(key, &[("name", &name)]);
        Outcome::changed(store, notice)
    }

    fn new_task(&self, args: &[&str]) -> Outcome {
        if args.is_empty() {
            return Outcome::rejected(self.t("cmd_usage_new_task", &[]));
        }
        let name = args.join(" ");
        let lowered = name.to_lowercase();

        if looks_like_url(&name) {
            return Outcome::rejected(self.t("cmd_err_task_name_is_url", &[("name", &name)]));
        }
        if self
            .store
            .current_ticket
            .as_deref()
            .is_some_and(|c| c.to_lowercase() == lowered)
        {
            return Outcome::rejected(self.t("cmd_err_task_already_active", &[("name", &name)]));
        }

        if let Some(completed) = self
            .store
            .completed_tickets
            .iter()
            .find(|t| t.to_lowercase() == lowered)
            .cloned()
        {
            let mut store = self.store.clone();
            store.pause_current();
            store.completed_tickets.remove(&completed);
            store.current_ticket = Some(completed.clone());
            store.task_start_time = Some(self.now);
            store.ensure_ticket(&completed);
            if let Some(subs) = store.sub_tasks.get_mut(&completed) {
                migrate_subtasks(subs);
            }
            let notice = self.t("cmd_info_task_reopened", &[("name", &completed)]);
            return Outcome::changed(store, notice);
        }

        if let Some(existing) = self
            .store
            .displayable_tickets()
            .into_iter()
            .find(|t| t.to_lowercase() == lowered)
        {
            let key = if self.store.is_paused(&existing) {
                "cmd_err_task_exists_paused"
            } else {
                "cmd_err_task_exists"
            };
            return Outcome::rejected(self.t(key, &[("name", &existing)]));
        }

        let mut store = self.store.clone();
        store.pause_current();
        store.current_ticket = Some(name.clone());
        store.task_start_time = Some(self.now);
        store.ensure_ticket(&name);
        let notice = self.t("cmd_info_task_started", &[("name", &name)]);
        Outcome::changed(store, notice)
    }

    fn add_subtask(&self, args: &[&str]) -> Outcome {
        let Some(ticket) = self.store.current_ticket.clone() else {
            return Outcome::rejected(self.t("cmd_err_no_active_task_for_subtask", &[]));
        };
        if args.is_empty() {
            return Outcome::rejected(self.t("cmd_usage_add_subtask", &[]));
        }
        let name = args.join(" ");
        if self
            .store
            .sub_tasks
            .get(&ticket)
            .is_some_and(|subs| subs.contains_key(&name))
        {
            return Outcome::rejected(self.t("cmd_err_subtask_exists", &[("name", &name)]));
        }

        let mut store = self.store.clone();
        store
            .sub_tasks
            .entry(ticket)
            .or_default()
            .insert(name.clone(), Subtask::default());
        let notice = self.t("cmd_info_subtask_added", &[("name", &name)]);
        let mut outcome = Outcome::changed(store, notice);
        outcome.issue_fetches.extend(issue_key(&name));
        outcome
    }

    fn hide_subtask(&self) -> Outcome {
        let Some((ticket, name)) = self.selected_subtask() else {
            return Outcome::rejected(self.t("cmd_prompt_select_subtask_to_hide", &[]));
        };

        let mut store = self.store.clone();
        let Some(subtask) = subtask_mut(&mut store, &ticket, &name) else {
            return Outcome::rejected(self.t("cmd_prompt_select_subtask_to_hide", &[]));
        };
        subtask.hidden = true;
        if subtask.focused {
            store.clear_focus();
        }
        let notice = self.t("cmd_info_subtask_hidden", &[("name", &name)]);
        Outcome::changed(store, notice)
    }

    fn complete_task(&self) -> Outcome {
        let Some(ticket) = self.store.current_ticket.clone() else {
            return Outcome::rejected(self.t("cmd_err_no_active_task_to_complete", &[]));
        };

        let mut store = self.store.clone();
        store.completed_tickets.insert(ticket.clone());
        if store.focused_ticket.as_deref() == Some(ticket.as_str()) {
            store.clear_focus();
        }
        store.ensure_ticket(&ticket);
        store.current_ticket = None;
        store.task_start_time = None;
        let notice = self.t("cmd_info_task_completed_and_hidden", &[("name", &ticket)]);
        Outcome::changed(store, notice)
    }

    fn toggle_focus(&self) -> Outcome {
        let Some((ticket, name)) = self.selected_subtask() else {
            return Outcome::rejected(self.t("cmd_prompt_select_subtask_for_focus", &[]));
        };
        let Some(subtask) = self
            .store
            .sub_tasks
            .get(&ticket)
            .and_then(|subs| subs.get(&name))
        else {
            return Outcome::rejected(self.t("cmd_prompt_select_subtask_for_focus", &[]));
        };

        let mut store = self.store.clone();
        if subtask.focused {
            store.clear_focus();
            return Outcome::changed(store, self.t("cmd_info_focus_cleared", &[]));
        }
        if subtask.done {
            return Outcome::rejected(self.t("cmd_err_cannot_focus_done", &[("name", &name)]));
        }
        store.focus_on(&ticket, Some(&name));
        let notice = self.t("cmd_info_subtask_focus_set", &[("name", &name)]);
        Outcome::changed(store, notice)
    }

    fn focus(&self, args: &[&str]) -> Outcome {
        if args.is_empty() {
            let mut store = self.store.clone();
            store.clear_focus();
            return Outcome::changed(store, self.t("cmd_info_focus_cleared", &[]));
        }
        let identifier = args.join(" ");
        let needle = identifier.to_lowercase();

        let subtask_matches: Vec<(&str, &str)> = self
            .store
            .sub_tasks
            .iter()
            .filter(|(ticket, _)| !self.store.is_completed(ticket))
            .flat_map(|(ticket, subs)| {
                subs.iter()
                    .filter(|(name, s)| {
                        !s.done && !s.hidden && name.to_lowercase().contains(&needle)
                    })
                    .map(move |(name, _)| (ticket.as_str(), name.as_str()))
            })
            .collect();

        match subtask_matches.as_slice() {
            [(ticket, name)] => {
                let mut store = self.store.clone();
                store.focus_on(ticket, Some(*name));
                let notice = self.t("cmd_info_focus_set", &[("name", &format!("{ticket} / {name}"))]);
                return Outcome::changed(store, notice);
            }
            [] => {}
            many => {
                let options = candidate_list(many.iter().map(|(_, name)| *name));
                return Outcome::rejected(
                    self.t("cmd_err_multiple_subtasks_found", &[("options", &options)]),
                );
            }
        }

        let tickets = self.store.displayable_tickets();
        let target = match identifier.trim().parse::<i64>() {
            Ok(number) => ticket_at(&tickets, number).map(str::to_string),
            Err(_) => {
                let matches: Vec<&String> = tickets
                    .iter()
                    .filter(|t| t.to_lowercase().contains(&needle))
                    .collect();
                match matches.as_slice() {
                    [one] => Some((*one).clone()),
                    [] => None,
                    many => {
                        let options = candidate_list(many.iter().map(|t| t.as_str()));
                        return Outcome::rejected(
                            self.t("cmd_err_multiple_tickets_found", &[("options", &options)]),
                        );
                    }
                }
            }
        };

        match target {
            Some(ticket) => {
                let mut store = self.store.clone();
                store.focus_on(&ticket, None);
                let notice = self.t("cmd_info_focus_set", &[("name", &ticket)]);
                Outcome::changed(store, notice)
            }
            None => Outcome::rejected(self.t("cmd_err_ticket_not_found", &[("name", &identifier)])),
        }
    }

    fn link_pull_request(&self, args: &[&str]) -> Outcome {
        if self.store.current_ticket.is_none() || self.selection.subtask.is_none() {
            return Outcome::rejected(self.t("cmd_prompt_select_subtask_for_pr", &[]));
        }
        if args.is_empty() {
            return Outcome::rejected(self.t("cmd_usage_add_pr", &[]));
        }
        let Some((ticket, name)) = self.selected_subtask() else {
            return Outcome::rejected(self.t("cmd_err_subtask_not_found", &[]));
        };

        let url = args.join(" ");
        let mut store = self.store.clone();
        let Some(subtask) = subtask_mut(&mut store, &ticket, &name) else {
            return Outcome::rejected(self.t("cmd_err_subtask_not_found", &[]));
        };
        subtask.pr_url = Some(url);
        subtask.pr_status = None;
        subtask.pr_details = None;
        let notice = self.t("cmd_info_pr_added", &[("name", &name)]);
        Outcome::changed(store, notice)
    }

    fn add_note(&self, args: &[&str]) -> Outcome {
        let Some(ticket) = self.store.current_ticket.clone() else {
            return Outcome::rejected(self.t("cmd_err_no_active_task_for_note", &[]));
        };
        if args.is_empty() {
            return Outcome::rejected(self.t("cmd_usage_add_note", &[]));
        }
        let text = args.join(" ");

        let mut store = self.store.clone();
        match self.selection.subtask {
            Some(index) => {
                let Some(name) = store.visible_subtask_name(index) else {
                    return Outcome::rejected(self.t(
                        "cmd_err_subtask_details_not_found",
                        &[("name", &(index + 1))],
                    ));
                };
                let Some(subtask) = subtask_mut(&mut store, &ticket, &name) else {
                    return Outcome::rejected(
                        self.t("cmd_err_subtask_details_not_found", &[("name", &name)]),
                    );
                };
                subtask.notes.push(text);
                let notice = self.t("cmd_info_note_added_to_subtask", &[("name", &name)]);
                Outcome::changed(store, notice)
            }
            None => {
                store.notes.entry(ticket.clone()).or_default().push(text);
                let notice = self.t("cmd_info_note_added_to_task", &[("name", &ticket)]);
                Outcome::changed(store, notice)
            }
        }
    }

    fn add_event(&self, kind: EventKind, command: &str, args: &[&str]) -> Outcome {
        let usage = || self.t("cmd_usage_add_meeting_event", &[("command", &command)]);
        if args.len() < 2 {
            return Outcome::rejected(usage());
        }
        let kind_label = self.t(kind_key(kind), &[]);

        if let Some(weekday) = weekday_from_token(args[0]) {
            if args.len() < 3 {
                return Outcome::rejected(usage());
            }
            let Some(time) = parse_time(args[1]) else {
                return Outcome::rejected(self.t("cmd_err_invalid_time", &[("time", &args[1])]));
            };
            let time = time.format("%H:%M").to_string();
            let mut store = self.store.clone();
            store.recurring_events.push(RecurringEvent {
                kind,
                weekday,
                time: time.clone(),
                details: args[2..].join(" "),
            });
            let notice = self.t(
                "cmd_info_recurring_event_added",
                &[
                    ("type", &kind_label),
                    ("day", &args[0].to_uppercase()),
                    ("time", &time),
                ],
            );
            return Outcome::changed(store, notice);
        }

        let Some(time) = parse_time(args[0]) else {
            return Outcome::rejected(self.t("cmd_err_invalid_time", &[("time", &args[0])]));
        };
        let now = self.now.naive_local();
        let mut datetime = now.date().and_time(time);
        if datetime < now - Duration::minutes(ONE_OFF_GRACE_MINUTES) {
            datetime += Duration::days(1);
        }

        let mut store = self.store.clone();
        let event = OneTimeEvent {
            datetime,
            details: args[1..].join(" "),
        };
        match kind {
            EventKind::Meeting => store.meetings.push(event),
            EventKind::Interruption => store.interruptions.push(event),
        }
        let when = datetime.format("%Y-%m-%d %H:%M").to_string();
        let notice = self.t(
            "cmd_info_event_added",
            &[("type", &kind_label), ("datetime", &when)],
        );
        Outcome::changed(store, notice)
    }

    fn switch_to(&self, tokens: &[&str]) -> Outcome {
        let identifier = tokens.join(" ");
        let tickets = self.store.displayable_tickets();

        let target = match identifier.parse::<i64>() {
            Ok(number) => match ticket_at(&tickets, number) {
                Some(ticket) => ticket.to_string(),
                None => {
                    return Outcome::rejected(self.t("cmd_err_invalid_index", &[("index", &number)]))
                }
            },
            Err(_) => {
                let needle = identifier.to_lowercase();
                let matches: Vec<&String> = tickets
                    .iter()
                    .filter(|t| t.to_lowercase().contains(&needle))
                    .collect();
                match matches.as_slice() {
                    [one] => (*one).clone(),
                    [] => {
                        return Outcome::rejected(
                            self.t("cmd_err_unknown_command_or_ticket", &[("id", &identifier)]),
                        )
                    }
                    many => {
                        let options = candidate_list(many.iter().map(|t| t.as_str()));
                        return Outcome::rejected(
                            self.t("cmd_err_multiple_tickets_found", &[("options", &options)]),
                        );
                    }
                }
            }
        };

        if self.store.current_ticket.as_deref() == Some(target.as_str()) {
            return Outcome::rejected(self.t("cmd_err_task_already_active", &[("name", &target)]));
        }

        let mut store = self.store.clone();
        store.pause_current();
        match store.paused_tasks.iter().position(|p| p.ticket == target) {
            Some(index) => {
                let mut resumed = store.paused_tasks.remove(index);
                migrate_subtasks(&mut resumed.sub_tasks);
                store.task_start_time = Some(resumed.task_start_time.unwrap_or(self.now));
                store.sub_tasks.insert(target.clone(), resumed.sub_tasks);
                store.notes.insert(target.clone(), resumed.notes);
            }
            None => {
                store.task_start_time = Some(self.now);
                store.ensure_ticket(&target);
                if let Some(subs) = store.sub_tasks.get_mut(&target) {
                    migrate_subtasks(subs);
                }
            }
        }
        store.current_ticket = Some(target.clone());
        let notice = self.t("cmd_info_switched_to_task", &[("name", &target)]);
        Outcome::changed(store, notice)
    }
}

fn subtask_mut<'s>(store: &'s mut WorkStore, ticket: &str, name: &str) -> Option<&'s mut Subtask> {
    store.sub_tasks.get_mut(ticket)?.get_mut(name)
}

fn kind_key(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Meeting => "event_kind_meeting",
        EventKind::Interruption => "event_kind_interruption",
    }
}

/// 1-based index into the displayable tickets.
fn ticket_at(tickets: &[String], number: i64) -> Option<&str> {
    let index = usize::try_from(number).ok()?.checked_sub(1)?;
    tickets.get(index).map(String::as_str)
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M").ok()
}

fn looks_like_url(name: &str) -> bool {
    let lowered = name.to_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://") || lowered.contains("://")
}

/// `'a', 'b', 'c'...` with at most three names.
fn candidate_list<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let names: Vec<&str> = names.collect();
    let mut out = names
        .iter()
        .take(AMBIGUITY_LIST_LIMIT)
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ");
    if names.len() > AMBIGUITY_LIST_LIMIT {
        out.push_str("...");
    }
    out
}

// ============================================
// Note lists
// ============================================

/// The notes list a notes view is editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteTarget {
    Ticket(String),
    Subtask { ticket: String, name: String },
    Day(NaiveDate),
}

impl NoteTarget {
    pub fn notes<'s>(&self, store: &'s WorkStore) -> &'s [String] {
        let notes = match self {
            NoteTarget::Ticket(ticket) => store.notes.get(ticket),
            NoteTarget::Subtask { ticket, name } => store
                .sub_tasks
                .get(ticket)
                .and_then(|subs| subs.get(name))
                .map(|s| &s.notes),
            NoteTarget::Day(day) => store.daily_notes.get(day),
        };
        notes.map(Vec::as_slice).unwrap_or_default()
    }

    fn notes_mut<'s>(&self, store: &'s mut WorkStore) -> Option<&'s mut Vec<String>> {
        match self {
            NoteTarget::Ticket(ticket) => Some(store.notes.entry(ticket.clone()).or_default()),
            NoteTarget::Subtask { ticket, name } => {
                subtask_mut(store, ticket, name).map(|s| &mut s.notes)
            }
            NoteTarget::Day(day) => Some(store.daily_notes.entry(*day).or_default()),
        }
    }

    /// Append a note. False when the subtask no longer exists.
    pub fn append(&self, store: &mut WorkStore, text: &str) -> bool {
        match self.notes_mut(store) {
            Some(notes) => {
                notes.push(text.to_string());
                true
            }
            None => false,
        }
    }

    /// Delete the note at `index`. False when there is no such note.
    pub fn delete(&self, store: &mut WorkStore, index: usize) -> bool {
        match self.notes_mut(store) {
            Some(notes) if index < notes.len() => {
                notes.remove(index);
                true
            }
            _ => false,
        }
    }
}
