//! Core domain types for todaytasks
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Ticket** | Top-level unit of tracked work, usually an issue key or an ad hoc name |
//! | **Subtask** | Work nested under a ticket, optionally linked to an issue and a pull request |
//! | **Paused task** | A ticket set aside with a deep copy of its subtasks and notes |
//! | **Focus** | The single store-wide pointer to the ticket/subtask being prioritized |
//! | **Displayable tickets** | Sorted non-completed tickets; the index space for numeric references |
//!
//! The persisted shape is the JSON written by [`crate::store`]. Older files kept
//! bare booleans as subtask values and epoch floats as start times; both are
//! accepted here and upgraded on the way in.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

/// Name of a ticket as typed by the user.
pub type TicketName = String;

/// Subtasks of one ticket, keyed by subtask name.
pub type SubtaskMap = BTreeMap<String, Subtask>;

// ============================================
// Pull requests
// ============================================

/// Review state of the pull request linked to a subtask.
///
/// `Option<PrStatus>::None` means "not evaluated yet"; the synchronizer fills
/// it in on its next pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrStatus {
    /// Evaluated, nothing actionable yet
    #[serde(alias = "none")]
    Waiting,
    /// Reviewer comments without a reply from me
    AttentionNeeded,
    /// Approval quorum reached
    Approved,
    /// Terminal: merged
    Merged,
}

impl PrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrStatus::Waiting => "waiting",
            PrStatus::AttentionNeeded => "attention_needed",
            PrStatus::Approved => "approved",
            PrStatus::Merged => "merged",
        }
    }
}

/// Reviewer breakdown shown under the selected subtask.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrDetails {
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub approvers_formatted: Vec<String>,
}

// ============================================
// Subtasks
// ============================================

/// A unit of work nested under a ticket.
///
/// Subtasks are never removed, only hidden. A done subtask is never focused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SubtaskRepr")]
pub struct Subtask {
    pub done: bool,
    pub notes: Vec<String>,
    pub hidden: bool,
    pub pr_url: Option<String>,
    pub pr_status: Option<PrStatus>,
    pub pr_details: Option<PrDetails>,
    pub focused: bool,
}

impl Subtask {
    /// Non-empty pull request URL, if any.
    pub fn pr_url(&self) -> Option<&str> {
        self.pr_url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

/// Every shape a subtask value has had on disk.
#[derive(Deserialize)]
#[serde(untagged)]
enum SubtaskRepr {
    Record(SubtaskRecord),
    Legacy(serde_json::Value),
}

#[derive(Deserialize)]
struct SubtaskRecord {
    #[serde(default)]
    done: bool,
    #[serde(default)]
    notes: Vec<String>,
    #[serde(default)]
    hidden: bool,
    #[serde(default)]
    pr_url: Option<String>,
    #[serde(default)]
    pr_status: Option<PrStatus>,
    #[serde(default)]
    pr_details: Option<PrDetails>,
    #[serde(default)]
    focused: bool,
    /// Replaced by `pr_status = attention_needed`
    #[serde(default)]
    pr_unhandled_comments: Option<serde_json::Value>,
}

impl From<SubtaskRepr> for Subtask {
    fn from(repr: SubtaskRepr) -> Self {
        match repr {
            SubtaskRepr::Record(record) => {
                let mut pr_status = record.pr_status;
                if pr_status.is_none()
                    && record.pr_unhandled_comments.as_ref().is_some_and(truthy)
                {
                    pr_status = Some(PrStatus::AttentionNeeded);
                }
                Subtask {
                    done: record.done,
                    notes: record.notes,
                    hidden: record.hidden,
                    pr_url: record.pr_url,
                    pr_status,
                    pr_details: record.pr_details,
                    focused: record.focused,
                }
            }
            SubtaskRepr::Legacy(serde_json::Value::Object(map)) => loose_record(&map),
            SubtaskRepr::Legacy(value) => Subtask {
                done: truthy(&value),
                ..Subtask::default()
            },
        }
    }
}

/// Salvage an object whose fields have unexpected types.
fn loose_record(map: &serde_json::Map<String, serde_json::Value>) -> Subtask {
    let flag = |key: &str| map.get(key).is_some_and(truthy);
    let text = |key: &str| {
        map.get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    let notes = map
        .get("notes")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|n| n.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let pr_status = map
        .get("pr_status")
        .and_then(|v| serde_json::from_value::<PrStatus>(v.clone()).ok());
    let pr_details = map
        .get("pr_details")
        .and_then(|v| serde_json::from_value::<PrDetails>(v.clone()).ok());

    Subtask {
        done: flag("done"),
        notes,
        hidden: flag("hidden"),
        pr_url: text("pr_url"),
        pr_status,
        pr_details,
        focused: flag("focused"),
    }
}

/// Loose truthiness used when coercing legacy values to booleans.
pub(crate) fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

// ============================================
// Paused tasks
// ============================================

/// A ticket set aside by switching away from it.
///
/// Holds its own copy of the ticket's subtasks and notes; resuming restores
/// them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PausedTask {
    pub ticket: TicketName,
    #[serde(default, deserialize_with = "lenient_subtasks")]
    pub sub_tasks: SubtaskMap,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: Vec<String>,
    #[serde(default, with = "lenient_timestamp")]
    pub task_start_time: Option<DateTime<Local>>,
}

// ============================================
// Events
// ============================================

/// Meeting or interruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Meeting,
    Interruption,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Meeting => "meeting",
            EventKind::Interruption => "interruption",
        }
    }

    /// Key holding the details of a one-off event of this kind on disk.
    fn details_key(&self) -> &'static str {
        match self {
            EventKind::Meeting => "link",
            EventKind::Interruption => "message",
        }
    }
}

/// A one-off meeting or interruption at a local wall-clock instant.
///
/// On disk the details live under `link` for meetings and `message` for
/// interruptions; see `serialize_events` and `deserialize_events`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneTimeEvent {
    pub datetime: NaiveDateTime,
    pub details: String,
}

/// Stored shape of a one-off event. Hand-edited files may carry both
/// detail keys, or the generic `details`.
#[derive(Deserialize)]
struct OneTimeEventRepr {
    datetime: NaiveDateTime,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

impl OneTimeEventRepr {
    /// The key matching `kind` wins, then `details`, then the other kind's key.
    fn into_event(self, kind: EventKind) -> OneTimeEvent {
        let (own, other) = match kind {
            EventKind::Meeting => (self.link, self.message),
            EventKind::Interruption => (self.message, self.link),
        };
        OneTimeEvent {
            datetime: self.datetime,
            details: own.or(self.details).or(other).unwrap_or_default(),
        }
    }
}

/// A weekly meeting or interruption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// 0 = Monday .. 6 = Sunday
    pub weekday: u8,
    /// `HH:MM`
    pub time: String,
    #[serde(default)]
    pub details: String,
}

impl RecurringEvent {
    pub fn time_of_day(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(&self.time, "%H:%M").ok()
    }
}

// ============================================
// Work store
// ============================================

/// The root aggregate: everything the tracker persists.
///
/// Invariants kept by every mutation:
/// - a ticket is at most one of current, paused or completed
/// - at most one subtask in the whole store is focused, and
///   `focused_ticket`/`focused_subtask` mirror it
/// - `sub_tasks` and `notes` have an entry for every current, paused or
///   completed ticket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkStore {
    #[serde(default)]
    pub current_ticket: Option<TicketName>,
    #[serde(default, with = "lenient_timestamp")]
    pub task_start_time: Option<DateTime<Local>>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub paused_tasks: Vec<PausedTask>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed_tickets: BTreeSet<TicketName>,
    #[serde(default, deserialize_with = "lenient_ticket_subtasks")]
    pub sub_tasks: BTreeMap<TicketName, SubtaskMap>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: BTreeMap<TicketName, Vec<String>>,
    #[serde(default)]
    pub focused_ticket: Option<TicketName>,
    #[serde(default)]
    pub focused_subtask: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_meetings",
        serialize_with = "serialize_meetings"
    )]
    pub meetings: Vec<OneTimeEvent>,
    #[serde(
        default,
        deserialize_with = "deserialize_interruptions",
        serialize_with = "serialize_interruptions"
    )]
    pub interruptions: Vec<OneTimeEvent>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub recurring_events: Vec<RecurringEvent>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub daily_notes: BTreeMap<NaiveDate, Vec<String>>,
}

impl WorkStore {
    /// Sorted non-completed tickets: current, every key of `sub_tasks` and
    /// `notes`, and every paused ticket.
    ///
    /// Numeric ticket references index into this list (1-based) both on
    /// screen and in commands.
    pub fn displayable_tickets(&self) -> Vec<TicketName> {
        let mut all: BTreeSet<&str> = BTreeSet::new();
        if let Some(current) = self.current_ticket.as_deref() {
            all.insert(current);
        }
        all.extend(self.sub_tasks.keys().map(String::as_str));
        all.extend(self.notes.keys().map(String::as_str));
        all.extend(self.paused_tasks.iter().map(|p| p.ticket.as_str()));

        all.into_iter()
            .filter(|t| !t.is_empty() && !self.completed_tickets.contains(*t))
            .map(str::to_string)
            .collect()
    }

    /// Non-hidden subtasks of the current ticket, in display order.
    ///
    /// The selection index used by the UI and the command interpreter points
    /// into this list.
    pub fn visible_subtasks(&self) -> Vec<(&str, &Subtask)> {
        let Some(current) = self.current_ticket.as_deref() else {
            return Vec::new();
        };
        self.sub_tasks
            .get(current)
            .map(|subs| {
                subs.iter()
                    .filter(|(_, s)| !s.hidden)
                    .map(|(name, s)| (name.as_str(), s))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Name of the `index`-th visible subtask of the current ticket.
    pub fn visible_subtask_name(&self, index: usize) -> Option<String> {
        self.visible_subtasks()
            .get(index)
            .map(|(name, _)| name.to_string())
    }

    pub fn is_paused(&self, ticket: &str) -> bool {
        self.paused_tasks.iter().any(|p| p.ticket == ticket)
    }

    pub fn is_completed(&self, ticket: &str) -> bool {
        self.completed_tickets.contains(ticket)
    }

    /// Whether the name is known anywhere in the store.
    pub fn knows_ticket(&self, ticket: &str) -> bool {
        self.current_ticket.as_deref() == Some(ticket)
            || self.sub_tasks.contains_key(ticket)
            || self.notes.contains_key(ticket)
            || self.is_paused(ticket)
            || self.is_completed(ticket)
    }

    /// Make sure `sub_tasks` and `notes` have an entry for the ticket.
    pub fn ensure_ticket(&mut self, ticket: &str) {
        self.sub_tasks.entry(ticket.to_string()).or_default();
        self.notes.entry(ticket.to_string()).or_default();
    }

    /// Clear every focus flag and both focus pointers.
    pub fn clear_focus(&mut self) {
        self.focused_ticket = None;
        self.focused_subtask = None;
        for subtask in self.sub_tasks.values_mut().flat_map(|s| s.values_mut()) {
            subtask.focused = false;
        }
        for paused in &mut self.paused_tasks {
            for subtask in paused.sub_tasks.values_mut() {
                subtask.focused = false;
            }
        }
    }

    /// Focus a ticket, and optionally one of its subtasks, after clearing
    /// every previous focus. A paused ticket's snapshot is flagged too so the
    /// focus survives a resume.
    pub fn focus_on(&mut self, ticket: &str, subtask: Option<&str>) {
        self.clear_focus();
        self.focused_ticket = Some(ticket.to_string());
        let Some(name) = subtask else {
            return;
        };
        if let Some(s) = self
            .sub_tasks
            .get_mut(ticket)
            .and_then(|subs| subs.get_mut(name))
        {
            s.focused = true;
        }
        if let Some(s) = self
            .paused_tasks
            .iter_mut()
            .find(|p| p.ticket == ticket)
            .and_then(|p| p.sub_tasks.get_mut(name))
        {
            s.focused = true;
        }
        self.focused_subtask = Some(name.to_string());
    }

    /// Push the current ticket onto the paused stack with a copy of its
    /// subtasks and notes. Returns false when nothing was current.
    pub fn pause_current(&mut self) -> bool {
        let Some(ticket) = self.current_ticket.take() else {
            return false;
        };
        let paused = PausedTask {
            sub_tasks: self.sub_tasks.get(&ticket).cloned().unwrap_or_default(),
            notes: self.notes.get(&ticket).cloned().unwrap_or_default(),
            task_start_time: self.task_start_time.take(),
            ticket,
        };
        self.paused_tasks.insert(0, paused);
        true
    }

    /// The subtask the focus pointers name, if it exists.
    pub fn focused(&self) -> Option<(&str, &str)> {
        match (self.focused_ticket.as_deref(), self.focused_subtask.as_deref()) {
            (Some(ticket), Some(subtask)) => Some((ticket, subtask)),
            _ => None,
        }
    }

    /// Human-readable descriptions of every broken invariant.
    ///
    /// Empty for every state the interpreter and synchronizers can reach.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        if let Some(current) = self.current_ticket.as_deref() {
            *seen.entry(current).or_default() += 1;
        }
        for paused in &self.paused_tasks {
            *seen.entry(paused.ticket.as_str()).or_default() += 1;
        }
        for done in &self.completed_tickets {
            *seen.entry(done.as_str()).or_default() += 1;
        }
        for (ticket, count) in seen {
            if count > 1 {
                problems.push(format!(
                    "ticket '{ticket}' is in {count} of current/paused/completed"
                ));
            }
        }

        let flagged: Vec<(&str, &str)> = self
            .sub_tasks
            .iter()
            .flat_map(|(ticket, subs)| {
                subs.iter()
                    .filter(|(_, s)| s.focused)
                    .map(move |(name, _)| (ticket.as_str(), name.as_str()))
            })
            .collect();
        match flagged.as_slice() {
            [] => {
                if self.focused_subtask.is_some() {
                    problems.push("focused_subtask set but no subtask is flagged".to_string());
                }
            }
            [(ticket, subtask)] => {
                if self.focused() != Some((*ticket, *subtask)) {
                    problems.push(format!(
                        "focus pointers do not match flagged subtask {ticket}/{subtask}"
                    ));
                }
            }
            many => problems.push(format!("{} subtasks are focused", many.len())),
        }
        if self.focused_subtask.is_some() && self.focused_ticket.is_none() {
            problems.push("focused_subtask set without focused_ticket".to_string());
        }

        for (ticket, subs) in &self.sub_tasks {
            for (name, s) in subs {
                if s.done && s.focused {
                    problems.push(format!("done subtask {ticket}/{name} is focused"));
                }
            }
        }

        let referenced = self
            .current_ticket
            .iter()
            .chain(self.paused_tasks.iter().map(|p| &p.ticket))
            .chain(self.completed_tickets.iter());
        for ticket in referenced {
            if !self.sub_tasks.contains_key(ticket) || !self.notes.contains_key(ticket) {
                problems.push(format!("ticket '{ticket}' lacks sub_tasks/notes entries"));
            }
        }

        problems
    }
}

// ============================================
// Serde helpers
// ============================================

fn serialize_meetings<S: Serializer>(events: &[OneTimeEvent], s: S) -> Result<S::Ok, S::Error> {
    serialize_events(events, EventKind::Meeting, s)
}

fn serialize_interruptions<S: Serializer>(
    events: &[OneTimeEvent],
    s: S,
) -> Result<S::Ok, S::Error> {
    serialize_events(events, EventKind::Interruption, s)
}

fn serialize_events<S: Serializer>(
    events: &[OneTimeEvent],
    kind: EventKind,
    s: S,
) -> Result<S::Ok, S::Error> {
    struct Keyed<'a>(&'a OneTimeEvent, &'static str);

    impl Serialize for Keyed<'_> {
        fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            let mut map = s.serialize_map(Some(2))?;
            map.serialize_entry("datetime", &self.0.datetime)?;
            map.serialize_entry(self.1, &self.0.details)?;
            map.end()
        }
    }

    let key = kind.details_key();
    s.collect_seq(events.iter().map(|e| Keyed(e, key)))
}

fn deserialize_meetings<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<OneTimeEvent>, D::Error> {
    deserialize_events(d, EventKind::Meeting)
}

fn deserialize_interruptions<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Vec<OneTimeEvent>, D::Error> {
    deserialize_events(d, EventKind::Interruption)
}

fn deserialize_events<'de, D: Deserializer<'de>>(
    d: D,
    kind: EventKind,
) -> Result<Vec<OneTimeEvent>, D::Error> {
    let events: Vec<OneTimeEventRepr> = lenient_vec(d)?;
    Ok(events.into_iter().map(|e| e.into_event(kind)).collect())
}

/// `null` reads as the type's default.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Keep the entries that parse; drop and log the rest.
fn lenient_vec<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(d)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<T>(value) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed entry from work store");
                None
            }
        })
        .collect())
}

/// A non-object subtask map (very old files) reads as empty.
fn lenient_subtasks<'de, D>(d: D) -> Result<SubtaskMap, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(d)?;
    Ok(subtasks_from_value(raw))
}

fn lenient_ticket_subtasks<'de, D>(d: D) -> Result<BTreeMap<TicketName, SubtaskMap>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<TicketName, serde_json::Value>> = Option::deserialize(d)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(ticket, value)| (ticket, subtasks_from_value(value)))
        .collect())
}

fn subtasks_from_value(value: serde_json::Value) -> SubtaskMap {
    match value {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(name, v)| {
                let subtask = serde_json::from_value::<Subtask>(v).unwrap_or_default();
                (name, subtask)
            })
            .collect(),
        _ => SubtaskMap::new(),
    }
}

/// Timestamps as RFC 3339 strings; also reads naive ISO strings and the epoch
/// seconds older files stored.
pub(crate) mod lenient_timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Local>>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => s.serialize_str(&ts.to_rfc3339()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Local>>, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(d)?;
        Ok(raw.as_ref().and_then(parse))
    }

    pub fn parse(value: &serde_json::Value) -> Option<DateTime<Local>> {
        match value {
            serde_json::Value::Number(n) => {
                let secs = n.as_f64()?;
                let whole = secs.trunc() as i64;
                let nanos = ((secs.fract()) * 1e9).round() as u32;
                Local.timestamp_opt(whole, nanos.min(999_999_999)).single()
            }
            serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Local))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
                }),
            _ => None,
        }
    }
}
