//! Scheduling evaluator
//!
//! Pure functions over the event lists of a [`WorkStore`] and a local `now`:
//! which events are still ahead today, which already happened, and which
//! reminders are due. [`NotificationTracker`] remembers the reminders that
//! already fired so each threshold fires once per occurrence.

use crate::translate::Translator;
use crate::types::{EventKind, OneTimeEvent, RecurringEvent, WorkStore};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use std::collections::HashSet;

/// Next instant a recurring event happens at or after `now`.
///
/// An occurrence whose time has already come today rolls over to next week.
/// Returns `None` for a malformed weekday or time.
pub fn next_occurrence(event: &RecurringEvent, now: NaiveDateTime) -> Option<NaiveDateTime> {
    if event.weekday > 6 {
        return None;
    }
    let time = event.time_of_day()?;
    let today = i64::from(now.weekday().num_days_from_monday());
    let mut days_ahead = (i64::from(event.weekday) - today).rem_euclid(7);
    if days_ahead == 0 && now.time() >= time {
        days_ahead = 7;
    }
    Some((now.date() + Duration::days(days_ahead)).and_time(time))
}

/// One concrete instance of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub kind: EventKind,
    pub at: NaiveDateTime,
    pub details: String,
    pub recurring: bool,
}

impl Occurrence {
    fn one_off(kind: EventKind, event: &OneTimeEvent) -> Self {
        Self {
            kind,
            at: event.datetime,
            details: event.details.clone(),
            recurring: false,
        }
    }

    fn recurring(event: &RecurringEvent, at: NaiveDateTime) -> Self {
        Self {
            kind: event.kind,
            at,
            details: event.details.clone(),
            recurring: true,
        }
    }

    /// Identity of this instance: kind, details and resolved minute.
    pub fn id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.kind.as_str(),
            self.details,
            self.at.format("%Y%m%d%H%M")
        )
    }
}

fn one_offs(store: &WorkStore) -> impl Iterator<Item = Occurrence> + '_ {
    store
        .meetings
        .iter()
        .map(|e| Occurrence::one_off(EventKind::Meeting, e))
        .chain(
            store
                .interruptions
                .iter()
                .map(|e| Occurrence::one_off(EventKind::Interruption, e)),
        )
}

/// Today's events split around `now`, each half sorted by time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaySchedule {
    pub upcoming: Vec<Occurrence>,
    pub past: Vec<Occurrence>,
}

/// Events of `now`'s date: those at or after `now`, and those between
/// midnight and `now`.
pub fn today(store: &WorkStore, now: NaiveDateTime) -> DaySchedule {
    let date = now.date();
    let mut schedule = DaySchedule::default();

    let todays_recurring = store.recurring_events.iter().filter_map(|event| {
        if u32::from(event.weekday) != date.weekday().num_days_from_monday() {
            return None;
        }
        let at = date.and_time(event.time_of_day()?);
        Some(Occurrence::recurring(event, at))
    });

    for occurrence in one_offs(store).chain(todays_recurring) {
        if occurrence.at.date() != date {
            continue;
        }
        if occurrence.at >= now {
            schedule.upcoming.push(occurrence);
        } else {
            schedule.past.push(occurrence);
        }
    }

    schedule.upcoming.sort_by_key(|o| o.at);
    schedule.past.sort_by_key(|o| o.at);
    schedule
}

/// Every occurrence still ahead of `now`: future one-offs and the next
/// instance of each recurring event.
pub fn upcoming(store: &WorkStore, now: NaiveDateTime) -> Vec<Occurrence> {
    let mut all: Vec<Occurrence> = one_offs(store).filter(|o| o.at >= now).collect();
    all.extend(
        store
            .recurring_events
            .iter()
            .filter_map(|event| Some(Occurrence::recurring(event, next_occurrence(event, now)?))),
    );
    all.sort_by_key(|o| o.at);
    all
}

/// A reminder that should be shown now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub occurrence: Occurrence,
    /// Whole minutes left until the event
    pub minutes_until: i64,
    /// The configured mark this reminder fires for
    pub threshold: u32,
    /// Meeting link to open in the browser with this reminder
    pub open_link: Option<String>,
}

impl Reminder {
    /// Translated `(title, body)` for the desktop notification.
    pub fn text(&self, tr: &Translator) -> (String, String) {
        let rec = if self.occurrence.recurring {
            format!("({}) ", tr.t("recurring", &[]))
        } else {
            String::new()
        };
        let time = self.occurrence.at.format("%H:%M").to_string();
        let params: [(&str, &dyn std::fmt::Display); 3] =
            [("rec", &rec), ("min", &self.minutes_until), ("time", &time)];
        match self.occurrence.kind {
            EventKind::Meeting => (
                tr.t("notification_meeting_title", &params),
                tr.t(
                    "notification_meeting_body",
                    &[("link", &self.occurrence.details)],
                ),
            ),
            EventKind::Interruption => (
                tr.t("notification_event_title", &params),
                self.occurrence.details.clone(),
            ),
        }
    }
}

/// Remembers which `(occurrence, threshold)` reminders already fired.
///
/// Each threshold owns the window between itself and the next lower mark,
/// so a check that lands a minute late still fires, and a reminder fires at
/// most once. The memory is dropped whenever the date changes.
#[derive(Debug, Clone)]
pub struct NotificationTracker {
    thresholds: Vec<u32>,
    open_link_at: u32,
    fired: HashSet<(String, u32)>,
    day: Option<NaiveDate>,
}

impl NotificationTracker {
    pub fn new(thresholds: &[u32], open_link_at: u32) -> Self {
        let mut thresholds = thresholds.to_vec();
        thresholds.sort_unstable_by(|a, b| b.cmp(a));
        thresholds.dedup();
        Self {
            thresholds,
            open_link_at,
            fired: HashSet::new(),
            day: None,
        }
    }

    /// Threshold whose window contains `minutes_until`, if any.
    fn window(&self, minutes_until: i64) -> Option<u32> {
        if minutes_until < 0 {
            return None;
        }
        let mut found = None;
        for &mark in &self.thresholds {
            if minutes_until <= i64::from(mark) {
                found = Some(mark);
            }
        }
        found
    }

    /// Reminders due at `now` that have not fired yet. Marks them fired.
    pub fn due(&mut self, store: &WorkStore, now: NaiveDateTime) -> Vec<Reminder> {
        if self.day != Some(now.date()) {
            if self.day.is_some() {
                tracing::debug!(fired = self.fired.len(), "New day, clearing fired reminders");
            }
            self.fired.clear();
            self.day = Some(now.date());
        }

        let mut reminders = Vec::new();
        for occurrence in upcoming(store, now) {
            let minutes_until = (occurrence.at - now).num_minutes();
            let Some(threshold) = self.window(minutes_until) else {
                continue;
            };
            if !self.fired.insert((occurrence.id(), threshold)) {
                continue;
            }
            let open_link = (threshold == self.open_link_at
                && occurrence.kind == EventKind::Meeting
                && occurrence.details.starts_with("http"))
            .then(|| occurrence.details.clone());
            reminders.push(Reminder {
                occurrence,
                minutes_until,
                threshold,
                open_link,
            });
        }
        reminders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn recurring(kind: EventKind, weekday: u8, time: &str, details: &str) -> RecurringEvent {
        RecurringEvent {
            kind,
            weekday,
            time: time.to_string(),
            details: details.to_string(),
        }
    }

    // 2024-05-15 is a Wednesday
    #[test]
    fn test_next_occurrence() {
        let standup = recurring(EventKind::Meeting, 0, "09:00", "standup");
        let wed_8 = at(2024, 5, 15, 8, 0);
        assert_eq!(next_occurrence(&standup, wed_8), Some(at(2024, 5, 20, 9, 0)));

        let wednesday = recurring(EventKind::Meeting, 2, "09:00", "retro");
        assert_eq!(next_occurrence(&wednesday, wed_8), Some(at(2024, 5, 15, 9, 0)));
        assert_eq!(
            next_occurrence(&wednesday, at(2024, 5, 15, 9, 0)),
            Some(at(2024, 5, 22, 9, 0))
        );

        let broken = recurring(EventKind::Meeting, 2, "9am", "x");
        assert_eq!(next_occurrence(&broken, wed_8), None);
        let bad_day = recurring(EventKind::Meeting, 9, "09:00", "x");
        assert_eq!(next_occurrence(&bad_day, wed_8), None);
    }

    #[test]
    fn test_today_split() {
        let now = at(2024, 5, 15, 12, 0);
        let store = WorkStore {
            meetings: vec![
                OneTimeEvent {
                    datetime: at(2024, 5, 15, 14, 0),
                    details: "https://meet/1".to_string(),
                },
                OneTimeEvent {
                    datetime: at(2024, 5, 16, 9, 0),
                    details: "tomorrow".to_string(),
                },
            ],
            interruptions: vec![OneTimeEvent {
                datetime: at(2024, 5, 15, 8, 30),
                details: "call back".to_string(),
            }],
            recurring_events: vec![
                recurring(EventKind::Meeting, 2, "13:00", "lunch sync"),
                recurring(EventKind::Meeting, 2, "09:00", "standup"),
                recurring(EventKind::Meeting, 3, "09:00", "thursday"),
            ],
            ..WorkStore::default()
        };

        let schedule = today(&store, now);
        let upcoming: Vec<&str> = schedule.upcoming.iter().map(|o| o.details.as_str()).collect();
        let past: Vec<&str> = schedule.past.iter().map(|o| o.details.as_str()).collect();
        assert_eq!(upcoming, vec!["lunch sync", "https://meet/1"]);
        assert_eq!(past, vec!["call back", "standup"]);
    }

    #[test]
    fn test_reminders_fire_once_per_threshold() {
        let store = WorkStore {
            meetings: vec![OneTimeEvent {
                datetime: at(2024, 5, 15, 14, 0),
                details: "https://meet/1".to_string(),
            }],
            ..WorkStore::default()
        };
        let mut tracker = NotificationTracker::new(&[5, 10], 5);

        assert!(tracker.due(&store, at(2024, 5, 15, 13, 49)).is_empty());

        let ten = tracker.due(&store, at(2024, 5, 15, 13, 50));
        assert_eq!(ten.len(), 1);
        assert_eq!(ten[0].threshold, 10);
        assert_eq!(ten[0].open_link, None);
        assert!(tracker.due(&store, at(2024, 5, 15, 13, 51)).is_empty());

        let five = tracker.due(&store, at(2024, 5, 15, 13, 56));
        assert_eq!(five.len(), 1);
        assert_eq!(five[0].threshold, 5);
        assert_eq!(five[0].minutes_until, 4);
        assert_eq!(five[0].open_link.as_deref(), Some("https://meet/1"));
        assert!(tracker.due(&store, at(2024, 5, 15, 13, 58)).is_empty());
    }

    #[test]
    fn test_recurring_weeks_are_tracked_separately() {
        let store = WorkStore {
            recurring_events: vec![recurring(EventKind::Interruption, 2, "09:00", "check")],
            ..WorkStore::default()
        };
        let mut tracker = NotificationTracker::new(&[10], 5);

        let first = tracker.due(&store, at(2024, 5, 15, 8, 55));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].open_link, None);
        assert!(tracker.due(&store, at(2024, 5, 15, 8, 56)).is_empty());

        let next_week = tracker.due(&store, at(2024, 5, 22, 8, 55));
        assert_eq!(next_week.len(), 1);
        assert_ne!(first[0].occurrence.id(), next_week[0].occurrence.id());
    }

    #[test]
    fn test_reminder_text() {
        let tr = Translator::from_json(
            r#"{
                "recurring": "recurring",
                "notification_meeting_title": "{rec}Meeting in {min} min at {time}",
                "notification_meeting_body": "Link: {link}",
                "notification_event_title": "{rec}Event in {min} min at {time}"
            }"#,
        )
        .unwrap();
        let reminder = Reminder {
            occurrence: Occurrence {
                kind: EventKind::Meeting,
                at: at(2024, 5, 20, 9, 0),
                details: "https://meet/2".to_string(),
                recurring: true,
            },
            minutes_until: 5,
            threshold: 5,
            open_link: None,
        };
        assert_eq!(
            reminder.text(&tr),
            (
                "(recurring) Meeting in 5 min at 09:00".to_string(),
                "Link: https://meet/2".to_string()
            )
        );
    }
}
