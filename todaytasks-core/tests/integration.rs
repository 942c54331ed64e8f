//! End-to-end tests for todaytasks-core
//!
//! Commands run through an [`AppContext`] backed by a temporary data file,
//! and the synchronizers are driven one pass at a time with fake sources.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde_json::json;
use std::collections::HashSet;
use std::sync::mpsc::Receiver;
use std::sync::Mutex;
use tempfile::TempDir;
use todaytasks_core::command::tokenize;
use todaytasks_core::desktop::{DesktopAction, RecordingDesktop};
use todaytasks_core::issues::{IssueCache, IssueRecord, IssueSource};
use todaytasks_core::pulls::{PullRequestSource, PullRequestState, ReviewRequest};
use todaytasks_core::schedule::{self, NotificationTracker};
use todaytasks_core::{
    store, workers, AppContext, Config, Directive, EventKind, FetchError, NoticeSource, PrStatus,
    RecurringEvent, Selection, Translator, ViewMode, WorkStore,
};

fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

fn local(naive: NaiveDateTime) -> DateTime<Local> {
    Local.from_local_datetime(&naive).earliest().unwrap()
}

struct Harness {
    _dir: TempDir,
    _queue: Receiver<String>,
    ctx: AppContext,
    now: DateTime<Local>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(Config::default())
    }

    fn with_config(config: Config) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        let (ctx, queue) = AppContext::new(
            config,
            Translator::empty(),
            path,
            WorkStore::default(),
            IssueCache::in_memory(),
        );
        Self {
            _dir: dir,
            _queue: queue,
            ctx,
            // Wednesday
            now: local(naive(2024, 5, 15, 12, 0)),
        }
    }

    fn run(&self, line: &str) -> Option<String> {
        self.run_selected(line, None)
    }

    fn run_selected(&self, line: &str, subtask: Option<usize>) -> Option<String> {
        let selection = Selection {
            subtask,
            note: None,
        };
        let outcome = self
            .ctx
            .run_command(&tokenize(line), ViewMode::Main, selection, self.now);
        let work = self.ctx.snapshot();
        assert!(
            work.invariant_violations().is_empty(),
            "after '{line}': {:?}",
            work.invariant_violations()
        );
        outcome.notice
    }

    fn store(&self) -> WorkStore {
        self.ctx.snapshot()
    }

    fn reloaded(&self) -> WorkStore {
        let loaded = store::load(self.ctx.store_path());
        assert!(loaded.problem.is_none());
        loaded.store
    }
}

// ============================================
// Command scenarios
// ============================================

#[test]
fn test_new_task_on_empty_store() {
    let h = Harness::new();
    h.run("n ABC-1");

    let work = h.reloaded();
    assert_eq!(work.current_ticket.as_deref(), Some("ABC-1"));
    assert!(work.task_start_time.is_some());
    assert!(work.sub_tasks["ABC-1"].is_empty());
}

#[test]
fn test_pause_and_resume_restore_subtasks() {
    let h = Harness::new();
    h.run("n ABC-1");
    h.run("a X");
    h.run_selected("", Some(0));
    assert!(h.store().sub_tasks["ABC-1"]["X"].done);

    h.run("n DEF-2");
    assert_eq!(h.store().paused_tasks[0].ticket, "ABC-1");

    assert_eq!(h.run("ABC-1").as_deref(), Some("cmd_info_switched_to_task"));
    let work = h.reloaded();
    assert_eq!(work.current_ticket.as_deref(), Some("ABC-1"));
    assert!(work.sub_tasks["ABC-1"]["X"].done);
    assert!(!work.paused_tasks.iter().any(|p| p.ticket == "ABC-1"));
    assert_eq!(work.paused_tasks[0].ticket, "DEF-2");
}

#[test]
fn test_focus_toggling() {
    let h = Harness::new();
    h.run("n ABC-1");
    h.run("a X");

    h.run_selected("f", Some(0));
    assert_eq!(h.store().focused_subtask.as_deref(), Some("X"));
    h.run_selected("f", Some(0));
    assert_eq!(h.store().focused_subtask, None);

    h.run_selected("f", Some(0));
    h.run_selected("", Some(0));
    let work = h.store();
    assert!(work.sub_tasks["ABC-1"]["X"].done);
    assert_eq!(work.focused_ticket, None);
    assert_eq!(work.focused_subtask, None);
}

#[test]
fn test_focus_survives_pause_and_resume() {
    let h = Harness::new();
    h.run("n ABC-1");
    h.run("a review docs");
    h.run("n DEF-2");

    h.run("focus review");
    assert_eq!(h.store().focused_subtask.as_deref(), Some("review docs"));

    h.run("ABC-1");
    let work = h.store();
    assert!(work.sub_tasks["ABC-1"]["review docs"].focused);
    assert_eq!(work.focused_ticket.as_deref(), Some("ABC-1"));
}

#[test]
fn test_ambiguous_switch_then_index() {
    let h = Harness::new();
    h.run("n ALPHA-1");
    h.run("n ALPHA-2");
    let before = h.store();

    assert_eq!(h.run("alpha").as_deref(), Some("cmd_err_multiple_tickets_found"));
    assert_eq!(h.store(), before);

    h.run("1");
    let work = h.store();
    assert_eq!(work.current_ticket.as_deref(), Some("ALPHA-1"));
    assert_eq!(work.paused_tasks.len(), 1);
    assert_eq!(work.paused_tasks[0].ticket, "ALPHA-2");
}

#[test]
fn test_recurring_event_next_occurrence() {
    let mut h = Harness::new();
    h.now = local(naive(2024, 5, 15, 8, 0));
    h.run("p ma 09:00 standup");

    let work = h.reloaded();
    assert_eq!(
        work.recurring_events,
        vec![RecurringEvent {
            kind: EventKind::Meeting,
            weekday: 0,
            time: "09:00".to_string(),
            details: "standup".to_string(),
        }]
    );
    assert_eq!(
        schedule::next_occurrence(&work.recurring_events[0], h.now.naive_local()),
        Some(naive(2024, 5, 20, 9, 0))
    );
}

#[test]
fn test_complete_then_reopen() {
    let h = Harness::new();
    h.run("n ABC-1");
    h.run("x");
    let work = h.store();
    assert!(work.completed_tickets.contains("ABC-1"));
    assert!(work.displayable_tickets().is_empty());

    assert_eq!(h.run("n ABC-1").as_deref(), Some("cmd_info_task_reopened"));
    let work = h.store();
    assert_eq!(work.current_ticket.as_deref(), Some("ABC-1"));
    assert!(work.completed_tickets.is_empty());
}

#[test]
fn test_notes_view_rejects_structural_commands() {
    let h = Harness::new();
    h.run("n ABC-1");
    let outcome = h.ctx.run_command(
        &["x"],
        ViewMode::DailyNotes,
        Selection::default(),
        h.now,
    );
    assert_eq!(outcome.directive, Directive::NoChange);
    assert_eq!(h.store().current_ticket.as_deref(), Some("ABC-1"));
}

#[test]
fn test_long_session_keeps_invariants_and_round_trips() {
    let h = Harness::new();
    for line in [
        "n ABC-1",
        "a write tests",
        "a ABC-7 fix parser",
        "note remember the edge case",
        "n DEF-2",
        "a deploy",
        "focus parser",
        "k 12:30 call Maija",
        "p ti 10:00 https://meet/weekly",
        "ABC-1",
        "x",
        "n GHI-3",
        "2",
        "focus",
        "n ABC-1",
    ] {
        h.run(line);
    }
    h.run_selected("d", Some(0));

    let live = h.store();
    let reloaded = h.reloaded();
    assert_eq!(reloaded, live);

    let mut again = reloaded.clone();
    assert!(!store::migrate(&mut again));
    assert_eq!(again, reloaded);
}

// ============================================
// Synchronizers
// ============================================

const PR: &str = "https://stash.example.com/projects/CORE/repos/api/pull-requests/42";

struct FakeStash {
    state: Mutex<std::result::Result<PullRequestState, FetchError>>,
    reviews: Mutex<Vec<ReviewRequest>>,
    dashboard_error: Mutex<Option<FetchError>>,
}

impl FakeStash {
    fn new(state: PullRequestState) -> Self {
        Self {
            state: Mutex::new(Ok(state)),
            reviews: Mutex::new(Vec::new()),
            dashboard_error: Mutex::new(None),
        }
    }

    fn set(&self, state: std::result::Result<PullRequestState, FetchError>) {
        *self.state.lock().unwrap() = state;
    }
}

impl PullRequestSource for FakeStash {
    fn fetch(&self, pr_url: &str) -> std::result::Result<Option<PullRequestState>, FetchError> {
        if !pr_url.contains("pull-requests") {
            return Ok(None);
        }
        self.state.lock().unwrap().clone().map(Some)
    }

    fn pending_reviews(&self) -> std::result::Result<Vec<ReviewRequest>, FetchError> {
        if let Some(e) = self.dashboard_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(self.reviews.lock().unwrap().clone())
    }
}

fn approved_twice() -> PullRequestState {
    PullRequestState {
        details: json!({"reviewers": []}),
        activities: json!({"values": [
            {"action": "APPROVED", "user": {"id": 1}},
            {"action": "APPROVED", "user": {"id": 2}}
        ]}),
    }
}

fn with_pull_request(h: &Harness) {
    h.run("n ABC-1");
    h.run("a X");
    h.run_selected(&format!("pr {PR}"), Some(0));
    assert_eq!(h.store().sub_tasks["ABC-1"]["X"].pr_status, None);
}

#[test]
fn test_pr_approval_notifies_exactly_once() {
    let h = Harness::new();
    with_pull_request(&h);
    let stash = FakeStash::new(approved_twice());
    let desktop = RecordingDesktop::new();

    assert_eq!(workers::sync_pull_requests_once(&h.ctx, &stash, &desktop), 1);
    let work = h.reloaded();
    assert_eq!(work.sub_tasks["ABC-1"]["X"].pr_status, Some(PrStatus::Approved));

    assert_eq!(workers::sync_pull_requests_once(&h.ctx, &stash, &desktop), 0);
    assert_eq!(desktop.notifications().len(), 1);
}

#[test]
fn test_pr_sync_preserves_concurrent_edits() {
    let h = Harness::new();
    with_pull_request(&h);
    h.run_selected("note mine", Some(0));
    h.run_selected("f", Some(0));

    let stash = FakeStash::new(approved_twice());
    workers::sync_pull_requests_once(&h.ctx, &stash, &RecordingDesktop::new());

    let subtask = h.store().sub_tasks["ABC-1"]["X"].clone();
    assert!(subtask.focused);
    assert_eq!(
        subtask.notes,
        vec!["mine".to_string(), "polling_note_approved".to_string()]
    );
}

#[test]
fn test_pr_sync_failure_raises_and_clears_notice() {
    let h = Harness::new();
    with_pull_request(&h);
    let stash = FakeStash::new(approved_twice());
    stash.set(Err(FetchError::Network("timeout".to_string())));

    workers::sync_pull_requests_once(&h.ctx, &stash, &RecordingDesktop::new());
    workers::sync_pull_requests_once(&h.ctx, &stash, &RecordingDesktop::new());
    let notices = h.ctx.notices.snapshot();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].source, NoticeSource::PullRequests);

    stash.set(Ok(approved_twice()));
    workers::sync_pull_requests_once(&h.ctx, &stash, &RecordingDesktop::new());
    assert!(h.ctx.notices.is_empty());
}

#[test]
fn test_dashboard_notice_outlives_pull_request_passes() {
    let h = Harness::new();
    let stash = FakeStash::new(approved_twice());
    let desktop = RecordingDesktop::new();
    let mut notified = HashSet::new();
    *stash.dashboard_error.lock().unwrap() = Some(FetchError::Network("refused".to_string()));

    workers::poll_reviews_once(&h.ctx, &stash, &desktop, &mut notified);
    assert_eq!(h.ctx.notices.snapshot().len(), 1);

    // A clean pull request pass, with nothing tracked, leaves it alone.
    workers::sync_pull_requests_once(&h.ctx, &stash, &desktop);
    let notices = h.ctx.notices.snapshot();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].source, NoticeSource::ReviewDashboard);

    // Both failing at once shows both.
    with_pull_request(&h);
    stash.set(Err(FetchError::Network("refused".to_string())));
    workers::sync_pull_requests_once(&h.ctx, &stash, &desktop);
    assert_eq!(h.ctx.notices.snapshot().len(), 2);

    *stash.dashboard_error.lock().unwrap() = None;
    workers::poll_reviews_once(&h.ctx, &stash, &desktop, &mut notified);
    let notices = h.ctx.notices.snapshot();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].source, NoticeSource::PullRequests);
}

#[test]
fn test_review_poller_notifies_new_ids_only() {
    let h = Harness::new();
    let stash = FakeStash::new(PullRequestState::default());
    let desktop = RecordingDesktop::new();
    let mut notified = HashSet::new();
    let review = ReviewRequest {
        id: 5,
        repo: "CORE/api".to_string(),
        title: "Add cache".to_string(),
        url: None,
    };

    *stash.reviews.lock().unwrap() = vec![review.clone()];
    workers::poll_reviews_once(&h.ctx, &stash, &desktop, &mut notified);
    workers::poll_reviews_once(&h.ctx, &stash, &desktop, &mut notified);
    assert_eq!(desktop.notifications().len(), 1);
    assert_eq!(h.ctx.reviews(), vec![review.clone()]);

    stash.reviews.lock().unwrap().clear();
    workers::poll_reviews_once(&h.ctx, &stash, &desktop, &mut notified);
    assert!(h.ctx.reviews().is_empty());

    *stash.reviews.lock().unwrap() = vec![review];
    workers::poll_reviews_once(&h.ctx, &stash, &desktop, &mut notified);
    assert_eq!(desktop.notifications().len(), 2);
}

struct FakeTracker {
    result: Mutex<std::result::Result<IssueRecord, FetchError>>,
}

impl IssueSource for FakeTracker {
    fn fetch(&self, _issue_id: &str) -> std::result::Result<IssueRecord, FetchError> {
        self.result.lock().unwrap().clone()
    }
}

#[test]
fn test_issue_fetch_notices_and_cache() {
    let h = Harness::new();
    let tracker = FakeTracker {
        result: Mutex::new(Err(FetchError::AuthExpired(401))),
    };

    assert!(h.ctx.request_issue_fetch("ABC-7", true));
    workers::fetch_issue_once(&h.ctx, &tracker, "ABC-7");
    workers::fetch_issue_once(&h.ctx, &tracker, "ABC-7");
    assert!(!h.ctx.is_fetch_pending("ABC-7"));
    let notices = h.ctx.notices.snapshot();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].text, "jira_auth_error");

    *tracker.result.lock().unwrap() = Ok(IssueRecord {
        data: json!({"fields": {"summary": "Parser crash", "status": {"name": "Open"}}}),
        remotelinks: json!([]),
    });
    workers::fetch_issue_once(&h.ctx, &tracker, "ABC-7");
    assert!(h.ctx.notices.is_empty());
    let entry = h.ctx.issues.get("ABC-7").unwrap();
    assert_eq!(entry.summary().summary.as_deref(), Some("Parser crash"));
    assert!(!h.ctx.request_issue_fetch("ABC-7", false));
}

#[test]
fn test_event_reminders_focus_window_and_open_link() {
    let h = Harness::new();
    h.run("p 12:10 https://meet/planning");
    let desktop = RecordingDesktop::new();
    let mut tracker = NotificationTracker::new(&[10, 5], 5);

    let at = |min: u32| naive(2024, 5, 15, 12, min);
    assert_eq!(workers::notify_events_once(&h.ctx, &mut tracker, &desktop, at(0)), 1);
    assert_eq!(workers::notify_events_once(&h.ctx, &mut tracker, &desktop, at(1)), 0);
    assert_eq!(workers::notify_events_once(&h.ctx, &mut tracker, &desktop, at(5)), 1);

    let actions = desktop.actions();
    assert_eq!(
        actions.last(),
        Some(&DesktopAction::OpenUrl("https://meet/planning".to_string()))
    );
    assert_eq!(
        actions
            .iter()
            .filter(|a| matches!(a, DesktopAction::FocusWindow(t) if t == "TODAYTASKS"))
            .count(),
        2
    );
}
