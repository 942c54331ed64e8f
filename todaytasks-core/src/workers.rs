//! Background synchronizers
//!
//! Each worker is a named thread looping on its own interval and checking
//! the context's stop flag between passes. Network I/O always happens
//! outside the store lock: a worker snapshots what it needs, fetches, and
//! takes the lock again only to merge.
//!
//! The single-pass functions (`*_once`) hold all the logic so they can be
//! driven directly with fake sources.

use crate::context::AppContext;
use crate::desktop::Desktop;
use crate::issues::{fetch_error_notice, IssueSource, JiraClient};
use crate::notices::NoticeSource;
use crate::pulls::{self, PullRequestSource, StashClient};
use crate::schedule::NotificationTracker;
use chrono::{Local, NaiveDateTime, Utc};
use std::collections::HashSet;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Bounded wait on the issue queue so the stop flag is seen promptly.
const QUEUE_WAIT: Duration = Duration::from_secs(1);

fn spawn_named(name: &str, body: impl FnOnce() + Send + 'static) -> Option<JoinHandle<()>> {
    match thread::Builder::new().name(name.to_string()).spawn(body) {
        Ok(handle) => {
            tracing::debug!(worker = name, "Worker started");
            Some(handle)
        }
        Err(e) => {
            tracing::error!(worker = name, error = %e, "Failed to start worker");
            None
        }
    }
}

/// Start every worker the configuration enables.
///
/// Issue fetching needs `jira.url`, pull request and review polling need a
/// ready `[stash]` section; event reminders always run. A client that cannot
/// be built is logged and its workers are skipped.
pub fn spawn_all(
    ctx: &Arc<AppContext>,
    issue_queue: Receiver<String>,
    desktop: Arc<dyn Desktop>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    if ctx.config.jira.is_ready() {
        match JiraClient::new(&ctx.config.jira) {
            Ok(client) => {
                let source: Arc<dyn IssueSource> = Arc::new(client);
                let c = Arc::clone(ctx);
                handles.extend(spawn_named("issue-fetch", move || {
                    issue_fetch_loop(&c, &issue_queue, source.as_ref())
                }));
                let c = Arc::clone(ctx);
                handles.extend(spawn_named("issue-refresh", move || issue_refresh_loop(&c)));
            }
            Err(e) => tracing::warn!(error = %e, "Issue tracker client unavailable"),
        }
    } else {
        tracing::info!("Issue tracker not configured, issue fetching disabled");
    }

    if ctx.config.stash.is_ready() {
        match StashClient::new(&ctx.config.stash) {
            Ok(client) => {
                let source: Arc<dyn PullRequestSource> = Arc::new(client);
                {
                    let c = Arc::clone(ctx);
                    let source = Arc::clone(&source);
                    let desktop = Arc::clone(&desktop);
                    handles.extend(spawn_named("pr-sync", move || {
                        pull_request_loop(&c, source.as_ref(), desktop.as_ref())
                    }));
                }
                if ctx.config.stash.review_url.is_some() {
                    let c = Arc::clone(ctx);
                    let desktop = Arc::clone(&desktop);
                    handles.extend(spawn_named("review-poll", move || {
                        review_loop(&c, source.as_ref(), desktop.as_ref())
                    }));
                }
            }
            Err(e) => tracing::warn!(error = %e, "Code review client unavailable"),
        }
    } else {
        tracing::info!("Code review system not configured, pull request tracking disabled");
    }

    handles.extend(spawn_event_notifier(ctx, desktop));
    handles
}

/// Start only the event reminder worker. It needs no network access.
pub fn spawn_event_notifier(
    ctx: &Arc<AppContext>,
    desktop: Arc<dyn Desktop>,
) -> Option<JoinHandle<()>> {
    let c = Arc::clone(ctx);
    spawn_named("event-notify", move || event_loop(&c, desktop.as_ref()))
}

fn interval(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

// ============================================
// Issues
// ============================================

fn issue_fetch_loop(ctx: &AppContext, queue: &Receiver<String>, source: &dyn IssueSource) {
    while !ctx.is_stopped() {
        match queue.recv_timeout(QUEUE_WAIT) {
            Ok(issue_id) => fetch_issue_once(ctx, source, &issue_id),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    tracing::debug!(worker = "issue-fetch", "Worker stopped");
}

/// Fetch one queued issue and merge it into the cache.
pub fn fetch_issue_once(ctx: &AppContext, source: &dyn IssueSource, issue_id: &str) {
    match source.fetch(issue_id) {
        Ok(record) => {
            if let Err(e) = ctx.issues.insert(issue_id, record, Utc::now()) {
                tracing::warn!(issue = issue_id, error = %e, "Failed to write issue cache");
            }
            ctx.notices.resolve(NoticeSource::Tracker);
            tracing::debug!(issue = issue_id, "Issue fetched");
        }
        Err(e) => {
            tracing::warn!(issue = issue_id, error = %e, "Issue fetch failed");
            ctx.notices
                .raise(NoticeSource::Tracker, fetch_error_notice(&e, &ctx.translator));
        }
    }
    ctx.finish_issue_fetch(issue_id);
}

fn issue_refresh_loop(ctx: &AppContext) {
    loop {
        let queued = ctx
            .linked_issue_keys()
            .iter()
            .filter(|id| ctx.request_issue_fetch(id, false))
            .count();
        if queued > 0 {
            tracing::debug!(queued, "Issue refresh queued");
        }
        if !ctx.sleep_until_stopped(interval(ctx.config.polling.issue_interval_secs)) {
            break;
        }
    }
}

// ============================================
// Pull requests
// ============================================

fn pull_request_loop(ctx: &AppContext, source: &dyn PullRequestSource, desktop: &dyn Desktop) {
    loop {
        sync_pull_requests_once(ctx, source, desktop);
        if !ctx.sleep_until_stopped(interval(ctx.config.polling.pr_interval_secs)) {
            break;
        }
    }
}

/// One pass over every tracked pull request. Returns the number of
/// notifications sent.
pub fn sync_pull_requests_once(
    ctx: &AppContext,
    source: &dyn PullRequestSource,
    desktop: &dyn Desktop,
) -> usize {
    let targets = {
        let work = ctx.snapshot();
        pulls::pr_targets(&work)
    };
    let quorum = ctx.config.stash.approval_quorum;
    let me = ctx.config.stash.user_id;

    let mut sent = 0;
    let mut failed = false;
    for target in targets {
        if ctx.is_stopped() {
            break;
        }
        let state = match source.fetch(&target.pr_url) {
            Ok(Some(state)) => state,
            Ok(None) => {
                tracing::debug!(pr_url = %target.pr_url, "Not a pull request URL, skipping");
                continue;
            }
            Err(e) => {
                tracing::warn!(pr_url = %target.pr_url, error = %e, "Pull request fetch failed");
                failed = true;
                continue;
            }
        };
        let evaluation = pulls::classify(&state, quorum, me);

        let report = ctx.with_store(|work| {
            let report = pulls::merge_evaluation(work, &target, &evaluation, &ctx.translator);
            (report.changed, report)
        });
        if let Some((title, body)) = report.notification {
            desktop.notify(&title, &body);
            sent += 1;
        }
    }

    if failed {
        ctx.notices.raise(
            NoticeSource::PullRequests,
            ctx.translator.t("polling_err_stash", &[]),
        );
    } else {
        ctx.notices.resolve(NoticeSource::PullRequests);
    }
    sent
}

// ============================================
// Reviews
// ============================================

fn review_loop(ctx: &AppContext, source: &dyn PullRequestSource, desktop: &dyn Desktop) {
    let mut notified = HashSet::new();
    loop {
        poll_reviews_once(ctx, source, desktop, &mut notified);
        if !ctx.sleep_until_stopped(interval(ctx.config.polling.review_interval_secs)) {
            break;
        }
    }
}

/// Refresh the pending review list; notify once per newly listed pull
/// request. Ids that left the list are forgotten so they notify again if
/// they come back.
pub fn poll_reviews_once(
    ctx: &AppContext,
    source: &dyn PullRequestSource,
    desktop: &dyn Desktop,
    notified: &mut HashSet<u64>,
) {
    let reviews = match source.pending_reviews() {
        Ok(reviews) => reviews,
        Err(e) => {
            tracing::warn!(error = %e, "Review dashboard fetch failed");
            ctx.notices.raise(
                NoticeSource::ReviewDashboard,
                ctx.translator.t("polling_err_reviews", &[]),
            );
            return;
        }
    };
    ctx.notices.resolve(NoticeSource::ReviewDashboard);

    for review in &reviews {
        if notified.insert(review.id) {
            let title = ctx.translator.t("notification_review_title", &[]);
            let body = ctx.translator.t(
                "notification_review_body",
                &[("repo", &review.repo), ("title", &review.title)],
            );
            desktop.notify(&title, &body);
        }
    }
    let listed: HashSet<u64> = reviews.iter().map(|r| r.id).collect();
    notified.retain(|id| listed.contains(id));
    ctx.set_reviews(reviews);
}

// ============================================
// Event reminders
// ============================================

fn event_loop(ctx: &AppContext, desktop: &dyn Desktop) {
    let notifications = &ctx.config.notifications;
    let mut tracker =
        NotificationTracker::new(&notifications.thresholds_minutes, notifications.open_link_at_minutes);
    loop {
        notify_events_once(ctx, &mut tracker, desktop, Local::now().naive_local());
        if !ctx.sleep_until_stopped(interval(ctx.config.polling.event_check_secs)) {
            break;
        }
    }
}

/// Send every reminder due at `now`. Returns how many were sent.
pub fn notify_events_once(
    ctx: &AppContext,
    tracker: &mut NotificationTracker,
    desktop: &dyn Desktop,
    now: NaiveDateTime,
) -> usize {
    let work = ctx.snapshot();
    let reminders = tracker.due(&work, now);
    for reminder in &reminders {
        let (title, body) = reminder.text(&ctx.translator);
        tracing::info!(
            kind = reminder.occurrence.kind.as_str(),
            at = %reminder.occurrence.at,
            threshold = reminder.threshold,
            "Event reminder"
        );
        desktop.focus_window(&ctx.config.notifications.window_title);
        desktop.notify(&title, &body);
        if let Some(url) = &reminder.open_link {
            desktop.open_url(url);
        }
    }
    reminders.len()
}
