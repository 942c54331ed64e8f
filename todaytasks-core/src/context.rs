//! Shared application state
//!
//! One [`AppContext`] is built at startup and handed to the UI loop and to
//! every background worker behind an `Arc`. It owns the two locked
//! structures (work store and issue cache) and the bits of coordination
//! around them: the issue fetch queue with its in-flight set, the pending
//! review list, sticky notices and the stop flag.

use crate::command::{self, Directive, Outcome, Selection, ViewMode};
use crate::config::Config;
use crate::issues::{issue_key, IssueCache};
use crate::notices::{NoticeBoard, NoticeSource};
use crate::pulls::ReviewRequest;
use crate::store;
use crate::translate::Translator;
use crate::types::WorkStore;
use chrono::{DateTime, Local, Utc};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Granularity of interruptible sleeps.
const STOP_POLL: Duration = Duration::from_millis(200);

pub struct AppContext {
    pub config: Config,
    pub translator: Translator,
    store: Mutex<WorkStore>,
    store_path: PathBuf,
    pub issues: IssueCache,
    in_flight: Mutex<HashSet<String>>,
    fetch_tx: Mutex<Option<Sender<String>>>,
    reviews: Mutex<Vec<ReviewRequest>>,
    pub notices: NoticeBoard,
    stop: AtomicBool,
}

impl AppContext {
    /// Build the context around an already loaded store. The receiver is
    /// the issue fetch queue; drop it to run without issue fetching.
    pub fn new(
        config: Config,
        translator: Translator,
        store_path: PathBuf,
        work: WorkStore,
        issues: IssueCache,
    ) -> (Self, Receiver<String>) {
        let (tx, rx) = mpsc::channel();
        let ctx = Self {
            config,
            translator,
            store: Mutex::new(work),
            store_path,
            issues,
            in_flight: Mutex::new(HashSet::new()),
            fetch_tx: Mutex::new(Some(tx)),
            reviews: Mutex::new(Vec::new()),
            notices: NoticeBoard::new(),
            stop: AtomicBool::new(false),
        };
        (ctx, rx)
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    fn lock_store(&self) -> MutexGuard<'_, WorkStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point-in-time copy of the work store.
    pub fn snapshot(&self) -> WorkStore {
        self.lock_store().clone()
    }

    /// Run `f` under the store lock; persist when it reports a change.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut WorkStore) -> (bool, R)) -> R {
        let mut guard = self.lock_store();
        let (changed, result) = f(&mut guard);
        if changed {
            self.persist(&guard);
        }
        result
    }

    /// Like [`with_store`](Self::with_store) for closures that only report
    /// whether they changed anything.
    pub fn update_store(&self, f: impl FnOnce(&mut WorkStore) -> bool) -> bool {
        self.with_store(|s| {
            let changed = f(s);
            (changed, changed)
        })
    }

    fn persist(&self, work: &WorkStore) {
        match store::save(&self.store_path, work) {
            Ok(()) => self.notices.resolve(NoticeSource::Storage),
            Err(e) => {
                tracing::warn!(path = %self.store_path.display(), error = %e, "Failed to save work store");
                let text = self
                    .translator
                    .t("storage_save_failed", &[("e", &e)]);
                self.notices.raise(NoticeSource::Storage, text);
            }
        }
    }

    /// Interpret one command line atomically against the live store.
    ///
    /// A mutating command replaces the store and is persisted before the
    /// lock is released; issue fetches it asks for are queued afterwards.
    pub fn run_command(
        &self,
        tokens: &[&str],
        view: ViewMode,
        selection: Selection,
        now: DateTime<Local>,
    ) -> Outcome {
        let outcome = {
            let mut guard = self.lock_store();
            let outcome = command::interpret(&guard, tokens, view, selection, now, &self.translator);
            if let Directive::Mutated(next) = &outcome.directive {
                *guard = (**next).clone();
                self.persist(&guard);
            }
            outcome
        };

        for issue in &outcome.issue_fetches {
            self.request_issue_fetch(issue, true);
        }
        outcome
    }

    // ============================================
    // Issue fetch queue
    // ============================================

    /// Queue a fetch unless one is pending, or the cached entry is fresh
    /// and `force` is off. Returns whether a fetch was queued.
    pub fn request_issue_fetch(&self, issue_id: &str, force: bool) -> bool {
        let ttl = chrono::Duration::seconds(
            i64::try_from(self.config.jira.cache_ttl_secs).unwrap_or(i64::MAX / 1000),
        );
        if !force && self.issues.is_fresh(issue_id, ttl, Utc::now()) {
            return false;
        }

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.contains(issue_id) {
            return false;
        }
        let tx = self.fetch_tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = tx.as_ref() else {
            return false;
        };
        if tx.send(issue_id.to_string()).is_err() {
            return false;
        }
        in_flight.insert(issue_id.to_string());
        tracing::debug!(issue = issue_id, force, "Issue fetch queued");
        true
    }

    /// Mark a queued fetch as handled.
    pub fn finish_issue_fetch(&self, issue_id: &str) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(issue_id);
    }

    pub fn is_fetch_pending(&self, issue_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(issue_id)
    }

    /// Issue keys of every subtask of a non-completed ticket.
    pub fn linked_issue_keys(&self) -> BTreeSet<String> {
        let work = self.lock_store();
        work.sub_tasks
            .iter()
            .filter(|(ticket, _)| !work.is_completed(ticket))
            .flat_map(|(_, subs)| subs.keys())
            .filter_map(|name| issue_key(name))
            .collect()
    }

    /// Re-queue every linked issue, bypassing the cache.
    pub fn refetch_all_issues(&self) -> usize {
        self.linked_issue_keys()
            .iter()
            .filter(|id| self.request_issue_fetch(id, true))
            .count()
    }

    // ============================================
    // Reviews
    // ============================================

    pub fn reviews(&self) -> Vec<ReviewRequest> {
        self.reviews
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_reviews(&self, reviews: Vec<ReviewRequest>) {
        *self.reviews.lock().unwrap_or_else(PoisonError::into_inner) = reviews;
    }

    // ============================================
    // Shutdown
    // ============================================

    /// Ask every worker to exit, and close the fetch queue.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.fetch_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on stop. Returns false when the
    /// context was stopped.
    pub fn sleep_until_stopped(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while !self.is_stopped() {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(STOP_POLL.min(deadline - now));
        }
        false
    }
}
