//! Pull request tracking against a Stash/Bitbucket Server instance
//!
//! Subtasks with a `pr_url` are evaluated on every synchronizer pass:
//!
//! 1. [`pr_targets`] takes a point-in-time list of what to poll.
//! 2. A [`PullRequestSource`] fetches details and activities, outside any lock.
//! 3. [`classify`] turns the raw responses into an [`Evaluation`].
//! 4. [`merge_evaluation`] writes the owned fields back under the store lock
//!    and reports whether a desktop notification is due.
//!
//! The review dashboard (pull requests waiting for my review) is fetched by
//! the same source; see [`ReviewRequest`].

use crate::config::StashConfig;
use crate::error::{Error, FetchError, Result};
use crate::translate::Translator;
use crate::types::{PrDetails, PrStatus, Subtask, WorkStore};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Prefix of notes the synchronizer writes for unreplied comments.
pub const UNHANDLED_MARKER: &str = "UNHANDLED";

fn pr_path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"projects/([^/]+)/repos/([^/]+)/pull-requests/(\d+)").expect("pull request regex")
    })
}

/// REST endpoint of the pull request a browser URL points at.
pub fn api_url(base_url: &str, pr_url: &str) -> Option<String> {
    let caps = pr_path_pattern().captures(pr_url)?;
    Some(format!(
        "{}/rest/api/1.0/projects/{}/repos/{}/pull-requests/{}",
        base_url.trim_end_matches('/'),
        &caps[1],
        &caps[2],
        &caps[3]
    ))
}

// ============================================
// Fetching
// ============================================

/// Raw responses for one pull request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullRequestState {
    /// `GET .../pull-requests/<id>`: reviewers and state
    pub details: Value,
    /// `GET .../pull-requests/<id>/activities`
    pub activities: Value,
}

/// A pull request on the review dashboard that still needs my approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequest {
    pub id: u64,
    pub repo: String,
    pub title: String,
    pub url: Option<String>,
}

/// Something that can answer pull request questions.
pub trait PullRequestSource: Send + Sync {
    /// Fetch a pull request by its browser URL. `Ok(None)` means the URL
    /// does not name a pull request and should be skipped.
    fn fetch(&self, pr_url: &str) -> std::result::Result<Option<PullRequestState>, FetchError>;

    /// Pull requests on the review dashboard that are not approved yet.
    fn pending_reviews(&self) -> std::result::Result<Vec<ReviewRequest>, FetchError>;
}

/// Stash REST client with bearer token authentication.
pub struct StashClient {
    base_url: String,
    review_url: Option<String>,
    runtime: tokio::runtime::Runtime,
    http: reqwest::Client,
}

impl StashClient {
    pub fn new(config: &StashConfig) -> Result<Self> {
        let base_url = config
            .url
            .as_deref()
            .ok_or_else(|| Error::Config("stash.url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();
        let token = config
            .token()
            .ok_or_else(|| Error::Config("stash.api_token is required".to_string()))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Config(format!("failed to build tokio runtime: {e}")))?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| Error::Config(format!("invalid stash.api_token: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json;charset=UTF-8"),
        );

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs.max(1)))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            review_url: config.review_url.clone(),
            runtime,
            http,
        })
    }

    async fn get_json(&self, url: &str) -> std::result::Result<Value, FetchError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}

impl PullRequestSource for StashClient {
    fn fetch(&self, pr_url: &str) -> std::result::Result<Option<PullRequestState>, FetchError> {
        let Some(url) = api_url(&self.base_url, pr_url) else {
            return Ok(None);
        };
        self.runtime.block_on(async {
            let details = self.get_json(&url).await?;
            let activities = self.get_json(&format!("{url}/activities")).await?;
            Ok(Some(PullRequestState {
                details,
                activities,
            }))
        })
    }

    fn pending_reviews(&self) -> std::result::Result<Vec<ReviewRequest>, FetchError> {
        let Some(review_url) = self.review_url.as_deref() else {
            return Ok(Vec::new());
        };
        let dashboard = self.runtime.block_on(self.get_json(review_url))?;
        Ok(parse_review_dashboard(&dashboard))
    }
}

/// Pull requests on the dashboard where some reviewer is still UNAPPROVED.
pub fn parse_review_dashboard(dashboard: &Value) -> Vec<ReviewRequest> {
    let Some(values) = dashboard["values"].as_array() else {
        return Vec::new();
    };
    values
        .iter()
        .filter(|pr| {
            pr["reviewers"]
                .as_array()
                .is_some_and(|rs| rs.iter().any(|r| r["status"] == "UNAPPROVED"))
        })
        .filter_map(|pr| {
            let repository = &pr["toRef"]["repository"];
            Some(ReviewRequest {
                id: pr["id"].as_u64()?,
                repo: format!(
                    "{}/{}",
                    repository["project"]["key"].as_str().unwrap_or("?"),
                    repository["name"].as_str().unwrap_or("?")
                ),
                title: pr["title"].as_str().unwrap_or_default().to_string(),
                url: pr["links"]["self"][0]["href"].as_str().map(str::to_string),
            })
        })
        .collect()
}

// ============================================
// Classification
// ============================================

/// Reviewer comment without a reply from me.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnhandledComment {
    pub author: String,
    pub text: String,
}

impl UnhandledComment {
    /// The note line stored on the subtask.
    pub fn note(&self) -> String {
        format!("{UNHANDLED_MARKER} {}: {}", self.author, self.text)
    }
}

/// Result of evaluating one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub status: PrStatus,
    pub details: PrDetails,
    pub unhandled: Vec<UnhandledComment>,
}

fn activity_list(activities: &Value) -> &[Value] {
    activities["values"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn user_id(value: &Value) -> Option<u64> {
    value["id"].as_u64()
}

/// Classify a pull request: merged > approved > attention needed > waiting.
///
/// Approvals are distinct user ids from APPROVED activities and from
/// reviewers whose status is APPROVED. Comments count as unhandled when
/// someone other than `me` wrote them and `me` has not replied.
pub fn classify(state: &PullRequestState, quorum: usize, me: Option<u64>) -> Evaluation {
    let activities = activity_list(&state.activities);
    let reviewers = state.details["reviewers"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default();

    let merged = state.details["state"] == "MERGED"
        || activities.iter().any(|a| a["action"] == "MERGED");

    let mut approvers: BTreeSet<u64> = activities
        .iter()
        .filter(|a| a["action"] == "APPROVED")
        .filter_map(|a| user_id(&a["user"]))
        .collect();
    approvers.extend(
        reviewers
            .iter()
            .filter(|r| r["status"] == "APPROVED")
            .filter_map(|r| user_id(&r["user"])),
    );

    let unhandled: Vec<UnhandledComment> = activities
        .iter()
        .filter(|a| a["action"] == "COMMENTED")
        .map(|a| &a["comment"])
        .filter(|c| c.is_object())
        .filter(|c| user_id(&c["author"]) != me)
        .filter(|c| {
            let replies = c["comments"].as_array().map(Vec::as_slice).unwrap_or_default();
            me.is_none() || !replies.iter().any(|r| user_id(&r["author"]) == me)
        })
        .map(|c| UnhandledComment {
            author: c["author"]["displayName"]
                .as_str()
                .unwrap_or("Unknown")
                .to_string(),
            text: c["text"].as_str().unwrap_or_default().to_string(),
        })
        .collect();

    let status = if merged {
        PrStatus::Merged
    } else if approvers.len() >= quorum {
        PrStatus::Approved
    } else if !unhandled.is_empty() {
        PrStatus::AttentionNeeded
    } else {
        PrStatus::Waiting
    };

    Evaluation {
        status,
        details: describe(&state.details, reviewers),
        unhandled,
    }
}

fn describe(details: &Value, reviewers: &[Value]) -> PrDetails {
    let approved = reviewers
        .iter()
        .filter(|r| r["status"] == "APPROVED")
        .count();
    let status_text = match details["state"].as_str() {
        Some("MERGED") => "merged ✅".to_string(),
        Some("DECLINED") => "declined ❌".to_string(),
        _ if approved > 0 => format!("approved ({}/{})", approved, reviewers.len()),
        _ => "waiting".to_string(),
    };
    let approvers_formatted = reviewers
        .iter()
        .map(|r| {
            let mark = match r["status"].as_str() {
                Some("APPROVED") => "✅",
                Some("NEEDS_WORK") => "❌",
                _ => "❓",
            };
            let name = r["user"]["displayName"].as_str().unwrap_or("Unknown");
            format!("{mark} {name}")
        })
        .collect();
    PrDetails {
        status_text,
        approvers_formatted,
    }
}

// ============================================
// Merging
// ============================================

/// A pull request to poll, captured under the store lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrTarget {
    pub ticket: String,
    pub subtask: String,
    pub pr_url: String,
}

/// Every visible subtask with a pull request that has not merged yet.
pub fn pr_targets(store: &WorkStore) -> Vec<PrTarget> {
    store
        .sub_tasks
        .iter()
        .flat_map(|(ticket, subs)| {
            subs.iter().filter_map(move |(name, subtask)| {
                if subtask.hidden || subtask.pr_status == Some(PrStatus::Merged) {
                    return None;
                }
                Some(PrTarget {
                    ticket: ticket.clone(),
                    subtask: name.clone(),
                    pr_url: subtask.pr_url()?.to_string(),
                })
            })
        })
        .collect()
}

/// What merging an evaluation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub changed: bool,
    /// `(title, body)` when the status moved into merged, approved or
    /// attention needed
    pub notification: Option<(String, String)>,
}

/// Write an evaluation back into the store.
///
/// Nothing happens when the subtask is gone, hidden, already merged, or
/// points at a different pull request by now. A paused ticket's snapshot is
/// updated as well so a resume does not roll the status back.
pub fn merge_evaluation(
    store: &mut WorkStore,
    target: &PrTarget,
    evaluation: &Evaluation,
    tr: &Translator,
) -> MergeReport {
    let approved_note = tr.t("polling_note_approved", &[]);
    let mut report = MergeReport::default();

    let live = store
        .sub_tasks
        .get_mut(&target.ticket)
        .and_then(|subs| subs.get_mut(&target.subtask));
    let Some(live) = live.filter(|s| still_tracks(s, &target.pr_url)) else {
        return report;
    };
    let previous = live.pr_status;
    report.changed = apply(live, evaluation, &approved_note);

    if let Some(snapshot) = store
        .paused_tasks
        .iter_mut()
        .find(|p| p.ticket == target.ticket)
        .and_then(|p| p.sub_tasks.get_mut(&target.subtask))
        .filter(|s| still_tracks(s, &target.pr_url))
    {
        report.changed |= apply(snapshot, evaluation, &approved_note);
    }

    if previous != Some(evaluation.status) {
        tracing::info!(
            ticket = %target.ticket,
            subtask = %target.subtask,
            pr_url = %target.pr_url,
            from = previous.map(|s| s.as_str()).unwrap_or("unknown"),
            to = evaluation.status.as_str(),
            "Pull request status changed"
        );
        report.notification = notification_for(target, evaluation.status, tr);
    }
    report
}

fn still_tracks(subtask: &Subtask, pr_url: &str) -> bool {
    !subtask.hidden && subtask.pr_status != Some(PrStatus::Merged) && subtask.pr_url() == Some(pr_url)
}

fn apply(subtask: &mut Subtask, evaluation: &Evaluation, approved_note: &str) -> bool {
    let before = subtask.clone();

    let fresh: Vec<String> = match evaluation.status {
        PrStatus::AttentionNeeded => evaluation.unhandled.iter().map(UnhandledComment::note).collect(),
        _ => Vec::new(),
    };
    subtask
        .notes
        .retain(|n| !n.starts_with(UNHANDLED_MARKER) || fresh.contains(n));

    match evaluation.status {
        PrStatus::Merged => subtask.notes.retain(|n| !n.starts_with(approved_note)),
        PrStatus::Approved => {
            if !subtask.notes.iter().any(|n| n == approved_note) {
                subtask.notes.push(approved_note.to_string());
            }
        }
        PrStatus::AttentionNeeded => {
            for note in fresh {
                if !subtask.notes.contains(&note) {
                    subtask.notes.push(note);
                }
            }
        }
        PrStatus::Waiting => {}
    }

    subtask.pr_status = Some(evaluation.status);
    subtask.pr_details = Some(evaluation.details.clone());
    *subtask != before
}

/// Last path segment of URL-like subtask names, for notification titles.
pub fn title_for_subtask(name: &str) -> &str {
    if !name.starts_with("http") {
        return name;
    }
    name.split('/').filter(|p| !p.is_empty()).last().unwrap_or(name)
}

fn notification_for(target: &PrTarget, status: PrStatus, tr: &Translator) -> Option<(String, String)> {
    let (title_key, body_key) = match status {
        PrStatus::Merged => ("notification_pr_merged_title", "notification_pr_merged_body"),
        PrStatus::Approved => ("notification_pr_approved_title", "notification_pr_approved_body"),
        PrStatus::AttentionNeeded => (
            "notification_pr_unhandled_title",
            "notification_pr_unhandled_body",
        ),
        PrStatus::Waiting => return None,
    };
    let title = tr.t(
        title_key,
        &[
            ("main_task", &target.ticket),
            ("sub_task", &title_for_subtask(&target.subtask)),
        ],
    );
    let body = tr.t(body_key, &[("pr_url", &target.pr_url)]);
    Some((title, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PR: &str = "https://stash.example.com/projects/CORE/repos/api/pull-requests/42/overview";
    const ME: u64 = 7;

    fn state(details: Value, activities: Vec<Value>) -> PullRequestState {
        PullRequestState {
            details,
            activities: json!({ "values": activities }),
        }
    }

    fn reviewer(id: u64, name: &str, status: &str) -> Value {
        json!({"user": {"id": id, "displayName": name}, "status": status})
    }

    fn comment(author: u64, name: &str, text: &str, replies: Vec<u64>) -> Value {
        let replies: Vec<Value> = replies
            .into_iter()
            .map(|id| json!({"author": {"id": id}, "text": "ok"}))
            .collect();
        json!({"action": "COMMENTED", "comment": {
            "author": {"id": author, "displayName": name},
            "text": text,
            "comments": replies
        }})
    }

    fn store_with_pr() -> (WorkStore, PrTarget) {
        let mut store = WorkStore {
            current_ticket: Some("ABC-1".to_string()),
            ..WorkStore::default()
        };
        store.ensure_ticket("ABC-1");
        store.sub_tasks.get_mut("ABC-1").unwrap().insert(
            "X".to_string(),
            Subtask {
                pr_url: Some(PR.to_string()),
                ..Subtask::default()
            },
        );
        let target = pr_targets(&store).remove(0);
        (store, target)
    }

    #[test]
    fn test_api_url() {
        assert_eq!(
            api_url("https://stash.example.com/", PR).as_deref(),
            Some("https://stash.example.com/rest/api/1.0/projects/CORE/repos/api/pull-requests/42")
        );
        assert_eq!(api_url("https://stash", "https://github.com/a/b/pull/1"), None);
    }

    #[test]
    fn test_classify_precedence() {
        let approvals = vec![
            json!({"action": "APPROVED", "user": {"id": 1}}),
            json!({"action": "APPROVED", "user": {"id": 2}}),
        ];
        let approved = classify(&state(json!({}), approvals.clone()), 2, Some(ME));
        assert_eq!(approved.status, PrStatus::Approved);

        let mut with_merge = approvals;
        with_merge.push(json!({"action": "MERGED"}));
        assert_eq!(
            classify(&state(json!({}), with_merge), 2, Some(ME)).status,
            PrStatus::Merged
        );

        let one = vec![
            json!({"action": "APPROVED", "user": {"id": 1}}),
            json!({"action": "APPROVED", "user": {"id": 1}}),
        ];
        assert_eq!(
            classify(&state(json!({}), one), 2, Some(ME)).status,
            PrStatus::Waiting
        );
    }

    #[test]
    fn test_reviewer_approvals_count_toward_quorum() {
        let details = json!({"reviewers": [reviewer(1, "Anna", "APPROVED")]});
        let activities = vec![json!({"action": "APPROVED", "user": {"id": 2}})];
        let evaluation = classify(&state(details, activities), 2, Some(ME));
        assert_eq!(evaluation.status, PrStatus::Approved);
        assert_eq!(evaluation.details.status_text, "approved (1/1)");
        assert_eq!(evaluation.details.approvers_formatted, vec!["✅ Anna"]);
    }

    #[test]
    fn test_unhandled_comments() {
        let activities = vec![
            comment(1, "Anna", "rename this", vec![]),
            comment(2, "Ben", "typo", vec![ME]),
            comment(ME, "Me", "self note", vec![]),
        ];
        let evaluation = classify(&state(json!({}), activities), 2, Some(ME));
        assert_eq!(evaluation.status, PrStatus::AttentionNeeded);
        assert_eq!(
            evaluation.unhandled,
            vec![UnhandledComment {
                author: "Anna".to_string(),
                text: "rename this".to_string()
            }]
        );
    }

    #[test]
    fn test_describe_states() {
        let details = json!({"state": "DECLINED", "reviewers": [
            reviewer(1, "Anna", "NEEDS_WORK"),
            reviewer(2, "Ben", "UNAPPROVED")
        ]});
        let evaluation = classify(&state(details, vec![]), 2, Some(ME));
        assert_eq!(evaluation.details.status_text, "declined ❌");
        assert_eq!(
            evaluation.details.approvers_formatted,
            vec!["❌ Anna", "❓ Ben"]
        );
    }

    #[test]
    fn test_approval_notifies_once() {
        let tr = Translator::empty();
        let (mut store, target) = store_with_pr();
        let activities = vec![
            json!({"action": "APPROVED", "user": {"id": 1}}),
            json!({"action": "APPROVED", "user": {"id": 2}}),
        ];
        let evaluation = classify(&state(json!({}), activities), 2, Some(ME));

        let first = merge_evaluation(&mut store, &target, &evaluation, &tr);
        assert!(first.changed);
        assert_eq!(
            first.notification,
            Some((
                "notification_pr_approved_title".to_string(),
                "notification_pr_approved_body".to_string()
            ))
        );
        let subtask = &store.sub_tasks["ABC-1"]["X"];
        assert_eq!(subtask.pr_status, Some(PrStatus::Approved));
        assert_eq!(subtask.notes, vec!["polling_note_approved"]);

        let second = merge_evaluation(&mut store, &target, &evaluation, &tr);
        assert_eq!(second, MergeReport::default());
    }

    #[test]
    fn test_stale_unhandled_notes_are_stripped() {
        let tr = Translator::empty();
        let (mut store, target) = store_with_pr();
        let first = classify(
            &state(json!({}), vec![comment(1, "Anna", "a", vec![]), comment(2, "Ben", "b", vec![])]),
            2,
            Some(ME),
        );
        merge_evaluation(&mut store, &target, &first, &tr);
        assert_eq!(
            store.sub_tasks["ABC-1"]["X"].notes,
            vec!["UNHANDLED Anna: a", "UNHANDLED Ben: b"]
        );

        let second = classify(
            &state(json!({}), vec![comment(1, "Anna", "a", vec![ME]), comment(2, "Ben", "b", vec![])]),
            2,
            Some(ME),
        );
        let report = merge_evaluation(&mut store, &target, &second, &tr);
        assert!(report.changed);
        assert!(report.notification.is_none());
        assert_eq!(store.sub_tasks["ABC-1"]["X"].notes, vec!["UNHANDLED Ben: b"]);

        let quiet = classify(&state(json!({}), vec![]), 2, Some(ME));
        let report = merge_evaluation(&mut store, &target, &quiet, &tr);
        assert!(report.notification.is_none());
        let subtask = &store.sub_tasks["ABC-1"]["X"];
        assert!(subtask.notes.is_empty());
        assert_eq!(subtask.pr_status, Some(PrStatus::Waiting));
    }

    #[test]
    fn test_merge_strips_approved_note_and_stops_polling() {
        let tr = Translator::empty();
        let (mut store, target) = store_with_pr();
        store.sub_tasks.get_mut("ABC-1").unwrap().get_mut("X").unwrap().notes =
            vec!["polling_note_approved".to_string(), "mine".to_string()];

        let merged = classify(&state(json!({"state": "MERGED"}), vec![]), 2, Some(ME));
        let report = merge_evaluation(&mut store, &target, &merged, &tr);
        assert!(report.notification.is_some());
        assert_eq!(store.sub_tasks["ABC-1"]["X"].notes, vec!["mine"]);
        assert!(pr_targets(&store).is_empty());
    }

    #[test]
    fn test_changed_url_or_hidden_subtask_is_left_alone() {
        let tr = Translator::empty();
        let (mut store, target) = store_with_pr();
        let evaluation = classify(&state(json!({"state": "MERGED"}), vec![]), 2, Some(ME));

        store.sub_tasks.get_mut("ABC-1").unwrap().get_mut("X").unwrap().pr_url =
            Some("https://stash.example.com/projects/CORE/repos/api/pull-requests/43".to_string());
        let before = store.clone();
        assert_eq!(
            merge_evaluation(&mut store, &target, &evaluation, &tr),
            MergeReport::default()
        );
        assert_eq!(store, before);

        store.sub_tasks.get_mut("ABC-1").unwrap().get_mut("X").unwrap().pr_url = Some(PR.to_string());
        store.sub_tasks.get_mut("ABC-1").unwrap().get_mut("X").unwrap().hidden = true;
        assert!(!merge_evaluation(&mut store, &target, &evaluation, &tr).changed);
    }

    #[test]
    fn test_paused_snapshot_is_updated() {
        let tr = Translator::empty();
        let (mut store, target) = store_with_pr();
        store.pause_current();

        let evaluation = classify(&state(json!({"state": "MERGED"}), vec![]), 2, Some(ME));
        merge_evaluation(&mut store, &target, &evaluation, &tr);
        assert_eq!(
            store.paused_tasks[0].sub_tasks["X"].pr_status,
            Some(PrStatus::Merged)
        );
    }

    #[test]
    fn test_review_dashboard() {
        let dashboard = json!({"values": [
            {"id": 5, "title": "Add cache", "reviewers": [{"status": "UNAPPROVED"}],
             "toRef": {"repository": {"name": "api", "project": {"key": "CORE"}}},
             "links": {"self": [{"href": "https://stash/pr/5"}]}},
            {"id": 6, "title": "Done", "reviewers": [{"status": "APPROVED"}],
             "toRef": {"repository": {"name": "api", "project": {"key": "CORE"}}}}
        ]});
        assert_eq!(
            parse_review_dashboard(&dashboard),
            vec![ReviewRequest {
                id: 5,
                repo: "CORE/api".to_string(),
                title: "Add cache".to_string(),
                url: Some("https://stash/pr/5".to_string()),
            }]
        );
    }

    #[test]
    fn test_title_for_subtask() {
        assert_eq!(title_for_subtask("https://stash/x/pull-requests/9/"), "9");
        assert_eq!(title_for_subtask("write docs"), "write docs");
    }
}
