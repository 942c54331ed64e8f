//! Issue tracker integration
//!
//! Subtasks whose name contains an issue key (`ABC-123`) are annotated with
//! the issue's summary, status and remote links. Fetched records live in an
//! [`IssueCache`] with its own lock, persisted as JSON next to the work
//! store. Fetching goes through the [`IssueSource`] trait; [`JiraClient`] is
//! the real implementation, authenticated by a stored browser session.

use crate::config::JiraConfig;
use crate::error::{Error, FetchError, Result};
use crate::translate::Translator;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

fn issue_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[A-Z]{2,}-\d+").expect("issue key regex"))
}

/// First issue key in `text`, upper-cased.
pub fn issue_key(text: &str) -> Option<String> {
    issue_key_pattern()
        .find(&text.to_uppercase())
        .map(|m| m.as_str().to_string())
}

// ============================================
// Fetching
// ============================================

/// Raw tracker response for one issue.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRecord {
    pub data: serde_json::Value,
    pub remotelinks: serde_json::Value,
}

/// Something that can fetch an issue by key.
pub trait IssueSource: Send + Sync {
    fn fetch(&self, issue_id: &str) -> std::result::Result<IssueRecord, FetchError>;
}

/// Translated sticky notice for a fetch failure.
pub fn fetch_error_notice(error: &FetchError, tr: &Translator) -> String {
    match error {
        FetchError::MissingSession => tr.t("jira_login_prompt", &[]),
        FetchError::SessionUnreadable => tr.t("jira_session_error", &[]),
        FetchError::AuthExpired(_) => tr.t("jira_auth_error", &[]),
        FetchError::Http(status) => tr.t("jira_http_error", &[("status", status)]),
        FetchError::Network(e) => tr.t("jira_generic_error", &[("e", e)]),
    }
}

/// Stored session: either the cookie list a browser export produces, or a
/// ready `Cookie:` header value.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SessionFile {
    Cookies(Vec<SessionCookie>),
    Header { cookie_header: String },
}

#[derive(Debug, Deserialize)]
struct SessionCookie {
    name: String,
    value: String,
}

/// Read the session file and build a `Cookie:` header value.
pub fn load_session(path: &Path) -> std::result::Result<String, FetchError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FetchError::MissingSession)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cannot read tracker session");
            return Err(FetchError::SessionUnreadable);
        }
    };

    let header = match serde_json::from_str::<SessionFile>(&content) {
        Ok(SessionFile::Cookies(cookies)) => cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; "),
        Ok(SessionFile::Header { cookie_header }) => cookie_header,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Tracker session file is malformed");
            return Err(FetchError::SessionUnreadable);
        }
    };

    if header.trim().is_empty() {
        return Err(FetchError::SessionUnreadable);
    }
    Ok(header)
}

/// Store a `Cookie:` header value as the tracker session.
pub fn save_session(path: &Path, cookie_header: &str) -> Result<()> {
    let header = cookie_header.trim();
    if header.is_empty() {
        return Err(Error::Session("cookie header is empty".to_string()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::json!({ "cookie_header": header });
    std::fs::write(path, serde_json::to_string_pretty(&json)?)?;
    tracing::info!(path = %path.display(), "Tracker session saved");
    Ok(())
}

/// Prompt for a `Cookie:` header on `output`, read one line from `input`
/// and store it as the tracker session.
pub fn login_interactive(
    session_file: &Path,
    tr: &Translator,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<()> {
    writeln!(output, "{}", tr.t("login_prompt", &[]))?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let header = line
        .trim()
        .strip_prefix("Cookie:")
        .map(str::trim)
        .unwrap_or_else(|| line.trim());
    save_session(session_file, header)?;

    writeln!(
        output,
        "{}",
        tr.t("login_saved", &[("path", &session_file.display())])
    )?;
    Ok(())
}

/// Issue tracker REST client.
///
/// Blocking from the caller's point of view: requests run on a private
/// current-thread runtime owned by the client.
pub struct JiraClient {
    base_url: String,
    session_file: PathBuf,
    runtime: tokio::runtime::Runtime,
    http: reqwest::Client,
}

impl JiraClient {
    pub fn new(config: &JiraConfig) -> Result<Self> {
        let base_url = config
            .url
            .as_deref()
            .ok_or_else(|| Error::Config("jira.url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Config(format!("failed to build tokio runtime: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs.max(1)))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            session_file: config.session_file(),
            runtime,
            http,
        })
    }
}

impl IssueSource for JiraClient {
    fn fetch(&self, issue_id: &str) -> std::result::Result<IssueRecord, FetchError> {
        let cookie = load_session(&self.session_file)?;
        let cookie = HeaderValue::from_str(&cookie).map_err(|_| FetchError::SessionUnreadable)?;
        let issue_url = format!(
            "{}/rest/api/2/issue/{}",
            self.base_url,
            urlencoding::encode(issue_id)
        );
        let links_url = format!("{issue_url}/remotelink");

        self.runtime.block_on(async {
            let response = self
                .http
                .get(&issue_url)
                .header(COOKIE, cookie.clone())
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::from_status(status.as_u16()));
            }
            let data: serde_json::Value = response.json().await?;

            // remote links are decoration; any failure means "none"
            let remotelinks = match self.http.get(&links_url).header(COOKIE, cookie).send().await {
                Ok(resp) if resp.status().is_success() => resp
                    .json::<serde_json::Value>()
                    .await
                    .unwrap_or_else(|_| serde_json::Value::Array(Vec::new())),
                Ok(resp) => {
                    tracing::debug!(issue = issue_id, status = %resp.status(), "Remote links unavailable");
                    serde_json::Value::Array(Vec::new())
                }
                Err(e) => {
                    tracing::debug!(issue = issue_id, error = %e, "Remote links request failed");
                    serde_json::Value::Array(Vec::new())
                }
            };

            Ok(IssueRecord { data, remotelinks })
        })
    }
}

// ============================================
// Cache
// ============================================

/// One cached fetch result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueEntry {
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub remotelinks: serde_json::Value,
    #[serde(rename = "timestamp")]
    pub fetched_at: DateTime<Utc>,
}

/// What the UI shows for a linked issue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueSummary {
    pub summary: Option<String>,
    pub status: Option<String>,
    pub assignee: Option<String>,
    /// `(title, url)` of each remote link
    pub links: Vec<(String, String)>,
}

impl IssueEntry {
    pub fn summary(&self) -> IssueSummary {
        let fields = &self.data["fields"];
        let text = |v: &serde_json::Value| v.as_str().map(str::to_string);
        let links = self
            .remotelinks
            .as_array()
            .map(|links| {
                links
                    .iter()
                    .filter_map(|link| {
                        let object = &link["object"];
                        let url = object["url"].as_str()?;
                        let title = object["title"]
                            .as_str()
                            .or_else(|| link["globalId"].as_str())
                            .unwrap_or(url);
                        Some((title.to_string(), url.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        IssueSummary {
            summary: text(&fields["summary"]),
            status: text(&fields["status"]["name"]),
            assignee: text(&fields["assignee"]["displayName"]),
            links,
        }
    }
}

/// Fetched issue records keyed by issue key.
#[derive(Debug)]
pub struct IssueCache {
    entries: Mutex<BTreeMap<String, IssueEntry>>,
    path: Option<PathBuf>,
}

impl IssueCache {
    /// Load the cache file; a missing or corrupt file is an empty cache.
    pub fn load(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Issue cache is corrupt, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read issue cache");
                BTreeMap::new()
            }
        };
        tracing::debug!(entries = entries.len(), "Issue cache loaded");
        Self {
            entries: Mutex::new(entries),
            path: Some(path.to_path_buf()),
        }
    }

    /// A cache that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            path: None,
        }
    }

    pub fn get(&self, issue_id: &str) -> Option<IssueEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(issue_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the entry exists and is younger than `ttl`.
    pub fn is_fresh(&self, issue_id: &str, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(issue_id)
            .is_some_and(|entry| now - entry.fetched_at < ttl)
    }

    /// Merge a fetch result and rewrite the cache file.
    pub fn insert(&self, issue_id: &str, record: IssueRecord, now: DateTime<Utc>) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            issue_id.to_string(),
            IssueEntry {
                data: record.data,
                remotelinks: record.remotelinks,
                fetched_at: now,
            },
        );
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string(&*entries)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn record() -> IssueRecord {
        IssueRecord {
            data: json!({"fields": {
                "summary": "Crash on save",
                "status": {"name": "In Progress"},
                "assignee": {"displayName": "Maija"}
            }}),
            remotelinks: json!([
                {"globalId": "VF - Log Hours", "object": {"url": "https://vf/log"}},
                {"object": {"title": "Design", "url": "https://wiki/design"}},
                {"object": {}}
            ]),
        }
    }

    #[test]
    fn test_issue_key_extraction() {
        assert_eq!(issue_key("fix abc-123 now"), Some("ABC-123".to_string()));
        assert_eq!(issue_key("PROJ-7"), Some("PROJ-7".to_string()));
        assert_eq!(issue_key("A-1 too short"), None);
        assert_eq!(issue_key("no key"), None);
    }

    #[test]
    fn test_summary_extraction() {
        let entry = IssueEntry {
            data: record().data,
            remotelinks: record().remotelinks,
            fetched_at: Utc::now(),
        };
        let summary = entry.summary();
        assert_eq!(summary.summary.as_deref(), Some("Crash on save"));
        assert_eq!(summary.status.as_deref(), Some("In Progress"));
        assert_eq!(summary.assignee.as_deref(), Some("Maija"));
        assert_eq!(
            summary.links,
            vec![
                ("VF - Log Hours".to_string(), "https://vf/log".to_string()),
                ("Design".to_string(), "https://wiki/design".to_string()),
            ]
        );
    }

    #[test]
    fn test_cache_persists_and_expires() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("issue_cache.json");
        let now = Utc::now();

        let cache = IssueCache::load(&path);
        assert!(cache.is_empty());
        cache.insert("ABC-1", record(), now).unwrap();

        let ttl = Duration::seconds(300);
        assert!(cache.is_fresh("ABC-1", ttl, now + Duration::seconds(299)));
        assert!(!cache.is_fresh("ABC-1", ttl, now + Duration::seconds(301)));
        assert!(!cache.is_fresh("XYZ-9", ttl, now));

        let reloaded = IssueCache::load(&path);
        assert_eq!(reloaded.get("ABC-1"), cache.get("ABC-1"));
    }

    #[test]
    fn test_corrupt_cache_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("issue_cache.json");
        std::fs::write(&path, "garbage").unwrap();
        assert!(IssueCache::load(&path).is_empty());
    }

    #[test]
    fn test_session_formats() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        assert_eq!(load_session(&path), Err(FetchError::MissingSession));

        std::fs::write(
            &path,
            r#"[{"name": "JSESSIONID", "value": "abc", "domain": "x"}, {"name": "t", "value": "1"}]"#,
        )
        .unwrap();
        assert_eq!(load_session(&path).unwrap(), "JSESSIONID=abc; t=1");

        save_session(&path, "  a=b; c=d ").unwrap();
        assert_eq!(load_session(&path).unwrap(), "a=b; c=d");

        std::fs::write(&path, "{oops").unwrap();
        assert_eq!(load_session(&path), Err(FetchError::SessionUnreadable));

        assert!(save_session(&path, "   ").is_err());
    }

    #[test]
    fn test_login_interactive_strips_header_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let mut input = std::io::Cursor::new("Cookie: JSESSIONID=abc; x=1\n");
        let mut output = Vec::new();

        login_interactive(&path, &Translator::empty(), &mut input, &mut output).unwrap();
        assert_eq!(load_session(&path).unwrap(), "JSESSIONID=abc; x=1");
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.starts_with("login_prompt\n"));

        let mut empty = std::io::Cursor::new("\n");
        assert!(login_interactive(&path, &Translator::empty(), &mut empty, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_fetch_error_notices_are_distinct() {
        let tr = Translator::empty();
        let notices: std::collections::HashSet<String> = [
            FetchError::MissingSession,
            FetchError::SessionUnreadable,
            FetchError::AuthExpired(401),
            FetchError::Http(500),
            FetchError::Network("timeout".to_string()),
        ]
        .iter()
        .map(|e| fetch_error_notice(e, &tr))
        .collect();
        assert_eq!(notices.len(), 5);
    }
}
