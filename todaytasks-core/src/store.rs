//! Work store persistence
//!
//! The whole [`WorkStore`] is one pretty-printed UTF-8 JSON document,
//! rewritten in full on every change. Writes go to a sibling temp file that
//! is renamed over the original, so a failed write leaves the last good file
//! in place.
//!
//! Loading never fails: a missing file is an empty store and an unreadable
//! one is set aside as `<file>.corrupt` before starting empty.

use crate::error::{Error, Result};
use crate::types::{SubtaskMap, WorkStore};
use chrono::Local;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Note prefix that predates the `pr_url` field.
const LEGACY_PR_NOTE_PREFIX: &str = "PR:";

/// Result of [`load`]: always a usable store, plus the reason it had to
/// start from defaults, if any.
#[derive(Debug)]
pub struct Loaded {
    pub store: WorkStore,
    pub problem: Option<Error>,
}

/// Read and migrate the store at `path`.
pub fn load(path: &Path) -> Loaded {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "No work store yet, starting empty");
            return Loaded {
                store: WorkStore::default(),
                problem: None,
            };
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read work store");
            return Loaded {
                store: WorkStore::default(),
                problem: Some(Error::Io(e)),
            };
        }
    };

    match parse(&content) {
        Ok(store) => {
            tracing::debug!(
                path = %path.display(),
                tickets = store.displayable_tickets().len(),
                "Work store loaded"
            );
            Loaded {
                store,
                problem: None,
            }
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Work store is corrupt, starting empty");
            let backup = corrupt_backup_path(path);
            if let Err(copy_err) = fs::copy(path, &backup) {
                tracing::warn!(
                    backup = %backup.display(),
                    error = %copy_err,
                    "Could not back up corrupt work store"
                );
            }
            Loaded {
                store: WorkStore::default(),
                problem: Some(e),
            }
        }
    }
}

/// Deserialize and migrate a store document.
pub fn parse(content: &str) -> Result<WorkStore> {
    if content.trim().is_empty() {
        return Ok(WorkStore::default());
    }
    let mut store: WorkStore = serde_json::from_str(content)?;
    if migrate(&mut store) {
        tracing::info!("Work store migrated to the current schema");
    }
    Ok(store)
}

/// Write the store atomically.
pub fn save(path: &Path, store: &WorkStore) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(store)?;
    let tmp = temp_path(path);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    tracing::trace!(path = %path.display(), bytes = json.len(), "Work store saved");
    Ok(())
}

/// Bring a freshly deserialized store up to the current schema and repair
/// broken invariants. Idempotent; returns true when anything changed.
///
/// Subtask shapes are already normalized by deserialization. This pass
/// handles what needs the whole store:
/// - legacy `PR:` note lines are dropped from subtasks that carry a `pr_url`
/// - a ticket in more than one of current/paused/completed keeps only the
///   most live role
/// - every current, paused or completed ticket gets `sub_tasks` and `notes`
///   entries
/// - focus flags and pointers are reconciled to a single focused subtask
pub fn migrate(store: &mut WorkStore) -> bool {
    let before = store.clone();

    for subs in store.sub_tasks.values_mut() {
        migrate_subtasks(subs);
    }
    for paused in &mut store.paused_tasks {
        migrate_subtasks(&mut paused.sub_tasks);
    }

    reconcile_membership(store);

    let referenced: Vec<String> = store
        .current_ticket
        .iter()
        .cloned()
        .chain(store.paused_tasks.iter().map(|p| p.ticket.clone()))
        .chain(store.completed_tickets.iter().cloned())
        .collect();
    for ticket in referenced {
        store.ensure_ticket(&ticket);
    }

    match (&store.current_ticket, &store.task_start_time) {
        (Some(_), None) => store.task_start_time = Some(Local::now()),
        (None, Some(_)) => store.task_start_time = None,
        _ => {}
    }

    reconcile_focus(store);

    *store != before
}

/// Per-subtask cleanup shared by load and resume-from-pause.
pub fn migrate_subtasks(subs: &mut SubtaskMap) -> bool {
    let mut changed = false;
    for subtask in subs.values_mut() {
        if subtask.pr_url().is_some() {
            let before = subtask.notes.len();
            subtask
                .notes
                .retain(|n| !n.trim_start().starts_with(LEGACY_PR_NOTE_PREFIX));
            changed |= subtask.notes.len() != before;
        }
        if subtask.done && subtask.focused {
            subtask.focused = false;
            changed = true;
        }
    }
    changed
}

fn reconcile_membership(store: &mut WorkStore) {
    if let Some(current) = store.current_ticket.clone() {
        store.completed_tickets.remove(&current);
        store.paused_tasks.retain(|p| p.ticket != current);
    }

    let mut seen = BTreeSet::new();
    store
        .paused_tasks
        .retain(|p| !p.ticket.is_empty() && seen.insert(p.ticket.clone()));
    for ticket in &seen {
        store.completed_tickets.remove(ticket);
    }
}

fn reconcile_focus(store: &mut WorkStore) {
    let pointed = store
        .focused()
        .filter(|(ticket, name)| {
            !store.is_completed(ticket)
                && store
                    .sub_tasks
                    .get(*ticket)
                    .and_then(|subs| subs.get(*name))
                    .is_some_and(|s| !s.done)
        })
        .map(|(t, s)| (t.to_string(), s.to_string()));

    let flagged = || {
        store.sub_tasks.iter().find_map(|(ticket, subs)| {
            subs.iter()
                .find(|(_, s)| s.focused && !s.done)
                .filter(|_| !store.is_completed(ticket))
                .map(|(name, _)| (ticket.clone(), name.clone()))
        })
    };

    match pointed.or_else(flagged) {
        Some((ticket, name)) => store.focus_on(&ticket, Some(&name)),
        None => {
            let ticket_only = store
                .focused_ticket
                .clone()
                .filter(|t| store.focused_subtask.is_none() && !store.is_completed(t));
            store.clear_focus();
            if let Some(ticket) = ticket_only.filter(|t| store.knows_ticket(t)) {
                store.focus_on(&ticket, None);
            }
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "tasks.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn corrupt_backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "tasks.json".into());
    name.push(".corrupt");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PausedTask, PrStatus, Subtask};
    use tempfile::TempDir;

    const LEGACY: &str = r#"{
        "current_ticket": "ABC-1",
        "task_start_time": 1700000000.0,
        "tasks_done": {},
        "sub_tasks": {
            "ABC-1": {
                "write tests": true,
                "review": {"done": false, "pr_url": "http://stash/projects/P/repos/r/pull-requests/4",
                           "notes": ["PR: old link", "keep me"], "pr_unhandled_comments": ["x"]},
                "ABC-7 follow up": {"focused": true}
            },
            "OLD-9": false
        },
        "completed_tickets": ["ABC-1", "DONE-2"],
        "paused_tasks": [
            {"ticket": "DEF-2", "sub_tasks": {"a": 1}, "notes": ["n"], "task_start_time": null}
        ],
        "focused_ticket": null,
        "focused_subtask": null
    }"#;

    #[test]
    fn test_migrate_legacy_store() {
        let store = parse(LEGACY).unwrap();

        let abc = &store.sub_tasks["ABC-1"];
        assert!(abc["write tests"].done);
        assert_eq!(abc["review"].notes, vec!["keep me"]);
        assert_eq!(abc["review"].pr_status, Some(PrStatus::AttentionNeeded));
        assert!(store.sub_tasks["OLD-9"].is_empty());

        // current wins over completed
        assert!(!store.completed_tickets.contains("ABC-1"));
        assert!(store.completed_tickets.contains("DONE-2"));
        assert!(store.sub_tasks.contains_key("DONE-2"));
        assert!(store.notes.contains_key("DEF-2"));

        // paused snapshot shapes are migrated too
        assert!(store.paused_tasks[0].sub_tasks["a"].done);

        // stray focus flag adopted by the pointers
        assert_eq!(store.focused(), Some(("ABC-1", "ABC-7 follow up")));
        assert!(store.invariant_violations().is_empty());
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let mut once = parse(LEGACY).unwrap();
        let snapshot = once.clone();
        assert!(!migrate(&mut once));
        assert_eq!(once, snapshot);
    }

    #[test]
    fn test_dangling_focus_pointer_is_cleared() {
        let mut store = WorkStore {
            focused_ticket: Some("GONE-1".to_string()),
            focused_subtask: Some("nothing".to_string()),
            ..Default::default()
        };
        assert!(migrate(&mut store));
        assert_eq!(store.focused_ticket, None);
        assert_eq!(store.focused_subtask, None);
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tasks.json");

        let mut store = WorkStore {
            current_ticket: Some("ÄÖ-1".to_string()),
            task_start_time: Some(Local::now()),
            ..Default::default()
        };
        store.ensure_ticket("ÄÖ-1");
        store.sub_tasks.get_mut("ÄÖ-1").unwrap().insert(
            "tärkeä".to_string(),
            Subtask {
                notes: vec!["muistiinpano".to_string()],
                ..Default::default()
            },
        );
        store.paused_tasks.push(PausedTask {
            ticket: "B-2".to_string(),
            sub_tasks: SubtaskMap::new(),
            notes: vec![],
            task_start_time: None,
        });
        store.ensure_ticket("B-2");

        save(&path, &store).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("tärkeä"), "non-ASCII must be written verbatim");

        let loaded = load(&path);
        assert!(loaded.problem.is_none());
        let mut expected = store.clone();
        migrate(&mut expected);
        assert_eq!(loaded.store, expected);
        assert!(!dir.path().join("nested").join("tasks.json.tmp").exists());
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let loaded = load(&dir.path().join("absent.json"));
        assert!(loaded.problem.is_none());
        assert_eq!(loaded.store, WorkStore::default());
    }

    #[test]
    fn test_corrupt_file_degrades_and_is_backed_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(&path, "{ not json").unwrap();

        let loaded = load(&path);
        assert!(loaded.problem.is_some());
        assert_eq!(loaded.store, WorkStore::default());
        assert!(dir.path().join("tasks.json.corrupt").exists());
    }

    #[test]
    fn test_save_failure_keeps_previous_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        save(&path, &WorkStore::default()).unwrap();
        let good = fs::read_to_string(&path).unwrap();

        // a directory squatting on the temp name makes the write fail
        fs::create_dir(dir.path().join("tasks.json.tmp")).unwrap();
        let store = WorkStore {
            current_ticket: Some("X-1".to_string()),
            ..Default::default()
        };
        assert!(save(&path, &store).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), good);
    }
}
