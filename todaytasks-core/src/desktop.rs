//! Fire-and-forget desktop side effects
//!
//! Notifications, opening links and raising the tracker's terminal window.
//! Nothing here reports failure: a missing `notify-send` or `xdotool` only
//! shows up in the debug log.

use crate::config::NotificationConfig;
use std::process::{Command, Stdio};
use std::sync::{Mutex, PoisonError};

/// Desktop integration used by the background workers.
pub trait Desktop: Send + Sync {
    fn notify(&self, title: &str, body: &str);
    fn open_url(&self, url: &str);
    fn focus_window(&self, title: &str);
}

/// Spawns the configured desktop tools.
#[derive(Debug, Clone)]
pub struct SystemDesktop {
    notify_command: String,
    browser_command: Vec<String>,
}

impl SystemDesktop {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            notify_command: config.notify_command.clone(),
            browser_command: config.browser_command.clone(),
        }
    }

    fn spawn(program: &str, args: &[&str]) {
        let result = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match result {
            // reap in the background so no zombie is left behind
            Ok(mut child) => {
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(e) => tracing::debug!(program, error = %e, "Desktop command failed to start"),
        }
    }
}

impl Desktop for SystemDesktop {
    fn notify(&self, title: &str, body: &str) {
        tracing::debug!(title, "Sending desktop notification");
        Self::spawn(&self.notify_command, &[title, body]);
    }

    fn open_url(&self, url: &str) {
        tracing::debug!(url, "Opening link");
        match self.browser_command.split_first() {
            Some((program, args)) => {
                let mut all: Vec<&str> = args.iter().map(String::as_str).collect();
                all.push(url);
                Self::spawn(program, &all);
            }
            None => Self::spawn("xdg-open", &[url]),
        }
    }

    fn focus_window(&self, title: &str) {
        Self::spawn("xdotool", &["search", "--name", title, "windowactivate"]);
    }
}

/// One recorded desktop call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopAction {
    Notify { title: String, body: String },
    OpenUrl(String),
    FocusWindow(String),
}

/// Records calls instead of touching the desktop.
#[derive(Debug, Default)]
pub struct RecordingDesktop {
    actions: Mutex<Vec<DesktopAction>>,
}

impl RecordingDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<DesktopAction> {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded notifications as `(title, body)`.
    pub fn notifications(&self) -> Vec<(String, String)> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                DesktopAction::Notify { title, body } => Some((title, body)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, action: DesktopAction) {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action);
    }
}

impl Desktop for RecordingDesktop {
    fn notify(&self, title: &str, body: &str) {
        self.record(DesktopAction::Notify {
            title: title.to_string(),
            body: body.to_string(),
        });
    }

    fn open_url(&self, url: &str) {
        self.record(DesktopAction::OpenUrl(url.to_string()));
    }

    fn focus_window(&self, title: &str) {
        self.record(DesktopAction::FocusWindow(title.to_string()));
    }
}
