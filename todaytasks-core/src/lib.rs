//! # todaytasks-core
//!
//! Core library for todaytasks - a terminal tracker for the ticket you are
//! working on right now.
//!
//! This library provides:
//! - Domain types for tickets, subtasks, events and notes
//! - The JSON work store with schema migration
//! - The command interpreter behind the command prompt
//! - Scheduling of meetings and interruptions, with reminders
//! - Issue tracker and code review synchronizers
//! - Configuration, translation and logging infrastructure
//!
//! ## Architecture
//!
//! The UI and the background workers share one [`AppContext`]:
//! - **Commands** run [`command::interpret`] on the locked store and swap in
//!   the result atomically.
//! - **Workers** snapshot the store, do network I/O without the lock, and
//!   merge back only the fields they own.
//!
//! ## Example
//!
//! ```rust,no_run
//! use todaytasks_core::{command, store, Config, Translator};
//!
//! let config = Config::load().expect("failed to load config");
//! let tr = Translator::load(&config.language).expect("failed to load translations");
//! let loaded = store::load(&config.storage.data_file());
//!
//! for (i, ticket) in loaded.store.displayable_tickets().iter().enumerate() {
//!     println!("{}. {}", i + 1, ticket);
//! }
//! let _ = (command::tokenize("n ABC-1"), tr);
//! ```

// Re-export commonly used items at the crate root
pub use command::{Directive, Outcome, Selection, ViewMode};
pub use config::Config;
pub use context::AppContext;
pub use error::{Error, FetchError, Result};
pub use notices::{Notice, NoticeBoard, NoticeSource};
pub use translate::Translator;
pub use types::*;

// Public modules
pub mod command;
pub mod config;
pub mod context;
pub mod desktop;
pub mod error;
pub mod issues;
pub mod logging;
pub mod notices;
pub mod pulls;
pub mod schedule;
pub mod store;
pub mod translate;
pub mod types;
pub mod workers;
