//! A local-first task tracker. Tasks live in a single SQLite file behind
//! the [`storage::Storage`] trait; the command handlers in [`interface`]
//! only ever talk to that trait.

#[macro_use]
extern crate prettytable;

pub mod cli;
pub mod config;
pub mod error;
pub mod interface;
pub mod model;
pub mod sqlite;
pub mod storage;

pub use error::{StoreError, ValidationError};
pub use model::{Task, TaskInput, DEFAULT_INBOX, DEFAULT_PRIORITY};
pub use sqlite::SqliteStorage;
pub use storage::Storage;
