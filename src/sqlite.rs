use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::model::{self, Task, TaskInput};
use crate::storage::{Result, Storage};

const CREATE_TASKS_TABLE: &str = "CREATE TABLE IF NOT EXISTS tasks (
                  id           INTEGER PRIMARY KEY AUTOINCREMENT,
                  title        TEXT NOT NULL,
                  priority     INTEGER NOT NULL,
                  inbox        INTEGER NOT NULL,
                  completed    INTEGER NOT NULL,
                  createdAt    TEXT NOT NULL,
                  updatedAt    TEXT,
                  completedAt  TEXT
                  )";

const SELECT_TASKS: &str =
    "SELECT id, title, priority, inbox, completed, createdAt, updatedAt, completedAt FROM tasks";

const INSERT_TASK: &str = "INSERT INTO tasks (title, priority, inbox, completed, createdAt, updatedAt, completedAt)
                  VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

// createdAt is immutable after the insert.
const UPDATE_TASK: &str = "UPDATE tasks SET title = ?1, priority = ?2, inbox = ?3, completed = ?4,
                  updatedAt = ?5, completedAt = ?6 WHERE id = ?7";

const DELETE_TASK: &str = "DELETE FROM tasks WHERE id = ?1";

/// A task as it sits in the tasks table: booleans as 0/1, timestamps as
/// ISO-8601 text.
#[derive(Debug, Clone, PartialEq)]
struct TaskRow {
    id: i64,
    title: String,
    priority: i64,
    inbox: i64,
    completed: i64,
    created_at: String,
    updated_at: Option<String>,
    completed_at: Option<String>,
}

impl TaskRow {
    fn from_task(task: &Task) -> TaskRow {
        TaskRow {
            id: task.id,
            title: task.title.clone(),
            priority: task.priority,
            inbox: task.inbox as i64,
            completed: task.completed as i64,
            created_at: model::encode_timestamp(&task.created_at),
            updated_at: task.updated_at.as_ref().map(model::encode_timestamp),
            completed_at: task.completed_at.as_ref().map(model::encode_timestamp),
        }
    }

    fn into_task(self) -> Result<Task> {
        Ok(Task {
            id: self.id,
            title: self.title,
            priority: self.priority,
            inbox: self.inbox != 0,
            completed: self.completed != 0,
            created_at: decode("createdAt", self.created_at)?,
            updated_at: self.updated_at.map(|t| decode("updatedAt", t)).transpose()?,
            completed_at: self
                .completed_at
                .map(|t| decode("completedAt", t))
                .transpose()?,
        })
    }

    /// Read a row selected with the column order of `SELECT_TASKS`.
    fn from_row(row: &Row) -> rusqlite::Result<TaskRow> {
        Ok(TaskRow {
            id: row.get(0)?,
            title: row.get(1)?,
            priority: row.get(2)?,
            inbox: row.get(3)?,
            completed: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            completed_at: row.get(7)?,
        })
    }
}

fn decode(column: &'static str, value: String) -> Result<DateTime<Utc>> {
    model::decode_timestamp(&value).ok_or(StoreError::Corrupt { column, value })
}

/// A write stamp that is strictly later than the previous one, even when
/// both land in the same millisecond.
fn next_stamp(previous: Option<&DateTime<Utc>>) -> DateTime<Utc> {
    let now = model::now();
    match previous {
        Some(previous) if now <= *previous => *previous + Duration::milliseconds(1),
        _ => now,
    }
}

fn check_encodable(column: &'static str, value: &DateTime<Utc>) -> Result<()> {
    if model::is_encodable(value) {
        Ok(())
    } else {
        Err(StoreError::TimestampOutOfRange {
            column,
            value: *value,
        })
    }
}

fn find_row(conn: &Connection, id: i64) -> Result<Option<TaskRow>> {
    let row = conn
        .query_row(
            &format!("{} WHERE id = ?1", SELECT_TASKS),
            params![id],
            |row| TaskRow::from_row(row),
        )
        .optional()?;
    Ok(row)
}

fn insert_task(conn: &Connection, input: TaskInput) -> Result<Task> {
    check_encodable("createdAt", &input.created_at)?;
    let mut task = Task {
        id: 0,
        title: input.title,
        priority: input.priority,
        inbox: input.inbox,
        completed: input.completed,
        created_at: input.created_at.trunc_subsecs(3),
        updated_at: Some(next_stamp(None)),
        completed_at: None,
    };
    let row = TaskRow::from_task(&task);
    conn.execute(
        INSERT_TASK,
        params![
            row.title,
            row.priority,
            row.inbox,
            row.completed,
            row.created_at,
            row.updated_at,
            row.completed_at
        ],
    )?;
    task.id = conn.last_insert_rowid();
    debug!(id = task.id, priority = task.priority, inbox = task.inbox, "task added");
    Ok(task)
}

fn update_task_row(conn: &Connection, mut task: Task) -> Result<Task> {
    let stored = find_row(conn, task.id)?
        .ok_or(StoreError::NotFound { id: task.id })?
        .into_task()?;

    let stamp = next_stamp(stored.updated_at.as_ref());
    task.created_at = stored.created_at;
    task.updated_at = Some(stamp);
    // completedAt is never cleared once set
    if task.completed_at.is_none() {
        task.completed_at = stored.completed_at;
    }
    if task.completed && task.completed_at.is_none() {
        task.completed_at = Some(stamp);
    }
    if let Some(completed_at) = &task.completed_at {
        check_encodable("completedAt", completed_at)?;
    }

    let row = TaskRow::from_task(&task);
    conn.execute(
        UPDATE_TASK,
        params![
            row.title,
            row.priority,
            row.inbox,
            row.completed,
            row.updated_at,
            row.completed_at,
            row.id
        ],
    )?;
    debug!(id = task.id, completed = task.completed, inbox = task.inbox, "task updated");
    Ok(task)
}

/// Apply `write` to every item inside a single transaction. The first
/// failure drops the transaction, which rolls everything back.
fn in_transaction<T, U>(
    conn: &mut Connection,
    items: Vec<T>,
    what: &'static str,
    mut write: impl FnMut(&Connection, T) -> Result<U>,
) -> Result<Vec<U>> {
    let tx = conn.transaction()?;
    let mut written = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match write(&*tx, item) {
            Ok(done) => written.push(done),
            Err(source) => {
                warn!(index, error = %source, "rolling back batch {}", what);
                return Err(StoreError::Batch {
                    index,
                    source: Box::new(source),
                });
            }
        }
    }
    tx.commit()?;
    debug!(count = written.len(), "batch {} committed", what);
    Ok(written)
}

/// Task storage in a single SQLite file.
pub struct SqliteStorage {
    conn: Connection,
    path: Option<PathBuf>,
    initialized: bool,
}

impl SqliteStorage {
    /// Open (or create) the database file at `path`, creating any missing
    /// parent directories. The schema is not touched until
    /// [`SqliteStorage::initialize`].
    pub fn open(path: &Path) -> Result<SqliteStorage> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).map_err(|source| StoreError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
                debug!(dir = %dir.display(), "created database directory");
            }
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(SqliteStorage {
            conn,
            path: Some(path.to_path_buf()),
            initialized: false,
        })
    }

    /// A throwaway database that lives as long as the handle.
    pub fn open_in_memory() -> Result<SqliteStorage> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Ok(SqliteStorage {
            conn,
            path: None,
            initialized: false,
        })
    }

    /// Switch to write-ahead logging and create the tasks table if needed.
    /// Calling it again is a no-op.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        // journal_mode answers with the mode actually in effect
        let mode: String = self
            .conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        debug!(journal_mode = %mode, "journal mode set");

        self.conn.execute(CREATE_TASKS_TABLE, [])?;
        debug!("tasks table ready");

        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The journal mode SQLite reports for this connection.
    pub fn journal_mode(&self) -> Result<String> {
        let mode = self
            .conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        Ok(mode)
    }

    /// Database file backing this handle, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Close the connection, reporting anything SQLite had to say while
    /// letting go of the file.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, source)| StoreError::Database(source))
    }

    fn ready(&self) -> Result<&Connection> {
        if self.initialized {
            Ok(&self.conn)
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    fn ready_mut(&mut self) -> Result<&mut Connection> {
        if self.initialized {
            Ok(&mut self.conn)
        } else {
            Err(StoreError::NotInitialized)
        }
    }
}

impl Storage for SqliteStorage {
    fn get_tasks(&self) -> Result<Vec<Task>> {
        let conn = self.ready()?;
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY priority ASC, createdAt DESC, id DESC",
            SELECT_TASKS
        ))?;
        let rows = stmt.query_map([], |row| TaskRow::from_row(row))?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.into_task()?);
        }
        Ok(tasks)
    }

    fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let conn = self.ready()?;
        find_row(conn, id)?.map(TaskRow::into_task).transpose()
    }

    fn add_task(&mut self, input: TaskInput) -> Result<Task> {
        insert_task(self.ready()?, input)
    }

    fn update_task(&mut self, task: Task) -> Result<Task> {
        update_task_row(self.ready()?, task)
    }

    fn delete_task(&mut self, id: i64) -> Result<()> {
        let removed = self.ready()?.execute(DELETE_TASK, params![id])?;
        debug!(id, removed, "task delete");
        Ok(())
    }

    fn batch_add_tasks(&mut self, inputs: Vec<TaskInput>) -> Result<Vec<Task>> {
        in_transaction(self.ready_mut()?, inputs, "add", insert_task)
    }

    fn batch_update_tasks(&mut self, tasks: Vec<Task>) -> Result<Vec<Task>> {
        in_transaction(self.ready_mut()?, tasks, "update", update_task_row)
    }
}
