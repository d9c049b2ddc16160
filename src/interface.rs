use std::collections::HashSet;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use humantime::format_duration;
use prettytable::{Cell, Row, Table};
use tracing::info;

pub use crate::error::ValidationError;

use crate::error::StoreError;
use crate::model::{self, Status, Task, TaskInput, DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY};
use crate::storage::Storage;

const TITLE_WIDTH: usize = 50;

/// Parse a priority given on the command line.
pub fn parse_priority(text: &str) -> Result<i64, ValidationError> {
    let priority = text
        .trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::PriorityNotANumber(text.to_string()))?;
    check_priority(priority)
}

fn check_priority(priority: i64) -> Result<i64, ValidationError> {
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        return Err(ValidationError::PriorityOutOfRange(priority));
    }
    Ok(priority)
}

fn validate_title(title: &str) -> Result<String, ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(title.to_string())
}

/// How task lists are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Table,
    Json,
    Markdown,
}

impl FromStr for Format {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(Format::Table),
            "json" => Ok(Format::Json),
            "markdown" | "md" => Ok(Format::Markdown),
            _ => Err(ValidationError::UnknownFormat(s.to_string())),
        }
    }
}

/// In-memory filter over the full task list.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub priority: Option<i64>,
    pub status: Option<Status>,
    pub inbox: Option<bool>,
}

impl ListFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.priority.map_or(true, |p| task.priority == p)
            && self.status.map_or(true, |s| s.matches(task))
            && self.inbox.map_or(true, |i| task.inbox == i)
    }
}

/// Add the given titles. A single title is a plain insert, several go in
/// as one batch.
pub fn add(
    storage: &mut dyn Storage,
    titles: Vec<String>,
    priority: Option<i64>,
    inbox: bool,
) -> Result<Vec<Task>> {
    let priority = check_priority(priority.unwrap_or(DEFAULT_PRIORITY))?;
    let mut inputs = Vec::with_capacity(titles.len());
    for title in &titles {
        inputs.push(TaskInput::new(validate_title(title)?, priority, inbox));
    }

    let added = if inputs.len() == 1 {
        vec![storage
            .add_task(inputs.remove(0))
            .context("Failed to add task")?]
    } else {
        storage
            .batch_add_tasks(inputs)
            .context("Failed to add tasks")?
    };

    for task in &added {
        info!(id = task.id, "added task");
        println!("Task added with ID {}", task.id);
    }
    if added.iter().any(|task| task.inbox) {
        println!("Task added to inbox. Use \"taskbox inbox\" to view your inbox.");
    }
    Ok(added)
}

/// Every task matching the filter, in storage order.
pub fn list(storage: &dyn Storage, filter: &ListFilter) -> Result<Vec<Task>> {
    let tasks = storage.get_tasks().context("Error listing tasks")?;
    Ok(tasks.into_iter().filter(|task| filter.matches(task)).collect())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Completed { task: Task, left_inbox: bool },
    AlreadyCompleted(Task),
}

/// Complete the given tasks. Every id is checked before anything is
/// written, and several tasks are updated as one batch.
pub fn complete(storage: &mut dyn Storage, ids: &[i64]) -> Result<Vec<Completion>> {
    let mut seen = HashSet::new();
    let mut pending = Vec::new();
    let mut outcomes = Vec::new();

    for &id in ids.iter().filter(|id| seen.insert(**id)) {
        let task = storage
            .get_task(id)?
            .ok_or(StoreError::NotFound { id })?;
        if task.completed {
            outcomes.push(Completion::AlreadyCompleted(task));
        } else {
            pending.push(task);
        }
    }

    let left_inbox: Vec<bool> = pending.iter().map(|task| task.inbox).collect();
    let stamp = model::now();
    let mut updates: Vec<Task> = pending
        .into_iter()
        .map(|mut task| {
            task.completed = true;
            task.completed_at = Some(stamp);
            task.inbox = false;
            task
        })
        .collect();

    let updated = match updates.len() {
        0 => Vec::new(),
        1 => vec![storage
            .update_task(updates.remove(0))
            .context("Failed to complete task")?],
        _ => storage
            .batch_update_tasks(updates)
            .context("Failed to complete tasks")?,
    };

    for outcome in &outcomes {
        if let Completion::AlreadyCompleted(task) = outcome {
            println!("Task {} is already complete", task.id);
        }
    }
    for (task, left_inbox) in updated.into_iter().zip(left_inbox) {
        info!(id = task.id, "completed task");
        println!("Task {} marked as complete", task.id);
        if left_inbox {
            println!("Task removed from inbox.");
        }
        outcomes.push(Completion::Completed { task, left_inbox });
    }
    Ok(outcomes)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Move {
    Moved(Task),
    AlreadyThere(Task),
}

fn destination(to_inbox: bool) -> &'static str {
    if to_inbox {
        "inbox"
    } else {
        "outside inbox"
    }
}

/// Put a task in or take it out of the inbox. Asking for the place it
/// already is writes nothing.
pub fn move_task(storage: &mut dyn Storage, id: i64, to_inbox: bool) -> Result<Move> {
    let mut task = storage
        .get_task(id)?
        .ok_or(StoreError::NotFound { id })?;

    if task.inbox == to_inbox {
        println!(
            "Task {} is already {}",
            id,
            if to_inbox { "in inbox" } else { "out of inbox" }
        );
        return Ok(Move::AlreadyThere(task));
    }

    task.inbox = to_inbox;
    let task = storage
        .update_task(task)
        .with_context(|| format!("Failed to move task to {}", destination(to_inbox)))?;
    info!(id, to_inbox, "moved task");
    println!("Task {} moved to {}", id, destination(to_inbox));
    Ok(Move::Moved(task))
}

/// Delete a task, failing if it does not exist.
pub fn remove(storage: &mut dyn Storage, id: i64) -> Result<Task> {
    let task = storage
        .get_task(id)?
        .ok_or(StoreError::NotFound { id })?;
    storage.delete_task(id).context("Failed to remove task")?;
    info!(id, "removed task");
    println!("Task {} removed", id);
    Ok(task)
}

/// Print tasks in the requested format.
pub fn print_tasks(tasks: &[Task], format: Format) -> Result<()> {
    if tasks.is_empty() && format != Format::Json {
        println!("No tasks found.");
        return Ok(());
    }
    match format {
        Format::Table => {
            task_table(tasks, model::now()).printstd();
        }
        Format::Json => println!("{}", to_json(tasks)?),
        Format::Markdown => print!("{}", to_markdown(tasks)),
    }
    Ok(())
}

fn priority_label(priority: i64) -> String {
    match priority {
        0 => "-".to_string(),
        p => format!("P{}", p),
    }
}

fn priority_style(priority: i64) -> &'static str {
    match priority {
        1 => "Fr",
        2 => "Fy",
        3 => "Fb",
        4 => "FD",
        _ => "",
    }
}

/// Time since creation, to the minute.
fn age(task: &Task, now: DateTime<Utc>) -> String {
    let elapsed = (now - task.created_at).to_std().unwrap_or_default();
    if elapsed.as_secs() < 60 {
        return "just now".to_string();
    }
    let minutes = std::time::Duration::from_secs(elapsed.as_secs() / 60 * 60);
    format!("{} ago", format_duration(minutes))
}

/// The terminal table. Priority columns are colored when printed to a tty.
pub fn task_table(tasks: &[Task], now: DateTime<Utc>) -> Table {
    let mut table = Table::new();
    table.set_titles(row![b->"ID", b->"PRIORITY", b->"TITLE", b->"INBOX", b->"STATUS", b->"AGE"]);

    for task in tasks {
        let style = priority_style(task.priority);
        let status = if task.completed {
            Cell::new("Done").style_spec("Fg")
        } else {
            Cell::new("Pending").style_spec("Fy")
        };
        table.add_row(Row::new(vec![
            Cell::new(&task.id.to_string()).style_spec(style),
            Cell::new(&priority_label(task.priority)).style_spec(style),
            Cell::new(&textwrap::fill(&task.title, TITLE_WIDTH)),
            Cell::new(if task.inbox { "✓" } else { "" }).style_spec("Fb"),
            status,
            Cell::new(&age(task, now)),
        ]));
    }
    table
}

pub fn to_json(tasks: &[Task]) -> Result<String> {
    serde_json::to_string_pretty(tasks).context("Failed to serialize tasks")
}

pub fn to_markdown(tasks: &[Task]) -> String {
    let mut out = String::from("# Tasks\n\n");
    out.push_str("| ID | Priority | Title | Inbox | Status |\n");
    out.push_str("| --- | --- | --- | --- | --- |\n");
    for task in tasks {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            task.id,
            task.priority,
            task.title.replace('|', "\\|"),
            if task.inbox { "✓" } else { "" },
            if task.completed { "Completed" } else { "Pending" },
        ));
    }
    out
}
