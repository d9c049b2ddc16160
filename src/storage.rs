use crate::error::StoreError;
use crate::model::{Task, TaskInput};

pub type Result<T> = std::result::Result<T, StoreError>;

/// The task store. Command handlers only ever talk to this trait, so any
/// backend that honors it can sit behind the CLI.
///
/// Tasks handed out are snapshots: changing one does nothing until it is
/// passed back through [`Storage::update_task`].
pub trait Storage {
    /// All tasks, by priority ascending, newest first within a priority.
    fn get_tasks(&self) -> Result<Vec<Task>>;

    /// The task with the given id, or `None` if there is none.
    fn get_task(&self, id: i64) -> Result<Option<Task>>;

    /// Store a new task and return it with its assigned id.
    fn add_task(&mut self, input: TaskInput) -> Result<Task>;

    /// Overwrite every mutable field of an existing task and stamp
    /// `updated_at`. Fails with [`StoreError::NotFound`] if the id is
    /// unknown.
    fn update_task(&mut self, task: Task) -> Result<Task>;

    /// Remove a task. Removing a missing id is not an error.
    fn delete_task(&mut self, id: i64) -> Result<()>;

    /// Add all inputs in one transaction. Either every task is stored or
    /// none is.
    fn batch_add_tasks(&mut self, inputs: Vec<TaskInput>) -> Result<Vec<Task>>;

    /// Update all tasks in one transaction. Either every task is written or
    /// none is.
    fn batch_update_tasks(&mut self, tasks: Vec<Task>) -> Result<Vec<Task>>;
}
