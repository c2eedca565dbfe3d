/*!
    Views over the task table: filtering by state flags, display
    ordering and the time-remaining label.
!*/
use std::fmt;

use chrono::NaiveDate;
use tracing::{error, warn};

use crate::error::{Error, Result};
use crate::store::RecordStore;
use crate::task::{Deadline, Task};

/// Tasks whose flags equal `visible` and `completed` exactly.
/// Store failures are logged and read as an empty table.
pub fn filtered<S: RecordStore>(store: &S, visible: bool, completed: bool) -> Vec<Task> {
    match store.load_all() {
        Ok(tasks) => filter_tasks(tasks, visible, completed),
        Err(e) => {
            error!("Error reading tasks: {e}");
            Vec::new()
        }
    }
}

pub fn filter_tasks(tasks: Vec<Task>, visible: bool, completed: bool) -> Vec<Task> {
    tasks
        .into_iter()
        .filter(|t| t.visible == visible && t.completed == completed)
        .collect()
}

/// Orders by priority rank, then by deadline. Unparsable deadlines go last,
/// and ties keep their table order.
pub fn sort_for_display(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by_key(|t| (t.priority.rank(), t.deadline.date().unwrap_or(NaiveDate::MAX)));
    tasks
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRemaining {
    Days(i64),
    Overdue,
    InvalidDate,
}

impl fmt::Display for TimeRemaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeRemaining::Days(days) => write!(f, "{days} days"),
            TimeRemaining::Overdue => write!(f, "Overdue"),
            TimeRemaining::InvalidDate => write!(f, "Invalid Date"),
        }
    }
}

pub fn time_remaining(task: &Task, today: NaiveDate) -> TimeRemaining {
    match task.deadline.date() {
        Some(deadline) if deadline > today => TimeRemaining::Days((deadline - today).num_days()),
        Some(_) => TimeRemaining::Overdue,
        None => TimeRemaining::InvalidDate,
    }
}

/// A deadline on or before `today`. Unparsable deadlines are not overdue.
pub fn is_overdue(task: &Task, today: NaiveDate) -> bool {
    time_remaining(task, today) == TimeRemaining::Overdue
}

/// Edits are refused for overdue tasks and for tasks whose deadline cannot be read.
pub fn ensure_editable(task: &Task, today: NaiveDate) -> Result<()> {
    match &task.deadline {
        Deadline::Invalid(raw) => {
            warn!("Task ID {} has an invalid deadline: {raw}. Editing not allowed.", task.id);
            Err(Error::InvalidDeadline {
                id: task.id,
                raw: raw.clone(),
            })
        }
        Deadline::Date(deadline) if is_overdue(task, today) => {
            warn!("Attempted to edit overdue task ID {}. Editing not allowed.", task.id);
            Err(Error::TaskOverdue {
                id: task.id,
                deadline: *deadline,
            })
        }
        Deadline::Date(_) => Ok(()),
    }
}
