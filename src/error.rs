/*!
    Error taxonomy shared by the store, the task entity
    and the caller-facing flows.
!*/
use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::task::TaskState;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Which part of the configured store location is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEntry {
    Folder,
    File,
}

impl fmt::Display for StoreEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreEntry::Folder => write!(f, "Folder"),
            StoreEntry::File => write!(f, "File"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{entry} '{}' does not exist. Please create it manually.", .path.display())]
    StoreNotFound { entry: StoreEntry, path: PathBuf },

    #[error("Task store is corrupt at record {record}: {reason}")]
    StoreCorrupt { record: usize, reason: String },

    #[error("Task {0} not found")]
    NotFound(u64),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Task {id} is overdue (deadline {deadline}) and cannot be edited")]
    TaskOverdue { id: u64, deadline: NaiveDate },

    #[error("Task {id} has an invalid deadline '{raw}' and cannot be edited")]
    InvalidDeadline { id: u64, raw: String },

    #[error("No task id is left after {0}")]
    IdsExhausted(u64),

    #[error("Task {id} is already {state}")]
    Retired { id: u64, state: TaskState },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Input rejected before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Task name cannot be empty")]
    EmptyName,

    #[error("Invalid priority '{0}', expected Low, Medium or High")]
    InvalidPriority(String),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Deadline {0} cannot be in the past")]
    DeadlineInPast(NaiveDate),
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn store_not_found_tells_user_to_create_it() {
        let err = Error::StoreNotFound {
            entry: StoreEntry::Folder,
            path: PathBuf::from("data"),
        };
        assert_eq!(
            err.to_string(),
            "Folder 'data' does not exist. Please create it manually."
        );
    }

    #[test]
    fn validation_errors_pass_through() {
        let err = Error::from(ValidationError::InvalidPriority("Urgent".to_string()));
        assert!(err.to_string().contains("Urgent"));
        assert!(matches!(err, Error::Validation(_)));
    }
}
