use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::store::RecordStore;
use crate::task::Task;

/// Returns the id for the next task: one past the highest id in the whole
/// table, retired rows included. An empty, missing or unreadable store gives 1.
pub fn next_id<S: RecordStore>(store: &S) -> Result<u64> {
    match store.load_all() {
        Ok(tasks) => {
            let id = next_id_from(&tasks)?;
            debug!("Next task ID: {id}");
            Ok(id)
        }
        Err(e) => {
            error!("Error retrieving next task ID: {e}");
            Ok(1)
        }
    }
}

/// Fails once the highest id is `u64::MAX`, since ids are never reused.
pub fn next_id_from(tasks: &[Task]) -> Result<u64> {
    match tasks.iter().map(|t| t.id).max() {
        None => Ok(1),
        Some(max) => max.checked_add(1).ok_or(Error::IdsExhausted(max)),
    }
}
