use chrono::NaiveDate;
use tracing::info;

use crate::error::{Error, Result};
use crate::query::{ensure_editable, filtered, sort_for_display};
use crate::store::RecordStore;
use crate::task::{Task, TaskDraft, TaskUpdate};

/// The operations offered to the user. Edit, delete and complete only
/// accept tasks from the active view.
pub struct Organizer<S> {
    store: S,
}

impl<S: RecordStore> Organizer<S> {
    /// Opens the organizer over a store that must already exist.
    pub fn open(store: S) -> Result<Self> {
        store.ensure_exists()?;
        info!("Task organizer initialized");
        Ok(Organizer { store })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn add(&self, draft: TaskDraft) -> Result<Task> {
        let mut task = Task::create(&self.store, None, draft)?;
        task.save(&self.store)?;
        info!("Task added: {}", task.name);
        Ok(task)
    }

    /// Visible, unfinished tasks in display order.
    pub fn active(&self) -> Vec<Task> {
        sort_for_display(filtered(&self.store, true, false))
    }

    pub fn completed(&self) -> Vec<Task> {
        sort_for_display(filtered(&self.store, false, true))
    }

    /// Looks `id` up in the active view.
    pub fn find_active(&self, id: u64) -> Result<Task> {
        filtered(&self.store, true, false)
            .into_iter()
            .find(|t| t.id == id)
            .ok_or(Error::NotFound(id))
    }

    pub fn edit(&self, id: u64, changes: &TaskUpdate, today: NaiveDate) -> Result<Task> {
        let mut task = self.find_active(id)?;
        ensure_editable(&task, today)?;
        task.update(&self.store, changes)?;
        Ok(task)
    }

    pub fn delete(&self, id: u64) -> Result<Task> {
        let mut task = self.find_active(id)?;
        task.delete(&self.store)?;
        Ok(task)
    }

    pub fn complete(&self, id: u64, today: NaiveDate) -> Result<Task> {
        let mut task = self.find_active(id)?;
        task.complete(&self.store, today)?;
        Ok(task)
    }
}
