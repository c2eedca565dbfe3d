use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDate, NaiveDateTime, SubsecRound};
use tracing::{debug, error, info};

use crate::allocator;
use crate::codec::parse_date;
use crate::error::{Error, Result, ValidationError};
use crate::store::RecordStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Priority {
    Low,
    Medium,
    High,
    /// A label read back from the store that is none of the above.
    Unknown(String),
}

impl Priority {
    /// Lenient conversion used when reading rows back from the store.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Low" => Priority::Low,
            "Medium" => Priority::Medium,
            "High" => Priority::High,
            other => Priority::Unknown(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Unknown(label) => label,
        }
    }

    /// Display rank, lower sorts first.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
            Priority::Unknown(_) => 4,
        }
    }
}

/// Strict conversion for user input. `high`, ` HIGH ` and `High` are all accepted.
impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let capitalized: String = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
            None => String::new(),
        };
        match Priority::from_label(&capitalized) {
            Priority::Unknown(_) => Err(ValidationError::InvalidPriority(trimmed.to_string())),
            known => Ok(known),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A deadline as stored. Rows written by hand may hold text that is not a date,
/// which is kept verbatim so it survives a rewrite of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deadline {
    Date(NaiveDate),
    Invalid(String),
}

impl Deadline {
    pub fn parse(raw: &str) -> Self {
        match parse_date(raw) {
            Some(date) => Deadline::Date(date),
            None => Deadline::Invalid(raw.to_string()),
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Deadline::Date(date) => Some(*date),
            Deadline::Invalid(_) => None,
        }
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deadline::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Deadline::Invalid(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Active,
    Deleted,
    Completed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Active => write!(f, "active"),
            TaskState::Deleted => write!(f, "deleted"),
            TaskState::Completed => write!(f, "completed"),
        }
    }
}

/// Validated input for a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub name: String,
    pub priority: Priority,
    pub deadline: NaiveDate,
}

impl TaskDraft {
    pub fn parse(name: &str, priority: &str, deadline: &str, today: NaiveDate) -> Result<Self, ValidationError> {
        Ok(TaskDraft {
            name: validate_name(name)?,
            priority: priority.parse()?,
            deadline: parse_deadline_input(deadline, today)?,
        })
    }
}

pub fn validate_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(name.to_string())
}

/// Parses a `YYYY-MM-DD` deadline and rejects dates before `today`.
pub fn parse_deadline_input(raw: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    let raw = raw.trim();
    let date = parse_date(raw).ok_or_else(|| ValidationError::InvalidDate(raw.to_string()))?;
    if date < today {
        return Err(ValidationError::DeadlineInPast(date));
    }
    Ok(date)
}

/// Field changes for [`Task::update`]. `None` and blank names leave the field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub priority: Option<Priority>,
    pub deadline: Option<NaiveDate>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.as_deref().is_none_or(|n| n.trim().is_empty())
            && self.priority.is_none()
            && self.deadline.is_none()
    }

    fn apply_to(&self, task: &mut Task) {
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            task.name = name.to_string();
        }
        if let Some(priority) = &self.priority {
            task.priority = priority.clone();
        }
        if let Some(deadline) = self.deadline {
            task.deadline = Deadline::Date(deadline);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: u64,
    pub name: String,
    pub priority: Priority,
    pub deadline: Deadline,
    pub date_created: NaiveDateTime,
    pub visible: bool,
    pub completed: bool,
    pub date_completed: Option<NaiveDate>,
}

impl Task {
    pub fn new(id: u64, draft: TaskDraft, date_created: NaiveDateTime) -> Self {
        Task {
            id,
            name: draft.name,
            priority: draft.priority,
            deadline: Deadline::Date(draft.deadline),
            date_created,
            visible: true,
            completed: false,
            date_completed: None,
        }
    }

    /// Builds a fresh task, taking the next id from `store` when `id` is `None`.
    pub fn create<S: RecordStore>(store: &S, id: Option<u64>, draft: TaskDraft) -> Result<Self> {
        let id = match id {
            Some(id) => id,
            None => allocator::next_id(store)?,
        };
        // The store keeps microseconds.
        Ok(Task::new(id, draft, Local::now().naive_local().trunc_subsecs(6)))
    }

    pub fn state(&self) -> TaskState {
        match (self.visible, self.completed) {
            (_, true) => TaskState::Completed,
            (true, false) => TaskState::Active,
            (false, false) => TaskState::Deleted,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == TaskState::Active
    }

    pub fn get_by_id<S: RecordStore>(store: &S, id: u64) -> Result<Task> {
        let tasks = store
            .load_all()
            .inspect_err(|e| error!("Error loading task {id}: {e}"))?;
        tasks
            .into_iter()
            .find(|t| t.id == id)
            .ok_or(Error::NotFound(id))
    }

    /// Appends this task to the store. If another row already holds this id,
    /// the task is given the next free one first.
    pub fn save<S: RecordStore>(&mut self, store: &S) -> Result<()> {
        let existing = store
            .load_all()
            .inspect_err(|e| error!("Error saving task '{}': {e}", self.name))?;
        if existing.iter().any(|t| t.id == self.id) {
            let fresh = allocator::next_id_from(&existing)?;
            debug!("Id {} already taken, reassigning to {fresh}", self.id);
            self.id = fresh;
        }
        store
            .append(self)
            .inspect_err(|e| error!("Error saving task '{}': {e}", self.name))?;
        info!("Task '{}' (ID: {}) saved", self.name, self.id);
        Ok(())
    }

    pub fn update<S: RecordStore>(&mut self, store: &S, changes: &TaskUpdate) -> Result<()> {
        *self = self.patch(store, |row| {
            if !row.is_active() {
                return Err(Error::Retired {
                    id: row.id,
                    state: row.state(),
                });
            }
            changes.apply_to(row);
            Ok(())
        })?;
        info!("Task ID {} updated", self.id);
        Ok(())
    }

    /// Soft delete: the row stays in the store with `visible` cleared.
    pub fn delete<S: RecordStore>(&mut self, store: &S) -> Result<()> {
        *self = self.patch(store, |row| match row.state() {
            TaskState::Completed => Err(Error::Retired {
                id: row.id,
                state: TaskState::Completed,
            }),
            _ => {
                row.visible = false;
                Ok(())
            }
        })?;
        info!("Task deleted: {}", self.id);
        Ok(())
    }

    /// Marks the task completed on `today`. Completing twice keeps the first date.
    pub fn complete<S: RecordStore>(&mut self, store: &S, today: NaiveDate) -> Result<()> {
        *self = self.patch(store, |row| match row.state() {
            TaskState::Deleted => Err(Error::Retired {
                id: row.id,
                state: TaskState::Deleted,
            }),
            _ => {
                row.completed = true;
                row.visible = false;
                row.date_completed.get_or_insert(today);
                Ok(())
            }
        })?;
        info!("Task completed: {}", self.id);
        Ok(())
    }

    /// Loads the whole table, applies `apply` to this task's row and writes the table back.
    fn patch<S, F>(&self, store: &S, apply: F) -> Result<Task>
    where
        S: RecordStore,
        F: FnOnce(&mut Task) -> Result<()>,
    {
        let mut tasks = store
            .load_all()
            .inspect_err(|e| error!("Error loading tasks for ID {}: {e}", self.id))?;
        let row = tasks
            .iter_mut()
            .find(|t| t.id == self.id)
            .ok_or(Error::NotFound(self.id))?;
        apply(row)?;
        let patched = row.clone();
        store
            .replace_all(&tasks)
            .inspect_err(|e| error!("Error writing tasks for ID {}: {e}", self.id))?;
        Ok(patched)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Days, NaiveDate};

    use super::*;
    use crate::store::MemoryStore;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 12).unwrap()
    }

    fn draft(name: &str, priority: Priority) -> TaskDraft {
        TaskDraft {
            name: name.to_string(),
            priority,
            deadline: today().checked_add_days(Days::new(7)).unwrap(),
        }
    }

    fn saved(store: &MemoryStore, name: &str) -> Task {
        let mut task = Task::create(store, None, draft(name, Priority::Medium)).unwrap();
        task.save(store).unwrap();
        task
    }

    #[test]
    fn priority_input_is_capitalized() {
        assert_eq!("high".parse::<Priority>(), Ok(Priority::High));
        assert_eq!(" LOW ".parse::<Priority>(), Ok(Priority::Low));
        assert_eq!(
            "urgent".parse::<Priority>(),
            Err(ValidationError::InvalidPriority("urgent".to_string()))
        );
        assert_eq!(
            "".parse::<Priority>(),
            Err(ValidationError::InvalidPriority(String::new()))
        );
    }

    #[test]
    fn draft_validation() {
        assert_eq!(
            TaskDraft::parse("  ", "High", "2025-03-20", today()),
            Err(ValidationError::EmptyName)
        );
        assert_eq!(
            TaskDraft::parse("Write", "High", "20-03-2025", today()),
            Err(ValidationError::InvalidDate("20-03-2025".to_string()))
        );
        assert_eq!(
            TaskDraft::parse("Write", "High", "2025-03-11", today()),
            Err(ValidationError::DeadlineInPast(
                NaiveDate::from_ymd_opt(2025, 3, 11).unwrap()
            ))
        );
        let ok = TaskDraft::parse(" Write ", "medium", "2025-03-12", today()).unwrap();
        assert_eq!(ok.name, "Write");
        assert_eq!(ok.priority, Priority::Medium);
        assert_eq!(ok.deadline, today());
    }

    #[test]
    fn first_task_in_empty_store() {
        let store = MemoryStore::default();
        let mut task = Task::create(&store, None, draft("A", Priority::High)).unwrap();
        task.save(&store).unwrap();

        assert_eq!(task.id, 1);
        assert!(task.visible);
        assert!(!task.completed);
        assert_eq!(task.date_completed, None);
        assert_eq!(Task::get_by_id(&store, 1).unwrap(), task);
    }

    #[test]
    fn save_reassigns_taken_id() {
        let store = MemoryStore::default();
        saved(&store, "A");
        let mut clash = Task::create(&store, Some(1), draft("B", Priority::Low)).unwrap();
        clash.save(&store).unwrap();

        assert_eq!(clash.id, 2);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn save_fails_when_ids_run_out() {
        let store = MemoryStore::default();
        let mut last = saved(&store, "A");
        last.id = u64::MAX;
        store.replace_all(std::slice::from_ref(&last)).unwrap();

        let mut clash = Task::create(&store, Some(u64::MAX), draft("B", Priority::Low)).unwrap();
        assert!(matches!(clash.save(&store), Err(Error::IdsExhausted(u64::MAX))));
        assert_eq!(store.snapshot(), vec![last]);
    }

    #[test]
    fn update_patches_only_supplied_fields() {
        let store = MemoryStore::default();
        let mut task = saved(&store, "A");
        let changes = TaskUpdate {
            name: Some("   ".to_string()),
            priority: Some(Priority::High),
            deadline: None,
        };
        task.update(&store, &changes).unwrap();

        let stored = Task::get_by_id(&store, task.id).unwrap();
        assert_eq!(stored.name, "A");
        assert_eq!(stored.priority, Priority::High);
        assert_eq!(stored.deadline, Deadline::Date(today().checked_add_days(Days::new(7)).unwrap()));
        assert_eq!(stored, task);
    }

    #[test]
    fn update_missing_task_is_not_found() {
        let store = MemoryStore::default();
        let mut ghost = Task::create(&store, Some(9), draft("ghost", Priority::Low)).unwrap();
        let res = ghost.update(&store, &TaskUpdate::default());
        assert!(matches!(res, Err(Error::NotFound(9))));
    }

    #[test]
    fn delete_is_soft() {
        let store = MemoryStore::default();
        let mut task = saved(&store, "A");
        task.delete(&store).unwrap();

        let rows = store.snapshot();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].visible);
        assert!(!rows[0].completed);
        assert_eq!(rows[0].state(), TaskState::Deleted);
    }

    #[test]
    fn complete_retires_and_stamps_date() {
        let store = MemoryStore::default();
        let mut task = saved(&store, "A");
        task.complete(&store, today()).unwrap();

        let stored = Task::get_by_id(&store, task.id).unwrap();
        assert!(stored.completed);
        assert!(!stored.visible);
        assert_eq!(stored.date_completed, Some(today()));

        let later = today().checked_add_days(Days::new(1)).unwrap();
        task.complete(&store, later).unwrap();
        assert_eq!(
            Task::get_by_id(&store, task.id).unwrap().date_completed,
            Some(today())
        );
    }

    #[test]
    fn complete_missing_task_leaves_store_untouched() {
        let store = MemoryStore::default();
        saved(&store, "A");
        let before = store.snapshot();
        let mut ghost = Task::create(&store, Some(5), draft("ghost", Priority::Low)).unwrap();

        assert!(matches!(ghost.complete(&store, today()), Err(Error::NotFound(5))));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn terminal_states_do_not_cross() {
        let store = MemoryStore::default();
        let mut deleted = saved(&store, "A");
        let mut done = saved(&store, "B");
        deleted.delete(&store).unwrap();
        done.complete(&store, today()).unwrap();

        assert!(matches!(
            deleted.complete(&store, today()),
            Err(Error::Retired { state: TaskState::Deleted, .. })
        ));
        assert!(matches!(
            done.delete(&store),
            Err(Error::Retired { state: TaskState::Completed, .. })
        ));
        assert!(matches!(
            done.update(&store, &TaskUpdate::default()),
            Err(Error::Retired { .. })
        ));
    }
}
