/*!
    Provides the record store that holds every task row,
    visible or not, in one flat CSV file.
!*/
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;
use tracing::{debug, error, info};

use crate::codec::{self, Columns};
use crate::config::Configuration;
use crate::error::{Error, Result, StoreEntry};
use crate::task::Task;

/// Whole-table access to the task rows.
///
/// Every call is a full round trip to the backing storage. Nothing is
/// cached between calls and nothing is locked, so two writers racing on
/// the same store can lose each other's updates.
pub trait RecordStore {
    /// Checks that the store has been provisioned. Never creates anything.
    fn ensure_exists(&self) -> Result<()>;

    /// All rows in insertion order. A missing or empty store is empty, not an error.
    fn load_all(&self) -> Result<Vec<Task>>;

    fn append(&self, task: &Task) -> Result<()>;

    /// Replaces the whole table with `tasks`.
    fn replace_all(&self, tasks: &[Task]) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct CsvStore {
    directory: PathBuf,
    filename: String,
}

impl CsvStore {
    pub fn new(directory: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        CsvStore {
            directory: directory.into(),
            filename: filename.into(),
        }
    }

    pub fn from_config(cfg: &Configuration) -> Self {
        CsvStore::new(cfg.directory(), cfg.filename())
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }

    fn not_found(&self, err: io::Error) -> Error {
        if err.kind() != io::ErrorKind::NotFound {
            return Error::Io(err);
        }
        if self.directory.is_dir() {
            Error::StoreNotFound {
                entry: StoreEntry::File,
                path: self.path(),
            }
        } else {
            Error::StoreNotFound {
                entry: StoreEntry::Folder,
                path: self.directory.clone(),
            }
        }
    }
}

impl RecordStore for CsvStore {
    fn ensure_exists(&self) -> Result<()> {
        if !self.directory.is_dir() {
            error!("Folder '{}' does not exist.", self.directory.display());
            return Err(Error::StoreNotFound {
                entry: StoreEntry::Folder,
                path: self.directory.clone(),
            });
        }
        let path = self.path();
        if !path.is_file() {
            error!("File '{}' does not exist.", path.display());
            return Err(Error::StoreNotFound {
                entry: StoreEntry::File,
                path,
            });
        }
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Task>> {
        let path = self.path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Store '{}' does not exist, treating as empty.", path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let tasks = codec::decode(&text(bytes)?)?;
        debug!("Loaded {} tasks from '{}'", tasks.len(), path.display());
        Ok(tasks)
    }

    /// Adds one row laid out like the file's own header. A new or empty file
    /// gets the standard header first.
    fn append(&self, task: &Task) -> Result<()> {
        let path = self.path();
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| self.not_found(e))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let existing = text(bytes)?;

        let mut out = String::new();
        if !existing.is_empty() && !existing.ends_with('\n') {
            out.push('\n');
        }
        let columns = match Columns::of(&existing)? {
            Some(columns) => columns,
            None => {
                out.push_str(&codec::header_line());
                Columns::default()
            }
        };
        out.push_str(&columns.encode_row(task));
        file.write_all(out.as_bytes())?;
        info!("Task '{}' (ID: {}) appended to '{}'", task.name, task.id, path.display());
        Ok(())
    }

    fn replace_all(&self, tasks: &[Task]) -> Result<()> {
        let mut staged = NamedTempFile::new_in(&self.directory).map_err(|e| self.not_found(e))?;
        staged.write_all(codec::encode(tasks).as_bytes())?;
        staged.as_file().sync_all()?;
        let path = self.path();
        staged.persist(&path).map_err(|e| Error::Io(e.error))?;
        debug!("Rewrote {} tasks to '{}'", tasks.len(), path.display());
        Ok(())
    }
}

/// File contents as text. Bytes that are not UTF-8 make the store corrupt
/// at the line they appear on.
fn text(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| {
        let valid = &e.as_bytes()[..e.utf8_error().valid_up_to()];
        Error::StoreCorrupt {
            record: 1 + valid.iter().filter(|&&b| b == b'\n').count(),
            reason: format!("not valid UTF-8: {}", e.utf8_error()),
        }
    })
}

/// Store kept in memory, for tests that should not touch the file system.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: std::sync::Mutex<Vec<Task>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with_rows(rows: Vec<Task>) -> Self {
        MemoryStore {
            rows: std::sync::Mutex::new(rows),
        }
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.rows.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl RecordStore for MemoryStore {
    fn ensure_exists(&self) -> Result<()> {
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Task>> {
        Ok(self.snapshot())
    }

    fn append(&self, task: &Task) -> Result<()> {
        self.rows.lock().unwrap().push(task.clone());
        Ok(())
    }

    fn replace_all(&self, tasks: &[Task]) -> Result<()> {
        *self.rows.lock().unwrap() = tasks.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::NaiveDate;
    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::task::{Priority, TaskDraft};

    const ROW_7: &str = "7,Water plants,Medium,2025-04-01,2025-03-01T09:30:00.000125,True,False,N/A";

    fn task(id: u64, name: &str) -> Task {
        let draft = TaskDraft {
            name: name.to_string(),
            priority: Priority::Low,
            deadline: NaiveDate::from_ymd_opt(2025, 3, 12).unwrap(),
        };
        let created = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_micro_opt(8, 15, 42, 507_311)
            .unwrap();
        Task::new(id, draft, created)
    }

    /// A store file written by hand with `contents`.
    fn provisioned(contents: &str) -> (TempDir, CsvStore) {
        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path(), "data.csv");
        fs::write(store.path(), contents).unwrap();
        (dir, store)
    }

    #[test]
    fn test_missing_folder_and_file() {
        let dir = tempdir().unwrap();
        let missing = CsvStore::new(dir.path().join("nope"), "data.csv");
        assert!(matches!(
            missing.ensure_exists(),
            Err(Error::StoreNotFound { entry: StoreEntry::Folder, .. })
        ));

        let store = CsvStore::new(dir.path(), "data.csv");
        assert!(matches!(
            store.ensure_exists(),
            Err(Error::StoreNotFound { entry: StoreEntry::File, .. })
        ));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_missing_or_empty_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path(), "data.csv");
        assert!(store.load_all().unwrap().is_empty());

        fs::write(store.path(), "").unwrap();
        store.ensure_exists().unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_append_writes_header_once() {
        let (_dir, store) = provisioned("");

        let first = task(1, "Test content");
        store.append(&first).unwrap();
        store.append(&task(2, "More content")).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text.matches("id,taskName").count(), 1);
        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, first.id);
        assert_eq!(loaded[0].name, first.name);
        assert_eq!(loaded[0].priority, first.priority);
        assert_eq!(loaded[0].deadline, first.deadline);
        assert_eq!(loaded[0].date_created, first.date_created);
        assert_eq!(loaded[0].visible, first.visible);
        assert_eq!(loaded[0].completed, first.completed);
        assert_eq!(loaded[0].date_completed, first.date_completed);
    }

    #[test]
    fn test_append_after_header_only_file() {
        let (_dir, store) = provisioned(&codec::header_line());
        store.append(&task(1, "A")).unwrap();

        assert_eq!(store.load_all().unwrap(), vec![task(1, "A")]);
        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text.matches("id,taskName").count(), 1);
    }

    #[test]
    fn test_append_after_header_without_newline() {
        let header = codec::header_line();
        let (_dir, store) = provisioned(header.trim_end());
        store.append(&task(1, "A")).unwrap();
        store.append(&task(2, "B")).unwrap();

        assert_eq!(store.load_all().unwrap(), vec![task(1, "A"), task(2, "B")]);
    }

    #[test]
    fn test_append_after_row_without_newline() {
        let (_dir, store) = provisioned(&format!("{}{ROW_7}", codec::header_line()));
        store.append(&task(8, "A")).unwrap();

        let ids: Vec<u64> = store.load_all().unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![7, 8]);
    }

    #[test]
    fn test_append_keeps_file_column_order() {
        let (_dir, store) = provisioned(
            "taskName,id,priority,deadline,date_created,visible,completed,dateCompleted\n\
             Water plants,7,Medium,2025-04-01,2025-03-01T09:30:00.000125,True,False,N/A\n",
        );
        store.append(&task(8, "A")).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, 7);
        assert_eq!(loaded[0].name, "Water plants");
        assert_eq!(loaded[1], task(8, "A"));
        let text = fs::read_to_string(store.path()).unwrap();
        assert!(text.ends_with("A,8,Low,2025-03-12,2025-03-01T08:15:42.507311,True,False,N/A\n"));
    }

    #[test]
    fn test_append_to_crlf_file() {
        let header = codec::header_line();
        let (_dir, store) = provisioned(&format!("{}\r\n{ROW_7}\r\n", header.trim_end()));
        store.append(&task(8, "A")).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "Water plants");
        assert_eq!(loaded[1], task(8, "A"));
    }

    #[test]
    fn test_append_into_missing_folder() {
        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("nope"), "data.csv");
        assert!(matches!(
            store.append(&task(1, "A")),
            Err(Error::StoreNotFound { entry: StoreEntry::Folder, .. })
        ));
    }

    #[test]
    fn test_replace_all() {
        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path(), "data.csv");
        store.append(&task(1, "A")).unwrap();
        store.append(&task(2, "B")).unwrap();

        let mut rows = store.load_all().unwrap();
        rows[1].visible = false;
        store.replace_all(&rows).unwrap();

        let reloaded = store.load_all().unwrap();
        assert_eq!(reloaded, rows);
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_corrupt_file() {
        let (_dir, store) = provisioned("id,name\n1,\"broken\n");
        assert!(matches!(store.load_all(), Err(Error::StoreCorrupt { .. })));
    }

    #[test]
    fn test_file_that_is_not_utf8() {
        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path(), "data.csv");
        fs::write(store.path(), b"id,taskName\n\xff\xfe\n").unwrap();

        assert!(matches!(
            store.load_all(),
            Err(Error::StoreCorrupt { record: 2, .. })
        ));
        assert!(matches!(
            store.append(&task(1, "A")),
            Err(Error::StoreCorrupt { .. })
        ));
    }
}
