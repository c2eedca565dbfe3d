/*!
    The interactive text menu. It gathers validated input, hands it to the
    [`Organizer`] and prints the outcome. A [`CancelToken`] set from another
    thread aborts the prompt sequence in progress; it is checked after every
    line read, so nothing half-entered is ever persisted.
!*/
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use crate::error::{Result, ValidationError};
use crate::organizer::Organizer;
use crate::query::ensure_editable;
use crate::store::RecordStore;
use crate::table::write_table;
use crate::task::{Priority, Task, TaskDraft, TaskUpdate, parse_deadline_input, validate_name};

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

const MENU: &str = "\n1. Add Task\n2. View Tasks\n3. Edit Task\n4. Delete Task\n5. Finish Task\n6. Exit";

pub struct Menu<S, R, W> {
    organizer: Organizer<S>,
    input: R,
    output: W,
    cancel: CancelToken,
    clock: fn() -> NaiveDate,
    color: bool,
    closed: bool,
}

impl<S: RecordStore, R: BufRead, W: Write> Menu<S, R, W> {
    pub fn new(organizer: Organizer<S>, input: R, output: W, cancel: CancelToken) -> Self {
        Menu {
            organizer,
            input,
            output,
            cancel,
            clock: || Local::now().date_naive(),
            color: false,
            closed: false,
        }
    }

    /// Replaces the source of the current date.
    pub fn with_clock(mut self, clock: fn() -> NaiveDate) -> Self {
        self.clock = clock;
        self
    }

    /// Colours the task tables.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Runs until the user exits or the input ends.
    pub fn run(&mut self) -> Result<()> {
        info!("Starting task organizer menu");
        writeln!(self.output, "Welcome to the Smart Task Organizer!")?;

        while !self.closed {
            writeln!(self.output, "{MENU}")?;
            self.cancel.reset();
            let Some(choice) = self.ask("Enter your choice: ")? else {
                continue;
            };
            self.cancel.reset();
            match choice.as_str() {
                "1" => self.add_flow()?,
                "2" => self.view()?,
                "3" => self.edit_flow()?,
                "4" => self.delete_flow()?,
                "5" => self.complete_flow()?,
                "6" => break,
                _ => writeln!(self.output, "Invalid choice. Try again.")?,
            }
        }

        writeln!(self.output, "Thank you for using the Smart Task Organizer!")?;
        info!("Exiting task organizer menu");
        Ok(())
    }

    /// Reads one trimmed line. `None` when the token was cancelled or the input is closed.
    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            self.closed = true;
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            writeln!(self.output, "\nOperation aborted. Returning to the main menu...")?;
            warn!("Operation aborted by user.");
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Asks until `parse` accepts the answer, printing each rejection.
    fn ask_until<T, F>(&mut self, prompt: &str, mut parse: F) -> Result<Option<T>>
    where
        F: FnMut(&str) -> Result<T, ValidationError>,
    {
        loop {
            let Some(line) = self.ask(prompt)? else {
                return Ok(None);
            };
            match parse(&line) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => writeln!(self.output, "{e}")?,
            }
        }
    }

    /// Asks for an id until it names one of `tasks`.
    fn pick(&mut self, tasks: &[Task], prompt: &str) -> Result<Option<Task>> {
        loop {
            let Some(line) = self.ask(prompt)? else {
                return Ok(None);
            };
            let found = line
                .parse::<u64>()
                .ok()
                .and_then(|id| tasks.iter().find(|t| t.id == id));
            match found {
                Some(task) => return Ok(Some(task.clone())),
                None => writeln!(self.output, "Invalid ID. Please enter a valid task ID.")?,
            }
        }
    }

    /// Shows the active tasks, or says there are none to `action`.
    fn show_active(&mut self, action: &str) -> Result<Vec<Task>> {
        let tasks = self.organizer.active();
        if tasks.is_empty() {
            writeln!(self.output, "No tasks found to {action}.")?;
        } else {
            write_table(&mut self.output, &tasks, (self.clock)(), self.color)?;
        }
        Ok(tasks)
    }

    fn view(&mut self) -> Result<()> {
        let tasks = self.organizer.active();
        write_table(&mut self.output, &tasks, (self.clock)(), self.color)?;
        Ok(())
    }

    fn add_flow(&mut self) -> Result<()> {
        let Some(name) = self.ask_until("Enter task name: ", validate_name)? else {
            return Ok(());
        };
        let Some(priority) = self.ask_until("Enter priority (Low, Medium, High): ", str::parse::<Priority>)? else {
            return Ok(());
        };
        let today = (self.clock)();
        let Some(deadline) = self.ask_until("Enter deadline (YYYY-MM-DD): ", |raw| {
            parse_deadline_input(raw, today)
        })?
        else {
            return Ok(());
        };

        match self.organizer.add(TaskDraft { name, priority, deadline }) {
            Ok(task) => writeln!(self.output, "Task '{}' added successfully.", task.name)?,
            Err(e) => writeln!(self.output, "Task could not be added: {e}")?,
        }
        Ok(())
    }

    fn edit_flow(&mut self) -> Result<()> {
        let tasks = self.show_active("edit")?;
        if tasks.is_empty() {
            return Ok(());
        }
        let Some(task) = self.pick(&tasks, "Enter the ID of the task to edit: ")? else {
            return Ok(());
        };
        let today = (self.clock)();
        if let Err(e) = ensure_editable(&task, today) {
            writeln!(self.output, "{e}.")?;
            return Ok(());
        }

        writeln!(self.output, "Press Enter to keep the current value or press Ctrl-C to cancel.")?;
        let Some(name) = self.ask_until(&format!("Enter new task name (current: {}): ", task.name), |raw| {
            Ok(Some(raw.to_string()).filter(|n| !n.is_empty()))
        })?
        else {
            return Ok(());
        };
        let Some(priority) = self.ask_until(
            &format!("Enter new priority (Low, Medium, High) (current: {}): ", task.priority),
            |raw| match raw {
                "" => Ok(None),
                raw => raw.parse::<Priority>().map(Some),
            },
        )?
        else {
            return Ok(());
        };
        let Some(deadline) = self.ask_until(
            &format!("Enter new deadline (YYYY-MM-DD) (current: {}): ", task.deadline),
            |raw| match raw {
                "" => Ok(None),
                raw => parse_deadline_input(raw, today).map(Some),
            },
        )?
        else {
            return Ok(());
        };

        let changes = TaskUpdate { name, priority, deadline };
        match self.organizer.edit(task.id, &changes, today) {
            Ok(_) => writeln!(self.output, "Task updated successfully.")?,
            Err(e) => writeln!(self.output, "Task {} could not be updated: {e}", task.id)?,
        }
        Ok(())
    }

    fn delete_flow(&mut self) -> Result<()> {
        let tasks = self.show_active("delete")?;
        if tasks.is_empty() {
            return Ok(());
        }
        let Some(task) = self.pick(&tasks, "Enter the ID of the task to delete: ")? else {
            return Ok(());
        };
        match self.organizer.delete(task.id) {
            Ok(_) => writeln!(self.output, "Task with ID {} deleted.", task.id)?,
            Err(e) => writeln!(self.output, "Task {} could not be deleted: {e}", task.id)?,
        }
        Ok(())
    }

    fn complete_flow(&mut self) -> Result<()> {
        let tasks = self.show_active("complete")?;
        if tasks.is_empty() {
            return Ok(());
        }
        let Some(task) = self.pick(&tasks, "Enter the ID of the task to mark as completed: ")? else {
            return Ok(());
        };
        match self.organizer.complete(task.id, (self.clock)()) {
            Ok(_) => writeln!(self.output, "Task with ID {} marked as completed.", task.id)?,
            Err(e) => writeln!(self.output, "Task {} could not be completed: {e}", task.id)?,
        }
        Ok(())
    }
}
