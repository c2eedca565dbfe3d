use std::io::{self, Write};

use chrono::NaiveDate;
use crossterm::style::{Color, Stylize};

use crate::query::{TimeRemaining, time_remaining};
use crate::task::{Priority, Task};

const RULE_WIDTH: usize = 90;

/// Prints `tasks` in the order given, with the time left until each deadline.
/// Colours are only emitted when `color` is set, so redirected output stays plain.
pub fn write_table<W: Write>(out: &mut W, tasks: &[Task], today: NaiveDate, color: bool) -> io::Result<()> {
    if tasks.is_empty() {
        return writeln!(out, "No tasks found.");
    }

    let header = format!(
        "{:<5}{:<30}{:<15}{:<20}{:<20}",
        "ID", "Task Name", "Priority", "Deadline", "Time Remaining"
    );
    let header = if color { header.bold().to_string() } else { header };
    writeln!(out, "{header}")?;
    writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;

    for task in tasks {
        let remaining = time_remaining(task, today);
        let priority = format!("{:<15}", task.priority.label());
        let priority = match task.priority {
            Priority::High => paint(priority, Color::Red, color),
            _ => priority,
        };
        let deadline = format!("{:<20}", task.deadline.to_string());
        let label = format!("{:<20}", remaining.to_string());
        let (deadline, label) = match remaining {
            TimeRemaining::Overdue => (paint(deadline, Color::Red, color), paint(label, Color::Red, color)),
            TimeRemaining::InvalidDate => (deadline, paint(label, Color::Yellow, color)),
            TimeRemaining::Days(_) => (deadline, label),
        };
        writeln!(
            out,
            "{:<5}{:<30}{priority}{deadline}{label}",
            task.id,
            truncate(&task.name, 29)
        )?;
    }

    writeln!(out, "{}", "-".repeat(RULE_WIDTH))
}

fn paint(text: String, fg: Color, color: bool) -> String {
    if color { text.with(fg).to_string() } else { text }
}

fn truncate(name: &str, width: usize) -> String {
    let first_line = name.lines().next().unwrap_or_default();
    if first_line.chars().count() <= width {
        first_line.to_string()
    } else {
        let mut cut: String = first_line.chars().take(width - 1).collect();
        cut.push('…');
        cut
    }
}
