use std::io::{self, IsTerminal};
use std::path::PathBuf;

use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::Configuration;
use crate::menu::{CancelToken, Menu};
use crate::organizer::Organizer;
use crate::store::CsvStore;
use crate::table::write_table;
use crate::task::{Priority, Task, TaskDraft, TaskUpdate, parse_deadline_input};

mod allocator;
mod codec;
mod config;
mod error;
mod menu;
mod organizer;
mod query;
mod store;
mod table;
mod task;

#[derive(Parser)]
#[command(version, about = "Personal task organizer", long_about = None)]
struct Cmd {
    /// Configuration file to read instead of the per-user one
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    commands: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add {
        #[arg(short, long)]
        name: String,
        #[arg(short, long, value_name = "Low|Medium|High")]
        priority: String,
        #[arg(short, long, value_name = "YYYY-MM-DD")]
        deadline: String,
    },
    /// Show active tasks, or completed ones with --completed
    List {
        #[arg(short, long)]
        completed: bool,
    },
    /// Change an active task that is not overdue
    Edit {
        id: u64,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long, value_name = "Low|Medium|High")]
        priority: Option<String>,
        #[arg(short, long, value_name = "YYYY-MM-DD")]
        deadline: Option<String>,
    },
    /// Show one task in any state
    Show {
        id: u64,
    },
    /// Soft-delete an active task
    Delete {
        id: u64,
    },
    /// Mark an active task as completed
    Complete {
        id: u64,
    },
    /// Interactive menu, the default
    Menu {},
}

fn init_tracing(level: &str) {
    // RUST_LOG wins when it holds a valid filter.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| EnvFilter::try_new(raw.trim()).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

async fn run_menu(organizer: Organizer<CsvStore>) -> color_eyre::Result<()> {
    let cancel = CancelToken::new();
    let listener = cancel.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            listener.cancel();
            warn!("Cancellation requested, press Enter to return to the menu");
        }
    });

    tokio::task::spawn_blocking(move || {
        let color = io::stdout().is_terminal();
        Menu::new(organizer, io::stdin().lock(), io::stdout(), cancel)
            .with_color(color)
            .run()
    })
    .await??;
    Ok(())
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cmds = Cmd::parse();
    let cfg = Configuration::new(cmds.config.as_deref())?;
    init_tracing(&cfg.log.level);

    debug!("Using task store at '{}'", cfg.store_path().display());
    let organizer = Organizer::open(CsvStore::from_config(&cfg))?;
    let today = Local::now().date_naive();
    let color = io::stdout().is_terminal();

    match cmds.commands.unwrap_or(Commands::Menu {}) {
        Commands::Add {
            name,
            priority,
            deadline,
        } => {
            let draft = TaskDraft::parse(&name, &priority, &deadline, today)?;
            let task = organizer.add(draft)?;
            println!("Task '{}' added with ID {}.", task.name, task.id);
        }
        Commands::List { completed } => {
            let tasks = if completed {
                organizer.completed()
            } else {
                organizer.active()
            };
            write_table(&mut io::stdout().lock(), &tasks, today, color)?;
        }
        Commands::Edit {
            id,
            name,
            priority,
            deadline,
        } => {
            let changes = TaskUpdate {
                name,
                priority: priority.as_deref().map(str::parse::<Priority>).transpose()?,
                deadline: deadline
                    .as_deref()
                    .map(|d| parse_deadline_input(d, today))
                    .transpose()?,
            };
            if changes.is_empty() {
                println!("Nothing to change for task {id}.");
                return Ok(());
            }
            organizer.edit(id, &changes, today)?;
            println!("Task {id} updated successfully.");
        }
        Commands::Show { id } => {
            let task = Task::get_by_id(organizer.store(), id)?;
            write_table(&mut io::stdout().lock(), std::slice::from_ref(&task), today, color)?;
            match task.date_completed {
                Some(done) => println!("State: {} on {done}", task.state()),
                None => println!("State: {}", task.state()),
            }
        }
        Commands::Delete { id } => {
            organizer.delete(id)?;
            println!("Task with ID {id} deleted.");
        }
        Commands::Complete { id } => {
            organizer.complete(id, today)?;
            println!("Task with ID {id} marked as completed.");
        }
        Commands::Menu {} => run_menu(organizer).await?,
    }
    Ok(())
}
