//! CLI entry point over a SQLite school database.
//!
//! # Responsibility
//! - Drive the unit-of-work core end to end against a database file.
//! - Print results as JSON so runs are easy to diff.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use unitofwork_core::{
    core_version, default_log_level, init_logging, ping, DbConfig, PreActionPipeline,
    QueryOptions, SchoolContext, Student, StudentAgeGate, WorkManager, DEFAULT_PAGE_SIZE,
};

#[derive(Parser)]
#[command(name = "unitofwork")]
#[command(about = "Student records through the unit-of-work core")]
struct Cli {
    /// SQLite database file; created and migrated on first use.
    #[arg(long, default_value = "school.db")]
    db: PathBuf,
    /// Absolute directory for rolling log files. Logging is off when unset.
    #[arg(long)]
    log_dir: Option<PathBuf>,
    #[arg(long)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inserts one student; minors are rejected by the age gate.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: i64,
    },
    /// Prints one page of students ordered by name.
    List {
        #[arg(long, default_value_t = 0)]
        page: usize,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,
        #[arg(long)]
        min_age: Option<i64>,
    },
    Count,
    /// Deletes the student with `id`.
    Remove {
        #[arg(long)]
        id: i64,
    },
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir).context("failed to initialize logging")?;
    }

    let mut manager = WorkManager::new();
    manager.configure::<SchoolContext>(DbConfig::file(cli.db.clone()));
    let outcome = run(&mut manager, cli.command);
    manager.dispose();
    outcome
}

fn run(manager: &mut WorkManager, command: Command) -> Result<()> {
    match command {
        Command::Add { name, age } => add(manager, name, age),
        Command::List {
            page,
            page_size,
            min_age,
        } => list(manager, page, page_size, min_age),
        Command::Count => {
            let count = manager
                .unit_of_work::<SchoolContext>()?
                .generic_repository::<Student>()?
                .count()?;
            println!("{}", serde_json::json!({ "count": count }));
            Ok(())
        }
        Command::Remove { id } => {
            let removed = manager
                .unit_of_work::<SchoolContext>()?
                .generic_repository::<Student>()?
                .delete_by_key(id)?;
            let affected = manager.save_changes_all()?;
            println!(
                "{}",
                serde_json::json!({ "removed": removed, "affected": affected })
            );
            Ok(())
        }
        Command::Version => {
            println!("unitofwork_core ping={}", ping());
            println!("unitofwork_core version={}", core_version());
            Ok(())
        }
    }
}

fn add(manager: &mut WorkManager, name: String, age: i64) -> Result<()> {
    let uow = manager.unit_of_work::<SchoolContext>()?;
    uow.pre_action(PreActionPipeline::<Student>::new().with(StudentAgeGate))?;

    let mut student = Student::new(name.clone(), age);
    if let Err(err) = uow.generic_repository::<Student>()?.insert(&mut student) {
        if let Some(results) = err.validation_results() {
            println!("{}", serde_json::to_string(results)?);
        }
        return Err(anyhow::Error::new(err).context(format!("student `{name}` was not added")));
    }

    let affected = manager.save_changes_all()?;
    info!(
        "event=cli_add module=cli status=ok affected={}",
        affected
    );

    let saved = manager
        .unit_of_work::<SchoolContext>()?
        .generic_repository::<Student>()?
        .get_first_or_default(
            QueryOptions::new()
                .filter(move |student: &Student| student.name == name)
                .order_by(|left: &Student, right: &Student| right.id.cmp(&left.id)),
        )?;
    println!("{}", serde_json::to_string(&saved)?);
    Ok(())
}

fn list(
    manager: &mut WorkManager,
    page: usize,
    page_size: usize,
    min_age: Option<i64>,
) -> Result<()> {
    let mut query = QueryOptions::new()
        .order_by(|left: &Student, right: &Student| left.name.cmp(&right.name));
    if let Some(min_age) = min_age {
        query = query.filter(move |student: &Student| student.age.is_some_and(|age| age >= min_age));
    }

    let students = manager
        .unit_of_work::<SchoolContext>()?
        .generic_repository::<Student>()?
        .get_paged_list(query, page, page_size)?;
    println!("{}", serde_json::to_string_pretty(&students)?);
    Ok(())
}
