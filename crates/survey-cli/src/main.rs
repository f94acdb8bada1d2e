//! Survey data CLI.
//!
//! Provides the `survey` binary for inspecting and editing a survey
//! database from the shell. Every command loads the whole snapshot through
//! `DataService`; commands that change data flush it back before exiting.
//!
//! Reads `SURVEY_DB_PATH` when `--db` is not given. Log output is
//! controlled with `RUST_LOG`.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use survey_core::map::EntityMap;
use survey_core::{FormId, SubjectId};
use survey_service::{DataService, ServiceConfig, ServiceError};

/// Survey forms and subjects.
#[derive(Parser)]
#[command(name = "survey", about = "Inspect and edit survey data")]
struct Cli {
    /// Path to the survey database file.
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all forms.
    Forms,
    /// Show one form with its questions and subjects.
    Form { id: u32 },
    /// List the subjects of a form.
    Subjects { form: u32 },
    /// Show one subject with its answers.
    Subject { id: u32 },
    /// Show a blank subject for a form without saving it.
    NewSubject { form: u32 },
    /// Insert or update a form from a JSON file.
    ImportForm { file: PathBuf },
    /// Insert or update a subject of a form from a JSON file.
    ImportSubject { form: u32, file: PathBuf },
    /// Delete a form and everything it owns.
    DeleteForm { id: u32 },
    /// Delete a subject.
    DeleteSubject { id: u32 },
}

/// Failure of one command, mapped to an exit code.
enum CliError {
    Input(String),
    Service(ServiceError),
}

impl From<ServiceError> for CliError {
    fn from(e: ServiceError) -> Self {
        CliError::Service(e)
    }
}

impl CliError {
    /// 1 = not found or invalid input, 3 = storage failure.
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Input(_) => 1,
            CliError::Service(e) if e.is_storage() => 3,
            CliError::Service(_) => 1,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ServiceConfig::from_env();
    if let Some(db) = cli.db {
        config = config.with_db_path(db);
    }
    // Mutating commands flush explicitly.
    config.flush_on_drop = false;

    match run(cli.command, config) {
        Ok(output) => {
            let json = serde_json::to_string_pretty(&output).unwrap_or_else(|e| {
                format!("{{\"error\": \"failed to serialize output: {}\"}}", e)
            });
            println!("{}", json);
        }
        Err(e) => {
            match &e {
                CliError::Input(msg) => eprintln!("Error: {}", msg),
                CliError::Service(err) => eprintln!("Error: {}", err),
            }
            process::exit(e.exit_code());
        }
    }
}

fn run(command: Commands, config: ServiceConfig) -> Result<Value, CliError> {
    tracing::debug!(db = %config.db_path, "opening survey database");
    let mut service = DataService::open(config)?;

    let output = match command {
        Commands::Forms => Value::Object(service.list_forms()),
        Commands::Form { id } => Value::Object(service.get_form(FormId(id))?),
        Commands::Subjects { form } => Value::Object(service.list_subjects(FormId(form))?),
        Commands::Subject { id } => Value::Object(service.get_subject(SubjectId(id))?),
        Commands::NewSubject { form } => Value::Object(service.get_new_subject(FormId(form))?),
        Commands::ImportForm { file } => {
            let map = read_map(&file)?;
            let id = service.save_form(&map)?;
            service.shutdown()?;
            serde_json::json!({ "id": id.0 })
        }
        Commands::ImportSubject { form, file } => {
            let map = read_map(&file)?;
            let id = service.save_subject(FormId(form), &map)?;
            service.shutdown()?;
            serde_json::json!({ "id": id.0 })
        }
        Commands::DeleteForm { id } => {
            let deleted = service.delete_form(FormId(id));
            service.shutdown()?;
            serde_json::json!({ "deleted": deleted })
        }
        Commands::DeleteSubject { id } => {
            let deleted = service.delete_subject(SubjectId(id));
            service.shutdown()?;
            serde_json::json!({ "deleted": deleted })
        }
    };
    Ok(output)
}

fn read_map(path: &Path) -> Result<EntityMap, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::Input(format!("failed to read '{}': {}", path.display(), e)))?;
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CliError::Input(format!(
            "'{}' must contain a JSON object",
            path.display()
        ))),
        Err(e) => Err(CliError::Input(format!(
            "failed to parse '{}': {}",
            path.display(),
            e
        ))),
    }
}
