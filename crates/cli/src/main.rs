use crate::{
    commands::Commands,
    error::CliError,
    prompt::StdinConfirm,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use connectors::dynamodb::DynamoDbStore;
use engine_config::{EngineSettings, EnvManager, SettingsOverrides};
use engine_core::state::sled_store::SledStateStore;
use engine_processing::state_manager::StateManager;
use engine_runtime::{
    Confirm, FixedAnswer, JobEdit, JobService, MigrationEngine, UndoEngine, UndoOutcome,
};
use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;
mod prompt;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "ddbmigrate",
    version,
    about = "Resumable, undoable table-to-table copy for DynamoDB"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Read settings from this .env file")]
    env_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Directory holding job state and undo ledger")]
    state_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "AWS region")]
    region: Option<String>,

    #[arg(long, global = true, help = "Custom DynamoDB endpoint, e.g. a local emulator")]
    endpoint: Option<String>,

    #[arg(long, global = true, help = "Write logs to this file instead of stderr")]
    log_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Operations per write batch (1-25)")]
    batch_size: Option<usize>,

    #[arg(long, global = true, help = "Attempts per batch before giving up")]
    retry_attempts: Option<usize>,

    #[arg(long, global = true, help = "Maximum items per scan page")]
    scan_page_limit: Option<usize>,
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            state_dir: self.state_dir.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            scan_page_limit: self.scan_page_limit,
            retry_attempts: self.retry_attempts,
            batch_size: self.batch_size,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_logging(cli.log_file.as_deref()) {
        eprintln!("Error: {err}");
        std::process::exit(ExitCode::GeneralError.as_i32());
    }

    let shutdown = ShutdownCoordinator::new();
    let result = execute(cli, &shutdown).await;
    if let Err(err) = &result {
        error!(error = %err, "Command failed");
        eprintln!("Error: {err}");
    }

    std::process::exit(shutdown.exit_code(result.is_err()).as_i32());
}

fn init_logging(log_file: Option<&Path>) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| CliError::LogFile {
                    path: path.to_path_buf(),
                    source,
                })?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// Everything one invocation needs. The DynamoDB client is only built for
/// commands that talk to tables.
struct Context {
    settings: EngineSettings,
    state: StateManager,
    jobs: JobService,
}

impl Context {
    fn open(cli: &Cli) -> Result<Self, CliError> {
        let env = EnvManager::load(cli.env_file.as_deref())?;
        let settings = EngineSettings::resolve(&env, &cli.overrides())?;

        let sled = SledStateStore::open(&settings.state_dir).map_err(|source| {
            CliError::StateOpen {
                path: settings.state_dir.clone(),
                source,
            }
        })?;
        let sled = Arc::new(sled);
        let state = StateManager::new(sled.clone(), sled);
        let jobs = JobService::new(state.clone());

        info!(state_dir = %settings.state_dir.display(), "State store opened");
        Ok(Self {
            settings,
            state,
            jobs,
        })
    }

    async fn connect(&self) -> Arc<DynamoDbStore> {
        Arc::new(DynamoDbStore::connect(self.settings.dynamodb_config()).await)
    }
}

async fn execute(cli: Cli, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    let ctx = Context::open(&cli)?;

    match cli.command {
        Commands::List { json } => {
            let jobs = ctx.jobs.list().await?;
            output::print_jobs(&jobs, json)?;
        }
        Commands::Show { id, json } => {
            let job = ctx.jobs.get(&id).await?;
            output::print_job(&job, json)?;
        }
        Commands::Create {
            source,
            target,
            mappings,
        } => {
            let mappings = mappings.build()?;
            let job = ctx.jobs.create(&source, &target, mappings).await?;
            println!("Created {}", job.id);
        }
        Commands::Edit {
            id,
            source,
            target,
            mappings,
            unmap,
        } => {
            let current = ctx.jobs.get(&id).await?;
            let column_mappings = if mappings.is_empty() && unmap.is_empty() {
                None
            } else {
                let mut updated = mappings.apply_to(current.column_mappings)?;
                for target in &unmap {
                    if updated.remove(target).is_none() {
                        return Err(CliError::InvalidArgument(format!(
                            "no mapping for target attribute '{target}'"
                        )));
                    }
                }
                updated.validate()?;
                Some(updated)
            };

            let edit = JobEdit {
                source_table: source,
                target_table: target,
                column_mappings,
            };
            if edit.is_empty() {
                return Err(CliError::InvalidArgument("nothing to change".into()));
            }
            let job = ctx.jobs.edit(&id, edit).await?;
            output::print_job(&job, false)?;
        }
        Commands::Delete { id, yes, force } => {
            let job = ctx.jobs.get(&id).await?;
            let question = if force {
                format!("Delete job {} and discard its undo ledger?", job.id)
            } else {
                format!("Delete job {}?", job.id)
            };
            if !yes && !prompt::ask(&question) {
                println!("Aborted.");
                return Ok(());
            }
            ctx.jobs.delete(&job.id, force).await?;
            println!("Deleted {}", job.id);
        }
        Commands::Run {
            id,
            yes,
            create_table,
        } => {
            let job = match id {
                Some(id) => ctx.jobs.get(&id).await?,
                None => ctx.jobs.latest_resumable().await?.ok_or(CliError::NoJob)?,
            };

            output::print_run_plan(&job);
            if !yes && !prompt::ask("Start the migration?") {
                println!("Aborted.");
                return Ok(());
            }

            let confirm: Arc<dyn Confirm> = if create_table {
                Arc::new(FixedAnswer(true))
            } else if yes {
                Arc::new(FixedAnswer(false))
            } else {
                Arc::new(StdinConfirm)
            };

            shutdown.register_handlers();
            let store = ctx.connect().await;
            let engine = MigrationEngine::new(store.clone(), store, ctx.state.clone())
                .with_settings(&ctx.settings)
                .with_confirm(confirm)
                .with_cancellation(shutdown.cancel_token());

            let summary = engine.run(&job.id).await?;
            output::print_summary(&summary);
        }
        Commands::Undo { id, yes } => {
            let target = match &id {
                Some(id) => format!("job {id}"),
                None => "the most recent migration".to_string(),
            };
            if !yes && !prompt::ask(&format!("Delete every item written by {target}?")) {
                println!("Aborted.");
                return Ok(());
            }

            let store = ctx.connect().await;
            let engine = UndoEngine::new(store, ctx.state.clone()).with_settings(&ctx.settings);
            let outcome: UndoOutcome = match id {
                Some(id) => engine.undo(&id).await?,
                None => engine.undo_most_recent().await?,
            };
            output::print_undo(&outcome);
        }
        Commands::Ledger { id, json } => {
            let entries = match id {
                Some(id) => {
                    let keys = ctx.jobs.ledger_for(&id).await?;
                    let mut entries = BTreeMap::new();
                    if !keys.is_empty() {
                        entries.insert(id, keys);
                    }
                    entries
                }
                None => ctx.jobs.ledger().await?,
            };
            output::print_ledger(&entries, json)?;
        }
    }

    Ok(())
}
