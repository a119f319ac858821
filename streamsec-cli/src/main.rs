mod config_file;
mod display;
mod engine;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::info;
use streamsec_core::plan::Plan;
use streamsec_core::provider::Provider;
use streamsec_provider::config::provider_schema;
use streamsec_provider::{ProviderConfig, StreamsecProvider};
use streamsec_state::{LockInfo, StateBackend, StateFile, create_backend};

use config_file::{Bindings, Configuration};
use display::{attribute_lines, print_plan, print_state};
use engine::Schemas;

#[derive(Parser)]
#[command(name = "streamsec")]
#[command(about = "Onboard cloud accounts into Stream.Security", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file
    Validate {
        #[arg(default_value = "main.json")]
        file: PathBuf,
    },
    /// Show the changes apply would make
    Plan {
        #[arg(default_value = "main.json")]
        file: PathBuf,
    },
    /// Apply the configuration
    Apply {
        #[arg(default_value = "main.json")]
        file: PathBuf,
        /// Skip interactive approval
        #[arg(long)]
        auto_approve: bool,
    },
    /// Delete every resource in state
    Destroy {
        #[arg(default_value = "main.json")]
        file: PathBuf,
        /// Skip interactive approval
        #[arg(long)]
        auto_approve: bool,
    },
    /// Bring an existing object under management
    Import {
        /// Resource type (e.g. aws_account)
        resource_type: String,
        /// Name to store it under
        name: String,
        /// Identifier understood by the resource type
        import_id: String,
        #[arg(long, default_value = "main.json")]
        file: PathBuf,
    },
    /// Re-read every resource in state
    Refresh {
        #[arg(default_value = "main.json")]
        file: PathBuf,
    },
    /// Evaluate the configured data sources
    Read {
        #[arg(default_value = "main.json")]
        file: PathBuf,
    },
    /// Remove a lock left behind by an interrupted run
    ForceUnlock {
        lock_id: String,
        #[arg(long, default_value = "main.json")]
        file: PathBuf,
    },
    /// List resource and data source schemas
    Schema {
        /// Only show this type
        resource_type: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Plan { file } => run_plan(&file).await,
        Commands::Apply { file, auto_approve } => run_apply(&file, auto_approve).await,
        Commands::Destroy { file, auto_approve } => run_destroy(&file, auto_approve).await,
        Commands::Import {
            resource_type,
            name,
            import_id,
            file,
        } => run_import(&file, &resource_type, &name, &import_id).await,
        Commands::Refresh { file } => run_refresh(&file).await,
        Commands::Read { file } => run_read(&file).await,
        Commands::ForceUnlock { lock_id, file } => run_force_unlock(&file, &lock_id).await,
        Commands::Schema { resource_type } => run_schema(resource_type.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn load(file: &Path) -> Result<Configuration, String> {
    let config = Configuration::load(file)?;
    engine::validate(&config, &Schemas::builtin())?;
    Ok(config)
}

async fn connect(config: &Configuration) -> Result<StreamsecProvider, String> {
    let settings = ProviderConfig::from_attributes(&config.provider).map_err(|e| e.to_string())?;
    info!("Using {:?}", settings);
    StreamsecProvider::connect(&settings)
        .await
        .map_err(|e| e.to_string())
}

fn backend(config: &Configuration) -> Result<Box<dyn StateBackend>, String> {
    create_backend(&config.backend).map_err(|e| e.to_string())
}

async fn read_state(backend: &dyn StateBackend) -> Result<StateFile, String> {
    Ok(backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default())
}

async fn lock(backend: &dyn StateBackend, operation: &str) -> Result<LockInfo, String> {
    backend
        .acquire_lock(operation)
        .await
        .map_err(|e| e.to_string())
}

/// Release the lock whatever the outcome, keeping the first error
async fn unlock(
    backend: &dyn StateBackend,
    lock: &LockInfo,
    result: Result<(), String>,
) -> Result<(), String> {
    let released = backend.release_lock(lock).await.map_err(|e| e.to_string());
    result.and(released)
}

fn confirm(question: &str) -> Result<bool, String> {
    println!("{}", question.bold());
    println!("  Only 'yes' will be accepted to approve.");
    print!("  Enter a value: ");
    io::stdout().flush().map_err(|e| e.to_string())?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|e| e.to_string())?;
    println!();
    Ok(answer.trim() == "yes")
}

fn run_validate(file: &Path) -> Result<(), String> {
    println!("{}", "Validating...".cyan());
    let config = load(file)?;

    let count = config.resources.len() + config.data_sources.len();
    println!(
        "{}",
        format!("✓ {} blocks validated successfully.", count).green().bold()
    );
    for resource in config.all() {
        let prefix = if resource.is_data_source() { "data." } else { "" };
        println!("  • {}{}", prefix, resource.id);
    }
    Ok(())
}

async fn run_plan(file: &Path) -> Result<(), String> {
    let config = load(file)?;
    let provider = connect(&config).await?;
    let backend = backend(&config)?;

    let mut state = read_state(backend.as_ref()).await?;
    println!("{}", "Refreshing state...".cyan());
    engine::refresh(&provider, &mut state).await?;

    let schemas = Schemas::from_provider(&provider);
    let plan = engine::plan(&provider, &config, &schemas, &state.states()).await?;
    println!();
    print_plan(&plan, &schemas);
    Ok(())
}

async fn run_apply(file: &Path, auto_approve: bool) -> Result<(), String> {
    let config = load(file)?;
    let provider = connect(&config).await?;
    let backend = backend(&config)?;

    let lock = lock(backend.as_ref(), "apply").await?;
    let result = apply_locked(&provider, backend.as_ref(), &config, auto_approve).await;
    unlock(backend.as_ref(), &lock, result).await
}

async fn apply_locked(
    provider: &StreamsecProvider,
    backend: &dyn StateBackend,
    config: &Configuration,
    auto_approve: bool,
) -> Result<(), String> {
    let mut state = read_state(backend).await?;
    println!("{}", "Refreshing state...".cyan());
    let removed = engine::refresh(provider, &mut state).await?;
    if !removed.is_empty() {
        engine::persist(backend, &mut state).await?;
    }

    let schemas = Schemas::from_provider(provider);
    let plan = engine::plan(provider, config, &schemas, &state.states()).await?;
    println!();
    print_plan(&plan, &schemas);
    if plan.mutation_count() == 0 {
        return Ok(());
    }

    println!();
    if !auto_approve && !confirm("Do you want to perform these actions?")? {
        println!("{}", "Apply cancelled.".yellow());
        return Ok(());
    }

    execute(provider, backend, &mut state, &plan, "Apply").await
}

async fn run_destroy(file: &Path, auto_approve: bool) -> Result<(), String> {
    let config = load(file)?;
    let provider = connect(&config).await?;
    let backend = backend(&config)?;

    let lock = lock(backend.as_ref(), "destroy").await?;
    let result = destroy_locked(&provider, backend.as_ref(), &config, auto_approve).await;
    unlock(backend.as_ref(), &lock, result).await
}

async fn destroy_locked(
    provider: &StreamsecProvider,
    backend: &dyn StateBackend,
    config: &Configuration,
    auto_approve: bool,
) -> Result<(), String> {
    let mut state = read_state(backend).await?;
    println!("{}", "Refreshing state...".cyan());
    let removed = engine::refresh(provider, &mut state).await?;
    if !removed.is_empty() {
        engine::persist(backend, &mut state).await?;
    }

    let plan = engine::destroy_plan(config, &state);
    if plan.is_empty() {
        println!("{}", "No resources to destroy.".green());
        return Ok(());
    }

    println!("{}", "Destroy Plan:".red().bold());
    println!();
    for effect in plan.effects() {
        println!("  {} {}", "-".red().bold(), effect.resource_id().to_string().cyan().bold());
    }
    println!();
    println!("Plan: {} to destroy.", plan.effects().len().to_string().red());
    println!();

    if !auto_approve
        && !confirm("Do you really want to destroy all resources? There is no undo.")?
    {
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    execute(provider, backend, &mut state, &plan, "Destroy").await
}

async fn execute(
    provider: &StreamsecProvider,
    backend: &dyn StateBackend,
    state: &mut StateFile,
    plan: &Plan,
    what: &str,
) -> Result<(), String> {
    let progress = if what == "Destroy" { "Destroying..." } else { "Applying changes..." };
    println!("{}", progress.cyan().bold());
    let report = engine::apply(provider, backend, state, plan).await;

    println!();
    if report.failed == 0 {
        println!(
            "{}",
            format!("{} complete! {} changes applied.", what, report.succeeded)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "{} failed. {} succeeded, {} failed.",
            what, report.succeeded, report.failed
        ))
    }
}

async fn run_import(
    file: &Path,
    resource_type: &str,
    name: &str,
    import_id: &str,
) -> Result<(), String> {
    let config = load(file)?;
    let provider = connect(&config).await?;
    let backend = backend(&config)?;

    let lock = lock(backend.as_ref(), "import").await?;
    let result = async {
        let mut state = read_state(backend.as_ref()).await?;
        let id = streamsec_core::resource::ResourceId::new(resource_type, name);
        if state.find_resource(&id).is_some() {
            return Err(format!(
                "Resource already managed: {}. Remove it from state before importing again.",
                id
            ));
        }

        println!("{}", format!("Importing {} from {}...", id, import_id).cyan());
        let imported = provider
            .import(resource_type, name, import_id)
            .await
            .map_err(|e| e.to_string())?;
        state.apply_state(provider.name(), &imported);
        engine::persist(backend.as_ref(), &mut state).await?;

        let schemas = Schemas::from_provider(&provider);
        print_state(&imported, schemas.resources.get(resource_type));
        println!("{}", "Import successful!".green().bold());
        Ok::<(), String>(())
    }
    .await;
    unlock(backend.as_ref(), &lock, result).await
}

async fn run_refresh(file: &Path) -> Result<(), String> {
    let config = load(file)?;
    let provider = connect(&config).await?;
    let backend = backend(&config)?;

    let lock = lock(backend.as_ref(), "refresh").await?;
    let result = async {
        let mut state = read_state(backend.as_ref()).await?;
        let removed = engine::refresh(&provider, &mut state).await?;
        engine::persist(backend.as_ref(), &mut state).await?;

        for id in &removed {
            println!("  {} {} (no longer exists)", "-".red().bold(), id);
        }
        println!(
            "{}",
            format!(
                "✓ Refreshed {} resources, removed {}.",
                state.resources.len(),
                removed.len()
            )
            .green()
            .bold()
        );
        Ok::<(), String>(())
    }
    .await;
    unlock(backend.as_ref(), &lock, result).await
}

async fn run_read(file: &Path) -> Result<(), String> {
    let config = load(file)?;
    if config.data_sources.is_empty() {
        println!("{}", "No data sources configured.".yellow());
        return Ok(());
    }
    let provider = connect(&config).await?;
    let schemas = Schemas::from_provider(&provider);

    let mut bindings = Bindings::default();
    for (query, state) in engine::read_data_sources(&provider, &config, &mut bindings).await? {
        println!("{}", format!("data.{}", query.id).cyan().bold());
        for line in attribute_lines(&state.attributes, schemas.get(&query)) {
            println!("    {}", line);
        }
    }
    Ok(())
}

async fn run_force_unlock(file: &Path, lock_id: &str) -> Result<(), String> {
    let config = Configuration::load(file)?;
    backend(&config)?
        .force_unlock(lock_id)
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", format!("✓ Lock {} removed.", lock_id).green().bold());
    Ok(())
}

fn run_schema(only: Option<&str>) -> Result<(), String> {
    let schemas = Schemas::builtin();
    let provider = provider_schema();

    let mut sections = vec![("provider", vec![&provider])];
    let mut resources: Vec<_> = schemas.resources.values().collect();
    resources.sort_by(|a, b| a.resource_type.cmp(&b.resource_type));
    sections.push(("resource", resources));
    let mut data: Vec<_> = schemas.data_sources.values().collect();
    data.sort_by(|a, b| a.resource_type.cmp(&b.resource_type));
    sections.push(("data", data));

    let mut shown = 0;
    for (kind, list) in sections {
        for schema in list {
            if only.is_some_and(|t| t != schema.resource_type) {
                continue;
            }
            shown += 1;
            println!("{} {}", kind.dimmed(), schema.resource_type.cyan().bold());
            if let Some(description) = &schema.description {
                println!("  {}", description);
            }
            let mut names = schema.attribute_names();
            names.sort();
            for name in names {
                let attr = &schema.attributes[name];
                let mut flags = Vec::new();
                if attr.required {
                    flags.push("required");
                }
                if attr.computed {
                    flags.push("computed");
                }
                if attr.sensitive {
                    flags.push("sensitive");
                }
                if attr.requires_replace {
                    flags.push("forces replacement");
                }
                println!(
                    "    {} {} {}",
                    name.bold(),
                    format!("({})", flags.join(", ")).dimmed(),
                    attr.description.as_deref().unwrap_or("")
                );
            }
            println!();
        }
    }

    match only {
        Some(t) if shown == 0 => Err(format!("Unknown type: {}", t)),
        _ => Ok(()),
    }
}
