//! Settings Engine CLI
//!
//! Entry point for the `settings-engine` command-line tool. Every command
//! opens the file-backed store, performs one operation and persists it.

use clap::{Parser, Subcommand};
use serde::Serialize;
use settings_engine::schema::dashboard;
use settings_engine::{EngineConfig, FileSink, SettingsEngine, SettingsError, DEFAULT_PROFILE_ID};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit code for persistence failures
const EXIT_CODE_PERSISTENCE: i32 = 2;

#[derive(Parser)]
#[command(name = "settings-engine")]
#[command(about = "Layered dashboard settings with profiles", version)]
struct Cli {
    /// Engine config file (TOML)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Settings store path (overrides config)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (overrides config)
    #[arg(long, global = true)]
    log: Option<String>,

    /// Print compact JSON
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective settings of a profile
    Show {
        /// Profile id (default: active profile)
        #[arg(long, short = 'p')]
        profile: Option<String>,
    },

    /// Print one effective value
    Get {
        path: String,
    },

    /// Set one or more values and apply them
    Set {
        /// Assignments as path=value
        #[arg(required = true)]
        assignments: Vec<String>,
    },

    /// Stop the active profile overriding a path
    Inherit {
        path: String,
    },

    /// List paths whose effective values differ between two profiles
    Diff {
        left: String,
        right: String,
    },

    /// List every settings path with its kind
    Paths,

    /// Show active profile and restart status
    Status,

    /// Profile management commands
    Profiles {
        #[command(subcommand)]
        action: ProfilesCommands,
    },

    /// Acknowledge that the host has restarted
    AckRestart,
}

#[derive(Subcommand)]
enum ProfilesCommands {
    /// List profiles
    List,

    /// Create an empty profile
    Create { name: String },

    /// Copy a profile with its overrides
    Clone { id: String },

    /// Delete a profile
    Delete {
        id: String,

        /// Skip confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Make a profile active
    Activate { id: String },

    /// Rename a profile
    Rename { id: String, name: String },
}

fn main() {
    let cli = Cli::parse();

    let pretty = cli.compact.then_some(false);
    let overrides = serde_json::json!({
        "store_path": cli.store,
        "log_filter": cli.log,
        "pretty": pretty,
    });
    let config = match EngineConfig::load(cli.config.as_deref(), Some(overrides)) {
        Ok(loaded) => loaded.config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let sink = if config.pretty {
        FileSink::new(&config.store_path)
    } else {
        FileSink::new(&config.store_path).compact()
    };
    let mut engine = match SettingsEngine::open(Arc::new(dashboard()), Arc::new(sink)) {
        Ok(engine) => engine,
        Err(e) => fail("Error opening settings", e),
    };

    let result = match cli.command {
        Commands::Show { profile } => run_show(&engine, profile, &config),
        Commands::Get { path } => run_get(&engine, &path, &config),
        Commands::Set { assignments } => run_set(&mut engine, &assignments, &config),
        Commands::Inherit { path } => run_inherit(&mut engine, &path),
        Commands::Diff { left, right } => run_diff(&engine, &left, &right),
        Commands::Paths => {
            run_paths(&engine);
            Ok(())
        }
        Commands::Status => run_status(&engine, &config),
        Commands::Profiles { action } => run_profiles(&mut engine, action, &config),
        Commands::AckRestart => run_ack_restart(&mut engine),
    };

    if let Err(e) = result {
        fail("Error", e);
    }
}

fn fail(context: &str, err: SettingsError) -> ! {
    eprintln!("{}: {}", context, err);
    process::exit(exit_code(&err))
}

fn exit_code(err: &SettingsError) -> i32 {
    match err {
        SettingsError::Persistence(_) => EXIT_CODE_PERSISTENCE,
        _ => 1,
    }
}

fn render_json<T: Serialize>(value: &T, config: &EngineConfig) -> Result<String, SettingsError> {
    let out = if config.pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    out.map_err(|e| SettingsError::Config(format!("serializing output: {}", e)))
}

fn print_json<T: Serialize>(value: &T, config: &EngineConfig) -> Result<(), SettingsError> {
    println!("{}", render_json(value, config)?);
    Ok(())
}

/// Split `path=value`; the path is trimmed, the value kept as typed.
fn parse_assignment(assignment: &str) -> Result<(&str, &str), SettingsError> {
    match assignment.split_once('=') {
        Some((path, text)) => Ok((path.trim(), text)),
        None => Err(SettingsError::Validation {
            path: assignment.to_string(),
            reason: "expected path=value".to_string(),
        }),
    }
}

fn run_show(
    engine: &SettingsEngine,
    profile: Option<String>,
    config: &EngineConfig,
) -> Result<(), SettingsError> {
    let json = match profile {
        Some(id) => engine.effective_for(&id)?.document().to_json(),
        None => engine.working_json(),
    };
    print_json(&json, config)
}

fn run_get(engine: &SettingsEngine, path: &str, config: &EngineConfig) -> Result<(), SettingsError> {
    let value = engine.current_value(path)?;
    let output = serde_json::json!({
        "path": path,
        "value": value.to_json(),
        "override": engine.is_override(path)?,
        "profile": engine.active_profile_id(),
    });
    print_json(&output, config)
}

fn run_set(
    engine: &mut SettingsEngine,
    assignments: &[String],
    config: &EngineConfig,
) -> Result<(), SettingsError> {
    for assignment in assignments {
        let (path, text) = parse_assignment(assignment)?;
        engine.set_field_text(path, text)?;
    }
    let outcome = engine.apply()?;
    if outcome.restart_required {
        eprintln!("Restart required for changes to take effect");
    }
    print_json(&outcome, config)
}

fn run_inherit(engine: &mut SettingsEngine, path: &str) -> Result<(), SettingsError> {
    if engine.revert_override(path)? {
        engine.flush()?;
        println!("{} now inherits from the default profile", path);
    } else {
        println!("{} is not overridden by profile {}", path, engine.active_profile_id());
    }
    Ok(())
}

fn run_diff(engine: &SettingsEngine, left: &str, right: &str) -> Result<(), SettingsError> {
    for path in engine.diff_profiles(left, right)? {
        println!("{}", path);
    }
    Ok(())
}

fn run_paths(engine: &SettingsEngine) {
    let restart_keys = engine.schema().restart_keys();
    for (key, kind) in engine.schema().describe() {
        if restart_keys.contains(&key) {
            println!("{}  {}  (restart)", key, kind);
        } else {
            println!("{}  {}", key, kind);
        }
    }
}

fn run_status(engine: &SettingsEngine, config: &EngineConfig) -> Result<(), SettingsError> {
    let output = serde_json::json!({
        "active_profile": engine.active_profile_id(),
        "restart_required": engine.is_restart_required(),
        "store_path": config.store_path,
        "profiles": engine.list_profiles().len(),
    });
    print_json(&output, config)
}

fn run_profiles(
    engine: &mut SettingsEngine,
    action: ProfilesCommands,
    config: &EngineConfig,
) -> Result<(), SettingsError> {
    match action {
        ProfilesCommands::List => return print_json(&engine.list_profiles(), config),
        ProfilesCommands::Create { name } => {
            let summary = engine.create_profile(&name)?;
            engine.flush()?;
            return print_json(&summary, config);
        }
        ProfilesCommands::Clone { id } => {
            let summary = engine.clone_profile(&id)?;
            engine.flush()?;
            return print_json(&summary, config);
        }
        ProfilesCommands::Delete { id, yes } => {
            if config.confirm_destructive && !yes && id != DEFAULT_PROFILE_ID {
                eprintln!("Refusing to delete profile {} without --yes", id);
                process::exit(1);
            }
            engine.delete_profile(&id)?;
            engine.flush()?;
            println!("Deleted profile {}", id);
        }
        ProfilesCommands::Activate { id } => {
            engine.activate_profile(&id)?;
            engine.flush()?;
            println!("Active profile: {}", id);
        }
        ProfilesCommands::Rename { id, name } => {
            engine.rename_profile(&id, &name)?;
            engine.flush()?;
            println!("Renamed profile {}", id);
        }
    }
    Ok(())
}

fn run_ack_restart(engine: &mut SettingsEngine) -> Result<(), SettingsError> {
    if engine.acknowledge_restart()? {
        engine.flush()?;
        println!("Restart acknowledged");
    } else {
        println!("No restart pending");
    }
    Ok(())
}
