//! # dni-guard - command line front end
//!
//! Small host around the validation engine: loads the TOML configuration,
//! discovers rules, keeps assignments in a JSON file and validates values
//! from the command line.
//!
//! ```text
//! dni-guard [--config <path>] check <identity> [owner]
//! dni-guard [--config <path>] assign <owner> <identity> [--exempt]
//! dni-guard [--config <path>] show <owner>
//! dni-guard [--config <path>] remove <owner>
//! dni-guard [--config <path>] rules
//! dni-guard [--config <path>] settings
//! ```
use clap::{Parser, Subcommand};
use dni_guard::config::Config;
use dni_guard::{
    AssignmentStore, MemoryStore, OwnerRef, RuleCatalog, SharedSettings, Staged,
    ValidationEngine, ValidationOutcome,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "dni-guard.toml";

/// Exit code for a rejected identity
const EXIT_INVALID: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "dni-guard", version)]
#[command(about = "Validate and assign identity numbers")]
struct Cli {
    /// Configuration file (defaults to ./dni-guard.toml when present)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Command {
    /// Validate a value without storing it
    Check {
        identity: String,
        /// Owner the value would be assigned to
        owner: Option<OwnerRef>,
    },

    /// Validate a value and store it for an owner
    Assign {
        owner: OwnerRef,
        identity: String,
        /// Mark the holder as transient so it never blocks other owners
        #[arg(long)]
        exempt: bool,
    },

    /// Print the value held by an owner
    Show { owner: OwnerRef },

    /// Drop the value held by an owner
    Remove { owner: OwnerRef },

    /// List the active rules in evaluation order
    Rules,

    /// Print the effective validation settings
    Settings,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ Failed to load config: {}", e);
            process::exit(1);
        }
    };

    init_logging(&config.logging.level);

    if let Err(e) = config.validate() {
        eprintln!("❌ Configuration validation failed: {}", e);
        process::exit(1);
    }

    let store = match MemoryStore::open(&config.store.path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("❌ Failed to open store {}: {}", config.store.path.display(), e);
            process::exit(1);
        }
    };

    let settings = Arc::new(config.settings());
    let catalog = Arc::new(RuleCatalog::new(config.extensions.clone()));
    let engine = ValidationEngine::new(settings.clone(), store.clone(), catalog.clone());

    let host = Host {
        engine: &engine,
        store: store.as_ref(),
        catalog: &catalog,
        settings: &settings,
    };
    let code = match run(cli.command, host).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {}", e);
            1
        }
    };
    process::exit(code);
}

/// An explicit path must exist; the default one is optional
fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Config::from_file(path),
        None if Path::new(DEFAULT_CONFIG).exists() => Config::from_file(DEFAULT_CONFIG),
        None => Ok(Config::default()),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Collaborators a command may use
struct Host<'a> {
    engine: &'a ValidationEngine,
    store: &'a MemoryStore,
    catalog: &'a RuleCatalog,
    settings: &'a SharedSettings,
}

async fn run(command: Command, host: Host<'_>) -> Result<i32, Box<dyn std::error::Error>> {
    let Host { engine, store, catalog, settings } = host;
    debug!("Running {:?}", command);

    match command {
        Command::Check { identity, owner } => match engine.validate(&identity, owner).await? {
            ValidationOutcome::Valid => {
                println!("✅ valid");
                Ok(0)
            }
            ValidationOutcome::Invalid { reason } => {
                println!("🚫 invalid: {}", reason);
                Ok(EXIT_INVALID)
            }
        },
        Command::Assign { owner, identity, exempt } => {
            match engine.stage(&identity, Some(owner)).await? {
                Staged::Accepted(pending) => {
                    let identity = pending.identity().to_string();
                    pending.commit(owner, exempt, store).await?;
                    println!("✅ assigned {} to {}", identity, owner);
                    Ok(0)
                }
                Staged::Rejected { reason } => {
                    println!("🚫 invalid: {}", reason);
                    Ok(EXIT_INVALID)
                }
            }
        }
        Command::Show { owner } => match store.identity_of(owner).await? {
            Some(identity) => {
                println!("{}", identity);
                Ok(0)
            }
            None => {
                println!("(none)");
                Ok(1)
            }
        },
        Command::Remove { owner } => {
            if store.remove(owner).await? {
                println!("✅ removed identity of {}", owner);
                Ok(0)
            } else {
                println!("(none)");
                Ok(1)
            }
        }
        Command::Rules => {
            let registry = catalog.snapshot();
            if registry.is_empty() {
                println!("(no rules)");
            }
            for rule in registry.chain() {
                println!("   • {} ({})", rule.name(), rule.rule_type());
            }
            Ok(0)
        }
        Command::Settings => {
            let values: BTreeMap<_, _> = settings.all().into_iter().collect();
            for (name, value) in values {
                println!("{} = {}", name, value.as_text());
            }
            Ok(0)
        }
    }
}
