//! gitflow - command-line front end for the repository engine
//!
//! Run with `gitflow --help` for usage.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, bail};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use gitflow::{
    APP_NAME, VERSION,
    config::{Config, PreferenceStore, SAVED_REPOSITORIES_KEY},
    context::EngineContext,
    event::EngineEvent,
    git::GitCli,
    registry::RepositoryRegistry,
    repository::{Operation, Outcome, RepositorySnapshot},
};

#[derive(Parser)]
#[command(name = APP_NAME)]
#[command(version = VERSION)]
#[command(about = "Inspect and operate on git working directories")]
#[command(long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show branches, remotes, changes and stashes
    Status {
        /// Working directory (default: current directory)
        path: Option<PathBuf>,
    },

    /// Show recent history
    Log {
        path: Option<PathBuf>,

        /// Number of commits to print
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Show the diff of one file
    Diff {
        path: PathBuf,
        /// File path relative to the repository root
        file: String,
    },

    /// Print change notifications until Ctrl-C
    Watch { path: Option<PathBuf> },

    /// Clone a repository and remember it
    Clone { url: String, dest: PathBuf },

    /// Create and initialize a repository and remember it
    Init { path: PathBuf },

    /// List remembered repositories
    Repos,

    /// Run a mutating operation
    Op {
        /// Working directory
        #[arg(short = 'C', long)]
        path: Option<PathBuf>,

        #[command(subcommand)]
        operation: OpCommand,
    },

    /// Show configuration
    Config {
        /// Initialize config file with defaults
        #[arg(long)]
        init: bool,
    },
}

#[derive(Subcommand)]
enum OpCommand {
    Pull,
    Push {
        #[arg(default_value = "origin")]
        remote: String,
        branch: Option<String>,
    },
    Commit {
        #[arg(short, long)]
        message: String,
    },
    Stage {
        file: String,
    },
    Unstage {
        file: String,
    },
    StageAll,
    Checkout {
        branch: String,
    },
    /// Create a branch and switch to it
    Branch {
        name: String,
    },
    Stash {
        #[arg(short, long)]
        message: Option<String>,
    },
    ApplyStash {
        index: usize,
    },
    /// Throw away working tree edits to a file
    Discard {
        file: String,
        /// Required: the edits cannot be recovered
        #[arg(long)]
        yes: bool,
    },
}

impl From<OpCommand> for Operation {
    fn from(command: OpCommand) -> Self {
        match command {
            OpCommand::Pull => Operation::Pull,
            OpCommand::Push { remote, branch } => Operation::Push { remote, branch },
            OpCommand::Commit { message } => Operation::Commit { message },
            OpCommand::Stage { file } => Operation::Stage { path: file },
            OpCommand::Unstage { file } => Operation::Unstage { path: file },
            OpCommand::StageAll => Operation::StageAll,
            OpCommand::Checkout { branch } => Operation::Checkout { branch },
            OpCommand::Branch { name } => Operation::CreateBranch { name },
            OpCommand::Stash { message } => Operation::CreateStash { message },
            OpCommand::ApplyStash { index } => Operation::ApplyStash { index },
            OpCommand::Discard { file, .. } => Operation::DiscardChanges { path: file },
        }
    }
}

fn setup_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        // Use info level for our crate, warn for dependencies
        EnvFilter::new("warn").add_directive("gitflow=info".parse()?)
    };

    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(file).with_target(false))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .with(filter)
            .init();
    }

    Ok(())
}

/// Registry whose opens are only remembered when `remember` is set
fn build_registry(config: Config, remember: bool) -> Result<RepositoryRegistry> {
    let preferences = if remember {
        PreferenceStore::load()?
    } else {
        PreferenceStore::new()
    };
    Ok(RepositoryRegistry::new(EngineContext::new(config), preferences))
}

fn working_dir(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => Ok(std::env::current_dir()?),
    }
}

fn print_snapshot(snapshot: &RepositorySnapshot) {
    let branch = if snapshot.current_branch.is_empty() {
        "(detached)"
    } else {
        snapshot.current_branch.as_str()
    };
    println!("{} on {}", snapshot.display_name, branch);
    println!();

    println!("Branches:");
    for b in &snapshot.branches {
        let marker = if b.is_current { "*" } else { " " };
        let scope = if b.is_remote { " (remote)" } else { "" };
        println!("  {} {}{}", marker, b.name, scope);
    }

    if !snapshot.remotes.is_empty() {
        println!("Remotes:");
        for r in &snapshot.remotes {
            println!("  {} {} ({})", r.name, r.url, r.kind);
        }
    }

    if snapshot.is_clean() {
        println!("Changes: (clean)");
    }
    for (heading, changes) in [
        ("Staged:", snapshot.staged_changes().collect::<Vec<_>>()),
        ("Unstaged:", snapshot.unstaged_changes().collect::<Vec<_>>()),
    ] {
        if changes.is_empty() {
            continue;
        }
        println!("{}", heading);
        for c in changes {
            println!("  {:<10} {}", c.status.to_string(), c.path);
        }
    }

    if !snapshot.stashes.is_empty() {
        println!("Stashes:");
        for s in &snapshot.stashes {
            println!("  {} {}", s.reference(), s.description);
        }
    }
}

fn print_status_log(registry: &RepositoryRegistry) {
    for message in registry.status_messages() {
        let icon = match message.outcome {
            Outcome::Info => "·",
            Outcome::Success => "✓",
            Outcome::Error => "✗",
        };
        eprintln!(
            "{} {} {}",
            message.timestamp.format("%H:%M:%S"),
            icon,
            message.text
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre error hooks
    color_eyre::install()?;

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    // Ensure required directories exist
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Failed to create directories: {}", e);
    }

    setup_logging(cli.debug || config.debug, config.log_file.as_deref())?;

    match cli.command {
        Commands::Status { path } => {
            let registry = build_registry(config, false)?;
            let id = registry.open(working_dir(path)?).await?;
            if let Some(repo) = registry.get(id).await {
                print_snapshot(&repo.snapshot().await);
            }
            registry.shutdown().await;
        }

        Commands::Log { path, limit } => {
            let registry = build_registry(config, false)?;
            let id = registry.open(working_dir(path)?).await?;
            if let Some(repo) = registry.get(id).await {
                let snapshot = repo.snapshot().await;
                if snapshot.commits.is_empty() {
                    println!("No commits yet");
                }
                for commit in snapshot.commits.iter().take(limit) {
                    println!(
                        "{} {} {:<16} {}",
                        commit.short_hash(),
                        commit.date,
                        commit.author,
                        commit.message
                    );
                }
            }
            registry.shutdown().await;
        }

        Commands::Diff { path, file } => {
            let registry = build_registry(config, false)?;
            let id = registry.open(&path).await?;
            if let Some(repo) = registry.get(id).await {
                let diff = repo.file_diff(&file).await?;
                print!("{}", diff.text);
                eprintln!("{}", diff.summary());
            }
            registry.shutdown().await;
        }

        Commands::Watch { path } => {
            let registry = build_registry(config, false)?;
            let mut events = registry.subscribe();
            let id = registry.open(working_dir(path)?).await?;
            info!("Watching {} (Ctrl-C to stop)", id);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = events.recv() => match event {
                        Ok(EngineEvent::ChangesUpdated { id }) => {
                            if let Some(repo) = registry.get(id).await {
                                let snapshot = repo.snapshot().await;
                                println!("{} change(s)", snapshot.changes.len());
                                for c in &snapshot.changes {
                                    println!("  {} {}", c.status, c.path);
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            info!("Skipped {} events", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            registry.shutdown().await;
        }

        Commands::Clone { url, dest } => {
            let registry = build_registry(config, true)?;
            let result = registry.clone_repository(&url, &dest).await;
            print_status_log(&registry);
            registry.shutdown().await;
            result?;
        }

        Commands::Init { path } => {
            let registry = build_registry(config, true)?;
            let result = registry.create(&path).await;
            print_status_log(&registry);
            registry.shutdown().await;
            result?;
        }

        Commands::Repos => {
            let preferences = PreferenceStore::load()?;
            let saved = preferences.string_list(SAVED_REPOSITORIES_KEY);
            if saved.is_empty() {
                println!("No saved repositories. Use 'gitflow clone' or 'gitflow init'.");
            }
            for path in saved {
                println!("{}", path);
            }
        }

        Commands::Op { path, operation } => {
            if let OpCommand::Discard { yes: false, file } = &operation {
                bail!("Refusing to discard changes to {} without --yes", file);
            }

            let registry = build_registry(config, false)?;
            let id = registry.open(working_dir(path)?).await?;
            let Some(repo) = registry.get(id).await else {
                bail!("Repository {} is no longer open", id);
            };

            let outcome = repo.execute(operation.into()).await;
            print!("{}", outcome.output);
            print_status_log(&registry);
            registry.shutdown().await;

            if !outcome.is_success() {
                bail!("{} failed", outcome.label);
            }
        }

        Commands::Config { init } => {
            if init {
                config.save()?;
                println!(
                    "Configuration initialized at {:?}",
                    Config::config_file_path()?
                );
            } else {
                let git = GitCli::from_config(&config);
                match git.check_installed().await {
                    Ok(version) => println!("Git: {}", version),
                    Err(e) => println!("Git: unavailable ({})", e),
                }
                println!();
                println!("Configuration:");
                println!("{}", toml::to_string_pretty(&config)?);
                println!("\nConfig file: {:?}", Config::config_file_path()?);
                println!("Preferences: {:?}", Config::preferences_file_path()?);
            }
        }
    }

    Ok(())
}
