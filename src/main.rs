// BangSync - keeps the music catalog in step with the folders on disk
// Thin CLI over the library: sync folders, show the audit log, write a default config

use anyhow::{Context, Result};
use bangsync::{
    logging::init_logging, Config, LibrarySync, ProgressSink, SqliteCatalog, SyncEvent,
    SyncStatus,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "bangsync")]
#[command(about = "Reconcile a music catalog with the audio files on disk")]
struct Args {
    /// Enable developer logging (stderr + debug output)
    #[arg(long, global = true)]
    dev: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sync one or more folders (defaults to music_directories from the config)
    Sync {
        folders: Vec<PathBuf>,

        /// Catalog database to use instead of the configured one
        #[arg(long)]
        db: Option<PathBuf>,

        /// Only print the final summary per folder
        #[arg(long, short)]
        quiet: bool,
    },
    /// Show recent sync runs, newest first
    History {
        #[arg(long, short, default_value_t = 10)]
        limit: usize,

        #[arg(long)]
        db: Option<PathBuf>,

        /// Print entries as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Write a default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Nothing to load yet when writing the config
    if let Command::InitConfig { force } = args.command {
        return init_config(args.config, force);
    }

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let _log_guard = init_logging(&config.logging, args.dev)?;
    info!("BangSync starting up");

    match args.command {
        Command::Sync { folders, db, quiet } => run_sync(&config, folders, db, quiet).await,
        Command::History { limit, db, json } => show_history(&config, limit, db, json),
        Command::InitConfig { .. } => unreachable!("handled before config load"),
    }
}

async fn run_sync(
    config: &Config,
    folders: Vec<PathBuf>,
    db: Option<PathBuf>,
    quiet: bool,
) -> Result<ExitCode> {
    let folders = if folders.is_empty() {
        config.music_directories.clone()
    } else {
        folders
    };

    let db_path = db.unwrap_or_else(|| config.database_path.clone());
    let catalog = SqliteCatalog::open(&db_path)
        .with_context(|| format!("Could not open catalog at {}", db_path.display()))?;
    debug!("Catalog opened at {}", db_path.display());

    let engine = Arc::new(LibrarySync::with_components(
        catalog,
        config.scanner(),
        config.extractor(),
    ));

    // Ctrl-C cancels the active run, the transaction rolls back
    let interrupt = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling sync");
                eprintln!("\nCancelling, catalog will be left as it was...");
                engine.cancel();
            }
        })
    };

    let mut failed = false;

    for folder in folders {
        println!("📁 Syncing {}", folder.display());

        let (tx, mut rx) = mpsc::unbounded_channel::<SyncEvent>();
        let sink: Arc<dyn ProgressSink> = Arc::new(tx);
        let run = tokio::spawn(engine.sync_async_with_progress(folder.clone(), sink));

        // Channel closes once the run drops its sender
        while let Some(event) = rx.recv().await {
            if !quiet {
                print_event(&event);
            }
        }

        let outcome = run.await.context("sync task panicked")?;
        let marker = if outcome.is_success() { "✅" } else { "⚠️ " };
        println!("{} {}", marker, outcome);

        match outcome.status() {
            SyncStatus::Error | SyncStatus::FolderNotFound => failed = true,
            // User asked to stop, don't start the next folder
            SyncStatus::Cancelled => break,
            SyncStatus::Completed | SyncStatus::AlreadyRunning => {}
        }
    }

    interrupt.abort();

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn print_event(event: &SyncEvent) {
    match event {
        SyncEvent::Started { total_files } => println!("🔍 {} audio files found", total_files),
        SyncEvent::FileProcessed { current, total, file_name } => {
            if current % 50 == 0 || current == total {
                println!("   📀 [{}/{}] {}", current, total, file_name);
            }
        }
        SyncEvent::Added { path } => println!("   + {}", path.display()),
        SyncEvent::Updated { path } => println!("   ~ {}", path.display()),
        SyncEvent::Removed { path } => println!("   - {}", path.display()),
        SyncEvent::Error { path, message } => {
            eprintln!("   ❌ {}: {}", path.display(), message)
        }
        SyncEvent::Completed { .. } => {}
    }
}

fn show_history(config: &Config, limit: usize, db: Option<PathBuf>, json: bool) -> Result<ExitCode> {
    let db_path = db.unwrap_or_else(|| config.database_path.clone());
    let engine = LibrarySync::new(SqliteCatalog::open(&db_path)?);
    let entries = engine.history(limit)?;

    if entries.is_empty() && !json {
        println!("No sync runs recorded yet");
    }

    for entry in &entries {
        if json {
            println!("{}", serde_json::to_string(entry)?);
        } else {
            println!(
                "{}  {:<16} {}  +{} ~{} -{} ={} !{}  {}ms{}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.status.as_str(),
                entry.folder_path,
                entry.added,
                entry.updated,
                entry.removed,
                entry.skipped,
                entry.errors,
                entry.elapsed_ms,
                entry
                    .message
                    .as_deref()
                    .map(|m| format!("  ({})", m))
                    .unwrap_or_default(),
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<ExitCode> {
    let path = match path {
        Some(path) => path,
        None => Config::config_path()?,
    };

    if path.exists() && !force {
        println!("Config already exists at {} (use --force to overwrite)", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    Config::default().save_to(&path)?;
    println!("✅ Wrote default config to {}", path.display());
    Ok(ExitCode::SUCCESS)
}
