//! filestore command-line tool.
//!
//! Runs store operations against either a named store from a registry
//! config or an ad-hoc local store rooted at a directory.
//!
//! Usage:
//!   # Ad-hoc local store rooted at ./site
//!   filestore --root ./site files pages --filter '*.md'
//!   filestore --root ./site put pages/home.md ./home.md
//!   echo hi | filestore --root ./site put notes/hi.txt -
//!
//!   # Named store from a RON registry config
//!   filestore --config stores.ron --store media dirs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{EnvFilter, fmt};

use filestore::{
    BackendKind, ContentSource, FileFilter, FileStore, Listing, RegistryConfig, StoreOptions,
    StoreRegistry, StoreResult, TimestampKind, open_store,
};

/// Inspect and modify a file store.
#[derive(Parser, Debug)]
#[command(name = "filestore")]
#[command(about = "Inspect and modify a virtual file store")]
struct Args {
    /// Registry config file (RON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store name within the registry (default store if omitted)
    #[arg(long, global = true, requires = "config")]
    store: Option<String>,

    /// Physical root for an ad-hoc local store (default: current directory)
    #[arg(long, global = true, conflicts_with = "config")]
    root: Option<PathBuf>,

    /// Virtual path separator for an ad-hoc local store
    #[arg(long, global = true, default_value_t = '/')]
    separator: char,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List directories under a path
    Dirs {
        #[arg(default_value = "")]
        path: String,
    },
    /// List files under a path
    Files {
        #[arg(default_value = "")]
        path: String,
        /// Wildcard filter on file names
        #[arg(long, default_value = FileFilter::ALL)]
        filter: String,
    },
    /// Store a local file (or `-` for stdin) at a path
    Put {
        path: String,
        source: PathBuf,
        /// Fail instead of replacing an existing file
        #[arg(long)]
        no_overwrite: bool,
    },
    /// Write a file's content to stdout
    Cat { path: String },
    /// Delete a file
    Rm { path: String },
    /// Delete a directory
    Rmdir {
        path: String,
        /// Delete contents too
        #[arg(short, long)]
        recursive: bool,
    },
    /// Show kind and timestamps of a path
    Stat { path: String },
    /// Print the root-qualified virtual path
    Abs { path: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `cat` output stays clean
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let store = open(&args).await?;
    run(store.as_ref(), args.command).await
}

async fn open(args: &Args) -> Result<Arc<dyn FileStore>> {
    if let Some(config_path) = &args.config {
        let config = RegistryConfig::load(config_path)
            .await
            .with_context(|| format!("loading {}", config_path.display()))?;
        let registry = StoreRegistry::from_config(config).await?;
        let store = match &args.store {
            Some(name) => registry.get(name).await?,
            None => registry.default_store().await?,
        };
        return Ok(store);
    }

    let root = match &args.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    let options = StoreOptions::new()
        .with_root_path(root_name(&root))
        .with_separator(args.separator)
        .with_root_physical_path(root);
    Ok(open_store(BackendKind::Local, options).await?)
}

/// Virtual root name for an ad-hoc store: the directory's own name.
fn root_name(root: &Path) -> String {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string())
}

async fn run(store: &dyn FileStore, command: Command) -> Result<()> {
    match command {
        Command::Dirs { path } => print_listing(store.list_directories(&path)).await,
        Command::Files { path, filter } => {
            let filter = FileFilter::new(&filter)?;
            print_listing(store.list_files(&path, &filter)).await
        }
        Command::Put {
            path,
            source,
            no_overwrite,
        } => {
            let written = if source == Path::new("-") {
                let mut stdin = tokio::io::stdin();
                store
                    .add_file(&path, ContentSource::forward(&mut stdin), !no_overwrite)
                    .await?
            } else {
                let mut file = tokio::fs::File::open(&source)
                    .await
                    .with_context(|| format!("opening {}", source.display()))?;
                store
                    .add_file(&path, ContentSource::seekable(&mut file), !no_overwrite)
                    .await?
            };
            tracing::info!(path = %path, bytes = written, "stored file");
            Ok(())
        }
        Command::Cat { path } => {
            let mut reader = store.open_file(&path).await?;
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut reader, &mut stdout).await?;
            stdout.flush().await?;
            Ok(())
        }
        Command::Rm { path } => Ok(store.delete_file(&path).await?),
        Command::Rmdir { path, recursive } => Ok(store.delete_directory(&path, recursive).await?),
        Command::Stat { path } => {
            let kind = if store.directory_exists(&path).await {
                "directory"
            } else if store.file_exists(&path).await {
                "file"
            } else {
                anyhow::bail!("no such file or directory: {path}");
            };
            println!("{:<15}{}", "path:", store.absolute_path(&path));
            println!("{:<15}{kind}", "kind:");
            for stamp in [
                TimestampKind::LastModified,
                TimestampKind::Created,
                TimestampKind::LastAccessed,
            ] {
                let label = format!("{stamp}:");
                println!("{label:<15}{}", format_time(store.timestamp(&path, stamp).await));
            }
            Ok(())
        }
        Command::Abs { path } => {
            println!("{}", store.absolute_path(&path));
            Ok(())
        }
    }
}

async fn print_listing(listing: StoreResult<Listing>) -> Result<()> {
    let mut entries = listing?.stream();
    while let Some(entry) = entries.next().await {
        println!("{}", entry?);
    }
    Ok(())
}

/// Seconds since the Unix epoch, or `-` when the medium can't say.
fn format_time(time: StoreResult<SystemTime>) -> String {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|| "-".to_string())
}
