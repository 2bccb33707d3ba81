//! mdsync CLI
//!
//! Command-line shell over a markdown documents directory.
//!
//! # Commands
//!
//! - `list` - List documents, newest first
//! - `open` - Print a document's content
//! - `add` - Create an empty document
//! - `save` - Replace a document's content with stdin
//! - `delete` - Delete a document
//! - `rename` - Rename a document within its directory
//! - `sync-setup` - Connect the directory to a git remote
//! - `sync` - Commit, pull, and push
//! - `status` - Show replication settings and document count

mod commands;

use clap::{Parser, Subcommand};
use commands::{Format, Session};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Markdown notes with git sync.
#[derive(Parser)]
#[command(name = "mdsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Documents directory (defaults to ~/.mediocre)
    #[arg(global = true, short, long)]
    root: Option<PathBuf>,

    /// Settings file (defaults to ~/.mdsync/store.db.json)
    #[arg(global = true, short, long)]
    settings: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List documents, newest first
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Print a document's content
    Open {
        /// Document id or path relative to the root
        document: String,
    },

    /// Create an empty document
    Add {
        /// File name, relative to the root
        file_name: String,
    },

    /// Replace a document's content with stdin
    Save {
        /// Document id or path relative to the root
        document: String,

        /// Tidy markdown before writing
        #[arg(short, long)]
        tidy: bool,
    },

    /// Delete a document
    Delete {
        /// Document id or path relative to the root
        document: String,
    },

    /// Rename a document within its directory
    Rename {
        /// Document id or path relative to the root
        document: String,

        /// New file name
        new_name: String,
    },

    /// Connect the documents directory to a git remote
    SyncSetup {
        /// Remote repository URL
        repo_url: String,

        /// Commit author name
        #[arg(long)]
        user_name: String,

        /// Commit author email
        #[arg(long)]
        user_email: String,
    },

    /// Commit local changes, pull, and push
    Sync,

    /// Show replication settings and document count
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let root = match cli.root {
        Some(root) => root,
        None => commands::home_dir()?.join(".mediocre"),
    };
    let settings = match cli.settings {
        Some(settings) => settings,
        None => commands::home_dir()?.join(".mdsync").join("store.db.json"),
    };
    let session = Session::open(&root, &settings)?;

    match cli.command {
        Commands::List { format } => commands::documents::list(&session, format).await?,
        Commands::Open { document } => commands::documents::open(&session, &document).await?,
        Commands::Add { file_name } => commands::documents::add(&session, &file_name).await?,
        Commands::Save { document, tidy } => {
            let content = std::io::read_to_string(std::io::stdin())?;
            commands::documents::save(&session, &document, content, tidy).await?;
        }
        Commands::Delete { document } => {
            commands::documents::delete(&session, &document).await?
        }
        Commands::Rename { document, new_name } => {
            commands::documents::rename(&session, &document, &new_name).await?
        }
        Commands::SyncSetup {
            repo_url,
            user_name,
            user_email,
        } => commands::sync::setup(&session, &repo_url, &user_name, &user_email).await?,
        Commands::Sync => commands::sync::run(&session).await?,
        Commands::Status { format } => commands::status::run(&session, format).await?,
    }

    Ok(())
}
