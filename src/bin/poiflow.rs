use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser, Subcommand};
use poiflow_rs::{Client, ClientConfig};

#[derive(Parser, Debug)]
#[command(name = "poiflow")]
#[command(about = "Interact with the poiflow data-integration workbench")]
struct CliOptions {
    /// Base URL of the workbench API (overrides config/env)
    #[arg(long = "base-url")]
    base_url: Option<String>,

    /// API key (overrides config/env)
    #[arg(long = "api-key")]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all files on the remote user file system
    Browse {
        /// Sort column
        #[arg(long, default_value = "modified")]
        sort: String,

        /// Sort in descending order
        #[arg(long, action = ArgAction::SetTrue)]
        descending: bool,

        /// Render file sizes as human-readable strings
        #[arg(long, action = ArgAction::SetTrue)]
        human: bool,
    },

    /// Search the resource catalog
    Catalog {
        #[arg(long)]
        term: Option<String>,

        #[arg(long, default_value_t = 0)]
        page: u32,

        #[arg(long = "page-size", default_value_t = 10)]
        page_size: u32,
    },

    /// Search workflow instances
    Processes {
        #[arg(long)]
        term: Option<String>,

        #[arg(long, default_value_t = 0)]
        page: u32,

        #[arg(long = "page-size", default_value_t = 10)]
        page_size: u32,
    },

    /// Show the steps and files of one workflow revision
    Status {
        id: i64,
        version: i64,

        /// Show execution files instead of steps
        #[arg(long, action = ArgAction::SetTrue)]
        files: bool,

        /// Render file sizes as human-readable strings
        #[arg(long, action = ArgAction::SetTrue)]
        human: bool,
    },

    /// Start or resume a workflow revision
    Start { id: i64, version: i64 },

    /// Stop a running workflow revision
    Stop { id: i64, version: i64 },

    /// Resolve and download the terminal output of a workflow revision
    Output {
        id: i64,
        version: i64,
        target: PathBuf,

        /// Output part key override
        #[arg(long = "part-key")]
        part_key: Option<String>,
    },

    /// Upload a local file to the remote user file system
    Upload {
        source: PathBuf,
        target: String,

        #[arg(long, action = ArgAction::SetTrue)]
        overwrite: bool,
    },

    /// Download a remote file to the local file system
    Download { source: String, target: PathBuf },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let opts = CliOptions::parse();

    let mut config = ClientConfig::load()?;
    if let Some(base_url) = opts.base_url {
        config.base_url = base_url;
    }
    if let Some(api_key) = opts.api_key {
        config.api_key = api_key;
    }
    let client = Client::new(config)?;

    match opts.command {
        Command::Browse {
            sort,
            descending,
            human,
        } => {
            let table = client.file_browse(&sort, !descending, human)?;
            print!("{table}");
        }
        Command::Catalog {
            term,
            page,
            page_size,
        } => {
            let table = client.catalog_query(term.as_deref(), page, page_size)?;
            print!("{table}");
        }
        Command::Processes {
            term,
            page,
            page_size,
        } => {
            let table = client.process_query(term.as_deref(), page, page_size)?;
            print!("{table}");
        }
        Command::Status {
            id,
            version,
            files,
            human,
        } => {
            let process = client.process_status(id, version)?;
            let table = if files {
                process.files(human)?
            } else {
                process.steps()?
            };
            print!("{table}");
        }
        Command::Start { id, version } => client.process_start(id, version)?,
        Command::Stop { id, version } => client.process_stop(id, version)?,
        Command::Output {
            id,
            version,
            target,
            part_key,
        } => {
            let process = client.process_status(id, version)?;
            let file = process
                .output(part_key.as_deref())?
                .ok_or_else(|| anyhow!("process ({id}, {version}) has no resolvable output"))?;
            client.download(&file, &target)?;
        }
        Command::Upload {
            source,
            target,
            overwrite,
        } => client.file_upload(&source, &target, overwrite)?,
        Command::Download { source, target } => client.file_download(&source, &target)?,
    }

    Ok(())
}
