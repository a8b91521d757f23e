use clap::{Parser, Subcommand};
use log::error;
use std::path::PathBuf;

use satchel::configuration::config::EngineConfig;
use satchel::queue::queue_trait::ArtifactQueue;
use satchel::queue::sqlite_queue::SqliteArtifactQueue;

#[derive(Parser)]
#[command(name = "satchel")]
#[command(version)]
#[command(about = "Offline evidence queue maintenance")]
struct Args {
    /// Directory holding the durable evidence queue. Takes precedence over
    /// the config file when both are given.
    #[arg(long)]
    storage_path: Option<PathBuf>,

    /// TOML configuration file to read the storage location from
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List case ids that still hold unsynchronized evidence
    Pending,
    /// Show queued artifact metadata for one case
    Show {
        #[arg(long)]
        case: String,
        /// Emit machine-readable JSON instead of the table
        #[arg(long)]
        json: bool,
    },
    /// Drop every queued artifact of one case. Destructive; only for
    /// evidence confirmed synchronized out of band.
    Purge {
        #[arg(long)]
        case: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    let storage_path = match resolve_storage_path(&args) {
        Ok(p) => p,
        Err(e) => {
            error!("Unable to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let queue = match SqliteArtifactQueue::open(&storage_path).await {
        Ok(q) => q,
        Err(e) => {
            error!("Unable to open evidence queue: {}", e);
            std::process::exit(1);
        }
    };

    let result = match args.command {
        Command::Pending => pending(&queue).await,
        Command::Show { case, json } => show(&queue, &case, json).await,
        Command::Purge { case } => purge(&queue, &case).await,
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn resolve_storage_path(args: &Args) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(path) = &args.storage_path {
        return Ok(path.clone());
    }
    if let Some(config) = &args.config {
        return Ok(EngineConfig::from_file(config)?.storage_path);
    }
    Ok(PathBuf::from("."))
}

async fn pending(queue: &SqliteArtifactQueue) -> Result<(), Box<dyn std::error::Error>> {
    let cases = queue.cases_with_pending().await?;
    if cases.is_empty() {
        println!("no pending evidence");
        return Ok(());
    }
    for case in cases {
        let count = queue.list(&case).await?.len();
        let audio = if queue.load_audio_note(&case).await?.is_some() {
            " + audio note"
        } else {
            ""
        };
        println!("{}: {} artifact(s){}", case, count, audio);
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct ArtifactSummary {
    id: uuid::Uuid,
    captured_at: chrono::DateTime<chrono::Utc>,
    session_offset_secs: f64,
    location: Option<satchel::geo::GeoPoint>,
    sync_status: satchel::queue::types::SyncStatus,
    payload_bytes: usize,
    annotation: String,
}

async fn show(
    queue: &SqliteArtifactQueue,
    case: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let artifacts = queue.list(case).await?;
    if json {
        let summaries: Vec<ArtifactSummary> = artifacts
            .iter()
            .map(|a| ArtifactSummary {
                id: a.id,
                captured_at: a.captured_at,
                session_offset_secs: a.session_offset_secs,
                location: a.location,
                sync_status: a.sync_status,
                payload_bytes: a.payload.len(),
                annotation: a.annotation.clone(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    if artifacts.is_empty() {
        println!("no queued artifacts for case {}", case);
        return Ok(());
    }
    for a in artifacts {
        let location = match a.location {
            Some(p) => format!("{:.5},{:.5}", p.lat, p.lng),
            None => "-".to_string(),
        };
        println!(
            "{}  {}  offset={:.1}s  loc={}  status={}  {} byte(s)  {}",
            a.id,
            a.captured_at.to_rfc3339(),
            a.session_offset_secs,
            location,
            a.sync_status.as_str(),
            a.payload.len(),
            a.annotation
        );
    }
    Ok(())
}

async fn purge(
    queue: &SqliteArtifactQueue,
    case: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let count = queue.list(case).await?.len();
    queue.clear(case).await?;
    queue.delete_audio_note(case).await?;
    println!("purged {} artifact(s) for case {}", count, case);
    Ok(())
}
