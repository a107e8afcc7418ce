use clap::Parser;
use propmedia::Config;
use propmedia::db::{Db, migrate};
use propmedia::media::{Classification, IngestSession, UploadStatus};
use propmedia::storage::StorageClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use anyhow::{Context, Result};

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Upload property photo folders and attach them to their properties")]
struct Args {
    /// Property folders to upload; each becomes one group
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Show matching and classification without uploading anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Bind a folder to a property id by hand: FOLDER=ID
    #[arg(long, value_name = "FOLDER=ID", value_parser = parse_assignment)]
    assign: Vec<(String, i64)>,

    /// Override a file's classification: FOLDER/FILE=hero|floorplan|gallery
    #[arg(long, value_name = "FOLDER/FILE=CLASS", value_parser = parse_override)]
    classify: Vec<(String, String, Classification)>,

    /// Leave a folder out of this run
    #[arg(long, value_name = "FOLDER")]
    skip: Vec<String>,
}

fn parse_assignment(raw: &str) -> std::result::Result<(String, i64), String> {
    let (folder, id) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected FOLDER=ID, got '{}'", raw))?;
    let id = id
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("'{}' is not a property id", id))?;
    Ok((folder.trim().to_string(), id))
}

fn parse_override(raw: &str) -> std::result::Result<(String, String, Classification), String> {
    let (target, class) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected FOLDER/FILE=CLASS, got '{}'", raw))?;
    let (folder, file) = target
        .rsplit_once('/')
        .ok_or_else(|| format!("expected FOLDER/FILE before '=', got '{}'", target))?;
    let class = class.trim().parse::<Classification>().map_err(|e| e.to_string())?;
    Ok((folder.trim().to_string(), file.trim().to_string(), class))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", config.log_level())
    ).init();
    log::info!("Configuration loaded successfully");
    log::info!("Database path: {}", config.db_path().display());

    let db = Db::new(config.db_path());
    db.with_connection(migrate::run_migrations).await?;

    let store = StorageClient::from_config(&config)?;
    let mut session = IngestSession::new(db, Arc::new(store))
        .with_batch_size(config.upload.batch_size);

    let added = session.add_dropped(args.paths.clone()).await?;
    if added == 0 {
        log::warn!("No image folders found in the given paths.");
        return Ok(());
    }

    for folder in &args.skip {
        let index = session
            .find_group(folder)
            .with_context(|| format!("--skip: no folder named '{}'", folder))?;
        session.discard_group(index)?;
        log::info!("Skipping '{}'", folder);
    }

    for (folder, id) in &args.assign {
        let index = session
            .find_group(folder)
            .with_context(|| format!("--assign: no folder named '{}'", folder))?;
        session.assign_property(index, *id).await?;
    }

    for (folder, file, class) in &args.classify {
        let index = session
            .find_group(folder)
            .with_context(|| format!("--classify: no folder named '{}'", folder))?;
        let file_index = session.groups()[index]
            .file_index(file)
            .with_context(|| format!("--classify: '{}' has no file '{}'", folder, file))?;
        session.reclassify(index, file_index, *class)?;
    }

    print_plan(&session);

    if args.dry_run {
        log::info!("Dry run, nothing uploaded.");
        return Ok(());
    }

    let start = Instant::now();
    let results = session.upload_all().await?;

    let mut failed_groups = 0;
    let mut files_uploaded = 0;
    let mut files_failed = 0;
    for (folder, result) in &results {
        match result {
            Ok(outcome) => {
                files_uploaded += outcome.uploaded;
                files_failed += outcome.failed;
                if !outcome.unlinked.is_empty() {
                    log::warn!(
                        "'{}': {} stored object(s) not linked to the property",
                        folder,
                        outcome.unlinked.len()
                    );
                }
            }
            Err(e) => {
                failed_groups += 1;
                log::error!("✗ '{}': {}", folder, e);
            }
        }
    }

    let unmatched = session
        .groups()
        .iter()
        .filter(|g| g.status == UploadStatus::Pending && !g.is_matched())
        .count();

    log::info!("=== Upload Complete ===");
    log::info!("Groups uploaded: {} (errors: {})", results.len() - failed_groups, failed_groups);
    log::info!("Files uploaded: {} (failed: {})", files_uploaded, files_failed);
    log::info!("Time: {:?}", start.elapsed());
    if unmatched > 0 {
        log::warn!("{} folder(s) matched no property. Use --assign FOLDER=ID.", unmatched);
    }

    if failed_groups > 0 {
        anyhow::bail!("{} group(s) failed to upload", failed_groups);
    }

    Ok(())
}

fn print_plan(session: &IngestSession) {
    println!();
    for group in session.groups() {
        match &group.matched_property {
            Some(p) => println!("{}  →  #{} {}", group.display_name, p.id, p.title),
            None => println!("{}  →  (no match, will be skipped)", group.display_name),
        }
        for entry in group.files() {
            println!("    {:<10} {}", entry.classification, entry.file.name);
        }
        for (class, names) in group.singleton_conflicts() {
            println!("    ! {} files marked {}: only the first is linked", names.len(), class);
        }
    }
    println!();
}
