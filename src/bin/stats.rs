use clap::Parser;
use propmedia::Config;
use propmedia::audit::find_orphaned_objects;
use propmedia::db::{Db, migrate};
use propmedia::media::ledger::{summary, unlinked_uploads};
use anyhow::Result;

#[derive(Parser, Debug)]
#[command(name = "stats")]
#[command(about = "Upload ledger summary and orphaned object report")]
struct Args {
    /// Also walk the local storage root for objects no property references
    #[arg(long)]
    orphans: bool,
}

fn format_bytes(bytes: i64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", config.log_level())
    ).init();
    let db = Db::new(config.db_path());
    db.with_connection(migrate::run_migrations).await?;

    println!("\n=== Propmedia Upload Statistics ===\n");

    let totals = summary(&db).await?;
    if totals.total == 0 {
        println!("No uploads recorded yet.");
        println!("\nRun `ingest <folders>` to upload property photos.");
    } else {
        println!("{:<24} {:>12}", "Objects stored", totals.total);
        println!("{:<24} {:>12}", "  linked", totals.linked);
        println!("{:<24} {:>12}", "  unlinked", totals.unlinked);
        println!("{:<24} {:>12}", "Properties touched", totals.properties);
        println!("{:<24} {:>12}", "Bytes uploaded", format_bytes(totals.total_bytes));
    }

    let unlinked = unlinked_uploads(&db).await?;
    if !unlinked.is_empty() {
        println!("\nStored but not linked to any property field:\n");
        println!("{:-<80}", "");
        println!("{:>6}  {:<20} {:<24} {:<10}", "Prop", "Folder", "File", "Class");
        println!("{:-<80}", "");
        for upload in &unlinked {
            println!(
                "{:>6}  {:<20} {:<24} {:<10}",
                upload.property_id, upload.folder, upload.file_name, upload.classification
            );
            println!("        {}", upload.remote_url);
        }
        println!("{:-<80}", "");
    }

    if args.orphans {
        let orphans = find_orphaned_objects(
            &db,
            &config.storage_server.root,
            &config.storage_server.public_base_url,
        )
        .await?;

        println!("\nOrphaned objects under {}:\n", config.storage_server.root.display());
        if orphans.is_empty() {
            println!("  none");
        }
        for orphan in &orphans {
            let origin = if orphan.in_ledger { "ledger" } else { "unknown" };
            println!(
                "  {:<48} {:>10}  ({})",
                orphan.relative_path,
                format_bytes(orphan.size_bytes as i64),
                origin
            );
        }
    }

    println!();
    Ok(())
}
