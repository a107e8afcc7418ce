use clap::{Parser, Subcommand};
use propmedia::Config;
use propmedia::db::{Db, migrate};
use propmedia::properties::{get_property, insert_property, list_properties};
use anyhow::Result;

#[derive(Parser, Debug)]
#[command(name = "properties")]
#[command(about = "List, inspect and create property records")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all properties by title
    List,
    /// Show a property's media fields
    Show {
        id: i64,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a property with no media
    Add {
        title: String,
    },
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

    match args.command {
        Command::List => {
            let properties = list_properties(&db).await?;
            if properties.is_empty() {
                println!("No properties yet. Add one with: properties add \"<title>\"");
                return Ok(());
            }
            println!("{:>6}  {}", "ID", "Title");
            println!("{:-<60}", "");
            for property in properties {
                println!("{:>6}  {}", property.id, property.title);
            }
        }
        Command::Show { id, json } => {
            let property = get_property(&db, id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&property)?);
                return Ok(());
            }
            println!("#{} {}", property.id, property.title);
            println!("  Hero:       {}", property.hero_image.as_deref().unwrap_or("-"));
            println!("  Floor plan: {}", property.floor_plan_image.as_deref().unwrap_or("-"));
            println!("  Gallery:    {} image(s)", property.gallery_images.len());
            for url in &property.gallery_images {
                println!("    {}", url);
            }
        }
        Command::Add { title } => {
            let id = insert_property(&db, &title).await?;
            println!("Created property #{} {}", id, title.trim());
        }
    }

    Ok(())
}
