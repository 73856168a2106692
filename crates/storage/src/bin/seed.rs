use std::path::PathBuf;

use clap::Parser;
use storage::{JsonCatalog, SqliteRepository};

/// Load authored lesson JSON into a `SQLite` catalog.
#[derive(Parser, Debug)]
#[command(name = "seed", about, long_about = None)]
struct Args {
    /// SQLite URL
    #[arg(long = "db", env = "LESSONS_DB_URL", default_value = "sqlite:lessons.sqlite3?mode=rwc")]
    db_url: String,

    /// Directory of lesson JSON files
    #[arg(long = "dir", env = "LESSONS_CATALOG_DIR", default_value = "fixtures/lessons")]
    catalog_dir: PathBuf,

    /// Validate the lessons without writing them
    #[arg(long)]
    dry_run: bool,
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = JsonCatalog::from_dir(&args.catalog_dir)?;
    if args.dry_run {
        println!(
            "{} lessons in {} are valid",
            catalog.len(),
            args.catalog_dir.display()
        );
        return Ok(());
    }

    let repo = SqliteRepository::open(&args.db_url).await?;
    for lesson in catalog.lessons() {
        repo.upsert_lesson(lesson).await?;
    }

    println!(
        "Seeded {} lessons from {} into {}",
        catalog.len(),
        args.catalog_dir.display(),
        args.db_url
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(err) = run(args).await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
