#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lesson_core::model::{LessonId, SectionId, UserId};
use services::{Clock, LessonSessionService};
use storage::{JsonCatalog, LessonCatalog, SqliteRepository, Storage};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod walk;

use config::AppConfig;

/// Guided scripture lessons in the terminal.
#[derive(Parser, Debug)]
#[command(name = "lessons", version, about, long_about = None)]
struct Cli {
    /// Learner whose progress is read and written
    #[arg(long, env = "LESSONS_USER", default_value = "local", global = true)]
    user: String,

    /// SQLite URL for progress
    #[arg(
        long = "db",
        env = "LESSONS_DB_URL",
        default_value = "sqlite:lessons.sqlite3?mode=rwc",
        global = true
    )]
    db_url: String,

    /// Directory of lesson JSON files
    #[arg(
        long = "catalog-dir",
        env = "LESSONS_CATALOG_DIR",
        default_value = "fixtures/lessons",
        global = true
    )]
    catalog_dir: PathBuf,

    /// TOML settings file
    #[arg(long, env = "LESSONS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List lessons with their unlock status
    List {
        /// Only this section
        #[arg(long)]
        section: Option<String>,
    },
    /// Work through a lesson interactively
    Walk {
        /// Lesson to start or resume
        lesson: String,
    },
    /// Show completion counts and time spent
    Stats,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn open_storage(cli: &Cli) -> anyhow::Result<Storage> {
    let catalog = JsonCatalog::from_dir(&cli.catalog_dir)
        .with_context(|| format!("loading lessons from {}", cli.catalog_dir.display()))?;
    let progress = SqliteRepository::open(&cli.db_url)
        .await
        .with_context(|| format!("opening {}", cli.db_url))?;
    debug!(db = %cli.db_url, "progress store ready");
    Ok(Storage::new(Arc::new(catalog), Arc::new(progress)))
}

async fn list(
    svc: &LessonSessionService,
    catalog: &dyn LessonCatalog,
    user: &UserId,
    section: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let sections = match section {
        Some(id) => vec![SectionId::new(id)],
        None => catalog.list_sections().await?,
    };

    let mut rows = Vec::new();
    for section in &sections {
        rows.push((section, svc.section_overview(user, section).await?));
    }

    if json {
        let value: serde_json::Map<_, _> = rows
            .iter()
            .map(|(section, items)| Ok((section.to_string(), serde_json::to_value(items)?)))
            .collect::<Result<_, serde_json::Error>>()?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for (section, items) in rows {
        println!("{section}");
        for item in items {
            let mark = if item.unlocked { ' ' } else { '#' };
            println!(
                "  {mark} {:>2}. {:<32} {:>3} min  {:?}  {}s",
                item.order,
                item.title,
                item.estimated_minutes,
                item.status,
                item.time_spent.num_seconds()
            );
        }
    }
    Ok(())
}

async fn stats(svc: &LessonSessionService, user: &UserId, json: bool) -> anyhow::Result<()> {
    let stats = svc.stats(user).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("completed:   {}", stats.completed_count);
        println!("in progress: {}", stats.in_progress_count);
        println!("time spent:  {} min", stats.total_time_spent.num_minutes());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    let storage = open_storage(&cli).await?;
    let svc = LessonSessionService::from_storage(Clock::System, &storage)
        .with_engine_config(config.engine)
        .with_retry(config.retry);
    let user = UserId::new(cli.user.clone());
    info!(user = %user, "session ready");

    match cli.command {
        Command::List { section } => {
            list(&svc, storage.catalog.as_ref(), &user, section, cli.json).await
        }
        Command::Walk { lesson } => walk::run(&svc, &user, &LessonId::new(lesson)).await,
        Command::Stats => stats(&svc, &user, cli.json).await,
    }
}
