//! groupvault CLI: list groups, back up history, inspect status and stats.
//! Configuration comes from the environment (after `.env` is loaded).

mod config;
mod groups_cache;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use groupvault_api::{GroupMeClient, GroupMeClientConfig};
use groupvault_core::sync::{
    HistoryStore, MessageSource, RetryPolicy, SyncOrchestrator, SyncReport, FAST_BATCH_SIZE,
};
use groupvault_storage_sqlite::analytics::AnalyticsRepository;
use groupvault_storage_sqlite::backup::BackupRepository;
use groupvault_storage_sqlite::db::{create_pool, init, run_migrations, spawn_writer, DbPool};

use crate::config::Settings;
use crate::groups_cache::GroupsCache;

#[derive(Parser)]
#[command(name = "groupvault")]
#[command(about = "Back up GroupMe chat history into SQLite", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the group listing, cache a numbered index, and print it.
    Groups,
    /// Back up one or more groups (group ids or #N from `groups`).
    Backup {
        /// Groups to back up; omit with --all to back up everything.
        targets: Vec<String>,
        /// Back up every group visible to the token.
        #[arg(long)]
        all: bool,
        /// Larger commit batches; faster, wider re-fetch window on interrupt.
        #[arg(long)]
        fast: bool,
        /// Discard the checkpoint and walk the full history again.
        #[arg(long)]
        full: bool,
    },
    /// Show stored groups, their checkpoints, and recent sync outcomes.
    Status {
        /// How many recent sync-log rows to show.
        #[arg(long, default_value = "10")]
        limit: i64,
    },
    /// Show analytics for one stored group.
    Stats {
        /// Group id or #N reference.
        group: String,
        /// Look-back window for the ranked queries.
        #[arg(long, default_value = "30")]
        days: i64,
        #[arg(long, default_value = "10")]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("Load settings from environment")?;

    match cli.command {
        Commands::Groups => handle_groups(&settings).await,
        Commands::Backup {
            targets,
            all,
            fast,
            full,
        } => handle_backup(&settings, targets, all, fast, full).await,
        Commands::Status { limit } => handle_status(&settings, limit).await,
        Commands::Stats { group, days, limit } => {
            handle_stats(&settings, &group, days, limit).await
        }
    }
}

fn build_client(settings: &Settings) -> GroupMeClient {
    let mut config = GroupMeClientConfig::new(settings.access_token.clone());
    if let Some(base_url) = &settings.api_base_url {
        config.base_url = base_url.clone();
    }
    config.rate_limit_calls = settings.rate_limit_calls;
    config.rate_limit_period = settings.rate_limit_period;
    GroupMeClient::new(config)
}

fn open_store(settings: &Settings) -> Result<(Arc<DbPool>, BackupRepository)> {
    let db_path = init(&settings.data_dir).context("Prepare data directory")?;
    run_migrations(&db_path).context("Run database migrations")?;
    let pool = create_pool(&db_path).context("Open database pool")?;
    let writer = spawn_writer(pool.as_ref().clone());
    let repo = BackupRepository::new(Arc::clone(&pool), writer);
    Ok((pool, repo))
}

async fn handle_groups(settings: &Settings) -> Result<()> {
    let client = build_client(settings);
    let groups = client
        .get_all_groups()
        .await
        .context("Fetch group listing")?;

    init(&settings.data_dir).context("Prepare data directory")?;
    let cache = GroupsCache::new(&settings.data_dir);
    let index = cache.save(&groups).context("Write group index cache")?;

    println!("{:<5} {:<26} {}", "#", "id", "name");
    for entry in &index.groups {
        println!("{:<5} {:<26} {}", entry.index, entry.id, entry.name);
    }
    println!("\n{} group(s). Use `groupvault backup '#N'` to back one up.", index.groups.len());
    Ok(())
}

async fn handle_backup(
    settings: &Settings,
    targets: Vec<String>,
    all: bool,
    fast: bool,
    full: bool,
) -> Result<()> {
    if !all && targets.is_empty() {
        bail!("Nothing to back up: pass group ids / #N references, or --all");
    }

    let client = Arc::new(build_client(settings));
    let (_pool, repo) = open_store(settings)?;
    let store: Arc<dyn HistoryStore> = Arc::new(repo);

    let batch_size = if fast {
        FAST_BATCH_SIZE
    } else {
        settings.batch_size
    };
    let policy = RetryPolicy::new(
        settings.max_retries,
        Duration::from_secs(4),
        Duration::from_secs(60),
    );
    let orchestrator =
        SyncOrchestrator::new(client as Arc<dyn MessageSource>, store)
            .with_policy(policy)
            .with_batch_size(batch_size);

    let mut failures = 0_usize;
    if all {
        let results = orchestrator
            .sync_all_groups()
            .await
            .context("Enumerate groups for backup")?;
        for (group_id, report) in results {
            print_report(&group_id, &report);
            if !report.is_ok() {
                failures += 1;
            }
        }
    } else {
        let cache = GroupsCache::new(&settings.data_dir);
        for target in targets {
            let group_id = cache.resolve(&target)?;
            info!("Backing up group {}", group_id);
            let report = if full {
                orchestrator.resync_group(&group_id).await
            } else {
                orchestrator.sync_group(&group_id).await
            };
            print_report(&group_id, &report);
            if !report.is_ok() {
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{} group(s) failed to back up", failures);
    }
    Ok(())
}

fn print_report(group_id: &str, report: &SyncReport) {
    match &report.error {
        None => println!("{}: {} message(s) fetched", group_id, report.messages_fetched),
        Some(error) => println!("{}: FAILED ({})", group_id, error),
    }
}

async fn handle_status(settings: &Settings, limit: i64) -> Result<()> {
    let (_pool, repo) = open_store(settings)?;

    let groups = repo.list_groups_impl().context("List stored groups")?;
    if groups.is_empty() {
        println!("No groups stored yet. Run `groupvault backup --all` first.");
        return Ok(());
    }

    println!("{:<26} {:<30} {:<26} {}", "id", "name", "last synced", "checkpoint");
    for group in &groups {
        let last_synced = group
            .last_synced_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let checkpoint = group.last_synced_message_id.as_deref().unwrap_or("-");
        println!(
            "{:<26} {:<30} {:<26} {}",
            group.id, group.name, last_synced, checkpoint
        );
    }

    let logs = repo
        .recent_sync_logs_impl(limit)
        .context("Read recent sync logs")?;
    if !logs.is_empty() {
        println!("\nRecent syncs:");
        for log in &logs {
            println!(
                "{} {:<11} {:<12} {:>6} message(s){}",
                log.started_at.format("%Y-%m-%d %H:%M:%S"),
                log.status.as_str(),
                log.group_id.as_deref().unwrap_or("-"),
                log.messages_fetched,
                log.error_message
                    .as_deref()
                    .map(|e| format!("  {}", e))
                    .unwrap_or_default()
            );
        }
    }
    Ok(())
}

async fn handle_stats(settings: &Settings, group: &str, days: i64, limit: i64) -> Result<()> {
    let cache = GroupsCache::new(&settings.data_dir);
    let group_id = cache.resolve(group)?;

    let (pool, repo) = open_store(settings)?;
    let Some(profile) = repo.load_group_impl(&group_id).context("Load group")? else {
        bail!("Group {} is not stored; back it up first", group_id);
    };
    let analytics = AnalyticsRepository::new(pool);

    println!("Stats for {} ({})\n", profile.name, profile.id);

    if let Some(stats) = analytics.group_statistics(&group_id)? {
        println!(
            "{} message(s) from {} user(s), {} favorite(s), {:.1} message(s)/day",
            stats.total_messages, stats.total_users, stats.total_likes, stats.avg_messages_per_day
        );
        if let (Some(first), Some(last)) = (stats.first_message_at, stats.last_message_at) {
            println!(
                "From {} to {}",
                first.format("%Y-%m-%d"),
                last.format("%Y-%m-%d")
            );
        }
        println!();
    }

    let popular = analytics.most_popular_messages(&group_id, days, limit)?;
    println!("Most favorited messages (last {} days):", days);
    if popular.is_empty() {
        println!("  (none)");
    }
    for message in &popular {
        println!(
            "  {:>3} ♥  {}  {}",
            message.favorite_count,
            message.sender_name.as_deref().unwrap_or("?"),
            message.text.as_deref().unwrap_or("<no text>")
        );
    }

    let posters = analytics.top_posters(&group_id, days, limit)?;
    println!("\nTop posters (last {} days):", days);
    for poster in &posters {
        println!(
            "  {:>6}  {}",
            poster.message_count,
            poster.name.as_deref().unwrap_or("?")
        );
    }

    let liked = analytics.most_liked_users(&group_id, days, limit)?;
    println!("\nMost liked users (last {} days):", days);
    for user in &liked {
        println!(
            "  {:>3} ♥  {}",
            user.total_likes,
            user.name.as_deref().unwrap_or("?")
        );
    }

    let weekdays = analytics.activity_by_weekday(&group_id)?;
    println!("\nActivity by weekday:");
    for day in &weekdays {
        println!("  {:<10} {}", day.weekday, day.message_count);
    }

    if let Some(streak) = analytics.longest_posting_streak(&group_id)? {
        println!(
            "\nLongest streak: {} message(s) by {} ({} to {})",
            streak.consecutive_count,
            streak.name.as_deref().unwrap_or("?"),
            streak.started_at.format("%Y-%m-%d %H:%M"),
            streak.ended_at.format("%Y-%m-%d %H:%M"),
        );
    }
    Ok(())
}
