//! desk CLI: operator interface to the content-generation pipeline.

use clap::{Parser, Subcommand};
use pipeline_desk::classify::QueueClass;
use pipeline_desk::config::{Config, PipelineSettings};
use pipeline_desk::db::Db;
use pipeline_desk::gateway::RemoteGateway;
use pipeline_desk::gateway::functions::FunctionsClient;
use pipeline_desk::model::{ParentRef, QueueRow};
use pipeline_desk::notice::NoticeLevel;
use pipeline_desk::panel::{Panel, PanelSnapshot};
use pipeline_desk::poll::Poller;
use pipeline_desk::telemetry::{TelemetryConfig, init_telemetry};
use secrecy::ExposeSecret;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "desk", about = "Content-generation pipeline desk")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the active generation queue
    Queue {
        /// Only show stuck jobs
        #[arg(long)]
        stuck: bool,
    },
    /// Show articles waiting for approval
    Pending,
    /// Show recent backend activity
    Activity,
    /// Cancel a queued job and put its article back to draft
    Cancel {
        /// Job ID (full UUID or prefix)
        id: String,
    },
    /// Clear a stuck job
    Clear {
        /// Job ID (full UUID or prefix)
        id: String,
    },
    /// Cancel several jobs in one call
    BulkCancel {
        /// Job IDs (full UUIDs or prefixes)
        ids: Vec<String>,
        /// Cancel every stuck job instead of the listed ones
        #[arg(long, conflicts_with = "ids")]
        all_stuck: bool,
    },
    /// Queue pending articles for story generation
    Approve {
        /// Article IDs
        #[arg(required = true)]
        ids: Vec<Uuid>,
        /// IDs refer to topic articles rather than legacy articles
        #[arg(long)]
        topic: bool,
    },
    /// Ask the backend to reset jobs stuck in processing
    ResetStuck,
    /// Re-run content extraction for an article
    Extract {
        id: Uuid,
        #[arg(long)]
        topic: bool,
    },
    /// Poll and print the queue until interrupted
    Watch,
    /// Check database connectivity
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "pipeline-desk".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let settings = config.pipeline_settings()?;
    let db = Db::connect(config.database_url.expose_secret()).await?;
    let functions = FunctionsClient::new(&config.functions_url, config.service_role_key.clone())?;
    let gateway = Arc::new(RemoteGateway::new(db, functions));
    let panel = Panel::new(gateway.clone(), &settings);

    match cli.command {
        Command::Queue { stuck } => cmd_queue(&panel, stuck).await,
        Command::Pending => cmd_pending(&panel).await,
        Command::Activity => cmd_activity(&panel).await,
        Command::Cancel { id } => {
            let id = resolve_job(&panel, &id).await?;
            let outcome = panel.cancel(id).await;
            finish(&panel, outcome.is_some()).await
        }
        Command::Clear { id } => {
            let id = resolve_job(&panel, &id).await?;
            let outcome = panel.clear_stuck(id).await;
            finish(&panel, outcome.is_some()).await
        }
        Command::BulkCancel { ids, all_stuck } => cmd_bulk_cancel(&panel, ids, all_stuck).await,
        Command::Approve { ids, topic } => cmd_approve(&panel, ids, topic).await,
        Command::ResetStuck => {
            let outcome = panel.reset_stuck().await;
            finish(&panel, outcome.is_some()).await
        }
        Command::Extract { id, topic } => {
            let outcome = panel.extract(parent_ref(id, topic)).await;
            finish(&panel, outcome.is_some()).await
        }
        Command::Watch => cmd_watch(&panel, &settings).await,
        Command::Health => {
            gateway.db().health_check().await?;
            println!("ok");
            Ok(())
        }
    }
}

fn parent_ref(id: Uuid, topic: bool) -> ParentRef {
    if topic {
        ParentRef::Topic(id)
    } else {
        ParentRef::Legacy(id)
    }
}

/// Print and drain notices. Returns whether any was an error.
async fn print_notices(panel: &Panel) -> bool {
    let mut had_error = false;
    for notice in panel.take_notices().await {
        had_error |= notice.level == NoticeLevel::Error;
        println!(
            "[{}] {}: {}",
            notice.level.tag(),
            notice.title,
            notice.message
        );
    }
    had_error
}

/// Print and drain notices; fail the command if any action failed.
async fn finish(panel: &Panel, succeeded: bool) -> anyhow::Result<()> {
    let had_error = print_notices(panel).await;
    if !succeeded || had_error {
        anyhow::bail!("action did not complete cleanly");
    }
    Ok(())
}

/// Resolve a full UUID or a unique prefix against the active queue.
async fn resolve_job(panel: &Panel, id_str: &str) -> anyhow::Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(id_str) {
        return Ok(id);
    }
    panel.refresh_queue().await;
    let snapshot = panel.snapshot().await;
    let matches: Vec<&QueueRow> = snapshot
        .queue
        .iter()
        .filter(|row| row.id().to_string().starts_with(id_str))
        .collect();
    match matches.len() {
        0 => anyhow::bail!("no queued job matching prefix '{id_str}'"),
        1 => Ok(matches[0].id()),
        n => anyhow::bail!("{n} queued jobs match prefix '{id_str}', be more specific"),
    }
}

async fn cmd_queue(panel: &Panel, stuck_only: bool) -> anyhow::Result<()> {
    panel.refresh_queue().await;
    let snapshot = panel.snapshot().await;
    print_queue(&snapshot, stuck_only);
    finish(panel, true).await
}

fn print_queue(snapshot: &PanelSnapshot, stuck_only: bool) {
    let rows: Vec<&QueueRow> = snapshot
        .queue
        .iter()
        .filter(|r| !stuck_only || r.is_stuck())
        .collect();

    if rows.is_empty() {
        println!("Queue is empty.");
        return;
    }

    println!(
        "{:<8}  {:<10}  {:<10}  {:<5}  {:<40}  CREATED",
        "ID", "STATUS", "CLASS", "TRIES", "ARTICLE"
    );
    println!("{}", "-".repeat(100));

    for row in &rows {
        let title = row.title();
        let title: String = title.chars().take(40).collect();
        let max = row
            .item
            .max_attempts
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8}  {:<10}  {:<10}  {:<5}  {:<40}  {}",
            &row.id().to_string()[..8],
            row.item.status,
            row.classification.class,
            format!("{}/{}", row.item.attempts, max),
            title,
            row.item.created_at.format("%Y-%m-%d %H:%M")
        );
        if let Some(reason) = row.classification.reason {
            println!("          ↳ {reason}");
        }
    }

    println!(
        "\n{} job(s): {} pending, {} processing, {} stuck",
        rows.len(),
        snapshot.count(QueueClass::Pending),
        snapshot.count(QueueClass::Processing),
        snapshot.count(QueueClass::Stuck)
    );
}

async fn cmd_pending(panel: &Panel) -> anyhow::Result<()> {
    panel.refresh_pending().await;
    let snapshot = panel.snapshot().await;

    if snapshot.pending.is_empty() {
        println!("No articles waiting.");
    } else {
        println!("{:<8}  {:<15}  {:<10}  {:<50}", "ID", "TABLE", "STATUS", "TITLE");
        println!("{}", "-".repeat(90));
        for article in &snapshot.pending {
            let title: String = article.title.chars().take(50).collect();
            println!(
                "{:<8}  {:<15}  {:<10}  {:<50}",
                &article.parent.id().to_string()[..8],
                article.parent.table(),
                article.processing_status,
                title
            );
        }
        println!("\n{} article(s)", snapshot.pending.len());
    }
    finish(panel, true).await
}

async fn cmd_activity(panel: &Panel) -> anyhow::Result<()> {
    panel.refresh_activity().await;
    let snapshot = panel.snapshot().await;
    for entry in &snapshot.activity {
        println!(
            "{}  {:<5}  {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.level,
            entry.message
        );
    }
    finish(panel, true).await
}

async fn cmd_bulk_cancel(panel: &Panel, ids: Vec<String>, all_stuck: bool) -> anyhow::Result<()> {
    panel.refresh_queue().await;
    if all_stuck {
        panel.select_stuck_jobs().await;
    } else {
        let snapshot = panel.snapshot().await;
        for id_str in &ids {
            let id = resolve_job(panel, id_str).await?;
            if snapshot.queue.iter().any(|r| r.id() == id) {
                panel.toggle_job(id).await;
            } else {
                println!("[info] {id} is not in the active queue, skipping");
            }
        }
    }
    let outcome = panel.bulk_cancel_selected().await;
    finish(panel, outcome.is_some()).await
}

async fn cmd_approve(panel: &Panel, ids: Vec<Uuid>, topic: bool) -> anyhow::Result<()> {
    panel.refresh_pending().await;
    let snapshot = panel.snapshot().await;
    for id in ids {
        let parent = parent_ref(id, topic);
        if snapshot.pending.iter().any(|a| a.parent == parent) {
            panel.toggle_article(parent).await;
        } else {
            println!("[info] {parent} is not awaiting approval, skipping");
        }
    }
    let outcome = panel.approve_selected().await;
    finish(panel, outcome.is_some()).await
}

async fn cmd_watch(panel: &Panel, settings: &PipelineSettings) -> anyhow::Result<()> {
    let poller = Poller::start(panel.clone(), &settings.poll);
    let mut ticker = tokio::time::interval(settings.poll.queue_interval());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let snapshot = panel.snapshot().await;
                if let Some(at) = snapshot.refreshed_at {
                    println!("\n=== {} ===", at.format("%H:%M:%S"));
                    print_queue(&snapshot, false);
                    if let Some(latest) = snapshot.activity.first() {
                        println!("latest activity: [{}] {}", latest.level, latest.message);
                    }
                }
                print_notices(panel).await;
            }
        }
    }

    poller.shutdown().await;
    Ok(())
}
