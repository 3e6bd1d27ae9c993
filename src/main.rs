use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use retailbot::api::{CompetitorCrawlClient, RetailOpsClient};
use retailbot::config::OptimizerConfig;
use retailbot::cycle::{CycleController, CycleRunner, SystemClock};
use retailbot::db::PostgresRunHistory;
use retailbot::execution::{PricingExecutor, TransferExecutor};
use retailbot::gateway::MarketSignalGateway;
use retailbot::guardrails::GuardrailValidator;
use retailbot::persistence::CompetitorSnapshotCache;
use retailbot::providers::{FileKillSwitch, RunHistoryStore};
use retailbot::reporting::TracingReporter;

const DEFAULT_KILL_SWITCH_FILE: &str = "/tmp/retailbot.stop";

#[derive(Parser)]
#[command(name = "retailbot", about = "Autonomous retail optimization loop")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single optimization cycle and exit
    Optimize,
    /// Run the continuous optimization loop
    Continuous,
    /// Show recent cycle results from the run history
    Status {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Arm the kill switch so running instances pause
    Stop,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let config = OptimizerConfig::from_env()?;
    config.validate()?;
    let config = Arc::new(config);

    match cli.command {
        Command::Optimize => {
            let mut controller = build_controller(config).await?;
            match controller.run_once().await? {
                Some(result) => {
                    let totals = result.totals();
                    tracing::info!(
                        "Cycle {} done: {} executed, {} skipped, {} failed",
                        result.run_id,
                        totals.executed,
                        totals.skipped_by_guardrail,
                        totals.failed
                    );
                }
                None => tracing::warn!("Kill switch is armed, no cycle was run"),
            }
        }
        Command::Continuous => {
            let mut controller = build_controller(config).await?;

            let token = controller.cancel_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("🛑 Ctrl-C received, stopping after in-flight item");
                    token.cancel();
                }
            });

            tracing::info!("🚀 RetailBot starting continuous loop");
            controller.run_continuous().await;
            tracing::info!("👋 RetailBot stopped");
        }
        Command::Status { limit } => {
            let history = connect_history().await?;
            let results = history.recent(limit).await?;
            if results.is_empty() {
                println!("No cycle history recorded yet");
            }
            for result in results {
                let totals = result.totals();
                println!(
                    "run {:>5}  {}  executed {:>3}  skipped {:>3}  failed {:>3}  est ${:>9.2}  realized ${:>9.2}{}",
                    result.run_id,
                    result.started_at.format("%Y-%m-%d %H:%M:%S"),
                    totals.executed,
                    totals.skipped_by_guardrail,
                    totals.failed,
                    result.estimated_profit_delta,
                    result.realized_profit_delta,
                    if result.signals_degraded { "  [degraded signals]" } else { "" },
                );
            }
        }
        Command::Stop => {
            let switch = FileKillSwitch::new(kill_switch_path());
            switch.arm()?;
            tracing::info!("🛑 Kill switch armed at {}", kill_switch_path());
        }
    }

    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "retailbot=info".to_string()))
        .init();
}

fn kill_switch_path() -> String {
    std::env::var("KILL_SWITCH_FILE").unwrap_or_else(|_| DEFAULT_KILL_SWITCH_FILE.to_string())
}

async fn connect_history() -> Result<Arc<dyn RunHistoryStore>> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => Ok(Arc::new(PostgresRunHistory::new(&url).await?)),
        Err(_) => anyhow::bail!("DATABASE_URL not set, no run history available"),
    }
}

async fn build_controller(config: Arc<OptimizerConfig>) -> Result<CycleController> {
    let retail_url =
        std::env::var("RETAIL_API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
    let competitor_url =
        std::env::var("COMPETITOR_API_URL").unwrap_or_else(|_| "http://localhost:8090".to_string());

    let retail = Arc::new(RetailOpsClient::new(retail_url)?);
    let competitor = Arc::new(CompetitorCrawlClient::new(competitor_url)?);

    let mut gateway = MarketSignalGateway::new(
        retail.clone(),
        retail.clone(),
        competitor,
        config.clone(),
    );

    if let Ok(redis_url) = std::env::var("REDIS_URL") {
        match CompetitorSnapshotCache::new(&redis_url).await {
            Ok(cache) => gateway = gateway.with_cache(cache),
            Err(e) => tracing::warn!("Redis unavailable, running without snapshot cache: {}", e),
        }
    }

    let history: Arc<dyn RunHistoryStore> = match std::env::var("DATABASE_URL") {
        Ok(url) => Arc::new(PostgresRunHistory::new(&url).await?),
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, run history will not survive restarts");
            Arc::new(retailbot::providers::InMemoryHistoryStore::new())
        }
    };

    let observer = Arc::new(TracingReporter);
    let clock = Arc::new(SystemClock);
    // One switch shared by the controller (cycle boundary) and the
    // executors (between items)
    let kill_switch = Arc::new(FileKillSwitch::new(kill_switch_path()));

    let runner = CycleRunner::new(
        gateway,
        GuardrailValidator::new(config.guardrails.clone()),
        TransferExecutor::new(retail.clone(), config.call_timeout()),
        PricingExecutor::new(retail, config.call_timeout()),
        kill_switch.clone(),
        history,
        observer.clone(),
        clock.clone(),
        config.clone(),
    );

    Ok(CycleController::new(
        runner,
        clock,
        kill_switch,
        observer,
        config,
    ))
}
