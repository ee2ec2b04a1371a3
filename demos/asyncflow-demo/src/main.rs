use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use asyncflow::combinators::periodic::{periodic, Count};
use asyncflow::service::{BoxedClosureHooks, Service};
use asyncflow::service_combinators::composite_service;
use asyncflow::variable::ObservableVar;
use clap::{Parser, Subcommand};

/// Demonstrates Services and AsyncOperations wired together end to end.
#[derive(Parser)]
#[command(name = "asyncflow-demo")]
#[command(about = "Demonstrates asyncflow Services and AsyncOperations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the demo composite service and a periodic heartbeat operation.
    Run,
    /// Load configuration and report it without starting anything.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    asyncflow_runtime::init_tracing();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_demo().await,
        Commands::Check => check_config().await,
    }
}

async fn check_config() -> Result<()> {
    let defaults = asyncflow_runtime::SchedulerDefaults::load()?;
    println!("Effective scheduler defaults:\n{}", defaults.to_json_pretty()?);
    Ok(())
}

/// A tick counter published through an `ObservableVar`, bumped once per
/// heartbeat. Stands in for whatever state a real service would expose.
fn build_worker(name: &'static str, ticks: Arc<ObservableVar<u64>>) -> Arc<Service> {
    Arc::new(Service::new(
        name,
        BoxedClosureHooks::new(
            move || {
                let ticks = ticks.clone();
                async move {
                    tracing::info!(service = name, "starting");
                    tokio::spawn(async move {
                        loop {
                            tokio::time::sleep(Duration::from_millis(200)).await;
                            let next = *ticks.get().value + 1;
                            ticks.set(next);
                        }
                    });
                    Ok(())
                }
            },
            || async move { Ok(()) },
        ),
    ))
}

async fn run_demo() -> Result<()> {
    let defaults = asyncflow_runtime::SchedulerDefaults::load()?;
    tracing::info!(?defaults, "loaded scheduler defaults");

    let ticks = Arc::new(ObservableVar::new(0u64));
    let ingest = build_worker("ingest", ticks.clone());
    let exporter = build_worker("exporter", ticks.clone());
    let bundle = composite_service("demo-bundle", vec![ingest.clone(), exporter.clone()]);

    bundle.start().await?;
    println!("bundle running: {:?}", bundle.state());

    let heartbeat = periodic(
        "heartbeat",
        Box::new(|| asyncflow::combinators::idle::idle("beat", Duration::from_millis(100))),
        Duration::from_millis(0),
        Duration::from_millis(100),
        Count::Times(5),
    );
    heartbeat.start().await?;
    heartbeat.wait_for_finished().await;
    println!("heartbeat finished: {:?}", heartbeat.state());

    tokio::time::sleep(Duration::from_millis(250)).await;
    println!("observed ticks: {}", *ticks.get().value);

    bundle.stop().await;
    println!("bundle stopped: {:?}", bundle.state());

    Ok(())
}
