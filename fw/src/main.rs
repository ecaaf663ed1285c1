//! FleetWatch - proxy fleet provisioner and polling daemon
//!
//! CLI entry point: provisioning, fleet inspection, teardown, and the
//! foreground polling run.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use fleetwatch::cli::{Cli, Command, OutputFormat};
use fleetwatch::cloud::HttpCloudClient;
use fleetwatch::config::Config;
use fleetwatch::events::{create_event_bus, spawn_event_logger};
use fleetwatch::fleet::{FleetManager, FleetManagerConfig, ProxyUnit, ResourceNames};
use fleetwatch::pool::{HttpExecutor, WorkerPool, WorkerPoolConfig};
use fleetwatch::queue::{PriorityQueue, PriorityQueueConfig, interleave};
use watchstore::{FleetStateStore, ObservationStore};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fleetwatch")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Level priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            other => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("fleetwatch.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    debug!("main: dispatching command");
    match cli.command {
        Command::Create {
            count,
            regions,
            sequential,
        } => cmd_create(&config, count, regions, sequential).await,
        Command::List { format } => cmd_list(&config, format).await,
        Command::Status { detailed } => cmd_status(&config, detailed).await,
        Command::Teardown { id } => cmd_teardown(&config, &id).await,
        Command::TeardownAll { force } => cmd_teardown_all(&config, force).await,
        Command::Run => cmd_run(&config).await,
    }
}

/// Assemble the fleet manager from configuration
fn build_manager(config: &Config) -> Result<FleetManager> {
    let cloud = Arc::new(HttpCloudClient::from_config(&config.cloud)?);
    let store = FleetStateStore::open(config.fleet_state_path())?;
    let names = ResourceNames {
        cluster: config.cloud.cluster_name.clone(),
        network_rule: config.cloud.network_rule_name.clone(),
        task_template: config.cloud.task_template_name.clone(),
        execution_identity: config.cloud.execution_identity_name.clone(),
    };
    let manager_config = FleetManagerConfig {
        regions: config.fleet.regions.clone(),
        submit_concurrency: config.fleet.submit_concurrency,
        chunk_delay: Duration::from_millis(config.fleet.chunk_delay_ms),
        readiness_timeout: Duration::from_secs(config.fleet.readiness_timeout_secs),
        readiness_poll_interval: Duration::from_secs(config.fleet.readiness_poll_secs),
        proxy_port: config.cloud.proxy_port,
    };
    Ok(FleetManager::new(manager_config, cloud, store, names))
}

/// Provision new proxy units
async fn cmd_create(config: &Config, count: usize, regions: Vec<String>, sequential: bool) -> Result<()> {
    debug!(count, ?regions, sequential, "cmd_create: called");
    config.validate()?;
    let manager = build_manager(config)?;
    manager.init().await?;

    let units = if sequential {
        let mut units = Vec::new();
        for i in 0..count {
            let region = if regions.is_empty() {
                None
            } else {
                Some(regions[i % regions.len()].as_str())
            };
            match manager.provision_one(region).await {
                Ok(unit) => units.push(unit),
                Err(e) => eprintln!("{} {}", "provisioning failed:".red(), e),
            }
        }
        units
    } else {
        let override_regions = (!regions.is_empty()).then_some(regions.as_slice());
        manager.provision_batch(count, override_regions).await?
    };

    let failed = count - units.len();
    println!(
        "{} provisioned, {} failed",
        units.len().to_string().green(),
        if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().normal()
        }
    );
    for unit in &units {
        println!("  {}  {}  {}", unit.id().bold(), unit.region, unit.endpoint);
    }
    Ok(())
}

/// List fleet units
async fn cmd_list(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(%format, "cmd_list: called");
    config.validate()?;
    let manager = build_manager(config)?;
    manager.init().await?;
    let units = manager.units().await;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&units)?);
        }
        OutputFormat::Table => {
            println!("{:<28} {:<12} {:<28} {:<20}", "ID", "REGION", "ENDPOINT", "CREATED");
            for unit in &units {
                println!(
                    "{:<28} {:<12} {:<28} {:<20}",
                    unit.id(),
                    unit.region,
                    unit.endpoint,
                    unit.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        OutputFormat::Text => {
            if units.is_empty() {
                println!("{}", "No live proxy units".yellow());
            }
            for unit in &units {
                println!("{}  {}  {}", unit.id().bold(), unit.region, unit.endpoint);
            }
        }
    }
    Ok(())
}

/// Show fleet status
async fn cmd_status(config: &Config, detailed: bool) -> Result<()> {
    debug!(detailed, "cmd_status: called");
    config.validate()?;
    let manager = build_manager(config)?;
    let count = manager.init().await?;
    let units = manager.units().await;

    if count == 0 {
        println!("{}", "Fleet is empty".yellow());
        return Ok(());
    }

    println!("{} {}", count.to_string().green().bold(), "healthy proxy units");
    for region in &config.fleet.regions {
        let in_region = units.iter().filter(|u| &u.region == region).count();
        if in_region > 0 {
            println!("  {:<12} {}", region, in_region);
        }
    }

    if detailed {
        println!();
        for unit in &units {
            println!(
                "{}\n  region:  {}\n  service: {}\n  address: {}\n  created: {}",
                unit.id().bold(),
                unit.region,
                unit.service_id,
                unit.public_address,
                unit.created_at.to_rfc3339()
            );
        }
    }
    Ok(())
}

/// Tear down one unit
async fn cmd_teardown(config: &Config, id: &str) -> Result<()> {
    debug!(%id, "cmd_teardown: called");
    config.validate()?;
    let manager = build_manager(config)?;
    manager.init().await?;

    match manager.teardown_one(id).await? {
        Some(unit) => println!("{} {}", "Torn down".green(), unit.id()),
        None => println!("{} {}", "No unit matching".yellow(), id),
    }
    Ok(())
}

/// Tear down the entire fleet
async fn cmd_teardown_all(config: &Config, force: bool) -> Result<()> {
    debug!(force, "cmd_teardown_all: called");
    config.validate()?;
    let manager = build_manager(config)?;
    manager.init().await?;
    let count = manager.units().await.len();

    if count == 0 {
        println!("{}", "Fleet is already empty".yellow());
        return Ok(());
    }

    if !force {
        print!("Tear down {} units? [y/N] ", count);
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            println!("Aborted");
            return Ok(());
        }
    }

    let removed = manager.teardown_all().await?;
    println!("{} {}", "Torn down".green(), removed);
    Ok(())
}

/// Run the polling daemon until ctrl-c
async fn cmd_run(config: &Config) -> Result<()> {
    debug!("cmd_run: called");
    config.validate()?;
    if config.watch.groups.is_empty() {
        return Err(eyre::eyre!("No watch groups configured"));
    }

    let manager = build_manager(config)?;
    manager.init().await?;

    // Top up the fleet to the configured size
    let mut units = manager.units().await;
    if units.len() < config.fleet.size {
        let shortfall = config.fleet.size - units.len();
        info!(shortfall, "Fleet below desired size, provisioning");
        println!("Provisioning {} proxy units...", shortfall);
        let added = manager.provision_batch(shortfall, None).await?;
        units.extend(added);
    }
    if units.is_empty() {
        return Err(eyre::eyre!("No proxy units available before starting the run"));
    }

    let groups: Vec<(String, Vec<String>)> = config
        .watch
        .groups
        .iter()
        .map(|g| (g.name.clone(), g.targets.clone()))
        .collect();
    let rotation = interleave(&groups);

    let queue = Arc::new(PriorityQueue::new(
        rotation,
        PriorityQueueConfig {
            base_limit: config.queue.base_limit,
            throttle: Duration::from_secs(config.queue.throttle_secs),
        },
    ));

    let bus = create_event_bus();
    let _logger = spawn_event_logger(bus.clone(), PathBuf::from(&config.storage.data_dir))?;

    let observations = ObservationStore::open(config.observations_dir())?;
    let pool_config = WorkerPoolConfig {
        item_delay: Duration::from_millis(config.pool.item_delay_ms),
        idle_delay: Duration::from_millis(config.pool.idle_delay_ms),
        executor_timeout: Duration::from_millis(config.pool.executor_timeout_ms),
    };
    let mut pool = WorkerPool::new(
        pool_config,
        units,
        queue.clone(),
        Arc::new(HttpExecutor),
        observations,
        bus,
    )?;
    pool.start();

    println!(
        "Watching {} targets with {} workers. Press ctrl-c to stop.",
        queue.len().to_string().bold(),
        pool.worker_count().to_string().bold()
    );

    tokio::signal::ctrl_c().await.context("Failed to listen for ctrl-c")?;
    info!("Shutdown signal received");
    println!("\nStopping...");
    pool.stop().await;

    let status = queue.status().await;
    println!(
        "Stopped at position {}/{} (cycle {})",
        status.position, status.total, status.cycle
    );
    summarize_fleet(&manager.units().await);
    Ok(())
}

fn summarize_fleet(units: &[ProxyUnit]) {
    println!("{} proxy units still live (teardown-all to release)", units.len());
}
