//! dbrelay - Primary/Replica MariaDB Operation Relay
//!
//! Runs a node that executes database operations locally and, as primary,
//! fans them out to every healthy replica.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dbrelay::api::HttpServer;
use dbrelay::config::{RelayConfig, StartupRole};
use dbrelay::error::{Error, Result};
use dbrelay::executor::MariaDbExecutor;
use dbrelay::network::{endpoint, HttpPeerClient, PeerTransport};
use dbrelay::node::NodeService;
use dbrelay::replication::{HealthMonitor, ReplicationDispatcher};
use dbrelay::state::{FailoverTrigger, ReplicaRegistry, RoleState};

/// dbrelay - Primary/Replica MariaDB Operation Relay
#[derive(Parser)]
#[command(name = "dbrelay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "dbrelay.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the dbrelay node
    Start {
        /// Override the configured startup role (primary or replica)
        #[arg(long)]
        role: Option<StartupRole>,
    },

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "dbrelay.toml")]
        output: PathBuf,

        /// Startup role written to the file (primary or replica)
        #[arg(long, default_value = "primary")]
        role: StartupRole,
    },

    /// Validate configuration file
    Validate,

    /// Print a node's status report
    Status {
        /// Node address to query
        #[arg(short, long, default_value = "http://localhost:8083")]
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { role } => run_start(cli.config, cli.log_level, role).await,
        Commands::Init { output, role } => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"), "pretty");
            run_init(output, role)
        }
        Commands::Validate => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"), "pretty");
            run_validate(cli.config)
        }
        Commands::Status { address } => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "pretty");
            run_status(address).await
        }
    }
}

/// Initialize logging; `RUST_LOG` takes precedence over `level`
fn init_logging(level: &str, format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        "compact" => registry.with(tracing_subscriber::fmt::layer().compact()).init(),
        _ => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Start the dbrelay node
async fn run_start(config_path: PathBuf, log_level: Option<String>, role: Option<StartupRole>) -> Result<()> {
    // Load configuration
    let mut config = match RelayConfig::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration from {:?}: {}", config_path, e);
            return Err(e);
        }
    };
    if let Some(role) = role {
        config.node.role = role;
        config.validate()?;
    }

    init_logging(
        log_level.as_deref().unwrap_or(&config.logging.level),
        &config.logging.format,
    );
    tracing::info!("Starting dbrelay node {} as {:?}", config.node.address, config.node.role);

    // Connect to the local database server
    let executor = match MariaDbExecutor::new(&config).await {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!(
                "Failed to connect to database at {}:{}: {}",
                config.database.host,
                config.database.port,
                e
            );
            return Err(e);
        }
    };

    let client = HttpPeerClient::new(config.replication.delivery_timeout())?;
    let transport: Arc<dyn PeerTransport> = Arc::new(client.clone());
    let registry = Arc::new(ReplicaRegistry::new());
    let role_state = Arc::new(RoleState::from_startup(
        config.node.address.clone(),
        config.node.role,
        config.node.primary_address.clone(),
    ));

    // Replication queue and its single consumer
    let (dispatcher, worker) = ReplicationDispatcher::new(
        &config.replication,
        Arc::clone(&registry),
        Arc::clone(&transport),
    );
    let dispatcher_handle = tokio::spawn(worker.run());

    let monitor = HealthMonitor::new(&config.replication, Arc::clone(&registry), Arc::clone(&transport));
    let monitor_handle = tokio::spawn(monitor.run());

    // Watch the primary; the trigger idles while this node is primary
    let failover_handle = if config.failover.enabled {
        let trigger = Arc::new(FailoverTrigger::new(
            Arc::clone(&role_state),
            Arc::clone(&transport),
            config.failover.clone(),
        ));
        Some(tokio::spawn(trigger.run()))
    } else {
        tracing::info!("Failover trigger disabled");
        None
    };

    // Replicas announce themselves until the primary accepts them
    let register_handle = if config.node.role == StartupRole::Replica {
        let primary = config.node.primary_address.clone();
        let self_address = config.node.address.clone();
        let retry = config.register_retry();
        let client = client.clone();
        Some(tokio::spawn(async move {
            client.register_until_accepted(&primary, &self_address, retry).await;
        }))
    } else {
        None
    };

    let service = Arc::new(NodeService::new(
        Arc::clone(&executor),
        registry,
        dispatcher,
        role_state,
    ));
    let server = HttpServer::new(config.api.clone(), service);

    let result = tokio::select! {
        result = server.start() => {
            if let Err(e) = &result {
                tracing::error!("HTTP server error: {}", e);
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
            Ok(())
        }
    };

    // Cleanup
    dispatcher_handle.abort();
    monitor_handle.abort();
    if let Some(handle) = failover_handle {
        handle.abort();
    }
    if let Some(handle) = register_handle {
        handle.abort();
    }
    executor.close().await;

    tracing::info!("dbrelay shutdown complete");
    result
}

/// Initialize a new configuration file
fn run_init(output: PathBuf, role: StartupRole) -> Result<()> {
    let (role_name, address, bind_address) = match role {
        StartupRole::Primary => ("primary", "http://localhost:8083", "0.0.0.0:8083"),
        StartupRole::Replica => ("replica", "http://localhost:8084", "0.0.0.0:8084"),
    };

    let config_content = format!(r#"# dbrelay Configuration
# Generated configuration file

[node]
role = "{role_name}"
address = "{address}"
primary_address = "http://localhost:8083"
register_retry_ms = 1000

[database]
host = "localhost"
port = 3306
user = "root"
password = "changeme"
pool_size = 10
connect_timeout_secs = 30

[replication]
queue_capacity = 1000
probe_timeout_ms = 5000
delivery_timeout_ms = 5000
health_check_interval_ms = 5000
max_concurrent_deliveries = 64

[failover]
enabled = true
probe_interval_ms = 10000
probe_timeout_ms = 5000
settle_ms = 2000
well_known_primary = "http://localhost:8083"

[api]
bind_address = "{bind_address}"
cors_enabled = true

[logging]
level = "info"
format = "pretty"
"#);

    std::fs::write(&output, config_content)?;
    println!("Configuration file created: {}", output.display());
    println!("\nEdit the file to configure your database and replication settings.");
    println!("Then start with: dbrelay --config {} start", output.display());

    Ok(())
}

/// Validate configuration file
fn run_validate(config_path: PathBuf) -> Result<()> {
    match RelayConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Role: {:?}", config.node.role);
            println!("  Address: {}", config.node.address);
            println!("  Primary: {}", config.initial_primary());
            println!("  Database: {}@{}:{}", config.database.user, config.database.host, config.database.port);
            println!("  API: {}", config.api.bind_address);
            println!("  Queue Capacity: {}", config.replication.queue_capacity);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}

/// Print a node's status report
async fn run_status(address: String) -> Result<()> {
    let base = if address.starts_with("http://") || address.starts_with("https://") {
        address
    } else {
        format!("http://{}", address)
    };
    let url = endpoint(&base, "/status");

    match reqwest::get(&url).await {
        Ok(response) => {
            let status: serde_json::Value = response.json().await?;
            let pretty = serde_json::to_string_pretty(&status)
                .map_err(|e| Error::Internal(e.to_string()))?;
            println!("{}", pretty);
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to get status: {}", e);
            Err(e.into())
        }
    }
}
