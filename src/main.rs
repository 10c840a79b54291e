use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use portico::{
    AuditSink, GracefulShutdown, HttpClient,
    adapters::{HttpAuditSink, HttpClientAdapter, LogAuditSink, build_router},
    config::{GatewayConfigValidator, loader::load_config, models::GatewayConfig},
    core::{GatewayService, audit::AuditPipeline},
    tracing_setup,
};

/// How long shutdown waits for in-flight connections and queued audit
/// records before giving up.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Start the gateway server (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let (command, config_path) = match args.command {
        Some(Commands::Validate { config }) => ("validate", config),
        Some(Commands::Init { config }) => ("init", config),
        Some(Commands::Serve { config }) => ("serve", config),
        None => ("serve", args.config), // Default to serve with config from args
    };

    match command {
        "validate" => {
            return validate_config_command(&config_path);
        }
        "init" => {
            return init_config_command(&config_path).await;
        }
        "serve" => {
            // Continue with normal server startup
        }
        _ => unreachable!(),
    }

    tracing_setup::init_tracing().map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;

    tracing::info!("Loading configuration from {config_path}");
    let config: GatewayConfig = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {config_path}"))?;
    GatewayConfigValidator::validate(&config)
        .map_err(|e| eyre!("Configuration validation failed:\n{e}"))?;
    let config = Arc::new(config);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .context("Failed to parse listen address")?;

    let gateway = {
        let http_client: Arc<dyn HttpClient> = Arc::new(
            HttpClientAdapter::new(upstream_timeout(&config))
                .context("Failed to create HTTP client adapter")?,
        );
        Arc::new(
            GatewayService::new(config.clone(), http_client)
                .context("Failed to assemble gateway")?,
        )
    };

    for route in gateway.route_table().routes() {
        tracing::info!(
            service = route.service(),
            pattern = route.pattern(),
            target = %route.target(),
            "registered route"
        );
    }

    let audit_sink: Arc<dyn AuditSink> = match &config.audit {
        Some(audit) => {
            tracing::info!(sink_url = %audit.sink_url, index = %audit.index, "audit sink enabled");
            Arc::new(HttpAuditSink::new(&audit.sink_url, &audit.index))
        }
        None => {
            tracing::info!("no audit sink configured, audit records go to the log");
            Arc::new(LogAuditSink)
        }
    };
    let (queue_capacity, workers) = config
        .audit
        .as_ref()
        .map_or((1024, 2), |audit| (audit.queue_capacity, audit.workers));
    let pipeline = AuditPipeline::start(audit_sink, queue_capacity, workers);

    let app = build_router(gateway.clone(), pipeline.handle());

    // Reap expired rate-limit windows so idle clients don't pin memory.
    {
        let gateway = gateway.clone();
        let purge_interval = gateway.limiter().window().max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(purge_interval);
            loop {
                ticker.tick().await;
                gateway.limiter().purge_expired().await;
            }
        });
    }

    let graceful_shutdown = Arc::new(GracefulShutdown::new());
    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal_handler_shutdown.run_signal_handler().await {
            tracing::error!("Signal handler error: {}", e);
        }
    });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!("Portico gateway listening on {}", addr);

    let shutdown_for_server = graceful_shutdown.clone();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let reason = shutdown_for_server.wait_for_shutdown_signal().await;
        tracing::info!("Draining connections: {:?}", reason);
    });

    // Bound the connection drain: once shutdown starts, in-flight requests
    // get SHUTDOWN_GRACE to finish before the process moves on.
    let drain_deadline = async {
        graceful_shutdown.wait_for_shutdown_signal().await;
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    };
    tokio::select! {
        result = server => result.context("Server error")?,
        _ = drain_deadline => {
            tracing::warn!("Shutdown grace period elapsed, abandoning remaining connections");
        }
    }

    tracing::info!("Draining audit pipeline...");
    pipeline.shutdown(SHUTDOWN_GRACE).await;
    tracing::info!("Graceful shutdown completed");

    Ok(())
}

fn upstream_timeout(config: &GatewayConfig) -> Duration {
    humantime::parse_duration(&config.upstream_timeout).unwrap_or(Duration::from_secs(30))
}

/// Validate configuration file and exit
fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load_config(config_path) {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    match GatewayConfigValidator::validate(&config) {
        Ok(()) => {
            let route_count: usize = config
                .services
                .values()
                .map(|service| service.routes.len())
                .sum();
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!("   • Services: {}", config.services.len());
            println!("   • Routes: {route_count}");
            println!(
                "   • Rate Limit: {} requests per {}",
                config.rate_limit_count, config.rate_limit_window
            );
            println!("   • Audit Sink: {}", config.audit.is_some());
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Ensure base URLs start with http:// or https://");
            println!("   • Route paths must start with '/'");
            println!("   • Verify listen address format (e.g., '127.0.0.1:8080')");
            println!("   • Durations use humantime units (e.g., '10s', '1h')");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Portico gateway configuration

# The address to listen on
listen_addr: "127.0.0.1:8080"

# Token issuance and verification
jwt_secret_key: "change-me"
api_key: "change-me"
token_ttl: "1h"

# Fixed-window rate limiting, per (service, client address)
rate_limit_window: "10s"
rate_limit_count: 10

# Per-request upstream timeout
upstream_timeout: "30s"

# Backend services and their routes
services:
  driver:
    base_url: "http://localhost:8081"
    routes:
      - path: "/drivers"
      - path: "/drivers/{id}"
  passenger:
    base_url: "http://localhost:8082"
    routes:
      - path: "/passengers"

# Optional asynchronous audit shipping
# audit:
#   sink_url: "http://localhost:9200"
#   index: "gateway-logs"
#   queue_capacity: 1024
#   workers: 2
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'portico serve --config {config_path}' to start the gateway");
    Ok(())
}
