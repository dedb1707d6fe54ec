use axum::Router;
use clap::{Parser, Subcommand};
use order_web::config::Config;
use order_web::cors::CorsPolicy;
use order_web::error::AppResult;
use order_web::server;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// order-web - HTTP front door for the order service
#[derive(Parser, Debug)]
#[command(name = "order-web")]
#[command(version)]
#[command(about = "HTTP front door for the order service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web server
    Serve {
        /// Host to bind to (overrides SERVER_HOST env var)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides SERVER_PORT env var)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the effective CORS policy and exit
    CorsPolicy,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
        )
        .init();

    // Load configuration
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Serve { host, port } => {
            // Override config with CLI args if provided
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let addr = config.server.addr();

            server::run_server(config, addr, Router::new()).await
        }
        Commands::CorsPolicy => {
            let policy = CorsPolicy::from_config(&config.cors)?;
            println!("{}", serde_json::to_string_pretty(&policy)?);
            for warning in policy.warnings() {
                eprintln!("warning: {}", warning);
            }
            Ok(())
        }
    }
}
