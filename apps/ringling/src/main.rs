//! # Ringling - Model Registry Server
//!
//! The main binary for the Ringling parameter set and trained model registry.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for registry inspection and promotion
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │            apps/ringling (THE BINARY)         │
//! │                                               │
//! │   ┌─────────────┐        ┌─────────────┐      │
//! │   │   CLI       │        │   HTTP API  │      │
//! │   │  (clap)     │        │   (axum)    │      │
//! │   └──────┬──────┘        └──────┬──────┘      │
//! │          └───────────┬──────────┘             │
//! │                      ▼                        │
//! │             ┌─────────────────┐               │
//! │             │  ringling-core  │               │
//! │             │   (THE LOGIC)   │               │
//! │             └─────────────────┘               │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! ringling server --host 0.0.0.0 --port 8888
//!
//! # CLI operations
//! ringling status
//! ringling parameter-sets active --project 1
//! ringling models promote 3 staging
//! ```

use clap::Parser;
use ringling::cli::{self, Cli};
use ringling::config::{Config, LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    cli.apply_to(&mut config);

    init_tracing(&config.logging);

    // Display startup banner
    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli, config).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `[logging] filter`.
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.filter.as_str().into());

    match logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

/// Print the Ringling startup banner.
fn print_banner() {
    println!(
        r#"
  ┳━┓o┏┓┓┏━┓┃  o┏┓┓┏━┓
  ┃┳┛┃┃┃┃┃ ┳┃  ┃┃┃┃┃ ┳
  ┇┗┛┇┇┗┛┇━┛┇━┛┇┇┗┛┇━┛

  Model Registry v{}

  Parameter Sets • Trained Models • Deployment Stages
"#,
        env!("CARGO_PKG_VERSION")
    );
}
