//! # Ringling CLI Module
//!
//! This module implements the CLI interface for Ringling.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Create an empty registry database
//! - `status` - Show row counts
//! - `parameter-sets list|show|active` - Inspect parameter sets
//! - `models list|show|promote` - Inspect and promote trained models

mod commands;

use crate::config::{BackendKind, Config};
use crate::error::AppError;
use clap::{Parser, Subcommand};
use ringling_core::{DeploymentStage, Timestamp};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Ringling - ML parameter set and trained model registry
///
/// Tracks which training parameters are active for a project over time and
/// which trained models are cleared for which deployment stage.
#[derive(Parser, Debug)]
#[command(name = "ringling")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the registry database (overrides config)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "redb" (ACID database) or "memory" (volatile)
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<BackendKind>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Show registry status
    Status,

    /// Inspect parameter sets
    #[command(subcommand)]
    ParameterSets(ParameterSetCommand),

    /// Inspect and promote trained models
    #[command(subcommand)]
    Models(ModelCommand),
}

/// `parameter-sets` subcommands.
#[derive(Subcommand, Debug)]
pub enum ParameterSetCommand {
    /// List parameter sets in creation order
    List {
        /// Only sets of this project
        #[arg(short, long)]
        project: Option<u64>,

        /// Maximum number of rows
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one parameter set
    Show {
        /// Parameter set ID
        id: u64,
    },

    /// Show the set active for a project
    Active {
        /// Project ID
        #[arg(short, long)]
        project: u64,

        /// Instant to evaluate (default: now)
        #[arg(short, long)]
        at: Option<Timestamp>,
    },
}

/// `models` subcommands.
#[derive(Subcommand, Debug)]
pub enum ModelCommand {
    /// List trained models in creation order
    List {
        /// Only models of this project
        #[arg(short, long)]
        project: Option<u64>,

        /// Only models in this stage
        #[arg(short, long)]
        stage: Option<DeploymentStage>,

        /// Maximum number of rows
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one trained model (artifact size only)
    Show {
        /// Model ID
        id: u64,
    },

    /// Move a model to another deployment stage
    Promote {
        /// Model ID
        id: u64,

        /// Target stage
        stage: DeploymentStage,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

impl Cli {
    /// Apply the global flags on top of loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(path) = &self.database {
            config.storage.path.clone_from(path);
        }
        if let Some(backend) = self.backend {
            config.storage.backend = backend;
        }
    }
}

/// Execute the CLI with parsed arguments and resolved configuration.
pub async fn execute(cli: Cli, mut config: Config) -> Result<(), AppError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(&config).await
        }
        Some(Commands::Init { force }) => cmd_init(&config, force),
        Some(Commands::Status) => cmd_status(&config, json_mode),
        Some(Commands::ParameterSets(command)) => match command {
            ParameterSetCommand::List { project, limit } => {
                cmd_parameter_set_list(&config, json_mode, project, limit)
            }
            ParameterSetCommand::Show { id } => cmd_parameter_set_show(&config, json_mode, id),
            ParameterSetCommand::Active { project, at } => {
                cmd_parameter_set_active(&config, json_mode, project, at)
            }
        },
        Some(Commands::Models(command)) => match command {
            ModelCommand::List {
                project,
                stage,
                limit,
            } => cmd_model_list(&config, json_mode, project, stage, limit),
            ModelCommand::Show { id } => cmd_model_show(&config, json_mode, id),
            ModelCommand::Promote { id, stage } => cmd_model_promote(&config, json_mode, id, stage),
        },
        None => {
            // No subcommand - show status by default
            cmd_status(&config, json_mode)
        }
    }
}
