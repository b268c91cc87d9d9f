//! Command line entry point for FastTrack applications.
//!
//! An application binary parses [`Cli`], loads the configuration, registers
//! its controllers and hands the built [`Engine`] to [`Command::execute`]:
//!
//! ```rust,no_run
//! use clap::Parser;
//! use fasttrack::cli::Cli;
//! use fasttrack::engine::Engine;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cli = Cli::parse();
//!     let engine = Engine::builder(cli.load_config()?).build()?;
//!     cli.command.execute(engine).await?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::engine::Engine;
use crate::error::Error;
use crate::server::{Server, ServerError};

/// Errors surfaced by the command line.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("action failed: {0}")]
    Action(#[from] Error),
}

#[derive(Debug, Parser)]
#[command(name = "fasttrack")]
#[command(about = "Run a FastTrack application", long_about = None)]
pub struct Cli {
    /// Configuration file; built-in defaults are used when absent.
    #[arg(short, long, default_value = "fasttrack.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Load the configuration file, falling back to the defaults when the
    /// file does not exist.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        if self.config.exists() {
            Config::load(&self.config)
        } else {
            Ok(Config::default())
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the application over HTTP
    Serve {
        /// Override `server.bind_address`
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Run one controller action and print its output
    Action {
        /// `Namespace::Controller.method` (or `Namespace/Controller.method`)
        target: String,
        /// `key=value` parameters or positional arguments
        args: Vec<String>,
    },
}

impl Command {
    pub async fn execute(self, engine: Engine) -> Result<(), CliError> {
        match self {
            Command::Serve { bind } => {
                let address = bind.unwrap_or_else(|| engine.config().server.bind_address.clone());
                let server = Server::bind(&address).await?;
                server.serve(Arc::new(engine)).await?;
            }
            Command::Action { target, args } => {
                let output = engine.run_action(&target, &args)?;
                println!("{output}");
            }
        }
        Ok(())
    }
}
