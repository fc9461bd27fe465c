//! Watson CLI - A command line interface for the IBM Watson APIs.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{CallCommand, ConfigCommand, ServicesCommand, SynthesizeCommand};

/// Watson CLI - A command line interface for the IBM Watson APIs.
///
/// Every operation of every service family can be called generically with
/// `watson call <service> <operation>`. Text to Speech also has a dedicated
/// `synthesize` command with WebSocket streaming.
///
/// Configuration is stored in ~/.watson/watson/ and supports multiple
/// contexts, similar to kubectl's context management. Without a context,
/// credentials are read from `<SERVICE>_APIKEY`, `<SERVICE>_BEARER_TOKEN`
/// or `<SERVICE>_USERNAME`/`<SERVICE>_PASSWORD`.
#[derive(Parser)]
#[command(name = "watson")]
#[command(about = "IBM Watson API CLI tool")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.watson/watson/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Context name to use
    #[arg(short = 'c', long, global = true)]
    pub context: Option<String>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Input request file (YAML or JSON, `-` for stdin)
    #[arg(short = 'f', long = "file", global = true)]
    pub input: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage CLI configuration
    Config(ConfigCommand),
    /// List service families and their operations
    Services(ServicesCommand),
    /// Call any service operation
    Call(CallCommand),
    /// Synthesize speech from text
    Synthesize(SynthesizeCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Config(cmd) => cmd.run(&cli).await,
        Commands::Services(cmd) => cmd.run(&cli).await,
        Commands::Call(cmd) => cmd.run(&cli).await,
        Commands::Synthesize(cmd) => cmd.run(&cli).await,
    }
}
