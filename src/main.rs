use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use nl_fire::api::{AppState, CalculatePayload, calculate, run_http_server};
use nl_fire::config::AppConfig;
use nl_fire::core::AllocationStrategy;
use nl_fire::log::init_logging;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliAllocationStrategy {
    Fixed,
    AgeBucketed,
}

impl From<CliAllocationStrategy> for AllocationStrategy {
    fn from(value: CliAllocationStrategy) -> Self {
        match value {
            CliAllocationStrategy::Fixed => AllocationStrategy::Fixed,
            CliAllocationStrategy::AgeBucketed => AllocationStrategy::AgeBucketed,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "nl-fire",
    version,
    about = "FIRE retirement estimator for the Netherlands (inflation, 3.5% withdrawal, Box 3)"
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the dashboard and the /api/calculate endpoint
    Serve {
        /// Overrides server.port from the config
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print a single projection as JSON
    Project(ProjectArgs),
}

#[derive(Args, Debug)]
struct ProjectArgs {
    #[arg(long)]
    current_age: u32,
    #[arg(long)]
    retirement_age: u32,
    #[arg(long, help = "Current savings and investments in euro")]
    current_wealth: f64,
    #[arg(long, help = "Monthly expenses in today's euro")]
    monthly_expenses: f64,
    #[arg(long, help = "Annual inflation as a fraction, defaults to 0.02")]
    inflation_rate: Option<f64>,
    #[arg(long, value_enum)]
    allocation: Option<CliAllocationStrategy>,
    /// Attach a recommendation (static unless the config selects generative).
    /// Without the flag, recommendations.include_by_default decides.
    #[arg(long)]
    recommendations: bool,
}

impl From<ProjectArgs> for CalculatePayload {
    fn from(args: ProjectArgs) -> Self {
        CalculatePayload {
            current_age: Some(args.current_age),
            retirement_age: Some(args.retirement_age),
            current_wealth: Some(args.current_wealth),
            monthly_expenses: Some(args.monthly_expenses),
            inflation_rate: args.inflation_rate,
            allocation_strategy: args.allocation.map(Into::into),
            recommendations: args.recommendations.then_some(true),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "Application failed");
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            let state = AppState::from_config(config)?;
            run_http_server(state).await
        }
        Commands::Project(args) => {
            let state = AppState::from_config(config)?;
            let response = calculate(&state, args.into())
                .await
                .context("Invalid financial profile")?;
            let json =
                serde_json::to_string_pretty(&response).context("Failed to serialize response")?;
            println!("{json}");
            Ok(())
        }
    }
}
