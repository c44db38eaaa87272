mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "conductor")]
#[command(about = "An intent-driven tool orchestration engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Orchestrate a free-text request
    Run {
        /// The request text
        request: String,

        /// Print the raw workflow result as JSON
        #[arg(long)]
        json: bool,

        /// Print usage counters after the run
        #[arg(long)]
        stats: bool,
    },

    /// Manage registered capabilities
    Capabilities {
        #[command(subcommand)]
        command: CapabilitiesCommands,
    },

    /// Inspect the scenario table
    Scenarios {
        #[command(subcommand)]
        command: ScenariosCommands,
    },

    /// Show usage counters aggregated from workflow history
    Stats {
        /// UTC day to aggregate (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Show recorded workflow history
    History {
        /// UTC day to read (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,

        /// Max entries to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum CapabilitiesCommands {
    /// List all registered capabilities
    List,
    /// Show the full schema of one capability
    Info {
        /// Capability name
        name: String,
    },
    /// Invoke one capability directly with a JSON payload, bypassing the engine
    Test {
        /// Capability name
        name: String,
        /// JSON input payload (e.g. '{"query":"2 + 2"}')
        params: String,
    },
}

#[derive(Subcommand)]
enum ScenariosCommands {
    /// List the scenario table in evaluation order
    List,
    /// Classify a request without executing anything
    Classify {
        /// The request text
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Run { request, json, stats } => {
            commands::run_cmd::run(&request, json, stats).await?;
        }
        Commands::Capabilities { command } => match command {
            CapabilitiesCommands::List => {
                commands::capabilities_cmd::list()?;
            }
            CapabilitiesCommands::Info { name } => {
                commands::capabilities_cmd::info(&name)?;
            }
            CapabilitiesCommands::Test { name, params } => {
                commands::capabilities_cmd::test(&name, &params).await?;
            }
        },
        Commands::Scenarios { command } => match command {
            ScenariosCommands::List => {
                commands::scenarios_cmd::list()?;
            }
            ScenariosCommands::Classify { text } => {
                commands::scenarios_cmd::classify(&text)?;
            }
        },
        Commands::Stats { date } => {
            commands::stats_cmd::show(date.as_deref())?;
        }
        Commands::History { date, limit } => {
            commands::history_cmd::show(date.as_deref(), limit)?;
        }
    }

    Ok(())
}
