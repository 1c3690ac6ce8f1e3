use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use pennywise::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch shared expenses and convert them to the base currency
    Expenses,
    /// Refresh investment price histories
    Prices,
    /// Refresh the monthly inflation series
    Inflation,
}

impl From<Commands> for pennywise::AppCommand {
    fn from(cmd: Commands) -> pennywise::AppCommand {
        match cmd {
            Commands::Expenses => pennywise::AppCommand::Expenses,
            Commands::Prices => pennywise::AppCommand::Prices,
            Commands::Inflation => pennywise::AppCommand::Inflation,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => pennywise::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> Result<()> {
    use anyhow::Context;

    let path = pennywise::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
user_id: 0
splitwise_token: ""
exchange_rates_token: ""

currency: "GBP"
start_date: 2017-09-01

investments: []
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
