use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use nerkh::core::asset::AssetCategory;
use nerkh::core::log::init_logging;
use nerkh::widget::{DisplayMode, Theme, WidgetConfig};

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

impl From<Commands> for nerkh::AppCommand {
    fn from(cmd: Commands) -> nerkh::AppCommand {
        match cmd {
            Commands::Prices {
                force,
                category,
                no_cache,
            } => nerkh::AppCommand::Prices {
                force,
                category,
                no_cache,
            },
            Commands::Widget {
                display_mode,
                assets,
                theme,
                origin,
            } => nerkh::AppCommand::Widget {
                config: WidgetConfig::new(display_mode, assets, theme),
                origin,
            },
            Commands::Watch { ticks } => nerkh::AppCommand::Watch { ticks },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display current currency, gold and crypto prices
    Prices {
        /// Skip the cached snapshot and query the upstreams
        #[arg(short, long)]
        force: bool,
        /// Only show one category: fiat, gold or crypto
        #[arg(long)]
        category: Option<AssetCategory>,
        /// Do not read or write the on-disk snapshot store
        #[arg(long)]
        no_cache: bool,
    },
    /// Print the embed code for a price widget
    Widget {
        /// grid, ticker or table
        #[arg(long = "type", default_value = "grid")]
        display_mode: DisplayMode,
        /// Comma separated asset ids
        #[arg(long, value_delimiter = ',', default_value = "usd,eur,gold_18k,btc")]
        assets: Vec<String>,
        /// light or dark
        #[arg(long, default_value = "light")]
        theme: Theme,
        /// Site serving the widget loader
        #[arg(long, default_value = "http://localhost:3000")]
        origin: String,
    },
    /// Keep prices on screen, refreshing periodically
    Watch {
        /// Stop after this many refreshes
        #[arg(long)]
        ticks: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => nerkh::cli::setup::setup(),
        Some(cmd) => nerkh::run_command(cmd.into(), cli.config_path.as_deref()).await,
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
