use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;
use plan_backtest::{
    commands::{
        demo_curve, export_bars, fetch_bars,
        run_plan::{self, OutputFormat, RunOptions},
        validate_plan,
    },
    context::{AppContext, ProviderSource},
    visualization::DEFAULT_DEMO_POINTS,
};
use std::path::PathBuf;

const DEFAULT_BAR_SNAPSHOT_FILE: &str = "data/bars.bin";

#[derive(Parser)]
#[command(name = "plan-backtest")]
#[command(about = "Backtests event-anchored trading plans against daily bars")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest for a plan file
    Run {
        /// Path to the plan JSON (an array of items or {"plan": [...]})
        #[arg(long, value_name = "PATH")]
        plan: PathBuf,
        /// Where bars come from (auto uses Polygon when POLYGON_API_KEY is set)
        #[arg(long, value_enum, default_value_t = ProviderSource::Auto)]
        provider: ProviderSource,
        /// Serve bars from a snapshot written by export-bars
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: Option<PathBuf>,
        /// Override today's date (YYYY-MM-DD) for plans without exit timestamps
        #[arg(long)]
        today: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Include the evidence URLs behind each execution
        #[arg(long)]
        with_sources: bool,
        /// Write output to a file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Validate a plan file without fetching any bars
    Validate {
        #[arg(long, value_name = "PATH")]
        plan: PathBuf,
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Print the bars a provider returns for one ticker
    FetchBars {
        ticker: String,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long, value_enum, default_value_t = ProviderSource::Auto)]
        provider: ProviderSource,
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: Option<PathBuf>,
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Export bars for every plan ticker into a snapshot for offline runs
    ExportBars {
        #[arg(long, value_name = "PATH")]
        plan: PathBuf,
        /// Destination file for the snapshot (defaults to data/bars.bin)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = ProviderSource::Auto)]
        provider: ProviderSource,
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Print the cosmetic demo equity curve for a final return
    DemoCurve {
        /// Final return as a fraction (0.25 = +25%)
        #[arg(long, allow_hyphen_values = true)]
        final_return: f64,
        #[arg(long, default_value_t = DEFAULT_DEMO_POINTS)]
        points: usize,
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let Cli { command } = cli;

    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app_context = AppContext::initialize().await?;
    info!(
        "Starting plan backtest. Results are historical simulations, not financial advice."
    );

    match command {
        Commands::Run {
            plan,
            provider,
            data_file,
            today,
            format,
            with_sources,
            output,
        } => {
            run_plan::run(
                &app_context,
                RunOptions {
                    plan_path: &plan,
                    provider,
                    data_file: data_file.as_deref(),
                    today,
                    format,
                    with_sources,
                    output: output.as_deref(),
                },
            )
            .await?;
        }
        Commands::Validate { plan, today } => {
            validate_plan::run(&app_context, &plan, today).await?;
        }
        Commands::FetchBars {
            ticker,
            from,
            to,
            provider,
            data_file,
            output,
        } => {
            fetch_bars::run(
                &app_context,
                &ticker,
                from,
                to,
                provider,
                data_file.as_deref(),
                output.as_deref(),
            )
            .await?;
        }
        Commands::ExportBars {
            plan,
            output,
            provider,
            today,
        } => {
            let output_path = output.unwrap_or_else(|| PathBuf::from(DEFAULT_BAR_SNAPSHOT_FILE));
            export_bars::run(&app_context, &plan, &output_path, provider, today).await?;
        }
        Commands::DemoCurve {
            final_return,
            points,
            output,
        } => {
            demo_curve::run(final_return, points, output.as_deref()).await?;
        }
    }

    Ok(())
}
