use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cache;
mod details;
mod research;

#[derive(Debug, Parser)]
#[command(name = "marketlens")]
#[command(about = "Listing detail fetcher and comparable-price market analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch full detail records for one or more listing ids (JSON output)
    Details {
        #[arg(required = true)]
        ids: Vec<String>,
        /// Maximum listing pages fetched at once [default: MARKETLENS_MAX_CONCURRENT_FETCHES]
        #[arg(long)]
        concurrency: Option<usize>,
        /// Batch deadline in seconds [default: MARKETLENS_BATCH_TIMEOUT_SECS]
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Collect comparable prices for a query and print the market report
    Research {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Number of comparable prices to analyse (1-50) [default: MARKETLENS_SAMPLE_MAX_SIZE]
        #[arg(long)]
        max_size: Option<usize>,
        /// Currency for converted prices [default: MARKETLENS_DISPLAY_CURRENCY]
        #[arg(long)]
        display_currency: Option<String>,
    },
    /// Print the market report for prices given on the command line
    Stats {
        #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
        prices: Vec<f64>,
        /// Currency the prices are in
        #[arg(long, default_value = "USD")]
        currency: String,
        /// Currency for converted prices [default: MARKETLENS_DISPLAY_CURRENCY]
        #[arg(long)]
        display_currency: Option<String>,
        /// Name of the item the prices describe
        #[arg(long, default_value = "comparable items")]
        label: String,
    },
    /// Remove every cached listing detail and price sample
    ClearCache,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = marketlens_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Details {
            ids,
            concurrency,
            timeout_secs,
        } => {
            let store = cache::open_store(&config).await;
            details::run_details(&config, store, &ids, concurrency, timeout_secs).await
        }
        Commands::Research {
            query,
            max_size,
            display_currency,
        } => {
            let store = cache::open_store(&config).await;
            research::run_research(
                &config,
                store,
                &query.join(" "),
                max_size,
                display_currency.as_deref(),
            )
            .await
        }
        Commands::Stats {
            prices,
            currency,
            display_currency,
            label,
        } => research::run_stats(
            &config,
            &label,
            &currency,
            &prices,
            display_currency.as_deref(),
        ),
        Commands::ClearCache => cache::run_clear_cache(&config).await,
    }
}

#[cfg(test)]
mod tests;
