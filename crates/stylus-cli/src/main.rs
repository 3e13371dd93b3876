mod display;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use stylus_ai::{LlmOracle, ResilientOracle};
use stylus_analysis::{AnalysisDriver, get_style_guide, progress, regenerate_style_guide};
use stylus_core::config::{AnalysisConfig, OracleConfig, data_dir_from_env};
use stylus_store::FsStore;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(
    name = "stylus",
    about = "Extract a journal style guide from a corpus of papers",
    version
)]
struct Cli {
    /// Data directory; the corpus lives in its `extracted/` subdirectory
    /// [default: $DATA_DIR or ./data]
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze the corpus batch by batch until the rules converge
    Analyze(AnalyzeArgs),
    /// Continue an interrupted analysis
    Resume,
    /// Show progress of the current or last run
    Status,
    /// Print the style guide
    Guide {
        /// Render as Markdown
        #[arg(long)]
        markdown: bool,
        /// Print raw JSON
        #[arg(long, conflicts_with = "markdown")]
        json: bool,
    },
    /// Rebuild the style guide from recorded batch summaries, offline
    Aggregate,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Documents per batch
    #[arg(long)]
    batch_size: Option<usize>,
    /// Only consider the first N documents
    #[arg(long)]
    max_documents: Option<usize>,
    /// Never stop before this many batches
    #[arg(long)]
    min_batches: Option<usize>,
    /// Always stop after this many batches
    #[arg(long)]
    max_batches: Option<usize>,
    /// Similarity at which two consecutive batches count as converged
    #[arg(long)]
    threshold: Option<f64>,
    /// Concurrent document analyses per batch
    #[arg(long)]
    concurrency: Option<usize>,
    /// Continue the logged run instead of starting over
    #[arg(long)]
    resume: bool,
}

impl AnalyzeArgs {
    fn apply(&self, config: &mut AnalysisConfig) {
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.max_documents {
            config.max_documents = Some(v);
        }
        if let Some(v) = self.min_batches {
            config.min_batches = v;
        }
        if let Some(v) = self.max_batches {
            config.max_batches = v;
        }
        if let Some(v) = self.threshold {
            config.similarity_threshold = v;
        }
        if let Some(v) = self.concurrency {
            config.max_concurrency = v;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(data_dir_from_env);
    let store = FsStore::open(&data_dir)
        .with_context(|| format!("opening data directory {}", data_dir.display()))?;

    match cli.command {
        Command::Analyze(args) => {
            let mut config = AnalysisConfig::from_env().context("loading analysis configuration")?;
            args.apply(&mut config);
            analyze(store, config, args.resume).await
        }
        Command::Resume => {
            let config = AnalysisConfig::from_env().context("loading analysis configuration")?;
            analyze(store, config, true).await
        }
        Command::Status => {
            display::print_progress(&progress(&store)?);
            Ok(())
        }
        Command::Guide { markdown, json } => {
            let guide = get_style_guide(&store)?
                .context("no style guide yet; run `stylus analyze` first")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&guide)?);
            } else if markdown {
                print!("{}", display::render_markdown(&guide));
            } else {
                print!("{}", display::render_text(&guide));
            }
            Ok(())
        }
        Command::Aggregate => {
            let config = AnalysisConfig::from_env().context("loading analysis configuration")?;
            let guide = regenerate_style_guide(&store, config.thresholds)?
                .context("no run log to aggregate; run `stylus analyze` first")?;
            print!("{}", display::render_text(&guide));
            Ok(())
        }
    }
}

async fn analyze(store: FsStore, config: AnalysisConfig, resume: bool) -> anyhow::Result<()> {
    config.validate().context("invalid analysis configuration")?;
    let oracle_config = OracleConfig::from_env().context("loading oracle configuration")?;
    info!(
        provider = oracle_config.provider.as_str(),
        model = %oracle_config.model,
        batch_size = config.batch_size,
        "stylus v{}",
        env!("CARGO_PKG_VERSION")
    );
    let oracle = ResilientOracle::new(LlmOracle::new(oracle_config)?, config.retry);
    let driver = AnalysisDriver::new(store, oracle, config);

    let cancel = driver.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after the current batch");
            cancel.cancel();
        }
    });

    let report = if resume {
        driver.resume().await?
    } else {
        driver.run().await?
    };
    display::print_run_report(&report);
    Ok(())
}
