use clap::Parser;
use tradegraph::cli::{Cli, Commands};
use tradegraph::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize telemetry
    let _guard = tradegraph::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting backtest run");
            args.execute(config).await?;
        }
        Commands::Compile(args) => {
            args.execute(config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Compute: {}", config.compute.url);
            println!("  Deadline: {}s", config.compute.deadline_secs);
            println!(
                "  Pipeline: quote={} fallback={} model={}",
                config.pipeline.quote_asset, config.pipeline.fallback_asset, config.pipeline.model
            );
            println!("  Metrics port: {}", config.telemetry.metrics_port);
        }
    }

    Ok(())
}
