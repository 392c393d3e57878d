//! Skypulse - live sample of the Bluesky Jetstream firehose.

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tokio::signal;
use tracing::{error, info};

use skypulse_cli::{Args, Console, Display, setup_logging};
use skypulse_jetstream::{ChannelObserver, JetstreamConfig, Runner};

fn load_config(args: &Args) -> anyhow::Result<JetstreamConfig> {
    let mut config = match &args.config {
        Some(path) => JetstreamConfig::load(path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => JetstreamConfig::from_env().context("failed to load config from environment")?,
    };
    args.apply_to(&mut config);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args)?;

    let (observer, events) = ChannelObserver::channel();
    let runner = Runner::from_config(&config, observer).context("failed to build client")?;
    let handle = runner.handle();
    let client = tokio::spawn(runner.run());

    info!(
        "Endpoint pool: {} (idle timeout {}s)",
        config.endpoints.join(", "),
        config.idle_timeout_secs
    );

    if args.connect {
        handle.toggle();
    }

    let ctrl_c = handle.clone();
    tokio::spawn(async move {
        while signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, closing session...");
            if !ctrl_c.shutdown() {
                break;
            }
        }
    });

    let mut console = Console::new(Display::new(std::io::stdout()), handle);
    let state = console
        .run(BufReader::new(tokio::io::stdin()), events, client)
        .await?;
    info!("Client finished in state {}", state);

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_logs);

    let code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };

    // The blocking stdin reader would hold the runtime open until the next line.
    std::process::exit(code);
}
