//! lm-analyst - CLI entry point
//!
//! Runs one analysis against a project directory and prints the result.

use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use lm_analyst::{Analyst, Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "lm-analyst", about = "Analyze a codebase with a local model")]
struct Cli {
    /// Project directory the model may inspect
    #[arg(short, long, default_value = ".")]
    project: PathBuf,

    /// Analysis request, or `-` to read it from stdin
    prompt: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries only the analysis
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lm_analyst=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let prompt = if cli.prompt == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        cli.prompt
    };

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: base_url={} model={}",
        config.base_url, config.model
    );

    let analyst = Analyst::new(&cli.project, &config)?;
    let result = analyst.run_analysis(&prompt).await;
    println!("{}", result);

    Ok(())
}
