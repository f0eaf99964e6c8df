mod args;
mod audio;
mod catalog;
mod config;
mod error;
mod footage;
mod narration;
mod pipeline;
mod render;
mod subtitle;
mod timeline;
mod tts;
mod utils;

use args::Args;
use clap::Parser;
use config::Credentials;
use pipeline::Pipeline;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting daily reel generation pipeline");

    if let Err(e) = run(args).await {
        error!("Reel generation failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(args: Args) -> error::Result<()> {
    let creds = Credentials::from_args(&args)?;
    info!("API keys loaded");

    let pipeline = Pipeline::from_args(&args, creds)?;
    let date = args
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    if args.plan_only {
        let composition = pipeline.plan(date).await?;
        let json = serde_json::to_string_pretty(&composition)
            .map_err(|e| error::ReelError::Render(e.into()))?;
        println!("{}", json);
        return Ok(());
    }

    let summary = pipeline.run(date).await?;
    info!("Topic: {}", summary.topic);
    info!("Story: {} words", summary.words);
    info!("Duration: {:.1}s", summary.duration);
    if let Some(srt) = &summary.srt {
        info!("Captions: {}", srt.display());
    }
    info!("Process complete.");
    println!("{}", summary.output.display());
    Ok(())
}
