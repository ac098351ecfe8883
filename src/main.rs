use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use streamtrack::clock::SystemClock;
use streamtrack::format::{format_duration, DurationStyle};
use streamtrack::scenario::Scenario;
use streamtrack::{resolve_video_id, TrackerConfig};

#[derive(Parser)]
#[command(name = "streamtrack", about = "Play/pause/seek tracking for embedded video players")]
struct Cli {
    /// Enable debug logging (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a scenario file through a scripted player and print the log
    Replay {
        scenario: PathBuf,
        /// JSON tracker configuration (missing fields use defaults)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the log as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Resolve a video id from a URL or bare id
    Resolve { text: String },
    /// Format a number of seconds
    Duration {
        seconds: f64,
        #[arg(long)]
        compact: bool,
        #[arg(long)]
        no_days: bool,
    },
    /// Fetch the player bootstrap script
    FetchBootstrap {
        #[arg(long)]
        url: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<TrackerConfig> {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
            Ok(TrackerConfig::from_json_str(&text)?)
        }
        None => Ok(TrackerConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match cli.command {
        Command::Replay { scenario, config, json } => {
            let config = load_config(config.as_ref())?;
            let scenario = Scenario::from_path(&scenario)
                .with_context(|| format!("loading scenario {}", scenario.display()))?;
            let log = scenario.run(&config, Arc::new(SystemClock)).await?;
            if json {
                println!("{}", log.to_json()?);
            } else {
                println!("{}", log.render(&chrono::Local));
            }
        }
        Command::Resolve { text } => match resolve_video_id(&text) {
            Some(id) => {
                println!("{}", id);
                println!("{}", id.embed_url());
            }
            None => bail!("no video identifier found in {:?}", text.trim()),
        },
        Command::Duration {
            seconds,
            compact,
            no_days,
        } => {
            let style = DurationStyle {
                compact,
                show_days: !no_days,
            };
            println!("{}", format_duration(seconds, style));
        }
        Command::FetchBootstrap { url } => fetch_bootstrap(url).await?,
    }
    Ok(())
}

#[cfg(feature = "http")]
async fn fetch_bootstrap(url: Option<String>) -> anyhow::Result<()> {
    use streamtrack::loader::BootstrapLoader;

    let mut config = TrackerConfig::default();
    if let Some(url) = url {
        config.bootstrap_url = url;
    }
    let loader = BootstrapLoader::from_config(&config)?;
    let script = loader.load().await?;
    println!("{}: {} bytes", script.url, script.source.len());
    Ok(())
}

#[cfg(not(feature = "http"))]
async fn fetch_bootstrap(_url: Option<String>) -> anyhow::Result<()> {
    bail!("built without the `http` feature")
}
