use clap::Parser;
use log::info;
use server::network::Server;
use shared::StreamConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// World snapshots per second
    #[arg(short, long, default_value = "30")]
    tick_rate: u32,

    /// Maximum concurrent players
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// JSON streaming configuration (archetypes, window, lag, elimination zone)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the number of segments spawned at match start
    #[arg(long)]
    initial_window: Option<u32>,

    /// Override the id distance at which old segments are retired
    #[arg(long)]
    removal_lag: Option<u32>,

    /// Seed for archetype selection, for reproducible maps
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => StreamConfig::from_file(path)?,
        None => StreamConfig::default(),
    };
    if let Some(initial_window) = args.initial_window {
        config.initial_window = initial_window;
    }
    if let Some(removal_lag) = args.removal_lag {
        config.removal_lag = removal_lag;
    }
    config.validate()?;

    info!(
        "Streaming {} archetypes, window {}, removal lag {}",
        config.catalog.len(),
        config.initial_window,
        config.removal_lag
    );

    let address = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f64(1.0 / args.tick_rate.max(1) as f64);
    let mut server =
        Server::new(&address, tick_duration, args.max_clients, config, args.seed).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
