use clap::Parser;
use client::network::Client;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Climbing speed in world units per second
    #[arg(short = 'c', long, default_value = "4.0")]
    climb_speed: f32,

    /// Position reports per second
    #[arg(short = 'r', long, default_value = "20")]
    report_rate: u32,

    /// Seed for the climber's speed jitter
    #[arg(long, default_value = "0")]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting peer...");
    info!("Connecting to: {}", args.server);
    info!(
        "Climbing at {} units/s, {} reports/s",
        args.climb_speed, args.report_rate
    );

    let mut client =
        Client::new(&args.server, args.climb_speed, args.report_rate, args.seed).await?;

    client.run().await?;

    Ok(())
}
