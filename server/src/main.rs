use clap::Parser;
use log::info;
use server::grid::SegmentNetwork;
use server::network::{ItemFeed, Server};
use shared::{Direction, SegPos};
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

    /// Tick rate (simulation steps per second)
    #[arg(short, long, default_value = "20")]
    tick_rate: u32,

    /// Maximum number of connected observers
    #[arg(short, long, default_value = "32")]
    max_observers: usize,

    /// Number of segments in the demo run
    #[arg(long, default_value = "8")]
    segments: i32,

    /// Inject a random item every N ticks (0 disables the feed)
    #[arg(long, default_value = "20")]
    feed_interval: u64,
}

/// Builds a straight west-to-east demo run with a delivery endpoint on
/// the far side.
fn demo_network(segments: i32) -> SegmentNetwork {
    let mut network = SegmentNetwork::new();
    for x in 0..segments.max(1) {
        network.add_segment(SegPos::new(x, 0, 0));
    }
    network.add_endpoint(SegPos::new(segments.max(1) - 1, 0, 0), 16);
    network
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f64(1.0 / args.tick_rate.max(1) as f64);

    let network = demo_network(args.segments);
    let feed = if args.feed_interval > 0 {
        Some(ItemFeed {
            pos: SegPos::new(0, 0, 0),
            input: Some(Direction::West),
            every_ticks: args.feed_interval,
        })
    } else {
        None
    };

    info!(
        "Starting server on {} at {} ticks/s with {} segments",
        addr, args.tick_rate, args.segments
    );

    let mut server = Server::new(&addr, tick_duration, args.max_observers, network, feed).await?;
    server.run().await?;

    Ok(())
}
