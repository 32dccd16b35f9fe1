use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use taskpipe_client::Client;
use tokio::time::{timeout, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tp-client")]
#[command(about = "Demo client for the local FIFO task server", long_about = None)]
struct Args {
    /// Seconds to keep submitting requests
    #[arg(short = 't', value_parser = clap::value_parser!(u64).range(1..))]
    time: u64,

    /// Largest workload to draw
    #[arg(long, default_value_t = 9, value_parser = clap::value_parser!(i32).range(1..))]
    max_workload: i32,

    /// Submitter id within this process
    #[arg(long, default_value_t = 1)]
    tid: u64,

    /// Pause between submissions in milliseconds
    #[arg(long, default_value_t = 500)]
    interval_ms: u64,

    /// Path of the server's public channel
    channel: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut client = Client::connect(&args.channel, args.tid).await?;
    tracing::info!(client = %client.identity(), "submitting for {}s", args.time);

    let deadline = Instant::now() + Duration::from_secs(args.time);
    let pace = Duration::from_millis(args.interval_ms);

    while Instant::now() < deadline {
        let workload = rand::thread_rng().gen_range(1..=args.max_workload);
        let request_id = client.submit(workload).await?;
        tracing::info!(request_id, workload, "submitted");

        // Print whatever status lines arrive while pacing submissions
        let idle_until = Instant::now() + pace;
        loop {
            let now = Instant::now();
            if now >= idle_until {
                break;
            }
            match timeout(idle_until - now, client.next_response()).await {
                Ok(response) => println!("{}", response?),
                Err(_) => break,
            }
        }
    }

    // Linger for trailing statuses of still-running requests
    while let Ok(response) = timeout(Duration::from_secs(2), client.next_response()).await {
        println!("{}", response?);
    }

    Ok(())
}
