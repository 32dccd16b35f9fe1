use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use taskpipe_server::{Server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tp-server")]
#[command(about = "Local FIFO task server", long_about = None)]
struct Args {
    /// Session wall-clock budget in seconds
    #[arg(short = 't', value_parser = clap::value_parser!(u64).range(1..))]
    time: u64,

    /// Task queue capacity
    #[arg(short = 'l', default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    capacity: u64,

    /// Intake pool size
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u64).range(1..))]
    producers: u64,

    /// Execution pool size
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u64).range(1..))]
    consumers: u64,

    /// Milliseconds of simulated execution per workload unit
    #[arg(long = "workload-unit-ms", default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    workload_unit_ms: u64,

    /// Path of the public request channel
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

    let mut config = ServerConfig::new(Duration::from_secs(args.time), args.channel);
    config.capacity = args.capacity as usize;
    config.producers = args.producers as usize;
    config.consumers = args.consumers as usize;
    config.workload_unit = Duration::from_millis(args.workload_unit_ms);

    tracing::info!("starting server with config: {:?}", config);

    Server::new(config).run().await
}
