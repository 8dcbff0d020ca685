//! Drains an in-memory cursor through the reactive bridge and reports how
//! the cursor was driven.

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::StreamExt;
use rongo::{
    BatchSizePolicy, CursorStream, PublisherExt, StreamConfig, VecSource, DEFAULT_MAX_BATCH_SIZE,
    DEFAULT_MIN_BATCH_SIZE,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// rongo demo - stream a paginated cursor with bounded demand
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of items held by the cursor
    #[arg(long, env = "RONGO_ITEMS", default_value_t = 10_000)]
    items: u64,

    /// Items requested ahead of the consumer
    #[arg(long, env = "RONGO_PREFETCH", default_value_t = 256)]
    prefetch: u64,

    /// Smallest batch the cursor is asked for
    #[arg(long, env = "RONGO_MIN_BATCH", default_value_t = DEFAULT_MIN_BATCH_SIZE)]
    min_batch: u32,

    /// Largest batch the cursor is asked for
    #[arg(long, env = "RONGO_MAX_BATCH", default_value_t = DEFAULT_MAX_BATCH_SIZE)]
    max_batch: u32,

    /// Make the n-th fetch fail
    #[arg(long, env = "RONGO_FAIL_AT")]
    fail_at: Option<u64>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("rongo={0},rongo_demo={0}", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let policy = BatchSizePolicy::new(args.min_batch, args.max_batch)
        .context("invalid batch size bounds")?;
    let config = StreamConfig::new(args.prefetch).context("invalid prefetch")?;

    let mut source = VecSource::new((0..args.items).collect::<Vec<u64>>());
    if let Some(n) = args.fail_at {
        source = source.failing_fetch_at(n);
    }
    let probe = source.probe();
    let stream = CursorStream::new(source).with_policy(policy);

    info!(items = args.items, prefetch = args.prefetch, "draining cursor");

    let head = stream.first().await.context("reading first item")?;
    info!(first = ?head, "first item");

    let mut items = stream.into_stream(config);
    let mut received = 0u64;
    let mut sum = 0u64;
    while let Some(item) = items.next().await {
        match item {
            Ok(value) => {
                received += 1;
                sum = sum.wrapping_add(value);
            }
            Err(error) => {
                warn!(error = %error, received, "stream failed");
                break;
            }
        }
    }

    info!(
        received,
        sum,
        opens = stream.source().open_count(),
        fetches = probe.fetch_count(),
        closes = probe.close_count(),
        largest_batch = probe.batch_sizes().into_iter().max().unwrap_or(0),
        "done"
    );
    Ok(())
}
