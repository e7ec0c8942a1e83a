//! Multi-threaded insertion benchmark.
//!
//! T producer threads each add N/T random limit orders (prices 90.00-110.00,
//! quantities 100-1000) either directly or through the ingestion queue with a
//! drain worker, then print per-call latency percentiles, throughput and the
//! top of the book.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use hdrhistogram::Histogram;
use hp_orderbook::{Decimal, DrainWorker, EngineConfig, OrderBook, Side};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "latency-report", about = "Limit order insertion latency report")]
struct Args {
    /// Total limit orders across all threads
    #[arg(long, default_value_t = 1_000_000)]
    orders: u64,

    /// Producer threads
    #[arg(long, default_value_t = 8)]
    threads: u64,

    /// JSON engine config (missing fields use defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Submit through the ingestion queue and a background drain worker
    #[arg(long)]
    queued: bool,

    /// Levels printed per side
    #[arg(long, default_value_t = 5)]
    depth: usize,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => EngineConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    let threads = args.threads.max(1);
    let per_thread = args.orders / threads;

    let book = Arc::new(OrderBook::with_config(config)?);
    let worker = args
        .queued
        .then(|| DrainWorker::spawn(Arc::clone(&book), None));

    info!(threads, per_thread, queued = args.queued, "starting");
    println!("Running {} orders on {} threads...", per_thread * threads, threads);

    let start = Instant::now();
    let handles: Vec<_> = (0..threads)
        .map(|thread_id| {
            let book = Arc::clone(&book);
            let queued = args.queued;
            thread::spawn(move || generate_orders(&book, thread_id, per_thread, queued))
        })
        .collect();

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 10_000_000, 3)?;
    for handle in handles {
        let local = handle.join().map_err(|_| "producer thread panicked")??;
        histogram.add(local)?;
    }
    if let Some(worker) = worker {
        let stats = worker.stop()?;
        info!(?stats, "drain worker totals");
    }
    let elapsed = start.elapsed();

    print_report(&histogram, per_thread * threads, elapsed);
    print_book(&book, args.depth);
    Ok(())
}

fn generate_orders(
    book: &OrderBook,
    thread_id: u64,
    count: u64,
    queued: bool,
) -> Result<Histogram<u64>, hdrhistogram::CreationError> {
    let mut histogram = Histogram::<u64>::new_with_bounds(1, 10_000_000, 3)?;
    let mut rng = 12345u64 ^ thread_id.wrapping_mul(0x9E37_79B9_7F4A_7C15); // Simple LCG for speed

    for i in 0..count {
        rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
        let r = rng >> 32;
        let side = if r & 1 == 0 { Side::Buy } else { Side::Sell };
        // 90.00 to 110.00 in cent ticks
        let price = Decimal::new(9_000 + ((r >> 1) % 2_001) as i64, 2);
        let quantity = 100 + ((r >> 12) % 901) as u32;
        let id = format!("ORD_{}_{}", thread_id, i);

        let call = Instant::now();
        if queued {
            while !book.submit_limit(side, price, quantity, &id) {
                std::hint::spin_loop();
            }
        } else {
            std::hint::black_box(book.add_limit_order(side, price, quantity, &id));
        }
        // Saturate outliers instead of failing the run
        histogram.saturating_record(call.elapsed().as_nanos() as u64);
    }

    Ok(histogram)
}

fn print_report(histogram: &Histogram<u64>, total: u64, elapsed: Duration) {
    println!("\n=== Latency Report (ns) ===");
    println!("Total Ops:  {}", total);
    println!("Total Time: {:.2} ms", elapsed.as_secs_f64() * 1_000.0);
    println!("Throughput: {:.2} ops/sec", total as f64 / elapsed.as_secs_f64());
    println!("---------------------------");
    println!("Min:    {:8} ns", histogram.min());
    println!("P50:    {:8} ns", histogram.value_at_quantile(0.50));
    println!("P90:    {:8} ns", histogram.value_at_quantile(0.90));
    println!("P99:    {:8} ns", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:8} ns", histogram.value_at_quantile(0.999));
    println!("Max:    {:8} ns", histogram.max());
    println!("---------------------------");
}

fn print_book(book: &OrderBook, depth: usize) {
    let (bid, ask) = book.best_prices();
    let stats = book.stats();
    println!("\nFinal book state:");
    println!("Best bid: {}", bid);
    println!("Best ask: {}", ask);
    println!("Limit orders applied: {}", stats.limit_orders);

    for (label, side) in [("Bid", Side::Buy), ("Ask", Side::Sell)] {
        println!("\nTop {} {} Levels:", depth, label);
        for level in book.depth(side, depth) {
            println!(
                "Price: {}, Quantity: {}, Orders: {}",
                level.price, level.total_quantity, level.order_count
            );
        }
    }
}
