//! Priority buffer throughput benchmark.
//!
//! Usage:
//!     cargo run --release --bin pribuf_bench -- --producers 2 --consumers 2
//!
//! Environment variables:
//!     PRODUCER_CPU=0  Pin producer `i` to CPU `0 + i` (default: unpinned)
//!     CONSUMER_CPU=2  Pin consumer `i` to CPU `2 + i` (default: unpinned)

use std::env;
use std::sync::Arc;
use std::sync::Barrier;
use std::thread;
use std::time::Instant;

use clap::Parser;

use pribuf::{Priority, PriorityBuffer, Wait};

#[derive(Debug, Parser)]
#[command(name = "pribuf_bench", about = "Measure priority buffer throughput")]
struct Args {
    /// Buffer capacity.
    #[arg(long, default_value_t = 1024)]
    capacity: usize,
    /// Producer threads.
    #[arg(long, default_value_t = 2)]
    producers: usize,
    /// Consumer threads.
    #[arg(long, default_value_t = 2)]
    consumers: usize,
    /// Items pushed by each producer.
    #[arg(long, default_value_t = 1 << 20)]
    iterations: u64,
    /// Distinct non-negative priorities cycled through by producers.
    #[arg(long, default_value_t = 8)]
    priorities: i32,
}

/// `None` tells a consumer to stop.
type Payload = Option<u64>;

fn cpu_base(var: &str) -> Option<usize> {
    env::var(var).ok().and_then(|s| s.parse().ok())
}

fn pin_to_cpu(base: Option<usize>, offset: usize) {
    if let Some(id) = base {
        core_affinity::set_for_current(core_affinity::CoreId { id: id + offset });
    }
}

fn bench_throughput(args: &Args) {
    let buffer = Arc::new(PriorityBuffer::<Payload>::init(args.capacity).unwrap());
    let producer_cpu = cpu_base("PRODUCER_CPU");
    let consumer_cpu = cpu_base("CONSUMER_CPU");
    let start_line = Arc::new(Barrier::new(args.producers + args.consumers + 1));

    let consumers: Vec<_> = (0..args.consumers)
        .map(|c| {
            let buffer = Arc::clone(&buffer);
            let start_line = Arc::clone(&start_line);
            thread::spawn(move || {
                pin_to_cpu(consumer_cpu, c);
                start_line.wait();
                let mut received = 0u64;
                while let Some(_value) = buffer.pull(Wait::BLOCKING).unwrap() {
                    received += 1;
                }
                received
            })
        })
        .collect();

    let producers: Vec<_> = (0..args.producers)
        .map(|p| {
            let buffer = Arc::clone(&buffer);
            let start_line = Arc::clone(&start_line);
            let iterations = args.iterations;
            let priorities = args.priorities.max(1);
            thread::spawn(move || {
                pin_to_cpu(producer_cpu, p);
                start_line.wait();
                for i in 0..iterations {
                    let priority = (i % priorities as u64) as i32;
                    buffer.push(Some(i), priority, Wait::BLOCKING).unwrap();
                }
            })
        })
        .collect();

    start_line.wait();
    let start = Instant::now();

    for producer in producers {
        producer.join().unwrap();
    }
    for _ in 0..args.consumers {
        buffer.push(None, Priority::BACKGROUND, Wait::BLOCKING).unwrap();
    }
    let received: u64 = consumers.into_iter().map(|c| c.join().unwrap()).sum();
    let elapsed = start.elapsed();

    let expected = args.iterations * args.producers as u64;
    if received != expected {
        panic!("Lost items: expected {expected}, received {received}");
    }

    let ops_per_ms = u128::from(received) * 1_000_000 / elapsed.as_nanos().max(1);
    let stats = buffer.stats();
    println!("{ops_per_ms} ops/ms (high water {}/{})", stats.high_water, args.capacity);
}

fn main() {
    let args = Args::parse();

    println!(
        "pribuf (capacity={}, producers={}, consumers={}, iters={}):",
        args.capacity, args.producers, args.consumers, args.iterations
    );
    bench_throughput(&args);
}
