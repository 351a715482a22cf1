//! Producer/consumer demo for the priority buffer.
//!
//! The main thread pushes `--items` integers with random priorities while
//! `--consumers` threads pull and print them. With `--try-push`, pushes
//! that would block are dropped and counted instead. Once everything is
//! pushed, one shutdown marker per consumer is queued behind all remaining
//! items; the consumers exit on it, are joined, and the buffer is closed.
//!
//! # Usage
//!
//! ```sh
//! pribuf_demo --capacity 50 --items 500 --min-priority -20 --max-priority 20
//! RUST_LOG=pribuf=debug cargo run --features tracing --bin pribuf_demo
//! ```

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use clap::Parser;
use rand::Rng;

use pribuf::{BufferError, Priority, PriorityBuffer, Wait};

#[derive(Debug, Parser)]
#[command(name = "pribuf_demo", about = "Push random-priority items through a priority buffer")]
struct Args {
    /// Buffer capacity.
    #[arg(long, default_value_t = 50)]
    capacity: usize,
    /// Number of items to push.
    #[arg(long, default_value_t = 500)]
    items: u64,
    /// Number of consumer threads.
    #[arg(long, default_value_t = 1)]
    consumers: usize,
    /// Lowest priority drawn (negative values are urgent).
    #[arg(long, default_value_t = -20, allow_negative_numbers = true)]
    min_priority: i32,
    /// Highest priority drawn.
    #[arg(long, default_value_t = 20, allow_negative_numbers = true)]
    max_priority: i32,
    /// Print the node listing after the last push.
    #[arg(long)]
    listing: bool,
    /// Push without blocking; items refused on a full buffer are dropped.
    #[arg(long)]
    try_push: bool,
}

/// What flows through the buffer.
enum Message {
    Item(u64),
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),
    #[error("empty priority range {min}..={max}")]
    PriorityRange { min: i32, max: i32 },
    #[error("failed to spawn consumer: {0}")]
    Spawn(io::Error),
    #[error("consumer thread panicked")]
    ConsumerPanicked,
}

fn main() {
    if let Err(e) = run(Args::parse()) {
        eprintln!("pribuf_demo: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), DemoError> {
    pribuf::init_tracing();

    if args.min_priority > args.max_priority {
        return Err(DemoError::PriorityRange {
            min: args.min_priority,
            max: args.max_priority,
        });
    }

    let buffer = Arc::new(PriorityBuffer::init(args.capacity)?);
    let consumers = (0..args.consumers.max(1))
        .map(|id| spawn_consumer(id, Arc::clone(&buffer)))
        .collect::<Result<Vec<_>, _>>()?;

    let wait = Wait::from(!args.try_push);
    let mut dropped = 0u64;
    let mut rng = rand::thread_rng();
    for value in 0..args.items {
        let priority = rng.gen_range(args.min_priority..=args.max_priority);
        match buffer.push(Message::Item(value), priority, wait) {
            Ok(()) => println!("({priority},{value})"),
            Err(e) if e.error().is_would_block() => {
                println!("({priority},{value}) dropped");
                dropped += 1;
            }
            Err(e) => return Err(BufferError::from(e).into()),
        }
    }

    if args.listing {
        buffer.debug_print();
    }

    // Background priority keeps the markers behind every queued item.
    for _ in 0..consumers.len() {
        buffer
            .push(Message::Shutdown, Priority::BACKGROUND, Wait::BLOCKING)
            .map_err(BufferError::from)?;
    }

    let mut received = 0;
    for handle in consumers {
        received += handle.join().map_err(|_| DemoError::ConsumerPanicked)??;
    }

    let leftover = buffer.close()?;
    for message in &leftover {
        if let Message::Item(value) = message {
            println!("leftover {value}");
        }
    }

    let stats = buffer.stats();
    eprintln!(
        "pribuf_demo: {received} received, {dropped} dropped, {} left over, high water {}/{}",
        leftover.len(),
        stats.high_water,
        args.capacity
    );
    Ok(())
}

fn spawn_consumer(
    id: usize,
    buffer: Arc<PriorityBuffer<Message>>,
) -> Result<JoinHandle<Result<u64, BufferError>>, DemoError> {
    thread::Builder::new()
        .name(format!("consumer-{id}"))
        .spawn(move || {
            let mut received = 0;
            loop {
                match buffer.pull(Wait::BLOCKING)? {
                    Message::Item(value) => {
                        println!("consumer {id}: received {value}");
                        received += 1;
                    }
                    Message::Shutdown => return Ok(received),
                }
            }
        })
        .map_err(DemoError::Spawn)
}
