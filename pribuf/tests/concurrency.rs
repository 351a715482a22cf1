//! Multi-threaded producer/consumer tests.
//!
//! ```bash
//! RUST_LOG=pribuf=debug cargo test --features tracing --test concurrency -- --nocapture
//! ```
//!
//! Tests that rely on a sleeping thread reaching its wait first run
//! `#[serial]`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Once};
use std::thread;
use std::time::{Duration, Instant};

use pribuf::{BufferError, Priority, PriorityBuffer, Timeout, Wait};
use serial_test::serial;

static INIT_TRACING: Once = Once::new();

fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        pribuf::init_tracing();
    });
}

/// Polls until `f` holds or a generous deadline passes.
fn eventually(f: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if f() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
#[serial]
fn blocked_push_lands_ahead_after_pull() {
    init_test_tracing();
    let buffer = Arc::new(PriorityBuffer::init(3).unwrap());
    buffer.push('A', 5, true).unwrap();
    buffer.push('B', 5, true).unwrap();
    buffer.push('C', -1, true).unwrap();

    let pushed = Arc::new(AtomicBool::new(false));
    let producer = {
        let buffer = Arc::clone(&buffer);
        let pushed = Arc::clone(&pushed);
        thread::spawn(move || {
            buffer.push('D', 2, Wait::BLOCKING).unwrap();
            pushed.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!pushed.load(Ordering::SeqCst), "push must wait for room");
    assert_eq!(buffer.len(), 3);

    assert_eq!(buffer.pull(true).unwrap(), 'C');
    producer.join().unwrap();
    assert!(pushed.load(Ordering::SeqCst));

    assert_eq!(buffer.flush(true).unwrap(), ['D', 'A', 'B']);
}

#[test]
fn producers_and_consumers_deliver_exactly_once() {
    init_test_tracing();
    const CAPACITY: usize = 8;
    const PRODUCERS: u64 = 4;
    const CONSUMERS: usize = 3;
    const PER_PRODUCER: u64 = 2_000;

    let buffer = Arc::new(PriorityBuffer::<Option<u64>>::init(CAPACITY).unwrap());
    let start_line = Arc::new(Barrier::new(PRODUCERS as usize + CONSUMERS));

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let buffer = Arc::clone(&buffer);
            let start_line = Arc::clone(&start_line);
            thread::spawn(move || {
                start_line.wait();
                let mut seen = Vec::new();
                while let Some(value) = buffer.pull(true).unwrap() {
                    assert!(buffer.len() <= CAPACITY);
                    seen.push(value);
                }
                seen
            })
        })
        .collect();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let buffer = Arc::clone(&buffer);
            let start_line = Arc::clone(&start_line);
            thread::spawn(move || {
                start_line.wait();
                for i in 0..PER_PRODUCER {
                    let value = p * PER_PRODUCER + i;
                    let priority = (value % 11) as i32 - 3;
                    buffer.push(Some(value), priority, true).unwrap();
                    assert!(buffer.len() <= CAPACITY);
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    for _ in 0..CONSUMERS {
        buffer.push(None, Priority::BACKGROUND, true).unwrap();
    }

    let mut delivered = HashSet::new();
    for consumer in consumers {
        for value in consumer.join().unwrap() {
            assert!(delivered.insert(value), "{value} delivered twice");
        }
    }
    assert_eq!(delivered.len() as u64, PRODUCERS * PER_PRODUCER);
    assert!(buffer.is_empty());

    let stats = buffer.stats();
    assert_eq!(stats.pushed, PRODUCERS * PER_PRODUCER + CONSUMERS as u64);
    assert_eq!(stats.pulled, stats.pushed);
    assert!(stats.high_water <= CAPACITY);
}

#[test]
#[serial]
fn close_wakes_blocked_producer_with_its_item() {
    init_test_tracing();
    let buffer = Arc::new(PriorityBuffer::init(1).unwrap());
    buffer.push(1u32, 0, true).unwrap();

    let producer = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || buffer.push(2u32, 0, true))
    };

    thread::sleep(Duration::from_millis(30));
    assert_eq!(buffer.close().unwrap(), [1]);

    let err = producer.join().unwrap().unwrap_err();
    assert!(err.error().is_closed());
    assert_eq!(err.into_inner(), 2);
}

#[test]
#[serial]
fn close_wakes_every_blocked_consumer() {
    init_test_tracing();
    let buffer = Arc::new(PriorityBuffer::<u32>::init(4).unwrap());

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.pull(Timeout::Infinite))
        })
        .collect();

    thread::sleep(Duration::from_millis(30));
    assert!(buffer.close().unwrap().is_empty());

    for consumer in consumers {
        assert!(consumer.join().unwrap().unwrap_err().is_closed());
    }
}

#[test]
#[serial]
fn flush_frees_room_for_every_blocked_producer() {
    init_test_tracing();
    let buffer = Arc::new(PriorityBuffer::init(2).unwrap());
    buffer.push(0u32, 0, true).unwrap();
    buffer.push(1u32, 0, true).unwrap();

    let producers: Vec<_> = (2..4u32)
        .map(|value| {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.push(value, 0, true))
        })
        .collect();

    thread::sleep(Duration::from_millis(30));
    assert_eq!(buffer.flush(true).unwrap(), [0, 1]);

    for producer in producers {
        producer.join().unwrap().unwrap();
    }
    assert!(eventually(|| buffer.len() == 2));
    let mut rest = buffer.flush(true).unwrap();
    rest.sort_unstable();
    assert_eq!(rest, [2, 3]);
}

#[test]
#[serial]
fn timed_pull_succeeds_when_item_arrives_in_time() {
    init_test_tracing();
    let buffer = Arc::new(PriorityBuffer::init(1).unwrap());

    let consumer = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || buffer.pull_timeout(Duration::from_secs(5)))
    };

    thread::sleep(Duration::from_millis(20));
    buffer.push("late", 0, true).unwrap();
    assert_eq!(consumer.join().unwrap(), Ok("late"));
}

#[test]
#[serial]
fn timed_push_gives_up_after_deadline() {
    init_test_tracing();
    let buffer = PriorityBuffer::init(1).unwrap();
    buffer.push(1u8, 0, true).unwrap();

    let started = Instant::now();
    let err = buffer
        .push_timeout(2u8, -1, Duration::from_millis(40))
        .unwrap_err();

    assert_eq!(err.error(), BufferError::TimedOut);
    assert!(started.elapsed() >= Duration::from_millis(30));
    assert_eq!(buffer.len(), 1);
}

#[test]
fn zero_timeout_fails_at_once_on_empty_buffer() {
    init_test_tracing();
    let buffer = PriorityBuffer::<u8>::init(1).unwrap();

    let started = Instant::now();
    assert_eq!(buffer.pull_timeout(Duration::ZERO), Err(BufferError::TimedOut));
    assert!(started.elapsed() < Duration::from_secs(1));

    buffer.try_push(1, 0).unwrap();
    let err = buffer.push_timeout(2, 0, Duration::ZERO).unwrap_err();
    assert_eq!(err.error(), BufferError::TimedOut);
    assert_eq!(err.into_inner(), 2);

    // An item already queued is taken without waiting.
    assert_eq!(buffer.pull_timeout(Duration::ZERO), Ok(1));
}

#[test]
#[serial]
fn max_timeout_waits_like_infinite() {
    init_test_tracing();
    let buffer = Arc::new(PriorityBuffer::init(1).unwrap());

    let consumer = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || buffer.pull_timeout(Duration::MAX))
    };

    thread::sleep(Duration::from_millis(20));
    buffer.push_timeout(9u64, 3, Duration::MAX).unwrap();
    assert_eq!(consumer.join().unwrap(), Ok(9));
}
