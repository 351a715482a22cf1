//! Bounded, thread-safe, priority-ordered blocking buffer.
//!
//! - [`PriorityBuffer`]: the shared buffer producers push into and
//!   consumers pull from.
//! - [`ring`]: the sentinel-anchored, slab-backed ring underneath it.
//!
//! Payloads are moved in on push and moved back out on pull, flush or
//! close; the buffer never inspects or copies them.

pub mod buffer;
pub mod error;
pub mod priority;
pub mod ring;
mod trace;

pub use buffer::{
    BufferConfig, BufferStats, DEFAULT_CAPACITY, Fill, NodeView, PriorityBuffer, Timeout, Wait,
};
pub use error::{BufferError, InvalidOperation, PushError};
pub use priority::Priority;
pub use trace::init_tracing;
