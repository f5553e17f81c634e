//! Sample buffers used by the engine.
//!
//! - [`RingSource`]: finite array read through a wrapping cursor.
//! - [`LiveCapture`]: circular write buffer read back through a `RingSource`.
//! - [`AudioChunk`]: decoded mono audio at a known sample rate.
//!
//! The SPSC ring below is only used by hosts that capture live input on a
//! different thread than the one running `render`. `ringbuf::HeapRb<f32>`
//! gives a wait-free `push_slice`/`try_pop`, safe on both audio threads.

pub mod chunk;
pub mod live;
pub mod ring;

use ringbuf::{traits::Split, HeapRb};

pub use chunk::AudioChunk;
pub use live::LiveCapture;
pub use ring::RingSource;
pub use ringbuf::traits::{Consumer, Producer};

/// Producer half, held by the capture callback.
pub type LiveProducer = ringbuf::HeapProd<f32>;

/// Consumer half, held by the render callback.
pub type LiveConsumer = ringbuf::HeapCons<f32>;

/// Handoff capacity: 2^16 samples ≈ 1.4 s at 48 kHz.
pub const HANDOFF_CAPACITY: usize = 1 << 16;

/// Create a matched producer/consumer pair for live input handoff.
pub fn create_live_ring() -> (LiveProducer, LiveConsumer) {
    HeapRb::<f32>::new(HANDOFF_CAPACITY).split()
}
