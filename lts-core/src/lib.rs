//! # lts-core
//!
//! Streams fixed-size sample windows into a block-based generative model and
//! stitches its output blocks back into continuous audio, inside a real-time
//! per-sample render loop.
//!
//! ## Architecture
//!
//! ```text
//! WAV / latent files ──► RingSource ─┐
//! live input ──► LiveCapture ────────┼─► InputAssembler ─► InferenceBackend::run
//! ControlSurface (interpolation) ────┘                            │
//!                                                           OverlapAdder
//!                                                                 │
//!            SegmentScheduler: one refill every hop ──► render(HostBlock)
//! ```
//!
//! The render path never allocates and has no error surface; every failure
//! is reported by `StreamEngine::setup`.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod control;
pub mod engine;
pub mod error;
pub mod inference;
pub mod io;
pub mod ipc;

// Convenience re-exports for downstream crates
pub use audio::{AudioHost, HostOptions};
pub use buffering::{LiveCapture, RingSource};
pub use control::{ControlSurface, FixedControl, SharedControl};
pub use engine::{
    DiagnosticsSnapshot, EngineConfig, EngineInput, HostBlock, InputSpec, InterleavedBlock,
    LatentPair, RenderMode, StreamEngine,
};
pub use error::{LtsError, Result};
pub use inference::{BlendModel, InferenceBackend, ModelInputs, PassthroughModel, WindowedPassthrough};
pub use ipc::events::{EngineStatus, EngineStatusEvent, RenderStatsEvent};

#[cfg(feature = "onnx")]
pub use inference::{OrtModel, OrtModelConfig};
