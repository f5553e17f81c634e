//! File loaders used at engine setup.
//!
//! - [`wav`]: decodes WAV files to mono f32 with `hound` and writes rendered
//!   output back out.
//! - [`latent`]: reads headerless little-endian f32 latent vectors.
//!
//! Both return `LtsError::SourceLoad` with the offending path on any failure,
//! including an empty result.

pub mod latent;
pub mod wav;

pub use latent::read_latent;
pub use wav::{load_mono, write_mono};
