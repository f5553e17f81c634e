//! Sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! Decoded source files are converted to the engine rate once at setup,
//! where allocation is allowed; nothing here runs on the render thread.
//!
//! When source rate == engine rate, `RateConverter` is a passthrough and no
//! rubato session is created at all.
//!
//! ```ignore
//! let out = RateConverter::convert_all(&samples, 44_100, 48_000)?;
//! ```

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::{error, info};

use crate::error::{LtsError, Result};

/// Input frames per rubato call.
pub const DEFAULT_CHUNK: usize = 1024;

/// Converts f32 mono audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when rates match (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    /// Holds partial input chunks between calls.
    input_buf: Vec<f32>,
    chunk_size: usize,
    /// Pre-allocated output buffer: `[1][output_frames_max]`.
    output_buf: Vec<Vec<f32>>,
    ratio: f64,
}

impl RateConverter {
    /// # Errors
    /// `InvalidConfig` if either rate is zero or rubato fails to initialise.
    pub fn new(from_rate: u32, to_rate: u32, chunk_size: usize) -> Result<Self> {
        if from_rate == 0 || to_rate == 0 || chunk_size == 0 {
            return Err(LtsError::InvalidConfig(format!(
                "cannot resample {from_rate} Hz -> {to_rate} Hz in chunks of {chunk_size}"
            )));
        }
        let ratio = to_rate as f64 / from_rate as f64;
        if from_rate == to_rate {
            return Ok(Self {
                resampler: None,
                input_buf: Vec::new(),
                chunk_size,
                output_buf: Vec::new(),
                ratio,
            });
        }

        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio
            PolynomialDegree::Cubic,
            chunk_size,
            1, // mono
        )
        .map_err(|e| LtsError::InvalidConfig(format!("resampler init: {e}")))?;

        let max_out = resampler.output_frames_max();
        let output_buf = vec![vec![0f32; max_out]; 1];

        info!(from_rate, to_rate, chunk_size, "resampling enabled");

        Ok(Self {
            resampler: Some(resampler),
            input_buf: Vec::new(),
            chunk_size,
            output_buf,
            ratio,
        })
    }

    /// Feed samples, returning whatever full chunks produced (may be empty).
    /// A remainder shorter than `chunk_size` is kept for the next call or
    /// for [`RateConverter::flush`].
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(ref mut resampler) = self.resampler else {
            return samples.to_vec();
        };

        self.input_buf.extend_from_slice(samples);
        let mut result = Vec::new();

        while self.input_buf.len() >= self.chunk_size {
            let input_slice = &self.input_buf[..self.chunk_size];
            match resampler.process_into_buffer(&[input_slice], &mut self.output_buf, None) {
                Ok((_consumed, produced)) => {
                    result.extend_from_slice(&self.output_buf[0][..produced]);
                }
                Err(e) => {
                    error!("resampler process error: {e}");
                }
            }
            self.input_buf.drain(..self.chunk_size);
        }

        result
    }

    /// Push the buffered remainder through, zero-padded to a full chunk.
    pub fn flush(&mut self) -> Vec<f32> {
        let Some(ref mut resampler) = self.resampler else {
            return std::mem::take(&mut self.input_buf);
        };

        let mut result = Vec::new();
        let pending = std::mem::take(&mut self.input_buf);
        let wave_in = [pending.as_slice()];
        match resampler.process_partial_into_buffer(Some(&wave_in[..]), &mut self.output_buf, None) {
            Ok((_consumed, produced)) => {
                result.extend_from_slice(&self.output_buf[0][..produced]);
            }
            Err(e) => {
                error!("resampler flush error: {e}");
            }
        }
        result
    }

    /// Samples of algorithmic delay at the output rate.
    pub fn output_delay(&self) -> usize {
        self.resampler.as_ref().map_or(0, |r| r.output_delay())
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }

    /// Convert a whole buffer, compensating for the resampler delay so the
    /// result is time-aligned with the input and `round(len * ratio)` long.
    pub fn convert_all(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
        let mut rc = Self::new(from_rate, to_rate, DEFAULT_CHUNK)?;
        if rc.is_passthrough() {
            return Ok(samples.to_vec());
        }

        let expected = (samples.len() as f64 * rc.ratio).round() as usize;
        let delay = rc.output_delay();

        let mut out = rc.process(samples);
        // keep flushing silence until the delayed tail has come out
        while out.len() < expected + delay {
            let tail = rc.flush();
            if tail.is_empty() {
                break;
            }
            out.extend_from_slice(&tail);
        }

        let start = delay.min(out.len());
        let mut out = out.split_off(start);
        out.resize(expected, 0.0);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_identity() {
        let mut rc = RateConverter::new(48_000, 48_000, 960).unwrap();
        assert!(rc.is_passthrough());
        let samples: Vec<f32> = (0..480).map(|i| i as f32 * 0.001).collect();
        assert_eq!(rc.process(&samples), samples);
    }

    #[test]
    fn partial_accumulation_returns_empty() {
        let mut rc = RateConverter::new(44_100, 48_000, 960).unwrap();
        assert!(rc.process(&vec![0.0f32; 500]).is_empty());
        assert!(!rc.process(&vec![0.0f32; 500]).is_empty());
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(matches!(
            RateConverter::new(0, 48_000, 960),
            Err(LtsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn convert_all_produces_scaled_length() {
        let input = vec![0.25f32; 44_100];
        let out = RateConverter::convert_all(&input, 44_100, 48_000).unwrap();
        assert_eq!(out.len(), 48_000);
        // DC level survives conversion away from the edges
        let mid = out[24_000];
        assert!((mid - 0.25).abs() < 1e-2, "mid sample {mid}");
    }

    #[test]
    fn convert_all_downsamples() {
        let input = vec![0.0f32; 4_800];
        let out = RateConverter::convert_all(&input, 48_000, 16_000).unwrap();
        assert_eq!(out.len(), 1_600);
    }
}
