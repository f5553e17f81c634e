//! Deterministic backends that need no model file.
//!
//! Used for tests, the benchmark, and as stand-ins while a trained model is
//! not available.

use std::f32::consts::PI;

use tracing::debug;

use crate::error::{LtsError, Result};
use crate::inference::{InferenceBackend, ModelInputs};

/// Blends the first two buffer arguments with the interpolation scalar:
/// `out[i] = (1 - w) * a[i] + w * b[i]`.
///
/// With a single buffer argument the buffer is copied. Buffers shorter than
/// the output are read cyclically, so latent-sized inputs still produce a
/// full segment. Without a scalar argument `w` defaults to 0.5.
#[derive(Debug, Default)]
pub struct BlendModel;

impl BlendModel {
    pub fn new() -> Self {
        Self
    }
}

impl InferenceBackend for BlendModel {
    fn name(&self) -> &str {
        "blend"
    }

    fn warm_up(&mut self) -> Result<()> {
        debug!("BlendModel::warm_up: no-op");
        Ok(())
    }

    fn run(&mut self, inputs: &ModelInputs<'_>, output: &mut [f32]) -> Result<()> {
        let mut buffers = inputs.buffers();
        let a = buffers
            .next()
            .ok_or_else(|| LtsError::Inference("blend model needs a buffer argument".into()))?;
        let b = buffers.next().unwrap_or(a);
        if a.is_empty() || b.is_empty() {
            return Err(LtsError::Inference("blend model got an empty buffer".into()));
        }
        let w = inputs.scalar().unwrap_or(0.5);

        for (i, out) in output.iter_mut().enumerate() {
            let x = a[i % a.len()];
            let y = b[i % b.len()];
            *out = (1.0 - w) * x + w * y;
        }
        Ok(())
    }
}

/// Writes the newest `output.len()` samples of the first buffer argument.
///
/// With a sliding live window this is a dry passthrough.
#[derive(Debug, Default)]
pub struct PassthroughModel;

impl PassthroughModel {
    pub fn new() -> Self {
        Self
    }
}

impl InferenceBackend for PassthroughModel {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    fn run(&mut self, inputs: &ModelInputs<'_>, output: &mut [f32]) -> Result<()> {
        let window = inputs
            .buffers()
            .next()
            .ok_or_else(|| LtsError::Inference("passthrough needs a buffer argument".into()))?;

        if window.len() >= output.len() {
            output.copy_from_slice(&window[window.len() - output.len()..]);
        } else {
            output[..window.len()].copy_from_slice(window);
            output[window.len()..].fill(0.0);
        }
        Ok(())
    }
}

/// Analysis/synthesis identity for windowed streaming.
///
/// Multiplies the first buffer argument by a periodic Hann window scaled so
/// that copies spaced `hop_size` apart sum to exactly one. Fed through the
/// engine's overlap-add this reproduces the input signal (delayed by the
/// first hop), which makes it a reference for click-free stitching.
#[derive(Debug)]
pub struct WindowedPassthrough {
    window: Box<[f32]>,
}

impl WindowedPassthrough {
    /// `segment_size` must be a multiple of `hop_size` and at least twice it.
    pub fn new(segment_size: usize, hop_size: usize) -> Result<Self> {
        if hop_size == 0 || segment_size % hop_size != 0 || segment_size < 2 * hop_size {
            return Err(LtsError::InvalidConfig(format!(
                "windowed passthrough needs segment {segment_size} to be a multiple (>= 2) of hop {hop_size}"
            )));
        }
        let gain = 2.0 * hop_size as f32 / segment_size as f32;
        let window = (0..segment_size)
            .map(|i| {
                let s = (PI * i as f32 / segment_size as f32).sin();
                gain * s * s
            })
            .collect();
        Ok(Self { window })
    }

    pub fn window(&self) -> &[f32] {
        &self.window
    }
}

impl InferenceBackend for WindowedPassthrough {
    fn name(&self) -> &str {
        "windowed-passthrough"
    }

    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    fn run(&mut self, inputs: &ModelInputs<'_>, output: &mut [f32]) -> Result<()> {
        let frame = inputs
            .buffers()
            .next()
            .ok_or_else(|| LtsError::Inference("windowed passthrough needs a buffer".into()))?;
        if frame.len() != self.window.len() || output.len() != self.window.len() {
            return Err(LtsError::Inference(format!(
                "windowed passthrough expects {}-sample frames",
                self.window.len()
            )));
        }
        for ((out, x), w) in output.iter_mut().zip(frame).zip(self.window.iter()) {
            *out = x * w;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::TensorSlot;
    use approx::assert_abs_diff_eq;

    #[test]
    fn blend_averages_with_half_weight() {
        let buffers: Vec<Box<[f32]>> = vec![vec![1.0, 2.0, 3.0].into(), vec![10.0, 20.0, 30.0].into()];
        let layout = [TensorSlot::Buffer(0), TensorSlot::Buffer(1), TensorSlot::Scalar];
        let inputs = ModelInputs::new(&layout, &buffers, 0.5);

        let mut out = [0.0f32; 3];
        BlendModel::new().run(&inputs, &mut out).unwrap();
        assert_abs_diff_eq!(out[0], 5.5, epsilon = 1e-6);
        assert_abs_diff_eq!(out[1], 11.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out[2], 16.5, epsilon = 1e-6);
    }

    #[test]
    fn blend_weight_selects_sources() {
        let buffers: Vec<Box<[f32]>> = vec![vec![1.0; 4].into(), vec![3.0; 4].into()];
        let layout = [TensorSlot::Buffer(0), TensorSlot::Buffer(1), TensorSlot::Scalar];
        let mut out = [0.0f32; 4];

        BlendModel::new()
            .run(&ModelInputs::new(&layout, &buffers, 0.0), &mut out)
            .unwrap();
        assert!(out.iter().all(|v| *v == 1.0));

        BlendModel::new()
            .run(&ModelInputs::new(&layout, &buffers, 1.0), &mut out)
            .unwrap();
        assert!(out.iter().all(|v| *v == 3.0));
    }

    #[test]
    fn blend_cycles_short_buffers() {
        let buffers: Vec<Box<[f32]>> = vec![vec![1.0, 2.0].into()];
        let layout = [TensorSlot::Buffer(0)];
        let mut out = [0.0f32; 5];
        BlendModel::new()
            .run(&ModelInputs::new(&layout, &buffers, 0.0), &mut out)
            .unwrap();
        assert_eq!(out, [1.0, 2.0, 1.0, 2.0, 1.0]);
    }

    #[test]
    fn blend_without_buffers_is_an_error() {
        let layout = [TensorSlot::Scalar];
        let mut out = [0.0f32; 2];
        let err = BlendModel::new()
            .run(&ModelInputs::new(&layout, &[], 0.5), &mut out)
            .unwrap_err();
        assert!(matches!(err, LtsError::Inference(_)));
    }

    #[test]
    fn passthrough_takes_newest_samples() {
        let buffers: Vec<Box<[f32]>> = vec![vec![1.0, 2.0, 3.0, 4.0, 5.0].into()];
        let layout = [TensorSlot::Buffer(0)];
        let mut out = [0.0f32; 1];
        PassthroughModel::new()
            .run(&ModelInputs::new(&layout, &buffers, 0.0), &mut out)
            .unwrap();
        assert_eq!(out, [5.0]);
    }

    #[test]
    fn hann_copies_sum_to_one() {
        for (segment, hop) in [(16usize, 8usize), (32, 8), (64, 16)] {
            let model = WindowedPassthrough::new(segment, hop).unwrap();
            let w = model.window();
            for i in 0..hop {
                let sum: f32 = (0..segment / hop).map(|k| w[i + k * hop]).sum();
                assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn windowed_passthrough_rejects_bad_geometry() {
        assert!(WindowedPassthrough::new(10, 3).is_err());
        assert!(WindowedPassthrough::new(8, 8).is_err());
        assert!(WindowedPassthrough::new(8, 0).is_err());
    }
}
