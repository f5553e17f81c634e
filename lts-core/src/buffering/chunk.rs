//! Decoded audio handed from the file decoder to the engine setup.

/// A contiguous block of mono PCM samples at a known sample rate.
///
/// Produced once per source at setup; never touched by the render thread.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono f32 samples, nominally in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Returns the duration of this chunk in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Returns true if the chunk contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_from_rate() {
        let chunk = AudioChunk::new(vec![0.0; 24_000], 48_000);
        assert!((chunk.duration_secs() - 0.5).abs() < 1e-9);
        assert!(!chunk.is_empty());
    }
}
