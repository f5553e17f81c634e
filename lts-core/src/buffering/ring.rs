//! Circular window reader over a finite sample array.
//!
//! `RingSource::fill` copies a fixed-size, possibly wrapped, window out of the
//! backing array and then advances the cursor by a caller-chosen step. The
//! same operation covers:
//!
//! - block reads (`advance == window`),
//! - overlapping reads (`advance == hop < window`),
//! - live-capture playback trailing a write cursor (see [`LiveCapture`]).
//!
//! Window and advance sizes are checked once with [`RingSource::check_read`]
//! when the engine is configured; `fill` itself only carries debug
//! assertions so it stays cheap on the render thread.
//!
//! [`LiveCapture`]: super::live::LiveCapture

use crate::error::{LtsError, Result};

/// A finite sample array read through a wrapping cursor.
#[derive(Debug, Clone)]
pub struct RingSource {
    samples: Box<[f32]>,
    cursor: usize,
}

impl RingSource {
    /// Wrap `samples`; the cursor starts at 0.
    ///
    /// # Errors
    /// `BoundsViolation` when `samples` is empty.
    pub fn new(samples: impl Into<Box<[f32]>>) -> Result<Self> {
        let samples = samples.into();
        if samples.is_empty() {
            return Err(LtsError::BoundsViolation(
                "ring source must contain at least one sample".into(),
            ));
        }
        Ok(Self { samples, cursor: 0 })
    }

    /// Zero-filled ring of `len` samples.
    pub fn zeroed(len: usize) -> Result<Self> {
        Self::new(vec![0.0f32; len])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false: construction rejects empty arrays.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub(crate) fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Validate a `(window, advance)` pair against this source.
    ///
    /// # Errors
    /// `BoundsViolation` when either exceeds the source length.
    pub fn check_read(&self, window: usize, advance: usize) -> Result<()> {
        if window > self.len() {
            return Err(LtsError::BoundsViolation(format!(
                "window of {window} samples exceeds source length {}",
                self.len()
            )));
        }
        if advance > self.len() {
            return Err(LtsError::BoundsViolation(format!(
                "advance of {advance} samples exceeds source length {}",
                self.len()
            )));
        }
        Ok(())
    }

    /// Copy `dest.len()` samples starting at the cursor (wrapping at the end
    /// of the array), then move the cursor forward by `advance`.
    ///
    /// `advance == 0` re-reads the same window on the next call.
    #[inline]
    pub fn fill(&mut self, dest: &mut [f32], advance: usize) {
        let len = self.samples.len();
        debug_assert!(dest.len() <= len, "window larger than ring source");
        debug_assert!(advance <= len, "advance larger than ring source");

        let remaining = len - self.cursor;
        if remaining >= dest.len() {
            dest.copy_from_slice(&self.samples[self.cursor..self.cursor + dest.len()]);
        } else {
            let (head, tail) = dest.split_at_mut(remaining);
            head.copy_from_slice(&self.samples[self.cursor..]);
            tail.copy_from_slice(&self.samples[..tail.len()]);
        }

        self.cursor = (self.cursor + advance) % len;
    }
}
