//! Double-buffered output segments with overlap-add.
//!
//! Each refill swaps the active segment, lets the backend write a full
//! segment into it, then adds the previous segment's unplayed tail onto the
//! new head:
//!
//! ```text
//! prev:   [ played: hop ][ tail: overlap ]
//!                         +++++++++++++++++
//! active:                [ head: overlap ][ rest ]
//! ```
//!
//! Only the first `hop` samples of a segment are ever emitted. Because the
//! add is done in place, a tail that itself already carried earlier
//! contributions passes them on, so hops of `segment / 4` (three-way
//! overlap) reconstruct as well as `segment / 2`. Block mode is the
//! degenerate case `overlap == 0`.

use crate::error::{LtsError, Result};

#[derive(Debug, Clone)]
pub struct OverlapAdder {
    segments: [Box<[f32]>; 2],
    active: usize,
    hop: usize,
}

impl OverlapAdder {
    /// # Errors
    /// `InvalidConfig` if `segment_size` is zero or `hop` is outside
    /// `1..=segment_size`.
    pub fn new(segment_size: usize, hop: usize) -> Result<Self> {
        if segment_size == 0 || hop == 0 || hop > segment_size {
            return Err(LtsError::InvalidConfig(format!(
                "hop {hop} must be in 1..={segment_size}"
            )));
        }
        Ok(Self {
            segments: [
                vec![0.0; segment_size].into_boxed_slice(),
                vec![0.0; segment_size].into_boxed_slice(),
            ],
            active: 0,
            hop,
        })
    }

    pub fn segment_size(&self) -> usize {
        self.segments[0].len()
    }

    pub fn overlap(&self) -> usize {
        self.segment_size() - self.hop
    }

    /// Swap roles and hand out the new active segment for the backend to
    /// overwrite. Call [`OverlapAdder::commit`] once it has been written.
    #[inline]
    pub fn begin(&mut self) -> &mut [f32] {
        self.active ^= 1;
        &mut self.segments[self.active]
    }

    /// Add the previous segment's tail onto the head of the active one.
    #[inline]
    pub fn commit(&mut self) {
        let overlap = self.overlap();
        if overlap == 0 {
            return;
        }
        let hop = self.hop;
        let (first, second) = self.segments.split_at_mut(1);
        let (active, prev) = if self.active == 0 {
            (&mut first[0], &second[0])
        } else {
            (&mut second[0], &first[0])
        };
        for (dst, tail) in active[..overlap].iter_mut().zip(&prev[hop..]) {
            *dst += *tail;
        }
    }

    /// Zero the active segment (after a failed inference call).
    #[inline]
    pub fn silence(&mut self) {
        self.segments[self.active].fill(0.0);
    }

    #[inline]
    pub fn sample(&self, index: usize) -> f32 {
        self.segments[self.active][index]
    }

    pub fn active(&self) -> &[f32] {
        &self.segments[self.active]
    }
}
