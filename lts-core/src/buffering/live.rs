//! Circular capture buffer for live input.
//!
//! One sample is written per render tick; reads go through the ordinary
//! [`RingSource::fill`]. The buffer starts zeroed with the write cursor
//! `lead` samples ahead of the read cursor. Reader and writer both move
//! `hop` samples per segment, so the gap between them never shrinks and the
//! reader never sees a sample that has not been written yet.

use super::ring::RingSource;
use crate::error::{LtsError, Result};

#[derive(Debug, Clone)]
pub struct LiveCapture {
    ring: RingSource,
    write_cursor: usize,
}

impl LiveCapture {
    /// Allocate a zeroed capture buffer of `capacity` samples whose write
    /// cursor leads the read cursor by `lead` samples.
    ///
    /// # Errors
    /// `BoundsViolation` when `capacity` cannot hold the lead plus one full
    /// read window of `window` samples.
    pub fn new(capacity: usize, lead: usize, window: usize) -> Result<Self> {
        if lead == 0 || lead < window {
            return Err(LtsError::BoundsViolation(format!(
                "live capture lead {lead} must cover the {window}-sample read window"
            )));
        }
        if capacity < lead + window {
            return Err(LtsError::BoundsViolation(format!(
                "live capture of {capacity} samples cannot hold lead {lead} plus window {window}"
            )));
        }
        Ok(Self {
            ring: RingSource::zeroed(capacity)?,
            write_cursor: lead,
        })
    }

    /// Store one live sample at the write cursor.
    #[inline]
    pub fn push(&mut self, sample: f32) {
        let len = self.ring.len();
        self.ring.samples_mut()[self.write_cursor] = sample;
        self.write_cursor = (self.write_cursor + 1) % len;
    }

    /// Read a window at the read cursor; see [`RingSource::fill`].
    #[inline]
    pub fn fill(&mut self, dest: &mut [f32], advance: usize) {
        self.ring.fill(dest, advance);
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn read_cursor(&self) -> usize {
        self.ring.cursor()
    }

    #[inline]
    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    /// Samples between the read cursor and the write cursor, going forward.
    #[inline]
    pub fn lead(&self) -> usize {
        let len = self.ring.len();
        (self.write_cursor + len - self.ring.cursor()) % len
    }

    pub fn ring(&self) -> &RingSource {
        &self.ring
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed_with_write_ahead() {
        let cap = LiveCapture::new(40, 4, 4).unwrap();
        assert_eq!(cap.read_cursor(), 0);
        assert_eq!(cap.write_cursor(), 4);
        assert_eq!(cap.lead(), 4);
        assert!(cap.ring().samples().iter().all(|s| *s == 0.0));
    }

    #[test]
    fn gap_is_preserved_across_many_hops() {
        let hop = 4;
        let window = 8;
        let mut cap = LiveCapture::new(10 * hop, window, window).unwrap();
        let mut buf = vec![0.0f32; window];
        let mut next = 1.0f32;

        for _ in 0..100 {
            cap.fill(&mut buf, hop);
            for _ in 0..hop {
                cap.push(next);
                next += 1.0;
            }
            assert!(cap.lead() >= hop);
            assert_eq!(cap.lead(), window);
        }
    }

    #[test]
    fn reads_back_written_samples_in_order() {
        let hop = 3;
        let mut cap = LiveCapture::new(12, hop, hop).unwrap();
        let mut window = [0.0f32; 3];

        // first hop comes from the zeroed lead
        cap.fill(&mut window, hop);
        assert_eq!(window, [0.0, 0.0, 0.0]);
        for v in [1.0, 2.0, 3.0] {
            cap.push(v);
        }

        cap.fill(&mut window, hop);
        assert_eq!(window, [1.0, 2.0, 3.0]);
        for v in [4.0, 5.0, 6.0] {
            cap.push(v);
        }

        cap.fill(&mut window, hop);
        assert_eq!(window, [4.0, 5.0, 6.0]);
    }

    #[test]
    fn rejects_undersized_buffers() {
        assert!(matches!(
            LiveCapture::new(6, 4, 4),
            Err(LtsError::BoundsViolation(_))
        ));
        assert!(matches!(
            LiveCapture::new(64, 2, 4),
            Err(LtsError::BoundsViolation(_))
        ));
    }
}
