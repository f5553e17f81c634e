//! Countdown that decides, once per output sample, whether a new segment
//! must be produced.
//!
//! ```text
//! tick():  countdown == 0 ?  ──yes──► Refill (caller produces a segment,
//!             │                        countdown = hop)
//!             no
//!             ▼
//!          Emit(hop - countdown), countdown -= 1
//! ```
//!
//! The countdown starts at 0 so the very first tick refills; no sample is
//! ever read from a segment that has not been produced.

#[derive(Debug, Clone)]
pub struct SegmentScheduler {
    hop: usize,
    countdown: usize,
}

impl SegmentScheduler {
    /// `hop` is the number of samples emitted per segment (the segment size
    /// in block mode).
    pub fn new(hop: usize) -> Self {
        debug_assert!(hop > 0);
        Self { hop, countdown: 0 }
    }

    /// True when the current segment is exhausted and a refill is due
    /// before the next sample can be emitted.
    #[inline]
    pub fn needs_refill(&self) -> bool {
        self.countdown == 0
    }

    /// Mark a fresh segment as available.
    #[inline]
    pub fn refilled(&mut self) {
        self.countdown = self.hop;
    }

    /// Index of the next sample in the active segment; consumes it.
    #[inline]
    pub fn next_index(&mut self) -> usize {
        debug_assert!(self.countdown > 0, "emitting from an exhausted segment");
        let index = self.hop - self.countdown;
        self.countdown -= 1;
        index
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn remaining(&self) -> usize {
        self.countdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_refills() {
        let s = SegmentScheduler::new(4);
        assert!(s.needs_refill());
    }

    #[test]
    fn emits_hop_indices_between_refills() {
        let mut s = SegmentScheduler::new(3);
        let mut trace = Vec::new();
        for _ in 0..7 {
            if s.needs_refill() {
                trace.push("R".to_string());
                s.refilled();
            }
            trace.push(s.next_index().to_string());
        }
        assert_eq!(trace, ["R", "0", "1", "2", "R", "0", "1", "2", "R", "0"]);
    }

    #[test]
    fn per_sample_hop_refills_every_tick() {
        let mut s = SegmentScheduler::new(1);
        for _ in 0..5 {
            assert!(s.needs_refill());
            s.refilled();
            assert_eq!(s.next_index(), 0);
        }
    }
}
