//! Control surface for the interpolation weight.
//!
//! The engine polls its control once at the start of every `render` call and
//! clamps the value to `[0, 1]`. `SharedControl` stores the value as `f32`
//! bits in an `AtomicU32`, so any thread (stdin reader, GUI, MIDI) can set it
//! without locking the render thread.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

/// A named scalar polled once per render call.
pub trait ControlSurface: Send + 'static {
    fn poll(&self) -> f32;
}

/// A constant value.
#[derive(Debug, Clone, Copy)]
pub struct FixedControl(pub f32);

impl ControlSurface for FixedControl {
    fn poll(&self) -> f32 {
        self.0
    }
}

/// Lock-free value shared between a setter thread and the render thread.
#[derive(Debug, Clone)]
pub struct SharedControl {
    bits: Arc<AtomicU32>,
}

impl SharedControl {
    pub fn new(initial: f32) -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(initial.to_bits())),
        }
    }

    pub fn set(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Default for SharedControl {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl ControlSurface for SharedControl {
    fn poll(&self) -> f32 {
        self.get()
    }
}

impl ControlSurface for Box<dyn ControlSurface> {
    fn poll(&self) -> f32 {
        (**self).poll()
    }
}

/// Clamp a polled value to `[0, 1]`; NaN reads as 0.
#[inline]
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_control_is_visible_across_clones() {
        let control = SharedControl::new(0.1);
        let setter = control.clone();
        std::thread::spawn(move || setter.set(0.8))
            .join()
            .unwrap();
        assert_eq!(control.poll(), 0.8);
    }

    #[test]
    fn clamp_unit_bounds_values() {
        assert_eq!(clamp_unit(-0.5), 0.0);
        assert_eq!(clamp_unit(1.7), 1.0);
        assert_eq!(clamp_unit(0.25), 0.25);
        assert_eq!(clamp_unit(f32::NAN), 0.0);
    }
}
