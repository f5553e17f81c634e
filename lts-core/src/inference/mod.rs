//! Block inference abstraction.
//!
//! The `InferenceBackend` trait decouples the engine from any specific
//! runtime (deterministic test models, ONNX Runtime, ...). A backend is
//! called synchronously on the render thread, once per refill, with the
//! ordered argument set assembled by the engine and a fixed-length output
//! segment to fill.
//!
//! Arguments are passed as [`ModelInputs`]: a borrowed, read-only view whose
//! tensors carry their own length, so a backend can never read past the end
//! of a window. The argument order is fixed when the engine is configured.

pub mod stub;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::{OrtModel, OrtModelConfig};

pub use stub::{BlendModel, PassthroughModel, WindowedPassthrough};

use crate::error::Result;

/// Contract for block inference backends.
pub trait InferenceBackend: Send + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// One-time preparation: load weights, allocate sessions. Called once
    /// during engine setup, before any `run`.
    ///
    /// # Errors
    /// Should return `LtsError::ModelLoad` when the model cannot be loaded.
    fn warm_up(&mut self) -> Result<()>;

    /// Number of arguments the model expects, when known after `warm_up`.
    ///
    /// The engine rejects a configured input layout with a different count.
    fn expected_inputs(&self) -> Option<usize> {
        None
    }

    /// Run one block. Must write every sample of `output`.
    fn run(&mut self, inputs: &ModelInputs<'_>, output: &mut [f32]) -> Result<()>;
}

impl InferenceBackend for Box<dyn InferenceBackend> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }

    fn expected_inputs(&self) -> Option<usize> {
        (**self).expected_inputs()
    }

    fn run(&mut self, inputs: &ModelInputs<'_>, output: &mut [f32]) -> Result<()> {
        (**self).run(inputs, output)
    }
}

/// Where one model argument comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorSlot {
    /// Index into the assembled window buffers.
    Buffer(usize),
    /// The interpolation scalar.
    Scalar,
}

/// One model argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputTensor<'a> {
    Buffer(&'a [f32]),
    Scalar(f32),
}

impl<'a> InputTensor<'a> {
    pub fn as_buffer(&self) -> Option<&'a [f32]> {
        match *self {
            InputTensor::Buffer(b) => Some(b),
            InputTensor::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match *self {
            InputTensor::Scalar(s) => Some(s),
            InputTensor::Buffer(_) => None,
        }
    }
}

/// Ordered, read-only argument set for one backend call.
///
/// Borrowed from the engine's pre-sized buffers; building it never
/// allocates.
#[derive(Debug, Clone, Copy)]
pub struct ModelInputs<'a> {
    layout: &'a [TensorSlot],
    buffers: &'a [Box<[f32]>],
    scalar: f32,
}

impl<'a> ModelInputs<'a> {
    pub fn new(layout: &'a [TensorSlot], buffers: &'a [Box<[f32]>], scalar: f32) -> Self {
        debug_assert!(layout.iter().all(|slot| match slot {
            TensorSlot::Buffer(i) => *i < buffers.len(),
            TensorSlot::Scalar => true,
        }));
        Self {
            layout,
            buffers,
            scalar,
        }
    }

    pub fn len(&self) -> usize {
        self.layout.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<InputTensor<'a>> {
        self.layout.get(index).map(|slot| self.resolve(*slot))
    }

    pub fn iter(&self) -> impl Iterator<Item = InputTensor<'a>> + 'a {
        let buffers = self.buffers;
        let scalar = self.scalar;
        self.layout.iter().map(move |slot| match *slot {
            TensorSlot::Buffer(i) => InputTensor::Buffer(&buffers[i]),
            TensorSlot::Scalar => InputTensor::Scalar(scalar),
        })
    }

    /// Buffer arguments only, in order.
    pub fn buffers(&self) -> impl Iterator<Item = &'a [f32]> + 'a {
        self.iter().filter_map(|t| t.as_buffer())
    }

    /// The scalar argument, if the layout has one.
    pub fn scalar(&self) -> Option<f32> {
        self.layout
            .contains(&TensorSlot::Scalar)
            .then_some(self.scalar)
    }

    fn resolve(&self, slot: TensorSlot) -> InputTensor<'a> {
        match slot {
            TensorSlot::Buffer(i) => InputTensor::Buffer(&self.buffers[i]),
            TensorSlot::Scalar => InputTensor::Scalar(self.scalar),
        }
    }
}
