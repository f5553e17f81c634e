//! ONNX Runtime backend via the `ort` crate.
//!
//! Targets the RAVE-style VAE exports used by the latent timbre programs:
//! every argument is a flat f32 tensor of shape `[1, n]` (audio windows,
//! latent mu/logvar vectors) or `[1]` (interpolation weight), and the first
//! output is a `[1, segment_size]` block of samples.
//!
//! Arguments are bound to the session's declared inputs *by position*; the
//! engine validates the count once at setup through
//! [`InferenceBackend::expected_inputs`].

use std::path::PathBuf;

use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::{Session, SessionInputValue};
use ort::value::TensorRef;
use tracing::{debug, info, warn};

use crate::error::{LtsError, Result};
use crate::inference::{InferenceBackend, InputTensor, ModelInputs};

/// Where and how to load the model.
#[derive(Debug, Clone)]
pub struct OrtModelConfig {
    /// Path to the `.onnx` file.
    pub model_path: PathBuf,
    /// Label used in logs.
    pub session_id: String,
    /// Intra-op threads. A real-time render thread usually wants 1.
    pub intra_threads: usize,
}

impl OrtModelConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            session_id: "session1".into(),
            intra_threads: 1,
        }
    }
}

/// ONNX Runtime session wrapped as an [`InferenceBackend`].
///
/// The session is created in `warm_up`, not in `new`, so construction never
/// fails and load errors surface through engine setup.
pub struct OrtModel {
    config: OrtModelConfig,
    session: Option<Session>,
    input_names: Vec<String>,
    output_name: String,
    /// Argument list reused by every `run`; always empty between calls.
    scratch: Vec<SessionInputValue<'static>>,
}

impl OrtModel {
    pub fn new(config: OrtModelConfig) -> Self {
        Self {
            config,
            session: None,
            input_names: Vec::new(),
            output_name: String::new(),
            scratch: Vec::new(),
        }
    }

    /// Names of the model inputs, in binding order. Empty before `warm_up`.
    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn load_error(&self, reason: impl Into<String>) -> LtsError {
        LtsError::ModelLoad {
            path: self.config.model_path.clone(),
            reason: reason.into(),
        }
    }
}

impl InferenceBackend for OrtModel {
    fn name(&self) -> &str {
        &self.config.session_id
    }

    fn warm_up(&mut self) -> Result<()> {
        let path = &self.config.model_path;
        if !path.exists() {
            return Err(self.load_error("model file not found"));
        }

        let size_mb = std::fs::metadata(path)
            .map(|m| m.len() as f64 / 1_048_576.0)
            .unwrap_or(0.0);

        info!("=== OrtModel Startup Report ===");
        info!("  session: {}", self.config.session_id);
        info!("  path: {:?}", path);
        info!("  size: {:.2} MB", size_mb);

        let session = SessionBuilder::new()
            .and_then(|b| b.with_intra_threads(self.config.intra_threads.max(1)))
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::All))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| self.load_error(e.to_string()))?;

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|outlet| outlet.name().to_string())
            .collect();
        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|outlet| outlet.name().to_string())
            .collect();

        info!("  inputs: {:?}", input_names);
        info!("  outputs: {:?}", output_names);

        let output_name = output_names
            .first()
            .cloned()
            .ok_or_else(|| self.load_error("model has no outputs"))?;
        if output_names.len() > 1 {
            warn!(
                output = output_name.as_str(),
                "model has several outputs; using the first"
            );
        }

        info!("=== OrtModel ready ===");

        self.scratch = Vec::with_capacity(input_names.len());
        self.input_names = input_names;
        self.output_name = output_name;
        self.session = Some(session);
        Ok(())
    }

    fn expected_inputs(&self) -> Option<usize> {
        self.session.as_ref().map(|_| self.input_names.len())
    }

    fn run(&mut self, inputs: &ModelInputs<'_>, output: &mut [f32]) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Err(LtsError::Inference("ONNX session not loaded".into()));
        };

        // Zero-copy views over the engine's window buffers. The scalar lives
        // on this stack frame for the duration of the call.
        let scalar = inputs.scalar().unwrap_or(0.0);
        let scalar_slot = [scalar];

        let mut values = recycle(std::mem::take(&mut self.scratch));
        for tensor in inputs.iter().take(self.input_names.len()) {
            let value = match tensor {
                InputTensor::Buffer(buf) => {
                    TensorRef::from_array_view(([1_i64, buf.len() as i64], buf))
                }
                InputTensor::Scalar(_) => TensorRef::from_array_view(([1_i64], &scalar_slot[..])),
            }
            .map_err(|e| LtsError::OnnxSession(e.to_string()))?;
            values.push(SessionInputValue::from(value));
        }

        // positional binding, in session input order
        let outputs = session
            .run(&values[..])
            .map_err(|e| LtsError::OnnxSession(e.to_string()))?;

        let block = outputs
            .get(self.output_name.as_str())
            .unwrap_or(&outputs[0]);
        let (_, data) = block
            .try_extract_tensor::<f32>()
            .map_err(|e| LtsError::OnnxSession(e.to_string()))?;

        let n = data.len().min(output.len());
        output[..n].copy_from_slice(&data[..n]);
        if n < output.len() {
            debug!(
                produced = data.len(),
                expected = output.len(),
                "model output shorter than segment; zero-padding"
            );
            output[n..].fill(0.0);
        }
        drop(outputs);
        self.scratch = recycle(values);
        Ok(())
    }
}

/// Empty `values` and hand its allocation back under another lifetime.
fn recycle<'a, 'b>(mut values: Vec<SessionInputValue<'a>>) -> Vec<SessionInputValue<'b>> {
    values.clear();
    values.into_iter().filter_map(|_| None).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_a_load_failure() {
        let mut model = OrtModel::new(OrtModelConfig::new("/definitely/not/here.onnx"));
        let err = model.warm_up().unwrap_err();
        assert!(matches!(err, LtsError::ModelLoad { .. }));
        assert_eq!(model.expected_inputs(), None);
    }

    #[test]
    fn recycled_argument_list_keeps_its_allocation() {
        let values: Vec<SessionInputValue<'static>> = Vec::with_capacity(6);
        let recycled: Vec<SessionInputValue<'_>> = recycle(values);
        assert!(recycled.is_empty());
        assert!(recycled.capacity() >= 6);
        assert!(recycle(recycled).capacity() >= 6);
    }

    #[test]
    fn run_before_warm_up_fails_cleanly() {
        let mut model = OrtModel::new(OrtModelConfig::new("unused.onnx"));
        let layout = [crate::inference::TensorSlot::Scalar];
        let inputs = ModelInputs::new(&layout, &[], 0.5);
        let mut out = [0.0f32; 4];
        assert!(matches!(
            model.run(&inputs, &mut out),
            Err(LtsError::Inference(_))
        ));
    }
}
