//! `StreamEngine`: the setup/render/cleanup context for one configuration.
//!
//! ## Lifecycle
//!
//! ```text
//! StreamEngine::setup(config, inputs, backend, control)
//!     │   validate config, load sources, warm up backend, fix layout
//!     ▼
//! render(block)  ×N     per sample: refill? → emit → capture live
//!     ▼
//! cleanup()             → DiagnosticsSnapshot
//! ```
//!
//! Every failure happens in `setup`; `render` has no error surface. A
//! backend error during a refill is logged, counted, and the fresh segment
//! is silenced.
//!
//! ## Refill
//!
//! ```text
//! InputAssembler::assemble ─► InferenceBackend::run ─► OverlapAdder::commit
//!        (fill + advance)          (writes segment)        (add prev tail)
//! ```
//!
//! Nothing on this path allocates: windows, segments, and the argument
//! layout are all sized in `setup`.

pub mod assembler;
pub mod diagnostics;
pub mod overlap;
pub mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    audio::resample::RateConverter,
    buffering::RingSource,
    control::{clamp_unit, ControlSurface},
    error::{LtsError, Result},
    inference::{InferenceBackend, TensorSlot},
    io,
};

pub use assembler::{EngineInput, FeedGeometry, InputAssembler, LatentPair};
pub use diagnostics::{DiagnosticsSnapshot, EngineDiagnostics};
pub use overlap::OverlapAdder;
pub use scheduler::SegmentScheduler;

/// How successive segments relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RenderMode {
    /// Disjoint segments: hop = segment size, no overlap-add.
    Block,
    /// Overlapping segments regenerated every `hop_size` samples and
    /// stitched with overlap-add.
    Windowed {
        #[serde(rename = "hopSize")]
        hop_size: usize,
    },
}

/// One model argument source, in argument order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InputSpec {
    /// WAV file, decoded to mono and converted to the engine rate.
    Audio { path: PathBuf },
    /// Live host input (channel 0).
    Live,
    /// Headerless f32 latent files; contributes two arguments.
    Latent { mu: PathBuf, logvar: PathBuf },
    /// The control-surface interpolation weight.
    Interpolation,
}

/// Configuration for `StreamEngine`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Samples produced per backend call. Default: 1024.
    pub segment_size: usize,
    /// Default: windowed with a 512-sample hop.
    pub mode: RenderMode,
    /// Window read from audio and live feeds. `None` means `segment_size`.
    pub input_window: Option<usize>,
    /// Length of one latent mu or logvar vector. Default: 256.
    pub latent_dim: usize,
    /// Engine sample rate in Hz; decoded files are converted to it.
    pub sample_rate: u32,
    /// Live capture buffer length, in hops. Default: 10.
    pub live_buffer_hops: usize,
    /// Initial interpolation weight in [0, 1]. Default: 0.5.
    pub interpolation: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            segment_size: 1024,
            mode: RenderMode::Windowed { hop_size: 512 },
            input_window: None,
            latent_dim: 256,
            sample_rate: 48_000,
            live_buffer_hops: 10,
            interpolation: 0.5,
        }
    }
}

impl EngineConfig {
    /// Samples emitted per refill.
    pub fn hop(&self) -> usize {
        match self.mode {
            RenderMode::Block => self.segment_size,
            RenderMode::Windowed { hop_size } => hop_size,
        }
    }

    pub fn input_window(&self) -> usize {
        self.input_window.unwrap_or(self.segment_size)
    }

    /// Write lead of the live capture: one full window, and never less than
    /// one hop, so the reader trails the writer by at least `hop` samples.
    pub fn live_lead(&self) -> usize {
        self.input_window().max(self.hop())
    }

    pub fn live_capacity(&self) -> usize {
        self.live_buffer_hops.saturating_mul(self.hop())
    }

    /// Real-time budget of one hop in microseconds.
    pub fn hop_budget_micros(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.hop() as u64 * 1_000_000) / u64::from(self.sample_rate)
    }

    /// # Errors
    /// `InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(LtsError::InvalidConfig(msg));

        if self.segment_size == 0 {
            return invalid("segment size must be non-zero".into());
        }
        let hop = self.hop();
        if hop == 0 {
            return invalid("hop size must be non-zero".into());
        }
        if hop > self.segment_size {
            return invalid(format!(
                "hop size {hop} exceeds segment size {}",
                self.segment_size
            ));
        }
        if self.input_window() == 0 {
            return invalid("input window must be non-zero".into());
        }
        if self.latent_dim == 0 {
            return invalid("latent dimension must be non-zero".into());
        }
        if self.sample_rate == 0 {
            return invalid("sample rate must be non-zero".into());
        }
        if !(0.0..=1.0).contains(&self.interpolation) {
            return invalid(format!(
                "interpolation {} is outside [0, 1]",
                self.interpolation
            ));
        }
        Ok(())
    }

    /// Extra check for layouts with a live input: the capture buffer must
    /// hold the write lead plus one read window.
    pub fn validate_live(&self) -> Result<()> {
        let window = self.input_window();
        let lead = self.live_lead();
        let capacity = self.live_capacity();
        if capacity < lead + window {
            return Err(LtsError::InvalidConfig(format!(
                "live buffer of {} hops ({capacity} samples) cannot hold lead {lead} plus a {window}-sample window",
                self.live_buffer_hops
            )));
        }
        Ok(())
    }

    fn geometry(&self) -> FeedGeometry {
        FeedGeometry {
            input_window: self.input_window(),
            hop: self.hop(),
            latent_dim: self.latent_dim,
            live_capacity: self.live_capacity(),
            live_lead: self.live_lead(),
        }
    }
}

/// Frame access the host runtime gives `render`.
pub trait HostBlock {
    /// Frames in this block.
    fn frames(&self) -> usize;
    fn output_channels(&self) -> usize;
    /// Live input sample; 0.0 when the channel does not exist.
    fn read(&self, frame: usize, channel: usize) -> f32;
    fn write(&mut self, frame: usize, channel: usize, value: f32);
}

/// Interleaved input/output buffers, the layout cpal and WAV files use.
pub struct InterleavedBlock<'a> {
    input: &'a [f32],
    input_channels: usize,
    output: &'a mut [f32],
    output_channels: usize,
}

impl<'a> InterleavedBlock<'a> {
    pub fn new(
        input: &'a [f32],
        input_channels: usize,
        output: &'a mut [f32],
        output_channels: usize,
    ) -> Self {
        Self {
            input,
            input_channels: input_channels.max(1),
            output,
            output_channels: output_channels.max(1),
        }
    }

    /// Output only; every read returns silence.
    pub fn output_only(output: &'a mut [f32], output_channels: usize) -> Self {
        Self::new(&[], 1, output, output_channels)
    }
}

impl HostBlock for InterleavedBlock<'_> {
    fn frames(&self) -> usize {
        self.output.len() / self.output_channels
    }

    fn output_channels(&self) -> usize {
        self.output_channels
    }

    #[inline]
    fn read(&self, frame: usize, channel: usize) -> f32 {
        if channel >= self.input_channels {
            return 0.0;
        }
        self.input
            .get(frame * self.input_channels + channel)
            .copied()
            .unwrap_or(0.0)
    }

    #[inline]
    fn write(&mut self, frame: usize, channel: usize, value: f32) {
        self.output[frame * self.output_channels + channel] = value;
    }
}

/// Engine context: everything `render` touches, owned in one place.
pub struct StreamEngine {
    config: EngineConfig,
    assembler: InputAssembler,
    output: OverlapAdder,
    scheduler: SegmentScheduler,
    backend: Box<dyn InferenceBackend>,
    control: Box<dyn ControlSurface>,
    diagnostics: Arc<EngineDiagnostics>,
    budget_micros: u64,
}

impl StreamEngine {
    /// Load every input named in `inputs` and build the engine.
    ///
    /// # Errors
    /// - `InvalidConfig` for a bad configuration or argument count.
    /// - `SourceLoad` for unreadable, empty, or mismatched files.
    /// - `BoundsViolation` when a source is shorter than its window or advance.
    /// - `ModelLoad` when the backend fails to warm up.
    pub fn setup(
        config: EngineConfig,
        inputs: &[InputSpec],
        backend: Box<dyn InferenceBackend>,
        control: Box<dyn ControlSurface>,
    ) -> Result<Self> {
        config.validate()?;
        let loaded = inputs
            .iter()
            .map(|spec| load_input(spec, config.sample_rate))
            .collect::<Result<Vec<_>>>()?;
        Self::from_parts(config, loaded, backend, control)
    }

    /// Build the engine from already loaded inputs.
    pub fn from_parts(
        config: EngineConfig,
        inputs: Vec<EngineInput>,
        mut backend: Box<dyn InferenceBackend>,
        control: Box<dyn ControlSurface>,
    ) -> Result<Self> {
        config.validate()?;
        if inputs.iter().any(|i| matches!(i, EngineInput::Live)) {
            config.validate_live()?;
        }

        let hop = config.hop();
        let assembler = InputAssembler::new(inputs, config.geometry())?;
        let output = OverlapAdder::new(config.segment_size, hop)?;

        backend.warm_up()?;
        let arguments = assembler.layout().len();
        if let Some(expected) = backend.expected_inputs() {
            if expected != arguments {
                return Err(LtsError::InvalidConfig(format!(
                    "backend '{}' expects {expected} inputs but {arguments} are configured",
                    backend.name()
                )));
            }
        }

        info!("=== StreamEngine Setup Report ===");
        info!("  backend: {}", backend.name());
        info!("  mode: {:?}", config.mode);
        info!("  segment: {} samples, hop: {hop}", config.segment_size);
        info!("  input window: {}", config.input_window());
        info!("  arguments: {:?}", assembler.layout());
        info!("  live input: {}", assembler.has_live());
        info!("  hop budget: {} us", config.hop_budget_micros());

        Ok(Self {
            budget_micros: config.hop_budget_micros(),
            scheduler: SegmentScheduler::new(hop),
            config,
            assembler,
            output,
            backend,
            control,
            diagnostics: Arc::new(EngineDiagnostics::default()),
        })
    }

    /// Render one host block. Polls the control surface once, then runs the
    /// per-sample loop; the mono result is written to every output channel.
    pub fn render(&mut self, block: &mut impl HostBlock) {
        let scalar = clamp_unit(self.control.poll());
        let frames = block.frames();
        let channels = block.output_channels();
        let live = self.assembler.has_live();

        for frame in 0..frames {
            if self.scheduler.needs_refill() {
                self.refill(scalar);
            }
            let value = self.output.sample(self.scheduler.next_index());

            let live_in = if live { block.read(frame, 0) } else { 0.0 };
            for channel in 0..channels {
                block.write(frame, channel, value);
            }
            if live {
                self.assembler.push_live(live_in);
            }
        }

        self.diagnostics
            .samples_rendered
            .fetch_add(frames, std::sync::atomic::Ordering::Relaxed);
        if live {
            self.diagnostics
                .live_samples_captured
                .fetch_add(frames, std::sync::atomic::Ordering::Relaxed);
        }
    }

    /// Render `frames` mono samples without a device. `input` feeds the live
    /// channel; missing samples read as silence.
    pub fn render_offline(&mut self, frames: usize, input: Option<&[f32]>) -> Vec<f32> {
        let mut out = vec![0.0f32; frames];
        let mut block = InterleavedBlock::new(input.unwrap_or(&[]), 1, &mut out, 1);
        self.render(&mut block);
        out
    }

    fn refill(&mut self, scalar: f32) {
        let started = Instant::now();

        let inputs = self.assembler.assemble(scalar);
        let segment = self.output.begin();
        match self.backend.run(&inputs, segment) {
            Ok(()) => self.output.commit(),
            Err(e) => {
                error!(backend = self.backend.name(), "refill failed: {e}");
                self.output.silence();
                self.diagnostics
                    .inference_errors
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        }
        self.scheduler.refilled();

        let micros = started.elapsed().as_micros() as u64;
        self.diagnostics.record_refill(micros, self.budget_micros);
    }

    /// Tear down and report.
    pub fn cleanup(self) -> DiagnosticsSnapshot {
        let snapshot = self.diagnostics.snapshot();
        info!(
            samples = snapshot.samples_rendered,
            refills = snapshot.refills,
            errors = snapshot.inference_errors,
            slow = snapshot.slow_refills,
            max_refill_us = snapshot.max_refill_micros,
            "engine cleanup"
        );
        snapshot
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn layout(&self) -> &[TensorSlot] {
        self.assembler.layout()
    }

    pub fn has_live_input(&self) -> bool {
        self.assembler.has_live()
    }

    pub fn assembler(&self) -> &InputAssembler {
        &self.assembler
    }

    /// Shared counters; clone the `Arc` to read them from another thread.
    pub fn diagnostics(&self) -> Arc<EngineDiagnostics> {
        Arc::clone(&self.diagnostics)
    }
}

fn load_input(spec: &InputSpec, sample_rate: u32) -> Result<EngineInput> {
    match spec {
        InputSpec::Audio { path } => {
            let chunk = io::load_mono(path)?;
            let samples = if chunk.sample_rate != sample_rate {
                warn!(
                    path = %path.display(),
                    from = chunk.sample_rate,
                    to = sample_rate,
                    "source rate differs from engine rate; converting"
                );
                RateConverter::convert_all(&chunk.samples, chunk.sample_rate, sample_rate)?
            } else {
                chunk.samples
            };
            debug!(path = %path.display(), samples = samples.len(), "audio source ready");
            let source =
                RingSource::new(samples).map_err(|e| LtsError::source_load(path, e.to_string()))?;
            Ok(EngineInput::Audio(source))
        }
        InputSpec::Latent { mu, logvar } => {
            let mu_values = io::read_latent(mu)?;
            let logvar_values = io::read_latent(logvar)?;
            if mu_values.len() != logvar_values.len() {
                return Err(LtsError::source_load(
                    logvar,
                    format!(
                        "{} values do not match the {} values of {}",
                        logvar_values.len(),
                        mu_values.len(),
                        mu.display()
                    ),
                ));
            }
            let pair = LatentPair::new(RingSource::new(mu_values)?, RingSource::new(logvar_values)?)?;
            Ok(EngineInput::LatentPair(pair))
        }
        InputSpec::Live => Ok(EngineInput::Live),
        InputSpec::Interpolation => Ok(EngineInput::Interpolation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::FixedControl;
    use crate::inference::BlendModel;

    #[test]
    fn defaults_validate() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.hop(), 512);
        assert_eq!(config.input_window(), 1024);
        assert_eq!(config.hop_budget_micros(), 10_666);
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        let zero_segment = EngineConfig {
            segment_size: 0,
            ..EngineConfig::default()
        };
        let zero_hop = EngineConfig {
            mode: RenderMode::Windowed { hop_size: 0 },
            ..EngineConfig::default()
        };
        let long_hop = EngineConfig {
            mode: RenderMode::Windowed { hop_size: 2048 },
            ..EngineConfig::default()
        };
        let bad_weight = EngineConfig {
            interpolation: 1.5,
            ..EngineConfig::default()
        };
        for config in [zero_segment, zero_hop, long_hop, bad_weight] {
            assert!(matches!(config.validate(), Err(LtsError::InvalidConfig(_))));
        }
    }

    #[test]
    fn config_json_uses_camel_case_and_defaults() {
        let json = r#"{ "segmentSize": 2048, "mode": { "type": "windowed", "hopSize": 256 } }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.segment_size, 2048);
        assert_eq!(config.hop(), 256);
        assert_eq!(config.latent_dim, 256);
        assert_eq!(config.sample_rate, 48_000);

        let block: RenderMode = serde_json::from_str(r#"{ "type": "block" }"#).unwrap();
        assert_eq!(block, RenderMode::Block);
    }

    #[test]
    fn input_specs_are_tagged_by_kind() {
        let json = r#"[
            { "kind": "audio", "path": "a.wav" },
            { "kind": "latent", "mu": "mu.bin", "logvar": "logvar.bin" },
            { "kind": "live" },
            { "kind": "interpolation" }
        ]"#;
        let specs: Vec<InputSpec> = serde_json::from_str(json).unwrap();
        assert_eq!(
            specs[0],
            InputSpec::Audio {
                path: "a.wav".into()
            }
        );
        assert!(matches!(specs[1], InputSpec::Latent { .. }));
        assert_eq!(specs[2], InputSpec::Live);
        assert_eq!(specs[3], InputSpec::Interpolation);
    }

    #[test]
    fn live_lead_covers_window_and_hop() {
        let short_window = EngineConfig {
            segment_size: 8,
            mode: RenderMode::Windowed { hop_size: 4 },
            input_window: Some(2),
            live_buffer_hops: 1,
            ..EngineConfig::default()
        };
        assert_eq!(short_window.live_lead(), 4);
        // 4 samples cannot hold a lead of 4 plus a 2-sample window
        assert!(matches!(
            short_window.validate_live(),
            Err(LtsError::InvalidConfig(_))
        ));

        let roomy = EngineConfig {
            live_buffer_hops: 2,
            ..short_window
        };
        roomy.validate_live().unwrap();

        let sliding = EngineConfig {
            segment_size: 1,
            mode: RenderMode::Block,
            input_window: Some(5),
            ..EngineConfig::default()
        };
        assert_eq!(sliding.live_lead(), 5);
        sliding.validate_live().unwrap();
    }

    #[test]
    fn interleaved_block_reads_past_input_as_silence() {
        let input = [0.5f32, 0.25];
        let mut output = [0.0f32; 8];
        let mut block = InterleavedBlock::new(&input, 1, &mut output, 2);
        assert_eq!(block.frames(), 4);
        assert_eq!(block.read(1, 0), 0.25);
        assert_eq!(block.read(3, 0), 0.0);
        assert_eq!(block.read(0, 1), 0.0);
        block.write(3, 1, 1.0);
        assert_eq!(output[7], 1.0);
    }

    #[test]
    fn render_writes_every_output_channel() {
        let config = EngineConfig {
            segment_size: 2,
            mode: RenderMode::Block,
            ..EngineConfig::default()
        };
        let source = RingSource::new(vec![1.0, 2.0]).unwrap();
        let mut engine = StreamEngine::from_parts(
            config,
            vec![EngineInput::Audio(source)],
            Box::new(BlendModel::new()),
            Box::new(FixedControl(0.0)),
        )
        .unwrap();

        let mut output = [0.0f32; 6];
        let mut block = InterleavedBlock::output_only(&mut output, 3);
        engine.render(&mut block);
        assert_eq!(output, [1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        assert_eq!(engine.cleanup().samples_rendered, 2);
    }
}
