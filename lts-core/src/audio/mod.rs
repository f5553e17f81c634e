//! Real-time host over the cpal backend.
//!
//! # Design constraints
//!
//! Both cpal callbacks run on OS audio threads at elevated priority. They
//! **must not** block on a mutex, perform I/O, or allocate after their
//! first invocation.
//!
//! - The **output** callback owns the `StreamEngine` and calls `render` once
//!   per device buffer.
//! - The optional **input** callback (only opened when the engine has a live
//!   input) downmixes to mono and pushes into an SPSC ring. The output
//!   callback pops one sample per frame; an underrun reads as silence.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). `AudioHost` must be created and dropped on the same thread.

pub mod device;
pub mod resample;

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Producer};
use tracing::{info, warn};

#[cfg(feature = "audio-cpal")]
use tracing::error;

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, SampleRate, Stream, StreamConfig,
};

use crate::{
    engine::{DiagnosticsSnapshot, EngineDiagnostics, InterleavedBlock, StreamEngine},
    error::{LtsError, Result},
    ipc::events::{EngineStatus, EngineStatusEvent},
};

#[cfg(feature = "audio-cpal")]
use crate::buffering::{create_live_ring, LiveProducer};

/// Scratch size for callbacks when the device does not report a fixed
/// buffer size. Larger device buffers are processed in pieces.
pub const CALLBACK_SCRATCH_FRAMES: usize = 4096;

/// Device preferences for [`AudioHost::start`].
#[derive(Debug, Clone, Default)]
pub struct HostOptions {
    /// Output device name; `None` uses the default output device.
    pub output_device: Option<String>,
    /// Input device name for live input; `None` uses the default input.
    pub input_device: Option<String>,
}

/// Status shared between the host handle and the stream error callbacks.
#[derive(Clone)]
struct StatusCell {
    status: Arc<Mutex<EngineStatus>>,
    tx: Sender<EngineStatusEvent>,
}

impl StatusCell {
    fn set(&self, status: EngineStatus, detail: Option<String>) {
        *self.status.lock() = status;
        let _ = self.tx.send(EngineStatusEvent { status, detail });
    }
}

/// Handle to running output (and optional input) streams.
///
/// **Not `Send`**. Dropping it stops playback.
pub struct AudioHost {
    #[cfg(feature = "audio-cpal")]
    _output: Stream,
    #[cfg(feature = "audio-cpal")]
    _input: Option<Stream>,
    running: Arc<AtomicBool>,
    cell: StatusCell,
    status_rx: Receiver<EngineStatusEvent>,
    diagnostics: Arc<EngineDiagnostics>,
    dropped_live: Arc<AtomicUsize>,
    /// Actual output sample rate reported by the device (Hz).
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioHost {
    /// Move `engine` into an output stream and start playing.
    ///
    /// # Errors
    /// - `NoDefaultOutputDevice` when no output device exists.
    /// - `AudioDevice` / `AudioStream` when cpal fails to open or build a stream.
    #[cfg(feature = "audio-cpal")]
    pub fn start(engine: StreamEngine, options: &HostOptions) -> Result<Self> {
        let (tx, status_rx) = crossbeam_channel::unbounded();
        let cell = StatusCell {
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            tx,
        };
        cell.set(EngineStatus::Loading, None);

        match Self::open(engine, options, cell.clone(), status_rx.clone()) {
            Ok(host) => {
                host.cell.set(EngineStatus::Running, None);
                Ok(host)
            }
            Err(e) => {
                cell.set(EngineStatus::Error, Some(e.to_string()));
                Err(e)
            }
        }
    }

    #[cfg(feature = "audio-cpal")]
    fn open(
        mut engine: StreamEngine,
        options: &HostOptions,
        cell: StatusCell,
        status_rx: Receiver<EngineStatusEvent>,
    ) -> Result<Self> {
        let host = cpal::default_host();
        let engine_rate = engine.config().sample_rate;
        let diagnostics = engine.diagnostics();
        let running = Arc::new(AtomicBool::new(true));

        let device = device::select_output(&host, options.output_device.as_deref())?;
        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening output device"
        );
        let config = output_config(&device, engine_rate)?;
        let channels = config.channels;
        let sample_rate = config.sample_rate.0;
        if sample_rate != engine_rate {
            warn!(
                device_rate = sample_rate,
                engine_rate, "output device does not support the engine rate; pitch will shift"
            );
        }
        info!(sample_rate, channels, "output config selected");

        let scratch_frames = match config.buffer_size {
            cpal::BufferSize::Fixed(n) => (n as usize).max(1),
            cpal::BufferSize::Default => CALLBACK_SCRATCH_FRAMES,
        };
        let dropped_live = Arc::new(AtomicUsize::new(0));

        let (input, mut consumer) = if engine.has_live_input() {
            let (producer, consumer) = create_live_ring();
            let stream = open_input(
                &host,
                options.input_device.as_deref(),
                sample_rate,
                InputTap {
                    producer,
                    scratch_frames,
                    dropped: Arc::clone(&dropped_live),
                },
                Arc::clone(&running),
                cell.clone(),
            )?;
            (Some(stream), Some(consumer))
        } else {
            (None, None)
        };

        let running_out = Arc::clone(&running);
        let error_cell = cell.clone();
        let ch = usize::from(channels.max(1));
        let mut live_buf = vec![0.0f32; scratch_frames];

        let output = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _info| {
                    if !running_out.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    render_output(&mut engine, consumer.as_mut(), &mut live_buf, data, ch);
                },
                move |err| {
                    error!("output stream error: {err}");
                    error_cell.set(EngineStatus::Error, Some(err.to_string()));
                },
                None,
            )
            .map_err(|e| LtsError::AudioStream(e.to_string()))?;

        output
            .play()
            .map_err(|e| LtsError::AudioStream(e.to_string()))?;

        Ok(Self {
            _output: output,
            _input: input,
            running,
            cell,
            status_rx,
            diagnostics,
            dropped_live,
            sample_rate,
            channels,
        })
    }

    /// Stub when the `audio-cpal` feature is disabled.
    #[cfg(not(feature = "audio-cpal"))]
    pub fn start(_engine: StreamEngine, _options: &HostOptions) -> Result<Self> {
        Err(LtsError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }

    /// Current host status (snapshot).
    pub fn status(&self) -> EngineStatus {
        *self.cell.status.lock()
    }

    /// Receiver for status change events. Every clone sees every event only
    /// once, so hand it to a single consumer.
    pub fn status_events(&self) -> Receiver<EngineStatusEvent> {
        self.status_rx.clone()
    }

    /// Live engine counters.
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Live input frames lost because the handoff ring was full.
    pub fn dropped_live_frames(&self) -> usize {
        self.dropped_live.load(Ordering::Relaxed)
    }

    /// Silence the callbacks, drop the streams, and report.
    pub fn stop(self) -> DiagnosticsSnapshot {
        self.running.store(false, Ordering::Release);
        self.cell.set(EngineStatus::Stopped, None);
        let dropped = self.dropped_live_frames();
        if dropped > 0 {
            warn!(dropped, "live input frames dropped on a full handoff ring");
        }
        let snapshot = self.diagnostics.snapshot();
        info!(
            samples = snapshot.samples_rendered,
            refills = snapshot.refills,
            errors = snapshot.inference_errors,
            "audio host stopped"
        );
        snapshot
    }
}

/// F32 output config at `rate` when the device supports it, otherwise the
/// device default.
#[cfg(feature = "audio-cpal")]
fn output_config(device: &cpal::Device, rate: u32) -> Result<StreamConfig> {
    let ranges = device
        .supported_output_configs()
        .map_err(|e| LtsError::AudioDevice(e.to_string()))?;
    for range in ranges {
        if range.sample_format() == SampleFormat::F32
            && range.min_sample_rate().0 <= rate
            && rate <= range.max_sample_rate().0
        {
            return Ok(range.with_sample_rate(SampleRate(rate)).config());
        }
    }

    let default = device
        .default_output_config()
        .map_err(|e| LtsError::AudioDevice(e.to_string()))?;
    if default.sample_format() != SampleFormat::F32 {
        return Err(LtsError::AudioStream(format!(
            "unsupported output sample format: {:?}",
            default.sample_format()
        )));
    }
    Ok(default.config())
}

/// Open the live input stream, downmixing every supported format to mono
/// f32 and pushing into `producer`.
#[cfg(feature = "audio-cpal")]
fn open_input(
    host: &cpal::Host,
    preferred: Option<&str>,
    sample_rate: u32,
    tap: InputTap,
    running: Arc<AtomicBool>,
    cell: StatusCell,
) -> Result<Stream> {
    let device = device::select_input(host, preferred)?;
    let name = device.name().unwrap_or_default();
    if device::is_loopback_like_name(&name) {
        warn!(device = name.as_str(), "live input looks like a loopback device");
    }
    info!(device = name.as_str(), "opening input device");

    let supported = device
        .default_input_config()
        .map_err(|e| LtsError::AudioDevice(e.to_string()))?;
    let channels = supported.channels();
    if supported.sample_rate().0 != sample_rate {
        warn!(
            input_rate = supported.sample_rate().0,
            sample_rate, "requesting output rate on the input device"
        );
    }
    let config = StreamConfig {
        channels,
        sample_rate: SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let ch = usize::from(channels.max(1));

    let InputTap {
        mut producer,
        scratch_frames,
        dropped,
    } = tap;
    let mut mix_buf = vec![0.0f32; scratch_frames.max(1)];
    let mut push_mono = move |frames: usize, sample: &dyn Fn(usize) -> f32| {
        let lost = push_downmixed(&mut producer, &mut mix_buf, frames, ch, sample);
        if lost > 0 {
            dropped.fetch_add(lost, Ordering::Relaxed);
        }
    };

    let on_error = move |err: cpal::StreamError| {
        error!("input stream error: {err}");
        cell.set(EngineStatus::Error, Some(err.to_string()));
    };

    let stream = match supported.sample_format() {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _info| {
                if running.load(Ordering::Relaxed) {
                    push_mono(data.len() / ch, &|i| data[i]);
                }
            },
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _info| {
                if running.load(Ordering::Relaxed) {
                    push_mono(data.len() / ch, &|i| data[i] as f32 / 32768.0);
                }
            },
            on_error,
            None,
        ),
        SampleFormat::U8 => device.build_input_stream(
            &config,
            move |data: &[u8], _info| {
                if running.load(Ordering::Relaxed) {
                    push_mono(data.len() / ch, &|i| (data[i] as f32 - 128.0) / 128.0);
                }
            },
            on_error,
            None,
        ),
        fmt => {
            return Err(LtsError::AudioStream(format!(
                "unsupported input sample format: {fmt:?}"
            )))
        }
    }
    .map_err(|e| LtsError::AudioStream(e.to_string()))?;

    stream
        .play()
        .map_err(|e| LtsError::AudioStream(e.to_string()))?;
    Ok(stream)
}

/// What the capture callback needs to feed the live handoff ring.
#[cfg(feature = "audio-cpal")]
struct InputTap {
    producer: LiveProducer,
    scratch_frames: usize,
    dropped: Arc<AtomicUsize>,
}

/// Render one interleaved device buffer. Live samples are popped from
/// `live` into `live_buf`, an underrun reads as silence. Buffers longer
/// than `live_buf` are rendered in pieces, so nothing here allocates.
#[cfg_attr(not(feature = "audio-cpal"), allow(dead_code))]
fn render_output<C: Consumer<Item = f32>>(
    engine: &mut StreamEngine,
    mut live: Option<&mut C>,
    live_buf: &mut [f32],
    data: &mut [f32],
    channels: usize,
) {
    debug_assert!(!live_buf.is_empty());
    let channels = channels.max(1);
    let step = live_buf.len().max(1) * channels;
    for piece in data.chunks_mut(step) {
        let frames = piece.len() / channels;
        let live_in: &[f32] = match live.as_mut() {
            Some(consumer) => {
                let got = consumer.pop_slice(&mut live_buf[..frames]);
                live_buf[got..frames].fill(0.0);
                &live_buf[..frames]
            }
            None => &[],
        };
        let mut block = InterleavedBlock::new(live_in, 1, piece, channels);
        engine.render(&mut block);
    }
}

/// Downmix `frames` interleaved frames to mono and push them through
/// `mix_buf`. Returns how many frames did not fit in the ring.
#[cfg_attr(not(feature = "audio-cpal"), allow(dead_code))]
fn push_downmixed<P: Producer<Item = f32>>(
    producer: &mut P,
    mix_buf: &mut [f32],
    frames: usize,
    channels: usize,
    sample: &dyn Fn(usize) -> f32,
) -> usize {
    if mix_buf.is_empty() {
        return frames;
    }
    let channels = channels.max(1);
    let mut lost = 0;
    let mut start = 0;
    while start < frames {
        let n = (frames - start).min(mix_buf.len());
        for (f, out) in mix_buf[..n].iter_mut().enumerate() {
            let base = (start + f) * channels;
            let sum: f32 = (0..channels).map(|c| sample(base + c)).sum();
            *out = sum / channels as f32;
        }
        lost += n - producer.push_slice(&mix_buf[..n]);
        start += n;
    }
    lost
}

#[cfg(test)]
mod tests {
    use ringbuf::{traits::Split, HeapRb};

    use super::*;
    use crate::control::FixedControl;
    use crate::engine::{EngineConfig, EngineInput, RenderMode};
    use crate::inference::PassthroughModel;

    fn live_engine(segment: usize) -> StreamEngine {
        let config = EngineConfig {
            segment_size: segment,
            mode: RenderMode::Block,
            ..EngineConfig::default()
        };
        StreamEngine::from_parts(
            config,
            vec![EngineInput::Live],
            Box::new(PassthroughModel::new()),
            Box::new(FixedControl(0.5)),
        )
        .unwrap()
    }

    #[test]
    fn long_device_buffer_renders_in_pieces() {
        let mut engine = live_engine(2);
        let (mut prod, mut cons) = HeapRb::<f32>::new(64).split();
        let input: Vec<f32> = (1..=10).map(|i| i as f32).collect();
        assert_eq!(prod.push_slice(&input), 10);

        // 10 stereo frames through a 3-frame scratch buffer
        let mut live_buf = [0.0f32; 3];
        let mut data = [0.0f32; 20];
        render_output(&mut engine, Some(&mut cons), &mut live_buf, &mut data, 2);

        assert_eq!(&data[..4], &[0.0; 4]);
        for t in 2..10 {
            assert_eq!(data[2 * t], input[t - 2]);
            assert_eq!(data[2 * t + 1], input[t - 2]);
        }

        // ring is drained: the next samples captured are silence
        let mut data = [1.0f32; 8];
        render_output(&mut engine, Some(&mut cons), &mut live_buf, &mut data, 2);
        assert_eq!(data, [9.0, 9.0, 10.0, 10.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(engine.cleanup().live_samples_captured, 14);
    }

    #[test]
    fn downmix_counts_frames_the_ring_cannot_take() {
        let (mut prod, mut cons) = HeapRb::<f32>::new(4).split();
        // frame f: left f, right f + 2
        let interleaved: Vec<f32> = (0..6).flat_map(|f| [f as f32, f as f32 + 2.0]).collect();
        let mut mix_buf = [0.0f32; 4];

        let lost = push_downmixed(&mut prod, &mut mix_buf, 6, 2, &|i| interleaved[i]);
        assert_eq!(lost, 2);

        let mut got = [0.0f32; 4];
        assert_eq!(cons.pop_slice(&mut got), 4);
        assert_eq!(got, [1.0, 2.0, 3.0, 4.0]);
    }
}
