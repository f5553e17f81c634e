//! `lts`: command-line host for the latent timbre streaming engine.
//!
//! ```text
//! lts [--settings <file>]                      play through the output device
//! lts --render <out.wav> [--seconds <n>]       render offline to a WAV file
//!     [--live-input <in.wav>]                  (feeds the live input offline)
//! lts --list-devices
//! lts --write-settings                         write defaults and exit
//! ```
//!
//! While playing, typing a number in [0, 1] followed by Enter sets the
//! interpolation weight.

mod settings;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use lts_core::{
    audio::device, io, AudioHost, BlendModel, EngineStatus, HostOptions, InferenceBackend,
    OrtModel, OrtModelConfig, PassthroughModel, RenderStatsEvent, SharedControl, StreamEngine,
    WindowedPassthrough,
};
use tracing::{error, info, warn};

use crate::settings::{default_settings_path, load_settings, save_settings, AppSettings};

#[derive(Debug, Default)]
struct Args {
    settings: Option<PathBuf>,
    render: Option<PathBuf>,
    live_input: Option<PathBuf>,
    seconds: Option<f64>,
    list_devices: bool,
    write_settings: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = |name: &str| {
            it.next()
                .with_context(|| format!("missing value for {name}"))
        };
        match arg.as_str() {
            "--settings" => args.settings = Some(value("--settings")?.into()),
            "--render" => args.render = Some(value("--render")?.into()),
            "--live-input" => args.live_input = Some(value("--live-input")?.into()),
            "--seconds" => {
                let secs: f64 = value("--seconds")?
                    .parse()
                    .context("invalid value for --seconds")?;
                if secs.is_nan() || secs <= 0.0 {
                    bail!("--seconds must be positive");
                }
                args.seconds = Some(secs);
            }
            "--list-devices" => args.list_devices = true,
            "--write-settings" => args.write_settings = true,
            "--help" | "-h" => {
                println!(
                    "Usage: lts [--settings <file>] [--render <out.wav> [--seconds <n>] \
                     [--live-input <in.wav>]] [--list-devices] [--write-settings]"
                );
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

fn build_backend(settings: &AppSettings) -> anyhow::Result<Box<dyn InferenceBackend>> {
    let engine = &settings.engine;
    Ok(match settings.backend.as_str() {
        "onnx" => {
            let path = settings
                .model_path
                .clone()
                .context("backend 'onnx' needs modelPath in settings")?;
            Box::new(OrtModel::new(OrtModelConfig {
                model_path: path,
                session_id: settings.session_id.clone(),
                intra_threads: settings.intra_threads,
            }))
        }
        "blend" => Box::new(BlendModel::new()),
        "passthrough" => Box::new(PassthroughModel::new()),
        "windowed" => Box::new(WindowedPassthrough::new(engine.segment_size, engine.hop())?),
        other => bail!("unknown backend '{other}'"),
    })
}

fn build_engine(settings: &AppSettings, control: &SharedControl) -> anyhow::Result<StreamEngine> {
    let backend = build_backend(settings)?;
    let engine = StreamEngine::setup(
        settings.engine.clone(),
        &settings.inputs,
        backend,
        Box::new(control.clone()),
    )?;
    Ok(engine)
}

fn render_to_file(
    settings: &AppSettings,
    control: &SharedControl,
    out: &Path,
    seconds: f64,
    live_input: Option<&Path>,
) -> anyhow::Result<()> {
    let mut engine = build_engine(settings, control)?;
    let rate = settings.engine.sample_rate;
    let frames = (seconds * rate as f64).round() as usize;

    let live = match live_input {
        Some(path) => {
            let chunk = io::load_mono(path)?;
            if chunk.sample_rate != rate {
                warn!(
                    from = chunk.sample_rate,
                    to = rate,
                    "live input file rate differs from engine rate; converting"
                );
                lts_core::audio::resample::RateConverter::convert_all(
                    &chunk.samples,
                    chunk.sample_rate,
                    rate,
                )?
            } else {
                chunk.samples
            }
        }
        None => {
            if engine.has_live_input() {
                warn!("engine has a live input but no --live-input file; feeding silence");
            }
            Vec::new()
        }
    };

    info!(frames, path = %out.display(), "rendering offline");
    let samples = engine.render_offline(frames, Some(live.as_slice()));
    io::write_mono(out, &samples, rate)?;

    let snapshot = engine.cleanup();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Read interpolation values from stdin until EOF.
fn spawn_control_reader(control: SharedControl) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim().parse::<f32>() {
                Ok(v) if (0.0..=1.0).contains(&v) => {
                    control.set(v);
                    info!(interpolation = v, "interpolation updated");
                }
                _ => warn!("expected a number in [0, 1], got '{}'", line.trim()),
            }
        }
    });
}

async fn play(
    settings: &AppSettings,
    control: SharedControl,
    seconds: Option<f64>,
) -> anyhow::Result<()> {
    let engine = build_engine(settings, &control)?;
    let budget = settings.engine.hop_budget_micros();

    let host = AudioHost::start(
        engine,
        &HostOptions {
            output_device: settings.output_device.clone(),
            input_device: settings.input_device.clone(),
        },
    )?;

    let events = host.status_events();
    std::thread::spawn(move || {
        for event in events.iter() {
            match event.status {
                EngineStatus::Error => error!(detail = ?event.detail, "audio host error"),
                status => info!(?status, "audio host status"),
            }
        }
    });
    spawn_control_reader(control);

    println!("Playing. Type an interpolation value in [0, 1] and press Enter; Ctrl+C stops.");

    let interval_secs = settings.stats_interval_secs;
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    ticker.tick().await;
    let deadline = async {
        match seconds {
            Some(s) => tokio::time::sleep(Duration::from_secs_f64(s)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut seq = 0u64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received");
                break;
            }
            _ = &mut deadline => break,
            _ = ticker.tick() => {
                if host.status() == EngineStatus::Error {
                    bail!("audio stream failed");
                }
                if interval_secs > 0 {
                    seq += 1;
                    let stats = RenderStatsEvent::from_snapshot(seq, &host.diagnostics(), budget);
                    info!("{}", serde_json::to_string(&stats)?);
                }
            }
        }
    }

    let snapshot = host.stop();
    let stats = RenderStatsEvent::from_snapshot(seq + 1, &snapshot, budget);
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lts=info,lts_core=info")),
        )
        .init();

    let args = parse_args()?;

    if args.list_devices {
        println!("outputs:");
        for d in device::list_output_devices() {
            println!("  {}{}", d.name, if d.is_default { " (default)" } else { "" });
        }
        println!("inputs:");
        for d in device::list_input_devices() {
            let mut tags = Vec::new();
            if d.is_default {
                tags.push("default");
            }
            if d.is_loopback_like {
                tags.push("loopback?");
            }
            println!("  {} {}", d.name, tags.join(" "));
        }
        return Ok(());
    }

    let settings_path = args.settings.clone().unwrap_or_else(default_settings_path);
    if args.write_settings {
        save_settings(&settings_path, &AppSettings::default())
            .with_context(|| format!("writing {}", settings_path.display()))?;
        println!("Wrote default settings: {}", settings_path.display());
        return Ok(());
    }

    let settings = load_settings(&settings_path)?;
    info!(
        path = %settings_path.display(),
        backend = settings.backend.as_str(),
        inputs = settings.inputs.len(),
        "lts starting"
    );
    let control = SharedControl::new(settings.engine.interpolation);

    match &args.render {
        Some(out) => {
            let seconds = args.seconds.unwrap_or(10.0);
            render_to_file(&settings, &control, out, seconds, args.live_input.as_deref())
        }
        None => play(&settings, control, args.seconds).await,
    }
}
