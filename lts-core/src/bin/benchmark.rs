fn main() {
    if let Err(e) = run() {
        eprintln!("benchmark failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    use lts_core::{
        engine::{EngineInput, LatentPair},
        BlendModel, EngineConfig, FixedControl, InferenceBackend, InterleavedBlock, RenderMode,
        RingSource, StreamEngine, WindowedPassthrough,
    };
    use serde::Serialize;
    use std::path::PathBuf;
    use std::time::Instant;

    #[derive(Debug)]
    struct Args {
        backend: String,
        model: Option<PathBuf>,
        seconds: f64,
        segment: usize,
        hop: Option<usize>,
        block: usize,
        latent: bool,
        output: Option<PathBuf>,
    }

    #[derive(Debug, Clone, Serialize)]
    struct Summary {
        backend: String,
        segment_size: usize,
        hop_size: usize,
        block_frames: usize,
        sample_rate: u32,
        seconds: f64,
        samples_rendered: usize,
        refills: usize,
        inference_errors: usize,
        hop_budget_us: u64,
        avg_us_per_refill: f64,
        max_refill_us: u64,
        slow_refills: usize,
        p50_block_us: f64,
        p95_block_us: f64,
        realtime_factor: f64,
    }

    fn parse_args() -> Result<Args, String> {
        let mut args = Args {
            backend: "blend".into(),
            model: None,
            seconds: 10.0,
            segment: 1024,
            hop: Some(512),
            block: 256,
            latent: false,
            output: None,
        };

        let mut it = std::env::args().skip(1);
        while let Some(arg) = it.next() {
            let mut value = |name: &str| it.next().ok_or(format!("missing value for {name}"));
            match arg.as_str() {
                "--backend" => args.backend = value("--backend")?,
                "--model" => args.model = Some(PathBuf::from(value("--model")?)),
                "--seconds" => {
                    args.seconds = value("--seconds")?
                        .parse::<f64>()
                        .map_err(|_| "invalid value for --seconds".to_string())?
                        .clamp(0.1, 600.0);
                }
                "--segment" => {
                    args.segment = value("--segment")?
                        .parse()
                        .map_err(|_| "invalid value for --segment".to_string())?;
                }
                "--hop" => {
                    args.hop = Some(
                        value("--hop")?
                            .parse()
                            .map_err(|_| "invalid value for --hop".to_string())?,
                    );
                }
                "--block-mode" => args.hop = None,
                "--frames" => {
                    args.block = value("--frames")?
                        .parse::<usize>()
                        .map_err(|_| "invalid value for --frames".to_string())?
                        .max(1);
                }
                "--latent" => args.latent = true,
                "--output" => args.output = Some(PathBuf::from(value("--output")?)),
                "--help" | "-h" => {
                    println!(
                        "Usage: cargo run -p lts-core --bin benchmark -- \\
  [--backend blend|windowed|onnx] [--model <file.onnx>] [--seconds <n>] \\
  [--segment <n>] [--hop <n> | --block-mode] [--frames <n>] [--latent] [--output <file.json>]"
                    );
                    std::process::exit(0);
                }
                other => return Err(format!("unknown argument: {other}")),
            }
        }
        Ok(args)
    }

    fn percentile(values: &[f64], p: f64) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let idx = ((sorted.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    fn sine(len: usize, cycles: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (std::f32::consts::TAU * cycles * i as f32 / len as f32).sin() * 0.5)
            .collect()
    }

    let args = parse_args()?;
    let config = EngineConfig {
        segment_size: args.segment,
        mode: match args.hop {
            Some(hop_size) => RenderMode::Windowed { hop_size },
            None => RenderMode::Block,
        },
        ..EngineConfig::default()
    };
    config.validate().map_err(|e| e.to_string())?;
    let hop = config.hop();

    let backend: Box<dyn InferenceBackend> = match args.backend.as_str() {
        "blend" => Box::new(BlendModel::new()),
        "windowed" => Box::new(WindowedPassthrough::new(args.segment, hop).map_err(|e| e.to_string())?),
        #[cfg(feature = "onnx")]
        "onnx" => {
            let path = args
                .model
                .clone()
                .ok_or("--backend onnx needs --model <file.onnx>")?;
            Box::new(lts_core::OrtModel::new(lts_core::OrtModelConfig::new(path)))
        }
        #[cfg(not(feature = "onnx"))]
        "onnx" => {
            let _ = &args.model;
            return Err("the onnx backend needs --features onnx".into());
        }
        other => return Err(format!("unknown backend: {other}")),
    };

    // two seconds of synthetic material per source, looped by the ring
    let source_len = (config.sample_rate as usize * 2).max(config.input_window());
    let mut inputs = vec![
        EngineInput::Audio(RingSource::new(sine(source_len, 220.0)).map_err(|e| e.to_string())?),
        EngineInput::Audio(RingSource::new(sine(source_len, 330.0)).map_err(|e| e.to_string())?),
    ];
    if args.latent {
        let dim = config.latent_dim;
        let pair = LatentPair::new(
            RingSource::new(sine(dim * 64, 3.0)).map_err(|e| e.to_string())?,
            RingSource::new(vec![0.0; dim * 64]).map_err(|e| e.to_string())?,
        )
        .map_err(|e| e.to_string())?;
        inputs.push(EngineInput::LatentPair(pair));
    }
    inputs.push(EngineInput::Interpolation);

    let backend_name = backend.name().to_string();
    let mut engine = StreamEngine::from_parts(
        config.clone(),
        inputs,
        backend,
        Box::new(FixedControl(config.interpolation)),
    )
    .map_err(|e| e.to_string())?;

    println!(
        "Running lts benchmark: backend={backend_name} segment={} hop={hop} seconds={}",
        args.segment, args.seconds
    );

    let total_frames = (args.seconds * config.sample_rate as f64) as usize;
    let mut out = vec![0.0f32; args.block];
    let mut block_us = Vec::with_capacity(total_frames / args.block + 1);
    let started = Instant::now();
    let mut rendered = 0usize;
    while rendered < total_frames {
        let frames = args.block.min(total_frames - rendered);
        let t = Instant::now();
        let mut block = InterleavedBlock::output_only(&mut out[..frames], 1);
        engine.render(&mut block);
        block_us.push(t.elapsed().as_secs_f64() * 1e6);
        rendered += frames;
    }
    let wall = started.elapsed().as_secs_f64();

    let snapshot = engine.cleanup();
    let summary = Summary {
        backend: backend_name,
        segment_size: args.segment,
        hop_size: hop,
        block_frames: args.block,
        sample_rate: config.sample_rate,
        seconds: args.seconds,
        samples_rendered: snapshot.samples_rendered,
        refills: snapshot.refills,
        inference_errors: snapshot.inference_errors,
        hop_budget_us: config.hop_budget_micros(),
        avg_us_per_refill: if snapshot.refills == 0 {
            0.0
        } else {
            block_us.iter().sum::<f64>() / snapshot.refills as f64
        },
        max_refill_us: snapshot.max_refill_micros,
        slow_refills: snapshot.slow_refills,
        p50_block_us: percentile(&block_us, 0.50),
        p95_block_us: percentile(&block_us, 0.95),
        realtime_factor: if wall > 0.0 { args.seconds / wall } else { 0.0 },
    };

    println!(
        "Done. refills={} avg={:.1}us max={}us budget={}us slow={} realtime={:.1}x",
        summary.refills,
        summary.avg_us_per_refill,
        summary.max_refill_us,
        summary.hop_budget_us,
        summary.slow_refills,
        summary.realtime_factor
    );

    let json = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
    if let Some(out) = args.output {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(&out, json).map_err(|e| e.to_string())?;
        println!("Wrote benchmark report: {}", out.display());
    } else {
        println!("{json}");
    }

    Ok(())
}
