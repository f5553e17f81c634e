use std::path::Path;

use tracing::debug;

use crate::buffering::AudioChunk;
use crate::error::{LtsError, Result};

/// Decode a WAV file to normalized mono f32.
///
/// Float files are taken as-is; integer files are scaled by the largest
/// positive value of their bit depth. Multi-channel files are averaged down.
pub fn load_mono(path: &Path) -> Result<AudioChunk> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| LtsError::source_load(path, e.to_string()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        hound::SampleFormat::Int => {
            if spec.bits_per_sample <= 16 {
                reader
                    .samples::<i16>()
                    .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
                    .collect::<std::result::Result<Vec<_>, _>>()
            } else {
                let max = ((1_i64 << (spec.bits_per_sample - 1)) - 1) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max))
                    .collect::<std::result::Result<Vec<_>, _>>()
            }
        }
    }
    .map_err(|e| LtsError::source_load(path, e.to_string()))?;

    if interleaved.is_empty() {
        return Err(LtsError::source_load(path, "file contains no samples"));
    }

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    debug!(
        path = %path.display(),
        channels,
        sample_rate = spec.sample_rate,
        frames = samples.len(),
        "decoded wav"
    );
    Ok(AudioChunk::new(samples, spec.sample_rate))
}

/// Write mono f32 samples as a 32-bit float WAV.
pub fn write_mono(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| LtsError::Other(anyhow::anyhow!("create {}: {e}", path.display())))?;
    for s in samples {
        writer
            .write_sample(*s)
            .map_err(|e| LtsError::Other(anyhow::anyhow!("write {}: {e}", path.display())))?;
    }
    writer
        .finalize()
        .map_err(|e| LtsError::Other(anyhow::anyhow!("finalize {}: {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lts-wav-{}-{name}", std::process::id()))
    }

    #[test]
    fn stereo_int16_is_downmixed_and_normalized() {
        let path = temp_path("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for (l, r) in [(i16::MAX, 0), (0, 0), (-i16::MAX, -i16::MAX)] {
            writer.write_sample(l).unwrap();
            writer.write_sample(r).unwrap();
        }
        writer.finalize().unwrap();

        let chunk = load_mono(&path).unwrap();
        assert_eq!(chunk.sample_rate, 44_100);
        assert_eq!(chunk.samples.len(), 3);
        assert_abs_diff_eq!(chunk.samples[0], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(chunk.samples[1], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(chunk.samples[2], -1.0, epsilon = 1e-6);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn float_output_reads_back() {
        let path = temp_path("float.wav");
        write_mono(&path, &[0.1, -0.2, 0.3], 48_000).unwrap();
        let chunk = load_mono(&path).unwrap();
        assert_eq!(chunk.samples, vec![0.1, -0.2, 0.3]);
        assert_eq!(chunk.sample_rate, 48_000);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_and_empty_files_fail() {
        let missing = load_mono(Path::new("/no/such/file.wav")).unwrap_err();
        assert!(matches!(missing, LtsError::SourceLoad { .. }));

        let path = temp_path("empty.wav");
        write_mono(&path, &[], 48_000).unwrap();
        let empty = load_mono(&path).unwrap_err();
        assert!(matches!(empty, LtsError::SourceLoad { .. }));
        let _ = std::fs::remove_file(path);
    }
}
