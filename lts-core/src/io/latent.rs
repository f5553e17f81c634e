//! Headerless latent vector files: a flat array of little-endian IEEE-754
//! f32 values, as dumped by the encoder half of the VAE.

use std::path::Path;

use tracing::debug;

use crate::error::{LtsError, Result};

/// Read a latent file into a flat `Vec<f32>`.
///
/// # Errors
/// `SourceLoad` if the file cannot be read, is empty, or its byte length is
/// not a multiple of 4.
pub fn read_latent(path: &Path) -> Result<Vec<f32>> {
    let bytes = std::fs::read(path).map_err(|e| LtsError::source_load(path, e.to_string()))?;
    if bytes.is_empty() {
        return Err(LtsError::source_load(path, "latent file is empty"));
    }
    if bytes.len() % 4 != 0 {
        return Err(LtsError::source_load(
            path,
            format!("{} bytes is not a whole number of f32 values", bytes.len()),
        ));
    }

    let values: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    debug!(path = %path.display(), values = values.len(), "read latent file");
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lts-latent-{}-{name}", std::process::id()))
    }

    #[test]
    fn reads_little_endian_floats() {
        let path = temp_path("ok.bin");
        let bytes: Vec<u8> = [1.5f32, -2.0, 0.25]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        std::fs::write(&path, bytes).unwrap();

        assert_eq!(read_latent(&path).unwrap(), vec![1.5, -2.0, 0.25]);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn truncated_file_is_rejected() {
        let path = temp_path("short.bin");
        std::fs::write(&path, [0u8; 7]).unwrap();
        assert!(matches!(
            read_latent(&path),
            Err(LtsError::SourceLoad { .. })
        ));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn empty_or_missing_file_is_rejected() {
        let path = temp_path("empty.bin");
        std::fs::write(&path, [0u8; 0]).unwrap();
        assert!(read_latent(&path).is_err());
        assert!(read_latent(Path::new("/no/such/latent.bin")).is_err());
        let _ = std::fs::remove_file(path);
    }
}
