//! Persistent application settings (JSON file in the app data directory).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use lts_core::{control::clamp_unit, EngineConfig, InputSpec};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub engine: EngineConfig,
    /// Model arguments, in the order the model expects them.
    pub inputs: Vec<InputSpec>,
    /// `onnx`, `blend`, `passthrough` or `windowed`.
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub session_id: String,
    pub intra_threads: usize,
    pub output_device: Option<String>,
    pub input_device: Option<String>,
    /// Seconds between stats lines while playing; 0 disables them.
    pub stats_interval_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            inputs: vec![
                InputSpec::Audio {
                    path: "source1.wav".into(),
                },
                InputSpec::Audio {
                    path: "source2.wav".into(),
                },
                InputSpec::Interpolation,
            ],
            backend: "onnx".into(),
            model_path: Some("model.onnx".into()),
            session_id: "session1".into(),
            intra_threads: 1,
            output_device: None,
            input_device: None,
            stats_interval_secs: 5,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.backend = normalize_backend(&self.backend);
        self.session_id = {
            let trimmed = self.session_id.trim();
            if trimmed.is_empty() {
                "session1".into()
            } else {
                trimmed.to_string()
            }
        };
        self.intra_threads = self.intra_threads.clamp(1, 16);
        self.stats_interval_secs = self.stats_interval_secs.min(3600);
        self.engine.interpolation = clamp_unit(self.engine.interpolation);
        self.output_device = trim_name(self.output_device.take());
        self.input_device = trim_name(self.input_device.take());
        self.model_path = self
            .model_path
            .take()
            .filter(|p| !p.as_os_str().is_empty());
    }
}

fn trim_name(raw: Option<String>) -> Option<String> {
    raw.map(|d| d.trim().to_string()).filter(|d| !d.is_empty())
}

pub fn normalize_backend(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "ort" | "onnxruntime" | "onnx" => "onnx".into(),
        "average" | "mix" | "blend" => "blend".into(),
        "dry" | "bypass" | "passthrough" => "passthrough".into(),
        "hann" | "ola" | "windowed" => "windowed".into(),
        other => other.into(),
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lts")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("lts")
            .join("settings.json")
    }
}

/// Missing file: defaults. Unreadable or malformed file: error, since
/// silently playing a different configuration is worse than not starting.
pub fn load_settings(path: &Path) -> anyhow::Result<AppSettings> {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<AppSettings>(&raw)
            .with_context(|| format!("parsing settings {}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no settings file; using defaults");
            AppSettings::default()
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading settings {}", path.display()));
        }
    };
    settings.normalize();
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_clamps_and_trims() {
        let mut settings = AppSettings {
            backend: " ORT ".into(),
            session_id: "  ".into(),
            intra_threads: 0,
            output_device: Some("   ".into()),
            input_device: Some(" Interface In ".into()),
            ..AppSettings::default()
        };
        settings.engine.interpolation = 3.0;
        settings.normalize();

        assert_eq!(settings.backend, "onnx");
        assert_eq!(settings.session_id, "session1");
        assert_eq!(settings.intra_threads, 1);
        assert_eq!(settings.output_device, None);
        assert_eq!(settings.input_device.as_deref(), Some("Interface In"));
        assert_eq!(settings.engine.interpolation, 1.0);
    }

    #[test]
    fn interpolation_follows_the_engine_clamp() {
        for (raw, expected) in [(f32::NAN, 0.0), (-2.0, 0.0), (0.3, 0.3), (9.0, 1.0)] {
            let mut settings = AppSettings::default();
            settings.engine.interpolation = raw;
            settings.normalize();
            assert_eq!(settings.engine.interpolation, expected);
            assert_eq!(settings.engine.interpolation, clamp_unit(raw));
        }
    }

    #[test]
    fn partial_json_fills_defaults() {
        let raw = r#"{
            "backend": "blend",
            "engine": { "segmentSize": 4096, "mode": { "type": "block" } },
            "inputs": [ { "kind": "live" } ]
        }"#;
        let settings: AppSettings = serde_json::from_str(raw).unwrap();
        assert_eq!(settings.engine.segment_size, 4096);
        assert_eq!(settings.engine.hop(), 4096);
        assert_eq!(settings.inputs, vec![InputSpec::Live]);
        assert_eq!(settings.intra_threads, 1);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let path = std::env::temp_dir()
            .join(format!("lts-settings-{}", std::process::id()))
            .join("settings.json");
        let settings = AppSettings {
            backend: "windowed".into(),
            stats_interval_secs: 2,
            ..AppSettings::default()
        };
        save_settings(&path, &settings).unwrap();

        let loaded = load_settings(&path).unwrap();
        assert_eq!(loaded.backend, "windowed");
        assert_eq!(loaded.stats_interval_secs, 2);
        assert_eq!(loaded.inputs, settings.inputs);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_file_gives_defaults_but_bad_json_fails() {
        let missing = load_settings(Path::new("/no/such/lts/settings.json")).unwrap();
        assert_eq!(missing.backend, "onnx");

        let path = std::env::temp_dir().join(format!("lts-bad-{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();
        assert!(load_settings(&path).is_err());
        let _ = fs::remove_file(path);
    }
}
