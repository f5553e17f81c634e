//! Audio device enumeration and selection.

use serde::{Deserialize, Serialize};

#[cfg(feature = "audio-cpal")]
use crate::error::{LtsError, Result};

/// Metadata about an audio device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Human-readable device name reported by the OS.
    pub name: String,
    /// Whether this is the system default device of its direction.
    pub is_default: bool,
    /// Heuristic flag for inputs that likely capture system output audio
    /// (feeding one back into live input makes a feedback loop).
    pub is_loopback_like: bool,
}

const LOOPBACK_KEYWORDS: &[&str] = &[
    "stereo mix",
    "wave out",
    "what u hear",
    "what you hear",
    "loopback",
    "virtual output",
    "monitor of",
    "mix stereo",
];

/// Best-effort heuristic for loopback/system-output capture devices.
pub fn is_loopback_like_name(name: &str) -> bool {
    let lowered = name.trim().to_ascii_lowercase();
    LOOPBACK_KEYWORDS.iter().any(|k| lowered.contains(k))
}

#[cfg(feature = "audio-cpal")]
fn describe<I>(devices: I, default_name: Option<String>) -> Vec<DeviceInfo>
where
    I: Iterator<Item = cpal::Device>,
{
    use cpal::traits::DeviceTrait;

    let mut list = devices
        .enumerate()
        .map(|(idx, device)| {
            let name = device
                .name()
                .unwrap_or_else(|_| format!("Device {}", idx + 1));
            DeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                is_loopback_like: is_loopback_like_name(&name),
                name,
            }
        })
        .collect::<Vec<_>>();
    list.sort_by_key(|d| (!d.is_default, d.name.to_ascii_lowercase()));
    list
}

/// List all output devices. Empty if cpal is unavailable or none exist.
#[cfg(feature = "audio-cpal")]
pub fn list_output_devices() -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());
    match host.output_devices() {
        Ok(devices) => describe(devices, default_name),
        Err(e) => {
            tracing::warn!("failed to enumerate output devices: {e}");
            vec![]
        }
    }
}

/// List all input devices. Empty if cpal is unavailable or none exist.
#[cfg(feature = "audio-cpal")]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    match host.input_devices() {
        Ok(devices) => describe(devices, default_name),
        Err(e) => {
            tracing::warn!("failed to enumerate input devices: {e}");
            vec![]
        }
    }
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_output_devices() -> Vec<DeviceInfo> {
    vec![]
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    vec![]
}

fn find_named<I, F>(devices: I, preferred: &str, name_of: F) -> Option<I::Item>
where
    I: Iterator,
    F: Fn(&I::Item) -> Option<String>,
{
    let mut devices = devices;
    devices.find(|d| name_of(d).as_deref() == Some(preferred))
}

/// Preferred output device by name, else the default, else the first one.
#[cfg(feature = "audio-cpal")]
pub fn select_output(host: &cpal::Host, preferred: Option<&str>) -> Result<cpal::Device> {
    use cpal::traits::{DeviceTrait, HostTrait};

    if let Some(name) = preferred {
        match host.output_devices() {
            Ok(devices) => {
                if let Some(device) = find_named(devices, name, |d| d.name().ok()) {
                    return Ok(device);
                }
                tracing::warn!("preferred output device '{name}' not found, falling back");
            }
            Err(e) => tracing::warn!("failed to list output devices: {e}"),
        }
    }
    if let Some(device) = host.default_output_device() {
        return Ok(device);
    }
    let mut devices = host
        .output_devices()
        .map_err(|e| LtsError::AudioDevice(e.to_string()))?;
    tracing::warn!("no default output device, falling back to first available output");
    devices.next().ok_or(LtsError::NoDefaultOutputDevice)
}

/// Preferred input device by name, else the default, else the first one.
#[cfg(feature = "audio-cpal")]
pub fn select_input(host: &cpal::Host, preferred: Option<&str>) -> Result<cpal::Device> {
    use cpal::traits::{DeviceTrait, HostTrait};

    if let Some(name) = preferred {
        match host.input_devices() {
            Ok(devices) => {
                if let Some(device) = find_named(devices, name, |d| d.name().ok()) {
                    return Ok(device);
                }
                tracing::warn!("preferred input device '{name}' not found, falling back");
            }
            Err(e) => tracing::warn!("failed to list input devices: {e}"),
        }
    }
    if let Some(device) = host.default_input_device() {
        return Ok(device);
    }
    let mut devices = host
        .input_devices()
        .map_err(|e| LtsError::AudioDevice(e.to_string()))?;
    devices
        .next()
        .ok_or_else(|| LtsError::AudioDevice("no input device for live input".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_loopback_names() {
        assert!(is_loopback_like_name("Stereo Mix (Realtek Audio)"));
        assert!(is_loopback_like_name("Monitor of Built-in Audio"));
        assert!(!is_loopback_like_name("USB Audio Interface In 1-2"));
    }

    #[test]
    fn finds_devices_by_exact_name() {
        let names = ["Built-in Output", "Interface Out", "HDMI"];
        let found = find_named(names.iter(), "Interface Out", |n| Some(n.to_string()));
        assert_eq!(found, Some(&"Interface Out"));
        assert!(find_named(names.iter(), "interface out", |n| Some(n.to_string())).is_none());
    }
}
