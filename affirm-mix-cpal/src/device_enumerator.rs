//! Output device enumeration through the cpal default host.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

use affirm_mix_core::models::audio_models::OutputDeviceInfo;
use affirm_mix_core::models::error::MixerError;

/// Lists the output devices of the platform's default audio host.
pub struct DeviceEnumerator {
    host: Host,
}

impl DeviceEnumerator {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// List output devices with their default stream format.
    ///
    /// Devices that cannot report a configuration are skipped.
    pub fn list_output_devices(&self) -> Result<Vec<OutputDeviceInfo>, MixerError> {
        let default_name = self.host.default_output_device().and_then(|d| d.name().ok());

        let devices = self
            .host
            .output_devices()
            .map_err(|e| MixerError::Device(format!("failed to enumerate output devices: {}", e)))?;

        let mut infos = Vec::new();
        for (index, device) in devices.enumerate() {
            let name = device.name().unwrap_or_else(|_| format!("Device {}", index));
            let is_default = default_name.as_deref() == Some(name.as_str());
            match describe(&device, name.clone(), is_default) {
                Ok(info) => infos.push(info),
                Err(e) => log::debug!("Skipping output device '{}': {}", name, e),
            }
        }

        log::debug!("Found {} output devices", infos.len());
        Ok(infos)
    }

    pub fn default_output_device(&self) -> Result<OutputDeviceInfo, MixerError> {
        let device = self
            .host
            .default_output_device()
            .ok_or_else(|| MixerError::Device("no default output device".into()))?;
        let name = device.name().unwrap_or_else(|_| "Default Output".into());
        describe(&device, name, true)
    }
}

impl Default for DeviceEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Find an output device by name, or the default device when `name` is `None`.
///
/// A named device that has disappeared falls back to the default device.
pub(crate) fn resolve_device(host: &Host, name: Option<&str>) -> Result<Device, MixerError> {
    if let Some(name) = name {
        let mut devices = host
            .output_devices()
            .map_err(|e| MixerError::Device(format!("failed to enumerate output devices: {}", e)))?;
        if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
            return Ok(device);
        }
        log::warn!("Output device '{}' not found, falling back to default", name);
    }
    host.default_output_device()
        .ok_or_else(|| MixerError::Device("no default output device".into()))
}

pub(crate) fn describe(
    device: &Device,
    name: String,
    is_default: bool,
) -> Result<OutputDeviceInfo, MixerError> {
    let config = device
        .default_output_config()
        .map_err(|e| MixerError::Device(format!("failed to query output config: {}", e)))?;
    Ok(OutputDeviceInfo {
        id: name.clone(),
        name,
        is_default,
        sample_rate: config.sample_rate().0,
        channels: config.channels(),
    })
}
