use candle_core::Device;
use tracing::{debug, warn};

use super::error::ModelError;

/// Requested compute backend.
///
/// `Auto` takes the first compiled GPU backend that opens and otherwise runs on the
/// CPU. Naming a backend explicitly makes a failure to open it an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DevicePreference {
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl DevicePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
            Self::Metal => "metal",
        }
    }
}

impl std::fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            "metal" | "mps" => Ok(Self::Metal),
            _ => Err(format!("Unknown device: {}", s)),
        }
    }
}

/// Opens the device named by `preference`.
pub fn select_device(preference: DevicePreference) -> Result<Device, ModelError> {
    match preference {
        DevicePreference::Cpu => {
            debug!("CPU device requested");
            Ok(Device::Cpu)
        }
        DevicePreference::Cuda => open_cuda(),
        DevicePreference::Metal => open_metal(),
        DevicePreference::Auto => {
            let backends: [(&str, fn() -> Result<Device, ModelError>); 2] =
                [("metal", open_metal), ("cuda", open_cuda)];
            for (backend, open) in backends {
                match open() {
                    Ok(device) => return Ok(device),
                    Err(e) => debug!(backend, error = %e, "Backend skipped"),
                }
            }
            warn!("No GPU backend available, training and scoring on CPU");
            Ok(Device::Cpu)
        }
    }
}

#[cfg(feature = "cuda")]
fn open_cuda() -> Result<Device, ModelError> {
    let device = Device::new_cuda(0).map_err(|e| ModelError::DeviceUnavailable {
        backend: "cuda",
        reason: e.to_string(),
    })?;
    tracing::info!("Using CUDA device 0");
    Ok(device)
}

#[cfg(not(feature = "cuda"))]
fn open_cuda() -> Result<Device, ModelError> {
    Err(ModelError::DeviceUnavailable {
        backend: "cuda",
        reason: "built without the `cuda` feature".to_string(),
    })
}

#[cfg(feature = "metal")]
fn open_metal() -> Result<Device, ModelError> {
    let device = Device::new_metal(0).map_err(|e| ModelError::DeviceUnavailable {
        backend: "metal",
        reason: e.to_string(),
    })?;
    tracing::info!("Using Metal device 0");
    Ok(device)
}

#[cfg(not(feature = "metal"))]
fn open_metal() -> Result<Device, ModelError> {
    Err(ModelError::DeviceUnavailable {
        backend: "metal",
        reason: "built without the `metal` feature".to_string(),
    })
}
