//! GPU selection and inventory.
//!
//! Inventory comes from `nvidia-smi`. Machines without it get a no-op
//! monitor that reports no devices.

use std::collections::HashSet;
use std::process::Command;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TrainingDefaults;
use crate::error::{Result, TrainerError};

/// Ordered, duplicate-free list of device indices, written `"0-1-3"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GpuSelection(Vec<u32>);

impl GpuSelection {
    /// Parse the hyphen-separated device list.
    ///
    /// ```
    /// use vctrain_core::system::GpuSelection;
    ///
    /// assert_eq!(GpuSelection::parse("0-2").unwrap().devices(), &[0, 2]);
    /// assert!(GpuSelection::parse("0--1").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let invalid = |message: String| TrainerError::InvalidGpuSelection {
            input: input.to_string(),
            message,
        };

        if input.is_empty() {
            return Err(invalid("no GPU index given".into()));
        }

        let mut seen = HashSet::new();
        let mut devices = Vec::new();
        for token in input.split('-') {
            let token = token.trim();
            if token.is_empty() {
                return Err(invalid("empty GPU index between separators".into()));
            }
            if !token.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid(format!("{token:?} is not a GPU index")));
            }
            let index: u32 = token
                .parse()
                .map_err(|_| invalid(format!("GPU index {token} is out of range")))?;
            if !seen.insert(index) {
                return Err(invalid(format!("GPU {index} listed more than once")));
            }
            devices.push(index);
        }

        Ok(GpuSelection(devices))
    }

    pub fn devices(&self) -> &[u32] {
        &self.0
    }
}

impl Default for GpuSelection {
    fn default() -> Self {
        GpuSelection(vec![0])
    }
}

impl std::fmt::Display for GpuSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|d| d.to_string()).collect();
        write!(f, "{}", parts.join("-"))
    }
}

impl TryFrom<String> for GpuSelection {
    type Error = TrainerError;

    fn try_from(value: String) -> Result<Self> {
        GpuSelection::parse(&value)
    }
}

impl From<GpuSelection> for String {
    fn from(selection: GpuSelection) -> Self {
        selection.to_string()
    }
}

/// One CUDA device as reported by `nvidia-smi`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuDevice {
    pub index: u32,
    pub name: String,
    /// Total memory in MiB.
    pub memory_total_mib: u64,
}

impl GpuDevice {
    /// Total memory rounded to whole GiB.
    pub fn memory_total_gib(&self) -> u64 {
        (self.memory_total_mib + 512) / 1024
    }
}

/// Parse `--query-gpu=index,name,memory.total --format=csv,noheader,nounits`.
///
/// Malformed lines are skipped.
pub fn parse_nvidia_smi_inventory(stdout: &str) -> Vec<GpuDevice> {
    stdout
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(',').map(|s| s.trim()).collect();
            if parts.len() < 3 {
                if !line.trim().is_empty() {
                    debug!("Unexpected nvidia-smi output line: {}", line);
                }
                return None;
            }
            Some(GpuDevice {
                index: parts[0].parse().ok()?,
                name: parts[1].to_string(),
                memory_total_mib: parts[2].parse().ok()?,
            })
        })
        .collect()
}

/// Human-readable device summary.
pub fn gpu_info_text(devices: &[GpuDevice]) -> String {
    if devices.is_empty() {
        return "Unfortunately, there is no compatible GPU available to support your training."
            .to_string();
    }
    devices
        .iter()
        .map(|d| format!("{}: {} ({} GB)", d.index, d.name, d.memory_total_gib()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Suggested batch size: GiB of VRAM on device 0, clamped to the valid range.
pub fn default_batch_size(devices: &[GpuDevice]) -> u32 {
    let Some(first) = devices.iter().find(|d| d.index == 0).or(devices.first()) else {
        return TrainingDefaults::BATCH_SIZE_FALLBACK;
    };
    let gib = u32::try_from(first.memory_total_gib()).unwrap_or(u32::MAX);
    gib.clamp(
        TrainingDefaults::BATCH_SIZE_MIN,
        TrainingDefaults::BATCH_SIZE_MAX,
    )
}

/// Snapshot returned by `get_gpu_info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuReport {
    pub available: bool,
    pub devices: Vec<GpuDevice>,
    pub info_text: String,
    pub default_batch_size: u32,
}

impl GpuReport {
    pub fn from_devices(available: bool, devices: Vec<GpuDevice>) -> Self {
        Self {
            available,
            info_text: gpu_info_text(&devices),
            default_batch_size: default_batch_size(&devices),
            devices,
        }
    }
}

/// Source of device inventory.
pub trait GpuMonitor: Send + Sync {
    fn is_available(&self) -> bool;

    fn list_devices(&self) -> Result<Vec<GpuDevice>>;

    /// Drop cached data.
    fn refresh(&self);
}

/// Inventory via `nvidia-smi`, cached for a short TTL.
pub struct NvidiaSmiMonitor {
    cache_ttl: Duration,
    cache: RwLock<Option<(Vec<GpuDevice>, Instant)>>,
    available: bool,
}

impl NvidiaSmiMonitor {
    pub fn new(cache_ttl: Duration) -> Self {
        let available = Command::new("nvidia-smi")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);

        if !available {
            debug!("nvidia-smi not available - GPU inventory disabled");
        }

        Self {
            cache_ttl,
            cache: RwLock::new(None),
            available,
        }
    }

    fn query_devices(&self) -> Vec<GpuDevice> {
        if !self.available {
            return Vec::new();
        }

        let output = Command::new("nvidia-smi")
            .args([
                "--query-gpu=index,name,memory.total",
                "--format=csv,noheader,nounits",
            ])
            .output();

        match output {
            Ok(output) if output.status.success() => {
                parse_nvidia_smi_inventory(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                debug!(
                    "nvidia-smi returned non-zero: {}",
                    String::from_utf8_lossy(&output.stderr)
                );
                Vec::new()
            }
            Err(e) => {
                debug!("Failed to run nvidia-smi: {}", e);
                Vec::new()
            }
        }
    }
}

impl GpuMonitor for NvidiaSmiMonitor {
    fn is_available(&self) -> bool {
        self.available
    }

    fn list_devices(&self) -> Result<Vec<GpuDevice>> {
        {
            let cache = self.cache.read().expect("gpu cache lock poisoned");
            if let Some((devices, timestamp)) = cache.as_ref() {
                if timestamp.elapsed() < self.cache_ttl {
                    return Ok(devices.clone());
                }
            }
        }

        let devices = self.query_devices();
        *self.cache.write().expect("gpu cache lock poisoned") =
            Some((devices.clone(), Instant::now()));
        Ok(devices)
    }

    fn refresh(&self) {
        *self.cache.write().expect("gpu cache lock poisoned") = None;
    }
}

/// Monitor for machines without a supported GPU.
pub struct NoOpGpuMonitor;

impl GpuMonitor for NoOpGpuMonitor {
    fn is_available(&self) -> bool {
        false
    }

    fn list_devices(&self) -> Result<Vec<GpuDevice>> {
        Ok(Vec::new())
    }

    fn refresh(&self) {}
}

/// Pick the monitor for the current system.
pub fn create_gpu_monitor() -> Box<dyn GpuMonitor> {
    let nvidia = NvidiaSmiMonitor::new(Duration::from_secs(5));
    if nvidia.is_available() {
        Box::new(nvidia)
    } else {
        Box::new(NoOpGpuMonitor)
    }
}
