//! Host system queries.

pub mod gpu;

pub use gpu::{
    create_gpu_monitor, GpuDevice, GpuMonitor, GpuReport, GpuSelection, NoOpGpuMonitor,
    NvidiaSmiMonitor,
};
