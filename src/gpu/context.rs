//! wgpu device and queue initialization.

use super::GpuError;
use tracing::{info, warn};
use wgpu::{Adapter, Device, DownlevelFlags, Features, Instance, Limits, Queue, RequestAdapterOptions};

pub struct GpuContext {
    pub device: Device,
    pub queue: Queue,
}

/// Default limits, raised to whatever the adapter allows for buffer sizes so
/// large scenes are limited by the hardware rather than the WebGPU baseline.
fn splat_limits(adapter: &Adapter) -> Limits {
    let supported = adapter.limits();
    Limits {
        max_storage_buffer_binding_size: supported.max_storage_buffer_binding_size,
        max_buffer_size: supported.max_buffer_size,
        ..Limits::default()
    }
}

impl GpuContext {
    /// Initialize GPU context asynchronously.
    ///
    /// The splat vertex shader reads the scene from storage buffers, so
    /// adapters without vertex-stage storage are rejected up front.
    pub async fn new() -> Result<Self, GpuError> {
        let instance = Instance::new(wgpu::InstanceDescriptor {
            backends: {
                #[cfg(target_os = "macos")]
                {
                    wgpu::Backends::METAL
                }
                #[cfg(not(target_os = "macos"))]
                {
                    wgpu::Backends::PRIMARY
                }
            },
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let info = adapter.get_info();
        if !adapter
            .get_downlevel_capabilities()
            .flags
            .contains(DownlevelFlags::VERTEX_STORAGE)
        {
            return Err(GpuError::Unsupported(format!(
                "{} has no vertex-stage storage buffers",
                info.name
            )));
        }

        let limits = splat_limits(&adapter);
        info!(
            adapter = %info.name,
            backend = ?info.backend,
            max_storage_mb = limits.max_storage_buffer_binding_size / (1024 * 1024),
            "gpu adapter"
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Splat GPU Device"),
                    required_features: Features::empty(),
                    required_limits: limits,
                },
                None,
            )
            .await?;

        device.on_uncaptured_error(Box::new(|e| {
            warn!("[wgpu] uncaptured error: {e}");
        }));

        Ok(Self { device, queue })
    }

    /// Synchronous wrapper using pollster, for the CLI and tests.
    pub fn new_blocking() -> Result<Self, GpuError> {
        pollster::block_on(Self::new())
    }
}
