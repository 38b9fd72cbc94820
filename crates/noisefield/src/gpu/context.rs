use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info, warn};
use winit::dpi::PhysicalSize;

use crate::error::InitError;
use crate::types::AdapterProfile;

/// Lifecycle of a GPU-backed renderer, used to label log events.
///
/// The phases after `DeviceReady` are carried by distinct types
/// (`DeviceReady` then `GpuRenderer`) so operations that need a built
/// pipeline cannot be called before it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DevicePhase {
    DeviceAcquiring,
    DeviceReady,
    PipelineBuilding,
    Rendering,
    Destroyed,
    DeviceLost,
}

impl fmt::Display for DevicePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DevicePhase::DeviceAcquiring => "device-acquiring",
            DevicePhase::DeviceReady => "device-ready",
            DevicePhase::PipelineBuilding => "pipeline-building",
            DevicePhase::Rendering => "rendering",
            DevicePhase::Destroyed => "destroyed",
            DevicePhase::DeviceLost => "device-lost",
        };
        f.write_str(name)
    }
}

/// The three ordered steps of bringing up a GPU context.
///
/// Each step receives what the previous one produced, so a later step can
/// only run once every earlier one succeeded. The error strings are detail for
/// the log; [`acquire`] decides the typed error from which step failed.
pub(crate) trait AcquireStages {
    type Platform;
    type Adapter;
    type Bound;

    /// Is there any GPU entry point at all.
    fn detect(&mut self) -> Result<Self::Platform, String>;
    /// Adapter and device negotiation.
    fn negotiate(&mut self, platform: &Self::Platform) -> Result<Self::Adapter, String>;
    /// Binding the drawable surface to the negotiated device.
    fn bind(
        &mut self,
        platform: Self::Platform,
        adapter: Self::Adapter,
    ) -> Result<Self::Bound, String>;
}

pub(crate) fn acquire<S: AcquireStages>(stages: &mut S) -> Result<S::Bound, InitError> {
    debug!(phase = %DevicePhase::DeviceAcquiring, "acquiring GPU device");
    let platform = stages.detect().map_err(|detail| {
        warn!(%detail, "GPU detection failed");
        InitError::NoGpuSupport
    })?;
    let adapter = stages.negotiate(&platform).map_err(|detail| {
        warn!(%detail, "GPU adapter negotiation failed");
        InitError::NoSuitableAdapter
    })?;
    let bound = stages.bind(platform, adapter).map_err(|detail| {
        warn!(%detail, "failed to bind surface to GPU device");
        InitError::ContextCreationFailed
    })?;
    debug!(phase = %DevicePhase::DeviceReady, "GPU device acquired");
    Ok(bound)
}

pub(crate) struct NegotiatedDevice {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    profile: AdapterProfile,
}

/// [`AcquireStages`] backed by wgpu and a live window.
pub(crate) struct WgpuStages<'w, T> {
    target: &'w T,
    size: PhysicalSize<u32>,
    force_fallback_adapter: bool,
}

impl<'w, T> WgpuStages<'w, T>
where
    T: HasDisplayHandle + HasWindowHandle,
{
    pub(crate) fn new(target: &'w T, size: PhysicalSize<u32>) -> Self {
        Self {
            target,
            size,
            force_fallback_adapter: false,
        }
    }

    /// Prefer a CPU adapter; used when only presentation is needed.
    pub(crate) fn prefer_fallback_adapter(mut self, enabled: bool) -> Self {
        self.force_fallback_adapter = enabled;
        self
    }
}

impl<T> AcquireStages for WgpuStages<'_, T>
where
    T: HasDisplayHandle + HasWindowHandle,
{
    type Platform = wgpu::Instance;
    type Adapter = NegotiatedDevice;
    type Bound = GpuContext;

    fn detect(&mut self) -> Result<wgpu::Instance, String> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });
        let adapters = instance.enumerate_adapters(wgpu::Backends::all());
        if adapters.is_empty() {
            return Err("no graphics backend reported an adapter".to_string());
        }
        debug!(count = adapters.len(), "GPU adapters available");
        Ok(instance)
    }

    fn negotiate(&mut self, instance: &wgpu::Instance) -> Result<NegotiatedDevice, String> {
        let mut adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: self.force_fallback_adapter,
        }));
        if adapter.is_err() && self.force_fallback_adapter {
            debug!("no fallback adapter; retrying with any adapter");
            adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: false,
            }));
        }
        let adapter = adapter.map_err(|err| err.to_string())?;

        let profile = AdapterProfile::from_wgpu(&adapter.get_info());
        info!(
            name = %profile.name,
            backend = ?profile.backend,
            device_type = ?profile.device_type,
            is_software = profile.is_software(),
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("noisefield device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .map_err(|err| format!("failed to create GPU device: {err}"))?;

        Ok(NegotiatedDevice {
            adapter,
            device,
            queue,
            profile,
        })
    }

    fn bind(
        &mut self,
        instance: wgpu::Instance,
        negotiated: NegotiatedDevice,
    ) -> Result<GpuContext, String> {
        let window_handle = self
            .target
            .window_handle()
            .map_err(|err| format!("failed to acquire window handle: {err}"))?;
        let display_handle = self
            .target
            .display_handle()
            .map_err(|err| format!("failed to acquire display handle: {err}"))?;

        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .map_err(|err| format!("failed to create rendering surface: {err}"))?;

        let NegotiatedDevice {
            adapter,
            device,
            queue,
            profile,
        } = negotiated;

        if !adapter.is_surface_supported(&surface) {
            return Err(format!("adapter '{}' cannot present to this surface", profile.name));
        }

        let max_dimension = adapter.limits().max_texture_dimension_2d;
        let width = self.size.width.max(1);
        let height = self.size.height.max(1);
        if width > max_dimension || height > max_dimension {
            return Err(format!(
                "GPU max texture dimension is {max_dimension}, requested surface is {width}x{height}"
            ));
        }

        let caps = surface.get_capabilities(&adapter);
        // Colours are computed directly in display space, so the surface must
        // not apply an sRGB encode on write.
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| "surface reports no supported formats".to_string())?;
        if surface_format.is_srgb() {
            warn!(
                ?surface_format,
                "no linear (non-sRGB) surface format available; colours will be re-encoded"
            );
        }

        let present_mode = caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Fifo)
            .or_else(|| caps.present_modes.first().copied())
            .unwrap_or(wgpu::PresentMode::Fifo);
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        debug!(?surface_format, ?present_mode, width, height, "configured surface");

        let device_lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&device_lost);
        device.set_device_lost_callback(move |reason, message| {
            flag.store(true, Ordering::SeqCst);
            warn!(phase = %DevicePhase::DeviceLost, ?reason, %message, "GPU device lost");
        });

        Ok(GpuContext {
            _instance: instance,
            surface,
            _adapter: adapter,
            device,
            queue,
            config,
            size: PhysicalSize::new(width, height),
            surface_format,
            adapter_profile: profile,
            device_lost,
        })
    }
}

/// Device, queue and configured surface shared by every GPU-drawing backend.
pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub _adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    pub surface_format: wgpu::TextureFormat,
    pub adapter_profile: AdapterProfile,
    device_lost: Arc<AtomicBool>,
}

impl GpuContext {
    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Reapplies the current configuration after `Lost`/`Outdated`.
    pub(crate) fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    pub(crate) fn is_device_lost(&self) -> bool {
        self.device_lost.load(Ordering::SeqCst)
    }

    /// Releases the device. Nothing may touch the context afterwards, which
    /// taking `self` by value guarantees.
    pub(crate) fn destroy(self) {
        debug!(phase = %DevicePhase::Destroyed, adapter = %self.adapter_profile.name, "destroying GPU device");
        self.device.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records which stages ran; fails at a chosen stage.
    struct FakeStages {
        fail_at: Option<usize>,
        calls: Vec<&'static str>,
    }

    impl FakeStages {
        fn failing_at(stage: Option<usize>) -> Self {
            Self {
                fail_at: stage,
                calls: Vec::new(),
            }
        }

        fn step(&mut self, index: usize, name: &'static str) -> Result<(), String> {
            self.calls.push(name);
            if self.fail_at == Some(index) {
                Err(format!("{name} failed"))
            } else {
                Ok(())
            }
        }
    }

    impl AcquireStages for FakeStages {
        type Platform = u8;
        type Adapter = u16;
        type Bound = u32;

        fn detect(&mut self) -> Result<u8, String> {
            self.step(0, "detect").map(|_| 1)
        }

        fn negotiate(&mut self, platform: &u8) -> Result<u16, String> {
            self.step(1, "negotiate").map(|_| u16::from(*platform) + 1)
        }

        fn bind(&mut self, platform: u8, adapter: u16) -> Result<u32, String> {
            self.step(2, "bind")
                .map(|_| u32::from(platform) + u32::from(adapter))
        }
    }

    #[test]
    fn each_stage_maps_to_its_own_error() {
        let expected = [
            InitError::NoGpuSupport,
            InitError::NoSuitableAdapter,
            InitError::ContextCreationFailed,
        ];
        for (stage, error) in expected.into_iter().enumerate() {
            let mut stages = FakeStages::failing_at(Some(stage));
            assert_eq!(acquire(&mut stages), Err(error));
        }
    }

    #[test]
    fn earlier_stage_failure_stops_later_stages() {
        let mut stages = FakeStages::failing_at(Some(0));
        let _ = acquire(&mut stages);
        assert_eq!(stages.calls, vec!["detect"]);

        let mut stages = FakeStages::failing_at(Some(1));
        let _ = acquire(&mut stages);
        assert_eq!(stages.calls, vec!["detect", "negotiate"]);
    }

    #[test]
    fn successful_acquisition_runs_stages_in_order() {
        let mut stages = FakeStages::failing_at(None);
        assert_eq!(acquire(&mut stages), Ok(3));
        assert_eq!(stages.calls, vec!["detect", "negotiate", "bind"]);
    }

    #[test]
    fn errors_carry_distinct_user_messages() {
        let messages = [
            InitError::NoGpuSupport.user_message(),
            InitError::NoSuitableAdapter.user_message(),
            InitError::ContextCreationFailed.user_message(),
        ];
        assert_ne!(messages[0], messages[1]);
        assert_ne!(messages[1], messages[2]);
        assert_ne!(messages[0], messages[2]);
    }
}
