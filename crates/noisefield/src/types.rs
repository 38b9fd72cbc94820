use std::fmt;
use std::str::FromStr;

use crate::params::Settings;

/// The three interchangeable renderer implementations, lowest tier first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum BackendKind {
    /// CPU rasterisation into a pixel buffer, presented as a texture.
    Software,
    /// GLSL shader over a tessellated plane with one packed uniform block.
    IntermediateShader,
    /// WGSL pipeline with one uniform buffer per parameter group.
    #[default]
    GpuAccelerated,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [
        BackendKind::Software,
        BackendKind::IntermediateShader,
        BackendKind::GpuAccelerated,
    ];

    /// Whether instantiating this backend negotiates a GPU device for drawing.
    pub fn requires_gpu_pipeline(self) -> bool {
        !matches!(self, BackendKind::Software)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Software => "software",
            BackendKind::IntermediateShader => "shader",
            BackendKind::GpuAccelerated => "gpu",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "software" | "basic" | "cpu" => Ok(BackendKind::Software),
            "shader" | "intermediate" | "webgl" => Ok(BackendKind::IntermediateShader),
            "gpu" | "accelerated" | "webgpu" | "wgpu" => Ok(BackendKind::GpuAccelerated),
            other => Err(format!(
                "unknown backend '{other}'; expected 'software', 'shader', or 'gpu'"
            )),
        }
    }
}

/// Summary of the adapter a GPU context settled on, for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
}

impl AdapterProfile {
    pub(crate) fn from_wgpu(info: &wgpu::AdapterInfo) -> Self {
        Self {
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
        }
    }

    /// True for CPU rasterisers such as llvmpipe or WARP.
    pub fn is_software(&self) -> bool {
        matches!(self.device_type, wgpu::DeviceType::Cpu)
            || self.name.to_ascii_lowercase().contains("llvmpipe")
    }
}

/// Start-up configuration handed to [`crate::Renderer`].
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Initial parameter values; `settings.backend` is the user preference.
    pub settings: Settings,
    /// Downgrade to a lesser backend when the preferred one fails to start.
    pub allow_fallback: bool,
    /// Fraction of the surface resolution the software backend rasterises at.
    pub pixel_scale: f32,
    /// Optional frame-rate cap; `None` renders on every redraw.
    pub target_fps: Option<f32>,
    /// Initial inner size of the preview window in physical pixels.
    pub window_size: (u32, u32),
    pub title: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            allow_fallback: true,
            pixel_scale: 0.25,
            target_fps: None,
            window_size: (1280, 720),
            title: "noisewall".to_string(),
        }
    }
}
