//! Animated fractal simplex noise renderer.
//!
//! A noise field is sampled over a plane, remapped onto a two-colour gradient
//! and drawn by one of three interchangeable backends. The overall flow is:
//!
//! ```text
//!   CLI / noisewall
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ WindowState ──▶ winit event loop ──▶ FrameScheduler
//!          │                │                                   │
//!          │                └─ ParameterBus ──ChangeSet──▶ RenderBackend::apply
//!          ▼                                                    │
//!   select_backend ──▶ gpu | shader | software ◀── render(FrameTick)
//! ```
//!
//! The GPU-accelerated backend keeps one uniform buffer per parameter group
//! and only rewrites the groups that changed. The intermediate backend runs a
//! GLSL program over a tessellated plane. The software backend evaluates the
//! same kernel on the CPU and presents the pixel buffer as a texture. When the
//! preferred backend cannot acquire a device the selector downgrades to the
//! next tier and reports why.

mod backend;
mod compile;
mod error;
mod gpu;
pub mod gradient;
pub mod mesh;
pub mod noise;
pub mod params;
pub mod runtime;
mod types;
mod window;

use anyhow::Result;

pub use backend::{SelectionError, StartError};
pub use error::{GeometryError, InitError};
pub use gradient::Rgb;
pub use params::{
    ColorConfig, NoiseConfig, ParameterBus, Projection, RunStatus, Settings, TransformConfig,
    NOISE_RANGES,
};
pub use types::{AdapterProfile, BackendKind, RendererConfig};

/// Entry point for the preview window.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Opens the window and renders until it is closed.
    pub fn run(self) -> Result<()> {
        tracing::info!(
            backend = %self.config.settings.backend,
            fallback = self.config.allow_fallback,
            width = self.config.window_size.0,
            height = self.config.window_size.1,
            "starting renderer"
        );
        window::run(self.config)
    }
}
