use anyhow::Result;
use tracing::debug;
use winit::dpi::PhysicalSize;

use crate::error::GeometryError;
use crate::gpu::{DeviceReady, SceneRenderer};
use crate::mesh::{PlaneMesh, Topology};
use crate::params::{ChangeSet, Settings};
use crate::runtime::FrameTick;
use crate::types::BackendKind;

use super::{classify_surface_result, FrameOutcome, RenderBackend};

/// Cells per side of the plane drawn by the scene program.
pub(crate) const SCENE_MESH_RESOLUTION: u32 = 32;

/// Intermediate shader backend: GLSL program over a tessellated strip
/// mesh, animated with wall-clock time.
pub(crate) struct ShaderBackend {
    scene: SceneRenderer,
}

impl ShaderBackend {
    pub fn new(
        device: DeviceReady,
        surface: PhysicalSize<u32>,
        settings: &Settings,
    ) -> Result<Self, GeometryError> {
        let mesh = PlaneMesh::new(
            surface.width.max(1) as f32,
            surface.height.max(1) as f32,
            SCENE_MESH_RESOLUTION,
            Topology::TriangleStrip,
        )?;
        let mut scene = device.build_scene(mesh);
        scene.set_parameters(settings);
        debug!(adapter = %scene.adapter_profile().name, "shader backend ready");
        Ok(Self { scene })
    }
}

impl RenderBackend for ShaderBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::IntermediateShader
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.scene.resize(size);
    }

    fn apply(&mut self, changes: ChangeSet, settings: &Settings) {
        if !changes.is_empty() {
            self.scene.set_parameters(settings);
        }
    }

    fn render(&mut self, tick: &FrameTick) -> Result<FrameOutcome> {
        if self.scene.is_device_lost() {
            return Ok(FrameOutcome::DeviceLost);
        }
        let result = self.scene.render(tick.elapsed as f32);
        let scene = &mut self.scene;
        classify_surface_result(result, || scene.reconfigure())
    }

    fn destroy(self: Box<Self>) {
        self.scene.destroy();
    }
}
