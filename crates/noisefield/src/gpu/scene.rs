use tracing::info;
use winit::dpi::PhysicalSize;

use crate::mesh::PlaneMesh;
use crate::params::Settings;
use crate::types::AdapterProfile;

use super::context::{DevicePhase, GpuContext};
use super::pipeline::{create_vertex_buffer, ScenePipeline};
use super::state::draw_frame;
use super::uniforms::{ClampUniform, ColorUniform, NoiseUniform, SceneUniforms, TransformUniform};

/// GLSL scene program drawing a tessellated plane.
///
/// All parameters live in one std140 block that is re-uploaded every frame,
/// so parameter edits only refresh the CPU-side copy.
pub(crate) struct SceneRenderer {
    context: GpuContext,
    pipeline: ScenePipeline,
    vertex_buffer: wgpu::Buffer,
    mesh: PlaneMesh,
    uniforms: SceneUniforms,
}

impl SceneRenderer {
    pub(super) fn new(context: GpuContext, mesh: PlaneMesh) -> Self {
        let pipeline = ScenePipeline::new(&context.device, context.surface_format, &mesh);
        let vertex_buffer = create_vertex_buffer(&context.device, &mesh);
        let defaults = Settings::default();
        let uniforms = scene_uniforms(&defaults, 0.0);

        info!(
            phase = %DevicePhase::Rendering,
            adapter = %context.adapter_profile.name,
            vertices = mesh.vertex_count(),
            resolution = mesh.resolution(),
            "scene renderer ready"
        );
        Self {
            context,
            pipeline,
            vertex_buffer,
            mesh,
            uniforms,
        }
    }

    pub fn adapter_profile(&self) -> &AdapterProfile {
        &self.context.adapter_profile
    }

    pub fn set_parameters(&mut self, settings: &Settings) {
        self.uniforms = scene_uniforms(settings, self.uniforms.time);
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.context.resize(new_size);
    }

    pub fn reconfigure(&mut self) {
        self.context.reconfigure();
    }

    pub fn is_device_lost(&self) -> bool {
        self.context.is_device_lost()
    }

    pub fn render(&mut self, time: f32) -> Result<(), wgpu::SurfaceError> {
        self.uniforms.time = time;
        self.context.queue.write_buffer(
            &self.pipeline.uniform_buffer,
            0,
            bytemuck::bytes_of(&self.uniforms),
        );

        let pipeline = &self.pipeline;
        let vertex_buffer = &self.vertex_buffer;
        let vertex_count = self.mesh.vertex_count();
        draw_frame(&self.context, "scene pass", |pass| {
            pass.set_pipeline(&pipeline.pipeline);
            pass.set_bind_group(0, &pipeline.bind_group, &[]);
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.draw(0..vertex_count, 0..1);
        })
    }

    pub fn destroy(self) {
        self.context.destroy();
    }
}

pub(crate) fn scene_uniforms(settings: &Settings, time: f32) -> SceneUniforms {
    SceneUniforms::from_parts(
        &TransformUniform::from_config(&settings.transform),
        &NoiseUniform::from_config(&settings.noise),
        &ColorUniform::from_config(&settings.color),
        ClampUniform::new(settings.clamp),
        time,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_refresh_keeps_current_time() {
        let mut settings = Settings::default();
        let before = scene_uniforms(&settings, 3.5);
        settings.clamp = true;
        settings.noise.octaves = 3;
        let after = scene_uniforms(&settings, before.time);

        assert_eq!(after.time, 3.5);
        assert_eq!(after.clamp, 1.0);
        assert_eq!(after.octaves, 3.0);
        assert_eq!(after.projection, before.projection);
    }
}
