use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info};
use winit::dpi::PhysicalSize;

use crate::error::InitError;
use crate::mesh::{PlaneMesh, Topology};
use crate::params::{ColorConfig, NoiseConfig, Settings, TransformConfig};
use crate::types::AdapterProfile;

use super::context::{acquire, DevicePhase, GpuContext, WgpuStages};
use super::pipeline::{create_vertex_buffer, NoisePipeline};
use super::present::FramePresenter;
use super::scene::SceneRenderer;
use super::uniforms::{ClampUniform, ColorUniform, NoiseUniform, TimeUniform, TransformUniform};

/// A negotiated device with a configured surface and no pipeline yet.
///
/// Each `build_*` consumes the phase, so pipelines are built exactly once
/// per device.
pub(crate) struct DeviceReady {
    context: GpuContext,
}

impl DeviceReady {
    pub fn acquire<T>(target: &T, size: PhysicalSize<u32>) -> Result<Self, InitError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = acquire(&mut WgpuStages::new(target, size))?;
        Ok(Self { context })
    }

    /// Device used only to put CPU-rendered frames on screen.
    pub fn acquire_for_presentation<T>(
        target: &T,
        size: PhysicalSize<u32>,
    ) -> Result<Self, InitError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = acquire(&mut WgpuStages::new(target, size).prefer_fallback_adapter(true))?;
        Ok(Self { context })
    }

    pub fn adapter_profile(&self) -> &AdapterProfile {
        &self.context.adapter_profile
    }

    pub fn build_pipeline(self, settings: &Settings) -> GpuRenderer {
        GpuRenderer::new(self.context, settings)
    }

    pub fn build_scene(self, mesh: PlaneMesh) -> SceneRenderer {
        debug!(phase = %DevicePhase::PipelineBuilding, pipeline = "scene", "building pipeline");
        SceneRenderer::new(self.context, mesh)
    }

    pub fn build_presenter(self) -> FramePresenter {
        debug!(phase = %DevicePhase::PipelineBuilding, pipeline = "blit", "building pipeline");
        FramePresenter::new(self.context)
    }
}

/// Clears the next surface texture to black, lets `draw` encode into the
/// pass, then submits and presents.
pub(crate) fn draw_frame(
    context: &GpuContext,
    label: &'static str,
    draw: impl FnOnce(&mut wgpu::RenderPass<'_>),
) -> Result<(), wgpu::SurfaceError> {
    let frame = context.surface.get_current_texture()?;
    let view = frame
        .texture
        .create_view(&wgpu::TextureViewDescriptor::default());
    let mut encoder = context
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(label),
        });

    {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        draw(&mut render_pass);
    }

    context.queue.submit(std::iter::once(encoder.finish()));
    frame.present();
    Ok(())
}

/// The GPU-accelerated renderer in its `Rendering` phase.
///
/// Pipeline, bind group and layouts are fixed at construction; parameter
/// edits only rewrite the bytes of the matching uniform buffer.
pub(crate) struct GpuRenderer {
    context: GpuContext,
    pipeline: NoisePipeline,
    vertex_buffer: wgpu::Buffer,
    vertex_count: u32,
}

impl GpuRenderer {
    fn new(context: GpuContext, settings: &Settings) -> Self {
        debug!(phase = %DevicePhase::PipelineBuilding, pipeline = "noise", "building pipeline");
        let mesh = PlaneMesh::quad(Topology::TriangleList);
        let pipeline = NoisePipeline::new(&context.device, context.surface_format, &mesh);
        let vertex_buffer = create_vertex_buffer(&context.device, &mesh);

        let renderer = Self {
            context,
            pipeline,
            vertex_buffer,
            vertex_count: mesh.vertex_count(),
        };
        renderer.update_model_view_projection_settings(&settings.transform);
        renderer.update_noise_settings(&settings.noise);
        renderer.update_color_settings(&settings.color);
        renderer.update_clamp_settings(settings.clamp);
        renderer.write_time(0.0);

        info!(
            phase = %DevicePhase::Rendering,
            adapter = %renderer.context.adapter_profile.name,
            vertices = renderer.vertex_count,
            "GPU renderer ready"
        );
        renderer
    }

    pub fn update_noise_settings(&self, noise: &NoiseConfig) {
        let uniform = NoiseUniform::from_config(noise);
        self.context
            .queue
            .write_buffer(&self.pipeline.uniforms.noise, 0, bytemuck::bytes_of(&uniform));
    }

    pub fn update_color_settings(&self, color: &ColorConfig) {
        let uniform = ColorUniform::from_config(color);
        self.context
            .queue
            .write_buffer(&self.pipeline.uniforms.color, 0, bytemuck::bytes_of(&uniform));
    }

    pub fn update_clamp_settings(&self, clamp: bool) {
        let uniform = ClampUniform::new(clamp);
        self.context
            .queue
            .write_buffer(&self.pipeline.uniforms.clamp, 0, bytemuck::bytes_of(&uniform));
    }

    pub fn update_model_view_projection_settings(&self, transform: &TransformConfig) {
        let uniform = TransformUniform::from_config(transform);
        self.context.queue.write_buffer(
            &self.pipeline.uniforms.transform,
            0,
            bytemuck::bytes_of(&uniform),
        );
    }

    fn write_time(&self, time: f32) {
        let uniform = TimeUniform { time };
        self.context
            .queue
            .write_buffer(&self.pipeline.uniforms.time, 0, bytemuck::bytes_of(&uniform));
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

    /// Draws one frame at `time`, the fixed-step clock value the caller
    /// commits once the frame is presented.
    pub fn render(&mut self, time: f32) -> Result<(), wgpu::SurfaceError> {
        self.write_time(time);

        let pipeline = &self.pipeline;
        let vertex_buffer = &self.vertex_buffer;
        let vertex_count = self.vertex_count;
        draw_frame(&self.context, "noise pass", |pass| {
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
