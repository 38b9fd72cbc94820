use image::RgbaImage;
use tracing::{debug, info};
use winit::dpi::PhysicalSize;

use crate::types::AdapterProfile;

use super::context::{DevicePhase, GpuContext};
use super::pipeline::BlitPipeline;
use super::state::draw_frame;

struct FrameTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

/// Puts CPU-rendered pixel buffers on the window surface.
///
/// The buffer is uploaded into a texture matching its own size and stretched
/// over the surface, so it may be smaller than the window.
pub(crate) struct FramePresenter {
    context: GpuContext,
    pipeline: BlitPipeline,
    frame: Option<FrameTexture>,
}

impl FramePresenter {
    pub(super) fn new(context: GpuContext) -> Self {
        let pipeline = BlitPipeline::new(&context.device, context.surface_format);
        info!(
            phase = %DevicePhase::Rendering,
            adapter = %context.adapter_profile.name,
            is_software = context.adapter_profile.is_software(),
            "frame presenter ready"
        );
        Self {
            context,
            pipeline,
            frame: None,
        }
    }

    pub fn adapter_profile(&self) -> &AdapterProfile {
        &self.context.adapter_profile
    }

    pub fn surface_size(&self) -> PhysicalSize<u32> {
        self.context.size
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

    pub fn present(&mut self, image: &RgbaImage) -> Result<(), wgpu::SurfaceError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(());
        }

        let stale = self
            .frame
            .as_ref()
            .is_none_or(|frame| frame.width != width || frame.height != height);
        if stale {
            self.frame = Some(self.create_frame_texture(width, height));
        }
        let Some(frame) = self.frame.as_ref() else {
            return Ok(());
        };

        self.context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &frame.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        let pipeline = &self.pipeline.pipeline;
        let bind_group = &frame.bind_group;
        draw_frame(&self.context, "software blit pass", |pass| {
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..3, 0..1);
        })
    }

    fn create_frame_texture(&self, width: u32, height: u32) -> FrameTexture {
        debug!(width, height, "allocating software frame texture");
        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("software frame"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self
            .context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("software frame bind group"),
                layout: &self.pipeline.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.pipeline.sampler),
                    },
                ],
            });
        FrameTexture {
            texture,
            bind_group,
            width,
            height,
        }
    }

    pub fn destroy(self) {
        self.context.destroy();
    }
}
