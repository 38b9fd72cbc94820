//! Headless rendering of the noise pipeline into a readable texture.

use image::{Rgba, RgbaImage};

use crate::mesh::{PlaneMesh, Topology};
use crate::params::Settings;

use super::pipeline::{create_vertex_buffer, NoisePipeline};
use super::uniforms::{ClampUniform, ColorUniform, NoiseUniform, TimeUniform, TransformUniform};

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub(crate) struct Offscreen {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl Offscreen {
    /// Opens the platform's fallback adapter; `None` when the host has no
    /// adapter at all.
    pub fn new() -> Option<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: true,
        }))
        .or_else(|_| {
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: false,
            }))
        })
        .ok()?;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("offscreen device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .ok()?;
        Some(Self { device, queue })
    }

    /// Draws one noise frame at `time` and reads it back.
    pub fn render_noise(&self, settings: &Settings, time: f32) -> RgbaImage {
        let (width, height) = settings.transform.resolution();
        let mesh = PlaneMesh::quad(Topology::TriangleList);
        let pipeline = NoisePipeline::new(&self.device, FORMAT, &mesh);
        let vertex_buffer = create_vertex_buffer(&self.device, &mesh);

        let uniforms = &pipeline.uniforms;
        let write = |buffer: &wgpu::Buffer, bytes: &[u8]| self.queue.write_buffer(buffer, 0, bytes);
        write(
            &uniforms.transform,
            bytemuck::bytes_of(&TransformUniform::from_config(&settings.transform)),
        );
        write(&uniforms.time, bytemuck::bytes_of(&TimeUniform { time }));
        write(
            &uniforms.noise,
            bytemuck::bytes_of(&NoiseUniform::from_config(&settings.noise)),
        );
        write(
            &uniforms.color,
            bytemuck::bytes_of(&ColorUniform::from_config(&settings.color)),
        );
        write(&uniforms.clamp, bytemuck::bytes_of(&ClampUniform::new(settings.clamp)));

        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let target = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let row_bytes = width * 4;
        let padded_row = row_bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("offscreen readback"),
            size: u64::from(padded_row * height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("offscreen noise"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("offscreen noise pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline.pipeline);
            pass.set_bind_group(0, &pipeline.bind_group, &[]);
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.draw(0..mesh.vertex_count(), 0..1);
        }
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            extent,
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::PollType::Wait).unwrap();
        receiver.recv().unwrap().unwrap();

        let mapped = slice.get_mapped_range();
        let mut image = RgbaImage::new(width, height);
        for (y, row) in mapped.chunks_exact(padded_row as usize).enumerate() {
            for x in 0..width {
                let start = x as usize * 4;
                let texel = &row[start..start + 4];
                image.put_pixel(x, y as u32, Rgba([texel[0], texel[1], texel[2], texel[3]]));
            }
        }
        drop(mapped);
        readback.unmap();
        image
    }
}
