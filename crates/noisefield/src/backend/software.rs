use anyhow::Result;
use image::{Rgba, RgbaImage};
use tracing::{debug, warn};
use winit::dpi::PhysicalSize;

use crate::error::InitError;
use crate::gpu::FramePresenter;
use crate::gradient::{shade, to_rgba8};
use crate::noise::sample_field;
use crate::params::{ChangeSet, Settings};
use crate::runtime::FrameTick;
use crate::types::BackendKind;

use super::{classify_surface_result, FrameOutcome, RenderBackend};

/// CPU rasteriser writing the noise field into an RGBA pixel buffer.
///
/// The buffer covers the surface at `pixel_scale` of its resolution.
#[derive(Debug, Clone)]
pub(crate) struct SoftwareRaster {
    pixel_scale: f32,
    image: RgbaImage,
}

impl SoftwareRaster {
    pub fn new(surface: PhysicalSize<u32>, pixel_scale: f32) -> Self {
        let pixel_scale = if pixel_scale.is_finite() && pixel_scale > 0.0 {
            pixel_scale.min(1.0)
        } else {
            1.0
        };
        let (width, height) = buffer_size(surface, pixel_scale);
        Self {
            pixel_scale,
            image: RgbaImage::new(width, height),
        }
    }

    pub fn resize(&mut self, surface: PhysicalSize<u32>) {
        let (width, height) = buffer_size(surface, self.pixel_scale);
        if self.image.dimensions() != (width, height) {
            debug!(width, height, "resizing software pixel buffer");
            self.image = RgbaImage::new(width, height);
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Fills every pixel from the field at `elapsed` seconds.
    ///
    /// Pixel centres map to `uv` with `v` pointing up, so row 0 is the top
    /// edge of the plane.
    pub fn rasterize(&mut self, settings: &Settings, elapsed: f64) -> &RgbaImage {
        let (width, height) = self.image.dimensions();
        let (width, height) = (f64::from(width), f64::from(height));
        let color = settings.color;
        for (x, y, pixel) in self.image.enumerate_pixels_mut() {
            let uv = [
                (f64::from(x) + 0.5) / width,
                1.0 - (f64::from(y) + 0.5) / height,
            ];
            let value = sample_field(uv, elapsed, &settings.noise);
            *pixel = Rgba(to_rgba8(shade(
                value,
                color.primary,
                color.secondary,
                settings.clamp,
            )));
        }
        &self.image
    }
}

fn buffer_size(surface: PhysicalSize<u32>, pixel_scale: f32) -> (u32, u32) {
    let scale = |extent: u32| ((extent as f32 * pixel_scale).round() as u32).max(1);
    (scale(surface.width), scale(surface.height))
}

/// Where finished software frames go.
pub(crate) trait PixelSink {
    fn label(&self) -> &str;

    fn surface_size(&self) -> PhysicalSize<u32>;

    fn resize(&mut self, size: PhysicalSize<u32>);

    fn present(&mut self, image: &RgbaImage) -> Result<FrameOutcome>;

    fn destroy(self: Box<Self>);
}

impl PixelSink for FramePresenter {
    fn label(&self) -> &str {
        &self.adapter_profile().name
    }

    fn surface_size(&self) -> PhysicalSize<u32> {
        FramePresenter::surface_size(self)
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        FramePresenter::resize(self, size);
    }

    fn present(&mut self, image: &RgbaImage) -> Result<FrameOutcome> {
        if self.is_device_lost() {
            return Ok(FrameOutcome::DeviceLost);
        }
        let result = FramePresenter::present(self, image);
        classify_surface_result(result, || self.reconfigure())
    }

    fn destroy(self: Box<Self>) {
        FramePresenter::destroy(*self);
    }
}

/// Opens the CPU surface, falling back to the GPU blit only when the
/// platform has no CPU presentation path.
pub(crate) fn open_pixel_sink(
    cpu: impl FnOnce() -> Result<Box<dyn PixelSink>, InitError>,
    gpu_blit: impl FnOnce() -> Result<Box<dyn PixelSink>, InitError>,
) -> Result<Box<dyn PixelSink>, InitError> {
    match cpu() {
        Ok(sink) => Ok(sink),
        Err(err) => {
            warn!(error = %err, "CPU surface unavailable; presenting through the GPU blit");
            gpu_blit()
        }
    }
}

/// Software pixel-buffer backend: rasterises on the CPU with wall-clock
/// time and hands each finished buffer to its sink.
pub(crate) struct SoftwareBackend {
    raster: SoftwareRaster,
    sink: Box<dyn PixelSink>,
    settings: Settings,
}

impl SoftwareBackend {
    pub fn new(sink: Box<dyn PixelSink>, settings: &Settings, pixel_scale: f32) -> Self {
        let raster = SoftwareRaster::new(sink.surface_size(), pixel_scale);
        let (width, height) = raster.image().dimensions();
        debug!(width, height, sink = sink.label(), "software backend ready");
        Self {
            raster,
            sink,
            settings: settings.clone(),
        }
    }
}

impl RenderBackend for SoftwareBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.sink.resize(size);
        self.raster.resize(size);
    }

    fn apply(&mut self, changes: ChangeSet, settings: &Settings) {
        if !changes.is_empty() {
            self.settings = settings.clone();
        }
    }

    fn render(&mut self, tick: &FrameTick) -> Result<FrameOutcome> {
        self.raster.rasterize(&self.settings, tick.elapsed);
        self.sink.present(self.raster.image())
    }

    fn destroy(self: Box<Self>) {
        self.sink.destroy();
    }
}
