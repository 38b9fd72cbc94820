use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use image::RgbaImage;
use tracing::{debug, warn};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::error::InitError;

use super::software::PixelSink;
use super::FrameOutcome;

/// Window surface filled by the CPU; presenting needs no GPU at all.
pub(crate) struct CpuSurface {
    surface: softbuffer::Surface<Arc<Window>, Arc<Window>>,
    _context: softbuffer::Context<Arc<Window>>,
    size: PhysicalSize<u32>,
}

impl CpuSurface {
    pub fn new(window: Arc<Window>) -> Result<Self, InitError> {
        let context = softbuffer::Context::new(window.clone()).map_err(|err| {
            warn!(error = %err, "failed to open CPU display context");
            InitError::ContextCreationFailed
        })?;
        let surface = softbuffer::Surface::new(&context, window.clone()).map_err(|err| {
            warn!(error = %err, "failed to create CPU window surface");
            InitError::ContextCreationFailed
        })?;

        let mut cpu = Self {
            surface,
            _context: context,
            size: window.inner_size(),
        };
        cpu.configure().map_err(|err| {
            warn!(error = %err, "failed to size CPU window surface");
            InitError::ContextCreationFailed
        })?;
        debug!(width = cpu.size.width, height = cpu.size.height, "CPU surface ready");
        Ok(cpu)
    }

    fn configure(&mut self) -> Result<()> {
        let (Some(width), Some(height)) = (
            NonZeroU32::new(self.size.width),
            NonZeroU32::new(self.size.height),
        ) else {
            return Ok(());
        };
        self.surface
            .resize(width, height)
            .map_err(|err| anyhow!("failed to resize CPU surface: {err}"))
    }
}

impl PixelSink for CpuSurface {
    fn label(&self) -> &str {
        "cpu surface"
    }

    fn surface_size(&self) -> PhysicalSize<u32> {
        self.size
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.size = size;
        if let Err(err) = self.configure() {
            warn!(error = %err, "CPU surface resize failed");
        }
    }

    fn present(&mut self, image: &RgbaImage) -> Result<FrameOutcome> {
        if self.size.width == 0 || self.size.height == 0 {
            return Ok(FrameOutcome::Skipped);
        }
        let mut buffer = self
            .surface
            .buffer_mut()
            .map_err(|err| anyhow!("failed to map CPU surface: {err}"))?;
        scale_into(image, self.size, &mut buffer);
        buffer
            .present()
            .map_err(|err| anyhow!("failed to present CPU surface: {err}"))?;
        Ok(FrameOutcome::Presented)
    }

    fn destroy(self: Box<Self>) {
        debug!("releasing CPU surface");
    }
}

/// Nearest-neighbour stretch of `image` over a `target`-sized buffer of
/// `0x00RRGGBB` pixels.
pub(crate) fn scale_into(image: &RgbaImage, target: PhysicalSize<u32>, out: &mut [u32]) {
    let (src_width, src_height) = image.dimensions();
    if src_width == 0 || src_height == 0 {
        return;
    }
    let width = target.width as usize;
    for (index, pixel) in out.iter_mut().enumerate() {
        let x = (index % width) as u64;
        let y = (index / width) as u64;
        let src_x = (x * u64::from(src_width) / u64::from(target.width.max(1))) as u32;
        let src_y = (y * u64::from(src_height) / u64::from(target.height.max(1))) as u32;
        let [r, g, b, _] = image
            .get_pixel(src_x.min(src_width - 1), src_y.min(src_height - 1))
            .0;
        *pixel = (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn stretches_low_resolution_frames_over_the_window() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(1, 0, Rgba([0, 16, 32, 255]));

        let mut out = vec![0u32; 4 * 2];
        scale_into(&image, PhysicalSize::new(4, 2), &mut out);
        assert_eq!(
            out,
            vec![
                0xff0000, 0xff0000, 0x001020, 0x001020, //
                0xff0000, 0xff0000, 0x001020, 0x001020,
            ]
        );
    }

    #[test]
    fn full_resolution_frames_copy_one_to_one() {
        let mut image = RgbaImage::new(3, 2);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            *pixel = Rgba([x as u8, y as u8, 7, 255]);
        }
        let mut out = vec![0u32; 6];
        scale_into(&image, PhysicalSize::new(3, 2), &mut out);
        assert_eq!(out[4], (1 << 16) | (1 << 8) | 7);
        assert_eq!(out[2], (2 << 16) | 7);
    }
}
