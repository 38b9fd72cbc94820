use bytemuck::{Pod, Zeroable};

use crate::params::{ColorConfig, NoiseConfig, TransformConfig};

/// Transform buffer (binding 0), 128 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct TransformUniform {
    pub resolution: [f32; 2],
    _padding0: [f32; 2],
    /// fov in radians, aspect, near, far.
    pub projection: [f32; 4],
    pub position: [f32; 3],
    _padding1: f32,
    pub rotation: [f32; 3],
    _padding2: f32,
    pub scale: [f32; 3],
    _padding3: f32,
    pub eye: [f32; 3],
    _padding4: f32,
    pub center: [f32; 3],
    _padding5: f32,
    pub up: [f32; 3],
    _padding6: f32,
}

impl TransformUniform {
    pub fn from_config(transform: &TransformConfig) -> Self {
        let (width, height) = transform.resolution();
        let projection = transform.projection();
        Self {
            resolution: [width as f32, height as f32],
            _padding0: [0.0; 2],
            projection: [
                projection.fov.to_radians(),
                projection.aspect(),
                projection.near,
                projection.far,
            ],
            position: transform.model.position,
            _padding1: 0.0,
            rotation: transform.model.rotation,
            _padding2: 0.0,
            scale: transform.model.scale,
            _padding3: 0.0,
            eye: transform.view.eye,
            _padding4: 0.0,
            center: transform.view.center,
            _padding5: 0.0,
            up: transform.view.up,
            _padding6: 0.0,
        }
    }
}

/// Time buffer (binding 1).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct TimeUniform {
    pub time: f32,
}

/// Noise buffer (binding 2); octaves travel as a float.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct NoiseUniform {
    pub freq: f32,
    pub amp: f32,
    pub hardness: f32,
    pub octaves: f32,
    pub lacunarity: f32,
}

impl NoiseUniform {
    pub fn from_config(noise: &NoiseConfig) -> Self {
        Self {
            freq: noise.freq as f32,
            amp: noise.amp as f32,
            hardness: noise.hardness as f32,
            octaves: noise.octaves as f32,
            lacunarity: noise.lacunarity as f32,
        }
    }
}

/// Color buffer (binding 3), channels in `[0, 255]`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct ColorUniform {
    pub primary: [f32; 3],
    _padding0: f32,
    pub secondary: [f32; 3],
    _padding1: f32,
}

impl ColorUniform {
    pub fn from_config(color: &ColorConfig) -> Self {
        Self {
            primary: channels(color.primary.channels()),
            _padding0: 0.0,
            secondary: channels(color.secondary.channels()),
            _padding1: 0.0,
        }
    }
}

fn channels(value: [f64; 3]) -> [f32; 3] {
    [value[0] as f32, value[1] as f32, value[2] as f32]
}

/// Clamp buffer (binding 4), 1.0 when clamping.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct ClampUniform {
    pub value: f32,
}

impl ClampUniform {
    pub fn new(clamp: bool) -> Self {
        Self {
            value: if clamp { 1.0 } else { 0.0 },
        }
    }
}

/// std140 block read by the GLSL scene program of the intermediate backend.
///
/// The scalar groups ride in the fourth lane of the transform vectors so the
/// whole parameter set fits in ten 16-byte rows.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SceneUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub clamp: f32,
    pub projection: [f32; 4],
    pub position: [f32; 3],
    pub freq: f32,
    pub rotation: [f32; 3],
    pub amp: f32,
    pub scale: [f32; 3],
    pub hardness: f32,
    pub eye: [f32; 3],
    pub octaves: f32,
    pub center: [f32; 3],
    pub lacunarity: f32,
    pub up: [f32; 3],
    _padding0: f32,
    pub primary: [f32; 3],
    _padding1: f32,
    pub secondary: [f32; 3],
    _padding2: f32,
}

unsafe impl Zeroable for SceneUniforms {}
unsafe impl Pod for SceneUniforms {}

impl SceneUniforms {
    pub fn from_parts(
        transform: &TransformUniform,
        noise: &NoiseUniform,
        color: &ColorUniform,
        clamp: ClampUniform,
        time: f32,
    ) -> Self {
        Self {
            resolution: transform.resolution,
            time,
            clamp: clamp.value,
            projection: transform.projection,
            position: transform.position,
            freq: noise.freq,
            rotation: transform.rotation,
            amp: noise.amp,
            scale: transform.scale,
            hardness: noise.hardness,
            eye: transform.eye,
            octaves: noise.octaves,
            center: transform.center,
            lacunarity: noise.lacunarity,
            up: transform.up,
            _padding0: 0.0,
            primary: color.primary,
            _padding1: 0.0,
            secondary: color.secondary,
            _padding2: 0.0,
        }
    }
}
