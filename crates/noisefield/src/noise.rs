//! Seed-free 3D simplex noise and its fractal sum.
//!
//! This is the host-side twin of `simplex3`/`fractal_noise` in the shader
//! sources: the lattice skew, permutation polynomial, gradient construction
//! and falloff are the same operations in the same order, so the software
//! backend and the shader backends only differ by float precision.

use crate::params::NoiseConfig;

/// Divisor applied to elapsed seconds before looping the time axis.
pub const TIME_LOOP_PERIOD: f64 = 5.0;
/// Scale applied to the looped time axis before multiplying by `amp`.
pub const TIME_LOOP_SCALE: f64 = 5.0;

const SKEW: f64 = 1.0 / 3.0;
const UNSKEW: f64 = 1.0 / 6.0;

fn mod289(x: f64) -> f64 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

fn permute(x: f64) -> f64 {
    mod289(((x * 34.0) + 1.0) * x)
}

fn taylor_inv_sqrt(r: f64) -> f64 {
    1.792_842_914_001_59 - 0.853_734_720_953_14 * r
}

/// GLSL `step`: 0.0 when `x < edge`, 1.0 otherwise.
fn step(edge: f64, x: f64) -> f64 {
    if x < edge {
        0.0
    } else {
        1.0
    }
}

fn dot3(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Single layer of 3D simplex gradient noise, roughly in `[-1, 1]`.
pub fn simplex3(x: f64, y: f64, z: f64) -> f64 {
    let v = [x, y, z];

    // First corner.
    let s = (x + y + z) * SKEW;
    let mut i = [(x + s).floor(), (y + s).floor(), (z + s).floor()];
    let t = (i[0] + i[1] + i[2]) * UNSKEW;
    let x0 = [v[0] - i[0] + t, v[1] - i[1] + t, v[2] - i[2] + t];

    // Remaining corners, ordered by the magnitude of x0's components.
    let g = [step(x0[1], x0[0]), step(x0[2], x0[1]), step(x0[0], x0[2])];
    let l = [1.0 - g[0], 1.0 - g[1], 1.0 - g[2]];
    let i1 = [g[0].min(l[2]), g[1].min(l[0]), g[2].min(l[1])];
    let i2 = [g[0].max(l[2]), g[1].max(l[0]), g[2].max(l[1])];

    let offsets = [[0.0; 3], i1, i2, [1.0; 3]];
    let corners = [
        x0,
        [
            x0[0] - i1[0] + UNSKEW,
            x0[1] - i1[1] + UNSKEW,
            x0[2] - i1[2] + UNSKEW,
        ],
        [
            x0[0] - i2[0] + 2.0 * UNSKEW,
            x0[1] - i2[1] + 2.0 * UNSKEW,
            x0[2] - i2[2] + 2.0 * UNSKEW,
        ],
        [
            x0[0] - 1.0 + 3.0 * UNSKEW,
            x0[1] - 1.0 + 3.0 * UNSKEW,
            x0[2] - 1.0 + 3.0 * UNSKEW,
        ],
    ];

    for axis in &mut i {
        *axis = mod289(*axis);
    }

    // Gradients: 7x7 points over a square, mapped onto an octahedron.
    let n = 1.0 / 7.0;
    let ns = [n * 2.0, n * 0.5 - 1.0, n];

    let mut total = 0.0;
    for (offset, corner) in offsets.iter().zip(corners.iter()) {
        let p = permute(
            permute(permute(i[2] + offset[2]) + i[1] + offset[1]) + i[0] + offset[0],
        );

        let j = p - 49.0 * (p * ns[2] * ns[2]).floor();
        let gx_ = (j * ns[2]).floor();
        let gy_ = (j - 7.0 * gx_).floor();
        let gx = gx_ * ns[0] + ns[1];
        let gy = gy_ * ns[0] + ns[1];
        let h = 1.0 - gx.abs() - gy.abs();
        let sh = -step(h, 0.0);

        let mut gradient = [
            gx + (gx.floor() * 2.0 + 1.0) * sh,
            gy + (gy.floor() * 2.0 + 1.0) * sh,
            h,
        ];
        let norm = taylor_inv_sqrt(dot3(gradient, gradient));
        for component in &mut gradient {
            *component *= norm;
        }

        let falloff = (0.6 - dot3(*corner, *corner)).max(0.0);
        let falloff = falloff * falloff;
        total += falloff * falloff * dot3(gradient, *corner);
    }

    42.0 * total
}

/// Fractal (fBm) sum of `octaves` simplex layers.
///
/// Layer `i` samples at frequency `lacunarity^i` with weight `0.5^i`; zero
/// octaves is the flat field.
pub fn fractal_noise3d(x: f64, y: f64, z: f64, octaves: u32, lacunarity: f64) -> f64 {
    let mut sum = 0.0;
    let mut frequency = 1.0;
    let mut gain = 1.0;
    for _ in 0..octaves {
        sum += gain * simplex3(x * frequency, y * frequency, z * frequency);
        frequency *= lacunarity;
        gain *= 0.5;
    }
    sum
}

/// Bound on `|fractal_noise3d|` implied by the octave weights.
pub fn fractal_bound(octaves: u32) -> f64 {
    2.0 - 2.0_f64.powi(1 - octaves as i32)
}

/// Time axis fed to the kernel: loops smoothly instead of drifting.
pub fn looped_time(elapsed: f64, amp: f64) -> f64 {
    (elapsed / TIME_LOOP_PERIOD).sin() * TIME_LOOP_SCALE * amp
}

/// Evaluates the configured field at normalised surface coordinates.
///
/// `uv` is in `[0, 1]` with `v` pointing up, matching the plane's texture
/// coordinates in the shader backends. The result still carries `hardness`
/// and lives roughly in `[-hardness, hardness]`.
pub fn sample_field(uv: [f64; 2], elapsed: f64, config: &NoiseConfig) -> f64 {
    fractal_noise3d(
        uv[0] * config.freq,
        uv[1] * config.freq,
        looped_time(elapsed, config.amp),
        config.octaves,
        config.lacunarity,
    ) * config.hardness
}
