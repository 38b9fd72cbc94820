use std::fmt;

/// 8-bit RGB colour as configured by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels as floats in `[0, 255]`, the space the shaders divide by 255.
    pub fn channels(self) -> [f64; 3] {
        [self.r as f64, self.g as f64, self.b as f64]
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(value: [u8; 3]) -> Self {
        Self::new(value[0], value[1], value[2])
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Maps raw kernel output from `[-1, 1]` onto the gradient axis `[0, 1]`.
pub fn to_unit(noise: f64) -> f64 {
    (noise + 1.0) / 2.0
}

/// Interpolates between `primary` and `secondary` at `value`.
///
/// `value` is a position on the gradient axis where 0 is `primary` and 1 is
/// `secondary`. With `clamp` the position is pinned to `[0, 1]`; without it
/// positions outside that range extrapolate past the endpoints. The result is
/// in `[0, 255]` channel space and may leave it when unclamped.
pub fn map_color(value: f64, primary: Rgb, secondary: Rgb, clamp: bool) -> [f64; 3] {
    let t = if clamp { value.clamp(0.0, 1.0) } else { value };
    let p = primary.channels();
    let s = secondary.channels();
    [
        p[0] + (s[0] - p[0]) * t,
        p[1] + (s[1] - p[1]) * t,
        p[2] + (s[2] - p[2]) * t,
    ]
}

/// Full post-kernel colour stage: remap, optional clamp, interpolate.
pub fn shade(noise: f64, primary: Rgb, secondary: Rgb, clamp: bool) -> [f64; 3] {
    map_color(to_unit(noise), primary, secondary, clamp)
}

/// Packs a mapped colour into an opaque RGBA8 pixel.
///
/// Overshooting channels saturate, like the shader paths writing out of range
/// values into a unorm target.
pub fn to_rgba8(color: [f64; 3]) -> [u8; 4] {
    let channel = |value: f64| value.round().clamp(0.0, 255.0) as u8;
    [channel(color[0]), channel(color[1]), channel(color[2]), 255]
}

#[cfg(test)]
mod tests {
    use super::*;

    const PALETTE: [Rgb; 5] = [
        Rgb::new(0, 110, 255),
        Rgb::new(26, 0, 132),
        Rgb::new(255, 255, 255),
        Rgb::new(0, 0, 0),
        Rgb::new(200, 17, 64),
    ];

    #[test]
    fn clamped_endpoints_hit_configured_colours() {
        for primary in PALETTE {
            for secondary in PALETTE {
                assert_eq!(map_color(0.0, primary, secondary, true), primary.channels());
                assert_eq!(map_color(1.0, primary, secondary, true), secondary.channels());
            }
        }
    }

    #[test]
    fn overshoot_only_without_clamp() {
        let primary = Rgb::new(0, 110, 255);
        let secondary = Rgb::new(26, 0, 132);

        let unclamped = map_color(1.5, primary, secondary, false);
        assert!(unclamped[0] > 26.0);
        assert!(unclamped[1] < 0.0);
        assert!(unclamped[2] < 132.0);

        let clamped = map_color(1.5, primary, secondary, true);
        assert_eq!(clamped, secondary.channels());
        assert_eq!(map_color(-0.5, primary, secondary, true), primary.channels());
    }

    #[test]
    fn shade_remaps_kernel_range() {
        let primary = Rgb::new(10, 20, 30);
        let secondary = Rgb::new(110, 120, 130);
        assert_eq!(shade(-1.0, primary, secondary, false), primary.channels());
        assert_eq!(shade(1.0, primary, secondary, false), secondary.channels());
        assert_eq!(shade(0.0, primary, secondary, false), [60.0, 70.0, 80.0]);
    }

    #[test]
    fn rgba_packing_saturates() {
        assert_eq!(to_rgba8([-12.0, 127.6, 300.0]), [0, 128, 255, 255]);
    }

    #[test]
    fn display_formats_as_hex() {
        assert_eq!(Rgb::new(0, 110, 255).to_string(), "#006eff");
    }
}
