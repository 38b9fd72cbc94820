use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `#rrggbb` colour; the leading `#` is optional when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexColor(pub [u8; 3]);

impl FromStr for HexColor {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if digits.len() != 6 || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(format!("invalid colour '{value}'; expected #rrggbb"));
        }
        let channel = |index: usize| {
            u8::from_str_radix(&digits[index..index + 2], 16)
                .map_err(|err| format!("invalid colour '{value}': {err}"))
        };
        Ok(Self([channel(0)?, channel(2)?, channel(4)?]))
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

impl Serialize for HexColor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Visitor;
        impl de::Visitor<'_> for Visitor {
            type Value = HexColor;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a colour string such as \"#006eff\"")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(Visitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusSetting {
    #[default]
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendSetting {
    Software,
    Shader,
    #[default]
    Gpu,
}

impl<'de> Deserialize<'de> for BackendSetting {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_backend(&raw).map_err(de::Error::custom)
    }
}

impl FromStr for BackendSetting {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_backend(value)
    }
}

impl fmt::Display for BackendSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendSetting::Software => "software",
            BackendSetting::Shader => "shader",
            BackendSetting::Gpu => "gpu",
        })
    }
}

fn parse_backend(raw: &str) -> Result<BackendSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "software" | "basic" | "cpu" => Ok(BackendSetting::Software),
        "shader" | "intermediate" | "webgl" => Ok(BackendSetting::Shader),
        "gpu" | "accelerated" | "webgpu" | "wgpu" => Ok(BackendSetting::Gpu),
        other => Err(format!("invalid backend '{other}'")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NoiseSection {
    pub freq: f64,
    pub amp: f64,
    pub hardness: f64,
    pub octaves: u32,
    pub lacunarity: f64,
}

impl Default for NoiseSection {
    fn default() -> Self {
        Self {
            freq: 0.75,
            amp: 0.25,
            hardness: 1.25,
            octaves: 8,
            lacunarity: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorSection {
    pub primary: HexColor,
    pub secondary: HexColor,
}

impl Default for ColorSection {
    fn default() -> Self {
        Self {
            primary: HexColor([0x00, 0x6e, 0xff]),
            secondary: HexColor([0x1a, 0x00, 0x84]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraSection {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    /// Euler angles in radians.
    pub rotation: [f32; 3],
    /// Pins the plane scale; when absent the plane is fitted to the view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f32; 3]>,
    pub eye: [f32; 3],
    pub center: [f32; 3],
    pub up: [f32; 3],
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            fov: 75.0,
            near: 0.1,
            far: 1000.0,
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: None,
            eye: [0.0, 0.0, 5.0],
            center: [0.0; 3],
            up: [0.0, 1.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowSection {
    pub width: u32,
    pub height: u32,
    /// Fraction of the window resolution the software backend renders at.
    pub pixel_scale: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f32>,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            pixel_scale: 0.25,
            fps: None,
        }
    }
}

/// The configuration file. Every section is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoiseFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub clamp: bool,
    #[serde(default)]
    pub status: StatusSetting,
    #[serde(default)]
    pub backend: BackendSetting,
    #[serde(default)]
    pub noise: NoiseSection,
    #[serde(default)]
    pub color: ColorSection,
    #[serde(default)]
    pub camera: CameraSection,
    #[serde(default)]
    pub window: WindowSection,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

impl Default for NoiseFile {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            clamp: false,
            status: StatusSetting::default(),
            backend: BackendSetting::default(),
            noise: NoiseSection::default(),
            color: ColorSection::default(),
            camera: CameraSection::default(),
            window: WindowSection::default(),
        }
    }
}

impl NoiseFile {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: NoiseFile = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads `path` when it exists, otherwise returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|err| ConfigError::Invalid(format!("failed to serialise configuration: {err}")))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CURRENT_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CURRENT_VERSION}",
                self.version
            )));
        }

        let noise = &self.noise;
        for (name, value) in [
            ("freq", noise.freq),
            ("amp", noise.amp),
            ("hardness", noise.hardness),
            ("lacunarity", noise.lacunarity),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "noise.{name} must be a non-negative number"
                )));
            }
        }

        let camera = &self.camera;
        if !(camera.fov > 0.0 && camera.fov < 180.0) {
            return Err(ConfigError::Invalid(
                "camera.fov must be between 0 and 180 degrees".into(),
            ));
        }
        if !(camera.near > 0.0) || camera.near >= camera.far {
            return Err(ConfigError::Invalid(format!(
                "camera.near ({}) must be positive and less than camera.far ({})",
                camera.near, camera.far
            )));
        }
        if camera.eye == camera.center {
            return Err(ConfigError::Invalid(
                "camera.eye and camera.center must differ".into(),
            ));
        }
        let forward = sub(camera.center, camera.eye);
        if length(cross(forward, camera.up)) <= f32::EPSILON * length(forward) {
            return Err(ConfigError::Invalid(
                "camera.up must not be zero or parallel to the view direction".into(),
            ));
        }

        let window = &self.window;
        if window.width == 0 || window.height == 0 {
            return Err(ConfigError::Invalid(
                "window.width and window.height must be greater than zero".into(),
            ));
        }
        if !(window.pixel_scale > 0.0 && window.pixel_scale <= 1.0) {
            return Err(ConfigError::Invalid(
                "window.pixel_scale must be in (0, 1]".into(),
            ));
        }
        if let Some(fps) = window.fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid("window.fps must be >= 0".into()));
            }
        }

        Ok(())
    }
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn length(v: [f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
version = 1
clamp = true
status = "paused"
backend = "webgl"

[noise]
freq = 1.5
octaves = 4

[color]
primary = "ff0000"
secondary = "#00FF7f"

[camera]
fov = 60.0
scale = [2.0, 1.0, 1.0]

[window]
width = 800
height = 600
pixel_scale = 0.5
fps = 30
"##;

    #[test]
    fn parses_sample_config() {
        let config = NoiseFile::from_toml_str(SAMPLE).expect("parse config");
        assert!(config.clamp);
        assert_eq!(config.status, StatusSetting::Paused);
        assert_eq!(config.backend, BackendSetting::Shader);
        assert_eq!(config.noise.freq, 1.5);
        assert_eq!(config.noise.octaves, 4);
        assert_eq!(config.noise.amp, 0.25, "unset fields keep their defaults");
        assert_eq!(config.color.primary, HexColor([0xff, 0x00, 0x00]));
        assert_eq!(config.color.secondary, HexColor([0x00, 0xff, 0x7f]));
        assert_eq!(config.camera.scale, Some([2.0, 1.0, 1.0]));
        assert_eq!(config.camera.eye, [0.0, 0.0, 5.0]);
        assert_eq!(config.window.fps, Some(30.0));
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config = NoiseFile::from_toml_str("").expect("empty config");
        assert_eq!(config, NoiseFile::default());
        assert_eq!(config.color.primary.to_string(), "#006eff");
        assert_eq!(config.color.secondary.to_string(), "#1a0084");
        assert_eq!(config.backend, BackendSetting::Gpu);
    }

    #[test]
    fn serialised_defaults_parse_back() {
        let rendered = NoiseFile::default().to_toml_string().expect("serialise");
        assert!(rendered.contains("primary = \"#006eff\""));
        let parsed = NoiseFile::from_toml_str(&rendered).expect("reparse");
        assert_eq!(parsed, NoiseFile::default());
    }

    #[test]
    fn rejects_malformed_colours() {
        for bad in ["#12345", "#gg0000", "red", "#1234567"] {
            let input = format!("[color]\nprimary = \"{bad}\"\n");
            let err = NoiseFile::from_toml_str(&input).unwrap_err();
            assert!(matches!(err, ConfigError::Parse(_)), "{bad} should be rejected");
        }
    }

    #[test]
    fn rejects_negative_noise_parameters() {
        let err = NoiseFile::from_toml_str("[noise]\nhardness = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("hardness")));
    }

    #[test]
    fn rejects_inverted_clip_planes() {
        let err = NoiseFile::from_toml_str("[camera]\nnear = 10.0\nfar = 1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_degenerate_up_vectors() {
        for up in ["[0.0, 0.0, 1.0]", "[0.0, 0.0, -3.0]", "[0.0, 0.0, 0.0]"] {
            let input = format!("[camera]\nup = {up}\n");
            let err = NoiseFile::from_toml_str(&input).unwrap_err();
            assert!(
                matches!(&err, ConfigError::Invalid(message) if message.contains("camera.up")),
                "{up}: {err}"
            );
        }

        let tilted = NoiseFile::from_toml_str("[camera]\nup = [0.0, 1.0, 1.0]\n");
        assert!(tilted.is_ok());
    }

    #[test]
    fn rejects_bad_window_settings() {
        for input in [
            "[window]\nwidth = 0\n",
            "[window]\npixel_scale = 0.0\n",
            "[window]\npixel_scale = 1.5\n",
        ] {
            let err = NoiseFile::from_toml_str(input).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{input}");
        }
    }

    #[test]
    fn rejects_unknown_version_and_fields() {
        let err = NoiseFile::from_toml_str("version = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = NoiseFile::from_toml_str("[noise]\nspeed = 1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn parses_backend_aliases() {
        assert_eq!(parse_backend("CPU"), Ok(BackendSetting::Software));
        assert_eq!(parse_backend("intermediate"), Ok(BackendSetting::Shader));
        assert_eq!(parse_backend("wgpu"), Ok(BackendSetting::Gpu));
        assert!(parse_backend("metal").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.toml");
        let config = NoiseFile::load_or_default(&path).expect("defaults");
        assert_eq!(config, NoiseFile::default());

        std::fs::write(&path, "clamp = true\n").expect("write config");
        assert!(NoiseFile::load_or_default(&path).expect("load").clamp);
    }
}
