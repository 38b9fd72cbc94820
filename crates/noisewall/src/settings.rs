//! Merges the configuration file with command-line overrides.

use std::path::Path;

use anyhow::{Context, Result};
use noiseconfig::{BackendSetting, NoiseFile, StatusSetting};
use noisefield::{
    BackendKind, ColorConfig, NoiseConfig, RendererConfig, Rgb, RunStatus, Settings,
    TransformConfig,
};

use crate::cli::RunArgs;
use crate::paths::AppPaths;

/// Loads the file named by `--config`, or the one in the config directory
/// when present.
pub fn load_file(args: &RunArgs, paths: &AppPaths) -> Result<NoiseFile> {
    match &args.config {
        Some(path) => NoiseFile::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display())),
        None => {
            let path = paths.config_file();
            NoiseFile::load_or_default(&path)
                .with_context(|| format!("failed to load configuration {}", path.display()))
        }
    }
}

/// Writes command-line overrides over `file` and revalidates the result.
pub fn apply_overrides(mut file: NoiseFile, args: &RunArgs) -> Result<NoiseFile> {
    if let Some(backend) = args.backend {
        file.backend = backend;
    }
    if let Some(size) = args.size {
        file.window.width = size.width;
        file.window.height = size.height;
    }
    if args.paused {
        file.status = StatusSetting::Paused;
    }
    if args.clamp {
        file.clamp = true;
    }
    if let Some(primary) = args.primary {
        file.color.primary = primary;
    }
    if let Some(secondary) = args.secondary {
        file.color.secondary = secondary;
    }
    if let Some(octaves) = args.octaves {
        file.noise.octaves = octaves;
    }
    if let Some(freq) = args.freq {
        file.noise.freq = freq;
    }
    if let Some(amp) = args.amp {
        file.noise.amp = amp;
    }
    if let Some(hardness) = args.hardness {
        file.noise.hardness = hardness;
    }
    if let Some(lacunarity) = args.lacunarity {
        file.noise.lacunarity = lacunarity;
    }
    if let Some(pixel_scale) = args.pixel_scale {
        file.window.pixel_scale = pixel_scale;
    }
    if let Some(fps) = args.fps {
        file.window.fps = Some(fps);
    }

    file.validate().context("invalid command-line override")?;
    Ok(file)
}

pub fn renderer_config(file: &NoiseFile, allow_fallback: bool) -> RendererConfig {
    let camera = &file.camera;
    let mut transform = TransformConfig::default();
    transform.set_projection(camera.fov, camera.near, camera.far);
    transform.model.position = camera.position;
    transform.model.rotation = camera.rotation;
    transform.view.eye = camera.eye;
    transform.view.center = camera.center;
    transform.view.up = camera.up;
    match camera.scale {
        Some(scale) => {
            transform.fit_model = false;
            transform.model.scale = scale;
        }
        None => transform.fit_model = true,
    }
    transform.set_resolution(file.window.width, file.window.height);

    let settings = Settings {
        noise: NoiseConfig {
            freq: file.noise.freq,
            amp: file.noise.amp,
            hardness: file.noise.hardness,
            octaves: file.noise.octaves,
            lacunarity: file.noise.lacunarity,
        },
        color: ColorConfig {
            primary: Rgb::from(file.color.primary.0),
            secondary: Rgb::from(file.color.secondary.0),
        },
        transform,
        clamp: file.clamp,
        status: match file.status {
            StatusSetting::Running => RunStatus::Running,
            StatusSetting::Paused => RunStatus::Paused,
        },
        backend: backend_kind(file.backend),
    };

    RendererConfig {
        settings,
        allow_fallback,
        pixel_scale: file.window.pixel_scale,
        target_fps: file.window.fps,
        window_size: (file.window.width, file.window.height),
        ..RendererConfig::default()
    }
}

fn backend_kind(setting: BackendSetting) -> BackendKind {
    match setting {
        BackendSetting::Software => BackendKind::Software,
        BackendSetting::Shader => BackendKind::IntermediateShader,
        BackendSetting::Gpu => BackendKind::GpuAccelerated,
    }
}

/// Writes the default configuration to `path`, creating its directory.
pub fn init_file(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let contents = NoiseFile::default().to_toml_string()?;
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::WindowSize;
    use noiseconfig::HexColor;

    #[test]
    fn defaults_map_onto_renderer_settings() {
        let config = renderer_config(&NoiseFile::default(), true);
        assert_eq!(config.settings.noise, NoiseConfig::default());
        assert_eq!(config.settings.color, ColorConfig::default());
        assert_eq!(config.settings.backend, BackendKind::GpuAccelerated);
        assert_eq!(config.settings.status, RunStatus::Running);
        assert_eq!(config.window_size, (1280, 720));
        assert_eq!(config.settings.transform.resolution(), (1280, 720));
        assert!(config.settings.transform.fit_model);
        assert!(config.allow_fallback);
    }

    #[test]
    fn command_line_beats_file_values() {
        let file = NoiseFile::from_toml_str("[noise]\noctaves = 2\nfreq = 3.0\n").unwrap();
        let args = RunArgs {
            octaves: Some(5),
            primary: Some(HexColor([1, 2, 3])),
            size: Some(WindowSize {
                width: 640,
                height: 480,
            }),
            backend: Some(BackendSetting::Software),
            paused: true,
            ..RunArgs::default()
        };

        let merged = apply_overrides(file, &args).unwrap();
        let config = renderer_config(&merged, false);

        assert_eq!(config.settings.noise.octaves, 5);
        assert_eq!(config.settings.noise.freq, 3.0);
        assert_eq!(config.settings.color.primary, Rgb::new(1, 2, 3));
        assert_eq!(config.settings.backend, BackendKind::Software);
        assert_eq!(config.settings.status, RunStatus::Paused);
        assert_eq!(config.window_size, (640, 480));
        assert!((config.settings.transform.projection().aspect() - 640.0 / 480.0).abs() < 1e-6);
        assert!(!config.allow_fallback);
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        let args = RunArgs {
            amp: Some(-0.5),
            ..RunArgs::default()
        };
        assert!(apply_overrides(NoiseFile::default(), &args).is_err());

        let args = RunArgs {
            pixel_scale: Some(2.0),
            ..RunArgs::default()
        };
        assert!(apply_overrides(NoiseFile::default(), &args).is_err());
    }

    #[test]
    fn pinned_scale_disables_view_fitting() {
        let file = NoiseFile::from_toml_str("[camera]\nscale = [3.0, 2.0, 1.0]\n").unwrap();
        let config = renderer_config(&file, true);
        let transform = &config.settings.transform;
        assert!(!transform.fit_model);
        assert_eq!(transform.model.scale, [3.0, 2.0, 1.0]);
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("noisewall.toml");

        init_file(&path, false).unwrap();
        assert_eq!(NoiseFile::load(&path).unwrap(), NoiseFile::default());

        assert!(init_file(&path, false).is_err());
        init_file(&path, true).unwrap();
    }
}
