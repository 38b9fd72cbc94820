use anyhow::Result;
use noisefield::Renderer;
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::AppPaths;
use crate::settings::{apply_overrides, load_file, renderer_config};

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    tracing::debug!(
        config_dir = %paths.config_dir().display(),
        explicit = ?args.config,
        "resolved noisewall paths"
    );

    let file = apply_overrides(load_file(&args, &paths)?, &args)?;
    let config = renderer_config(&file, !args.no_fallback);
    tracing::info!(
        backend = %config.settings.backend,
        octaves = config.settings.noise.octaves,
        primary = %config.settings.color.primary,
        secondary = %config.settings.color.secondary,
        paused = config.settings.status.is_paused(),
        "bootstrapping noisewall"
    );

    Renderer::new(config).run()
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
