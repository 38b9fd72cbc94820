use std::path::PathBuf;

use clap::{Parser, Subcommand};
use noiseconfig::{BackendSetting, HexColor};

#[derive(Parser, Debug)]
#[command(
    name = "noisewall",
    author,
    version,
    about = "Animated fractal simplex noise renderer",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Configuration file to load instead of the one in the config directory.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Preferred backend: `software`, `shader`, or `gpu`.
    #[arg(long, value_name = "BACKEND")]
    pub backend: Option<BackendSetting>,

    /// Initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<WindowSize>,

    /// Start with the animation paused.
    #[arg(long)]
    pub paused: bool,

    /// Clamp the gradient instead of letting colours overshoot.
    #[arg(long)]
    pub clamp: bool,

    /// Primary gradient colour as `#rrggbb`.
    #[arg(long, value_name = "HEX")]
    pub primary: Option<HexColor>,

    /// Secondary gradient colour as `#rrggbb`.
    #[arg(long, value_name = "HEX")]
    pub secondary: Option<HexColor>,

    #[arg(long, value_name = "N")]
    pub octaves: Option<u32>,

    #[arg(long, value_name = "FREQ")]
    pub freq: Option<f64>,

    #[arg(long, value_name = "AMP")]
    pub amp: Option<f64>,

    #[arg(long, value_name = "HARDNESS")]
    pub hardness: Option<f64>,

    #[arg(long, value_name = "LACUNARITY")]
    pub lacunarity: Option<f64>,

    /// Resolution fraction for the software backend (0-1].
    #[arg(long, value_name = "SCALE")]
    pub pixel_scale: Option<f32>,

    /// Optional FPS cap (0=uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Fail instead of downgrading when the preferred backend cannot start.
    #[arg(long)]
    pub no_fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect or create the configuration file.
    Config(ConfigCommand),
}

#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the resolved configuration directory and file.
    Where,
    /// Print the effective configuration file, defaults filled in.
    Show,
    /// Write a configuration file populated with the defaults.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<WindowSize, String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1920x1080".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size argument".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size argument".to_string())?;

    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".to_string());
    }

    Ok(WindowSize { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(
            parse_size("1920x1080"),
            Ok(WindowSize {
                width: 1920,
                height: 1080
            })
        );
        assert_eq!(
            parse_size(" 640 X 480 "),
            Ok(WindowSize {
                width: 640,
                height: 480
            })
        );
        assert!(parse_size("0x480").is_err());
        assert!(parse_size("640").is_err());
        assert!(parse_size("wide x tall").is_err());
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "noisewall",
            "--backend",
            "webgl",
            "--primary",
            "#ff8800",
            "--octaves",
            "3",
            "--paused",
            "--no-fallback",
        ])
        .expect("parse flags");
        assert_eq!(cli.run.backend, Some(BackendSetting::Shader));
        assert_eq!(cli.run.primary, Some(HexColor([0xff, 0x88, 0x00])));
        assert_eq!(cli.run.octaves, Some(3));
        assert!(cli.run.paused);
        assert!(cli.run.no_fallback);
        assert!(cli.command.is_none());
    }

    #[test]
    fn rejects_bad_colour_flags() {
        assert!(Cli::try_parse_from(["noisewall", "--secondary", "blue"]).is_err());
    }

    #[test]
    fn parses_config_subcommands() {
        let cli = Cli::try_parse_from(["noisewall", "config", "init", "--force"])
            .expect("parse subcommand");
        assert!(matches!(
            cli.command,
            Some(Command::Config(ConfigCommand {
                action: ConfigAction::Init { force: true }
            }))
        ));
    }
}
