mod cli;
mod paths;
mod run;
mod settings;

use anyhow::Result;
use cli::{Command, ConfigAction, RunArgs};
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Config(config_cmd)) => handle_config_command(config_cmd.action, &cli.run),
        None => run::run(cli.run),
    }
}

fn handle_config_command(action: ConfigAction, args: &RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;

    match action {
        ConfigAction::Where => run_config_where(&paths, args),
        ConfigAction::Show => run_config_show(&paths, args),
        ConfigAction::Init { force } => run_config_init(&paths, args, force),
    }
}

fn run_config_where(paths: &AppPaths, args: &RunArgs) -> Result<()> {
    let file = args.config.clone().unwrap_or_else(|| paths.config_file());
    println!("Configuration:");
    println!("  dir:    {}", paths.config_dir().display());
    println!(
        "  file:   {} ({})",
        file.display(),
        if file.exists() { "present" } else { "missing" }
    );
    Ok(())
}

fn run_config_show(paths: &AppPaths, args: &RunArgs) -> Result<()> {
    let file = settings::apply_overrides(settings::load_file(args, paths)?, args)?;
    print!("{}", file.to_toml_string()?);
    Ok(())
}

fn run_config_init(paths: &AppPaths, args: &RunArgs, force: bool) -> Result<()> {
    let path = args.config.clone().unwrap_or_else(|| paths.config_file());
    settings::init_file(&path, force)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
