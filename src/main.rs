// Entrypoint for the CLI application.
// - Keeps `main` small: load configuration, activate the launcher and hand
//   it to the menu loop.
// - Returns `anyhow::Result` so startup problems print a readable error.

use hostme_deploy::{config::Config, launcher::Launcher, telemetry, ui::main_menu};

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing(telemetry::env_filter())?;

    // `HOSTME_*` environment variables, see `config::Config::from_env`.
    let config = Config::from_env()?;
    let launcher = Launcher::activate(config)?;

    // Blocks until the user picks "Exit".
    main_menu(launcher)?;
    Ok(())
}
