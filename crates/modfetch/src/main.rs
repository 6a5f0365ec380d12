//! `modfetch` — resumable, chunk-parallel, checksum-verified downloader
//! for model artifacts. This binary wires the configuration loader, CLI
//! surface, and `modfetch-*` library crates together; it owns no business
//! logic of its own (spec section 1: "Surrounding functionality ... is
//! treated as external collaborators").

mod batch;
mod cli;
mod commands;
mod config;
mod exit;
mod logging;
mod targets;

use clap::Parser;

use cli::{App, Command};
use config::Settings;
use exit::CliError;

#[tokio::main]
async fn main() {
    let app = App::parse();
    logging::init(app.log_format, app.verbose);

    let code = match run(&app).await {
        Ok(()) => exit::OK,
        Err(err) => {
            eprintln!("error: {}", err.message);
            err.code
        }
    };
    std::process::exit(code);
}

async fn run(app: &App) -> Result<(), CliError> {
    // `completions` and `config` don't need a resolved config file read
    // ahead of time the way the other subcommands do.
    if let Command::Completions(args) = &app.command {
        commands::completions::run(args);
        return Ok(());
    }
    if let Command::Config(args) = &app.command {
        return commands::config_cmd::run(&app.config, &args.action);
    }

    let settings = Settings::load(&app.config)?;

    match &app.command {
        Command::Download(args) => commands::download::run(&settings, args).await,
        Command::Verify(args) => commands::verify::run(args),
        Command::Place(args) => commands::place::run(&settings, args),
        Command::Clean(args) => commands::clean::run(&settings, args),
        Command::State(sub) => commands::state::run(&settings, sub),
        Command::Completions(_) | Command::Config(_) => unreachable!("handled above"),
    }
}
