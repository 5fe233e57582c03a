//! `transync` - source-to-target translation tree synchronizer.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use transync::cli::{Cli, Command};
use transync::{engine, exit_codes};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let workspace = &cli.workspace;
    let result = match cli.command {
        Command::Sync(args) => engine::sync(workspace, args),
        Command::Apply(args) => engine::apply(workspace, args),
        Command::Auto(args) => engine::auto(workspace, args),
        Command::Status(args) => engine::status(workspace, args),
        Command::Events(args) => engine::events(workspace, args),
        Command::Schema => engine::schema(),
    };
    let exit_code = match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_codes::for_error(&err)
        }
    };
    std::process::exit(exit_code);
}
