//! Tessel CLI entry point: parse arguments, load the project config, set up
//! logging and dispatch.

use clap::Parser;
use miette::Result;
use tessel_cli::{cli, commands, error, logger, ui};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    ui::init_colors();

    run(args).await.map_err(error::cli_error_to_miette)
}

async fn run(args: cli::Cli) -> tessel_cli::Result<()> {
    ui::configure(args.no_color, args.quiet);
    let project = commands::Project::load(args.command.cwd(), args.command.config())?;

    logger::init_logger(
        args.verbose,
        args.quiet,
        args.no_color,
        project.log_level()?,
    );

    match args.command {
        cli::Command::Build(build_args) => commands::build_execute(build_args, project).await,
        cli::Command::Check(check_args) => commands::check_execute(check_args, project),
    }
}
