use clap::Parser;

mod cli;
mod commands;
mod exit_codes;
mod output;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let exit_code = match cli.command {
        cli::Command::Run(args) => commands::run::execute(&cli.config_dir, args).await,
        cli::Command::Discover(args) => commands::discover::execute(&cli.config_dir, args),
        cli::Command::Validate(args) => commands::validate::execute(&cli.config_dir, args),
    };

    std::process::exit(exit_code);
}
