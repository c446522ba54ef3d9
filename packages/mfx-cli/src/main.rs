use clap::Parser;

mod cli;
mod commands;
mod exit_codes;
mod output;
mod params;

use cli::Cli;

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let exit_code = match cli.command {
        cli::Command::Mask(args) => commands::mask::execute(args),
        cli::Command::Segment(args) => commands::segment::execute(args),
        cli::Command::Peaks(args) => commands::peaks::execute(args),
        cli::Command::Report(args) => commands::report::execute(args),
        cli::Command::All(args) => commands::all::execute(args),
    };

    std::process::exit(exit_code);
}
