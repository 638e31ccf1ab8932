use clap::Parser;
use mispricer::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
