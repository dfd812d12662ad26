use clap::Parser;
use quantpanel::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
