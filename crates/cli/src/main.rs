use std::process::ExitCode;

fn main() -> ExitCode {
    reviewbot_cli::run()
}
