use std::process::ExitCode;

fn main() -> ExitCode {
    calcgrade::cli::run()
}
