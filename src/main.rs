use std::process::ExitCode;

fn main() -> ExitCode {
    codeflow_health::cli::run()
}
