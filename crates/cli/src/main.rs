use std::process::ExitCode;

fn main() -> ExitCode {
    workflow_cli::run()
}
