use std::process::ExitCode;

fn main() -> ExitCode {
    botdesk_cli::run()
}
