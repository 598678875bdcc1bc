pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "botdesk",
    about = "Botdesk operator CLI",
    long_about = "Operate the Botdesk bot service: migrations, config inspection, readiness checks, offline quotes, and stored request listings.",
    after_help = "Examples:\n  botdesk doctor --json\n  botdesk quote basic_bot,database_support\n  botdesk requests --limit 5"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, bot token shape, notifier mode, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Price a comma-separated feature list against the built-in table")]
    Quote {
        #[arg(help = "Feature ids, e.g. `basic_bot,payment_integration`")]
        features: String,
    },
    #[command(about = "List the most recent stored requests")]
    Requests {
        #[arg(long, default_value_t = commands::requests::DEFAULT_LIMIT)]
        limit: u32,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Quote { features } => commands::quote::run(&features),
        Command::Requests { limit } => commands::requests::run(limit),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
