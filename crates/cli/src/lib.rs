pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "tripflow",
    about = "Tripflow operator CLI",
    long_about = "Operate Tripflow runtime readiness, migrations, demo data, config inspection and workflow tables.",
    after_help = "Examples:\n  tripflow doctor --json\n  tripflow migrate\n  tripflow workflow claims"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run startup preflight checks and return structured status output")]
    Start,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo user directory (one user per role, idempotent)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, database, migrations, uploads and notification readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print the approval chain and statuses of a request module")]
    Workflow {
        #[arg(help = "Module: trf, claims, visa, transport or accommodation")]
        module: String,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start => commands::start::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Workflow { module, json } => commands::workflow::run(&module, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
