pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "docflow",
    about = "Docflow operator CLI",
    long_about = "Operate the Docflow approval engine: migrations, demo data, config inspection, readiness checks, and read-only workflow queries.",
    after_help = "Examples:\n  docflow doctor --json\n  docflow config\n  docflow smoke\n  docflow inbox --actor 3"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Register the demo participant directory (idempotent)")]
    Seed,
    #[command(about = "Run end-to-end readiness checks including a sample approval route")]
    Smoke,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity, and schema readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List approval steps an actor can decide right now")]
    Inbox {
        #[arg(long, help = "Participant id")]
        actor: i64,
    },
    #[command(about = "Show a document with its approval line")]
    Show {
        #[arg(long, help = "Document id")]
        document: i64,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Smoke => commands::smoke::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Inbox { actor } => commands::workflow::inbox(actor),
        Command::Show { document } => commands::workflow::show(document),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
