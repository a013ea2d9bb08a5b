pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::register_team::RegisterTeamArgs;

#[derive(Debug, Parser)]
#[command(
    name = "reviewbot",
    about = "Reviewbot operator CLI",
    long_about = "Operate the review bridge: migrations, config inspection, readiness checks and team registration.",
    after_help = "Examples:\n  reviewbot doctor --json\n  reviewbot register-team --team-id T123 --business-unit-id 5a1b\n  reviewbot feeds --team-id T123"
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
    #[command(about = "Validate config, review platform credentials, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Register a business unit for a Slack team, optionally storing bot credentials")]
    RegisterTeam {
        #[arg(long)]
        team_id: String,
        #[arg(long)]
        business_unit_id: String,
        #[arg(long)]
        bot_user_id: Option<String>,
        #[arg(long)]
        bot_name: Option<String>,
        #[arg(long, env = "REVIEWBOT_BOT_TOKEN", hide_env_values = true)]
        bot_token: Option<String>,
    },
    #[command(about = "List the effective feeds of a team as JSON")]
    Feeds {
        #[arg(long)]
        team_id: String,
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
            let (output, passed) = commands::doctor::run(json);
            commands::CommandResult { exit_code: if passed { 0 } else { 1 }, output }
        }
        Command::RegisterTeam { team_id, business_unit_id, bot_user_id, bot_name, bot_token } => {
            commands::register_team::run(&RegisterTeamArgs {
                team_id,
                business_unit_id,
                bot_user_id,
                bot_name,
                bot_token,
            })
        }
        Command::Feeds { team_id } => commands::feeds::run(&team_id),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
