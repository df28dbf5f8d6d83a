use clap::{Parser, Subcommand};
use colored::*;
use std::process;

mod cli;

use cli::backfill::BackfillCommands;
use cli::documents::{DeleteDocumentArgs, UploadArgs};
use cli::signing::SignRequestCommands;
use cli::status::StatusArgs;
use estately_cli::{connect, init_tracing, CliConfig};

#[derive(Parser)]
#[command(name = "estately")]
#[command(about = "Estately - closing-requirements workflows for real-estate projects")]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply every auto-add requirement to a project
    Provision {
        /// Project ID
        #[arg(short, long)]
        project: String,
    },
    /// Roll a requirement out to every existing project
    #[command(subcommand)]
    Backfill(BackfillCommands),
    /// Show a project's closing status as a given viewer sees it
    Status(StatusArgs),
    /// Upload a document for a project requirement
    Upload(UploadArgs),
    /// Delete an uploaded document and undo the tasks it completed
    DeleteDocument(DeleteDocumentArgs),
    /// Manage standalone sign requests
    #[command(subcommand)]
    SignRequest(SignRequestCommands),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    let config = CliConfig::from_env()?;
    let workflow = connect(&config).await?;

    match command {
        Commands::Provision { project } => cli::backfill::provision(&workflow, &project).await,
        Commands::Backfill(cmd) => cli::backfill::handle_backfill_command(&workflow, cmd).await,
        Commands::Status(args) => cli::status::show_status(&workflow, args).await,
        Commands::Upload(args) => cli::documents::upload(&workflow, args).await,
        Commands::DeleteDocument(args) => cli::documents::delete(&workflow, args).await,
        Commands::SignRequest(cmd) => cli::signing::handle_sign_request_command(&workflow, cmd).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_status() {
        let cli = Cli::try_parse_from([
            "estately", "status", "project-1", "--viewer", "buyer-profile", "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Status(args) => {
                assert_eq!(args.project, "project-1");
                assert_eq!(args.viewer, "buyer-profile");
                assert!(!args.admin);
                assert!(args.json);
            }
            _ => panic!("expected status command"),
        }
    }

    #[test]
    fn test_parse_backfill_and_upload() {
        let cli = Cli::try_parse_from(["estately", "-v", "backfill", "form", "kyc"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Backfill(BackfillCommands::Form { ref id }) if id == "kyc"
        ));

        let cli = Cli::try_parse_from([
            "estately", "upload", "--user", "u1", "--project", "p1", "passport.pdf",
        ])
        .unwrap();
        match cli.command {
            Commands::Upload(args) => assert_eq!(args.definition, "general"),
            _ => panic!("expected upload command"),
        }
    }
}
