use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use estately_workflow::Workflow;

use super::utils::print_report;

#[derive(Subcommand)]
pub enum BackfillCommands {
    /// Add a form definition to every project without a submission for it
    Form {
        /// Form definition ID
        id: String,
    },
    /// Add upload tasks for a document definition to every project
    Document {
        /// Document definition ID
        id: String,
    },
    /// Generate a contract template's contract in every project
    Contract {
        /// Contract template ID
        id: String,
    },
}

pub async fn provision(workflow: &Workflow, project_id: &str) -> Result<()> {
    println!("{}", format!("Provisioning project {}", project_id).blue().bold());
    let report = workflow
        .provision_project(project_id)
        .await
        .with_context(|| format!("Failed to provision project {}", project_id))?;
    print_report(&report);
    Ok(())
}

pub async fn handle_backfill_command(workflow: &Workflow, command: BackfillCommands) -> Result<()> {
    let (kind, id, report) = match command {
        BackfillCommands::Form { id } => {
            let report = workflow.backfill_form(&id).await;
            ("form", id, report)
        }
        BackfillCommands::Document { id } => {
            let report = workflow.backfill_document(&id).await;
            ("document", id, report)
        }
        BackfillCommands::Contract { id } => {
            let report = workflow.backfill_contract(&id).await;
            ("contract", id, report)
        }
    };

    let report = report.with_context(|| format!("Failed to backfill {} {}", kind, id))?;
    println!("{}", format!("Backfilled {} {}", kind, id).blue().bold());
    print_report(&report);
    Ok(())
}
