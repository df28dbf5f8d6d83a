use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use colored::*;
use estately_core::types::{ParentType, SignRequest, SignRequestStatus};
use estately_workflow::{SignatureInput, Workflow};

use super::utils::{check, format_date, new_table};

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ParentKind {
    Form,
    Document,
}

impl From<ParentKind> for ParentType {
    fn from(kind: ParentKind) -> Self {
        match kind {
            ParentKind::Form => ParentType::Form,
            ParentKind::Document => ParentType::Document,
        }
    }
}

#[derive(Subcommand)]
pub enum SignRequestCommands {
    /// Ask one or more profiles to sign a form or document
    Create {
        /// ID of the form submission or document
        #[arg(long)]
        parent: String,
        #[arg(long, value_enum)]
        parent_type: ParentKind,
        #[arg(short, long)]
        project: String,
        /// Profile that must sign (repeatable)
        #[arg(short, long = "signer", required = true)]
        signers: Vec<String>,
    },
    /// Record a signature
    Add {
        /// Sign request ID
        id: String,
        #[arg(long)]
        profile: String,
        /// Signature image as a data URL or link
        #[arg(long)]
        signature: String,
        #[arg(long)]
        ip: Option<String>,
    },
    /// Withdraw a signature
    Remove {
        /// Sign request ID
        id: String,
        #[arg(long)]
        profile: String,
    },
    /// List a project's sign requests
    List {
        #[arg(short, long)]
        project: String,
    },
}

pub async fn handle_sign_request_command(workflow: &Workflow, command: SignRequestCommands) -> Result<()> {
    match command {
        SignRequestCommands::Create {
            parent,
            parent_type,
            project,
            signers,
        } => {
            let request = workflow
                .create_sign_request(&parent, parent_type.into(), &project, &signers)
                .await
                .context("Failed to create sign request")?;
            println!("{} {}", "Created sign request".green().bold(), request.id.cyan());
            print_request(&request);
        }
        SignRequestCommands::Add {
            id,
            profile,
            signature,
            ip,
        } => {
            let input = SignatureInput {
                ip_address: ip,
                ..SignatureInput::new(signature)
            };
            let request = workflow
                .add_signature(&id, &profile, input)
                .await
                .with_context(|| format!("Failed to sign {}", id))?;
            print_request(&request);
        }
        SignRequestCommands::Remove { id, profile } => {
            let request = workflow
                .remove_signature(&id, &profile)
                .await
                .with_context(|| format!("Failed to remove signature from {}", id))?;
            print_request(&request);
        }
        SignRequestCommands::List { project } => {
            let requests = workflow.project_sign_requests(&project).await?;
            if requests.is_empty() {
                println!("{}", "No sign requests found".yellow());
                return Ok(());
            }
            for request in &requests {
                println!("{} {}", "Sign request".blue().bold(), request.id);
                print_request(request);
            }
        }
    }
    Ok(())
}

fn print_request(request: &SignRequest) {
    let status = match request.status {
        SignRequestStatus::Completed => request.status.to_string().green(),
        SignRequestStatus::Pending => request.status.to_string().yellow(),
        _ => request.status.to_string().red(),
    };
    println!("  Status: {}", status);

    let mut table = new_table();
    table.set_header(vec!["Signer", "Signed", "At"]);
    for signer in &request.required_signers {
        table.add_row(vec![
            signer.profile_id.clone(),
            check(signer.signed).to_string(),
            format_date(signer.signed_at),
        ]);
    }
    println!("{}", table);
}
