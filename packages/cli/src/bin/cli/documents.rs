use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use estately_workflow::{TaskMatch, UploadRequest, Workflow};
use std::path::PathBuf;

use super::utils::content_type_for;

#[derive(Args)]
pub struct UploadArgs {
    /// Account (or profile) ID of the uploader
    #[arg(short, long)]
    pub user: String,
    /// Project ID
    #[arg(short, long)]
    pub project: String,
    /// Document definition ID; `general` for an ad hoc upload
    #[arg(short, long, default_value = "general")]
    pub definition: String,
    /// File to upload
    pub file: PathBuf,
}

#[derive(Args)]
pub struct DeleteDocumentArgs {
    /// Object-store key of the upload
    pub file_id: String,
}

pub async fn upload(workflow: &Workflow, args: UploadArgs) -> Result<()> {
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let file_name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .context("Upload path has no file name")?;

    let outcome = workflow
        .upload_document(UploadRequest {
            user_id: args.user,
            definition_id: args.definition,
            project_id: args.project,
            file_name,
            content_type: content_type_for(&args.file).to_string(),
            bytes,
        })
        .await
        .context("Upload failed")?;

    println!("{} {}", "Uploaded".green().bold(), outcome.file_id);
    println!("  Document: {}", outcome.document_id.cyan());
    println!("  URL:      {}", outcome.file_url.dimmed());
    match outcome.completed_task {
        Some(TaskMatch::Linked(id)) => println!("  Completed task {}", id.cyan()),
        Some(TaskMatch::Heuristic(id)) => println!(
            "  Completed task {} {}",
            id.cyan(),
            "(matched by title, needs review)".yellow()
        ),
        None => println!("  {}", "No open task matched".dimmed()),
    }
    Ok(())
}

pub async fn delete(workflow: &Workflow, args: DeleteDocumentArgs) -> Result<()> {
    let removal = workflow
        .delete_document(&args.file_id)
        .await
        .with_context(|| format!("Failed to delete {}", args.file_id))?;

    println!("{} {}", "Deleted".green().bold(), args.file_id);
    println!(
        "  Records removed: {}, profiles updated: {}",
        removal.removed_records.to_string().cyan(),
        removal.updated_profiles.to_string().cyan()
    );
    for task_id in &removal.reverted_tasks {
        println!("  Task {} is back to todo", task_id.cyan());
    }
    Ok(())
}
