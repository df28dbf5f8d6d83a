use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use estately_core::types::Viewer;
use estately_workflow::{Participant, ProjectStatus, Workflow};

use super::utils::{check, format_date, new_table, task_type_label, truncate};

#[derive(Args)]
pub struct StatusArgs {
    /// Project ID
    pub project: String,
    /// Profile ID to view the project as
    #[arg(long)]
    pub viewer: String,
    /// View with admin rights
    #[arg(long)]
    pub admin: bool,
    /// Print JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

pub async fn show_status(workflow: &Workflow, args: StatusArgs) -> Result<()> {
    let viewer = Viewer::new(args.viewer, args.admin);
    let status = workflow
        .project_status(&args.project, &viewer)
        .await
        .with_context(|| format!("Failed to load status for project {}", args.project))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    print_status(&status);
    Ok(())
}

fn participants(list: &[Participant]) -> String {
    list.iter()
        .map(|p| {
            let who = p
                .name
                .clone()
                .or_else(|| p.profile_id.clone())
                .unwrap_or_else(|| "unassigned".to_string());
            let role = serde_json::to_value(p.role)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            format!("{} {} {}", check(p.complete), role, who)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_status(status: &ProjectStatus) {
    println!("{}", format!("Closing status - {}", status.project_id).blue().bold());
    println!();

    if !status.contracts.is_empty() {
        println!("{}", "Contracts".bold());
        let mut table = new_table();
        table.set_header(vec!["Title", "Status", "Signers"]);
        for view in &status.contracts {
            table.add_row(vec![
                truncate(&view.contract.title, 30),
                view.contract.status.to_string(),
                participants(&view.participants),
            ]);
        }
        println!("{}", table);
    }

    if !status.forms.is_empty() {
        println!("{}", "Forms".bold());
        let mut table = new_table();
        table.set_header(vec!["Title", "Status", "Participants", "Editable"]);
        for view in &status.forms {
            table.add_row(vec![
                truncate(&view.form.title, 30),
                view.form.status.to_string(),
                participants(&view.participants),
                if view.read_only { "no" } else { "yes" }.to_string(),
            ]);
        }
        println!("{}", table);
    }

    if !status.docs.is_empty() {
        println!("{}", "Documents".bold());
        let mut table = new_table();
        table.set_header(vec!["Requirement", "Visibility", "Provided by"]);
        for view in &status.docs {
            table.add_row(vec![
                truncate(&view.title, 30),
                format!("{:?}", view.visibility).to_lowercase(),
                participants(&view.participants),
            ]);
        }
        println!("{}", table);
    }

    if status.tasks.is_empty() {
        println!("{}", "No tasks".dimmed());
    } else {
        println!("{}", "Tasks".bold());
        let mut table = new_table();
        table.set_header(vec!["Title", "Type", "Status", "Assignee", "Due"]);
        for task in &status.tasks {
            let mut state = task.status.to_string();
            if task.needs_review {
                state.push_str(" (review)");
            }
            table.add_row(vec![
                truncate(&task.title, 40),
                task_type_label(task.task_type).to_string(),
                state,
                task.assignee_id.clone().unwrap_or_else(|| "—".to_string()),
                format_date(task.due_date),
            ]);
        }
        println!("{}", table);
    }
}
