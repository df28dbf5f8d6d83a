// ABOUTME: Shared CLI output helpers
// ABOUTME: Table presets, provisioning report rendering and small formatters

use chrono::{DateTime, Utc};
use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use estately_core::types::TaskType;
use estately_workflow::ProvisionReport;
use std::path::Path;

pub fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn print_report(report: &ProvisionReport) {
    println!(
        "Created {} tasks, {} forms, {} contracts",
        report.created_tasks.len().to_string().cyan(),
        report.created_forms.len().to_string().cyan(),
        report.created_contracts.len().to_string().cyan(),
    );
    if !report.skipped_projects.is_empty() {
        println!(
            "{} {} projects already had it: {}",
            "Skipped".dimmed(),
            report.skipped_projects.len(),
            report.skipped_projects.join(", ").dimmed()
        );
    }
    for failure in &report.failures {
        println!("{} {}", "Failed:".red().bold(), failure);
    }
    if report.is_clean() {
        println!("{}", "Done".green().bold());
    }
}

pub fn check(done: bool) -> ColoredString {
    if done {
        "✓".green()
    } else {
        "·".yellow()
    }
}

pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "—".to_string())
}

pub fn task_type_label(task_type: TaskType) -> &'static str {
    match task_type {
        TaskType::DocumentUpload => "upload",
        TaskType::FormSubmission => "form",
        TaskType::Signature => "signature",
        TaskType::Personal => "personal",
        TaskType::General => "general",
    }
}

pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// Content type from the file extension; unknown types upload as octet-stream
pub fn content_type_for(path: &Path) -> mime::Mime {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => mime::APPLICATION_PDF,
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "txt" => mime::TEXT_PLAIN,
        "json" => mime::APPLICATION_JSON,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}
