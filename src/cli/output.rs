// Output formatting utilities

use crate::models::{Pipeline, Project};
use chrono::{Local, TimeZone};

/// Format timestamp for display
pub fn format_timestamp(ts: i64) -> String {
    match Local.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ts.to_string(),
    }
}

/// Format pipelines as a table, newest first as given
pub fn format_pipeline_table(pipelines: &[Pipeline]) -> String {
    if pipelines.is_empty() {
        return "No pipelines found.".to_string();
    }

    let name_width = pipelines
        .iter()
        .map(|p| p.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);
    let project_width = pipelines
        .iter()
        .map(|p| p.project_id.chars().count())
        .max()
        .unwrap_or(0)
        .max(7);

    let mut lines = Vec::with_capacity(pipelines.len() + 2);
    lines.push(format!(
        "{:<6} {:<pw$} {:<nw$} {:<8} {}",
        "ID", "Project", "Name", "Creator", "Created",
        pw = project_width,
        nw = name_width
    ));
    lines.push("-".repeat(6 + project_width + name_width + 8 + 19 + 4));
    for p in pipelines {
        lines.push(format!(
            "{:<6} {:<pw$} {:<nw$} {:<8} {}",
            p.id,
            p.project_id,
            p.name,
            p.creator_uid,
            format_timestamp(p.created_ts),
            pw = project_width,
            nw = name_width
        ));
    }
    lines.join("\n")
}

/// Format a single pipeline as key/value lines
pub fn format_pipeline_summary(p: &Pipeline) -> String {
    [
        format!("Pipeline {}", p.id),
        format!("  Name:     {}", p.name),
        format!("  Project:  {}", p.project_id),
        format!("  Creator:  {}", p.creator_uid),
        format!("  Updater:  {}", p.updater_uid),
        format!("  Created:  {}", format_timestamp(p.created_ts)),
        format!("  Updated:  {}", format_timestamp(p.updated_ts)),
    ]
    .join("\n")
}

pub fn format_project_table(projects: &[Project]) -> String {
    if projects.is_empty() {
        return "No projects found.".to_string();
    }

    let mut lines = vec![
        format!("{:<6} {:<24} {}", "ID", "Resource", "Title"),
        "-".repeat(56),
    ];
    for project in projects {
        lines.push(format!(
            "{:<6} {:<24} {}",
            project.id, project.resource_id, project.title
        ));
    }
    lines.join("\n")
}
