//! Display formatting for CLI output
//!
//! SBIO pattern: Pure functions that format data for display

use super::commands::ClusterPlan;
use crate::cluster::{CreateReport, NodeRecord, TeardownOutcome, TeardownReport};

// ============================================================================
// Table formatting helpers
// ============================================================================

/// Format a simple table with headers and rows
pub fn format_table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "No resources found.\n".to_string();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut output = String::new();

    for (i, header) in headers.iter().enumerate() {
        if i > 0 {
            output.push_str("   ");
        }
        output.push_str(&format!(
            "{:width$}",
            header.to_uppercase(),
            width = widths[i]
        ));
    }
    output.push('\n');

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                output.push_str("   ");
            }
            if i < widths.len() {
                output.push_str(&format!("{:width$}", cell, width = widths[i]));
            } else {
                output.push_str(cell);
            }
        }
        output.push('\n');
    }

    output
}

// ============================================================================
// Node display
// ============================================================================

/// Format allocated nodes for display
pub fn format_node_table(nodes: &[NodeRecord]) -> String {
    let headers = &["ROLE", "NODE ID", "CONTAINER", "ADDRESS", "HOST PORT"];
    let rows: Vec<Vec<String>> = nodes
        .iter()
        .map(|n| {
            vec![
                n.role.to_string(),
                n.node_id.to_string(),
                n.container_name.clone(),
                n.address.to_string(),
                n.host_port
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();

    format_table(headers, rows)
}

/// Format a dry-run plan
pub fn format_plan(plan: &ClusterPlan, show_config: bool) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Network: {} ({})\n",
        plan.network.name,
        plan.network.subnet()
    ));
    output.push_str(&format!(
        "Shape:   1 management, {} data, {} sql\n\n",
        plan.spec.data_nodes(),
        plan.spec.sql_nodes()
    ));
    output.push_str(&format_node_table(&plan.nodes));

    if show_config {
        output.push_str("\nmysql-cluster.cnf:\n");
        output.push_str(&plan.artifact);
    }

    output
}

/// Format the result of a successful create
pub fn format_create_report(report: &CreateReport) -> String {
    let mut output = format_node_table(&report.nodes);
    output.push_str(&format!(
        "\nCluster ready on network {}. Config: {}\n",
        report.network.name,
        report.artifact_path.display()
    ));
    output
}

fn outcome_label(outcome: TeardownOutcome) -> &'static str {
    match outcome {
        TeardownOutcome::Removed => "removed",
        TeardownOutcome::AlreadyAbsent => "absent",
        TeardownOutcome::Failed => "FAILED",
    }
}

/// Format the result of a delete
pub fn format_teardown_report(report: &TeardownReport) -> String {
    let headers = &["RESOURCE", "KIND", "RESULT"];
    let mut rows: Vec<Vec<String>> = report
        .containers
        .iter()
        .map(|(name, outcome)| {
            vec![
                name.clone(),
                "container".to_string(),
                outcome_label(*outcome).to_string(),
            ]
        })
        .collect();
    if let Some((name, outcome)) = &report.network {
        rows.push(vec![
            name.clone(),
            "network".to_string(),
            outcome_label(*outcome).to_string(),
        ]);
    }

    let mut output = format_table(headers, rows);
    output.push_str(&format!(
        "\n{} removed, {} already absent, {} failed\n",
        report.count(TeardownOutcome::Removed),
        report.count(TeardownOutcome::AlreadyAbsent),
        report.failures.len()
    ));

    for failure in &report.failures {
        output.push_str(&format!(
            "  {} {}: {}\n",
            failure.action, failure.resource, failure.error
        ));
    }

    output
}
