use std::path::Path;

use checkin_core::CheckinError;
use checkin_rules::{
    describe, describe_time, Catalog, Control, FlowGraph, LeafControls, LookupError, LookupPage,
    NodePath, NodeView, OperandWidget, RuleError,
};
use colored::*;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Core(#[from] CheckinError),
    #[error("failed to write {path}: {message}")]
    Write { path: String, message: String },
    #[error("{0}")]
    Validation(String),
    #[error("rule service failed: {0}")]
    Serve(String),
}

impl CliError {
    pub fn write(path: &Path, err: impl std::fmt::Display) -> Self {
        CliError::Write {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// One row of the editor tree as printed on the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLine {
    pub depth: usize,
    pub path: String,
    pub text: String,
}

pub fn tree_lines(view: &NodeView, catalog: &Catalog) -> Vec<TreeLine> {
    let mut lines = Vec::new();
    collect_lines(view, catalog, 0, &mut lines);
    lines
}

fn collect_lines(view: &NodeView, catalog: &Catalog, depth: usize, lines: &mut Vec<TreeLine>) {
    let text = match &view.control {
        Control::Empty => "(no rule)".to_string(),
        Control::Connective { operator } => operator.to_uppercase(),
        Control::Leaf(controls) => leaf_text(controls, catalog),
    };
    lines.push(TreeLine {
        depth,
        path: view.path.to_string(),
        text,
    });
    for child in &view.children {
        collect_lines(child, catalog, depth + 1, lines);
    }
}

fn leaf_text(controls: &LeafControls, catalog: &Catalog) -> String {
    let variable = match controls.variable.as_deref() {
        Some(name) => catalog
            .variable(name)
            .map(|var| var.label.clone())
            .unwrap_or_else(|| name.to_string()),
        None => return "(choose a variable)".to_string(),
    };
    let operator = match controls.operator {
        Some(op) => controls
            .operator_options
            .iter()
            .find(|option| option.op == op)
            .map(|option| option.label.clone())
            .unwrap_or_else(|| op.to_string()),
        None => return format!("{} (choose an operator)", variable),
    };

    let operand = match &controls.operand {
        Some(OperandWidget::Number { value }) => value
            .map(|value| value.to_string())
            .unwrap_or_else(|| "_".to_string()),
        Some(OperandWidget::Chips { chips, .. }) if chips.is_empty() => "(nothing selected)".into(),
        Some(OperandWidget::Chips { chips, .. }) => chips.join(", "),
        Some(OperandWidget::DateTime { time, tolerance }) => {
            let mut text = time
                .as_ref()
                .map(describe_time)
                .unwrap_or_else(|| "_".to_string());
            if let Some(minutes) = tolerance {
                text.push_str(&format!(" ±{} min", minutes));
            }
            text
        }
        None => String::new(),
    };

    if operand.is_empty() {
        format!("{} {}", variable, operator)
    } else {
        format!("{} {} {}", variable, operator, operand)
    }
}

pub fn print_tree(view: &NodeView, catalog: &Catalog) {
    for line in tree_lines(view, catalog) {
        println!(
            "{}{} {}",
            "  ".repeat(line.depth),
            format!("[{}]", line.path).dimmed(),
            line.text
        );
    }
}

pub fn print_graph(graph: &FlowGraph, catalog: &Catalog) {
    if graph.is_empty() {
        println!("{}", "✔ empty rule, every ticket is admitted".green());
        return;
    }
    println!(
        "{} {} boxes, {} columns, {} rows",
        "Graph:".bold(),
        graph.nodes.len(),
        graph.columns,
        graph.height
    );

    let rollup = graph.results_incl_parents();
    let mut nodes: Vec<_> = graph.nodes.iter().collect();
    nodes.sort_by_key(|node| (node.column, node.row));
    for node in nodes {
        let marker = match rollup.get(node.id).copied().flatten() {
            Some(true) => "✔".green(),
            Some(false) => "✘".red(),
            None => "·".normal(),
        };
        let next: Vec<String> = node.children.iter().map(|id| id.to_string()).collect();
        println!(
            "  {} #{:<3} col {:<2} row {:<2} {}{}",
            marker,
            node.id,
            node.column,
            node.row,
            describe(&node.rule, catalog),
            if next.is_empty() {
                String::new()
            } else {
                format!("  → {}", next.join(", ")).dimmed().to_string()
            }
        );
    }
}

pub fn print_edit_applied(command: &str, path: &NodePath, revision: u64) {
    println!(
        "{} {} at {} (revision {})",
        "✔ Applied".green().bold(),
        command.bold(),
        path,
        revision
    );
}

pub fn print_lookup_page(page: &LookupPage) {
    if page.results.is_empty() {
        println!("{}", "No matches".yellow());
        return;
    }
    for result in &page.results {
        println!("  {:>8}  {}", result.id.to_string().bold(), result.text);
    }
    if page.pagination.more {
        println!("{}", "  … more results on the next page".dimmed());
    }
}
