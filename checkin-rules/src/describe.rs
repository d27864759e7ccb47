use chrono::{DateTime, NaiveTime};

use crate::catalog::Catalog;
use crate::expr::{Comparison, Expr, Operand, TimeKind, TimeSpec};

/// Human readable text of a rule node, as shown inside a diagram box.
pub fn describe(rule: &Expr, catalog: &Catalog) -> String {
    match rule {
        Expr::Empty => "(no rule)".to_string(),
        Expr::And(_) => "and".to_string(),
        Expr::Or(_) => "or".to_string(),
        Expr::Compare(comparison) => describe_comparison(comparison, catalog),
        Expr::Pending(var) => format!("{} (no operator)", variable_label(var, catalog)),
        Expr::Unset => "(empty condition)".to_string(),
        Expr::Op(_) | Expr::Literal(_) => rule.to_json_string(),
    }
}

fn describe_comparison(comparison: &Comparison, catalog: &Catalog) -> String {
    let variable = comparison
        .var
        .as_deref()
        .map(|var| variable_label(var, catalog))
        .unwrap_or_else(|| "?".to_string());
    let operator = comparison
        .var
        .as_deref()
        .and_then(|var| catalog.var_type(var))
        .and_then(|var_type| catalog.operator(var_type, comparison.op))
        .map(|spec| spec.label.clone())
        .unwrap_or_else(|| comparison.op.as_str().to_string());

    let mut text = format!("{} {}", variable, operator);
    if let Some(operand) = &comparison.operand {
        text.push(' ');
        text.push_str(&describe_operand(operand));
    }
    if let Some(minutes) = comparison.tolerance {
        text.push_str(&format!(" (tolerance: {} minutes)", minutes));
    }
    text
}

fn variable_label(var: &str, catalog: &Catalog) -> String {
    catalog
        .variable(var)
        .map(|variable| variable.label.clone())
        .unwrap_or_else(|| var.to_string())
}

fn describe_operand(operand: &Operand) -> String {
    match operand {
        Operand::Int(value) => value.to_string(),
        Operand::ObjectList(items) => items
            .iter()
            .map(|item| item.text.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        Operand::BuildTime(spec) => describe_time(spec),
        Operand::Raw(value) => value.to_string(),
    }
}

pub fn describe_time(spec: &TimeSpec) -> String {
    let value = spec.value.as_deref().unwrap_or_default();
    match spec.kind {
        TimeKind::DateFrom => "event start".to_string(),
        TimeKind::DateTo => "event end".to_string(),
        TimeKind::DateAdmission => "event admission".to_string(),
        TimeKind::Custom => DateTime::parse_from_rfc3339(value)
            .map(|timestamp| timestamp.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|_| value.to_string()),
        TimeKind::CustomTime => NaiveTime::parse_from_str(value, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
            .map(|time| time.format("%H:%M").to_string())
            .unwrap_or_else(|_| value.to_string()),
    }
}
