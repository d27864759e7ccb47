//! Rewrites rules into disjunctive normal form: an `or` of `and`s of
//! leaves. Used for export and analysis; the editor keeps the user's own
//! nesting.

use tracing::warn;

use crate::error::RuleError;
use crate::expr::{Expr, OpArgs, OpNode};

/// Operators the rewrite cannot see through. They are passed on unchanged.
const UNSUPPORTED_OPERATORS: [&str; 4] = ["!", "!!", "?:", "if"];

/// Returns the DNF of `expr` without touching the input.
///
/// The fixpoint compares trees structurally and operand order counts, so two
/// trees that only differ in order are considered different.
pub fn to_dnf(expr: &Expr) -> Expr {
    let mut current = expr.clone();
    loop {
        let next = normalize_children(distribute_or_over_and(current.clone()));
        if next == current {
            break;
        }
        current = next;
    }
    flatten_chained(current)
}

/// Like [`to_dnf`], but refuses rules whose normal form would hold more
/// than `max_terms` conjunctions.
pub fn to_dnf_bounded(expr: &Expr, max_terms: usize) -> Result<Expr, RuleError> {
    let terms = dnf_term_count(expr);
    if terms > max_terms {
        return Err(RuleError::DnfTooLarge {
            terms,
            max: max_terms,
        });
    }
    Ok(to_dnf(expr))
}

/// Number of conjunctions the normal form of `expr` holds, counting those
/// nested inside operators the rewrite passes through. Saturates instead
/// of overflowing.
pub fn dnf_term_count(expr: &Expr) -> usize {
    match expr {
        Expr::Or(children) => children
            .iter()
            .fold(0usize, |total, child| total.saturating_add(dnf_term_count(child)))
            .max(1),
        Expr::And(children) => children.iter().fold(1usize, |total, child| {
            total.saturating_mul(dnf_term_count(child))
        }),
        Expr::Op(OpNode { args, .. }) => match args {
            OpArgs::List(items) => items
                .iter()
                .fold(0usize, |total, item| total.saturating_add(dnf_term_count(item)))
                .max(1),
            OpArgs::Single(item) => dnf_term_count(item),
        },
        _ => 1,
    }
}

/// One distribution step at the top of `expr`: the first `or` operand of an
/// `and` is spread over the remaining operands.
fn distribute_or_over_and(expr: Expr) -> Expr {
    match expr {
        Expr::And(mut operands) => {
            let Some(position) = operands
                .iter()
                .position(|operand| matches!(operand, Expr::Or(_)))
            else {
                return Expr::And(operands);
            };
            let values = match operands.remove(position) {
                Expr::Or(values) => values,
                other => {
                    operands.insert(position, other);
                    return Expr::And(operands);
                }
            };

            Expr::Or(
                values
                    .into_iter()
                    .map(|value| {
                        let mut combined = operands.clone();
                        combined.push(value);
                        Expr::And(combined)
                    })
                    .collect(),
            )
        }
        other => {
            if let Some(op) = other.operator() {
                if UNSUPPORTED_OPERATORS.contains(&op) {
                    warn!(
                        operator = op,
                        "operator not supported by DNF conversion, leaving it unchanged"
                    );
                }
            }
            other
        }
    }
}

fn normalize_children(expr: Expr) -> Expr {
    match expr {
        Expr::And(children) => Expr::And(children.iter().map(to_dnf).collect()),
        Expr::Or(children) => Expr::Or(children.iter().map(to_dnf).collect()),
        Expr::Op(OpNode { op, args }) => {
            let args = match args {
                OpArgs::List(items) => OpArgs::List(items.iter().map(to_dnf).collect()),
                OpArgs::Single(item) => OpArgs::Single(Box::new(to_dnf(&item))),
            };
            Expr::Op(OpNode { op, args })
        }
        other => other,
    }
}

/// Splices children keyed by the same connective into their parent:
/// `(a or b) or (c or d)` becomes `a or b or c or d`.
fn flatten_chained(expr: Expr) -> Expr {
    match expr {
        Expr::And(children) => Expr::And(
            children
                .into_iter()
                .flat_map(|child| match child {
                    Expr::And(inner) => inner,
                    other => vec![other],
                })
                .collect(),
        ),
        Expr::Or(children) => Expr::Or(
            children
                .into_iter()
                .flat_map(|child| match child {
                    Expr::Or(inner) => inner,
                    other => vec![other],
                })
                .collect(),
        ),
        other => other,
    }
}
