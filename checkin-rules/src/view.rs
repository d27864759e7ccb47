//! Control tree of the rule editor: one row per node with the selections
//! and operand widgets the node resolves to. Incomplete nodes simply leave
//! fields empty.

use serde::Serialize;

use crate::catalog::{Catalog, VarType};
use crate::editor::NodePath;
use crate::expr::{CompareOp, Comparison, Expr, Operand, TimeSpec};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    pub path: NodePath,
    pub control: Control,
    pub children: Vec<NodeView>,
    /// Remove/duplicate buttons are only offered below the root.
    pub removable: bool,
    /// Cut button, offered on connectives with a single child.
    pub collapsible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Control {
    /// No rule yet: only the variable selector (with and/or) is shown.
    Empty,
    Connective { operator: String },
    Leaf(LeafControls),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LeafControls {
    pub variable: Option<String>,
    pub var_type: Option<VarType>,
    pub operator: Option<CompareOp>,
    pub operator_options: Vec<OperatorOption>,
    pub operand: Option<OperandWidget>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorOption {
    pub op: CompareOp,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum OperandWidget {
    Number {
        value: Option<i64>,
    },
    /// Multi-select of products or variations, showing one chip per entry.
    Chips {
        var_type: VarType,
        chips: Vec<String>,
    },
    DateTime {
        time: Option<TimeSpec>,
        tolerance: Option<i64>,
    },
}

pub fn build(root: &Expr, catalog: &Catalog) -> NodeView {
    build_node(root, NodePath::root(), catalog)
}

fn build_node(expr: &Expr, path: NodePath, catalog: &Catalog) -> NodeView {
    let removable = !path.is_root();
    let (control, children) = match expr {
        Expr::Empty => (Control::Empty, Vec::new()),
        Expr::And(items) | Expr::Or(items) => {
            let operator = expr.operator().unwrap_or_default().to_string();
            let children = items
                .iter()
                .enumerate()
                .map(|(index, child)| build_node(child, path.child(index), catalog))
                .collect();
            (Control::Connective { operator }, children)
        }
        Expr::Compare(comparison) => (
            Control::Leaf(comparison_controls(comparison, catalog)),
            Vec::new(),
        ),
        Expr::Pending(var) => {
            let var_type = catalog.var_type(var);
            let controls = LeafControls {
                variable: Some(var.clone()),
                var_type,
                operator_options: operator_options(var_type, catalog),
                ..LeafControls::default()
            };
            (Control::Leaf(controls), Vec::new())
        }
        Expr::Unset | Expr::Op(_) | Expr::Literal(_) => {
            (Control::Leaf(LeafControls::default()), Vec::new())
        }
    };

    let collapsible = children.len() == 1;
    NodeView {
        path,
        control,
        children,
        removable,
        collapsible,
    }
}

fn comparison_controls(comparison: &Comparison, catalog: &Catalog) -> LeafControls {
    let var_type = comparison
        .var
        .as_deref()
        .and_then(|var| catalog.var_type(var));
    let operand = var_type.and_then(|var_type| operand_widget(var_type, comparison));

    LeafControls {
        variable: comparison.var.clone(),
        var_type,
        operator: Some(comparison.op),
        operator_options: operator_options(var_type, catalog),
        operand,
    }
}

fn operator_options(var_type: Option<VarType>, catalog: &Catalog) -> Vec<OperatorOption> {
    var_type
        .map(|var_type| {
            catalog
                .operators_for(var_type)
                .iter()
                .map(|spec| OperatorOption {
                    op: spec.op,
                    label: spec.label.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn operand_widget(var_type: VarType, comparison: &Comparison) -> Option<OperandWidget> {
    match (var_type, comparison.op) {
        (VarType::Int, op) if !matches!(op, CompareOp::InList) && !op.accepts_tolerance() => {
            let value = match comparison.operand {
                Some(Operand::Int(value)) => Some(value),
                _ => None,
            };
            Some(OperandWidget::Number { value })
        }
        (VarType::Product | VarType::Variation, CompareOp::InList) => {
            let chips = match &comparison.operand {
                Some(Operand::ObjectList(items)) => {
                    items.iter().map(|item| item.text.clone()).collect()
                }
                _ => Vec::new(),
            };
            Some(OperandWidget::Chips { var_type, chips })
        }
        (VarType::Datetime, op) if op.accepts_tolerance() => {
            let time = match &comparison.operand {
                Some(Operand::BuildTime(spec)) => Some(spec.clone()),
                _ => None,
            };
            Some(OperandWidget::DateTime {
                time,
                tolerance: comparison.tolerance,
            })
        }
        _ => None,
    }
}
