use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::expr::CompareOp;

/// Version of the variable/operator table. Bump it together with the
/// evaluator and the offline check-in clients whenever a variable or an
/// operator is added.
pub const CATALOG_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarType {
    Product,
    Variation,
    Datetime,
    Int,
}

impl VarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VarType::Product => "product",
            VarType::Variation => "variation",
            VarType::Datetime => "datetime",
            VarType::Int => "int",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Built-in variables: name, label, type.
pub const VARS: &[(&str, &str, VarType)] = &[
    ("product", "Product", VarType::Product),
    ("variation", "Product variation", VarType::Variation),
    ("now", "Current date and time", VarType::Datetime),
    ("entries_number", "Number of previous entries", VarType::Int),
    (
        "entries_today",
        "Number of previous entries since midnight",
        VarType::Int,
    ),
    (
        "entries_days",
        "Number of days with a previous entry",
        VarType::Int,
    ),
    (
        "minutes_since_last_entry",
        "Minutes since last entry (-1 on first entry)",
        VarType::Int,
    ),
    (
        "minutes_since_first_entry",
        "Minutes since first entry (-1 on first entry)",
        VarType::Int,
    ),
];

/// Built-in operators per variable type: type, operator, label, cardinality.
pub const TYPEOPS: &[(VarType, CompareOp, &str, usize)] = &[
    (VarType::Product, CompareOp::InList, "is one of", 2),
    (VarType::Variation, CompareOp::InList, "is one of", 2),
    (VarType::Datetime, CompareOp::IsBefore, "is before", 2),
    (VarType::Datetime, CompareOp::IsAfter, "is after", 2),
    (VarType::Int, CompareOp::Lt, "<", 2),
    (VarType::Int, CompareOp::Lte, "≤", 2),
    (VarType::Int, CompareOp::Gt, ">", 2),
    (VarType::Int, CompareOp::Gte, "≥", 2),
    (VarType::Int, CompareOp::Eq, "=", 2),
    (VarType::Int, CompareOp::Ne, "≠", 2),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub var_type: VarType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSpec {
    pub op: CompareOp,
    pub label: String,
    /// Number of operand slots, the variable reference included.
    pub cardinality: usize,
}

/// Variable and operator table shared by every implementation of the rule
/// language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub version: u32,
    pub vars: Vec<Variable>,
    pub typeops: BTreeMap<VarType, Vec<OperatorSpec>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    /// The table shipped with this crate.
    pub fn builtin() -> Self {
        let vars = VARS
            .iter()
            .map(|(name, label, var_type)| Variable {
                name: (*name).to_string(),
                label: (*label).to_string(),
                var_type: *var_type,
            })
            .collect();

        let mut typeops: BTreeMap<VarType, Vec<OperatorSpec>> = BTreeMap::new();
        for (var_type, op, label, cardinality) in TYPEOPS {
            typeops.entry(*var_type).or_default().push(OperatorSpec {
                op: *op,
                label: (*label).to_string(),
                cardinality: *cardinality,
            });
        }

        Self {
            version: CATALOG_VERSION,
            vars,
            typeops,
        }
    }

    /// Loads an override table from a YAML or JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RuleError> {
        crate::loader::load_catalog(path)
    }

    pub fn variables(&self) -> &[Variable] {
        &self.vars
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.vars.iter().find(|var| var.name == name)
    }

    pub fn var_type(&self, name: &str) -> Option<VarType> {
        self.variable(name).map(|var| var.var_type)
    }

    pub fn operators_for(&self, var_type: VarType) -> &[OperatorSpec] {
        self.typeops
            .get(&var_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn operator(&self, var_type: VarType, op: CompareOp) -> Option<&OperatorSpec> {
        self.operators_for(var_type)
            .iter()
            .find(|spec| spec.op == op)
    }

    pub fn is_operator_allowed(&self, var_type: VarType, op: CompareOp) -> bool {
        self.operator(var_type, op).is_some()
    }

    /// Checks the table is usable: unique variable names and at least one
    /// operator for every variable type in use.
    pub fn validate(&self) -> Result<(), RuleError> {
        let mut seen = HashSet::new();
        for var in &self.vars {
            if !seen.insert(var.name.as_str()) {
                return Err(RuleError::Catalog(format!(
                    "duplicate variable {}",
                    var.name
                )));
            }
            if self.operators_for(var.var_type).is_empty() {
                return Err(RuleError::Catalog(format!(
                    "variable {} has type {} without operators",
                    var.name, var.var_type
                )));
            }
        }
        Ok(())
    }
}
