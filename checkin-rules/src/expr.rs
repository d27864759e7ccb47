use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::wire;

/// Comparison operators understood by the check-in evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "inList")]
    InList,
    #[serde(rename = "isBefore")]
    IsBefore,
    #[serde(rename = "isAfter")]
    IsAfter,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl CompareOp {
    pub const ALL: [CompareOp; 9] = [
        CompareOp::InList,
        CompareOp::IsBefore,
        CompareOp::IsAfter,
        CompareOp::Lt,
        CompareOp::Lte,
        CompareOp::Gt,
        CompareOp::Gte,
        CompareOp::Eq,
        CompareOp::Ne,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::InList => "inList",
            CompareOp::IsBefore => "isBefore",
            CompareOp::IsAfter => "isAfter",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == raw)
    }

    /// Whether the operator may carry a tolerance in minutes as third operand.
    pub fn accepts_tolerance(&self) -> bool {
        matches!(self, CompareOp::IsBefore | CompareOp::IsAfter)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a looked-up object. The shop emits integers, older
/// exports carry them as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LookupId {
    Int(i64),
    Str(String),
}

impl fmt::Display for LookupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupId::Int(id) => write!(f, "{}", id),
            LookupId::Str(id) => f.write_str(id),
        }
    }
}

/// One materialized entry of an `objectList` operand. The display text is
/// kept so rules render without another round trip to the shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookup {
    pub kind: String,
    pub id: LookupId,
    pub text: String,
}

impl Lookup {
    pub fn new(kind: impl Into<String>, id: LookupId, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeKind {
    #[serde(rename = "date_from")]
    DateFrom,
    #[serde(rename = "date_to")]
    DateTo,
    #[serde(rename = "date_admission")]
    DateAdmission,
    #[serde(rename = "custom")]
    Custom,
    #[serde(rename = "customtime")]
    CustomTime,
}

impl TimeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeKind::DateFrom => "date_from",
            TimeKind::DateTo => "date_to",
            TimeKind::DateAdmission => "date_admission",
            TimeKind::Custom => "custom",
            TimeKind::CustomTime => "customtime",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "date_from" => Some(TimeKind::DateFrom),
            "date_to" => Some(TimeKind::DateTo),
            "date_admission" => Some(TimeKind::DateAdmission),
            "custom" => Some(TimeKind::Custom),
            "customtime" => Some(TimeKind::CustomTime),
            _ => None,
        }
    }

    /// Whether a literal value accompanies the kind on the wire.
    pub fn takes_value(&self) -> bool {
        matches!(self, TimeKind::Custom | TimeKind::CustomTime)
    }
}

/// Right operand of datetime comparisons (`buildTime`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpec {
    pub kind: TimeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl TimeSpec {
    pub fn new(kind: TimeKind) -> Self {
        Self { kind, value: None }
    }

    pub fn custom(timestamp: impl Into<String>) -> Self {
        Self {
            kind: TimeKind::Custom,
            value: Some(timestamp.into()),
        }
    }

    pub fn custom_time(time_of_day: impl Into<String>) -> Self {
        Self {
            kind: TimeKind::CustomTime,
            value: Some(time_of_day.into()),
        }
    }
}

/// Right operand of a comparison leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Int(i64),
    ObjectList(Vec<Lookup>),
    BuildTime(TimeSpec),
    /// Anything else found in the slot, kept verbatim.
    Raw(Value),
}

/// A leaf condition `{op: [{"var": name}, operand, tolerance]}`.
///
/// Missing trailing slots mean the user has not set them yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub op: CompareOp,
    pub var: Option<String>,
    pub operand: Option<Operand>,
    pub tolerance: Option<i64>,
    /// Evaluation annotation (`__result`) injected by rule testing.
    pub result: Option<bool>,
}

impl Comparison {
    pub fn new(op: CompareOp, var: impl Into<String>) -> Self {
        Self {
            op,
            var: Some(var.into()),
            operand: None,
            tolerance: None,
            result: None,
        }
    }

    pub fn with_operand(mut self, operand: Operand) -> Self {
        self.operand = Some(operand);
        self
    }

    pub fn with_tolerance(mut self, minutes: i64) -> Self {
        self.tolerance = Some(minutes);
        self
    }

    pub fn with_result(mut self, result: bool) -> Self {
        self.result = Some(result);
        self
    }
}

/// Arguments of an operator this crate does not model explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum OpArgs {
    List(Vec<Expr>),
    Single(Box<Expr>),
}

/// Any other single-key operator node (`!`, `if`, `var`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct OpNode {
    pub op: String,
    pub args: OpArgs,
}

/// A check-in rule expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Expr {
    /// `{}`: no rule, everybody passes.
    #[default]
    Empty,
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Compare(Comparison),
    /// `{"!!": [{"var": name}]}`: variable chosen, operator still missing.
    Pending(String),
    /// `{"": []}`: freshly added condition without a variable.
    Unset,
    Op(OpNode),
    /// Non-object values and objects that are not a single operator.
    Literal(Value),
}

impl Expr {
    pub fn and(children: impl IntoIterator<Item = Expr>) -> Self {
        Expr::And(children.into_iter().collect())
    }

    pub fn or(children: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Or(children.into_iter().collect())
    }

    pub fn compare(op: CompareOp, var: impl Into<String>, operand: Operand) -> Self {
        Expr::Compare(Comparison::new(op, var).with_operand(operand))
    }

    /// The operator key the node is serialized under, if any.
    pub fn operator(&self) -> Option<&str> {
        match self {
            Expr::Empty | Expr::Literal(_) => None,
            Expr::And(_) => Some("and"),
            Expr::Or(_) => Some("or"),
            Expr::Compare(comparison) => Some(comparison.op.as_str()),
            Expr::Pending(_) => Some("!!"),
            Expr::Unset => Some(""),
            Expr::Op(node) => Some(node.op.as_str()),
        }
    }

    pub fn is_connective(&self) -> bool {
        matches!(self, Expr::And(_) | Expr::Or(_))
    }

    pub fn children(&self) -> Option<&[Expr]> {
        match self {
            Expr::And(children) | Expr::Or(children) => Some(children),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Expr>> {
        match self {
            Expr::And(children) | Expr::Or(children) => Some(children),
            _ => None,
        }
    }

    /// Variable referenced by a leaf.
    pub fn var(&self) -> Option<&str> {
        match self {
            Expr::Compare(comparison) => comparison.var.as_deref(),
            Expr::Pending(var) => Some(var),
            _ => None,
        }
    }

    /// Evaluation annotation carried by a leaf.
    pub fn result(&self) -> Option<bool> {
        match self {
            Expr::Compare(comparison) => comparison.result,
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        wire::encode(self)
    }

    pub fn from_value(value: &Value) -> Self {
        wire::decode(value)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(wire::decode(&value))
    }

    /// Compact JSON, the form stored in the rule text field.
    pub fn to_json_string(&self) -> String {
        wire::encode(self).to_string()
    }
}

impl From<Comparison> for Expr {
    fn from(value: Comparison) -> Self {
        Expr::Compare(value)
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        wire::encode(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(wire::decode(&value))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json_string())
    }
}
