//! Command-driven rule editor.
//!
//! Every command mutates a single node of the tree in place and the editor
//! then re-serializes the whole rule, so callers always hold the text that
//! would be submitted to the shop.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::RuleError;
use crate::expr::{Expr, Lookup, OpArgs, Operand, TimeSpec};
use crate::view::{self, NodeView};
use crate::wire;

/// Position of a node: child indices walked from the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Parent path and the index of this node inside the parent.
    pub fn split_last(&self) -> Option<(NodePath, usize)> {
        let (last, rest) = self.0.split_last()?;
        Some((NodePath(rest.to_vec()), *last))
    }
}

impl From<Vec<usize>> for NodePath {
    fn from(value: Vec<usize>) -> Self {
        Self(value)
    }
}

impl FromStr for NodePath {
    type Err = RuleError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "root" {
            return Ok(Self::root());
        }
        raw.split('.')
            .map(|segment| {
                segment
                    .parse::<usize>()
                    .map_err(|_| RuleError::InvalidPath(raw.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("root");
        }
        let joined = self
            .0
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&joined)
    }
}

/// User interactions on a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditCommand {
    /// Pick a variable, or `and`/`or` to turn the node into a connective.
    SetVariable { name: String },
    /// Pick an operator; the operand array is carried over unchanged.
    SetOperator { op: String },
    SetNumber { value: i64 },
    SetObjectList { items: Vec<Lookup> },
    SetTime { time: TimeSpec },
    SetTolerance { minutes: i64 },
    AddCondition,
    Remove,
    Duplicate,
    WrapAnd,
    WrapOr,
    /// Replace a single-child connective by its child.
    Cut,
}

impl EditCommand {
    pub fn name(&self) -> &'static str {
        match self {
            EditCommand::SetVariable { .. } => "set_variable",
            EditCommand::SetOperator { .. } => "set_operator",
            EditCommand::SetNumber { .. } => "set_number",
            EditCommand::SetObjectList { .. } => "set_object_list",
            EditCommand::SetTime { .. } => "set_time",
            EditCommand::SetTolerance { .. } => "set_tolerance",
            EditCommand::AddCondition => "add_condition",
            EditCommand::Remove => "remove",
            EditCommand::Duplicate => "duplicate",
            EditCommand::WrapAnd => "wrap_and",
            EditCommand::WrapOr => "wrap_or",
            EditCommand::Cut => "cut",
        }
    }
}

/// Owns one rule and the serialized text kept in sync with it.
#[derive(Debug, Clone)]
pub struct RuleEditor {
    root: Expr,
    catalog: Catalog,
    serialized: String,
    revision: u64,
}

impl RuleEditor {
    pub fn new(root: Expr) -> Self {
        Self::with_catalog(root, Catalog::builtin())
    }

    pub fn with_catalog(root: Expr, catalog: Catalog) -> Self {
        let serialized = root.to_json_string();
        Self {
            root,
            catalog,
            serialized,
            revision: 0,
        }
    }

    /// Loads the rule from its stored text; blank text means no rule.
    pub fn load(text: &str, catalog: Catalog) -> Result<Self, RuleError> {
        let root = if text.trim().is_empty() {
            Expr::Empty
        } else {
            Expr::from_json_str(text).map_err(|err| RuleError::InvalidJson(err.to_string()))?
        };
        Ok(Self::with_catalog(root, catalog))
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The text to submit with the form.
    pub fn serialized(&self) -> &str {
        &self.serialized
    }

    /// Number of commands applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn into_root(self) -> Expr {
        self.root
    }

    pub fn node(&self, path: &NodePath) -> Result<&Expr, RuleError> {
        let mut current = &self.root;
        for &index in path.indices() {
            current = current
                .children()
                .and_then(|children| children.get(index))
                .ok_or_else(|| RuleError::NodeNotFound {
                    path: path.to_string(),
                })?;
        }
        Ok(current)
    }

    /// Applies one command. On error the tree and the serialized text are
    /// left untouched.
    pub fn apply(&mut self, path: &NodePath, command: EditCommand) -> Result<(), RuleError> {
        let name = command.name();
        apply_command(&mut self.root, path, command, &self.catalog)?;

        self.revision += 1;
        self.serialized = self.root.to_json_string();
        debug!(command = name, path = %path, revision = self.revision, "applied rule edit");
        Ok(())
    }

    /// Control tree for the current rule.
    pub fn view(&self) -> NodeView {
        view::build(&self.root, &self.catalog)
    }
}

fn sibling_slot(path: &NodePath, operation: &'static str) -> Result<(NodePath, usize), RuleError> {
    path.split_last()
        .ok_or(RuleError::RootOperation { operation })
}

fn node_at<'a>(root: &'a mut Expr, path: &NodePath) -> Result<&'a mut Expr, RuleError> {
    let mut current = root;
    for &index in path.indices() {
        current = current
            .children_mut()
            .and_then(|children| children.get_mut(index))
            .ok_or_else(|| RuleError::NodeNotFound {
                path: path.to_string(),
            })?;
    }
    Ok(current)
}

/// Sibling list that holds the node at `target`, checked to contain it.
fn children_at<'a>(
    root: &'a mut Expr,
    parent: &NodePath,
    target: &NodePath,
) -> Result<&'a mut Vec<Expr>, RuleError> {
    let not_found = || RuleError::NodeNotFound {
        path: target.to_string(),
    };
    let index = target.split_last().map(|(_, index)| index).ok_or_else(not_found)?;
    let siblings = node_at(root, parent)?.children_mut().ok_or_else(not_found)?;
    if index >= siblings.len() {
        return Err(not_found());
    }
    Ok(siblings)
}

fn apply_command(
    root: &mut Expr,
    path: &NodePath,
    command: EditCommand,
    catalog: &Catalog,
) -> Result<(), RuleError> {
    match command {
        EditCommand::Remove => {
            let (parent, index) = sibling_slot(path, "remove")?;
            let siblings = children_at(root, &parent, path)?;
            siblings.remove(index);
        }
        EditCommand::Duplicate => {
            let (parent, index) = sibling_slot(path, "duplicate")?;
            let siblings = children_at(root, &parent, path)?;
            let copy = siblings[index].clone();
            siblings.insert(index, copy);
        }
        EditCommand::SetVariable { name } => set_variable(node_at(root, path)?, &name, catalog),
        EditCommand::SetOperator { op } => {
            // Re-decoding drops any `__result`; it described the old operator.
            let node = node_at(root, path)?;
            let args = wire::tagged_args(node);
            *node = wire::decode_tagged(&op, &args, None);
        }
        EditCommand::SetNumber { value } => set_operand(root, path, Operand::Int(value))?,
        EditCommand::SetObjectList { items } => {
            set_operand(root, path, Operand::ObjectList(items))?
        }
        EditCommand::SetTime { time } => set_operand(root, path, Operand::BuildTime(time))?,
        EditCommand::SetTolerance { minutes } => {
            let Expr::Compare(comparison) = node_at(root, path)? else {
                return Err(RuleError::NotAComparison {
                    path: path.to_string(),
                });
            };
            if comparison.operand.is_none() {
                comparison.operand = Some(Operand::Raw(serde_json::Value::Null));
            }
            comparison.tolerance = Some(minutes);
            comparison.result = None;
        }
        EditCommand::AddCondition => node_at(root, path)?
            .children_mut()
            .ok_or_else(|| RuleError::NotAConnective {
                path: path.to_string(),
            })?
            .push(Expr::Unset),
        EditCommand::WrapAnd => {
            let node = node_at(root, path)?;
            let inner = std::mem::take(node);
            *node = Expr::And(vec![inner]);
        }
        EditCommand::WrapOr => {
            let node = node_at(root, path)?;
            let inner = std::mem::take(node);
            *node = Expr::Or(vec![inner]);
        }
        EditCommand::Cut => {
            let node = node_at(root, path)?;
            let children = node.children_mut().ok_or_else(|| RuleError::NotAConnective {
                path: path.to_string(),
            })?;
            if children.len() != 1 {
                return Err(RuleError::NotCollapsible {
                    path: path.to_string(),
                    children: children.len(),
                });
            }
            let child = children.remove(0);
            *node = child;
        }
    }
    Ok(())
}

fn set_variable(node: &mut Expr, name: &str, catalog: &Catalog) {
    if name == "and" || name == "or" {
        let children = match std::mem::take(node) {
            Expr::And(children) | Expr::Or(children) => children,
            Expr::Op(op) => match op.args {
                OpArgs::List(items) => items,
                OpArgs::Single(_) => Vec::new(),
            },
            _ => Vec::new(),
        };
        *node = if name == "and" {
            Expr::And(children)
        } else {
            Expr::Or(children)
        };
        return;
    }

    let new_type = catalog.var_type(name);
    if let Expr::Compare(comparison) = node {
        let old_type = comparison.var.as_deref().and_then(|var| catalog.var_type(var));
        if new_type.is_some() && old_type == new_type {
            comparison.var = Some(name.to_string());
            comparison.result = None;
            return;
        }
    }
    *node = Expr::Pending(name.to_string());
}

fn set_operand(root: &mut Expr, path: &NodePath, operand: Operand) -> Result<(), RuleError> {
    match node_at(root, path)? {
        Expr::Compare(comparison) => {
            comparison.operand = Some(operand);
            comparison.result = None;
            Ok(())
        }
        _ => Err(RuleError::NotAComparison {
            path: path.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn editor(value: serde_json::Value) -> RuleEditor {
        RuleEditor::new(Expr::from_value(&value))
    }

    fn path(raw: &str) -> NodePath {
        raw.parse().expect("path")
    }

    #[test]
    fn parses_and_prints_paths() {
        assert!(path("root").is_root());
        assert!(path("").is_root());
        assert_eq!(path("0.2.1").indices(), &[0, 2, 1]);
        assert_eq!(path("0.2.1").to_string(), "0.2.1");
        assert_eq!(NodePath::root().to_string(), "root");
        assert!(matches!(
            "0.x".parse::<NodePath>(),
            Err(RuleError::InvalidPath(_))
        ));
    }

    #[test]
    fn editing_a_condition_clears_its_result() {
        let evaluated = json!({"<": [{"var": "entries_number"}, 3], "__result": true});
        let edits = [
            EditCommand::SetVariable {
                name: "entries_today".into(),
            },
            EditCommand::SetOperator { op: ">".into() },
            EditCommand::SetNumber { value: 4 },
            EditCommand::SetTolerance { minutes: 5 },
        ];
        for command in edits {
            let name = command.name();
            let mut editor = editor(evaluated.clone());
            editor.apply(&NodePath::root(), command).expect("edit");
            assert_eq!(editor.root().result(), None, "{} kept the result", name);
            assert!(!editor.serialized().contains("__result"), "{}", name);
        }
    }

    #[test]
    fn moving_a_condition_keeps_its_result() {
        let mut editor = editor(json!({"and": [
            {"<": [{"var": "entries_number"}, 3], "__result": false}
        ]}));
        editor
            .apply(&NodePath::root(), EditCommand::Duplicate)
            .expect_err("root cannot be duplicated");
        editor.apply(&path("0"), EditCommand::WrapOr).expect("wrap");
        editor.apply(&path("0"), EditCommand::Cut).expect("cut");
        editor.apply(&path("0"), EditCommand::Duplicate).expect("duplicate");
        assert_eq!(
            editor.root().to_value(),
            json!({"and": [
                {"<": [{"var": "entries_number"}, 3], "__result": false},
                {"<": [{"var": "entries_number"}, 3], "__result": false}
            ]})
        );
    }

    #[test]
    fn empty_root_becomes_connective_and_grows() {
        let mut editor = RuleEditor::new(Expr::Empty);
        editor
            .apply(&NodePath::root(), EditCommand::SetVariable { name: "and".into() })
            .expect("set and");
        editor
            .apply(&NodePath::root(), EditCommand::AddCondition)
            .expect("add");
        assert_eq!(editor.serialized(), r#"{"and":[{"":[]}]}"#);
        assert_eq!(editor.revision(), 2);
    }

    #[test]
    fn builds_a_condition_step_by_step() {
        let mut editor = editor(json!({"and": [{"": []}]}));
        let leaf = path("0");
        editor
            .apply(&leaf, EditCommand::SetVariable { name: "entries_today".into() })
            .expect("variable");
        assert_eq!(editor.serialized(), r#"{"and":[{"!!":[{"var":"entries_today"}]}]}"#);

        editor
            .apply(&leaf, EditCommand::SetOperator { op: "<".into() })
            .expect("operator");
        assert_eq!(editor.serialized(), r#"{"and":[{"<":[{"var":"entries_today"}]}]}"#);

        editor
            .apply(&leaf, EditCommand::SetNumber { value: 3 })
            .expect("append operand");
        editor
            .apply(&leaf, EditCommand::SetNumber { value: 4 })
            .expect("replace operand");
        assert_eq!(editor.serialized(), r#"{"and":[{"<":[{"var":"entries_today"},4]}]}"#);
    }

    #[test]
    fn switching_connective_keeps_children() {
        let mut editor = editor(json!({"and": [{"==": [{"var": "entries_number"}, 1]}]}));
        editor
            .apply(&NodePath::root(), EditCommand::SetVariable { name: "or".into() })
            .expect("set or");
        assert_eq!(
            editor.root(),
            &Expr::from_value(&json!({"or": [{"==": [{"var": "entries_number"}, 1]}]}))
        );

        editor
            .apply(&NodePath::root(), EditCommand::SetOperator { op: "and".into() })
            .expect("set and");
        assert_eq!(editor.root().operator(), Some("and"));
        assert_eq!(editor.root().children().map(<[Expr]>::len), Some(1));
    }

    #[test]
    fn leaf_turned_into_connective_starts_empty() {
        let mut editor = editor(json!({"==": [{"var": "entries_number"}, 1]}));
        editor
            .apply(&NodePath::root(), EditCommand::SetVariable { name: "or".into() })
            .expect("set or");
        assert_eq!(editor.serialized(), r#"{"or":[]}"#);
    }

    #[test]
    fn tolerance_lands_in_third_slot() {
        let mut editor = editor(json!({"isAfter": [{"var": "now"}]}));
        editor
            .apply(&NodePath::root(), EditCommand::SetTolerance { minutes: 10 })
            .expect("tolerance");
        assert_eq!(editor.serialized(), r#"{"isAfter":[{"var":"now"},null,10]}"#);

        editor
            .apply(
                &NodePath::root(),
                EditCommand::SetTime {
                    time: TimeSpec::custom_time("18:00:00"),
                },
            )
            .expect("time");
        assert_eq!(
            editor.serialized(),
            r#"{"isAfter":[{"var":"now"},{"buildTime":["customtime","18:00:00"]},10]}"#
        );
    }

    #[test]
    fn remove_and_duplicate_work_on_siblings() {
        let mut editor = editor(json!({"or": [
            {"==": [{"var": "entries_number"}, 0]},
            {"==": [{"var": "entries_today"}, 0]}
        ]}));
        editor
            .apply(&path("1"), EditCommand::Duplicate)
            .expect("duplicate");
        assert_eq!(editor.root().children().map(<[Expr]>::len), Some(3));
        editor.apply(&path("0"), EditCommand::Remove).expect("remove");
        assert_eq!(
            editor.serialized(),
            r#"{"or":[{"==":[{"var":"entries_today"},0]},{"==":[{"var":"entries_today"},0]}]}"#
        );
    }

    #[test]
    fn rejects_invalid_targets_without_touching_the_tree() {
        let mut editor = editor(json!({"and": [{"==": [{"var": "entries_number"}, 0]}]}));
        let before = editor.serialized().to_string();

        assert!(matches!(
            editor.apply(&NodePath::root(), EditCommand::Remove),
            Err(RuleError::RootOperation { operation: "remove" })
        ));
        assert!(matches!(
            editor.apply(&path("3"), EditCommand::Duplicate),
            Err(RuleError::NodeNotFound { .. })
        ));
        assert!(matches!(
            editor.apply(&path("0"), EditCommand::AddCondition),
            Err(RuleError::NotAConnective { .. })
        ));
        assert!(matches!(
            editor.apply(&path("0"), EditCommand::Cut),
            Err(RuleError::NotAConnective { .. })
        ));
        assert!(matches!(
            editor.apply(&NodePath::root(), EditCommand::SetNumber { value: 1 }),
            Err(RuleError::NotAComparison { .. })
        ));

        assert_eq!(editor.serialized(), before);
        assert_eq!(editor.revision(), 0);
    }

    #[test]
    fn cut_requires_exactly_one_child() {
        let mut editor = editor(json!({"and": [{"": []}, {"": []}]}));
        assert!(matches!(
            editor.apply(&NodePath::root(), EditCommand::Cut),
            Err(RuleError::NotCollapsible { children: 2, .. })
        ));
    }

    #[test]
    fn loads_blank_text_as_empty_rule() {
        let editor = RuleEditor::load("  ", Catalog::builtin()).expect("load");
        assert_eq!(editor.root(), &Expr::Empty);
        assert_eq!(editor.serialized(), "{}");
        assert!(matches!(
            RuleEditor::load("{", Catalog::builtin()),
            Err(RuleError::InvalidJson(_))
        ));
    }

    #[test]
    fn commands_deserialize_from_tagged_json() {
        let command: EditCommand =
            serde_json::from_value(json!({"type": "set_variable", "name": "now"}))
                .expect("command");
        assert_eq!(command, EditCommand::SetVariable { name: "now".into() });
        let command: EditCommand =
            serde_json::from_value(json!({"type": "wrap_or"})).expect("command");
        assert_eq!(command, EditCommand::WrapOr);
    }
}
