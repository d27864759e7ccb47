//! JSON codec for rule expressions.
//!
//! The JSON layout is shared with the server-side evaluator, so decoding is
//! total: anything that does not match a known shape is kept verbatim and
//! encodes back to the same bytes.

use serde_json::{Map, Value};

use crate::expr::{
    CompareOp, Comparison, Expr, Lookup, LookupId, OpArgs, OpNode, Operand, TimeKind, TimeSpec,
};

pub const RESULT_KEY: &str = "__result";

pub fn decode(value: &Value) -> Expr {
    match value {
        Value::Object(map) => decode_object(map),
        other => Expr::Literal(other.clone()),
    }
}

fn decode_object(map: &Map<String, Value>) -> Expr {
    if map.is_empty() {
        return Expr::Empty;
    }

    let result = match map.get(RESULT_KEY) {
        None => None,
        Some(Value::Bool(flag)) => Some(*flag),
        Some(_) => return Expr::Literal(Value::Object(map.clone())),
    };

    let mut operators = map.iter().filter(|(key, _)| key.as_str() != RESULT_KEY);
    match (operators.next(), operators.next()) {
        (Some((op, args)), None) => decode_tagged(op, args, result),
        _ => Expr::Literal(Value::Object(map.clone())),
    }
}

/// Builds the node for operator `op` applied to `args`. The result
/// annotation only survives on comparison leaves.
pub(crate) fn decode_tagged(op: &str, args: &Value, result: Option<bool>) -> Expr {
    match (op, args) {
        ("and", Value::Array(items)) => return Expr::And(items.iter().map(decode).collect()),
        ("or", Value::Array(items)) => return Expr::Or(items.iter().map(decode).collect()),
        ("", Value::Array(items)) if items.is_empty() => return Expr::Unset,
        ("!!", Value::Array(items)) if items.len() == 1 => {
            if let Some(name) = var_name(&items[0]) {
                return Expr::Pending(name.to_string());
            }
        }
        _ => {}
    }

    if let Some(comparison) = CompareOp::parse(op).and_then(|op| decode_comparison(op, args)) {
        return Expr::Compare(Comparison {
            result,
            ..comparison
        });
    }

    let args = match args {
        Value::Array(items) => OpArgs::List(items.iter().map(decode).collect()),
        other => OpArgs::Single(Box::new(decode(other))),
    };
    Expr::Op(OpNode {
        op: op.to_string(),
        args,
    })
}

fn decode_comparison(op: CompareOp, args: &Value) -> Option<Comparison> {
    let items = args.as_array()?;
    if items.len() > 3 {
        return None;
    }

    let var = match items.first() {
        Some(first) => Some(var_name(first)?.to_string()),
        None => None,
    };
    let operand = items.get(1).map(decode_operand);
    let tolerance = match items.get(2) {
        Some(raw) => Some(raw.as_i64()?),
        None => None,
    };

    Some(Comparison {
        op,
        var,
        operand,
        tolerance,
        result: None,
    })
}

fn var_name(value: &Value) -> Option<&str> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.get("var")?.as_str()
}

fn decode_operand(value: &Value) -> Operand {
    let decoded = match value {
        Value::Number(number) => number.as_i64().map(Operand::Int),
        Value::Object(map) if map.len() == 1 => {
            if let Some(items) = map.get("objectList") {
                decode_object_list(items).map(Operand::ObjectList)
            } else if let Some(args) = map.get("buildTime") {
                decode_build_time(args).map(Operand::BuildTime)
            } else {
                None
            }
        }
        _ => None,
    };
    decoded.unwrap_or_else(|| Operand::Raw(value.clone()))
}

fn decode_object_list(items: &Value) -> Option<Vec<Lookup>> {
    items.as_array()?.iter().map(decode_lookup).collect()
}

fn decode_lookup(value: &Value) -> Option<Lookup> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    let parts = map.get("lookup")?.as_array()?;
    if parts.len() != 3 {
        return None;
    }
    let kind = parts[0].as_str()?;
    let id = match &parts[1] {
        Value::Number(number) => LookupId::Int(number.as_i64()?),
        Value::String(raw) => LookupId::Str(raw.clone()),
        _ => return None,
    };
    let text = parts[2].as_str()?;
    Some(Lookup::new(kind, id, text))
}

fn decode_build_time(args: &Value) -> Option<TimeSpec> {
    let parts = args.as_array()?;
    let kind = TimeKind::parse(parts.first()?.as_str()?)?;
    let value = match parts.len() {
        1 => None,
        2 => Some(parts[1].as_str()?.to_string()),
        _ => return None,
    };
    Some(TimeSpec { kind, value })
}

pub fn encode(expr: &Expr) -> Value {
    match expr {
        Expr::Empty => Value::Object(Map::new()),
        Expr::Literal(value) => value.clone(),
        Expr::Compare(comparison) => {
            let mut map = Map::new();
            map.insert(comparison.op.as_str().to_string(), tagged_args(expr));
            if let Some(result) = comparison.result {
                map.insert(RESULT_KEY.to_string(), Value::Bool(result));
            }
            Value::Object(map)
        }
        other => {
            let mut map = Map::new();
            let op = other.operator().unwrap_or_default().to_string();
            map.insert(op, tagged_args(other));
            Value::Object(map)
        }
    }
}

/// The value stored under the node's operator key. Nodes without an
/// operator yield an empty array.
pub(crate) fn tagged_args(expr: &Expr) -> Value {
    match expr {
        Expr::Empty | Expr::Literal(_) | Expr::Unset => Value::Array(Vec::new()),
        Expr::And(children) | Expr::Or(children) => {
            Value::Array(children.iter().map(encode).collect())
        }
        Expr::Pending(var) => Value::Array(vec![var_ref(var)]),
        Expr::Compare(comparison) => Value::Array(comparison_args(comparison)),
        Expr::Op(node) => match &node.args {
            OpArgs::List(items) => Value::Array(items.iter().map(encode).collect()),
            OpArgs::Single(item) => encode(item),
        },
    }
}

fn comparison_args(comparison: &Comparison) -> Vec<Value> {
    let slots = [
        comparison.var.as_deref().map(var_ref),
        comparison.operand.as_ref().map(encode_operand),
        comparison.tolerance.map(Value::from),
    ];
    let used = slots
        .iter()
        .rposition(Option::is_some)
        .map_or(0, |last| last + 1);
    slots
        .into_iter()
        .take(used)
        .map(|slot| slot.unwrap_or(Value::Null))
        .collect()
}

fn var_ref(name: &str) -> Value {
    let mut map = Map::new();
    map.insert("var".to_string(), Value::String(name.to_string()));
    Value::Object(map)
}

fn encode_operand(operand: &Operand) -> Value {
    match operand {
        Operand::Int(value) => Value::from(*value),
        Operand::Raw(value) => value.clone(),
        Operand::ObjectList(items) => {
            let list = items.iter().map(encode_lookup).collect();
            single_key("objectList", Value::Array(list))
        }
        Operand::BuildTime(spec) => {
            let mut parts = vec![Value::String(spec.kind.as_str().to_string())];
            if let Some(value) = &spec.value {
                parts.push(Value::String(value.clone()));
            }
            single_key("buildTime", Value::Array(parts))
        }
    }
}

fn encode_lookup(lookup: &Lookup) -> Value {
    let id = match &lookup.id {
        LookupId::Int(id) => Value::from(*id),
        LookupId::Str(id) => Value::String(id.clone()),
    };
    single_key(
        "lookup",
        Value::Array(vec![
            Value::String(lookup.kind.clone()),
            id,
            Value::String(lookup.text.clone()),
        ]),
    )
}

fn single_key(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_product_list_leaf() {
        let value = json!({"inList": [
            {"var": "product"},
            {"objectList": [{"lookup": ["product", 12, "GA Ticket"]}]}
        ]});
        let expr = decode(&value);
        let Expr::Compare(comparison) = &expr else {
            panic!("expected comparison, got {:?}", expr);
        };
        assert_eq!(comparison.op, CompareOp::InList);
        assert_eq!(comparison.var.as_deref(), Some("product"));
        assert_eq!(
            comparison.operand,
            Some(Operand::ObjectList(vec![Lookup::new(
                "product",
                LookupId::Int(12),
                "GA Ticket"
            )]))
        );
        assert_eq!(encode(&expr), value);
    }

    #[test]
    fn keeps_unset_slots_positional() {
        let only_var = json!({"isAfter": [{"var": "now"}]});
        let with_tolerance = json!({"isAfter": [{"var": "now"}, {"buildTime": ["date_from"]}, 15]});
        let padded = json!({"isAfter": [{"var": "now"}, null, 15]});

        for value in [only_var, with_tolerance, padded] {
            assert_eq!(encode(&decode(&value)), value);
        }
    }

    #[test]
    fn result_annotation_is_written_after_the_operator() {
        let expr = decode(&json!({"__result": false, "==": [{"var": "entries_number"}, 0]}));
        assert_eq!(expr.result(), Some(false));
        assert_eq!(
            expr.to_json_string(),
            r#"{"==":[{"var":"entries_number"},0],"__result":false}"#
        );
    }

    #[test]
    fn tolerates_malformed_nodes() {
        let values = [
            json!({"==": [5, 6]}),
            json!({"!": {"var": "product"}}),
            json!({"a": 1, "b": 2}),
            json!({"inList": [{"var": "product"}, {"objectList": "broken"}]}),
            json!({"isBefore": [{"var": "now"}, {"buildTime": ["yesterday"]}]}),
            json!(true),
            json!({"": [1]}),
        ];

        for value in values {
            assert_eq!(encode(&decode(&value)), value, "round trip of {}", value);
        }
    }

    #[test]
    fn recognizes_placeholders() {
        assert_eq!(decode(&json!({})), Expr::Empty);
        assert_eq!(decode(&json!({"": []})), Expr::Unset);
        assert_eq!(
            decode(&json!({"!!": [{"var": "now"}]})),
            Expr::Pending("now".into())
        );
    }

    #[test]
    fn string_lookup_ids_survive() {
        let value = json!({"inList": [
            {"var": "variation"},
            {"objectList": [{"lookup": ["variation", "7", "Child"]}]}
        ]});
        assert_eq!(encode(&decode(&value)), value);
    }
}
