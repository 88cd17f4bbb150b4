//! Filter queries over a collection.
//!
//! ```json
//! {
//!   "where": { "age": { ">=": 30 }, "role": { "in": ["admin", "owner"] } },
//!   "author": "John",
//!   "orderBy": [["age", "DESC"], "name"],
//!   "skip": 10,
//!   "limit": 5
//! }
//! ```
//!
//! Top-level keys other than `where`, `orderBy`, `skip` and `limit` are
//! equality shorthands. A `where` condition that is not an object is an
//! equality test too.

use std::cmp::Ordering;

use rds_types::{value_kind, Attributes};
use serde_json::{Map, Value};

use crate::item::Item;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
}

impl Operator {
    fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "==" | "===" => Self::Eq,
            "!=" | "!==" => Self::Ne,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "<" => Self::Lt,
            "<=" => Self::Le,
            "in" => Self::In,
            "notIn" => Self::NotIn,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Condition {
    field: String,
    op: Operator,
    value: Value,
}

impl Condition {
    fn matches(&self, attrs: &Attributes) -> bool {
        let actual = attrs.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            Operator::Eq => loose_eq(actual, &self.value),
            Operator::Ne => !loose_eq(actual, &self.value),
            Operator::Gt => compare(actual, &self.value) == Some(Ordering::Greater),
            Operator::Ge => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Lt => compare(actual, &self.value) == Some(Ordering::Less),
            Operator::Le => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::In => self.candidates().iter().any(|v| loose_eq(actual, v)),
            Operator::NotIn => !self.candidates().iter().any(|v| loose_eq(actual, v)),
        }
    }

    fn candidates(&self) -> &[Value] {
        self.value.as_array().map(Vec::as_slice).unwrap_or_default()
    }
}

/// Sort direction of one `orderBy` key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// A parsed filter query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    conditions: Vec<Condition>,
    order_by: Vec<(String, Direction)>,
    skip: usize,
    limit: Option<usize>,
}

impl Query {
    /// The query that selects everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse query params. `null` selects everything.
    pub fn parse(params: &Value) -> Result<Self, String> {
        match params {
            Value::Null => Ok(Self::all()),
            Value::Object(map) => Self::parse_object(map),
            other => Err(format!("params: Must be an object! (got {})", value_kind(other))),
        }
    }

    fn parse_object(map: &Map<String, Value>) -> Result<Self, String> {
        let mut query = Self::all();
        for (key, value) in map {
            match key.as_str() {
                "where" => query.parse_where(value)?,
                "orderBy" => query.order_by = parse_order_by(value)?,
                "skip" => query.skip = parse_count("skip", value)?,
                "limit" => query.limit = Some(parse_count("limit", value)?),
                field => query.conditions.push(Condition {
                    field: field.to_string(),
                    op: Operator::Eq,
                    value: value.clone(),
                }),
            }
        }
        Ok(query)
    }

    fn parse_where(&mut self, clause: &Value) -> Result<(), String> {
        let clause = clause
            .as_object()
            .ok_or_else(|| "params.where: Must be an object!".to_string())?;
        for (field, condition) in clause {
            match condition {
                Value::Object(ops) => {
                    for (op, value) in ops {
                        let op = Operator::parse(op)
                            .ok_or_else(|| format!("params.where.{field}: unknown operator {op}"))?;
                        if matches!(op, Operator::In | Operator::NotIn) && !value.is_array() {
                            return Err(format!("params.where.{field}: operand must be an array!"));
                        }
                        self.conditions.push(Condition {
                            field: field.clone(),
                            op,
                            value: value.clone(),
                        });
                    }
                }
                value => self.conditions.push(Condition {
                    field: field.clone(),
                    op: Operator::Eq,
                    value: value.clone(),
                }),
            }
        }
        Ok(())
    }

    pub fn is_all(&self) -> bool {
        *self == Self::all()
    }

    /// Returns `true` if the attributes satisfy every condition.
    pub fn matches(&self, attrs: &Attributes) -> bool {
        self.conditions.iter().all(|c| c.matches(attrs))
    }

    /// Filter, order, and page `items`.
    pub fn apply(&self, items: &[Item]) -> Vec<Item> {
        let mut selected: Vec<(Attributes, Item)> = items
            .iter()
            .filter_map(|item| {
                let attrs = item.attributes();
                self.matches(&attrs).then(|| (attrs, item.clone()))
            })
            .collect();

        if !self.order_by.is_empty() {
            selected.sort_by(|(a, _), (b, _)| {
                for (field, direction) in &self.order_by {
                    let ord = total_order(a.get(field), b.get(field));
                    let ord = match direction {
                        Direction::Asc => ord,
                        Direction::Desc => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let page = selected.into_iter().skip(self.skip).map(|(_, item)| item);
        match self.limit {
            Some(limit) => page.take(limit).collect(),
            None => page.collect(),
        }
    }
}

fn parse_count(name: &str, value: &Value) -> Result<usize, String> {
    value
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| format!("params.{name}: Must be a non-negative integer!"))
}

fn parse_order_by(value: &Value) -> Result<Vec<(String, Direction)>, String> {
    let entry = |v: &Value| -> Result<(String, Direction), String> {
        match v {
            Value::String(field) => Ok((field.clone(), Direction::Asc)),
            Value::Array(pair) => match pair.as_slice() {
                [Value::String(field)] => Ok((field.clone(), Direction::Asc)),
                [Value::String(field), Value::String(dir)] => {
                    let direction = match dir.to_ascii_uppercase().as_str() {
                        "ASC" => Direction::Asc,
                        "DESC" => Direction::Desc,
                        _ => return Err(format!("params.orderBy: unknown direction {dir}")),
                    };
                    Ok((field.clone(), direction))
                }
                _ => Err("params.orderBy: entries must be [field, direction]".into()),
            },
            _ => Err("params.orderBy: Must be a string or an array!".into()),
        }
    };

    match value {
        Value::String(_) => Ok(vec![entry(value)?]),
        // A bare [field, direction] pair, as opposed to a list of entries.
        Value::Array(items)
            if items.len() == 2
                && items[1]
                    .as_str()
                    .is_some_and(|d| matches!(d.to_ascii_uppercase().as_str(), "ASC" | "DESC")) =>
        {
            Ok(vec![entry(value)?])
        }
        Value::Array(items) => items.iter().map(entry).collect(),
        _ => Err("params.orderBy: Must be a string or an array!".into()),
    }
}

/// Equality that treats numbers by value (`1 == 1.0`).
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering between two values of the same comparable kind.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order used for sorting: missing < null < bool < number < string <
/// everything else.
fn total_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }
    match (a, b) {
        (Some(x), Some(y)) => compare(x, y).unwrap_or_else(|| rank(a).cmp(&rank(b))),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items() -> Vec<Item> {
        [
            json!({"id": 1, "author": "John", "age": 30}),
            json!({"id": 2, "author": "Sally", "age": 31}),
            json!({"id": 3, "author": "Mike", "age": 32}),
            json!({"id": 4, "author": "Adam", "age": 33}),
            json!({"id": 5, "author": "Adam", "age": 33}),
        ]
        .into_iter()
        .map(|v| match v {
            Value::Object(map) => Item::new(map),
            _ => unreachable!(),
        })
        .collect()
    }

    fn ids(items: &[Item]) -> Vec<i64> {
        items
            .iter()
            .filter_map(|i| i.get("id").and_then(|v| v.as_i64()))
            .collect()
    }

    fn run(params: Value) -> Vec<i64> {
        ids(&Query::parse(&params).unwrap().apply(&items()))
    }

    #[test]
    fn null_and_empty_select_everything() {
        assert!(Query::parse(&Value::Null).unwrap().is_all());
        assert_eq!(run(json!({})), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn non_object_params_rejected() {
        for bad in [json!(1), json!("x"), json!(true), json!([1])] {
            let err = Query::parse(&bad).unwrap_err();
            assert!(err.starts_with("params: Must be an object!"), "{err}");
        }
    }

    #[test]
    fn equality_shorthand() {
        assert_eq!(run(json!({"author": "Adam"})), vec![4, 5]);
        assert_eq!(run(json!({"where": {"age": 30}})), vec![1]);
    }

    #[test]
    fn comparison_operators() {
        assert_eq!(run(json!({"where": {"age": {">": 31}}})), vec![3, 4, 5]);
        assert_eq!(run(json!({"where": {"age": {">=": 31, "<": 33}}})), vec![2, 3]);
        assert_eq!(run(json!({"where": {"age": {"<=": 30}}})), vec![1]);
        assert_eq!(run(json!({"where": {"author": {"!=": "Adam"}}})), vec![1, 2, 3]);
        assert_eq!(run(json!({"where": {"age": {"==": 30.0}}})), vec![1]);
    }

    #[test]
    fn membership_operators() {
        assert_eq!(run(json!({"where": {"author": {"in": ["John", "Mike"]}}})), vec![1, 3]);
        assert_eq!(run(json!({"where": {"author": {"notIn": ["Adam"]}}})), vec![1, 2, 3]);
        assert!(Query::parse(&json!({"where": {"author": {"in": "John"}}})).is_err());
    }

    #[test]
    fn ordering_across_kinds_never_matches() {
        assert!(run(json!({"where": {"author": {">": 1}}})).is_empty());
    }

    #[test]
    fn order_skip_limit() {
        assert_eq!(run(json!({"orderBy": [["age", "DESC"], "id"]})), vec![4, 5, 3, 2, 1]);
        assert_eq!(run(json!({"orderBy": ["author", "DESC"]})), vec![2, 3, 1, 4, 5]);
        assert_eq!(run(json!({"orderBy": "author", "skip": 1, "limit": 2})), vec![5, 1]);
    }

    #[test]
    fn malformed_clauses_rejected() {
        assert!(Query::parse(&json!({"where": 3})).is_err());
        assert!(Query::parse(&json!({"where": {"a": {"~": 1}}})).is_err());
        assert!(Query::parse(&json!({"limit": -1})).is_err());
        assert!(Query::parse(&json!({"orderBy": [["a", "SIDEWAYS"]]})).is_err());
    }
}
