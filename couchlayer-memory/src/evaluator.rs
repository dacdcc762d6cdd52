//! Selector evaluation for in-memory `_find` requests.
//!
//! This module matches JSON documents against selector objects, the way the
//! database's query server does for the subset of operators supported here:
//! implicit equality, nested field objects, dotted paths, `$and`, `$or`,
//! `$nor`, `$not`, and the field operators `$eq`, `$ne`, `$gt`, `$gte`,
//! `$lt`, `$lte`, `$exists`, `$in`, `$nin` and `$all`.

use serde_json::{Map, Value};
use std::cmp::Ordering;

use couchlayer_core::error::{StoreError, StoreResult};

/// Comparable view of a JSON value, following the database's collation order:
/// null, booleans, numbers, strings, arrays, objects.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    /// All integers and floats normalized to f64
    Number(f64),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(&'a Map<String, Value>),
}

impl<'a> From<&'a Value> for Comparable<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Comparable::Null,
            Value::Bool(value) => Comparable::Bool(*value),
            Value::Number(value) => Comparable::Number(value.as_f64().unwrap_or(f64::NAN)),
            Value::String(value) => Comparable::String(value),
            Value::Array(items) => Comparable::Array(items.iter().map(Comparable::from).collect()),
            Value::Object(map) => Comparable::Map(map),
        }
    }
}

impl<'a> Comparable<'a> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Bool(_) => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Map(_) => 5,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => a.partial_cmp(b),
            (Comparable::Map(a), Comparable::Map(b)) => (a == b).then_some(Ordering::Equal),
            (a, b) => a.rank().partial_cmp(&b.rank()),
        }
    }
}

/// Resolves a dotted field path inside a document.
pub(crate) fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |value, segment| value.as_object()?.get(segment))
}

pub(crate) struct SelectorEvaluator<'a> {
    document: &'a Value,
}

impl<'a> SelectorEvaluator<'a> {
    pub fn new(document: &'a Value) -> Self {
        Self { document }
    }

    pub fn evaluate(&self, selector: &Map<String, Value>) -> StoreResult<bool> {
        Self::matches(self.document, selector)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Value>,
        selector: &Map<String, Value>,
    ) -> StoreResult<Vec<Value>> {
        let mut matched = Vec::new();

        for document in documents {
            if SelectorEvaluator::new(document).evaluate(selector)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    fn matches(document: &Value, selector: &Map<String, Value>) -> StoreResult<bool> {
        for (key, condition) in selector {
            let matched = match key.as_str() {
                "$and" => Self::combine(document, condition)?.iter().all(|m| *m),
                "$or" => Self::combine(document, condition)?.iter().any(|m| *m),
                "$nor" => !Self::combine(document, condition)?.iter().any(|m| *m),
                "$not" => !Self::matches(document, Self::selector(condition)?)?,
                field => Self::field_matches(lookup(document, field), condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn combine(document: &Value, condition: &Value) -> StoreResult<Vec<bool>> {
        condition
            .as_array()
            .ok_or_else(|| invalid("combination operators expect an array of selectors"))?
            .iter()
            .map(|selector| Self::matches(document, Self::selector(selector)?))
            .collect()
    }

    fn selector(value: &Value) -> StoreResult<&Map<String, Value>> {
        value
            .as_object()
            .ok_or_else(|| invalid("expected a selector object"))
    }

    fn field_matches(value: Option<&Value>, condition: &Value) -> StoreResult<bool> {
        match condition {
            Value::Object(operators) if is_operator_object(operators) => {
                for (operator, argument) in operators {
                    if !Self::operator_matches(value, operator, argument)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Value::Object(nested) => match value {
                Some(value @ Value::Object(_)) => Self::matches(value, nested),
                _ => Ok(false),
            },
            _ => Ok(value.is_some_and(|value| Comparable::from(value) == Comparable::from(condition))),
        }
    }

    fn operator_matches(value: Option<&Value>, operator: &str, argument: &Value) -> StoreResult<bool> {
        if operator == "$exists" {
            let should_exist = argument
                .as_bool()
                .ok_or_else(|| invalid("$exists expects a boolean"))?;
            return Ok(value.is_some() == should_exist);
        }
        if operator == "$not" {
            return Ok(!Self::field_matches(value, argument)?);
        }

        let Some(value) = value else {
            return Ok(operator == "$ne" || operator == "$nin");
        };
        let left = Comparable::from(value);

        Ok(match operator {
            "$eq" => left == Comparable::from(argument),
            "$ne" => left != Comparable::from(argument),
            "$gt" | "$gte" | "$lt" | "$lte" => match left.partial_cmp(&Comparable::from(argument)) {
                Some(ordering) => match operator {
                    "$gt" => ordering == Ordering::Greater,
                    "$gte" => ordering != Ordering::Less,
                    "$lt" => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                },
                None => false,
            },
            "$in" => candidates(operator, argument)?
                .iter()
                .any(|candidate| Comparable::from(candidate) == left),
            "$nin" => !candidates(operator, argument)?
                .iter()
                .any(|candidate| Comparable::from(candidate) == left),
            "$all" => match value {
                Value::Array(items) => candidates(operator, argument)?.iter().all(|wanted| {
                    items
                        .iter()
                        .any(|item| Comparable::from(item) == Comparable::from(wanted))
                }),
                _ => false,
            },
            other => return Err(invalid(&format!("unsupported operator {other}"))),
        })
    }
}

fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|key| key.starts_with('$'))
}

fn candidates<'v>(operator: &str, argument: &'v Value) -> StoreResult<&'v Vec<Value>> {
    argument
        .as_array()
        .ok_or_else(|| invalid(&format!("{operator} expects an array")))
}

fn invalid(reason: &str) -> StoreError {
    StoreError::Server {
        status: 400,
        error: "invalid_operator".to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(document: Value, selector: Value) -> bool {
        SelectorEvaluator::new(&document)
            .evaluate(selector.as_object().unwrap())
            .unwrap()
    }

    #[test]
    fn implicit_equality() {
        assert!(eval(json!({ "p1": "v1", "t": "lmt" }), json!({ "p1": "v1", "t": "lmt" })));
        assert!(!eval(json!({ "p1": "v1" }), json!({ "p1": "v2" })));
        assert!(!eval(json!({}), json!({ "p1": "v1" })));
        assert!(eval(json!({ "p2": 2 }), json!({ "p2": 2.0 })));
    }

    #[test]
    fn operators_and_nested_fields() {
        let document = json!({ "n": 5, "tags": ["a", "b"], "owner": { "name": "al" } });

        assert!(eval(document.clone(), json!({ "n": { "$gt": 4, "$lte": 5 } })));
        assert!(eval(document.clone(), json!({ "tags": { "$all": ["a"] } })));
        assert!(eval(document.clone(), json!({ "n": { "$in": [1, 5] } })));
        assert!(eval(document.clone(), json!({ "owner.name": "al" })));
        assert!(eval(document.clone(), json!({ "owner": { "name": "al" } })));
        assert!(eval(document.clone(), json!({ "missing": { "$exists": false } })));
        assert!(eval(document.clone(), json!({ "$or": [{ "n": 1 }, { "n": 5 }] })));
        assert!(!eval(document, json!({ "$not": { "n": 5 } })));
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let document = json!({ "n": 5 });
        let selector = json!({ "n": { "$near": 1 } });

        assert!(SelectorEvaluator::new(&document).evaluate(selector.as_object().unwrap()).is_err());
    }

    #[test]
    fn collation_orders_across_types() {
        let null = Value::Null;
        let number = json!(1);
        let string = json!("a");

        assert!(Comparable::from(&null) < Comparable::from(&number));
        assert!(Comparable::from(&number) < Comparable::from(&string));
    }
}
