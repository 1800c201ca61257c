//! Filter evaluation for in-memory documents.
//!
//! This module understands the subset of the store-native filter grammar that the
//! in-memory backend supports: implicit equality (with array membership), dotted paths
//! that descend through arrays of documents, the comparison operators `$eq`, `$ne`,
//! `$gt`, `$gte`, `$lt`, `$lte`, the set operators `$in`, `$nin`, `$all`, `$size`,
//! `$exists`, `$elemMatch`, `$not`, and the logical `$and`, `$or`, `$nor`.
//!
//! Anything else is reported as an unsupported operator rather than silently ignored.

use std::cmp::Ordering;
use bson::{Bson, DateTime, Document};

use doctable_core::error::{DatabaseError, DatabaseResult};


/// Type-erased, comparable representation of BSON values.
///
/// Values of different types order by a fixed type rank (null, numbers, strings,
/// documents, arrays, booleans, dates) so that sorting mixed fields is total. Numeric
/// types are normalized to f64.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null or missing value
    Null,
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// String value
    String(&'a str),
    /// Embedded document
    Document(&'a Document),
    /// Array of values
    Array(&'a [Bson]),
    /// Boolean value
    Bool(bool),
    /// DateTime value
    DateTime(DateTime),
    /// Any other BSON type, compared by equality only
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Document(doc) => Comparable::Document(doc),
            Bson::Array(arr) => Comparable::Array(arr),
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> Comparable<'a> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Document(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Other(_) => 6,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
        }
    }

    /// Total order used by `$sort` and the range operators.
    pub(crate) fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Ordering::Equal,
            // NaN equals NaN and sorts below every other number; `-0.0 == 0.0` still holds.
            (Comparable::Number(a), Comparable::Number(b)) => a
                .partial_cmp(b)
                .unwrap_or_else(|| b.is_nan().cmp(&a.is_nan())),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.cmp(b),
            (Comparable::Document(a), Comparable::Document(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ordering = ka
                        .cmp(kb)
                        .then_with(|| Comparable::from(va).total_cmp(&Comparable::from(vb)));
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a.len().cmp(&b.len())
            },
            (Comparable::Array(a), Comparable::Array(b)) => {
                for (va, vb) in a.iter().zip(b.iter()) {
                    let ordering = Comparable::from(va).total_cmp(&Comparable::from(vb));
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a.len().cmp(&b.len())
            },
            (Comparable::Other(a), Comparable::Other(b)) => {
                if a == b {
                    Ordering::Equal
                } else {
                    a.to_string().cmp(&b.to_string())
                }
            },
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Structural equality with numeric normalization (`1_i32 == 1_i64 == 1.0`).
pub(crate) fn values_equal(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left).total_cmp(&Comparable::from(right)) == Ordering::Equal
        && Comparable::from(left).rank() == Comparable::from(right).rank()
}

/// Truthiness of an operator operand such as the argument of `$exists`.
pub(crate) fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

/// Resolves a dotted path against a document.
///
/// A segment applied to an array descends into each document element, so
/// `"teams_info.members"` collects the `members` of every joined team. Numeric segments
/// index into arrays. The result is empty when the path does not exist.
pub(crate) fn resolve<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let (head, rest) = split_path(path);
    let mut found = Vec::new();

    if let Some(value) = document.get(head) {
        collect(value, rest, &mut found);
    }

    found
}

fn collect<'a>(value: &'a Bson, path: Option<&str>, found: &mut Vec<&'a Bson>) {
    let Some(path) = path else {
        found.push(value);
        return;
    };

    let (head, rest) = split_path(path);

    match value {
        Bson::Document(doc) => {
            if let Some(next) = doc.get(head) {
                collect(next, rest, found);
            }
        },
        Bson::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                if let Some(next) = items.get(index) {
                    collect(next, rest, found);
                }
                return;
            }
            for item in items {
                if let Bson::Document(doc) = item {
                    if let Some(next) = doc.get(head) {
                        collect(next, rest, found);
                    }
                }
            }
        },
        _ => {},
    }
}

pub(crate) fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

fn is_operator_document(value: &Bson) -> Option<&Document> {
    match value {
        Bson::Document(doc) if doc.keys().next().is_some_and(|k| k.starts_with('$')) => Some(doc),
        _ => None,
    }
}

fn unsupported(operator: &str) -> DatabaseError {
    DatabaseError::Operation(format!("unsupported query operator `{operator}`"))
}

fn expect_array<'a>(operator: &str, operand: &'a Bson) -> DatabaseResult<&'a [Bson]> {
    operand
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| DatabaseError::Operation(format!("`{operator}` needs an array")))
}

fn expect_document<'a>(operator: &str, operand: &'a Bson) -> DatabaseResult<&'a Document> {
    operand
        .as_document()
        .ok_or_else(|| DatabaseError::Operation(format!("`{operator}` needs a document")))
}


/// Evaluates store-native filter documents against in-memory documents.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns whether the document satisfies every clause of `filter`.
    pub fn matches(&self, filter: &Document) -> DatabaseResult<bool> {
        for (key, condition) in filter {
            let satisfied = match key.as_str() {
                "$and" => {
                    let mut all = true;
                    for clause in expect_array(key, condition)? {
                        if !self.matches(expect_document(key, clause)?)? {
                            all = false;
                            break;
                        }
                    }
                    all
                },
                "$or" => self.any_clause(key, condition)?,
                "$nor" => !self.any_clause(key, condition)?,
                op if op.starts_with('$') => return Err(unsupported(op)),
                path => self.field_matches(path, condition)?,
            };

            if !satisfied {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn any_clause(&self, key: &str, condition: &Bson) -> DatabaseResult<bool> {
        for clause in expect_array(key, condition)? {
            if self.matches(expect_document(key, clause)?)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn field_matches(&self, path: &str, condition: &Bson) -> DatabaseResult<bool> {
        let values = resolve(self.document, path);

        match is_operator_document(condition) {
            Some(operators) => operators_match(&values, operators),
            None => Ok(equals_any(&values, condition)),
        }
    }

    /// Filters documents, propagating evaluation errors.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = Document>,
        filter: &Document,
    ) -> DatabaseResult<Vec<Document>> {
        let mut kept = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(&document).matches(filter)? {
                kept.push(document);
            }
        }

        Ok(kept)
    }
}

/// Equality the way a filter sees it: a missing field equals `null`, and an array
/// matches when it equals the target or holds an element equal to it.
fn equals_any(values: &[&Bson], target: &Bson) -> bool {
    if values.is_empty() {
        return matches!(target, Bson::Null);
    }

    values.iter().any(|value| {
        values_equal(value, target)
            || matches!(value, Bson::Array(items) if items.iter().any(|item| values_equal(item, target)))
    })
}

/// Candidates for range comparisons: each value, plus the elements of array values.
fn flatten<'a>(values: &[&'a Bson]) -> Vec<&'a Bson> {
    let mut flat = Vec::with_capacity(values.len());

    for value in values {
        flat.push(*value);
        if let Bson::Array(items) = value {
            flat.extend(items.iter());
        }
    }

    flat
}

fn compare_any(values: &[&Bson], operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let target = Comparable::from(operand);

    flatten(values).into_iter().any(|value| {
        let value = Comparable::from(value);
        value.rank() == target.rank() && accept(value.total_cmp(&target))
    })
}

fn operators_match(values: &[&Bson], operators: &Document) -> DatabaseResult<bool> {
    for (operator, operand) in operators {
        let satisfied = match operator.as_str() {
            "$eq" => equals_any(values, operand),
            "$ne" => !equals_any(values, operand),
            "$gt" => compare_any(values, operand, |o| o == Ordering::Greater),
            "$gte" => compare_any(values, operand, |o| o != Ordering::Less),
            "$lt" => compare_any(values, operand, |o| o == Ordering::Less),
            "$lte" => compare_any(values, operand, |o| o != Ordering::Greater),
            "$in" => expect_array(operator, operand)?
                .iter()
                .any(|candidate| equals_any(values, candidate)),
            "$nin" => !expect_array(operator, operand)?
                .iter()
                .any(|candidate| equals_any(values, candidate)),
            "$all" => {
                let required = expect_array(operator, operand)?;
                !required.is_empty() && required.iter().all(|candidate| equals_any(values, candidate))
            },
            "$exists" => is_truthy(operand) == !values.is_empty(),
            "$size" => {
                let size = match operand {
                    Bson::Int32(n) => *n as i64,
                    Bson::Int64(n) => *n,
                    _ => return Err(DatabaseError::Operation("`$size` needs an integer".into())),
                };
                values
                    .iter()
                    .any(|value| matches!(value, Bson::Array(items) if items.len() as i64 == size))
            },
            "$not" => !operators_match(values, expect_document(operator, operand)?)?,
            "$elemMatch" => {
                let condition = expect_document(operator, operand)?;
                let mut found = false;
                'outer: for value in values {
                    if let Bson::Array(items) = value {
                        for item in items {
                            if element_matches(item, &Bson::Document(condition.clone()))? {
                                found = true;
                                break 'outer;
                            }
                        }
                    }
                }
                found
            },
            other => return Err(unsupported(other)),
        };

        if !satisfied {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Returns whether an array element matches a `$pull` / `$elemMatch` condition.
///
/// - an operator document (`{ "$in": [...] }`) is applied to the element itself;
/// - any other document is a filter the element (a document) must satisfy;
/// - a plain value must equal the element.
pub(crate) fn element_matches(element: &Bson, spec: &Bson) -> DatabaseResult<bool> {
    if let Some(operators) = is_operator_document(spec) {
        return operators_match(&[element], operators);
    }

    match (element, spec) {
        (Bson::Document(element), Bson::Document(filter)) => {
            if values_equal(&Bson::Document(element.clone()), spec) {
                return Ok(true);
            }
            DocumentEvaluator::new(element).matches(filter)
        },
        (_, Bson::Document(_)) => Ok(false),
        _ => Ok(values_equal(element, spec)),
    }
}
