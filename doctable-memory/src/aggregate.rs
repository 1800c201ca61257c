//! Aggregation pipeline execution for in-memory collections.
//!
//! Supported stages: `$match`, `$project` (inclusion or exclusion), `$lookup` (equality
//! form), `$unwind`, `$group` (`$sum`, `$first` and `$push` accumulators), `$sort`,
//! `$skip`, `$limit` and `$count`. An unknown stage fails the whole pipeline with
//! [`DatabaseError::Operation`].

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document};

use doctable_core::error::{DatabaseError, DatabaseResult};

use crate::{
    evaluator::{Comparable, DocumentEvaluator, is_truthy, resolve, split_path, values_equal},
    update::{get_path, remove_path, set_path},
};

/// Collections visible to a pipeline, for `$lookup`.
pub(crate) type Collections = HashMap<String, Vec<Document>>;


/// Runs a pipeline over a snapshot of one collection.
pub(crate) struct PipelineRunner<'a> {
    collections: &'a Collections,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(collections: &'a Collections) -> Self {
        Self { collections }
    }

    /// Runs every stage in order over `documents`.
    pub fn run(&self, documents: Vec<Document>, pipeline: &[Document]) -> DatabaseResult<Vec<Document>> {
        pipeline
            .iter()
            .try_fold(documents, |documents, stage| self.run_stage(documents, stage))
    }

    fn run_stage(&self, documents: Vec<Document>, stage: &Document) -> DatabaseResult<Vec<Document>> {
        let mut entries = stage.iter();

        let (name, spec) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(DatabaseError::Operation(
                    "a pipeline stage must contain exactly one field".into(),
                ));
            },
        };

        match name.as_str() {
            "$match" => DocumentEvaluator::filter_documents(documents, stage_document(name, spec)?),
            "$project" => project(documents, stage_document(name, spec)?),
            "$lookup" => self.lookup(documents, stage_document(name, spec)?),
            "$unwind" => unwind(documents, spec),
            "$group" => group(documents, stage_document(name, spec)?),
            "$sort" => sort(documents, stage_document(name, spec)?),
            "$skip" => {
                let skip = stage_count(name, spec)?;
                Ok(documents.into_iter().skip(skip).collect())
            },
            "$limit" => {
                let limit = stage_count(name, spec)?;
                if limit == 0 {
                    return Err(DatabaseError::Operation("`$limit` must be positive".into()));
                }
                Ok(documents.into_iter().take(limit).collect())
            },
            "$count" => count(documents, spec),
            other => Err(DatabaseError::Operation(format!("unsupported pipeline stage `{other}`"))),
        }
    }

    fn lookup(&self, documents: Vec<Document>, spec: &Document) -> DatabaseResult<Vec<Document>> {
        let field = |key: &str| {
            spec.get_str(key)
                .map_err(|_| DatabaseError::Operation(format!("`$lookup` needs a string `{key}`")))
        };

        if spec.contains_key("pipeline") {
            return Err(DatabaseError::Operation("`$lookup` with a sub-pipeline is not supported".into()));
        }

        let from = field("from")?;
        let local_field = field("localField")?;
        let foreign_field = field("foreignField")?;
        let alias = field("as")?;

        let foreign = self
            .collections
            .get(from)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut joined = Vec::with_capacity(documents.len());

        for mut document in documents {
            let local = join_keys(&document, local_field);

            let matches = foreign
                .iter()
                .filter(|candidate| {
                    let keys = join_keys(candidate, foreign_field);
                    local
                        .iter()
                        .any(|l| keys.iter().any(|k| values_equal(l, k)))
                })
                .cloned()
                .map(Bson::Document)
                .collect::<Vec<_>>();

            set_path(&mut document, alias, Bson::Array(matches))?;
            joined.push(document);
        }

        Ok(joined)
    }
}

/// Join keys of a document: array values contribute their elements and a missing field
/// joins as `null`.
fn join_keys(document: &Document, path: &str) -> Vec<Bson> {
    let values = resolve(document, path);

    if values.is_empty() {
        return vec![Bson::Null];
    }

    values
        .into_iter()
        .flat_map(|value| match value {
            Bson::Array(items) => items.clone(),
            other => vec![other.clone()],
        })
        .collect()
}

fn stage_document<'a>(name: &str, spec: &'a Bson) -> DatabaseResult<&'a Document> {
    spec.as_document()
        .ok_or_else(|| DatabaseError::Operation(format!("`{name}` needs a document")))
}

fn stage_count(name: &str, spec: &Bson) -> DatabaseResult<usize> {
    let value = match spec {
        Bson::Int32(n) => *n as i64,
        Bson::Int64(n) => *n,
        Bson::Double(n) if n.fract() == 0.0 => *n as i64,
        _ => return Err(DatabaseError::Operation(format!("`{name}` needs an integer"))),
    };

    usize::try_from(value)
        .map_err(|_| DatabaseError::Operation(format!("`{name}` must not be negative")))
}

fn project(documents: Vec<Document>, spec: &Document) -> DatabaseResult<Vec<Document>> {
    let mut included = Vec::new();
    let mut excluded = Vec::new();

    for (path, flag) in spec {
        match flag {
            Bson::Boolean(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => {
                if is_truthy(flag) {
                    included.push(path.as_str());
                } else {
                    excluded.push(path.as_str());
                }
            },
            _ => {
                return Err(DatabaseError::Operation(format!(
                    "unsupported projection expression for `{path}`"
                )));
            },
        }
    }

    // `_id` may be excluded from an inclusion projection; nothing else may be mixed.
    let excludes_only_id = excluded.iter().all(|path| *path == "_id");
    if !included.is_empty() && !excludes_only_id {
        return Err(DatabaseError::Operation(
            "cannot mix inclusion and exclusion in a projection".into(),
        ));
    }

    if included.is_empty() {
        return Ok(documents
            .into_iter()
            .map(|mut document| {
                for path in &excluded {
                    remove_path(&mut document, path);
                }
                document
            })
            .collect());
    }

    let mut inclusion = Inclusion::default();
    if !excluded.contains(&"_id") {
        inclusion.add("_id");
    }
    for path in &included {
        inclusion.add(path);
    }

    Ok(documents
        .iter()
        .map(|document| inclusion.apply(document))
        .collect())
}

/// Tree of included paths. A `None` child keeps the whole value.
#[derive(Debug, Default)]
struct Inclusion(HashMap<String, Option<Inclusion>>);

impl Inclusion {
    fn add(&mut self, path: &str) {
        match split_path(path) {
            (head, None) => {
                self.0.insert(head.to_string(), None);
            },
            (head, Some(rest)) => {
                let child = self
                    .0
                    .entry(head.to_string())
                    .or_insert_with(|| Some(Inclusion::default()));

                if let Some(child) = child {
                    child.add(rest);
                }
            },
        }
    }

    /// Keeps the included fields in the document's own field order.
    fn apply(&self, document: &Document) -> Document {
        let mut projected = Document::new();

        for (key, value) in document {
            match self.0.get(key) {
                Some(None) => {
                    projected.insert(key.clone(), value.clone());
                },
                Some(Some(child)) => {
                    if let Some(value) = child.apply_value(value) {
                        projected.insert(key.clone(), value);
                    }
                },
                None => {},
            }
        }

        projected
    }

    /// Nested inclusion descends into documents and arrays; scalars are dropped.
    fn apply_value(&self, value: &Bson) -> Option<Bson> {
        match value {
            Bson::Document(inner) => Some(Bson::Document(self.apply(inner))),
            Bson::Array(items) => Some(Bson::Array(
                items
                    .iter()
                    .filter_map(|item| self.apply_value(item))
                    .collect(),
            )),
            _ => None,
        }
    }
}

fn unwind(documents: Vec<Document>, spec: &Bson) -> DatabaseResult<Vec<Document>> {
    let (path, preserve) = match spec {
        Bson::String(path) => (path.as_str(), false),
        Bson::Document(options) => (
            options
                .get_str("path")
                .map_err(|_| DatabaseError::Operation("`$unwind` needs a `path`".into()))?,
            options
                .get_bool("preserveNullAndEmptyArrays")
                .unwrap_or(false),
        ),
        _ => return Err(DatabaseError::Operation("`$unwind` needs a path".into())),
    };

    let path = path
        .strip_prefix('$')
        .ok_or_else(|| DatabaseError::Operation("`$unwind` path must start with `$`".into()))?;

    let mut unwound = Vec::with_capacity(documents.len());

    for document in documents {
        match get_path(&document, path).cloned() {
            Some(Bson::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = document.clone();
                    set_path(&mut copy, path, item)?;
                    unwound.push(copy);
                }
            },
            Some(Bson::Array(_)) | Some(Bson::Null) | None => {
                if preserve {
                    unwound.push(document);
                }
            },
            Some(_) => unwound.push(document),
        }
    }

    Ok(unwound)
}

/// Groups documents by the `_id` expression. Groups come out in first-seen order.
fn group(documents: Vec<Document>, spec: &Document) -> DatabaseResult<Vec<Document>> {
    let key = spec
        .get("_id")
        .ok_or_else(|| DatabaseError::Operation("`$group` needs an `_id`".into()))?;

    let accumulators = spec
        .iter()
        .filter(|(field, _)| field.as_str() != "_id")
        .map(|(field, accumulator)| {
            let mut entries = accumulator.as_document().into_iter().flat_map(|spec| spec.iter());
            match (entries.next(), entries.next()) {
                (Some((op, expression)), None) if matches!(op.as_str(), "$sum" | "$first" | "$push") => {
                    Ok((field.as_str(), op.as_str(), expression))
                },
                (Some((op, _)), None) => Err(DatabaseError::Operation(format!(
                    "unsupported `$group` accumulator `{op}`"
                ))),
                _ => Err(DatabaseError::Operation(format!(
                    "`$group` field `{field}` needs exactly one accumulator"
                ))),
            }
        })
        .collect::<DatabaseResult<Vec<_>>>()?;

    let mut groups: Vec<(Bson, Vec<Document>)> = Vec::new();

    for document in documents {
        let value = evaluate(&document, key)?;
        match groups.iter_mut().find(|(existing, _)| values_equal(existing, &value)) {
            Some((_, members)) => members.push(document),
            None => groups.push((value, vec![document])),
        }
    }

    let mut grouped = Vec::with_capacity(groups.len());

    for (key, members) in groups {
        let mut result = Document::new();
        result.insert("_id", key);

        for (field, op, expression) in &accumulators {
            let values = members
                .iter()
                .map(|member| evaluate(member, expression))
                .collect::<DatabaseResult<Vec<_>>>()?;

            let value = match *op {
                "$sum" => sum(&values),
                "$first" => values.into_iter().next().unwrap_or(Bson::Null),
                _ => Bson::Array(values),
            };
            result.insert(*field, value);
        }

        grouped.push(result);
    }

    Ok(grouped)
}

/// Evaluates a `$group` expression: `"$path"` reads a field (missing reads as `null`),
/// documents evaluate field by field and anything else is a literal.
fn evaluate(document: &Document, expression: &Bson) -> DatabaseResult<Bson> {
    match expression {
        Bson::String(reference) if reference.starts_with('$') => Ok(get_path(document, &reference[1..])
            .cloned()
            .unwrap_or(Bson::Null)),
        Bson::Document(fields) => {
            let mut evaluated = Document::new();
            for (field, value) in fields {
                if field.starts_with('$') {
                    return Err(DatabaseError::Operation(format!("unsupported expression `{field}`")));
                }
                evaluated.insert(field.clone(), evaluate(document, value)?);
            }
            Ok(Bson::Document(evaluated))
        },
        other => Ok(other.clone()),
    }
}

/// Numeric sum ignoring non-numbers. Stays `Int32` while every addend and the total fit.
fn sum(values: &[Bson]) -> Bson {
    let mut integral: i64 = 0;
    let mut fractional: Option<f64> = None;
    let mut wide = false;

    for value in values {
        match value {
            Bson::Int32(n) => integral = integral.saturating_add(i64::from(*n)),
            Bson::Int64(n) => {
                integral = integral.saturating_add(*n);
                wide = true;
            },
            Bson::Double(n) => *fractional.get_or_insert(0.0) += n,
            _ => {},
        }
    }

    match fractional {
        Some(total) => Bson::Double(total + integral as f64),
        None if wide => Bson::Int64(integral),
        None => i32::try_from(integral)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(integral)),
    }
}

fn sort(mut documents: Vec<Document>, spec: &Document) -> DatabaseResult<Vec<Document>> {
    if spec.is_empty() {
        return Err(DatabaseError::Operation("`$sort` needs at least one key".into()));
    }

    let keys = spec
        .iter()
        .map(|(path, direction)| match direction {
            Bson::Int32(1) | Bson::Int64(1) => Ok((path.as_str(), false)),
            Bson::Int32(-1) | Bson::Int64(-1) => Ok((path.as_str(), true)),
            Bson::Double(d) if *d == 1.0 => Ok((path.as_str(), false)),
            Bson::Double(d) if *d == -1.0 => Ok((path.as_str(), true)),
            _ => Err(DatabaseError::Operation(format!("invalid sort direction for `{path}`"))),
        })
        .collect::<DatabaseResult<Vec<_>>>()?;

    let missing = Bson::Null;

    documents.sort_by(|a, b| {
        for (path, descending) in &keys {
            let left = resolve(a, path).first().copied().unwrap_or(&missing);
            let right = resolve(b, path).first().copied().unwrap_or(&missing);

            let ordering = Comparable::from(left).total_cmp(&Comparable::from(right));
            let ordering = if *descending { ordering.reverse() } else { ordering };

            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });

    Ok(documents)
}

fn count(documents: Vec<Document>, spec: &Bson) -> DatabaseResult<Vec<Document>> {
    let field = spec
        .as_str()
        .filter(|field| !field.is_empty() && !field.starts_with('$'))
        .ok_or_else(|| DatabaseError::Operation("`$count` needs a field name".into()))?;

    if documents.is_empty() {
        return Ok(Vec::new());
    }

    let total = documents.len();
    let value = match i32::try_from(total) {
        Ok(n) => Bson::Int32(n),
        Err(_) => Bson::Int64(total as i64),
    };

    let mut result = Document::new();
    result.insert(field, value);
    Ok(vec![result])
}
