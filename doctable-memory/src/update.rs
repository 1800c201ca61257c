//! Update directive application for in-memory documents.
//!
//! Supported operators: `$set`, `$unset`, `$addToSet` and `$push` (both accepting
//! `$each`) and `$pull`. Paths may be dotted; intermediate documents are created on write.

use bson::{Bson, Document};

use doctable_core::error::{DatabaseError, DatabaseResult};

use crate::evaluator::{element_matches, split_path, values_equal};


/// Applies `update` to `document` in place.
///
/// The directive must consist of update operators only; a replacement document is
/// rejected.
pub(crate) fn apply_update(document: &mut Document, update: &Document) -> DatabaseResult<()> {
    if update.is_empty() {
        return Err(DatabaseError::Operation("update directive is empty".into()));
    }

    for (operator, fields) in update {
        let fields = fields
            .as_document()
            .ok_or_else(|| DatabaseError::Operation(format!("`{operator}` needs a document")))?;

        for (path, value) in fields {
            match operator.as_str() {
                "$set" => set_path(document, path, value.clone())?,
                "$unset" => remove_path(document, path),
                "$addToSet" => {
                    let array = array_at(document, path, operator)?;
                    for value in each(value) {
                        if !array.iter().any(|existing| values_equal(existing, &value)) {
                            array.push(value);
                        }
                    }
                },
                "$push" => {
                    array_at(document, path, operator)?.extend(each(value));
                },
                "$pull" => {
                    let Some(target) = get_path_mut(document, path) else {
                        continue;
                    };
                    let Bson::Array(array) = target else {
                        return Err(DatabaseError::Operation(format!(
                            "cannot apply `$pull` to non-array field `{path}`"
                        )));
                    };

                    let mut kept = Vec::with_capacity(array.len());
                    for element in array.drain(..) {
                        if !element_matches(&element, value)? {
                            kept.push(element);
                        }
                    }
                    *array = kept;
                },
                other => {
                    return Err(DatabaseError::Operation(format!("unsupported update operator `{other}`")));
                },
            }
        }
    }

    Ok(())
}

/// Values added by `$addToSet` / `$push`: the elements of a `{ "$each": [...] }` modifier,
/// or the value itself.
fn each(value: &Bson) -> Vec<Bson> {
    match value {
        Bson::Document(modifier) => match modifier.get_array("$each") {
            Ok(values) => values.clone(),
            Err(_) => vec![value.clone()],
        },
        other => vec![other.clone()],
    }
}

/// Returns the array at `path`, creating an empty one if the field is missing.
fn array_at<'a>(document: &'a mut Document, path: &str, operator: &str) -> DatabaseResult<&'a mut Vec<Bson>> {
    if get_path(document, path).is_none() {
        set_path(document, path, Bson::Array(Vec::new()))?;
    }

    match get_path_mut(document, path) {
        Some(Bson::Array(array)) => Ok(array),
        _ => Err(DatabaseError::Operation(format!(
            "cannot apply `{operator}` to non-array field `{path}`"
        ))),
    }
}

/// Looks up a dotted path through embedded documents only.
pub(crate) fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    match split_path(path) {
        (head, None) => document.get(head),
        (head, Some(rest)) => match document.get(head)? {
            Bson::Document(inner) => get_path(inner, rest),
            _ => None,
        },
    }
}

fn get_path_mut<'a>(document: &'a mut Document, path: &str) -> Option<&'a mut Bson> {
    match split_path(path) {
        (head, None) => document.get_mut(head),
        (head, Some(rest)) => match document.get_mut(head)? {
            Bson::Document(inner) => get_path_mut(inner, rest),
            _ => None,
        },
    }
}

/// Writes `value` at a dotted path, creating intermediate documents.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) -> DatabaseResult<()> {
    match split_path(path) {
        (head, None) => {
            document.insert(head, value);
            Ok(())
        },
        (head, Some(rest)) => {
            let next = document
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));

            match next {
                Bson::Document(inner) => set_path(inner, rest, value),
                _ => Err(DatabaseError::Operation(format!(
                    "cannot create field `{rest}` inside non-document `{head}`"
                ))),
            }
        },
    }
}

/// Removes the value at a dotted path, if present.
pub(crate) fn remove_path(document: &mut Document, path: &str) {
    match split_path(path) {
        (head, None) => {
            document.remove(head);
        },
        (head, Some(rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                remove_path(inner, rest);
            }
        },
    }
}
