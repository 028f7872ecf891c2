//! Filter matching for the in-memory collection.
//!
//! Supports the subset of the MongoDB query language that test filters use:
//! implicit equality, dotted paths through embedded documents and arrays, the comparison
//! operators `$eq $ne $gt $gte $lt $lte $in $nin $exists` and the logical
//! operators `$and $or $nor`. Anything else is an error, like on a server.

use std::cmp::Ordering;

use bson::{Bson, Document};

use super::ordering::{compare_values, values_equal};
use crate::{filter::is_operator_document, DocAssertError, Result};

/// Checks if a document matches a filter.
pub fn matches_filter(document: &Document, filter: &Document) -> Result<bool> {
    for (key, condition) in filter {
        let matches = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(key, condition)? {
                    all &= matches_filter(document, clause)?;
                }
                all
            },
            "$or" => {
                let mut any = false;
                for clause in clauses(key, condition)? {
                    any |= matches_filter(document, clause)?;
                }
                any
            },
            "$nor" => {
                let mut any = false;
                for clause in clauses(key, condition)? {
                    any |= matches_filter(document, clause)?;
                }
                !any
            },
            operator if operator.starts_with('$') => return Err(unknown_operator(operator)),
            path => matches_condition(&lookup(document, path), condition)?,
        };
        if !matches {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Resolves a dotted path against a document.
///
/// Returns every value the path reaches: a path crossing an array continues
/// into each embedded document of the array, and a numeric segment also
/// selects the element at that index. An empty result means the field is
/// missing.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let mut segments = path.split('.');
    let mut reached = Vec::new();
    if let Some(value) = segments.next().and_then(|head| document.get(head)) {
        let rest: Vec<&str> = segments.collect();
        descend(value, &rest, &mut reached);
    }
    reached
}

/// Follows the remaining `segments` from `value`, collecting what they reach.
fn descend<'a>(value: &'a Bson, segments: &[&str], reached: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = segments.split_first() else {
        reached.push(value);
        return;
    };

    match *value {
        Bson::Document(ref embedded) => {
            if let Some(child) = embedded.get(*head) {
                descend(child, rest, reached);
            }
        },
        Bson::Array(ref items) => {
            if let Some(item) = head.parse::<usize>().ok().and_then(|index| items.get(index)) {
                descend(item, rest, reached);
            }
            for child in items
                .iter()
                .filter_map(|item| item.as_document()?.get(*head))
            {
                descend(child, rest, reached);
            }
        },
        _ => {},
    }
}

/// The sub-filters of a logical operator.
fn clauses<'a>(operator: &str, condition: &'a Bson) -> Result<Vec<&'a Document>> {
    let invalid = || {
        DocAssertError::Backend {
            message: format!("{operator} must be a non-empty array of documents"),
        }
    };

    let array = condition.as_array().ok_or_else(invalid)?;
    if array.is_empty() {
        return Err(invalid());
    }
    array
        .iter()
        .map(|clause| clause.as_document().ok_or_else(invalid))
        .collect()
}

/// Matches the values a path reached (none when the field is missing)
/// against a condition.
fn matches_condition(values: &[&Bson], condition: &Bson) -> Result<bool> {
    if !is_operator_document(condition) {
        return Ok(equals(values, condition));
    }

    let Some(operators) = condition.as_document() else {
        return Ok(false);
    };
    for (operator, operand) in operators {
        let matches = match operator.as_str() {
            "$eq" => equals(values, operand),
            "$ne" => !equals(values, operand),
            "$gt" => compares(values, operand, |ord| ord == Ordering::Greater),
            "$gte" => compares(values, operand, |ord| ord != Ordering::Less),
            "$lt" => compares(values, operand, |ord| ord == Ordering::Less),
            "$lte" => compares(values, operand, |ord| ord != Ordering::Greater),
            "$in" => in_list(operator, values, operand)?,
            "$nin" => !in_list(operator, values, operand)?,
            "$exists" => values.is_empty() != truthy(operand),
            other => return Err(unknown_operator(other)),
        };
        if !matches {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Implicit equality. A missing field equals `null`, an array field equals
/// any of its elements, and a path reaching several values matches if any of
/// them does.
fn equals(values: &[&Bson], expected: &Bson) -> bool {
    if values.is_empty() {
        return *expected == Bson::Null;
    }

    values.iter().any(|&value| {
        match *value {
            Bson::Array(ref items) if !matches!(*expected, Bson::Array(_)) => {
                items.iter().any(|item| values_equal(item, expected))
            },
            _ => values_equal(value, expected),
        }
    })
}

/// Range comparison against any reached value or array element. Missing
/// fields and mismatched types never match.
fn compares<F>(values: &[&Bson], operand: &Bson, accept: F) -> bool
where
    F: Fn(Ordering) -> bool,
{
    let accepts = |actual: &Bson| compare_values(actual, operand).is_some_and(&accept);
    values.iter().any(|&value| {
        match *value {
            Bson::Array(ref items) => items.iter().any(&accepts),
            _ => accepts(value),
        }
    })
}

/// `$in` / `$nin` membership.
fn in_list(operator: &str, values: &[&Bson], operand: &Bson) -> Result<bool> {
    let candidates = operand.as_array().ok_or_else(|| {
        DocAssertError::Backend {
            message: format!("{operator} needs an array"),
        }
    })?;
    Ok(candidates
        .iter()
        .any(|candidate| equals(values, candidate)))
}

/// MongoDB treats any non-zero, non-false `$exists` operand as true.
fn truthy(operand: &Bson) -> bool {
    match *operand {
        Bson::Boolean(flag) => flag,
        Bson::Int32(n) => n != 0,
        Bson::Int64(n) => n != 0,
        Bson::Double(n) => n != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

/// Error for operators outside the supported subset.
fn unknown_operator(operator: &str) -> DocAssertError {
    DocAssertError::Backend {
        message: format!("unknown operator: {operator}"),
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    fn alice() -> Document {
        doc! {
            "_id": 1,
            "name": "Alice",
            "age": 24,
            "tags": ["admin", "ops"],
            "address": { "city": "Lyon", "zip": "69001" },
        }
    }

    #[test]
    fn test_matches_filter_empty_filter() {
        assert!(matches_filter(&alice(), &doc! {}).unwrap());
    }

    #[test]
    fn test_matches_filter_equality() {
        assert!(matches_filter(&alice(), &doc! { "name": "Alice", "age": 24 }).unwrap());
        assert!(!matches_filter(&alice(), &doc! { "name": "Alice", "age": 22 }).unwrap());
        assert!(!matches_filter(&alice(), &doc! { "name": "Bob" }).unwrap());
    }

    #[test]
    fn test_matches_filter_numbers_across_types() {
        assert!(matches_filter(&alice(), &doc! { "age": 24_i64 }).unwrap());
        assert!(matches_filter(&alice(), &doc! { "age": 24.0 }).unwrap());
    }

    #[test]
    fn test_matches_filter_missing_field_equals_null() {
        assert!(matches_filter(&alice(), &doc! { "email": null }).unwrap());
        assert!(!matches_filter(&alice(), &doc! { "name": null }).unwrap());
    }

    #[test]
    fn test_matches_filter_dotted_path() {
        assert!(matches_filter(&alice(), &doc! { "address.city": "Lyon" }).unwrap());
        assert!(!matches_filter(&alice(), &doc! { "address.city": "Paris" }).unwrap());
        assert!(!matches_filter(&alice(), &doc! { "name.first": "Alice" }).unwrap());
    }

    #[test]
    fn test_matches_filter_embedded_document_is_exact() {
        let filter = doc! { "address": { "city": "Lyon", "zip": "69001" } };
        assert!(matches_filter(&alice(), &filter).unwrap());

        let filter = doc! { "address": { "city": "Lyon" } };
        assert!(!matches_filter(&alice(), &filter).unwrap());

        let filter = doc! { "address": { "zip": "69001", "city": "Lyon" } };
        assert!(!matches_filter(&alice(), &filter).unwrap());
    }

    #[test]
    fn test_matches_filter_nested_numbers_across_types() {
        let stored = doc! { "stats": { "age": 24_i64, "scores": [1, 2] } };
        assert!(matches_filter(&stored, &doc! { "stats": { "age": 24_i32, "scores": [1_i64, 2.0] } }).unwrap());
        assert!(!matches_filter(&stored, &doc! { "stats": { "age": 25_i32, "scores": [1, 2] } }).unwrap());
    }

    #[test]
    fn test_matches_filter_path_through_array_of_documents() {
        let stored = doc! {
            "name": "Alice",
            "addresses": [{ "city": "Lyon", "zip": "69001" }, { "city": "Paris", "zip": "75001" }],
        };
        assert!(matches_filter(&stored, &doc! { "addresses.city": "Paris" }).unwrap());
        assert!(!matches_filter(&stored, &doc! { "addresses.city": "Nice" }).unwrap());
        assert!(matches_filter(&stored, &doc! { "addresses.zip": { "$gt": "70000" } }).unwrap());
        assert!(matches_filter(&stored, &doc! { "addresses.city": { "$exists": true } }).unwrap());
        assert!(!matches_filter(&stored, &doc! { "addresses.country": { "$exists": true } }).unwrap());
    }

    #[test]
    fn test_matches_filter_numeric_array_index() {
        assert!(matches_filter(&alice(), &doc! { "tags.0": "admin" }).unwrap());
        assert!(!matches_filter(&alice(), &doc! { "tags.0": "ops" }).unwrap());
        assert!(matches_filter(&alice(), &doc! { "tags.1": "ops" }).unwrap());
        assert!(matches_filter(&alice(), &doc! { "tags.5": null }).unwrap());

        let stored = doc! { "addresses": [{ "city": "Lyon" }, { "city": "Paris" }] };
        assert!(matches_filter(&stored, &doc! { "addresses.1.city": "Paris" }).unwrap());
        assert!(!matches_filter(&stored, &doc! { "addresses.0.city": "Paris" }).unwrap());
    }

    #[test]
    fn test_matches_filter_array_contains() {
        assert!(matches_filter(&alice(), &doc! { "tags": "ops" }).unwrap());
        assert!(!matches_filter(&alice(), &doc! { "tags": "dev" }).unwrap());
        assert!(matches_filter(&alice(), &doc! { "tags": ["admin", "ops"] }).unwrap());
    }

    #[test]
    fn test_matches_filter_comparison_operators() {
        assert!(matches_filter(&alice(), &doc! { "age": { "$gt": 20 } }).unwrap());
        assert!(matches_filter(&alice(), &doc! { "age": { "$gte": 24, "$lte": 24 } }).unwrap());
        assert!(!matches_filter(&alice(), &doc! { "age": { "$lt": 24 } }).unwrap());
        assert!(matches_filter(&alice(), &doc! { "age": { "$ne": 30 } }).unwrap());
        assert!(matches_filter(&alice(), &doc! { "age": { "$eq": 24 } }).unwrap());
        assert!(!matches_filter(&alice(), &doc! { "name": { "$gt": 20 } }).unwrap());
        assert!(!matches_filter(&alice(), &doc! { "missing": { "$lt": 20 } }).unwrap());
    }

    #[test]
    fn test_matches_filter_in_and_nin() {
        assert!(matches_filter(&alice(), &doc! { "name": { "$in": ["Alice", "Bob"] } }).unwrap());
        assert!(!matches_filter(&alice(), &doc! { "name": { "$nin": ["Alice"] } }).unwrap());
        assert!(matches_filter(&alice(), &doc! { "tags": { "$in": ["ops"] } }).unwrap());
    }

    #[test]
    fn test_matches_filter_exists() {
        assert!(matches_filter(&alice(), &doc! { "name": { "$exists": true } }).unwrap());
        assert!(matches_filter(&alice(), &doc! { "email": { "$exists": false } }).unwrap());
        assert!(!matches_filter(&alice(), &doc! { "email": { "$exists": 1 } }).unwrap());
    }

    #[test]
    fn test_matches_filter_logical_operators() {
        let filter = doc! { "$or": [{ "name": "Bob" }, { "age": 24 }] };
        assert!(matches_filter(&alice(), &filter).unwrap());

        let filter = doc! { "$and": [{ "name": "Alice" }, { "age": 30 }] };
        assert!(!matches_filter(&alice(), &filter).unwrap());

        let filter = doc! { "$nor": [{ "name": "Bob" }, { "age": 30 }] };
        assert!(matches_filter(&alice(), &filter).unwrap());
    }

    #[test]
    fn test_matches_filter_rejects_unknown_operators() {
        let err = matches_filter(&alice(), &doc! { "name": { "$regex": "^A" } }).unwrap_err();
        assert_eq!(err.to_string(), "backend error: unknown operator: $regex");

        assert!(matches_filter(&alice(), &doc! { "$where": "true" }).is_err());
        assert!(matches_filter(&alice(), &doc! { "$or": [] }).is_err());
        assert!(matches_filter(&alice(), &doc! { "age": { "$in": 24 } }).is_err());
    }

    #[test]
    fn test_lookup() {
        let doc = alice();
        assert_eq!(lookup(&doc, "address.zip"), vec![&Bson::String("69001".to_owned())]);
        assert!(lookup(&doc, "address.country").is_empty());
        assert!(lookup(&doc, "age.value").is_empty());
        assert_eq!(lookup(&doc, "tags.1"), vec![&Bson::String("ops".to_owned())]);
    }
}
