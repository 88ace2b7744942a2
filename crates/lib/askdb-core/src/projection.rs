//! Field inclusion and exclusion over returned documents.

use askdb_store::{Document, Projection};
use serde_json::{Map, Value};

const ID_FIELD: &str = "id";

/// Applies a validated projection to one document.
///
/// An inclusion projection keeps `id` unless it is explicitly set to `0`.
/// Dotted paths address nested objects.
#[must_use]
pub fn apply(projection: &Projection, document: Document) -> Document {
    let includes = projection.values().any(|flag| *flag == 1);
    if includes {
        include(projection, &document)
    } else {
        exclude(projection, document)
    }
}

fn include(projection: &Projection, document: &Document) -> Document {
    let mut output = Map::new();
    if projection.get(ID_FIELD) != Some(&0) {
        if let Some(id) = document.get(ID_FIELD) {
            output.insert(ID_FIELD.to_string(), id.clone());
        }
    }
    for (path, flag) in projection {
        if *flag != 1 {
            continue;
        }
        let segments: Vec<&str> = path.split('.').collect();
        if let Some(value) = lookup(document, &segments) {
            insert_path(&mut output, &segments, value.clone());
        }
    }
    output
}

fn exclude(projection: &Projection, mut document: Document) -> Document {
    for path in projection.keys() {
        let segments: Vec<&str> = path.split('.').collect();
        remove_path(&mut document, &segments);
    }
    document
}

fn lookup<'a>(document: &'a Document, segments: &[&str]) -> Option<&'a Value> {
    let (head, rest) = segments.split_first()?;
    let value = document.get(*head)?;
    if rest.is_empty() {
        return Some(value);
    }
    lookup(value.as_object()?, rest)
}

fn insert_path(target: &mut Document, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        target.insert((*head).to_string(), value);
        return;
    }
    let entry = target
        .entry((*head).to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(child) = entry {
        insert_path(child, rest, value);
    }
}

fn remove_path(target: &mut Document, segments: &[&str]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        target.remove(*head);
    } else if let Some(Value::Object(child)) = target.get_mut(*head) {
        remove_path(child, rest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn projection(entries: &[(&str, u8)]) -> Projection {
        entries
            .iter()
            .map(|(field, flag)| ((*field).to_string(), *flag))
            .collect()
    }

    fn sample() -> Document {
        doc(json!({
            "id": "c1",
            "name": "Alice",
            "age": 30,
            "address": {"city": "London", "zip": "N1"}
        }))
    }

    #[test]
    fn inclusion_keeps_listed_fields_and_id() {
        let output = apply(&projection(&[("name", 1), ("address.city", 1)]), sample());
        assert_eq!(
            Value::Object(output),
            json!({"id": "c1", "name": "Alice", "address": {"city": "London"}})
        );
    }

    #[test]
    fn inclusion_can_drop_id() {
        let output = apply(&projection(&[("name", 1), ("id", 0)]), sample());
        assert_eq!(Value::Object(output), json!({"name": "Alice"}));
    }

    #[test]
    fn exclusion_removes_listed_fields() {
        let output = apply(&projection(&[("age", 0), ("address.zip", 0)]), sample());
        assert_eq!(
            Value::Object(output),
            json!({"id": "c1", "name": "Alice", "address": {"city": "London"}})
        );
    }

    #[test]
    fn missing_fields_are_skipped() {
        let output = apply(&projection(&[("email", 1)]), sample());
        assert_eq!(Value::Object(output), json!({"id": "c1"}));
    }
}
