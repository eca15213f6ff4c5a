// [libs/domain/transform/src/paths.rs]
//! Dotted-path get/set over `serde_json::Value`. No array indices — rules operate on scalar
//! and object fields; none of the rule kinds (FIELD_MAPPING, VALUE_MAPPING, etc.) need list
//! indexing.

use serde_json::Value;

pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cursor = doc;
    for segment in path.split('.') {
        cursor = cursor.as_object()?.get(segment)?;
    }
    Some(cursor)
}

/// Creates intermediate objects as needed; overwrites a non-object
/// intermediate value rather than erroring, since the output map starts
/// empty and rules only ever add to it.
pub fn set_path(doc: &mut Value, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let mut cursor = doc;
    for segment in &segments[..segments.len() - 1] {
        if !cursor.is_object() {
            *cursor = Value::Object(serde_json::Map::new());
        }
        let map = cursor.as_object_mut().expect("just ensured object");
        cursor = map.entry(segment.to_string()).or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    if !cursor.is_object() {
        *cursor = Value::Object(serde_json::Map::new());
    }
    cursor.as_object_mut().expect("just ensured object").insert(segments.last().unwrap().to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_nested_path() {
        let doc = json!({"name": {"first": "Ada"}});
        assert_eq!(get_path(&doc, "name.first"), Some(&json!("Ada")));
        assert_eq!(get_path(&doc, "name.last"), None);
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut doc = json!({});
        set_path(&mut doc, "patient.name.first", json!("Grace"));
        assert_eq!(doc, json!({"patient": {"name": {"first": "Grace"}}}));
    }

    #[test]
    fn set_overwrites_scalar_intermediate() {
        let mut doc = json!({"patient": "placeholder"});
        set_path(&mut doc, "patient.name", json!("Grace"));
        assert_eq!(doc, json!({"patient": {"name": "Grace"}}));
    }
}



