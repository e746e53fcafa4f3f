use serde_json::{Map, Value};

/// Collect `(path, old, new)` for every leaf that differs between two JSON
/// documents. Arrays are compared element by element using the index as
/// the path segment.
pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    path_prefix: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = join(path_prefix, key);
                match prev_map.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &path, changes),
                    None if curr_val.is_object() => {
                        diff_json(&Value::Object(Map::new()), curr_val, &path, changes)
                    }
                    None => changes.push((path, Value::Null, curr_val.clone())),
                }
            }
            for (key, prev_val) in prev_map {
                if !curr_map.contains_key(key) {
                    changes.push((join(path_prefix, key), prev_val.clone(), Value::Null));
                }
            }
        }
        (Value::Array(prev_items), Value::Array(curr_items)) if prev_items.len() == curr_items.len() => {
            for (idx, (p, c)) in prev_items.iter().zip(curr_items).enumerate() {
                diff_json(p, c, &join(path_prefix, &idx.to_string()), changes);
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}
