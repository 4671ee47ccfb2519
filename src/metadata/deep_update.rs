// src/metadata/deep_update.rs
use serde_json::Value;

/// Recursively merge `update` into `base`.
///
/// Objects merge key-by-key. Arrays merge element-wise by their `"name"` key
/// when every element on both sides is an object carrying one (the convention
/// used by `Device` and `ElectrodeGroup` metadata lists); any other pair of
/// values is replaced by the update.
pub fn deep_update(base: &mut Value, update: &Value) {
    match update {
        Value::Object(update_map) => {
            if let Value::Object(base_map) = base {
                for (key, update_value) in update_map {
                    match base_map.get_mut(key) {
                        Some(base_value) => deep_update(base_value, update_value),
                        None => {
                            base_map.insert(key.clone(), update_value.clone());
                        }
                    }
                }
                return;
            }
            *base = update.clone();
        }
        Value::Array(update_items) => {
            if let Value::Array(base_items) = base {
                let mergeable = base_items
                    .iter()
                    .chain(update_items.iter())
                    .all(has_name_key);
                if mergeable {
                    for update_item in update_items {
                        let update_name = name_of(update_item);
                        match base_items
                            .iter_mut()
                            .find(|item| name_of(item) == update_name)
                        {
                            Some(base_item) => deep_update(base_item, update_item),
                            None => base_items.push(update_item.clone()),
                        }
                    }
                    return;
                }
            }
            *base = update.clone();
        }
        _ => *base = update.clone(),
    }
}

fn has_name_key(value: &Value) -> bool {
    value
        .as_object()
        .map_or(false, |map| map.get("name").map_or(false, Value::is_string))
}

fn name_of(value: &Value) -> Option<&str> {
    value.as_object().and_then(|map| map.get("name")).and_then(Value::as_str)
}
