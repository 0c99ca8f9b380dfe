//! Layer merge for engine configuration
//!
//! - Objects: deep-merge by key
//! - Arrays: replace
//! - Scalars: replace
//! - Null in an overlay: keeps the base value (an unset CLI flag)

use serde_json::Value;

/// Deep merge `overlay` onto `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None if overlay_value.is_null() => continue,
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Merge layers in order; later layers take precedence.
pub fn merge_layers(layers: impl IntoIterator<Item = Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}
