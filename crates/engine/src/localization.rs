//! Flat view over the nested `en` localisation blob.

use std::collections::HashMap;

use serde_json::Value;

/// The upstream file nests tables arbitrarily deep, so every string leaf is
/// flattened into one map up front. Later occurrences of a key win.
#[derive(Debug, Clone, Default)]
pub struct Localization {
    flat: HashMap<String, String>,
}

impl Localization {
    pub fn new(data: &Value) -> Self {
        let mut loc = Self::default();
        loc.flatten(data);
        loc
    }

    fn flatten(&mut self, data: &Value) {
        match data {
            Value::Object(map) => {
                for (key, value) in map {
                    match value {
                        Value::String(text) => {
                            self.flat.insert(key.clone(), text.clone());
                        }
                        Value::Object(_) | Value::Array(_) => self.flatten(value),
                        _ => {}
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.flatten(item);
                }
            }
            _ => {}
        }
    }

    pub fn len(&self) -> usize {
        self.flat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.flat.get(key).map(String::as_str)
    }

    /// Display name of an item, falling back to a placeholder so callers
    /// never have to special-case missing entries.
    pub fn item_name(&self, item_id: u64) -> String {
        self.get(&format!("ItemName_{item_id}"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Item {item_id}"))
    }
}
