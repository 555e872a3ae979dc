//! Store patch operations and merge semantics
//!
//! The engine mutates the external store exclusively through ordered lists
//! of [`StoreOp`]s. Three primitives exist:
//!
//! - `Replace(key, value)`: full document overwrite
//! - `MergeShallow(key, partial)`: recursive object merge where a `null`
//!   leaf clears the stored field and an omitted key leaves the stored
//!   value untouched
//! - `Delete(key)`: equivalent to `Replace(key, null)`
//!
//! The omitted-vs-null distinction is load-bearing: aggregation rules emit
//! partials that deliberately omit keys (leave unchanged) or null them
//! (clear), and the confirm/reject patch lists rely on both.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One mutation against the external key-value store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum StoreOp {
    /// Full overwrite of the document at `key`
    Replace { key: String, value: Value },
    /// Recursive shallow merge of `value` into the document at `key`
    MergeShallow { key: String, value: Value },
    /// Remove the document at `key`
    Delete { key: String },
}

impl StoreOp {
    /// The key this operation targets.
    pub fn key(&self) -> &str {
        match self {
            StoreOp::Replace { key, .. } => key,
            StoreOp::MergeShallow { key, .. } => key,
            StoreOp::Delete { key } => key,
        }
    }

    /// Replace op from any serializable document.
    pub fn replace<T: Serialize>(key: impl Into<String>, value: &T) -> Self {
        StoreOp::Replace {
            key: key.into(),
            value: serde_json::to_value(value).expect("document serialization is infallible"),
        }
    }

    /// Merge op from a partial JSON value.
    pub fn merge(key: impl Into<String>, value: Value) -> Self {
        StoreOp::MergeShallow {
            key: key.into(),
            value,
        }
    }

    /// Delete op.
    pub fn delete(key: impl Into<String>) -> Self {
        StoreOp::Delete { key: key.into() }
    }
}

/// Merge `patch` into `base` under the store's merge semantics.
///
/// Objects merge recursively; any non-object patch value (including arrays)
/// replaces the stored value wholesale; a `null` patch leaf removes the
/// stored field; keys absent from the patch are left untouched.
pub fn merge_values(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (field, patch_value) in patch_map {
                if patch_value.is_null() {
                    base_map.remove(field);
                    continue;
                }
                match base_map.get_mut(field) {
                    Some(existing) if existing.is_object() && patch_value.is_object() => {
                        merge_values(existing, patch_value);
                    }
                    _ => {
                        base_map.insert(field.clone(), patch_value.clone());
                    }
                }
            }
        }
        (base_slot, patch_value) => {
            *base_slot = patch_value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_omitted_key_leaves_value() {
        let mut base = json!({ "total": 1000, "currency": "USD" });
        merge_values(&mut base, &json!({ "total": 2000 }));
        assert_eq!(base, json!({ "total": 2000, "currency": "USD" }));
    }

    #[test]
    fn test_merge_null_leaf_clears_field() {
        let mut base = json!({ "pending_action": "add", "total": 1000 });
        merge_values(&mut base, &json!({ "pending_action": null }));
        assert_eq!(base, json!({ "total": 1000 }));
    }

    #[test]
    fn test_merge_recurses_into_objects() {
        let mut base = json!({
            "pending_fields": { "create_chat": "add", "total": "update" },
            "report_id": "r1"
        });
        merge_values(&mut base, &json!({ "pending_fields": { "create_chat": null } }));
        assert_eq!(
            base,
            json!({ "pending_fields": { "total": "update" }, "report_id": "r1" })
        );
    }

    #[test]
    fn test_merge_array_replaces_wholesale() {
        let mut base = json!({ "whispered_to_account_ids": [1, 2, 3] });
        merge_values(&mut base, &json!({ "whispered_to_account_ids": [] }));
        assert_eq!(base, json!({ "whispered_to_account_ids": [] }));
    }

    #[test]
    fn test_merge_into_missing_field_inserts() {
        let mut base = json!({});
        merge_values(&mut base, &json!({ "errors": { "170000": "failed" } }));
        assert_eq!(base, json!({ "errors": { "170000": "failed" } }));
    }

    #[test]
    fn test_scalar_base_is_replaced() {
        let mut base = json!(42);
        merge_values(&mut base, &json!({ "a": 1 }));
        assert_eq!(base, json!({ "a": 1 }));
    }
}
