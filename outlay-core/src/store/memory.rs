//! In-memory reference implementation of the store contract
//!
//! The engine only ever *produces* [`StoreOp`] lists; applying them is the
//! job of whatever store the embedding app runs. This module carries a
//! small in-process implementation of that contract for tests and for
//! embedders that do not bring their own store.
//!
//! Semantics implemented here (and assumed of any real store):
//! - documents are JSON values addressed by string key
//! - ops apply strictly in list order
//! - `connect` delivers the current value immediately and again after
//!   every apply that touches the subscription

use std::collections::BTreeMap;

use serde_json::Value;

use super::ops::{merge_values, StoreOp};

/// Subscription handle returned by [`MemoryStore::connect`].
pub type SubscriptionId = u64;

/// Callback invoked with the key that changed and its new value
/// (`None` when the document was deleted).
pub type ChangeCallback = Box<dyn FnMut(&str, Option<&Value>)>;

struct Subscriber {
    id: SubscriptionId,
    /// Exact key, or collection prefix when `wait_for_collection` is set
    target: String,
    wait_for_collection: bool,
    callback: ChangeCallback,
}

impl Subscriber {
    fn matches(&self, key: &str) -> bool {
        if self.wait_for_collection {
            key.starts_with(&self.target)
        } else {
            key == self.target
        }
    }
}

/// In-memory key-value document store with subscriptions.
#[derive(Default)]
pub struct MemoryStore {
    docs: BTreeMap<String, Value>,
    subscribers: Vec<Subscriber>,
    next_subscription: SubscriptionId,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a document.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.docs.get(key)
    }

    /// All documents whose key starts with `prefix`.
    pub fn collection<'a>(
        &'a self,
        prefix: &str,
    ) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
        let prefix = prefix.to_string();
        self.docs
            .range(prefix.clone()..)
            .take_while(move |(key, _)| key.starts_with(&prefix))
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Subscribe to a key (or, with `wait_for_collection`, to every key
    /// under a collection prefix). The callback fires once immediately
    /// with the current value and again after every apply that touches
    /// the subscription.
    pub fn connect(
        &mut self,
        key_or_prefix: impl Into<String>,
        wait_for_collection: bool,
        mut callback: ChangeCallback,
    ) -> SubscriptionId {
        let target = key_or_prefix.into();
        self.next_subscription += 1;
        let id = self.next_subscription;

        if wait_for_collection {
            let initial: Vec<(String, Value)> = self
                .collection(&target)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            for (key, value) in &initial {
                callback(key, Some(value));
            }
        } else if let Some(value) = self.docs.get(&target) {
            callback(&target, Some(value));
        } else {
            callback(&target, None);
        }

        self.subscribers.push(Subscriber {
            id,
            target,
            wait_for_collection,
            callback,
        });
        id
    }

    /// Remove a subscription.
    pub fn disconnect(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|s| s.id != id);
    }

    /// Apply a patch list in order, then notify matching subscribers once
    /// per touched key.
    pub fn apply(&mut self, ops: &[StoreOp]) {
        let mut touched: Vec<String> = Vec::with_capacity(ops.len());

        for op in ops {
            let key = op.key().to_string();
            match op {
                StoreOp::Replace { value, .. } => {
                    if value.is_null() {
                        self.docs.remove(&key);
                    } else {
                        self.docs.insert(key.clone(), value.clone());
                    }
                }
                StoreOp::MergeShallow { value, .. } => {
                    let slot = self
                        .docs
                        .entry(key.clone())
                        .or_insert_with(|| Value::Object(serde_json::Map::new()));
                    merge_values(slot, value);
                }
                StoreOp::Delete { .. } => {
                    self.docs.remove(&key);
                }
            }
            if !touched.contains(&key) {
                touched.push(key);
            }
        }

        for key in &touched {
            let value = self.docs.get(key).cloned();
            for sub in &mut self.subscribers {
                if sub.matches(key) {
                    (sub.callback)(key, value.as_ref());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_apply_in_order() {
        let mut store = MemoryStore::new();
        store.apply(&[
            StoreOp::Replace {
                key: "report_r1".to_string(),
                value: json!({ "total": 1000 }),
            },
            StoreOp::merge("report_r1", json!({ "total": 2000 })),
        ]);
        assert_eq!(store.get("report_r1"), Some(&json!({ "total": 2000 })));
    }

    #[test]
    fn test_delete_removes_document() {
        let mut store = MemoryStore::new();
        store.apply(&[StoreOp::Replace {
            key: "report_r1".to_string(),
            value: json!({ "total": 1 }),
        }]);
        store.apply(&[StoreOp::delete("report_r1")]);
        assert!(store.get("report_r1").is_none());
    }

    #[test]
    fn test_replace_null_deletes() {
        let mut store = MemoryStore::new();
        store.apply(&[StoreOp::Replace {
            key: "report_r1".to_string(),
            value: json!({ "total": 1 }),
        }]);
        store.apply(&[StoreOp::Replace {
            key: "report_r1".to_string(),
            value: Value::Null,
        }]);
        assert!(store.get("report_r1").is_none());
    }

    #[test]
    fn test_merge_creates_missing_document() {
        let mut store = MemoryStore::new();
        store.apply(&[StoreOp::merge("chat_c1", json!({ "report_id": "c1" }))]);
        assert_eq!(store.get("chat_c1"), Some(&json!({ "report_id": "c1" })));
    }

    #[test]
    fn test_connect_delivers_current_then_changes() {
        let seen: Rc<RefCell<Vec<Option<Value>>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut store = MemoryStore::new();
        store.apply(&[StoreOp::merge("chat_c1", json!({ "a": 1 }))]);

        store.connect(
            "chat_c1",
            false,
            Box::new(move |_key, value| {
                sink.borrow_mut().push(value.cloned());
            }),
        );
        store.apply(&[StoreOp::merge("chat_c1", json!({ "a": 2 }))]);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], Some(json!({ "a": 1 })));
        assert_eq!(seen[1], Some(json!({ "a": 2 })));
    }

    #[test]
    fn test_collection_subscription_sees_every_member() {
        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut store = MemoryStore::new();
        store.connect(
            "report_",
            true,
            Box::new(move |key, _value| {
                sink.borrow_mut().push(key.to_string());
            }),
        );

        store.apply(&[
            StoreOp::merge("report_r1", json!({ "total": 1 })),
            StoreOp::merge("report_r2", json!({ "total": 2 })),
            StoreOp::merge("chat_c1", json!({ "x": 1 })),
        ]);

        assert_eq!(*seen.borrow(), vec!["report_r1", "report_r2"]);
    }
}
