//! Patch-set assembly
//!
//! Every scenario produces three ordered patch lists against the store:
//!
//! - *optimistic*: applied immediately, pending markers set
//! - *success*: clears exactly the pending markers the optimistic list
//!   set, never a stray one left behind
//! - *failure*: restores pre-mutation values and attaches a timestamped
//!   user-readable error on the document the user should see flagged
//!
//! Exactly one of success/failure eventually applies per command, or
//! neither if the app never hears back; the optimistic state must stay
//! renderable indefinitely.
//!
//! The common "create a money request" shape is assembled here and reused
//! by the request, split, and send orchestrators.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::store::{key, StoreOp};
use crate::types::{ChatThread, MoneyReport, PersonalDetail, ReportAction, Transaction};

/// Failure message attached when creating a request is rejected.
pub const CREATE_FAILURE_MESSAGE: &str =
    "Unexpected error while creating this request. Please try again later.";
/// Failure message attached when an edit is rejected.
pub const EDIT_FAILURE_MESSAGE: &str =
    "Unexpected error while editing this request. Please try again later.";
/// Failure message attached when a delete is rejected.
pub const DELETE_FAILURE_MESSAGE: &str =
    "Unexpected error while deleting this request. Please try again later.";
/// Failure message attached when a workflow transition is rejected.
pub const WORKFLOW_FAILURE_MESSAGE: &str =
    "Unexpected error while updating this report. Please try again later.";

/// The (apply, confirm, reject) triad for one outbound command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchSet {
    /// Applied immediately, before the server responds
    pub optimistic: Vec<StoreOp>,
    /// Applied when the server confirms
    pub success: Vec<StoreOp>,
    /// Applied when the server rejects
    pub failure: Vec<StoreOp>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append another triad, preserving order within each list.
    pub fn extend(&mut self, other: PatchSet) {
        self.optimistic.extend(other.optimistic);
        self.success.extend(other.success);
        self.failure.extend(other.failure);
    }

    pub fn is_empty(&self) -> bool {
        self.optimistic.is_empty() && self.success.is_empty() && self.failure.is_empty()
    }
}

/// A timestamped error bag: `{ "<ms-timestamp>": message }`. The key
/// orders messages so the UI renders the newest.
pub fn timestamped_errors(message: &str, now: DateTime<Utc>) -> Value {
    json!({ now.timestamp_millis().to_string(): message })
}

/// Merge partial clearing a document's pending marker and transient
/// errors.
pub fn clear_pending_markers() -> Value {
    json!({ "pending_action": null, "errors": null })
}

/// Merge partial clearing pending markers on a set of actions inside an
/// action map document.
pub fn clear_action_markers(action_ids: &[&str]) -> Value {
    let mut map = Map::new();
    for id in action_ids {
        map.insert((*id).to_string(), clear_pending_markers());
    }
    Value::Object(map)
}

/// Merge partial attaching an error to one action inside an action map.
pub fn action_errors(action_id: &str, message: &str, now: DateTime<Utc>) -> Value {
    json!({ action_id: { "errors": timestamped_errors(message, now) } })
}

// ============================================
// Money-request assembler
// ============================================

/// Inputs to [`money_request_patches`]: the post-mutation entities plus
/// the pre-mutation values needed for rollback. A `prior_*` of `None`
/// means the entity is brand new.
pub struct MoneyRequestPatchArgs<'a> {
    pub chat: &'a ChatThread,
    pub prior_chat: Option<&'a ChatThread>,
    pub report: &'a MoneyReport,
    pub prior_report: Option<&'a MoneyReport>,
    pub transaction: &'a Transaction,
    /// Created action for the chat; present only when the chat is new
    pub chat_created_action: Option<&'a ReportAction>,
    /// Created action for the money report; present only when it is new
    pub report_created_action: Option<&'a ReportAction>,
    pub iou_action: &'a ReportAction,
    pub preview_action: &'a ReportAction,
    /// The preview's pre-mutation value when it already existed
    pub prior_preview: Option<&'a ReportAction>,
    /// Personal details synthesized for unknown participants
    pub optimistic_details: &'a [PersonalDetail],
}

/// Assemble the patch triad for the common create-a-money-request shape.
pub fn money_request_patches(args: &MoneyRequestPatchArgs<'_>, now: DateTime<Utc>) -> PatchSet {
    let mut patches = PatchSet::new();

    let chat_key = key::chat_key(&args.chat.report_id);
    let report_key = key::report_key(&args.report.report_id);
    let transaction_key = key::transaction_key(&args.transaction.transaction_id);
    let chat_actions_key = key::report_actions_key(&args.chat.report_id);
    let report_actions_key = key::report_actions_key(&args.report.report_id);

    // --- optimistic ---

    match args.prior_chat {
        None => patches
            .optimistic
            .push(StoreOp::replace(&chat_key, args.chat)),
        Some(_) => patches
            .optimistic
            .push(StoreOp::merge(&chat_key, chat_update_merge(args.chat))),
    }

    match args.prior_report {
        None => patches
            .optimistic
            .push(StoreOp::replace(&report_key, args.report)),
        Some(_) => patches
            .optimistic
            .push(StoreOp::merge(&report_key, report_update_merge(args.report))),
    }

    patches
        .optimistic
        .push(StoreOp::replace(&transaction_key, args.transaction));

    let mut chat_actions = Map::new();
    if let Some(action) = args.chat_created_action {
        chat_actions.insert(
            action.report_action_id.clone(),
            serde_json::to_value(action).expect("action serialization is infallible"),
        );
    }
    chat_actions.insert(
        args.preview_action.report_action_id.clone(),
        serde_json::to_value(args.preview_action).expect("action serialization is infallible"),
    );
    patches
        .optimistic
        .push(StoreOp::merge(&chat_actions_key, Value::Object(chat_actions)));

    let mut report_actions = Map::new();
    if let Some(action) = args.report_created_action {
        report_actions.insert(
            action.report_action_id.clone(),
            serde_json::to_value(action).expect("action serialization is infallible"),
        );
    }
    report_actions.insert(
        args.iou_action.report_action_id.clone(),
        serde_json::to_value(args.iou_action).expect("action serialization is infallible"),
    );
    patches.optimistic.push(StoreOp::merge(
        &report_actions_key,
        Value::Object(report_actions),
    ));

    if !args.optimistic_details.is_empty() {
        let mut details = Map::new();
        for detail in args.optimistic_details {
            details.insert(
                detail.account_id.to_string(),
                serde_json::to_value(detail).expect("detail serialization is infallible"),
            );
        }
        patches.optimistic.push(StoreOp::merge(
            key::PERSONAL_DETAILS_KEY,
            Value::Object(details),
        ));
    }

    // --- success: clear exactly the markers set above ---

    let create_chat_field = crate::builders::PENDING_FIELD_CREATE_CHAT;
    let chat_success = if args.prior_chat.is_none() {
        json!({
            "pending_action": null,
            "pending_fields": { create_chat_field: null },
            "errors": null
        })
    } else {
        clear_pending_markers()
    };
    patches.success.push(StoreOp::merge(&chat_key, chat_success));
    patches
        .success
        .push(StoreOp::merge(&report_key, clear_pending_markers()));
    patches
        .success
        .push(StoreOp::merge(&transaction_key, clear_pending_markers()));

    let mut chat_action_ids: Vec<&str> = Vec::new();
    if let Some(action) = args.chat_created_action {
        chat_action_ids.push(&action.report_action_id);
    }
    chat_action_ids.push(&args.preview_action.report_action_id);
    patches.success.push(StoreOp::merge(
        &chat_actions_key,
        clear_action_markers(&chat_action_ids),
    ));

    let mut report_action_ids: Vec<&str> = Vec::new();
    if let Some(action) = args.report_created_action {
        report_action_ids.push(&action.report_action_id);
    }
    report_action_ids.push(&args.iou_action.report_action_id);
    patches.success.push(StoreOp::merge(
        &report_actions_key,
        clear_action_markers(&report_action_ids),
    ));

    for detail in args.optimistic_details {
        patches.success.push(StoreOp::merge(
            key::PERSONAL_DETAILS_KEY,
            json!({ detail.account_id.to_string(): { "is_optimistic_personal_detail": null } }),
        ));
    }

    // --- failure: restore priors, attach errors ---

    let chat_failure = match args.prior_chat {
        None => json!({ "errors": timestamped_errors(CREATE_FAILURE_MESSAGE, now) }),
        Some(prior) => chat_restore_merge(prior, timestamped_errors(CREATE_FAILURE_MESSAGE, now)),
    };
    patches.failure.push(StoreOp::merge(&chat_key, chat_failure));

    let report_failure = match args.prior_report {
        None => json!({ "errors": timestamped_errors(CREATE_FAILURE_MESSAGE, now) }),
        Some(prior) => report_restore_merge(prior, timestamped_errors(CREATE_FAILURE_MESSAGE, now)),
    };
    patches.failure.push(StoreOp::merge(&report_key, report_failure));

    patches.failure.push(StoreOp::merge(
        &transaction_key,
        json!({ "errors": timestamped_errors(CREATE_FAILURE_MESSAGE, now) }),
    ));

    patches.failure.push(StoreOp::merge(
        &report_actions_key,
        action_errors(&args.iou_action.report_action_id, CREATE_FAILURE_MESSAGE, now),
    ));

    match args.prior_preview {
        Some(prior) => {
            // Restore the pre-mutation preview skeleton wholesale.
            patches.failure.push(StoreOp::merge(
                &chat_actions_key,
                json!({
                    prior.report_action_id.clone(): {
                        "message": serde_json::to_value(&prior.message)
                            .expect("message serialization is infallible"),
                        "created": serde_json::to_value(&prior.created)
                            .expect("timestamp serialization is infallible"),
                        "child_money_request_count": prior.child_money_request_count,
                        "pending_action": null,
                    }
                }),
            ));
        }
        None => patches.failure.push(StoreOp::merge(
            &chat_actions_key,
            action_errors(
                &args.preview_action.report_action_id,
                CREATE_FAILURE_MESSAGE,
                now,
            ),
        )),
    }

    patches
}

/// Optimistic merge partial for an existing chat folded into a new
/// request: linkage, previews and the outstanding flag (omitted when the
/// rule says the stored value must win).
fn chat_update_merge(chat: &ChatThread) -> Value {
    let mut map = Map::new();
    if let Some(iou_report_id) = &chat.iou_report_id {
        map.insert("iou_report_id".to_string(), json!(iou_report_id));
    }
    map.insert(
        "last_message_text".to_string(),
        json!(chat.last_message_text),
    );
    map.insert(
        "last_message_html".to_string(),
        json!(chat.last_message_html),
    );
    map.insert(
        "last_visible_action_created".to_string(),
        serde_json::to_value(chat.last_visible_action_created)
            .expect("timestamp serialization is infallible"),
    );
    map.insert(
        "last_read_time".to_string(),
        serde_json::to_value(chat.last_read_time).expect("timestamp serialization is infallible"),
    );
    if let Some(flag) = chat.has_outstanding_child_request {
        map.insert("has_outstanding_child_request".to_string(), json!(flag));
    }
    map.insert("pending_action".to_string(), json!("update"));
    Value::Object(map)
}

/// Failure merge restoring an existing chat's optimistically mutated
/// fields to their pre-mutation values.
fn chat_restore_merge(prior: &ChatThread, errors: Value) -> Value {
    json!({
        "iou_report_id": prior.iou_report_id,
        "last_message_text": prior.last_message_text,
        "last_message_html": prior.last_message_html,
        "last_visible_action_created": serde_json::to_value(prior.last_visible_action_created)
            .expect("timestamp serialization is infallible"),
        "has_outstanding_child_request": prior.has_outstanding_child_request,
        "pending_action": null,
        "errors": errors,
    })
}

/// Optimistic merge partial for an existing report absorbing a new
/// transaction.
fn report_update_merge(report: &MoneyReport) -> Value {
    json!({
        "total": report.total,
        "owner_account_id": report.owner_account_id,
        "manager_account_id": report.manager_account_id,
        "pending_action": "update",
    })
}

/// Failure merge restoring an existing report's total and attribution.
pub(crate) fn report_restore_merge(prior: &MoneyReport, errors: Value) -> Value {
    json!({
        "total": prior.total,
        "owner_account_id": prior.owner_account_id,
        "manager_account_id": prior.manager_account_id,
        "state": serde_json::to_value(prior.state).expect("state serialization is infallible"),
        "status": serde_json::to_value(prior.status).expect("status serialization is infallible"),
        "pending_action": null,
        "errors": errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_timestamped_errors_key_is_millis() {
        let now = Utc::now();
        let errors = timestamped_errors("boom", now);
        let map = errors.as_object().unwrap();
        assert_eq!(map.len(), 1);
        let key = map.keys().next().unwrap();
        assert_eq!(key, &now.timestamp_millis().to_string());
    }

    #[test]
    fn test_clear_action_markers_covers_each_id() {
        let value = clear_action_markers(&["a1", "a2"]);
        assert_eq!(value["a1"], clear_pending_markers());
        assert_eq!(value["a2"], clear_pending_markers());
    }

    #[test]
    fn test_patch_set_extend_preserves_order() {
        let mut first = PatchSet::new();
        first.optimistic.push(StoreOp::merge("k1", json!({})));
        let mut second = PatchSet::new();
        second.optimistic.push(StoreOp::merge("k2", json!({})));

        first.extend(second);
        assert_eq!(first.optimistic[0].key(), "k1");
        assert_eq!(first.optimistic[1].key(), "k2");
    }
}
