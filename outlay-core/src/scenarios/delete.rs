//! Delete money request
//!
//! Removing a transaction either tears the whole money report down (when
//! no visible request remains) or leaves a placeholder message in a thread
//! that must stay visible. Either way the preview counter drops by exactly
//! one and the chat's derived fields are recomputed.

use serde_json::{json, Value};

use crate::aggregate;
use crate::dispatch::{Command, DeleteMoneyRequestParams};
use crate::error::{Error, Result};
use crate::patch::{
    clear_pending_markers, timestamped_errors, PatchSet, DELETE_FAILURE_MESSAGE,
};
use crate::store::{key, ActionMap, StoreOp};
use crate::types::{ActionMessage, PendingAction};

use super::{ScenarioContext, ScenarioOutcome};

/// Orchestrate a request deletion and emit `DeleteMoneyRequest`.
pub fn delete_money_request(
    ctx: &ScenarioContext<'_>,
    transaction_id: &str,
) -> Result<ScenarioOutcome> {
    // Resolve the transaction, its report, chat, and the actions involved.
    let transaction = ctx
        .snapshot
        .transaction(transaction_id)
        .ok_or_else(|| Error::missing("transaction", transaction_id))?;
    let report = ctx
        .snapshot
        .report(&transaction.report_id)
        .ok_or_else(|| Error::missing("money report", &transaction.report_id))?;
    let chat = ctx
        .snapshot
        .chat(&report.chat_report_id)
        .ok_or_else(|| Error::missing("chat thread", &report.chat_report_id))?;
    let report_actions = ctx
        .snapshot
        .actions(&report.report_id)
        .ok_or_else(|| Error::missing("report actions", &report.report_id))?;
    let create_action = ctx
        .snapshot
        .create_action_for_transaction(&report.report_id, transaction_id)
        .ok_or_else(|| Error::missing("money request action", transaction_id))?;
    let preview = ctx
        .snapshot
        .preview_action(&chat.report_id, &report.report_id);

    // Decide: tear the report down, or leave a placeholder in a thread
    // that must stay visible.
    let remaining_requests = aggregate::visible_request_count(
        report_actions,
        Some(&create_action.report_action_id),
    );
    let should_delete_report = remaining_requests == 0;
    let has_child_thread = create_action.child_report_id.is_some();

    let transaction_key = key::transaction_key(transaction_id);
    let report_key = key::report_key(&report.report_id);
    let report_actions_key = key::report_actions_key(&report.report_id);
    let chat_key = key::chat_key(&chat.report_id);
    let chat_actions_key = key::report_actions_key(&chat.report_id);

    let mut patches = PatchSet::new();

    // --- transaction ---

    patches.optimistic.push(StoreOp::delete(&transaction_key));
    patches
        .failure
        .push(StoreOp::replace(&transaction_key, transaction));
    patches.failure.push(StoreOp::merge(
        &transaction_key,
        json!({ "errors": timestamped_errors(DELETE_FAILURE_MESSAGE, ctx.now) }),
    ));

    // --- the money request action ---

    if has_child_thread {
        // The thread survives; its parent action becomes a placeholder.
        patches.optimistic.push(StoreOp::merge(
            &report_actions_key,
            json!({
                create_action.report_action_id.clone(): {
                    "message": serde_json::to_value(vec![ActionMessage::deleted_placeholder()])
                        .expect("message serialization is infallible"),
                    "pending_action": "update",
                }
            }),
        ));
        patches.success.push(StoreOp::merge(
            &report_actions_key,
            json!({ create_action.report_action_id.clone(): clear_pending_markers() }),
        ));
    } else {
        patches.optimistic.push(StoreOp::merge(
            &report_actions_key,
            json!({ create_action.report_action_id.clone(): { "pending_action": "delete" } }),
        ));
        patches.success.push(StoreOp::merge(
            &report_actions_key,
            json!({ create_action.report_action_id.clone(): null }),
        ));
    }
    patches.failure.push(StoreOp::merge(
        &report_actions_key,
        json!({
            create_action.report_action_id.clone():
                serde_json::to_value(create_action).expect("action serialization is infallible")
        }),
    ));

    // --- report and preview ---

    let signed_amount = transaction.amount.committed;
    let updated_report = aggregate::apply_total_delta(report, -signed_amount);

    let new_preview_count = preview
        .and_then(|p| p.child_money_request_count)
        .unwrap_or(1)
        - 1;

    if should_delete_report {
        patches.optimistic.push(StoreOp::delete(&report_key));
        patches.failure.push(StoreOp::replace(&report_key, report));

        if let Some(preview) = preview {
            patches.optimistic.push(StoreOp::merge(
                &chat_actions_key,
                json!({ preview.report_action_id.clone(): { "pending_action": "delete" } }),
            ));
            patches.success.push(StoreOp::merge(
                &chat_actions_key,
                json!({ preview.report_action_id.clone(): null }),
            ));
            patches.failure.push(StoreOp::merge(
                &chat_actions_key,
                json!({
                    preview.report_action_id.clone():
                        serde_json::to_value(preview)
                            .expect("action serialization is infallible")
                }),
            ));
        }
    } else {
        patches.optimistic.push(StoreOp::merge(
            &report_key,
            json!({ "total": updated_report.total, "pending_action": "update" }),
        ));
        patches
            .success
            .push(StoreOp::merge(&report_key, clear_pending_markers()));
        patches.failure.push(StoreOp::merge(
            &report_key,
            json!({
                "total": report.total,
                "pending_action": null,
                "errors": timestamped_errors(DELETE_FAILURE_MESSAGE, ctx.now),
            }),
        ));

        if let Some(preview) = preview {
            let summary =
                aggregate::payer_summary(&updated_report, &ctx.snapshot.personal_details);
            let updated_preview =
                aggregate::update_report_preview(preview, -1, &summary, ctx.now);
            patches.optimistic.push(StoreOp::merge(
                &chat_actions_key,
                json!({
                    preview.report_action_id.clone(): {
                        "message": serde_json::to_value(&updated_preview.message)
                            .expect("message serialization is infallible"),
                        "child_money_request_count": updated_preview.child_money_request_count,
                        "pending_action": "update",
                    }
                }),
            ));
            patches.success.push(StoreOp::merge(
                &chat_actions_key,
                json!({ preview.report_action_id.clone(): clear_pending_markers() }),
            ));
            patches.failure.push(StoreOp::merge(
                &chat_actions_key,
                json!({
                    preview.report_action_id.clone(): {
                        "message": serde_json::to_value(&preview.message)
                            .expect("message serialization is infallible"),
                        "child_money_request_count": preview.child_money_request_count,
                        "pending_action": null,
                    }
                }),
            ));
        }
    }

    // --- chat derived fields ---

    let mut chat_optimistic = serde_json::Map::new();
    if should_delete_report {
        chat_optimistic.insert("iou_report_id".to_string(), Value::Null);

        // Recompute the preview from what will remain visible in the chat.
        let mut remaining: ActionMap = ctx
            .snapshot
            .actions(&chat.report_id)
            .cloned()
            .unwrap_or_default();
        if let Some(preview) = preview {
            if let Some(entry) = remaining.get_mut(&preview.report_action_id) {
                entry.pending_action = Some(PendingAction::Delete);
            }
        }
        let last = aggregate::last_message_preview(&remaining);
        chat_optimistic.insert(
            "last_message_text".to_string(),
            json!(last.as_ref().map(|l| l.text.clone()).unwrap_or_default()),
        );
        chat_optimistic.insert(
            "last_message_html".to_string(),
            json!(last.as_ref().map(|l| l.html.clone()).unwrap_or_default()),
        );
    }
    if new_preview_count <= 0 {
        chat_optimistic.insert("has_outstanding_child_request".to_string(), json!(false));
    }
    if !chat_optimistic.is_empty() {
        patches
            .optimistic
            .push(StoreOp::merge(&chat_key, Value::Object(chat_optimistic)));
        patches.failure.push(StoreOp::merge(
            &chat_key,
            json!({
                "iou_report_id": chat.iou_report_id,
                "last_message_text": chat.last_message_text,
                "last_message_html": chat.last_message_html,
                "has_outstanding_child_request": chat.has_outstanding_child_request,
            }),
        ));
    }

    tracing::debug!(
        transaction_id,
        should_delete_report,
        has_child_thread,
        remaining_requests,
        "Deleting money request"
    );

    let command = Command::DeleteMoneyRequest(DeleteMoneyRequestParams {
        transaction_id: transaction_id.to_string(),
        report_action_id: create_action.report_action_id.clone(),
    });

    Ok(ScenarioOutcome {
        command,
        patches,
        // Deletion removes content; nothing new to announce.
        notify: None,
        chat_report_id: Some(chat.report_id.clone()),
        money_report_id: Some(report.report_id.clone()),
        transaction_id: Some(transaction_id.to_string()),
    })
}
