//! Edit money request
//!
//! Edits never overwrite a transaction's committed values: each changed
//! field stages a shadow next to the original, so confirmation promotes
//! it and rejection discards it losslessly. The report total only moves
//! when every currency involved matches the report's; otherwise the
//! conversion is the server's call and only the shadows change.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::aggregate;
use crate::builders;
use crate::dispatch::{
    Command, EditMoneyRequestParams, UpdateAmountParams, UpdateDateParams,
    UpdateDescriptionParams,
};
use crate::error::{Error, Result};
use crate::patch::{
    action_errors, clear_action_markers, clear_pending_markers, timestamped_errors, PatchSet,
    EDIT_FAILURE_MESSAGE,
};
use crate::store::{key, StoreOp};
use crate::types::ActionPayload;

use super::{ScenarioContext, ScenarioOutcome};

/// The fields an edit may change. `amount` is the positive user-entered
/// value; sign conversion follows the owning report.
#[derive(Debug, Clone, Default)]
pub struct TransactionChanges {
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub merchant: Option<String>,
    pub comment: Option<String>,
}

impl TransactionChanges {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.currency.is_none()
            && self.created.is_none()
            && self.merchant.is_none()
            && self.comment.is_none()
    }
}

enum EditCommand {
    Full,
    Amount,
    Date,
    Description,
}

/// Orchestrate a multi-field edit and emit `EditMoneyRequest`.
pub fn edit_money_request(
    ctx: &ScenarioContext<'_>,
    transaction_id: &str,
    changes: &TransactionChanges,
) -> Result<ScenarioOutcome> {
    build_edit_outcome(ctx, transaction_id, changes, EditCommand::Full)
}

/// Amount-scoped edit; emits `UpdateMoneyRequestAmount`.
pub fn update_money_request_amount(
    ctx: &ScenarioContext<'_>,
    transaction_id: &str,
    amount: i64,
    currency: &str,
) -> Result<ScenarioOutcome> {
    build_edit_outcome(
        ctx,
        transaction_id,
        &TransactionChanges {
            amount: Some(amount),
            currency: Some(currency.to_string()),
            ..TransactionChanges::default()
        },
        EditCommand::Amount,
    )
}

/// Date-scoped edit; emits `UpdateMoneyRequestDate`.
pub fn update_money_request_date(
    ctx: &ScenarioContext<'_>,
    transaction_id: &str,
    created: DateTime<Utc>,
) -> Result<ScenarioOutcome> {
    build_edit_outcome(
        ctx,
        transaction_id,
        &TransactionChanges {
            created: Some(created),
            ..TransactionChanges::default()
        },
        EditCommand::Date,
    )
}

/// Description-scoped edit; emits `UpdateMoneyRequestDescription`.
pub fn update_money_request_description(
    ctx: &ScenarioContext<'_>,
    transaction_id: &str,
    comment: &str,
) -> Result<ScenarioOutcome> {
    build_edit_outcome(
        ctx,
        transaction_id,
        &TransactionChanges {
            comment: Some(comment.to_string()),
            ..TransactionChanges::default()
        },
        EditCommand::Description,
    )
}

fn build_edit_outcome(
    ctx: &ScenarioContext<'_>,
    transaction_id: &str,
    changes: &TransactionChanges,
    command_kind: EditCommand,
) -> Result<ScenarioOutcome> {
    let actor = ctx.session.account_id;

    // Resolve the transaction and its owners.
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

    // Stage shadows and collect the merge partials per changed field.
    let mut staged = Map::new();
    let mut promoted = Map::new();
    let mut discarded = Map::new();
    let mut pending_set = Map::new();
    let mut pending_clear = Map::new();

    let mut stage_field = |field: &str, new_value: Value| {
        staged.insert(field.to_string(), json!({ "staged": new_value.clone() }));
        promoted.insert(
            field.to_string(),
            json!({ "committed": new_value, "staged": null }),
        );
        discarded.insert(field.to_string(), json!({ "staged": null }));
        pending_set.insert(field.to_string(), json!("update"));
        pending_clear.insert(field.to_string(), Value::Null);
    };

    let new_signed_amount = changes
        .amount
        .map(|amount| report.sign_convention().signed(amount));
    if let Some(signed) = new_signed_amount {
        stage_field("amount", json!(signed));
    }
    if let Some(currency) = &changes.currency {
        stage_field("currency", json!(currency));
    }
    if let Some(created) = &changes.created {
        stage_field(
            "created",
            serde_json::to_value(created).expect("timestamp serialization is infallible"),
        );
    }
    if let Some(merchant) = &changes.merchant {
        stage_field("merchant", json!(merchant));
    }
    if let Some(comment) = &changes.comment {
        stage_field("comment", json!(comment));
    }

    // The total moves only when no currency conversion is pending.
    let new_currency = changes
        .currency
        .as_deref()
        .unwrap_or(&transaction.currency.committed);
    let currencies_match =
        new_currency == report.currency && transaction.currency.committed == report.currency;
    let delta = match new_signed_amount {
        Some(signed) if currencies_match => signed - transaction.amount.committed,
        _ => 0,
    };

    let updated_report = aggregate::apply_total_delta(report, delta);

    // The modified-expense action documents old and new values for the
    // thread.
    let amount_changed = changes.amount.is_some() && delta != 0;
    let modified_action = builders::build_modified_expense_action(
        &report.report_id,
        actor,
        ActionPayload::ModifiedExpense {
            old_amount: changes.amount.map(|_| transaction.amount.committed.abs()),
            amount: changes.amount,
            old_currency: changes
                .currency
                .as_ref()
                .map(|_| transaction.currency.committed.clone()),
            currency: changes.currency.clone(),
            old_created: changes.created.map(|_| transaction.created.committed),
            created: changes.created,
            old_merchant: changes
                .merchant
                .as_ref()
                .map(|_| transaction.merchant.committed.clone()),
            merchant: changes.merchant.clone(),
            old_comment: changes
                .comment
                .as_ref()
                .map(|_| transaction.comment.committed.clone()),
            comment: changes.comment.clone(),
        },
        ctx.now,
    );

    let transaction_key = key::transaction_key(transaction_id);
    let report_key = key::report_key(&report.report_id);
    let report_actions_key = key::report_actions_key(&report.report_id);
    let chat_key = key::chat_key(&chat.report_id);
    let chat_actions_key = key::report_actions_key(&chat.report_id);

    let mut patches = PatchSet::new();

    // --- transaction shadows ---

    let mut txn_optimistic = staged;
    txn_optimistic.insert("pending_fields".to_string(), Value::Object(pending_set));
    txn_optimistic.insert("pending_action".to_string(), json!("update"));
    patches
        .optimistic
        .push(StoreOp::merge(&transaction_key, Value::Object(txn_optimistic)));

    let mut txn_success = promoted;
    txn_success.insert(
        "pending_fields".to_string(),
        Value::Object(pending_clear.clone()),
    );
    txn_success.insert("pending_action".to_string(), Value::Null);
    txn_success.insert("errors".to_string(), Value::Null);
    patches
        .success
        .push(StoreOp::merge(&transaction_key, Value::Object(txn_success)));

    let mut txn_failure = discarded;
    txn_failure.insert("pending_fields".to_string(), Value::Object(pending_clear));
    txn_failure.insert("pending_action".to_string(), Value::Null);
    txn_failure.insert(
        "errors".to_string(),
        timestamped_errors(EDIT_FAILURE_MESSAGE, ctx.now),
    );
    patches
        .failure
        .push(StoreOp::merge(&transaction_key, Value::Object(txn_failure)));

    // --- report total ---

    if delta != 0 {
        patches.optimistic.push(StoreOp::merge(
            &report_key,
            json!({ "total": updated_report.total, "pending_action": "update" }),
        ));
        patches
            .success
            .push(StoreOp::merge(&report_key, clear_pending_markers()));
        patches.failure.push(StoreOp::merge(
            &report_key,
            json!({ "total": report.total, "pending_action": null }),
        ));
    }

    // --- modified action ---

    patches.optimistic.push(StoreOp::merge(
        &report_actions_key,
        json!({
            modified_action.report_action_id.clone():
                serde_json::to_value(&modified_action)
                    .expect("action serialization is infallible")
        }),
    ));
    patches.success.push(StoreOp::merge(
        &report_actions_key,
        clear_action_markers(&[&modified_action.report_action_id]),
    ));
    patches.failure.push(StoreOp::merge(
        &report_actions_key,
        action_errors(&modified_action.report_action_id, EDIT_FAILURE_MESSAGE, ctx.now),
    ));

    // --- whisper reset while a scan is in flight ---

    let scanning = transaction
        .receipt
        .as_ref()
        .map(|r| r.state.is_scanning())
        .unwrap_or(false);
    if scanning {
        if let Some(create_action) = ctx
            .snapshot
            .create_action_for_transaction(&report.report_id, transaction_id)
        {
            patches.optimistic.push(StoreOp::merge(
                &report_actions_key,
                json!({
                    create_action.report_action_id.clone():
                        { "whispered_to_account_ids": [] }
                }),
            ));
            patches.failure.push(StoreOp::merge(
                &report_actions_key,
                json!({
                    create_action.report_action_id.clone(): {
                        "whispered_to_account_ids": create_action.whispered_to_account_ids
                    }
                }),
            ));
        }
    }

    // --- chat preview when the visible numbers changed ---

    if amount_changed {
        let summary = aggregate::payer_summary(&updated_report, &ctx.snapshot.personal_details);
        if let Some(preview) = ctx
            .snapshot
            .preview_action(&chat.report_id, &report.report_id)
        {
            let updated_preview =
                aggregate::update_report_preview(preview, 0, &summary, ctx.now);
            patches.optimistic.push(StoreOp::merge(
                &chat_actions_key,
                json!({
                    preview.report_action_id.clone(): {
                        "message": serde_json::to_value(&updated_preview.message)
                            .expect("message serialization is infallible"),
                        "created": serde_json::to_value(updated_preview.created)
                            .expect("timestamp serialization is infallible"),
                        "pending_action": "update",
                    }
                }),
            ));
            patches.success.push(StoreOp::merge(
                &chat_actions_key,
                clear_action_markers(&[&preview.report_action_id]),
            ));
            patches.failure.push(StoreOp::merge(
                &chat_actions_key,
                json!({
                    preview.report_action_id.clone(): {
                        "message": serde_json::to_value(&preview.message)
                            .expect("message serialization is infallible"),
                        "created": serde_json::to_value(preview.created)
                            .expect("timestamp serialization is infallible"),
                        "pending_action": null,
                    }
                }),
            ));
        }

        let modified_text = modified_action
            .message
            .first()
            .map(|m| m.text.clone())
            .unwrap_or_default();
        patches.optimistic.push(StoreOp::merge(
            &chat_key,
            json!({
                "last_message_text": modified_text,
                "last_message_html": modified_text,
                "last_visible_action_created": serde_json::to_value(ctx.now)
                    .expect("timestamp serialization is infallible"),
            }),
        ));
        patches.failure.push(StoreOp::merge(
            &chat_key,
            json!({
                "last_message_text": chat.last_message_text,
                "last_message_html": chat.last_message_html,
                "last_visible_action_created":
                    serde_json::to_value(chat.last_visible_action_created)
                        .expect("timestamp serialization is infallible"),
            }),
        ));
    }

    tracing::debug!(
        transaction_id,
        delta,
        scanning,
        "Staged money request edit"
    );

    let command = match command_kind {
        EditCommand::Full => Command::EditMoneyRequest(EditMoneyRequestParams {
            transaction_id: transaction_id.to_string(),
            report_action_id: modified_action.report_action_id.clone(),
            amount: changes.amount,
            currency: changes.currency.clone(),
            created: changes.created,
            merchant: changes.merchant.clone(),
            comment: changes.comment.clone(),
        }),
        EditCommand::Amount => Command::UpdateMoneyRequestAmount(UpdateAmountParams {
            transaction_id: transaction_id.to_string(),
            report_action_id: modified_action.report_action_id.clone(),
            amount: changes.amount.unwrap_or_default(),
            currency: changes
                .currency
                .clone()
                .unwrap_or_else(|| report.currency.clone()),
        }),
        EditCommand::Date => Command::UpdateMoneyRequestDate(UpdateDateParams {
            transaction_id: transaction_id.to_string(),
            report_action_id: modified_action.report_action_id.clone(),
            created: changes.created.unwrap_or(ctx.now),
        }),
        EditCommand::Description => {
            Command::UpdateMoneyRequestDescription(UpdateDescriptionParams {
                transaction_id: transaction_id.to_string(),
                report_action_id: modified_action.report_action_id.clone(),
                comment: changes.comment.clone().unwrap_or_default(),
            })
        }
    };

    Ok(ScenarioOutcome {
        command,
        patches,
        notify: Some((report.report_id.clone(), actor)),
        chat_report_id: Some(chat.report_id.clone()),
        money_report_id: Some(report.report_id.clone()),
        transaction_id: Some(transaction_id.to_string()),
    })
}
