//! Report workflow transitions
//!
//! Submit, approve and pay move a money report along
//! `Open → Submitted → Approved → Reimbursed`; paying a merely submitted
//! report jumps straight to `Reimbursed` when approval is automatic. Each
//! transition appends exactly one action and is reversible on failure by
//! resetting the report's state and status to their pre-transition values.

use serde_json::json;

use crate::builders;
use crate::dispatch::{
    ApproveMoneyRequestParams, Command, PayMoneyRequestParams, SubmitReportParams,
};
use crate::error::{Error, Result};
use crate::patch::{
    action_errors, clear_action_markers, clear_pending_markers, report_restore_merge,
    timestamped_errors, PatchSet, WORKFLOW_FAILURE_MESSAGE,
};
use crate::store::{key, StoreOp};
use crate::types::{IouOp, MoneyReport, PaymentMethod, ReportAction, ReportState, ReportStatus};

use super::{ScenarioContext, ScenarioOutcome};

/// Orchestrate a report submission and emit `SubmitReport`.
pub fn submit_report(ctx: &ScenarioContext<'_>, report_id: &str) -> Result<ScenarioOutcome> {
    let report = resolve_report(ctx, report_id)?;

    let action = builders::build_submitted_action(
        report_id,
        ctx.session.account_id,
        report.total.abs(),
        &report.currency,
        ctx.now,
    );

    let outcome = transition(
        ctx,
        report,
        ReportState::Submitted,
        ReportStatus::Submitted,
        action,
        None,
    );
    Ok(ScenarioOutcome {
        command: Command::SubmitReport(SubmitReportParams {
            report_id: report_id.to_string(),
            report_action_id: outcome.1,
        }),
        ..outcome.0
    })
}

/// Orchestrate an approval and emit `ApproveMoneyRequest`.
pub fn approve_money_request(
    ctx: &ScenarioContext<'_>,
    report_id: &str,
) -> Result<ScenarioOutcome> {
    let report = resolve_report(ctx, report_id)?;

    let action = builders::build_approved_action(
        report_id,
        ctx.session.account_id,
        report.total.abs(),
        &report.currency,
        ctx.now,
    );

    let outcome = transition(
        ctx,
        report,
        ReportState::Approved,
        ReportStatus::Approved,
        action,
        None,
    );
    Ok(ScenarioOutcome {
        command: Command::ApproveMoneyRequest(ApproveMoneyRequestParams {
            report_id: report_id.to_string(),
            report_action_id: outcome.1,
        }),
        ..outcome.0
    })
}

/// Orchestrate a payment and emit `PayMoneyRequest` or
/// `PayMoneyRequestWithWallet`.
///
/// Accepts a submitted report (automatic approval jumps the `Approved`
/// status) as well as an approved one.
pub fn pay_money_request(
    ctx: &ScenarioContext<'_>,
    report_id: &str,
    payment_method: PaymentMethod,
) -> Result<ScenarioOutcome> {
    let report = resolve_report(ctx, report_id)?;

    let action = builders::build_iou_action(
        report_id,
        IouOp::Pay,
        ctx.session.account_id,
        report.total.abs(),
        &report.currency,
        vec![report.owner_account_id, report.manager_account_id],
        None,
        Some(payment_method),
        ctx.now,
    );

    // Paying settles the outstanding flag on the chat.
    let chat_extra = json!({ "has_outstanding_child_request": false });
    let outcome = transition(
        ctx,
        report,
        ReportState::Approved,
        ReportStatus::Reimbursed,
        action,
        Some(chat_extra),
    );

    let params = PayMoneyRequestParams {
        report_id: report_id.to_string(),
        chat_report_id: report.chat_report_id.clone(),
        report_action_id: outcome.1,
    };
    let command = match payment_method {
        PaymentMethod::Elsewhere => Command::PayMoneyRequest(params),
        PaymentMethod::Wallet => Command::PayMoneyRequestWithWallet(params),
    };
    Ok(ScenarioOutcome {
        command,
        ..outcome.0
    })
}

fn resolve_report<'a>(
    ctx: &'a ScenarioContext<'_>,
    report_id: &str,
) -> Result<&'a MoneyReport> {
    ctx.snapshot
        .report(report_id)
        .ok_or_else(|| Error::missing("money report", report_id))
}

/// Shared transition shape: flip state/status, append the documenting
/// action, refresh the chat preview, and make the whole thing reversible.
///
/// Returns the outcome (with a placeholder command the caller replaces)
/// and the new action's id.
fn transition(
    ctx: &ScenarioContext<'_>,
    report: &MoneyReport,
    next_state: ReportState,
    next_status: ReportStatus,
    action: ReportAction,
    chat_extra_optimistic: Option<serde_json::Value>,
) -> (ScenarioOutcome, String) {
    let report_key = key::report_key(&report.report_id);
    let report_actions_key = key::report_actions_key(&report.report_id);
    let chat_key = key::chat_key(&report.chat_report_id);
    let prior_chat = ctx.snapshot.chat(&report.chat_report_id);

    let mut patches = PatchSet::new();

    // --- report state/status ---

    patches.optimistic.push(StoreOp::merge(
        &report_key,
        json!({
            "state": serde_json::to_value(next_state)
                .expect("state serialization is infallible"),
            "status": serde_json::to_value(next_status)
                .expect("status serialization is infallible"),
            "pending_action": "update",
        }),
    ));
    patches
        .success
        .push(StoreOp::merge(&report_key, clear_pending_markers()));
    patches.failure.push(StoreOp::merge(
        &report_key,
        report_restore_merge(report, timestamped_errors(WORKFLOW_FAILURE_MESSAGE, ctx.now)),
    ));

    // --- the documenting action ---

    patches.optimistic.push(StoreOp::merge(
        &report_actions_key,
        json!({
            action.report_action_id.clone():
                serde_json::to_value(&action).expect("action serialization is infallible")
        }),
    ));
    patches.success.push(StoreOp::merge(
        &report_actions_key,
        clear_action_markers(&[&action.report_action_id]),
    ));
    patches.failure.push(StoreOp::merge(
        &report_actions_key,
        action_errors(&action.report_action_id, WORKFLOW_FAILURE_MESSAGE, ctx.now),
    ));

    // --- chat preview ---

    if let Some(chat) = prior_chat {
        let text = action
            .message
            .first()
            .map(|m| m.text.clone())
            .unwrap_or_default();
        let mut chat_optimistic = json!({
            "last_message_text": text,
            "last_message_html": text,
            "last_visible_action_created": serde_json::to_value(ctx.now)
                .expect("timestamp serialization is infallible"),
        });
        if let Some(extra) = chat_extra_optimistic {
            crate::store::merge_values(&mut chat_optimistic, &extra);
        }
        patches
            .optimistic
            .push(StoreOp::merge(&chat_key, chat_optimistic));
        patches.failure.push(StoreOp::merge(
            &chat_key,
            json!({
                "last_message_text": chat.last_message_text,
                "last_message_html": chat.last_message_html,
                "last_visible_action_created":
                    serde_json::to_value(chat.last_visible_action_created)
                        .expect("timestamp serialization is infallible"),
                "has_outstanding_child_request": chat.has_outstanding_child_request,
            }),
        ));
    }

    tracing::debug!(
        report_id = %report.report_id,
        from_status = report.status.as_str(),
        to_status = next_status.as_str(),
        "Report workflow transition"
    );

    let action_id = action.report_action_id.clone();
    let outcome = ScenarioOutcome {
        // Placeholder; every caller overwrites the command.
        command: Command::SubmitReport(SubmitReportParams {
            report_id: report.report_id.clone(),
            report_action_id: action_id.clone(),
        }),
        patches,
        notify: Some((report.report_id.clone(), ctx.session.account_id)),
        chat_report_id: Some(report.chat_report_id.clone()),
        money_report_id: Some(report.report_id.clone()),
        transaction_id: None,
    };
    (outcome, action_id)
}
