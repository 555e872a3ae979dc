//! Create money request
//!
//! The canonical create shape: resolve (or build) the chat between the
//! current user and the payer, resolve (or build) the money report hanging
//! off it, append a transaction, and keep every derived field (totals,
//! previews, outstanding flags) consistent across all of them.
//!
//! [`build_request_parts`] is the reusable core: the split orchestrator
//! runs it once per participant with the `Split` op and its allocated
//! share.

use chrono::{DateTime, Utc};

use crate::aggregate;
use crate::builders::{self, TransactionDetails};
use crate::dispatch::{Command, RequestMoneyParams};
use crate::error::{Error, Result};
use crate::patch::{money_request_patches, MoneyRequestPatchArgs, PatchSet};
use crate::store::key;
use crate::types::{
    ChatThread, IouOp, MoneyReport, PendingAction, PolicyType, ReportAction, ReportType,
    Transaction,
};

use super::{
    is_report_appendable, missing_personal_details, Participant, ScenarioContext, ScenarioOutcome,
};

/// A user-facing money request: the current user asks `participant` to
/// pay them back `amount`.
#[derive(Debug, Clone)]
pub struct MoneyRequest {
    /// The payer
    pub participant: Participant,
    /// Positive amount in minor currency units
    pub amount: i64,
    pub currency: String,
    /// When the expense happened
    pub created: DateTime<Utc>,
    pub details: TransactionDetails,
    /// Receipt image to scan; the amount stays a placeholder until the
    /// scan completes
    pub receipt_source: Option<String>,
    /// Explicit chat to file the request under, when the UI already knows
    pub chat_report_id: Option<String>,
    /// Draft the compose screen built up; consumed and discarded once the
    /// real transaction is created
    pub draft_transaction_id: Option<String>,
}

/// Internal request description shared with the split orchestrator.
pub(crate) struct RequestSpec<'a> {
    pub participant: &'a Participant,
    pub amount: i64,
    pub currency: &'a str,
    pub created: DateTime<Utc>,
    pub details: &'a TransactionDetails,
    pub receipt_source: Option<&'a str>,
    pub chat_report_id: Option<&'a str>,
    pub op: IouOp,
}

/// Everything the create shape produced, patches included.
pub(crate) struct RequestParts {
    pub chat: ChatThread,
    pub prior_chat: Option<ChatThread>,
    pub report: MoneyReport,
    pub transaction: Transaction,
    pub chat_created_action: Option<ReportAction>,
    pub report_created_action: Option<ReportAction>,
    pub iou_action: ReportAction,
    pub preview_action: ReportAction,
    pub patches: PatchSet,
}

/// Resolve-or-build the full create-a-money-request entity set and
/// assemble its patch triad.
pub(crate) fn build_request_parts(
    ctx: &ScenarioContext<'_>,
    spec: &RequestSpec<'_>,
) -> Result<RequestParts> {
    let actor = ctx.session.account_id;

    // Resolve: chat by explicit id or participant set.
    let participants = [actor, spec.participant.account_id];
    let (prior_chat, mut chat) = match spec.chat_report_id {
        Some(id) => {
            let found = ctx
                .snapshot
                .chat(id)
                .ok_or_else(|| Error::missing("chat thread", id))?;
            (Some(found.clone()), found.clone())
        }
        None => match ctx.snapshot.chat_by_participants(&participants) {
            Some(found) => (Some(found.clone()), found.clone()),
            None => (
                None,
                builders::build_chat_thread(&participants, None, ctx.now),
            ),
        },
    };

    let policy = ctx.snapshot.policy_for_chat(&chat).cloned();
    let policy = policy.as_ref();
    let report_type = match policy.map(|p| p.policy_type) {
        Some(PolicyType::Team) | Some(PolicyType::Control) => ReportType::Expense,
        _ => ReportType::Iou,
    };

    // Resolve: reuse the linked report only while it is still open for
    // additions; an approved Control expense report starts a fresh one.
    let existing_report = chat
        .iou_report_id
        .as_deref()
        .and_then(|id| ctx.snapshot.report(id))
        .cloned();

    let (prior_report, mut report) = match existing_report {
        Some(existing) if is_report_appendable(&existing, policy) => {
            let updated = match existing.report_type {
                ReportType::Iou => {
                    aggregate::apply_iou_delta(&existing, actor, spec.amount, spec.currency)
                }
                ReportType::Expense => aggregate::apply_total_delta(
                    &existing,
                    existing.sign_convention().signed(spec.amount),
                ),
            };
            (Some(existing), updated)
        }
        _ => (
            None,
            builders::build_money_report(
                &chat.report_id,
                report_type,
                actor,
                spec.participant.account_id,
                spec.amount,
                spec.currency,
                policy.map(|p| p.id.as_str()),
            ),
        ),
    };

    tracing::debug!(
        chat_report_id = %chat.report_id,
        money_report_id = %report.report_id,
        is_new_chat = prior_chat.is_none(),
        is_new_report = prior_report.is_none(),
        "Resolved money request targets"
    );

    // Build: transaction, actions, synthesized details, preview.
    let signed_amount = report.sign_convention().signed(spec.amount);
    let transaction = match spec.receipt_source {
        Some(source) => builders::build_receipt_transaction(
            &report.report_id,
            signed_amount,
            spec.currency,
            spec.created,
            source,
            spec.details,
        ),
        None => builders::build_transaction(
            &report.report_id,
            signed_amount,
            spec.currency,
            spec.created,
            spec.details,
        ),
    };

    let chat_created_action = prior_chat
        .is_none()
        .then(|| builders::build_created_action(&chat.report_id, actor, ctx.now, 2));
    let report_created_action = prior_report
        .is_none()
        .then(|| builders::build_created_action(&report.report_id, actor, ctx.now, 1));

    let mut iou_action = builders::build_iou_action(
        &report.report_id,
        spec.op,
        actor,
        spec.amount,
        spec.currency,
        participants.to_vec(),
        Some(&transaction.transaction_id),
        None,
        ctx.now,
    );
    if spec.receipt_source.is_some() {
        // The scan result, not this action, will carry the visible amount.
        iou_action.whispered_to_account_ids = vec![actor];
    }

    let optimistic_details = missing_personal_details(ctx.snapshot, &[spec.participant]);
    let mut detail_view = ctx.snapshot.personal_details.clone();
    for detail in &optimistic_details {
        detail_view.insert(detail.account_id, detail.clone());
    }
    let summary = aggregate::payer_summary(&report, &detail_view);

    let (prior_preview, preview_action) = match prior_report
        .as_ref()
        .and_then(|r| ctx.snapshot.preview_action(&chat.report_id, &r.report_id))
    {
        Some(existing) => {
            let mut updated = aggregate::update_report_preview(existing, 1, &summary, ctx.now);
            updated.pending_action = Some(PendingAction::Update);
            (Some(existing.clone()), updated)
        }
        None => (
            None,
            builders::build_report_preview_action(
                &chat.report_id,
                &report.report_id,
                actor,
                &summary,
                ctx.now,
            ),
        ),
    };
    if prior_report.is_none() {
        report.parent_report_action_id = Some(preview_action.report_action_id.clone());
    }

    // Update: fold the new action into the chat's derived fields.
    let needs_manual_submit = policy.map(|p| p.needs_manual_submit()).unwrap_or(true);
    chat.iou_report_id = Some(report.report_id.clone());
    chat.has_outstanding_child_request =
        aggregate::outstanding_child_request(policy, needs_manual_submit);
    if let Some(fragment) = iou_action.message.first() {
        chat.last_message_text = fragment.text.clone();
        chat.last_message_html = fragment.html.clone();
    }
    chat.last_visible_action_created = ctx.now;
    chat.last_read_time = ctx.now;

    // Assemble the triad.
    let patches = money_request_patches(
        &MoneyRequestPatchArgs {
            chat: &chat,
            prior_chat: prior_chat.as_ref(),
            report: &report,
            prior_report: prior_report.as_ref(),
            transaction: &transaction,
            chat_created_action: chat_created_action.as_ref(),
            report_created_action: report_created_action.as_ref(),
            iou_action: &iou_action,
            preview_action: &preview_action,
            prior_preview: prior_preview.as_ref(),
            optimistic_details: &optimistic_details,
        },
        ctx.now,
    );

    Ok(RequestParts {
        chat,
        prior_chat,
        report,
        transaction,
        chat_created_action,
        report_created_action,
        iou_action,
        preview_action,
        patches,
    })
}

/// Orchestrate a single-payer money request and emit the `RequestMoney`
/// command.
pub fn request_money(
    ctx: &ScenarioContext<'_>,
    request: &MoneyRequest,
) -> Result<ScenarioOutcome> {
    let mut parts = build_request_parts(
        ctx,
        &RequestSpec {
            participant: &request.participant,
            amount: request.amount,
            currency: &request.currency,
            created: request.created,
            details: &request.details,
            receipt_source: request.receipt_source.as_deref(),
            chat_report_id: request.chat_report_id.as_deref(),
            op: IouOp::Create,
        },
    )?;

    // The compose draft is consumed by the promotion; discard it.
    if let Some(draft_id) = &request.draft_transaction_id {
        parts
            .patches
            .optimistic
            .push(crate::store::StoreOp::delete(key::transaction_draft_key(
                draft_id,
            )));
    }

    let command = Command::RequestMoney(RequestMoneyParams {
        amount: request.amount,
        currency: request.currency.clone(),
        comment: request.details.comment.clone(),
        created: request.created,
        merchant: request.details.merchant.clone(),
        category: request.details.category.clone(),
        tag: request.details.tag.clone(),
        billable: request.details.billable,
        payer_account_id: request.participant.account_id,
        chat_report_id: parts.chat.report_id.clone(),
        iou_report_id: parts.report.report_id.clone(),
        transaction_id: parts.transaction.transaction_id.clone(),
        report_action_id: parts.iou_action.report_action_id.clone(),
        created_chat_report_action_id: parts
            .chat_created_action
            .as_ref()
            .map(|a| a.report_action_id.clone()),
        created_iou_report_action_id: parts
            .report_created_action
            .as_ref()
            .map(|a| a.report_action_id.clone()),
        report_preview_report_action_id: parts.preview_action.report_action_id.clone(),
        receipt_source: request.receipt_source.clone(),
    });

    Ok(ScenarioOutcome {
        command,
        patches: parts.patches,
        notify: Some((parts.chat.report_id.clone(), ctx.session.account_id)),
        chat_report_id: Some(parts.chat.report_id),
        money_report_id: Some(parts.report.report_id),
        transaction_id: Some(parts.transaction.transaction_id),
    })
}
