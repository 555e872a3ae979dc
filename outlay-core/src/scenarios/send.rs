//! Send money
//!
//! The inverse of a request: the current user pays a recipient outright.
//! The money report is born settled, so no outstanding balance ever shows,
//! and the payment method picks which server command goes out.

use crate::aggregate;
use crate::builders::{self, TransactionDetails};
use crate::dispatch::{Command, SendMoneyParams};
use crate::error::Result;
use crate::patch::{money_request_patches, MoneyRequestPatchArgs};
use crate::types::{IouOp, PaymentMethod, ReportState, ReportStatus, ReportType};

use super::{missing_personal_details, Participant, ScenarioContext, ScenarioOutcome};

/// A direct payment from the current user to `recipient`.
#[derive(Debug, Clone)]
pub struct SendMoney {
    pub recipient: Participant,
    /// Positive amount in minor currency units
    pub amount: i64,
    pub currency: String,
    pub comment: String,
    pub payment_method: PaymentMethod,
}

/// Orchestrate a direct payment and emit `SendMoneyElsewhere` or
/// `SendMoneyWithWallet`.
pub fn send_money(ctx: &ScenarioContext<'_>, send: &SendMoney) -> Result<ScenarioOutcome> {
    let actor = ctx.session.account_id;
    let participants = [actor, send.recipient.account_id];

    // Resolve the one-on-one chat; a settled report is never reused, so
    // the report is always new.
    let (prior_chat, mut chat) = match ctx.snapshot.chat_by_participants(&participants) {
        Some(found) => (Some(found.clone()), found.clone()),
        None => (
            None,
            builders::build_chat_thread(&participants, None, ctx.now),
        ),
    };

    // The recipient was owed the amount and the current user settles it in
    // the same breath.
    let mut report = builders::build_money_report(
        &chat.report_id,
        ReportType::Iou,
        send.recipient.account_id,
        actor,
        send.amount,
        &send.currency,
        None,
    );
    report.state = ReportState::Submitted;
    report.status = ReportStatus::Reimbursed;

    let details = TransactionDetails {
        comment: send.comment.clone(),
        ..TransactionDetails::default()
    };
    let transaction = builders::build_transaction(
        &report.report_id,
        send.amount,
        &send.currency,
        ctx.now,
        &details,
    );

    let chat_created_action = prior_chat
        .is_none()
        .then(|| builders::build_created_action(&chat.report_id, actor, ctx.now, 2));
    let report_created_action =
        Some(builders::build_created_action(&report.report_id, actor, ctx.now, 1));
    let iou_action = builders::build_iou_action(
        &report.report_id,
        IouOp::Send,
        actor,
        send.amount,
        &send.currency,
        participants.to_vec(),
        Some(&transaction.transaction_id),
        Some(send.payment_method),
        ctx.now,
    );

    let optimistic_details = missing_personal_details(ctx.snapshot, &[&send.recipient]);

    let preview_text = format!(
        "paid {}",
        aggregate::format_minor_units(send.amount, &send.currency)
    );
    let preview_action = builders::build_report_preview_action(
        &chat.report_id,
        &report.report_id,
        actor,
        &preview_text,
        ctx.now,
    );
    report.parent_report_action_id = Some(preview_action.report_action_id.clone());

    chat.iou_report_id = Some(report.report_id.clone());
    chat.has_outstanding_child_request = Some(false);
    if let Some(fragment) = iou_action.message.first() {
        chat.last_message_text = fragment.text.clone();
        chat.last_message_html = fragment.html.clone();
    }
    chat.last_visible_action_created = ctx.now;
    chat.last_read_time = ctx.now;

    let patches = money_request_patches(
        &MoneyRequestPatchArgs {
            chat: &chat,
            prior_chat: prior_chat.as_ref(),
            report: &report,
            prior_report: None,
            transaction: &transaction,
            chat_created_action: chat_created_action.as_ref(),
            report_created_action: report_created_action.as_ref(),
            iou_action: &iou_action,
            preview_action: &preview_action,
            prior_preview: None,
            optimistic_details: &optimistic_details,
        },
        ctx.now,
    );

    let params = SendMoneyParams {
        amount: send.amount,
        currency: send.currency.clone(),
        comment: send.comment.clone(),
        recipient_account_id: send.recipient.account_id,
        chat_report_id: chat.report_id.clone(),
        iou_report_id: report.report_id.clone(),
        transaction_id: transaction.transaction_id.clone(),
        report_action_id: iou_action.report_action_id.clone(),
        report_preview_report_action_id: preview_action.report_action_id.clone(),
    };
    let command = match send.payment_method {
        PaymentMethod::Elsewhere => Command::SendMoneyElsewhere(params),
        PaymentMethod::Wallet => Command::SendMoneyWithWallet(params),
    };

    Ok(ScenarioOutcome {
        command,
        patches,
        notify: Some((chat.report_id.clone(), actor)),
        chat_report_id: Some(chat.report_id),
        money_report_id: Some(report.report_id),
        transaction_id: Some(transaction.transaction_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::store::{key, Snapshot, StoreOp};
    use chrono::Utc;

    fn send(method: PaymentMethod) -> SendMoney {
        SendMoney {
            recipient: Participant {
                account_id: 2,
                login: "friend@example.com".to_string(),
            },
            amount: 2500,
            currency: "USD".to_string(),
            comment: "lunch".to_string(),
            payment_method: method,
        }
    }

    #[test]
    fn test_payment_method_picks_command_name() {
        let snapshot = Snapshot::new();
        let session = SessionConfig {
            account_id: 1,
            login: "me@example.com".to_string(),
        };
        let ctx = ScenarioContext::at(&snapshot, &session, Utc::now());

        let elsewhere = send_money(&ctx, &send(PaymentMethod::Elsewhere)).unwrap();
        assert_eq!(elsewhere.command.name(), "SendMoneyElsewhere");

        let wallet = send_money(&ctx, &send(PaymentMethod::Wallet)).unwrap();
        assert_eq!(wallet.command.name(), "SendMoneyWithWallet");
    }

    #[test]
    fn test_report_is_born_settled() {
        let snapshot = Snapshot::new();
        let session = SessionConfig {
            account_id: 1,
            login: "me@example.com".to_string(),
        };
        let ctx = ScenarioContext::at(&snapshot, &session, Utc::now());

        let outcome = send_money(&ctx, &send(PaymentMethod::Elsewhere)).unwrap();
        let report_key = key::report_key(outcome.money_report_id.as_deref().unwrap());
        let report_op = outcome
            .patches
            .optimistic
            .iter()
            .find(|op| op.key() == report_key)
            .unwrap();

        let StoreOp::Replace { value, .. } = report_op else {
            panic!("new report must be a replace op");
        };
        assert_eq!(value["status"], "reimbursed");
        assert_eq!(value["owner_account_id"], 2);
        assert_eq!(value["manager_account_id"], 1);
    }
}
