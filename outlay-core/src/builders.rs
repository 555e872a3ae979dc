//! Optimistic entity builders
//!
//! Pure constructors for the entities a money operation needs before the
//! server has confirmed anything. Each builder takes primitive inputs and
//! a caller-supplied timestamp, generates a fresh identifier, and returns
//! a fully consistent record with its pending markers pre-populated.
//! Builders never read or write the store and never fail; validation, if
//! any, happened upstream.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::aggregate::format_minor_units;
use crate::types::{
    AccountId, ActionMessage, ActionPayload, ChatThread, IouOp, MoneyReport, PaymentMethod,
    Pending, PendingAction, PersonalDetail, Receipt, ReceiptState, ReportAction, ReportState,
    ReportStatus, ReportType, Transaction,
};

/// Pending-fields marker name for an in-flight chat creation.
pub const PENDING_FIELD_CREATE_CHAT: &str = "create_chat";

/// Milliseconds subtracted per step when generating a `Created` action so
/// it sorts strictly before actions generated in the same call.
pub const CREATED_ACTION_OFFSET_MS: i64 = 2;

/// Fresh 32-char hex identifier.
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A brand-new chat thread for a participant set.
///
/// `pending_fields.create_chat` is set to `add` so the UI renders the
/// in-flight state until the server confirms.
pub fn build_chat_thread(
    participants: &[AccountId],
    policy_id: Option<&str>,
    now: DateTime<Utc>,
) -> ChatThread {
    let mut participant_account_ids: Vec<AccountId> = participants.to_vec();
    participant_account_ids.sort_unstable();
    participant_account_ids.dedup();

    let mut pending_fields = BTreeMap::new();
    pending_fields.insert(PENDING_FIELD_CREATE_CHAT.to_string(), PendingAction::Add);

    ChatThread {
        report_id: new_id(),
        participant_account_ids,
        iou_report_id: None,
        last_read_time: now,
        last_message_text: String::new(),
        last_message_html: String::new(),
        last_visible_action_created: now,
        has_outstanding_child_request: None,
        policy_id: policy_id.map(str::to_string),
        pending_fields,
        pending_action: Some(PendingAction::Add),
        errors: BTreeMap::new(),
    }
}

/// A brand-new money report whose total equals the signed amount of the
/// transaction that caused its creation.
///
/// `amount` is the positive user-entered value; the report type's sign
/// convention decides how it lands in `total`.
pub fn build_money_report(
    chat_report_id: &str,
    report_type: ReportType,
    owner_account_id: AccountId,
    manager_account_id: AccountId,
    amount: i64,
    currency: &str,
    policy_id: Option<&str>,
) -> MoneyReport {
    MoneyReport {
        report_id: new_id(),
        chat_report_id: chat_report_id.to_string(),
        owner_account_id,
        manager_account_id,
        total: report_type.sign_convention().signed(amount),
        currency: currency.to_string(),
        report_type,
        state: ReportState::Open,
        status: ReportStatus::Open,
        parent_report_action_id: None,
        policy_id: policy_id.map(str::to_string),
        pending_fields: BTreeMap::new(),
        pending_action: Some(PendingAction::Add),
        errors: BTreeMap::new(),
    }
}

/// Inputs shared by the transaction builders.
#[derive(Debug, Clone, Default)]
pub struct TransactionDetails {
    pub comment: String,
    pub merchant: String,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub billable: bool,
}

/// A brand-new transaction parented to `report_id`.
///
/// `amount` is already signed under the owning report's convention.
pub fn build_transaction(
    report_id: &str,
    amount: i64,
    currency: &str,
    created: DateTime<Utc>,
    details: &TransactionDetails,
) -> Transaction {
    Transaction {
        transaction_id: new_id(),
        report_id: report_id.to_string(),
        amount: Pending::new(amount),
        currency: Pending::new(currency.to_string()),
        created: Pending::new(created),
        comment: Pending::new(details.comment.clone()),
        merchant: Pending::new(details.merchant.clone()),
        category: details.category.clone(),
        tag: details.tag.clone(),
        billable: details.billable,
        receipt: None,
        pending_fields: BTreeMap::new(),
        pending_action: Some(PendingAction::Add),
        errors: BTreeMap::new(),
    }
}

/// A transaction created from a receipt image awaiting scan.
///
/// The amount is unknown until the scan completes, so it starts at the
/// caller-provided placeholder (usually zero) with the receipt in
/// `ScanReady`.
pub fn build_receipt_transaction(
    report_id: &str,
    placeholder_amount: i64,
    currency: &str,
    created: DateTime<Utc>,
    receipt_source: &str,
    details: &TransactionDetails,
) -> Transaction {
    let mut transaction = build_transaction(report_id, placeholder_amount, currency, created, details);
    transaction.receipt = Some(Receipt {
        source: receipt_source.to_string(),
        state: ReceiptState::ScanReady,
    });
    transaction
}

fn base_action(
    report_id: &str,
    payload: ActionPayload,
    actor_account_id: AccountId,
    created: DateTime<Utc>,
    message: Vec<ActionMessage>,
) -> ReportAction {
    ReportAction {
        report_action_id: new_id(),
        report_id: report_id.to_string(),
        payload,
        actor_account_id,
        created,
        message,
        child_report_id: None,
        child_money_request_count: None,
        whispered_to_account_ids: Vec::new(),
        pending_action: Some(PendingAction::Add),
        errors: BTreeMap::new(),
    }
}

/// The `Created` action marking a report's (or chat's) birth.
///
/// Its timestamp is `now` minus `offset_steps` times a small offset, so
/// that when a creation and its first money action are generated together
/// the creation sorts strictly earlier.
pub fn build_created_action(
    report_id: &str,
    actor_account_id: AccountId,
    now: DateTime<Utc>,
    offset_steps: i64,
) -> ReportAction {
    let created = now - Duration::milliseconds(CREATED_ACTION_OFFSET_MS * offset_steps);
    base_action(
        report_id,
        ActionPayload::Created,
        actor_account_id,
        created,
        vec![ActionMessage::plain("created this report")],
    )
}

/// An IOU action recording a money movement (request, split share,
/// payment, send).
#[allow(clippy::too_many_arguments)]
pub fn build_iou_action(
    report_id: &str,
    op: IouOp,
    actor_account_id: AccountId,
    amount: i64,
    currency: &str,
    participant_account_ids: Vec<AccountId>,
    transaction_id: Option<&str>,
    payment_method: Option<PaymentMethod>,
    now: DateTime<Utc>,
) -> ReportAction {
    let rendered = format_minor_units(amount, currency);
    let text = match (op, payment_method) {
        (IouOp::Create, _) => format!("requested {}", rendered),
        (IouOp::Split, _) => format!("split {}", rendered),
        (IouOp::Send, _) => format!("sent {}", rendered),
        (IouOp::Pay, Some(PaymentMethod::Wallet)) => format!("paid {} with wallet", rendered),
        (IouOp::Pay, _) => format!("paid {} elsewhere", rendered),
        (IouOp::DeletedRequest, _) => format!("deleted the {} request", rendered),
    };

    base_action(
        report_id,
        ActionPayload::Iou {
            op,
            amount,
            currency: currency.to_string(),
            participant_account_ids,
            transaction_id: transaction_id.map(str::to_string),
            payment_method,
        },
        actor_account_id,
        now,
        vec![ActionMessage::plain(text)],
    )
}

/// The single report-preview action summarizing a money report inside its
/// chat. Built at most once per (chat, report) pair; afterwards it is
/// always updated in place.
pub fn build_report_preview_action(
    chat_report_id: &str,
    linked_report_id: &str,
    actor_account_id: AccountId,
    text: &str,
    now: DateTime<Utc>,
) -> ReportAction {
    let mut action = base_action(
        chat_report_id,
        ActionPayload::ReportPreview {
            linked_report_id: linked_report_id.to_string(),
        },
        actor_account_id,
        now,
        vec![ActionMessage::plain(text)],
    );
    action.child_report_id = Some(linked_report_id.to_string());
    action.child_money_request_count = Some(1);
    action
}

/// A modified-expense action describing an edit; carries old and new
/// values for exactly the fields that changed.
pub fn build_modified_expense_action(
    report_id: &str,
    actor_account_id: AccountId,
    payload: ActionPayload,
    now: DateTime<Utc>,
) -> ReportAction {
    debug_assert!(matches!(payload, ActionPayload::ModifiedExpense { .. }));
    let text = modified_expense_text(&payload);
    base_action(
        report_id,
        payload,
        actor_account_id,
        now,
        vec![ActionMessage::plain(text)],
    )
}

fn modified_expense_text(payload: &ActionPayload) -> String {
    let ActionPayload::ModifiedExpense {
        old_amount,
        amount,
        currency,
        old_merchant,
        merchant,
        old_comment,
        comment,
        ..
    } = payload
    else {
        return "changed the request".to_string();
    };

    if let (Some(old), Some(new)) = (old_amount, amount) {
        let code = currency.as_deref().unwrap_or("");
        return format!(
            "changed the amount to {} (previously {})",
            format_minor_units(*new, code),
            format_minor_units(*old, code)
        );
    }
    if let (Some(old), Some(new)) = (old_merchant, merchant) {
        return format!("changed the merchant to {} (previously {})", new, old);
    }
    if let (Some(_), Some(new)) = (old_comment, comment) {
        return format!("changed the description to {}", new);
    }
    "changed the request".to_string()
}

/// The action recording a report submission.
pub fn build_submitted_action(
    report_id: &str,
    actor_account_id: AccountId,
    amount: i64,
    currency: &str,
    now: DateTime<Utc>,
) -> ReportAction {
    base_action(
        report_id,
        ActionPayload::Submitted {
            amount,
            currency: currency.to_string(),
        },
        actor_account_id,
        now,
        vec![ActionMessage::plain(format!(
            "submitted {}",
            format_minor_units(amount, currency)
        ))],
    )
}

/// The action recording a report approval.
pub fn build_approved_action(
    report_id: &str,
    actor_account_id: AccountId,
    amount: i64,
    currency: &str,
    now: DateTime<Utc>,
) -> ReportAction {
    base_action(
        report_id,
        ActionPayload::Approved {
            amount,
            currency: currency.to_string(),
        },
        actor_account_id,
        now,
        vec![ActionMessage::plain(format!(
            "approved {}",
            format_minor_units(amount, currency)
        ))],
    )
}

/// A locally synthesized personal detail for a participant the store does
/// not know yet. Marked optimistic so nothing downstream treats it as
/// authoritative.
pub fn build_optimistic_personal_detail(account_id: AccountId, login: &str) -> PersonalDetail {
    let display_name = login.split('@').next().unwrap_or(login).to_string();
    PersonalDetail {
        account_id,
        login: login.to_string(),
        display_name,
        avatar: None,
        is_optimistic_personal_detail: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_chat_carries_create_pending_field() {
        let chat = build_chat_thread(&[2, 1, 2], None, Utc::now());
        assert_eq!(chat.participant_account_ids, vec![1, 2]);
        assert_eq!(
            chat.pending_fields.get(PENDING_FIELD_CREATE_CHAT),
            Some(&PendingAction::Add)
        );
        assert_eq!(chat.pending_action, Some(PendingAction::Add));
        assert!(chat.iou_report_id.is_none());
    }

    #[test]
    fn test_new_report_total_follows_sign_convention() {
        let iou = build_money_report("c1", ReportType::Iou, 1, 2, 1000, "USD", None);
        assert_eq!(iou.total, 1000);

        let expense = build_money_report("c1", ReportType::Expense, 1, 2, 1000, "USD", Some("p1"));
        assert_eq!(expense.total, -1000);
        assert_eq!(expense.policy_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_created_action_precedes_sibling_actions() {
        let now = Utc::now();
        let created = build_created_action("r1", 1, now, 1);
        let iou = build_iou_action(
            "r1",
            IouOp::Create,
            1,
            1000,
            "USD",
            vec![1, 2],
            Some("t1"),
            None,
            now,
        );
        assert!(created.created < iou.created);
    }

    #[test]
    fn test_receipt_transaction_starts_scan_ready() {
        let txn = build_receipt_transaction(
            "r1",
            0,
            "USD",
            Utc::now(),
            "receipt.jpg",
            &TransactionDetails::default(),
        );
        let receipt = txn.receipt.unwrap();
        assert_eq!(receipt.state, ReceiptState::ScanReady);
        assert_eq!(receipt.source, "receipt.jpg");
    }

    #[test]
    fn test_preview_action_starts_with_one_request() {
        let preview = build_report_preview_action("c1", "r1", 1, "owes 10.00 USD", Utc::now());
        assert_eq!(preview.child_money_request_count, Some(1));
        assert_eq!(preview.child_report_id.as_deref(), Some("r1"));
    }

    #[test]
    fn test_optimistic_detail_is_flagged() {
        let detail = build_optimistic_personal_detail(42, "pat@example.com");
        assert!(detail.is_optimistic_personal_detail);
        assert_eq!(detail.display_name, "pat");
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }
}
