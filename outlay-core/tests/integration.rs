//! Integration tests for the optimistic mutation engine
//!
//! These tests run whole scenarios against the in-memory store: apply the
//! optimistic patches, then confirm or reject, and check the store lands
//! in the state the three-phase protocol promises.

use chrono::Utc;
use serde_json::Value;

use outlay_core::builders::TransactionDetails;
use outlay_core::config::SessionConfig;
use outlay_core::dispatch::{QueueDispatcher, RecordingNotifier, SplitShare};
use outlay_core::scenarios::{
    self, MoneyRequest, Participant, ScenarioContext, ScenarioOutcome, SendMoney, SplitBill,
};
use outlay_core::store::{MemoryStore, Snapshot};
use outlay_core::types::PaymentMethod;

fn session() -> SessionConfig {
    SessionConfig {
        account_id: 1,
        login: "me@example.com".to_string(),
    }
}

fn payer() -> Participant {
    Participant {
        account_id: 2,
        login: "payer@example.com".to_string(),
    }
}

fn usd_request(amount: i64) -> MoneyRequest {
    MoneyRequest {
        participant: payer(),
        amount,
        currency: "USD".to_string(),
        created: Utc::now(),
        details: TransactionDetails::default(),
        receipt_source: None,
        chat_report_id: None,
        draft_transaction_id: None,
    }
}

/// Run a request against the store's current state without applying
/// anything.
fn run_request(store: &MemoryStore, request: &MoneyRequest) -> ScenarioOutcome {
    let snapshot = Snapshot::capture(store);
    let session = session();
    let ctx = ScenarioContext::new(&snapshot, &session);
    scenarios::request_money(&ctx, request).expect("preconditions hold")
}

/// Assert no pending marker survives anywhere in the store.
fn assert_no_pending_markers(store: &MemoryStore) {
    fn walk(path: &str, value: &Value) {
        let Value::Object(map) = value else { return };
        for (field, child) in map {
            assert!(
                field != "pending_action",
                "stray pending_action under {}",
                path
            );
            if field == "pending_fields" {
                let empty = child.as_object().map(|m| m.is_empty()).unwrap_or(false);
                assert!(empty, "stray pending_fields under {}: {}", path, child);
                continue;
            }
            walk(&format!("{}/{}", path, field), child);
        }
    }

    for (key, value) in store.collection("") {
        walk(key, value);
    }
}

// ============================================
// Create request
// ============================================

#[test]
fn test_request_money_builds_renderable_snapshot() {
    let mut store = MemoryStore::new();
    let outcome = run_request(&store, &usd_request(1000));

    assert_eq!(outcome.command.name(), "RequestMoney");
    let params = outcome.command.params();
    assert_eq!(params["amount"], 1000);
    assert_eq!(params["currency"], "USD");

    store.apply(&outcome.patches.optimistic);
    let snapshot = Snapshot::capture(&store);

    // One chat, in-flight.
    assert_eq!(snapshot.chats.len(), 1);
    let chat = snapshot.chats.values().next().unwrap();
    assert_eq!(
        chat.pending_fields.get("create_chat").map(|p| p.as_str()),
        Some("add")
    );
    assert_eq!(chat.iou_report_id, outcome.money_report_id);
    assert_eq!(chat.has_outstanding_child_request, Some(true));

    // One report holding the full amount.
    assert_eq!(snapshot.reports.len(), 1);
    let report = snapshot.reports.values().next().unwrap();
    assert_eq!(report.total, 1000);

    // One transaction.
    assert_eq!(snapshot.transactions.len(), 1);
    let transaction = snapshot.transactions.values().next().unwrap();
    assert_eq!(transaction.amount.committed, 1000);

    // Four actions: created x2, the money request, the preview.
    let action_count: usize = snapshot.report_actions.values().map(|m| m.len()).sum();
    assert_eq!(action_count, 4);

    // The payer got an optimistic personal detail.
    let detail = snapshot.personal_detail(2).unwrap();
    assert!(detail.is_optimistic_personal_detail);
}

#[test]
fn test_success_leaves_no_pending_markers() {
    let mut store = MemoryStore::new();
    let outcome = run_request(&store, &usd_request(1000));

    store.apply(&outcome.patches.optimistic);
    store.apply(&outcome.patches.success);

    assert_no_pending_markers(&store);

    // Values survive confirmation untouched.
    let snapshot = Snapshot::capture(&store);
    assert_eq!(snapshot.reports.values().next().unwrap().total, 1000);
    assert!(!snapshot
        .personal_detail(2)
        .unwrap()
        .is_optimistic_personal_detail);
}

#[test]
fn test_failure_restores_previous_values_and_flags_error() {
    let mut store = MemoryStore::new();

    // First request confirmed; this is the pre-mutation baseline.
    let first = run_request(&store, &usd_request(1000));
    store.apply(&first.patches.optimistic);
    store.apply(&first.patches.success);

    let baseline = Snapshot::capture(&store);
    let chat_before = baseline.chats.values().next().unwrap().clone();
    let report_before = baseline.reports.values().next().unwrap().clone();

    // Second request rejected.
    let second = run_request(&store, &usd_request(500));
    store.apply(&second.patches.optimistic);

    let mid = Snapshot::capture(&store);
    assert_eq!(mid.report(&report_before.report_id).unwrap().total, 1500);

    store.apply(&second.patches.failure);
    let after = Snapshot::capture(&store);

    let report_after = after.report(&report_before.report_id).unwrap();
    assert_eq!(report_after.total, report_before.total);
    assert!(!report_after.errors.is_empty(), "report must carry the error");

    let chat_after = after.chat(&chat_before.report_id).unwrap();
    assert_eq!(chat_after.last_message_text, chat_before.last_message_text);
    assert_eq!(
        chat_after.has_outstanding_child_request,
        chat_before.has_outstanding_child_request
    );
    assert!(!chat_after.errors.is_empty(), "chat must carry the error");
}

#[test]
fn test_second_request_updates_preview_never_duplicates() {
    let mut store = MemoryStore::new();

    let first = run_request(&store, &usd_request(1000));
    store.apply(&first.patches.optimistic);
    store.apply(&first.patches.success);

    let second = run_request(&store, &usd_request(500));
    store.apply(&second.patches.optimistic);
    store.apply(&second.patches.success);

    let snapshot = Snapshot::capture(&store);
    let chat_id = second.chat_report_id.as_deref().unwrap();
    let report_id = second.money_report_id.as_deref().unwrap();

    let previews: Vec<_> = snapshot
        .actions(chat_id)
        .unwrap()
        .values()
        .filter(|a| {
            matches!(
                &a.payload,
                outlay_core::types::ActionPayload::ReportPreview { .. }
            )
        })
        .collect();
    assert_eq!(previews.len(), 1, "one preview per (chat, report) pair");
    assert_eq!(previews[0].child_money_request_count, Some(2));

    assert_eq!(snapshot.report(report_id).unwrap().total, 1500);
}

#[test]
fn test_promoting_a_draft_discards_it() {
    let mut store = MemoryStore::new();
    store.apply(&[outlay_core::StoreOp::merge(
        outlay_core::store::key::transaction_draft_key("draft1"),
        serde_json::json!({ "amount": 1000 }),
    )]);

    let mut request = usd_request(1000);
    request.draft_transaction_id = Some("draft1".to_string());
    let outcome = run_request(&store, &request);

    store.apply(&outcome.patches.optimistic);
    assert!(store
        .get(&outlay_core::store::key::transaction_draft_key("draft1"))
        .is_none());
    // The real transaction took its place.
    let snapshot = Snapshot::capture(&store);
    assert_eq!(snapshot.transactions.len(), 1);
}

// ============================================
// Dispatch
// ============================================

#[test]
fn test_dispatch_queues_command_and_notifies_once() {
    let store = MemoryStore::new();
    let outcome = run_request(&store, &usd_request(1000));

    let mut dispatcher = QueueDispatcher::new(8);
    let mut notifier = RecordingNotifier::default();
    scenarios::dispatch_scenario(&outcome, &mut dispatcher, &mut notifier).unwrap();

    assert_eq!(dispatcher.len(), 1);
    let queued = dispatcher.last().unwrap();
    assert_eq!(queued.name, "RequestMoney");
    assert_eq!(queued.params["amount"], 1000);

    assert_eq!(notifier.notified.len(), 1);
    assert_eq!(
        notifier.notified[0],
        (outcome.chat_report_id.clone().unwrap(), 1)
    );
}

// ============================================
// Split
// ============================================

#[test]
fn test_split_bill_shares_land_exactly() {
    let mut store = MemoryStore::new();
    let snapshot = Snapshot::capture(&store);
    let session = session();
    let ctx = ScenarioContext::new(&snapshot, &session);

    let outcome = scenarios::split_bill(
        &ctx,
        &SplitBill {
            participants: vec![
                Participant {
                    account_id: 2,
                    login: "a@example.com".to_string(),
                },
                Participant {
                    account_id: 3,
                    login: "b@example.com".to_string(),
                },
            ],
            amount: 100,
            currency: "USD".to_string(),
            created: Utc::now(),
            details: TransactionDetails::default(),
        },
    )
    .unwrap();

    let params = outcome.command.params();
    let shares: Vec<SplitShare> =
        serde_json::from_str(params["splits"].as_str().unwrap()).unwrap();
    let amounts: Vec<i64> = shares.iter().map(|s| s.amount).collect();
    assert_eq!(amounts.iter().sum::<i64>(), 100);
    assert_eq!(amounts, vec![34, 33, 33]);

    store.apply(&outcome.patches.optimistic);
    let applied = Snapshot::capture(&store);

    // One group chat + two one-on-one chats, two IOU reports of 33 each.
    assert_eq!(applied.chats.len(), 3);
    assert_eq!(applied.reports.len(), 2);
    for report in applied.reports.values() {
        assert_eq!(report.total, 33);
    }

    // The group transaction parents to the sentinel id, not a report.
    let group_txn = applied
        .transaction(outcome.transaction_id.as_deref().unwrap())
        .unwrap();
    assert_eq!(group_txn.report_id, scenarios::split::SPLIT_GROUP_REPORT_ID);
    assert!(applied.report(&group_txn.report_id).is_none());

    store.apply(&outcome.patches.success);
    assert_no_pending_markers(&store);
}

// ============================================
// Send money
// ============================================

#[test]
fn test_send_money_settles_immediately() {
    let mut store = MemoryStore::new();
    let snapshot = Snapshot::capture(&store);
    let session = session();
    let ctx = ScenarioContext::new(&snapshot, &session);

    let outcome = scenarios::send_money(
        &ctx,
        &SendMoney {
            recipient: payer(),
            amount: 2500,
            currency: "USD".to_string(),
            comment: "lunch".to_string(),
            payment_method: PaymentMethod::Wallet,
        },
    )
    .unwrap();
    assert_eq!(outcome.command.name(), "SendMoneyWithWallet");

    store.apply(&outcome.patches.optimistic);
    store.apply(&outcome.patches.success);

    let applied = Snapshot::capture(&store);
    let report = applied.reports.values().next().unwrap();
    assert_eq!(report.status, outlay_core::types::ReportStatus::Reimbursed);
    assert_eq!(report.owner_account_id, 2);
    assert_eq!(report.manager_account_id, 1);

    let chat = applied.chats.values().next().unwrap();
    assert_eq!(chat.has_outstanding_child_request, Some(false));
}

// ============================================
// Edit
// ============================================

#[test]
fn test_cross_currency_edit_never_moves_the_total() {
    let mut store = MemoryStore::new();
    let create = run_request(&store, &usd_request(1000));
    store.apply(&create.patches.optimistic);
    store.apply(&create.patches.success);

    let txn_id = create.transaction_id.as_deref().unwrap();
    let report_id = create.money_report_id.as_deref().unwrap();

    let snapshot = Snapshot::capture(&store);
    let session = session();
    let ctx = ScenarioContext::new(&snapshot, &session);
    let edit = scenarios::update_money_request_amount(&ctx, txn_id, 2500, "EUR").unwrap();
    assert_eq!(edit.command.name(), "UpdateMoneyRequestAmount");

    store.apply(&edit.patches.optimistic);
    let applied = Snapshot::capture(&store);

    assert_eq!(applied.report(report_id).unwrap().total, 1000);
    let transaction = applied.transaction(txn_id).unwrap();
    assert_eq!(transaction.amount.committed, 1000);
    assert_eq!(transaction.amount.staged, Some(2500));
    assert_eq!(transaction.currency.staged.as_deref(), Some("EUR"));
}

#[test]
fn test_edit_confirm_promotes_shadows_reject_discards_them() {
    let mut store = MemoryStore::new();
    let create = run_request(&store, &usd_request(1000));
    store.apply(&create.patches.optimistic);
    store.apply(&create.patches.success);

    let txn_id = create.transaction_id.as_deref().unwrap();
    let report_id = create.money_report_id.as_deref().unwrap();

    // Confirmed edit: shadow promotes, total moves.
    {
        let snapshot = Snapshot::capture(&store);
        let session = session();
        let ctx = ScenarioContext::new(&snapshot, &session);
        let edit = scenarios::update_money_request_amount(&ctx, txn_id, 2500, "USD").unwrap();
        store.apply(&edit.patches.optimistic);
        store.apply(&edit.patches.success);
    }
    let confirmed = Snapshot::capture(&store);
    assert_eq!(confirmed.transaction(txn_id).unwrap().amount.committed, 2500);
    assert!(confirmed.transaction(txn_id).unwrap().amount.staged.is_none());
    assert_eq!(confirmed.report(report_id).unwrap().total, 2500);
    assert_no_pending_markers(&store);

    // Rejected edit: shadow discards, committed value and total restore.
    {
        let snapshot = Snapshot::capture(&store);
        let session = session();
        let ctx = ScenarioContext::new(&snapshot, &session);
        let edit = scenarios::update_money_request_amount(&ctx, txn_id, 9900, "USD").unwrap();
        store.apply(&edit.patches.optimistic);
        store.apply(&edit.patches.failure);
    }
    let rejected = Snapshot::capture(&store);
    let transaction = rejected.transaction(txn_id).unwrap();
    assert_eq!(transaction.amount.committed, 2500);
    assert!(transaction.amount.staged.is_none());
    assert!(!transaction.errors.is_empty());
    assert_eq!(rejected.report(report_id).unwrap().total, 2500);
}

// ============================================
// Delete
// ============================================

#[test]
fn test_deleting_last_request_nulls_report_and_unlinks_chat() {
    let mut store = MemoryStore::new();
    let create = run_request(&store, &usd_request(1000));
    store.apply(&create.patches.optimistic);
    store.apply(&create.patches.success);

    let txn_id = create.transaction_id.as_deref().unwrap();
    let report_id = create.money_report_id.as_deref().unwrap();
    let chat_id = create.chat_report_id.as_deref().unwrap();

    let snapshot = Snapshot::capture(&store);
    let session = session();
    let ctx = ScenarioContext::new(&snapshot, &session);
    let delete = scenarios::delete_money_request(&ctx, txn_id).unwrap();
    assert!(delete.notify.is_none());

    store.apply(&delete.patches.optimistic);
    store.apply(&delete.patches.success);

    let applied = Snapshot::capture(&store);
    assert!(applied.report(report_id).is_none(), "report must be nulled");
    assert!(applied.transaction(txn_id).is_none());

    let chat = applied.chat(chat_id).unwrap();
    assert!(chat.iou_report_id.is_none(), "chat link must clear");
    assert_eq!(chat.has_outstanding_child_request, Some(false));

    // The preview is gone from the chat's action map.
    let previews = applied
        .actions(chat_id)
        .map(|actions| {
            actions
                .values()
                .filter(|a| {
                    matches!(
                        &a.payload,
                        outlay_core::types::ActionPayload::ReportPreview { .. }
                    )
                })
                .count()
        })
        .unwrap_or(0);
    assert_eq!(previews, 0);
}

#[test]
fn test_rejected_delete_puts_everything_back() {
    let mut store = MemoryStore::new();
    let create = run_request(&store, &usd_request(1000));
    store.apply(&create.patches.optimistic);
    store.apply(&create.patches.success);

    let txn_id = create.transaction_id.as_deref().unwrap();
    let report_id = create.money_report_id.as_deref().unwrap();

    let snapshot = Snapshot::capture(&store);
    let session = session();
    let ctx = ScenarioContext::new(&snapshot, &session);
    let delete = scenarios::delete_money_request(&ctx, txn_id).unwrap();

    store.apply(&delete.patches.optimistic);
    store.apply(&delete.patches.failure);

    let applied = Snapshot::capture(&store);
    assert_eq!(applied.report(report_id).unwrap().total, 1000);
    let transaction = applied.transaction(txn_id).unwrap();
    assert_eq!(transaction.amount.committed, 1000);
    assert!(!transaction.errors.is_empty());
}

// ============================================
// Workflow
// ============================================

#[test]
fn test_submit_approve_pay_through_the_store() {
    let mut store = MemoryStore::new();

    // Seed an expense-style flow from a plain confirmed request.
    let create = run_request(&store, &usd_request(1000));
    store.apply(&create.patches.optimistic);
    store.apply(&create.patches.success);
    let report_id = create.money_report_id.clone().unwrap();

    for (step, expected_status) in [
        ("submit", outlay_core::types::ReportStatus::Submitted),
        ("approve", outlay_core::types::ReportStatus::Approved),
        ("pay", outlay_core::types::ReportStatus::Reimbursed),
    ] {
        let snapshot = Snapshot::capture(&store);
        let session = session();
        let ctx = ScenarioContext::new(&snapshot, &session);
        let outcome = match step {
            "submit" => scenarios::submit_report(&ctx, &report_id).unwrap(),
            "approve" => scenarios::approve_money_request(&ctx, &report_id).unwrap(),
            _ => scenarios::pay_money_request(&ctx, &report_id, PaymentMethod::Elsewhere)
                .unwrap(),
        };
        store.apply(&outcome.patches.optimistic);
        store.apply(&outcome.patches.success);

        let applied = Snapshot::capture(&store);
        assert_eq!(applied.report(&report_id).unwrap().status, expected_status);
    }

    assert_no_pending_markers(&store);

    // Three workflow actions were appended to the report's thread.
    let applied = Snapshot::capture(&store);
    let workflow_actions = applied
        .actions(&report_id)
        .unwrap()
        .values()
        .filter(|a| {
            matches!(
                &a.payload,
                outlay_core::types::ActionPayload::Submitted { .. }
                    | outlay_core::types::ActionPayload::Approved { .. }
                    | outlay_core::types::ActionPayload::Iou {
                        op: outlay_core::types::IouOp::Pay,
                        ..
                    }
            )
        })
        .count();
    assert_eq!(workflow_actions, 3);
}

#[test]
fn test_rejected_submit_restores_open_state() {
    let mut store = MemoryStore::new();
    let create = run_request(&store, &usd_request(1000));
    store.apply(&create.patches.optimistic);
    store.apply(&create.patches.success);
    let report_id = create.money_report_id.clone().unwrap();

    let snapshot = Snapshot::capture(&store);
    let session = session();
    let ctx = ScenarioContext::new(&snapshot, &session);
    let outcome = scenarios::submit_report(&ctx, &report_id).unwrap();

    store.apply(&outcome.patches.optimistic);
    store.apply(&outcome.patches.failure);

    let applied = Snapshot::capture(&store);
    let report = applied.report(&report_id).unwrap();
    assert_eq!(report.status, outlay_core::types::ReportStatus::Open);
    assert_eq!(report.state, outlay_core::types::ReportState::Open);
    assert!(!report.errors.is_empty());
}
