//! Split a bill N ways
//!
//! One group-level transaction records the full amount against the group
//! chat (parented to a sentinel report id, never a stored report), and
//! each other participant gets a one-on-one request built through the
//! same create-request core with their allocated share.
//!
//! Share allocation is integer-exact: no floating point, shares always sum
//! to the original total, and the current user absorbs the rounding
//! remainder first.

use chrono::DateTime;
use chrono::Utc;
use serde_json::json;

use crate::builders::{self, TransactionDetails};
use crate::dispatch::{serialize_splits, Command, SplitBillParams, SplitShare};
use crate::error::Result;
use crate::patch::{
    action_errors, clear_action_markers, clear_pending_markers, timestamped_errors, PatchSet,
    CREATE_FAILURE_MESSAGE,
};
use crate::store::{key, StoreOp};
use crate::types::{AccountId, IouOp};

use super::request::{build_request_parts, RequestSpec};
use super::{missing_personal_details, Participant, ScenarioContext, ScenarioOutcome};

/// Sentinel parent for the group-level split transaction; resolvable to no
/// stored report.
pub const SPLIT_GROUP_REPORT_ID: &str = "-1";

/// A bill split between the current user and `participants`.
#[derive(Debug, Clone)]
pub struct SplitBill {
    /// The other participants (the current user is implicit)
    pub participants: Vec<Participant>,
    /// Positive total in minor currency units
    pub amount: i64,
    pub currency: String,
    pub created: DateTime<Utc>,
    pub details: TransactionDetails,
}

/// Integer-exact share allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitShares {
    /// The current user's share; absorbs the first remainder unit
    pub self_share: i64,
    /// One share per other participant, each within one unit of the rest
    pub other_shares: Vec<i64>,
}

/// Divide `total` across `participant_count` people (current user
/// included) without drift.
///
/// `share = total.div_euclid(n)`; the remainder is distributed one unit at
/// a time, current user first, so that `self_share + Σ other_shares ==
/// total` exactly, for negative totals too. No currency-specific rounding
/// exists beyond integer minor units.
pub fn allocate_shares(total: i64, participant_count: usize) -> SplitShares {
    let n = participant_count.max(1) as i64;
    let base = total.div_euclid(n);
    let remainder = total - base * n;

    let self_share = base + if remainder > 0 { 1 } else { 0 };
    let other_shares = (0..n - 1)
        .map(|i| base + if i + 1 < remainder { 1 } else { 0 })
        .collect();

    SplitShares {
        self_share,
        other_shares,
    }
}

/// Orchestrate an N-way split and emit the `SplitBill` command.
pub fn split_bill(ctx: &ScenarioContext<'_>, split: &SplitBill) -> Result<ScenarioOutcome> {
    let actor = ctx.session.account_id;
    let shares = allocate_shares(split.amount, split.participants.len() + 1);

    // Group chat across the full participant set.
    let mut all_participants: Vec<AccountId> = vec![actor];
    all_participants.extend(split.participants.iter().map(|p| p.account_id));

    let (prior_group_chat, mut group_chat) =
        match ctx.snapshot.chat_by_participants(&all_participants) {
            Some(found) => (Some(found.clone()), found.clone()),
            None => (
                None,
                builders::build_chat_thread(&all_participants, None, ctx.now),
            ),
        };

    // The group transaction carries the full amount but never parents to a
    // real report.
    let group_transaction = builders::build_transaction(
        SPLIT_GROUP_REPORT_ID,
        split.amount,
        &split.currency,
        split.created,
        &split.details,
    );

    let group_created_action = prior_group_chat
        .is_none()
        .then(|| builders::build_created_action(&group_chat.report_id, actor, ctx.now, 1));
    let split_action = builders::build_iou_action(
        &group_chat.report_id,
        IouOp::Split,
        actor,
        split.amount,
        &split.currency,
        all_participants.clone(),
        Some(&group_transaction.transaction_id),
        None,
        ctx.now,
    );

    if let Some(fragment) = split_action.message.first() {
        group_chat.last_message_text = fragment.text.clone();
        group_chat.last_message_html = fragment.html.clone();
    }
    group_chat.last_visible_action_created = ctx.now;
    group_chat.last_read_time = ctx.now;

    let participant_refs: Vec<&Participant> = split.participants.iter().collect();
    let group_details = missing_personal_details(ctx.snapshot, &participant_refs);

    // Group-level triad, assembled by hand since no money report exists.
    let mut patches = PatchSet::new();
    let group_chat_key = key::chat_key(&group_chat.report_id);
    let group_actions_key = key::report_actions_key(&group_chat.report_id);
    let group_transaction_key = key::transaction_key(&group_transaction.transaction_id);

    match prior_group_chat.as_ref() {
        None => patches
            .optimistic
            .push(StoreOp::replace(&group_chat_key, &group_chat)),
        Some(_) => patches.optimistic.push(StoreOp::merge(
            &group_chat_key,
            json!({
                "last_message_text": group_chat.last_message_text,
                "last_message_html": group_chat.last_message_html,
                "last_visible_action_created":
                    serde_json::to_value(group_chat.last_visible_action_created)
                        .expect("timestamp serialization is infallible"),
                "pending_action": "update",
            }),
        )),
    }
    patches
        .optimistic
        .push(StoreOp::replace(&group_transaction_key, &group_transaction));

    let mut group_actions = serde_json::Map::new();
    if let Some(action) = group_created_action.as_ref() {
        group_actions.insert(
            action.report_action_id.clone(),
            serde_json::to_value(action).expect("action serialization is infallible"),
        );
    }
    group_actions.insert(
        split_action.report_action_id.clone(),
        serde_json::to_value(&split_action).expect("action serialization is infallible"),
    );
    patches.optimistic.push(StoreOp::merge(
        &group_actions_key,
        serde_json::Value::Object(group_actions),
    ));

    if !group_details.is_empty() {
        let mut details = serde_json::Map::new();
        for detail in &group_details {
            details.insert(
                detail.account_id.to_string(),
                serde_json::to_value(detail).expect("detail serialization is infallible"),
            );
        }
        patches.optimistic.push(StoreOp::merge(
            key::PERSONAL_DETAILS_KEY,
            serde_json::Value::Object(details),
        ));
    }

    let create_chat_field = builders::PENDING_FIELD_CREATE_CHAT;
    let group_success_chat = if prior_group_chat.is_none() {
        json!({
            "pending_action": null,
            "pending_fields": { create_chat_field: null },
            "errors": null
        })
    } else {
        clear_pending_markers()
    };
    patches
        .success
        .push(StoreOp::merge(&group_chat_key, group_success_chat));
    patches
        .success
        .push(StoreOp::merge(&group_transaction_key, clear_pending_markers()));
    let mut group_action_ids: Vec<&str> = Vec::new();
    if let Some(action) = group_created_action.as_ref() {
        group_action_ids.push(&action.report_action_id);
    }
    group_action_ids.push(&split_action.report_action_id);
    patches.success.push(StoreOp::merge(
        &group_actions_key,
        clear_action_markers(&group_action_ids),
    ));

    patches.failure.push(StoreOp::merge(
        &group_chat_key,
        json!({ "errors": timestamped_errors(CREATE_FAILURE_MESSAGE, ctx.now) }),
    ));
    patches.failure.push(StoreOp::merge(
        &group_actions_key,
        action_errors(&split_action.report_action_id, CREATE_FAILURE_MESSAGE, ctx.now),
    ));

    // One-on-one request per participant, built through the create core
    // with the allocated share.
    let mut wire_shares = vec![SplitShare {
        account_id: actor,
        amount: shares.self_share,
        iou_report_id: None,
        transaction_id: None,
    }];

    for (participant, share) in split.participants.iter().zip(&shares.other_shares) {
        let parts = build_request_parts(
            ctx,
            &RequestSpec {
                participant,
                amount: *share,
                currency: &split.currency,
                created: split.created,
                details: &split.details,
                receipt_source: None,
                chat_report_id: None,
                op: IouOp::Split,
            },
        )?;

        wire_shares.push(SplitShare {
            account_id: participant.account_id,
            amount: *share,
            iou_report_id: Some(parts.report.report_id.clone()),
            transaction_id: Some(parts.transaction.transaction_id.clone()),
        });
        patches.extend(parts.patches);
    }

    tracing::debug!(
        participants = split.participants.len() + 1,
        total = split.amount,
        self_share = shares.self_share,
        "Allocated split shares"
    );

    let command = Command::SplitBill(SplitBillParams {
        amount: split.amount,
        currency: split.currency.clone(),
        comment: split.details.comment.clone(),
        created: split.created,
        merchant: split.details.merchant.clone(),
        category: split.details.category.clone(),
        tag: split.details.tag.clone(),
        chat_report_id: group_chat.report_id.clone(),
        transaction_id: group_transaction.transaction_id.clone(),
        report_action_id: split_action.report_action_id.clone(),
        splits: serialize_splits(&wire_shares),
    });

    Ok(ScenarioOutcome {
        command,
        patches,
        notify: Some((group_chat.report_id.clone(), actor)),
        chat_report_id: Some(group_chat.report_id),
        money_report_id: None,
        transaction_id: Some(group_transaction.transaction_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::store::Snapshot;

    #[test]
    fn test_shares_sum_exactly_across_grid() {
        for total in [-1001, -100, -1, 0, 1, 7, 99, 100, 1000, 999_999_937] {
            for count in 1..=9usize {
                let shares = allocate_shares(total, count);
                let sum: i64 = shares.self_share + shares.other_shares.iter().sum::<i64>();
                assert_eq!(sum, total, "total={} count={}", total, count);
                assert_eq!(shares.other_shares.len(), count - 1);
                for other in &shares.other_shares {
                    assert!(
                        (other - shares.self_share).abs() <= 1,
                        "share spread > 1 unit for total={} count={}",
                        total,
                        count
                    );
                }
            }
        }
    }

    #[test]
    fn test_three_way_hundred_is_34_33_33() {
        let shares = allocate_shares(100, 3);
        assert_eq!(shares.self_share, 34);
        assert_eq!(shares.other_shares, vec![33, 33]);
    }

    #[test]
    fn test_even_split_has_no_remainder() {
        let shares = allocate_shares(900, 3);
        assert_eq!(shares.self_share, 300);
        assert_eq!(shares.other_shares, vec![300, 300]);
    }

    #[test]
    fn test_split_bill_emits_group_and_per_participant_entities() {
        let snapshot = Snapshot::new();
        let session = SessionConfig {
            account_id: 1,
            login: "me@example.com".to_string(),
        };
        let ctx = ScenarioContext::new(&snapshot, &session);

        let outcome = split_bill(
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

        assert_eq!(outcome.command.name(), "SplitBill");
        let params = outcome.command.params();
        assert_eq!(params["amount"], 100);

        let shares: Vec<SplitShare> =
            serde_json::from_str(params["splits"].as_str().unwrap()).unwrap();
        assert_eq!(shares.len(), 3);
        assert_eq!(shares[0].amount + shares[1].amount + shares[2].amount, 100);
        assert_eq!(shares[0].account_id, 1);
        assert!(shares[1].iou_report_id.is_some());

        // Group transaction parents to the sentinel, never a stored report.
        let group_txn_op = outcome
            .patches
            .optimistic
            .iter()
            .find(|op| op.key() == key::transaction_key(&outcome.transaction_id.clone().unwrap()))
            .unwrap();
        if let StoreOp::Replace { value, .. } = group_txn_op {
            assert_eq!(value["report_id"], SPLIT_GROUP_REPORT_ID);
        } else {
            panic!("group transaction must be a replace op");
        }
    }
}
