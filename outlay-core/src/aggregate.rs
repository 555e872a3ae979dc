//! Aggregation rules
//!
//! Pure functions computing the derived fields that must stay consistent
//! across entities sharing a relationship: report totals, last-message
//! previews, outstanding-request flags, report-preview summaries. Every
//! orchestrator funnels its derived values through here so the rules live
//! in exactly one place.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::store::ActionMap;
use crate::types::{
    AccountId, ActionMessage, MoneyReport, PersonalDetail, Policy, PolicyRole, ReportAction,
};

/// Preview text is clipped to this many characters.
pub const LAST_MESSAGE_MAX_LEN: usize = 100;

/// Render an integer minor-unit amount for preview text, e.g. `10.00 USD`.
pub fn format_minor_units(amount: i64, currency: &str) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let magnitude = amount.unsigned_abs();
    format!(
        "{}{}.{:02} {}",
        sign,
        magnitude / 100,
        magnitude % 100,
        currency
    )
}

// ============================================
// Report totals
// ============================================

/// Fold a signed delta into a report's total.
///
/// The delta is already expressed under the report's sign convention;
/// callers apply each delta exactly once.
pub fn apply_total_delta(report: &MoneyReport, delta: i64) -> MoneyReport {
    let mut updated = report.clone();
    updated.total += delta;
    updated
}

/// Fold a new request into an IOU report, reassigning owner/manager when
/// the paying party differs from the current owner.
///
/// `requester_account_id` is the person who is owed by the other side. If
/// the requester is the report's owner the owed amount grows; otherwise it
/// shrinks, and when the sign flips the owner and manager swap roles so
/// `total` stays the positive net amount owed.
///
/// When currencies differ the report is returned unchanged; conversion is
/// the server's job and an unconverted total must never look authoritative.
pub fn apply_iou_delta(
    report: &MoneyReport,
    requester_account_id: AccountId,
    amount: i64,
    currency: &str,
) -> MoneyReport {
    let mut updated = report.clone();
    if currency != report.currency {
        return updated;
    }

    if requester_account_id == report.owner_account_id {
        updated.total += amount;
    } else {
        updated.total -= amount;
    }

    if updated.total < 0 {
        std::mem::swap(
            &mut updated.owner_account_id,
            &mut updated.manager_account_id,
        );
        updated.total = -updated.total;
    }

    updated
}

// ============================================
// Outstanding child request
// ============================================

/// Whether a chat's outstanding-request flag should be written, and to
/// what.
///
/// - No manual submission needed: `Some(false)`, the flag is cleared.
/// - Manual submission needed, current user is the policy admin: `None`.
///   The key is omitted so a merge leaves any pre-existing `true` alone
///   (admin status alone must not clear it).
/// - Manual submission needed otherwise: `Some(true)`.
pub fn outstanding_child_request(policy: Option<&Policy>, needs_manual_submit: bool) -> Option<bool> {
    if !needs_manual_submit {
        return Some(false);
    }
    if matches!(policy.map(|p| p.role), Some(PolicyRole::Admin)) {
        return None;
    }
    Some(true)
}

// ============================================
// Last-message previews
// ============================================

/// Derived preview of the most recent visible action in a report.
#[derive(Debug, Clone, PartialEq)]
pub struct LastMessage {
    pub text: String,
    pub html: String,
    pub created: DateTime<Utc>,
}

/// Derive the last-message preview from an action map.
///
/// Deterministic over the most recent visible action's message content;
/// must be recomputed whenever an action is added, edited, or removed.
/// Returns `None` when no visible action remains.
pub fn last_message_preview(actions: &ActionMap) -> Option<LastMessage> {
    let latest = actions
        .values()
        .filter(|action| action.is_visible())
        .max_by_key(|action| action.created)?;

    let fragment = latest.message.first()?;
    Some(LastMessage {
        text: clip_preview(&fragment.text),
        html: clip_preview(&fragment.html),
        created: latest.created,
    })
}

/// Collapse whitespace and clip to [`LAST_MESSAGE_MAX_LEN`] characters.
fn clip_preview(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(LAST_MESSAGE_MAX_LEN).collect()
}

// ============================================
// Report-preview summaries
// ============================================

/// The payer summary rendered in a report preview, e.g. `pat owes 10.00
/// USD` or `pat spent 10.00 USD`.
pub fn payer_summary(
    report: &MoneyReport,
    details: &BTreeMap<AccountId, PersonalDetail>,
) -> String {
    let spend = report.total.abs();
    let rendered = format_minor_units(spend, &report.currency);
    match report.report_type {
        crate::types::ReportType::Iou => {
            let payer = display_name(details, report.manager_account_id);
            format!("{} owes {}", payer, rendered)
        }
        crate::types::ReportType::Expense => {
            let submitter = display_name(details, report.owner_account_id);
            format!("{} spent {}", submitter, rendered)
        }
    }
}

fn display_name(details: &BTreeMap<AccountId, PersonalDetail>, account_id: AccountId) -> String {
    details
        .get(&account_id)
        .map(|d| d.display_name.clone())
        .unwrap_or_else(|| "someone".to_string())
}

/// Next-value for an existing report-preview action after a transaction
/// was added (`count_delta = 1`) or deleted (`count_delta = -1`).
///
/// A preview is created once per (chat, report) pair and from then on only
/// updated; this function is the update half.
pub fn update_report_preview(
    existing: &ReportAction,
    count_delta: i32,
    text: &str,
    now: DateTime<Utc>,
) -> ReportAction {
    let mut updated = existing.clone();
    updated.message = vec![ActionMessage::plain(text)];
    updated.created = now;
    updated.child_money_request_count = Some(
        (existing.child_money_request_count.unwrap_or(0) + count_delta).max(0),
    );
    updated
}

/// Count the visible money-request actions in a report's action map,
/// optionally ignoring one action (the one about to be deleted).
pub fn visible_request_count(actions: &ActionMap, exclude_action_id: Option<&str>) -> usize {
    actions
        .values()
        .filter(|action| Some(action.report_action_id.as_str()) != exclude_action_id)
        .filter(|action| action.is_visible())
        .filter(|action| {
            matches!(
                action.payload,
                crate::types::ActionPayload::Iou {
                    op: crate::types::IouOp::Create | crate::types::IouOp::Split,
                    ..
                }
            )
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders;
    use crate::types::{
        AutoReportingFrequency, IouOp, PolicyType, ReportState, ReportStatus, ReportType,
    };

    fn sample_report(owner: AccountId, manager: AccountId, total: i64) -> MoneyReport {
        MoneyReport {
            report_id: "r1".to_string(),
            chat_report_id: "c1".to_string(),
            owner_account_id: owner,
            manager_account_id: manager,
            total,
            currency: "USD".to_string(),
            report_type: ReportType::Iou,
            state: ReportState::Open,
            status: ReportStatus::Open,
            parent_report_action_id: None,
            policy_id: None,
            pending_fields: BTreeMap::new(),
            pending_action: None,
            errors: BTreeMap::new(),
        }
    }

    fn sample_policy(role: PolicyRole, frequency: AutoReportingFrequency) -> Policy {
        Policy {
            id: "p1".to_string(),
            policy_type: PolicyType::Team,
            role,
            autoreporting_frequency: frequency,
        }
    }

    #[test]
    fn test_format_minor_units() {
        assert_eq!(format_minor_units(1000, "USD"), "10.00 USD");
        assert_eq!(format_minor_units(5, "EUR"), "0.05 EUR");
        assert_eq!(format_minor_units(-1234, "USD"), "-12.34 USD");
    }

    #[test]
    fn test_total_delta_is_exact() {
        let report = sample_report(1, 2, 1000);
        assert_eq!(apply_total_delta(&report, 500).total, 1500);
        assert_eq!(apply_total_delta(&report, -1000).total, 0);
    }

    #[test]
    fn test_iou_delta_same_requester_grows_total() {
        let report = sample_report(1, 2, 1000);
        let updated = apply_iou_delta(&report, 1, 500, "USD");
        assert_eq!(updated.total, 1500);
        assert_eq!(updated.owner_account_id, 1);
    }

    #[test]
    fn test_iou_delta_reassigns_owner_on_sign_flip() {
        // Account 2 (the payer so far) requests more than it owes; roles flip.
        let report = sample_report(1, 2, 1000);
        let updated = apply_iou_delta(&report, 2, 2500, "USD");
        assert_eq!(updated.total, 1500);
        assert_eq!(updated.owner_account_id, 2);
        assert_eq!(updated.manager_account_id, 1);
    }

    #[test]
    fn test_iou_delta_counter_request_without_flip() {
        let report = sample_report(1, 2, 1000);
        let updated = apply_iou_delta(&report, 2, 400, "USD");
        assert_eq!(updated.total, 600);
        assert_eq!(updated.owner_account_id, 1);
    }

    #[test]
    fn test_iou_delta_ignores_currency_mismatch() {
        let report = sample_report(1, 2, 1000);
        let updated = apply_iou_delta(&report, 1, 500, "EUR");
        assert_eq!(updated.total, 1000);
    }

    #[test]
    fn test_outstanding_flag_omitted_for_admin() {
        let admin = sample_policy(PolicyRole::Admin, AutoReportingFrequency::Manual);
        let user = sample_policy(PolicyRole::User, AutoReportingFrequency::Manual);
        let instant = sample_policy(PolicyRole::User, AutoReportingFrequency::Instant);

        assert_eq!(outstanding_child_request(Some(&admin), true), None);
        assert_eq!(outstanding_child_request(Some(&user), true), Some(true));
        assert_eq!(outstanding_child_request(Some(&instant), false), Some(false));
        assert_eq!(outstanding_child_request(None, true), Some(true));
    }

    #[test]
    fn test_last_message_tracks_most_recent_visible() {
        let now = Utc::now();
        let mut actions = ActionMap::new();

        let created = builders::build_created_action("r1", 1, now, 1);
        let iou = builders::build_iou_action(
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
        actions.insert(created.report_action_id.clone(), created);
        actions.insert(iou.report_action_id.clone(), iou.clone());

        let preview = last_message_preview(&actions).unwrap();
        assert_eq!(preview.text, "requested 10.00 USD");

        // Hide the money action; the created action becomes the preview.
        actions
            .get_mut(&iou.report_action_id)
            .unwrap()
            .pending_action = Some(crate::types::PendingAction::Delete);
        let preview = last_message_preview(&actions).unwrap();
        assert_eq!(preview.text, "created this report");
    }

    #[test]
    fn test_clip_preview_collapses_and_truncates() {
        let long = "word ".repeat(60);
        let clipped = clip_preview(&long);
        assert_eq!(clipped.chars().count(), LAST_MESSAGE_MAX_LEN);
        assert!(!clipped.contains("  "));
    }

    #[test]
    fn test_update_preview_adjusts_count_exactly_once() {
        let now = Utc::now();
        let preview = builders::build_report_preview_action("c1", "r1", 1, "owes 10.00 USD", now);

        let bumped = update_report_preview(&preview, 1, "owes 20.00 USD", now);
        assert_eq!(bumped.child_money_request_count, Some(2));

        let dropped = update_report_preview(&bumped, -1, "owes 10.00 USD", now);
        assert_eq!(dropped.child_money_request_count, Some(1));
    }

    #[test]
    fn test_payer_summary_by_report_type() {
        let mut details = BTreeMap::new();
        details.insert(
            2,
            builders::build_optimistic_personal_detail(2, "jo@example.com"),
        );

        let iou = sample_report(1, 2, 1000);
        assert_eq!(payer_summary(&iou, &details), "jo owes 10.00 USD");

        let mut expense = sample_report(2, 3, -2500);
        expense.report_type = ReportType::Expense;
        assert_eq!(payer_summary(&expense, &details), "jo spent 25.00 USD");
    }

    #[test]
    fn test_visible_request_count_excludes_deleted_and_excluded() {
        let now = Utc::now();
        let mut actions = ActionMap::new();
        let a = builders::build_iou_action(
            "r1", IouOp::Create, 1, 100, "USD", vec![1, 2], Some("t1"), None, now,
        );
        let mut b = builders::build_iou_action(
            "r1", IouOp::Create, 1, 200, "USD", vec![1, 2], Some("t2"), None, now,
        );
        b.pending_action = Some(crate::types::PendingAction::Delete);
        let a_id = a.report_action_id.clone();
        actions.insert(a_id.clone(), a);
        actions.insert(b.report_action_id.clone(), b);

        assert_eq!(visible_request_count(&actions, None), 1);
        assert_eq!(visible_request_count(&actions, Some(&a_id)), 0);
    }
}
