//! Scenario orchestrators
//!
//! One orchestrator per user-facing money operation. Every orchestrator
//! follows the same four-phase shape:
//!
//! 1. **Resolve**: look up existing chat/report in the injected snapshot
//! 2. **Build/Update**: call entity builders for missing pieces, fold the
//!    new transaction through the aggregation rules
//! 3. **Assemble**: produce the optimistic/success/failure patch triad
//! 4. **Dispatch**: emit exactly one outbound command, then notify the
//!    local side-channel
//!
//! Orchestrators run to completion synchronously against the snapshot and
//! never throw for server-side failures; the only error they return is a
//! missing referenced entity, which is a caller-precondition violation.
//! Two orchestrators racing on the same report each compute from their own
//! snapshot; the server is the final arbiter of totals and the
//! confirm/reject patches reconcile eventually.

pub mod delete;
pub mod edit;
pub mod request;
pub mod send;
pub mod split;
pub mod workflow;

pub use delete::delete_money_request;
pub use edit::{
    edit_money_request, update_money_request_amount, update_money_request_date,
    update_money_request_description, TransactionChanges,
};
pub use request::{request_money, MoneyRequest};
pub use send::{send_money, SendMoney};
pub use split::{allocate_shares, split_bill, SplitBill, SplitShares};
pub use workflow::{approve_money_request, pay_money_request, submit_report};

use chrono::{DateTime, Utc};

use crate::config::SessionConfig;
use crate::dispatch::{Command, CommandDispatcher, NotificationSink};
use crate::error::Result;
use crate::patch::PatchSet;
use crate::store::Snapshot;
use crate::types::{
    AccountId, MoneyReport, PersonalDetail, Policy, PolicyType, ReportState, ReportStatus,
    ReportType,
};

/// Someone on the other side of a money operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub account_id: AccountId,
    pub login: String,
}

/// Read-only context injected into every orchestrator call.
///
/// Holds the store snapshot, the current user's identity, and the wall
/// clock captured once so a whole scenario shares one timestamp.
pub struct ScenarioContext<'a> {
    pub snapshot: &'a Snapshot,
    pub session: &'a SessionConfig,
    pub now: DateTime<Utc>,
}

impl<'a> ScenarioContext<'a> {
    pub fn new(snapshot: &'a Snapshot, session: &'a SessionConfig) -> Self {
        Self::at(snapshot, session, Utc::now())
    }

    /// Context with an explicit clock; tests pin timestamps with this.
    pub fn at(snapshot: &'a Snapshot, session: &'a SessionConfig, now: DateTime<Utc>) -> Self {
        Self {
            snapshot,
            session,
            now,
        }
    }
}

/// Everything a finished orchestrator hands back: the single outbound
/// command, the patch triad, the notification to fire after dispatch, and
/// the ids of whatever it touched.
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub command: Command,
    pub patches: PatchSet,
    /// `(chat report id, actor)` for the notification side-channel
    pub notify: Option<(String, AccountId)>,
    pub chat_report_id: Option<String>,
    pub money_report_id: Option<String>,
    pub transaction_id: Option<String>,
}

/// Dispatch a completed scenario: hand the command and its patches to the
/// transport, then fire the local notification exactly once.
pub fn dispatch_scenario(
    outcome: &ScenarioOutcome,
    dispatcher: &mut dyn CommandDispatcher,
    notifier: &mut dyn NotificationSink,
) -> Result<()> {
    dispatcher.write(&outcome.command, &outcome.patches)?;
    if let Some((report_id, actor)) = &outcome.notify {
        notifier.notify_new_action(report_id, *actor);
    }
    tracing::info!(command = outcome.command.name(), "Dispatched scenario");
    Ok(())
}

/// Whether a new transaction may be appended to an existing report.
///
/// IOU reports stay open until settled. Expense reports accept additions
/// while open; once submitted only non-Control policies still allow them,
/// and an approved report never does.
pub(crate) fn is_report_appendable(report: &MoneyReport, policy: Option<&Policy>) -> bool {
    match report.report_type {
        ReportType::Iou => report.status <= ReportStatus::Submitted,
        ReportType::Expense => match report.state {
            ReportState::Open => true,
            ReportState::Submitted => {
                !matches!(policy.map(|p| p.policy_type), Some(PolicyType::Control))
            }
            ReportState::Approved => false,
        },
    }
}

/// Synthesize personal details for participants the snapshot does not
/// know. The optimistic flag keeps downstream code from treating them as
/// authoritative.
pub(crate) fn missing_personal_details(
    snapshot: &Snapshot,
    participants: &[&Participant],
) -> Vec<PersonalDetail> {
    participants
        .iter()
        .filter(|p| snapshot.personal_detail(p.account_id).is_none())
        .map(|p| crate::builders::build_optimistic_personal_detail(p.account_id, &p.login))
        .collect()
}
