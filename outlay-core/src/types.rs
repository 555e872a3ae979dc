//! Core domain types for outlay
//!
//! These types are the canonical entity model for the optimistic
//! money-movement engine. Every entity is a plain serde record that lives
//! as a document in the external key-value store; the engine computes
//! next-values and hands them to the store as patches, it never owns
//! storage.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **ChatThread** | A conversation; links to at most one active MoneyReport |
//! | **MoneyReport** | Aggregate of transactions: a peer IOU or a policy expense report |
//! | **Transaction** | One monetary line item (manual, scanned receipt) |
//! | **ReportAction** | An event rendered in a thread (created/iou/preview/...) |
//! | **PersonalDetail** | Display data for an account, possibly synthesized |
//! | **Policy** | Workspace rules consumed read-only (submission, roles) |
//!
//! Money amounts are integers in minor currency units (cents). A
//! MoneyReport's `total` follows an explicit [`SignConvention`]: IOU
//! reports store the positive amount owed, expense reports store the
//! negative of spend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Account identifier for a person.
pub type AccountId = i64;

/// Map of pending field names to the mutation marker that touched them.
pub type PendingFields = BTreeMap<String, PendingAction>;

/// Errors attached to a document, keyed by millisecond timestamp so the
/// newest message renders first.
pub type ErrorBag = BTreeMap<String, String>;

// ============================================
// Pending markers
// ============================================

/// Marker recording the kind of optimistic mutation a document (or one of
/// its fields) is waiting on. Cleared by the success patch list, consumed
/// by the failure list to decide what to roll back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingAction {
    /// Brand-new document, not yet acknowledged by the server
    Add,
    /// Mutation of an existing document
    Update,
    /// Deletion awaiting acknowledgement
    Delete,
}

impl PendingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingAction::Add => "add",
            PendingAction::Update => "update",
            PendingAction::Delete => "delete",
        }
    }
}

impl std::str::FromStr for PendingAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(PendingAction::Add),
            "update" => Ok(PendingAction::Update),
            "delete" => Ok(PendingAction::Delete),
            _ => Err(format!("unknown pending action: {}", s)),
        }
    }
}

// ============================================
// Pending<T> shadow values
// ============================================

/// A field value with an optional staged (optimistic) edit.
///
/// Edits never overwrite the committed value; they stage a shadow so the
/// failure patch can restore the original losslessly and the success patch
/// promotes the staged value in a single well-typed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pending<T> {
    /// Last server-confirmed value
    pub committed: T,
    /// Optimistic edit awaiting confirmation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staged: Option<T>,
}

impl<T: Clone> Pending<T> {
    /// Wrap a confirmed value with no staged edit.
    pub fn new(committed: T) -> Self {
        Self {
            committed,
            staged: None,
        }
    }

    /// The value the UI should render: staged if present, else committed.
    pub fn effective(&self) -> &T {
        self.staged.as_ref().unwrap_or(&self.committed)
    }

    /// Stage an optimistic edit.
    pub fn stage(&mut self, value: T) {
        self.staged = Some(value);
    }

    /// Promote the staged value (server confirmed the edit).
    pub fn commit(&mut self) {
        if let Some(value) = self.staged.take() {
            self.committed = value;
        }
    }

    /// Discard the staged value (server rejected the edit).
    pub fn rollback(&mut self) {
        self.staged = None;
    }
}

// ============================================
// ChatThread
// ============================================

/// A conversation between a fixed set of participants.
///
/// Exactly one "active" money report may be linked via `iou_report_id` at
/// a time. Created once per distinct participant set (or reused if found);
/// mutated whenever a linked report's total or preview text changes; never
/// deleted by this engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatThread {
    /// Unique identifier (also the store key suffix)
    pub report_id: String,
    /// Sorted participant account ids; identifies the conversation
    pub participant_account_ids: Vec<AccountId>,
    /// The currently active money report, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iou_report_id: Option<String>,
    /// When the current user last read the thread
    pub last_read_time: DateTime<Utc>,
    /// Preview text of the most recent visible action
    pub last_message_text: String,
    /// Preview html of the most recent visible action
    pub last_message_html: String,
    /// Timestamp of the most recent visible action
    pub last_visible_action_created: DateTime<Utc>,
    /// True when a linked report still needs the current user to act.
    /// Absent (not `false`) when the rule does not apply, so merges leave
    /// any earlier value untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_outstanding_child_request: Option<bool>,
    /// Workspace policy backing this chat, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    /// Per-field optimistic mutation markers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pending_fields: PendingFields,
    /// Document-level optimistic mutation marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_action: Option<PendingAction>,
    /// User-visible errors keyed by millisecond timestamp
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: ErrorBag,
}

// ============================================
// MoneyReport
// ============================================

/// Whether a money report is a peer IOU or a policy expense report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Iou,
    Expense,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Iou => "iou",
            ReportType::Expense => "expense",
        }
    }

    /// The sign convention this report type stores its total under.
    pub fn sign_convention(&self) -> SignConvention {
        match self {
            ReportType::Iou => SignConvention::PositiveOwed,
            ReportType::Expense => SignConvention::NegativeSpend,
        }
    }
}

impl std::str::FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iou" => Ok(ReportType::Iou),
            "expense" => Ok(ReportType::Expense),
            _ => Err(format!("unknown report type: {}", s)),
        }
    }
}

/// Explicit tag for how a report's `total` encodes money movement.
///
/// Consumed by the aggregation rules instead of being re-inferred from the
/// report type at each call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignConvention {
    /// IOU reports: total is the positive amount the payer owes
    PositiveOwed,
    /// Expense reports: total is the negative of the amount spent
    NegativeSpend,
}

impl SignConvention {
    /// Convert a user-entered (positive) request amount into the signed
    /// transaction amount stored under this convention.
    pub fn signed(&self, amount: i64) -> i64 {
        match self {
            SignConvention::PositiveOwed => amount,
            SignConvention::NegativeSpend => -amount,
        }
    }
}

/// Workflow position of a money report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    Open,
    Submitted,
    Approved,
}

impl ReportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportState::Open => "open",
            ReportState::Submitted => "submitted",
            ReportState::Approved => "approved",
        }
    }
}

/// Settlement status of a money report.
///
/// Transitions: `Open → Submitted → Approved → Reimbursed`, or
/// `Submitted → Reimbursed` when approval is automatic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Open,
    Submitted,
    Approved,
    Reimbursed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Open => "open",
            ReportStatus::Submitted => "submitted",
            ReportStatus::Approved => "approved",
            ReportStatus::Reimbursed => "reimbursed",
        }
    }
}

/// Aggregate of transactions between one payer and one payee (IOU) or one
/// submitter and an approver (expense report).
///
/// Invariant: `total` is the sum of member transaction amounts under the
/// report's sign convention. Every transaction add/edit/delete adjusts
/// `total` by exactly the transaction's signed delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyReport {
    /// Unique identifier (also the store key suffix)
    pub report_id: String,
    /// The chat thread this report belongs to
    pub chat_report_id: String,
    /// Who submitted / is owed by (IOU: the requester)
    pub owner_account_id: AccountId,
    /// Who owes / approves (IOU: the payer)
    pub manager_account_id: AccountId,
    /// Signed total in minor currency units under the sign convention
    pub total: i64,
    /// ISO currency code
    pub currency: String,
    /// Whether this is an IOU or expense report
    pub report_type: ReportType,
    /// Workflow position
    pub state: ReportState,
    /// Settlement status
    pub status: ReportStatus,
    /// The report-preview action in the chat that summarizes this report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_report_action_id: Option<String>,
    /// Workspace policy, for expense reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    /// Per-field optimistic mutation markers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pending_fields: PendingFields,
    /// Document-level optimistic mutation marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_action: Option<PendingAction>,
    /// User-visible errors keyed by millisecond timestamp
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: ErrorBag,
}

impl MoneyReport {
    /// The sign convention this report stores its total under.
    pub fn sign_convention(&self) -> SignConvention {
        self.report_type.sign_convention()
    }
}

// ============================================
// Transaction
// ============================================

/// Scan pipeline state for a receipt image.
///
/// `Open → ScanReady → Scanning → (ScanComplete | ScanFailed)`. A
/// transaction may be completed from a scan state by a subsequent edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptState {
    Open,
    ScanReady,
    Scanning,
    ScanComplete,
    ScanFailed,
}

impl ReceiptState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptState::Open => "open",
            ReceiptState::ScanReady => "scan_ready",
            ReceiptState::Scanning => "scanning",
            ReceiptState::ScanComplete => "scan_complete",
            ReceiptState::ScanFailed => "scan_failed",
        }
    }

    /// Whether the scan result, not user edits, will drive the next
    /// user-visible message.
    pub fn is_scanning(&self) -> bool {
        matches!(self, ReceiptState::ScanReady | ReceiptState::Scanning)
    }
}

impl std::str::FromStr for ReceiptState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ReceiptState::Open),
            "scan_ready" => Ok(ReceiptState::ScanReady),
            "scanning" => Ok(ReceiptState::Scanning),
            "scan_complete" => Ok(ReceiptState::ScanComplete),
            "scan_failed" => Ok(ReceiptState::ScanFailed),
            _ => Err(format!("unknown receipt state: {}", s)),
        }
    }
}

/// An attached receipt image and its scan state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Where the image lives (upload path or URL)
    pub source: String,
    /// Scan pipeline state
    pub state: ReceiptState,
}

/// A single monetary line item belonging to exactly one MoneyReport.
///
/// Editable fields are [`Pending`] shadows: an edit stages the new value
/// next to the committed one so rejection restores the original losslessly.
/// A draft variant lives under its own key until promoted or discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier (also the store key suffix)
    pub transaction_id: String,
    /// Report this transaction belongs to
    pub report_id: String,
    /// Signed amount under the owning report's sign convention
    pub amount: Pending<i64>,
    /// ISO currency code
    pub currency: Pending<String>,
    /// When the expense happened
    pub created: Pending<DateTime<Utc>>,
    /// Free-text description
    pub comment: Pending<String>,
    /// Merchant name
    pub merchant: Pending<String>,
    /// Category label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Tag label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Whether the expense is billable
    #[serde(default)]
    pub billable: bool,
    /// Attached receipt, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
    /// Per-field optimistic mutation markers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pending_fields: PendingFields,
    /// Document-level optimistic mutation marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_action: Option<PendingAction>,
    /// User-visible errors keyed by millisecond timestamp
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: ErrorBag,
}

// ============================================
// ReportAction
// ============================================

/// Which money operation an IOU action records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IouOp {
    Create,
    Split,
    Pay,
    Send,
    DeletedRequest,
}

impl IouOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            IouOp::Create => "create",
            IouOp::Split => "split",
            IouOp::Pay => "pay",
            IouOp::Send => "send",
            IouOp::DeletedRequest => "deleted_request",
        }
    }
}

/// How a payment left the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Settled outside the app (cash, bank transfer, ...)
    Elsewhere,
    /// Settled with the in-app wallet
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Elsewhere => "elsewhere",
            PaymentMethod::Wallet => "wallet",
        }
    }
}

/// Type-specific payload of a report action, tagged for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionPayload {
    /// The report (or chat) came into existence
    Created,
    /// A money movement: request, split share, payment
    Iou {
        op: IouOp,
        amount: i64,
        currency: String,
        participant_account_ids: Vec<AccountId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transaction_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payment_method: Option<PaymentMethod>,
    },
    /// An existing request was edited; carries old and new values for the
    /// fields that changed
    ModifiedExpense {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_amount: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_currency: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        currency: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_created: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_merchant: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        merchant: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_comment: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },
    /// Lives in the chat thread; summarizes the linked money report.
    /// Created once per (chat, report) pair, then always updated in place.
    ReportPreview { linked_report_id: String },
    /// The report was submitted for approval
    Submitted { amount: i64, currency: String },
    /// The report was approved
    Approved { amount: i64, currency: String },
}

impl ActionPayload {
    /// Whether this payload is the money-request create for the given
    /// transaction.
    pub fn is_create_for(&self, txid: &str) -> bool {
        matches!(
            self,
            ActionPayload::Iou {
                op: IouOp::Create | IouOp::Split,
                transaction_id: Some(id),
                ..
            } if id == txid
        )
    }
}

/// One rendered fragment of an action's message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMessage {
    pub html: String,
    pub text: String,
    /// Set when the request behind this action was deleted but the thread
    /// must stay visible; the message becomes a placeholder.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_deleted_parent_action: bool,
}

impl ActionMessage {
    /// Plain text fragment rendered identically as html.
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            html: text.clone(),
            text,
            is_deleted_parent_action: false,
        }
    }

    /// The "[Deleted request]" placeholder fragment.
    pub fn deleted_placeholder() -> Self {
        Self {
            html: String::new(),
            text: "[Deleted request]".to_string(),
            is_deleted_parent_action: true,
        }
    }
}

/// An event rendered in a thread: creation, a money movement, an edit, a
/// preview, a workflow transition.
///
/// Ordering invariant: within a report, the `Created` action's timestamp
/// strictly precedes every other action generated alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportAction {
    /// Unique identifier within the report's action map
    pub report_action_id: String,
    /// Report whose thread renders this action
    pub report_id: String,
    /// Type-specific payload
    pub payload: ActionPayload,
    /// Who performed the action
    pub actor_account_id: AccountId,
    /// When the action happened
    pub created: DateTime<Utc>,
    /// Rendered message fragments
    pub message: Vec<ActionMessage>,
    /// Thread spawned from this action, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_report_id: Option<String>,
    /// For report previews: number of live requests in the linked report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_money_request_count: Option<i32>,
    /// Accounts this action is whispered to (empty = visible to all)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub whispered_to_account_ids: Vec<AccountId>,
    /// Document-level optimistic mutation marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_action: Option<PendingAction>,
    /// User-visible errors keyed by millisecond timestamp
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: ErrorBag,
}

impl ReportAction {
    /// Whether the action should count toward last-message previews and
    /// visible-action checks.
    pub fn is_visible(&self) -> bool {
        self.pending_action != Some(PendingAction::Delete)
            && !self
                .message
                .first()
                .map(|m| m.is_deleted_parent_action)
                .unwrap_or(false)
    }
}

// ============================================
// PersonalDetail
// ============================================

/// Display data for an account.
///
/// Synthesized locally when a participant has no entry yet; the
/// `is_optimistic_personal_detail` flag marks the record as
/// not-yet-server-confirmed so later code must not treat it as
/// authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalDetail {
    pub account_id: AccountId,
    pub login: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_optimistic_personal_detail: bool,
}

// ============================================
// Policy
// ============================================

/// Kind of workspace policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    Personal,
    Team,
    Control,
}

impl PolicyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyType::Personal => "personal",
            PolicyType::Team => "team",
            PolicyType::Control => "control",
        }
    }
}

/// The current user's role on a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyRole {
    Admin,
    User,
}

/// How often expense reports on a policy are submitted automatically.
/// `Manual` means harvesting is disabled and someone must press submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoReportingFrequency {
    Instant,
    Weekly,
    Monthly,
    Manual,
}

/// Workspace rules, consumed read-only by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub policy_type: PolicyType,
    /// The current user's role on this policy
    pub role: PolicyRole,
    pub autoreporting_frequency: AutoReportingFrequency,
}

impl Policy {
    /// Whether reports on this policy wait for a person to submit them.
    pub fn needs_manual_submit(&self) -> bool {
        self.autoreporting_frequency == AutoReportingFrequency::Manual
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_stage_commit_rollback() {
        let mut amount = Pending::new(1000i64);
        assert_eq!(*amount.effective(), 1000);

        amount.stage(2500);
        assert_eq!(amount.committed, 1000);
        assert_eq!(*amount.effective(), 2500);

        amount.commit();
        assert_eq!(amount.committed, 2500);
        assert!(amount.staged.is_none());

        amount.stage(99);
        amount.rollback();
        assert_eq!(*amount.effective(), 2500);
    }

    #[test]
    fn test_sign_convention() {
        assert_eq!(SignConvention::PositiveOwed.signed(1000), 1000);
        assert_eq!(SignConvention::NegativeSpend.signed(1000), -1000);
        assert_eq!(ReportType::Expense.sign_convention(), SignConvention::NegativeSpend);
    }

    #[test]
    fn test_pending_serializes_without_empty_staged() {
        let amount = Pending::new(1000i64);
        let value = serde_json::to_value(&amount).unwrap();
        assert_eq!(value, serde_json::json!({ "committed": 1000 }));
    }

    #[test]
    fn test_action_visibility() {
        let mut action = ReportAction {
            report_action_id: "a1".to_string(),
            report_id: "r1".to_string(),
            payload: ActionPayload::Created,
            actor_account_id: 1,
            created: Utc::now(),
            message: vec![ActionMessage::plain("created")],
            child_report_id: None,
            child_money_request_count: None,
            whispered_to_account_ids: vec![],
            pending_action: None,
            errors: BTreeMap::new(),
        };
        assert!(action.is_visible());

        action.pending_action = Some(PendingAction::Delete);
        assert!(!action.is_visible());

        action.pending_action = None;
        action.message = vec![ActionMessage::deleted_placeholder()];
        assert!(!action.is_visible());
    }

    #[test]
    fn test_is_create_for_matches_split_shares() {
        let payload = ActionPayload::Iou {
            op: IouOp::Split,
            amount: 33,
            currency: "USD".to_string(),
            participant_account_ids: vec![1, 2],
            transaction_id: Some("t1".to_string()),
            payment_method: None,
        };
        assert!(payload.is_create_for("t1"));
        assert!(!payload.is_create_for("t2"));
    }
}
