//! Outbound command dispatch
//!
//! A scenario ends by emitting exactly one named command with a flat
//! parameter bag plus its patch triad. The transport behind the
//! [`CommandDispatcher`] trait owns queuing, retry and offline behavior;
//! dispatch is fire-and-forget and the engine has no cancellation hook,
//! only compensating commands issued later.
//!
//! Commands are a discriminated union with one strongly-typed parameter
//! record per scenario. The wire surface is `name()` plus the flattened
//! `params()` bag; names must match the server contract bit-exactly.
//! Nested structures (the split share list) are serialized to a JSON
//! string field before they enter the bag.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::patch::PatchSet;
use crate::types::AccountId;

// ============================================
// Parameter records
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMoneyParams {
    pub amount: i64,
    pub currency: String,
    pub comment: String,
    pub created: DateTime<Utc>,
    pub merchant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub billable: bool,
    pub payer_account_id: AccountId,
    pub chat_report_id: String,
    pub iou_report_id: String,
    pub transaction_id: String,
    pub report_action_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_chat_report_action_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_iou_report_action_id: Option<String>,
    pub report_preview_report_action_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_source: Option<String>,
}

/// One participant's share inside the serialized `splits` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitShare {
    pub account_id: AccountId,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iou_report_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitBillParams {
    pub amount: i64,
    pub currency: String,
    pub comment: String,
    pub created: DateTime<Utc>,
    pub merchant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub chat_report_id: String,
    pub transaction_id: String,
    pub report_action_id: String,
    /// JSON-serialized [`SplitShare`] list; the transport bag carries only
    /// primitives
    pub splits: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMoneyParams {
    pub amount: i64,
    pub currency: String,
    pub comment: String,
    pub recipient_account_id: AccountId,
    pub chat_report_id: String,
    pub iou_report_id: String,
    pub transaction_id: String,
    pub report_action_id: String,
    pub report_preview_report_action_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMoneyRequestParams {
    pub transaction_id: String,
    pub report_action_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAmountParams {
    pub transaction_id: String,
    pub report_action_id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDateParams {
    pub transaction_id: String,
    pub report_action_id: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDescriptionParams {
    pub transaction_id: String,
    pub report_action_id: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMoneyRequestParams {
    pub transaction_id: String,
    pub report_action_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReportParams {
    pub report_id: String,
    pub report_action_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveMoneyRequestParams {
    pub report_id: String,
    pub report_action_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayMoneyRequestParams {
    pub report_id: String,
    pub chat_report_id: String,
    pub report_action_id: String,
}

// ============================================
// Command union
// ============================================

/// One outbound server command per scenario.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    RequestMoney(RequestMoneyParams),
    SplitBill(SplitBillParams),
    SendMoneyElsewhere(SendMoneyParams),
    SendMoneyWithWallet(SendMoneyParams),
    EditMoneyRequest(EditMoneyRequestParams),
    UpdateMoneyRequestAmount(UpdateAmountParams),
    UpdateMoneyRequestDate(UpdateDateParams),
    UpdateMoneyRequestDescription(UpdateDescriptionParams),
    DeleteMoneyRequest(DeleteMoneyRequestParams),
    SubmitReport(SubmitReportParams),
    ApproveMoneyRequest(ApproveMoneyRequestParams),
    PayMoneyRequest(PayMoneyRequestParams),
    PayMoneyRequestWithWallet(PayMoneyRequestParams),
}

impl Command {
    /// The server command name; part of the wire contract.
    pub fn name(&self) -> &'static str {
        match self {
            Command::RequestMoney(_) => "RequestMoney",
            Command::SplitBill(_) => "SplitBill",
            Command::SendMoneyElsewhere(_) => "SendMoneyElsewhere",
            Command::SendMoneyWithWallet(_) => "SendMoneyWithWallet",
            Command::EditMoneyRequest(_) => "EditMoneyRequest",
            Command::UpdateMoneyRequestAmount(_) => "UpdateMoneyRequestAmount",
            Command::UpdateMoneyRequestDate(_) => "UpdateMoneyRequestDate",
            Command::UpdateMoneyRequestDescription(_) => "UpdateMoneyRequestDescription",
            Command::DeleteMoneyRequest(_) => "DeleteMoneyRequest",
            Command::SubmitReport(_) => "SubmitReport",
            Command::ApproveMoneyRequest(_) => "ApproveMoneyRequest",
            Command::PayMoneyRequest(_) => "PayMoneyRequest",
            Command::PayMoneyRequestWithWallet(_) => "PayMoneyRequestWithWallet",
        }
    }

    /// Flatten the typed record into the transport parameter bag. Every
    /// value is a JSON primitive; nested structures were serialized to
    /// strings before they entered the record.
    pub fn params(&self) -> Map<String, Value> {
        let value = match self {
            Command::RequestMoney(p) => serde_json::to_value(p),
            Command::SplitBill(p) => serde_json::to_value(p),
            Command::SendMoneyElsewhere(p) | Command::SendMoneyWithWallet(p) => {
                serde_json::to_value(p)
            }
            Command::EditMoneyRequest(p) => serde_json::to_value(p),
            Command::UpdateMoneyRequestAmount(p) => serde_json::to_value(p),
            Command::UpdateMoneyRequestDate(p) => serde_json::to_value(p),
            Command::UpdateMoneyRequestDescription(p) => serde_json::to_value(p),
            Command::DeleteMoneyRequest(p) => serde_json::to_value(p),
            Command::SubmitReport(p) => serde_json::to_value(p),
            Command::ApproveMoneyRequest(p) => serde_json::to_value(p),
            Command::PayMoneyRequest(p) | Command::PayMoneyRequestWithWallet(p) => {
                serde_json::to_value(p)
            }
        };

        match value.expect("parameter serialization is infallible") {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

/// Serialize a split share list for the `splits` bag field.
pub fn serialize_splits(shares: &[SplitShare]) -> String {
    serde_json::to_string(shares).expect("share serialization is infallible")
}

// ============================================
// Dispatch traits
// ============================================

/// External transport the engine hands commands to. Implementations own
/// queuing, retry/backoff and offline behavior.
pub trait CommandDispatcher {
    fn write(&mut self, command: &Command, patches: &PatchSet) -> Result<()>;
}

/// Local side-channel informing other subsystems (sound, badge) that an
/// action was appended optimistically.
pub trait NotificationSink {
    fn notify_new_action(&mut self, report_id: &str, actor_account_id: AccountId);
}

/// A sink that ignores notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl NotificationSink for NullNotifier {
    fn notify_new_action(&mut self, _report_id: &str, _actor_account_id: AccountId) {}
}

/// A sink that records notifications; used by tests and debugging.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    pub notified: Vec<(String, AccountId)>,
}

impl NotificationSink for RecordingNotifier {
    fn notify_new_action(&mut self, report_id: &str, actor_account_id: AccountId) {
        self.notified.push((report_id.to_string(), actor_account_id));
    }
}

// ============================================
// Queue dispatcher
// ============================================

/// A dispatched command waiting for a transport to drain it.
#[derive(Debug, Clone)]
pub struct QueuedCommand {
    pub name: &'static str,
    pub params: Map<String, Value>,
    pub patches: PatchSet,
}

/// Dispatch statistics for observability.
#[derive(Debug, Default, Clone, Copy)]
pub struct DispatchStats {
    /// Commands accepted into the queue
    pub queued: usize,
    /// Commands rejected because the queue was full
    pub dropped: usize,
}

/// In-memory bounded command queue implementing [`CommandDispatcher`].
///
/// Embedders drain it into their real transport; tests inspect it
/// directly.
pub struct QueueDispatcher {
    queue: VecDeque<QueuedCommand>,
    capacity: usize,
    stats: DispatchStats,
}

impl QueueDispatcher {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity: capacity.max(1),
            stats: DispatchStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Remove and return every queued command in dispatch order.
    pub fn drain(&mut self) -> Vec<QueuedCommand> {
        self.queue.drain(..).collect()
    }

    /// Peek at the most recently queued command.
    pub fn last(&self) -> Option<&QueuedCommand> {
        self.queue.back()
    }
}

impl CommandDispatcher for QueueDispatcher {
    fn write(&mut self, command: &Command, patches: &PatchSet) -> Result<()> {
        if self.queue.len() >= self.capacity {
            self.stats.dropped += 1;
            return Err(Error::QueueFull {
                capacity: self.capacity,
            });
        }

        tracing::debug!(
            command = command.name(),
            optimistic_ops = patches.optimistic.len(),
            "Queued outbound command"
        );
        self.queue.push_back(QueuedCommand {
            name: command.name(),
            params: command.params(),
            patches: patches.clone(),
        });
        self.stats.queued += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_command() -> Command {
        Command::DeleteMoneyRequest(DeleteMoneyRequestParams {
            transaction_id: "t1".to_string(),
            report_action_id: "a1".to_string(),
        })
    }

    #[test]
    fn test_command_names_match_server_contract() {
        assert_eq!(sample_command().name(), "DeleteMoneyRequest");
        assert_eq!(
            Command::PayMoneyRequestWithWallet(PayMoneyRequestParams {
                report_id: "r".to_string(),
                chat_report_id: "c".to_string(),
                report_action_id: "a".to_string(),
            })
            .name(),
            "PayMoneyRequestWithWallet"
        );
    }

    #[test]
    fn test_params_are_flat_primitives() {
        let command = Command::SplitBill(SplitBillParams {
            amount: 100,
            currency: "USD".to_string(),
            comment: String::new(),
            created: Utc::now(),
            merchant: "cafe".to_string(),
            category: None,
            tag: None,
            chat_report_id: "c1".to_string(),
            transaction_id: "t1".to_string(),
            report_action_id: "a1".to_string(),
            splits: serialize_splits(&[SplitShare {
                account_id: 2,
                amount: 33,
                iou_report_id: None,
                transaction_id: None,
            }]),
        });

        for (name, value) in command.params() {
            assert!(
                !value.is_object() && !value.is_array(),
                "param {} is not a primitive: {}",
                name,
                value
            );
        }
    }

    #[test]
    fn test_params_use_wire_field_names() {
        let params = sample_command().params();
        assert!(params.contains_key("transactionId"));
        assert!(params.contains_key("reportActionId"));
    }

    #[test]
    fn test_queue_respects_capacity() {
        let mut dispatcher = QueueDispatcher::new(1);
        let patches = PatchSet::new();

        assert!(dispatcher.write(&sample_command(), &patches).is_ok());
        assert!(dispatcher.write(&sample_command(), &patches).is_err());

        let stats = dispatcher.stats();
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.dropped, 1);

        dispatcher.drain();
        assert!(dispatcher.write(&sample_command(), &patches).is_ok());
    }

    #[test]
    fn test_serialize_splits_roundtrip() {
        let shares = vec![
            SplitShare {
                account_id: 2,
                amount: 33,
                iou_report_id: Some("r1".to_string()),
                transaction_id: Some("t1".to_string()),
            },
            SplitShare {
                account_id: 3,
                amount: 33,
                iou_report_id: None,
                transaction_id: None,
            },
        ];
        let encoded = serialize_splits(&shares);
        let decoded: Vec<SplitShare> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, shares);
    }
}
