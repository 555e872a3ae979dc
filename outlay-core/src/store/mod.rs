//! External store contract and snapshot capture
//!
//! The engine consumes a key-value document store it does not own. This
//! module defines the pieces of that contract the engine relies on:
//!
//! - key construction ([`key`])
//! - the three patch primitives and their merge semantics ([`ops`])
//! - an in-memory reference store with connect/subscribe ([`memory`])
//! - [`Snapshot`], the read-only view of the store injected into every
//!   orchestrator call instead of ambient globals

pub mod key;
pub mod memory;
pub mod ops;

pub use memory::{ChangeCallback, MemoryStore, SubscriptionId};
pub use ops::{merge_values, StoreOp};

use std::collections::BTreeMap;

use crate::types::{
    AccountId, ActionPayload, ChatThread, MoneyReport, PersonalDetail, Policy, ReportAction,
    Transaction,
};

/// Map of action id to action, as stored under `report_actions_<reportID>`.
pub type ActionMap = BTreeMap<String, ReportAction>;

/// Read-only view of the store at one point in time.
///
/// Orchestrators run to completion synchronously against a snapshot;
/// refreshing it (by re-capturing after store callbacks) is the embedding
/// app's job. Missing referenced entities are caller-precondition
/// violations, not recoverable errors.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub chats: BTreeMap<String, ChatThread>,
    pub reports: BTreeMap<String, MoneyReport>,
    pub transactions: BTreeMap<String, Transaction>,
    pub report_actions: BTreeMap<String, ActionMap>,
    pub personal_details: BTreeMap<AccountId, PersonalDetail>,
    pub policies: BTreeMap<String, Policy>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserialize the current contents of a store into a snapshot.
    ///
    /// Documents that fail to deserialize are skipped with a warning; a
    /// half-written document must not take the whole snapshot down.
    pub fn capture(store: &MemoryStore) -> Self {
        let mut snapshot = Snapshot::new();

        for (store_key, value) in store.collection("") {
            if store_key == key::PERSONAL_DETAILS_KEY {
                match serde_json::from_value::<BTreeMap<AccountId, PersonalDetail>>(value.clone())
                {
                    Ok(details) => snapshot.personal_details = details,
                    Err(e) => tracing::warn!(error = %e, "Skipping malformed personal details"),
                }
                continue;
            }

            let Some((prefix, id)) = key::split_key(store_key) else {
                continue;
            };

            let result = match prefix {
                key::CHAT_PREFIX => serde_json::from_value::<ChatThread>(value.clone())
                    .map(|chat| {
                        snapshot.chats.insert(id.to_string(), chat);
                    })
                    .map_err(|e| e.to_string()),
                key::REPORT_PREFIX => serde_json::from_value::<MoneyReport>(value.clone())
                    .map(|report| {
                        snapshot.reports.insert(id.to_string(), report);
                    })
                    .map_err(|e| e.to_string()),
                key::TRANSACTION_PREFIX => serde_json::from_value::<Transaction>(value.clone())
                    .map(|txn| {
                        snapshot.transactions.insert(id.to_string(), txn);
                    })
                    .map_err(|e| e.to_string()),
                key::REPORT_ACTIONS_PREFIX => serde_json::from_value::<ActionMap>(value.clone())
                    .map(|actions| {
                        snapshot.report_actions.insert(id.to_string(), actions);
                    })
                    .map_err(|e| e.to_string()),
                key::POLICY_PREFIX => serde_json::from_value::<Policy>(value.clone())
                    .map(|policy| {
                        snapshot.policies.insert(id.to_string(), policy);
                    })
                    .map_err(|e| e.to_string()),
                // Drafts are transient UI state; the snapshot skips them.
                _ => Ok(()),
            };

            if let Err(e) = result {
                tracing::warn!(key = store_key, error = %e, "Skipping malformed document");
            }
        }

        snapshot
    }

    pub fn chat(&self, report_id: &str) -> Option<&ChatThread> {
        self.chats.get(report_id)
    }

    /// Find the chat whose participant set matches exactly (order-free).
    pub fn chat_by_participants(&self, participants: &[AccountId]) -> Option<&ChatThread> {
        let mut wanted: Vec<AccountId> = participants.to_vec();
        wanted.sort_unstable();
        wanted.dedup();

        self.chats.values().find(|chat| {
            let mut have = chat.participant_account_ids.clone();
            have.sort_unstable();
            have.dedup();
            have == wanted
        })
    }

    pub fn report(&self, report_id: &str) -> Option<&MoneyReport> {
        self.reports.get(report_id)
    }

    pub fn transaction(&self, transaction_id: &str) -> Option<&Transaction> {
        self.transactions.get(transaction_id)
    }

    pub fn actions(&self, report_id: &str) -> Option<&ActionMap> {
        self.report_actions.get(report_id)
    }

    /// The report-preview action in `chat_report_id` that summarizes
    /// `linked_report_id`, if one exists. At most one exists per pair.
    pub fn preview_action(
        &self,
        chat_report_id: &str,
        linked_report_id: &str,
    ) -> Option<&ReportAction> {
        self.actions(chat_report_id)?.values().find(|action| {
            matches!(
                &action.payload,
                ActionPayload::ReportPreview { linked_report_id: linked }
                    if linked == linked_report_id
            )
        })
    }

    /// The money-request create action for a transaction, searched in the
    /// owning report's action map.
    pub fn create_action_for_transaction(
        &self,
        report_id: &str,
        transaction_id: &str,
    ) -> Option<&ReportAction> {
        self.actions(report_id)?
            .values()
            .find(|action| action.payload.is_create_for(transaction_id))
    }

    pub fn personal_detail(&self, account_id: AccountId) -> Option<&PersonalDetail> {
        self.personal_details.get(&account_id)
    }

    pub fn policy(&self, policy_id: &str) -> Option<&Policy> {
        self.policies.get(policy_id)
    }

    /// The policy backing a chat, if the chat names one and it is known.
    pub fn policy_for_chat(&self, chat: &ChatThread) -> Option<&Policy> {
        chat.policy_id.as_deref().and_then(|id| self.policy(id))
    }
}
