//! # outlay-core
//!
//! Core library for outlay - the optimistic mutation engine behind the
//! money-request workflows of an expense-management chat client.
//!
//! This library provides:
//! - The canonical entity model (chats, money reports, transactions,
//!   report actions, personal details)
//! - Pure entity builders and aggregation rules
//! - Scenario orchestrators for every money operation
//! - The three-phase (apply/confirm/reject) patch protocol against an
//!   external key-value store
//!
//! ## Architecture
//!
//! A user action flows through one scenario orchestrator:
//!
//! ```text
//! ┌──────────┐    ┌──────────────────┐    ┌───────────────────┐
//! │ Snapshot │ ─► │   Orchestrator   │ ─► │ Command + triad   │
//! │ (store)  │    │ resolve → build  │    │ optimistic/       │
//! └──────────┘    │ → aggregate →    │    │ success/failure   │
//!                 │ assemble patches │    └───────────────────┘
//!                 └──────────────────┘
//! ```
//!
//! The engine never owns storage or transport: it reads an injected
//! [`store::Snapshot`], computes next-values, and emits one command plus
//! three ordered patch lists through the [`dispatch`] interfaces. Exactly
//! one of success/failure eventually applies per command, or neither,
//! which the optimistic state must tolerate indefinitely.
//!
//! ## Example
//!
//! ```rust,no_run
//! use outlay_core::{Config, MemoryStore, Snapshot};
//! use outlay_core::dispatch::{NullNotifier, QueueDispatcher};
//! use outlay_core::scenarios::{self, MoneyRequest, Participant, ScenarioContext};
//!
//! let config = Config::load().expect("failed to load config");
//! let store = MemoryStore::new();
//! let snapshot = Snapshot::capture(&store);
//!
//! let ctx = ScenarioContext::new(&snapshot, &config.session);
//! let outcome = scenarios::request_money(
//!     &ctx,
//!     &MoneyRequest {
//!         participant: Participant { account_id: 2, login: "pat@example.com".into() },
//!         amount: 1000,
//!         currency: "USD".into(),
//!         created: chrono::Utc::now(),
//!         details: Default::default(),
//!         receipt_source: None,
//!         chat_report_id: None,
//!         draft_transaction_id: None,
//!     },
//! )
//! .expect("snapshot satisfies the preconditions");
//!
//! let mut dispatcher = QueueDispatcher::new(config.dispatch.max_queued_commands);
//! let mut notifier = NullNotifier;
//! scenarios::dispatch_scenario(&outcome, &mut dispatcher, &mut notifier).unwrap();
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use patch::PatchSet;
pub use store::{MemoryStore, Snapshot, StoreOp};
pub use types::*;

// Public modules
pub mod aggregate;
pub mod builders;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod patch;
pub mod scenarios;
pub mod store;
pub mod types;
