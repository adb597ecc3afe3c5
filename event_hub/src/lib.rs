//! # Event Hub
//!
//! The service side of the game event pipeline. This crate owns the bounded
//! event ledger, routes events to registered handlers, exposes the HTTP
//! ingestion surface and mirrors the ledger into client-side views.
//!
//! ## Core Components
//!
//! - **ledger**: Bounded, newest-first store of normalized events
//! - **handlers**: Event-type to handler registry with synchronous dispatch
//! - **gateway**: Normalizes raw payloads into events, appends, then dispatches
//! - **http**: axum router binding the gateway, ledger and stats to endpoints
//! - **reconciler**: Polling pull-merge of ledger snapshots into a local view
//! - **summary**: On-demand attack summaries, kept off the ingestion path
//!
//! ## Data Flow
//!
//! producer -> gateway -> [ledger append, handler dispatch]; stats are computed
//! on demand over `ledger.snapshot()`. Client views poll the snapshot and
//! stats endpoints independently.

pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod http;
pub mod ledger;
pub mod reconciler;
pub mod summary;

pub use config::*;
pub use error::*;
pub use gateway::*;
pub use handlers::*;
pub use http::{router, AppState};
pub use ledger::*;
pub use reconciler::*;
pub use summary::*;
