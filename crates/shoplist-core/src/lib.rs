//! # Shoplist Core
//!
//! Core functionality for Shoplist - a group shopping list kept in a remote
//! spreadsheet and driven from a chat.
//!
//! ## Laws (Compiler Enforced)
//!
//! - No `unwrap()` - returns `Result` instead
//! - No `expect()` - returns `Result` instead
//! - No `panic!()` - returns `Result` instead
//! - No `unsafe` - safe Rust only
//!
//! ## Layout
//!
//! - [`ledger`]: the item ledger over a [`backend::LedgerBackend`]
//! - [`projection`]: pending-items view derived from a ledger snapshot
//! - [`session`]: per-user add-item conversation state
//! - [`completion`]: "mark done" protocol
//! - [`gateway`] / [`dispatch`]: chat boundary and event routing
//!
//! ## Deployment constraint
//!
//! The remote table has no transactions or locks. Item ids come from a
//! process-local monotonic clock ([`ids::ClockIdGenerator`]), so exactly one
//! writer process may serve a given ledger.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod clock;
pub mod completion;
pub mod dispatch;
mod error;
pub mod gateway;
pub mod ids;
pub mod item;
pub mod ledger;
pub mod projection;
pub mod row;
pub mod session;
pub mod token;

pub use backend::{CellAddress, Column, LedgerBackend, MemoryBackend};
#[cfg(any(test, feature = "test-util"))]
pub use clock::FixedClock;
pub use clock::{Clock, SystemClock};
pub use completion::{complete, CompletionOutcome};
pub use dispatch::{AccessPolicy, BotCommand, Dispatcher, DispatcherOptions};
pub use error::{Error, Result};
pub use gateway::{ChatGateway, ChatId, Control, InboundEvent, Markup, MessageRef, Notice};
pub use ids::{ClockIdGenerator, IdGenerator};
pub use item::{Item, ItemId, UserId};
pub use ledger::{LedgerSnapshot, LedgerStore, MarkOutcome, SchemaDriftPolicy, SchemaStatus};
pub use projection::{
    project, project_snapshot, ActionableEntry, ListState, ListView, ProjectionOptions,
};
pub use row::{RowCodec, RowError, DEFAULT_TIMESTAMP_FORMAT, HEADER};
pub use session::{Action, Input, SessionState, SessionStore, MENU_LABELS};
pub use token::ActionToken;
