//! Shelf Core - Replica model and reconciliation
//!
//! This crate provides the pieces of the inventory replica that do not touch
//! I/O:
//! - The snapshot aggregate (items, transactions, branding)
//! - A version clock that stamps every local write
//! - A deterministic last-write-wins merge of two snapshots
//! - Inventory queries and edit operations

pub mod clock;
pub mod error;
pub mod inventory;
pub mod merge;
pub mod model;

pub use clock::{Clock, ManualClock, SystemClock, VersionClock};
pub use error::{Error, Result};
pub use inventory::{LowStock, LOW_STOCK_THRESHOLD};
pub use merge::{MergeEngine, MergeReport, TieBreak, UnionStats};
pub use model::{Item, ItemDraft, Snapshot, Stamped, Transaction, TxKind};
