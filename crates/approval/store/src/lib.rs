//! Storage abstraction for LedgerFlow approval records
//!
//! The engine persists one [`approval_types::ApprovalRecord`] per
//! workflow stage and mutates it exclusively through guarded
//! conditional updates ([`UpdateGuard`] + [`RecordPatch`]), the
//! discipline that makes decisions and escalations race-safe without
//! retries or cross-record locks.
//!
//! Two adapters:
//! - [`InMemoryApprovalStore`] — deterministic reference implementation,
//!   used by every engine test.
//! - `PostgresApprovalStore` (feature `postgres`) — the transactional
//!   source-of-truth backend.

#![deny(unsafe_code)]

pub mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryApprovalStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresApprovalStore;
pub use traits::{ApprovalStore, PendingFilter, RecordPatch, UpdateGuard};
