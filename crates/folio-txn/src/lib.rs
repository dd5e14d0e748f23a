//! Two-phase transaction coordinator for folio.
//!
//! A [`Transaction`] collects [`Participant`]s and drives them through one
//! commit:
//!
//! ```text
//! before_commit (join order, late joiners included)
//!   -> sort by sort_key
//!   -> tpc_begin -> commit -> tpc_vote      any failure: abort everyone
//!   -> tpc_finish                           durable; never rolled back
//! ```
//!
//! Participants never hold references into shared state. Every hook receives
//! the caller's context `&mut C`, and participants that appear while
//! before-commit hooks run are queued on the context ([`JoinQueue`]) and
//! drained by the coordinator.

pub mod error;
pub mod participant;
pub mod transaction;

pub use error::TxnError;
pub use participant::{JoinQueue, Participant};
pub use transaction::{Transaction, TxnId, TxnState};
