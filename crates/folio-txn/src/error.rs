use crate::transaction::{TxnId, TxnState};

/// Errors raised by the coordinator itself. Participant failures use the
/// caller's error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxnError {
    #[error("transaction {id} is {state:?}, expected Active")]
    NotActive { id: TxnId, state: TxnState },
}
