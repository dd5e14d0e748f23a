use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error};

use crate::error::TxnError;
use crate::participant::{JoinQueue, Participant};

pub type TxnId = u64;

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxnState {
    #[default]
    Active,
    Committing,
    Committed,
    Aborted,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Begin,
    Commit,
    Vote,
}

/// A single unit of work over a set of participants.
pub struct Transaction<C, E> {
    id: TxnId,
    state: TxnState,
    participants: Vec<Box<dyn Participant<C, E>>>,
}

impl<C, E> fmt::Debug for Transaction<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("participants", &self.participants.len())
            .finish()
    }
}

impl<C, E> Default for Transaction<C, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, E> Transaction<C, E> {
    pub fn new() -> Self {
        Self {
            id: NEXT_TXN_ID.fetch_add(1, Ordering::Relaxed),
            state: TxnState::Active,
            participants: Vec::new(),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn state(&self) -> TxnState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TxnState::Active
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Add a participant. Only an active transaction accepts joins.
    pub fn join(&mut self, participant: Box<dyn Participant<C, E>>) -> Result<(), TxnError> {
        if self.state != TxnState::Active {
            return Err(TxnError::NotActive {
                id: self.id,
                state: self.state,
            });
        }
        debug!(txn = self.id, participant = %participant.sort_key(), "joined");
        self.participants.push(participant);
        Ok(())
    }
}

impl<C, E> Transaction<C, E>
where
    C: JoinQueue<C, E>,
    E: From<TxnError> + fmt::Display,
{
    /// Run the full commit protocol. On error every participant has been
    /// aborted and the transaction is `Aborted`, except for failures in
    /// `tpc_finish`, which leave it `Committed`.
    pub fn commit(&mut self, ctx: &mut C) -> Result<(), E> {
        if self.state != TxnState::Active {
            return Err(TxnError::NotActive {
                id: self.id,
                state: self.state,
            }
            .into());
        }
        self.state = TxnState::Committing;

        self.participants.extend(ctx.drain_joins());
        let mut next = 0;
        while next < self.participants.len() {
            if let Err(e) = self.participants[next].before_commit(ctx) {
                self.fail(ctx, "before_commit", &e);
                return Err(e);
            }
            self.participants.extend(ctx.drain_joins());
            next += 1;
        }

        self.participants.sort_by_key(|p| p.sort_key());
        for phase in [Phase::Begin, Phase::Commit, Phase::Vote] {
            for index in 0..self.participants.len() {
                let participant = &mut self.participants[index];
                let result = match phase {
                    Phase::Begin => participant.tpc_begin(ctx),
                    Phase::Commit => participant.commit(ctx),
                    Phase::Vote => participant.tpc_vote(ctx),
                };
                if let Err(e) = result {
                    let stage = match phase {
                        Phase::Begin => "tpc_begin",
                        Phase::Commit => "commit",
                        Phase::Vote => "tpc_vote",
                    };
                    self.fail(ctx, stage, &e);
                    return Err(e);
                }
            }
        }

        self.state = TxnState::Committed;
        let mut first_error = None;
        for participant in &mut self.participants {
            if let Err(e) = participant.tpc_finish(ctx) {
                error!(
                    txn = self.id,
                    participant = %participant.sort_key(),
                    error = %e,
                    "tpc_finish failed after the transaction was decided"
                );
                first_error.get_or_insert(e);
            }
        }
        self.participants.clear();
        debug!(txn = self.id, "committed");
        first_error.map_or(Ok(()), Err)
    }

    /// Abort every participant, including ones still queued on the context.
    /// Aborting a finished transaction is a no-op.
    pub fn abort(&mut self, ctx: &mut C) {
        if matches!(self.state, TxnState::Committed | TxnState::Aborted) {
            return;
        }
        self.participants.extend(ctx.drain_joins());
        for participant in &mut self.participants {
            participant.abort(ctx);
        }
        self.participants.clear();
        self.state = TxnState::Aborted;
        debug!(txn = self.id, "aborted");
    }

    fn fail(&mut self, ctx: &mut C, stage: &str, e: &E) {
        debug!(txn = self.id, stage, error = %e, "commit failed, aborting participants");
        self.abort(ctx);
    }
}
