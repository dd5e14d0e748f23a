/// A resource taking part in a transaction.
///
/// `C` is the shared context handed to every hook, `E` the caller's error
/// type. All hooks except [`abort`](Participant::abort) default to no-ops.
pub trait Participant<C, E>: Send {
    /// Participants run the two-phase hooks in ascending key order.
    fn sort_key(&self) -> String;

    /// Runs before any two-phase hook; may dirty further resources, which
    /// then join through the context's [`JoinQueue`].
    fn before_commit(&mut self, _ctx: &mut C) -> Result<(), E> {
        Ok(())
    }

    fn tpc_begin(&mut self, _ctx: &mut C) -> Result<(), E> {
        Ok(())
    }

    fn commit(&mut self, _ctx: &mut C) -> Result<(), E> {
        Ok(())
    }

    /// Last chance to refuse; an error aborts every participant.
    fn tpc_vote(&mut self, _ctx: &mut C) -> Result<(), E> {
        Ok(())
    }

    /// The transaction is decided; this must not undo anything.
    fn tpc_finish(&mut self, _ctx: &mut C) -> Result<(), E> {
        Ok(())
    }

    /// Discard whatever this participant prepared. Must not fail.
    fn abort(&mut self, ctx: &mut C);
}

/// Participants waiting to join the running transaction.
pub trait JoinQueue<C, E> {
    fn drain_joins(&mut self) -> Vec<Box<dyn Participant<C, E>>>;
}
