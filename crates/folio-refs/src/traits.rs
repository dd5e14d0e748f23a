//! The [`RefStore`] trait defining the reference storage interface.

use folio_types::ContentHash;

use crate::error::Result;
use crate::names::{branch_from_ref_name, branch_ref_name, HEADS_PREFIX};
use crate::types::{BranchRef, Head};

/// Storage backend for named references.
///
/// Implementations must be thread-safe and make
/// [`compare_and_swap`](RefStore::compare_and_swap) atomic with respect to
/// every other write through the same store.
pub trait RefStore: Send + Sync {
    /// Read a ref by canonical name (e.g. `refs/heads/main`).
    fn read_ref(&self, name: &str) -> Result<Option<ContentHash>>;

    /// Point `name` at `new` only if it currently points at `expected`
    /// (`None` meaning "must not exist yet").
    ///
    /// Returns `Ok(false)` without writing when the current value differs.
    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<ContentHash>,
        new: ContentHash,
    ) -> Result<bool>;

    /// Delete a ref. Returns `Ok(true)` if it existed.
    fn delete_ref(&self, name: &str) -> Result<bool>;

    /// All refs whose canonical name starts with `prefix`, sorted by name.
    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, ContentHash)>>;

    /// Current HEAD, or `None` if it was never set.
    fn head(&self) -> Result<Option<Head>>;

    /// Point HEAD at a branch (which need not exist yet).
    fn set_head(&self, branch: &str) -> Result<()>;

    /// Tip of `branch`, if the branch exists.
    fn branch_tip(&self, branch: &str) -> Result<Option<ContentHash>> {
        self.read_ref(&branch_ref_name(branch))
    }

    /// All branches, sorted by name.
    fn branches(&self) -> Result<Vec<BranchRef>> {
        Ok(self
            .list_refs(HEADS_PREFIX)?
            .into_iter()
            .filter_map(|(name, tip)| {
                branch_from_ref_name(&name).map(|branch| BranchRef::new(branch, tip))
            })
            .collect())
    }
}
