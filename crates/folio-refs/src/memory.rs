//! In-memory reference store for testing and ephemeral repositories.
//!
//! [`InMemoryRefStore`] keeps all refs in a `HashMap` behind a `RwLock`.
//! Compare-and-swap holds the write lock for the read and the write, so
//! concurrent writers on different threads observe a single winner.

use std::collections::HashMap;
use std::sync::RwLock;

use folio_types::ContentHash;

use crate::error::{RefError, Result};
use crate::names::{branch_from_ref_name, validate_branch_name};
use crate::traits::RefStore;
use crate::types::Head;

/// An in-memory implementation of [`RefStore`]. Data is lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    refs: RwLock<HashMap<String, ContentHash>>,
    head: RwLock<Option<Head>>,
}

impl InMemoryRefStore {
    /// Create a new empty ref store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> RefError {
    RefError::Poisoned(e.to_string())
}

impl RefStore for InMemoryRefStore {
    fn read_ref(&self, name: &str) -> Result<Option<ContentHash>> {
        let refs = self.refs.read().map_err(poisoned)?;
        Ok(refs.get(name).copied())
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<ContentHash>,
        new: ContentHash,
    ) -> Result<bool> {
        if let Some(branch) = branch_from_ref_name(name) {
            validate_branch_name(branch)?;
        }
        let mut refs = self.refs.write().map_err(poisoned)?;
        if refs.get(name).copied() != expected {
            return Ok(false);
        }
        refs.insert(name.to_string(), new);
        Ok(true)
    }

    fn delete_ref(&self, name: &str) -> Result<bool> {
        if let (Some(Head::Symbolic(current)), Some(branch)) =
            (self.head()?, branch_from_ref_name(name))
        {
            if current == branch {
                return Err(RefError::DeleteCurrentBranch {
                    name: branch.to_string(),
                });
            }
        }
        let mut refs = self.refs.write().map_err(poisoned)?;
        Ok(refs.remove(name).is_some())
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, ContentHash)>> {
        let refs = self.refs.read().map_err(poisoned)?;
        let mut out: Vec<_> = refs
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, hash)| (name.clone(), *hash))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    fn head(&self) -> Result<Option<Head>> {
        Ok(self.head.read().map_err(poisoned)?.clone())
    }

    fn set_head(&self, branch: &str) -> Result<()> {
        validate_branch_name(branch)?;
        *self.head.write().map_err(poisoned)? = Some(Head::Symbolic(branch.to_string()));
        Ok(())
    }
}
