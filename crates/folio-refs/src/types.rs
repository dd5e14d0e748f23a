use serde::{Deserialize, Serialize};
use folio_types::ContentHash;

use crate::names::branch_ref_name;

/// A branch and the commit at its tip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    pub name: String,
    pub tip: ContentHash,
}

impl BranchRef {
    pub fn new(name: impl Into<String>, tip: ContentHash) -> Self {
        Self {
            name: name.into(),
            tip,
        }
    }

    /// `refs/heads/<name>`.
    pub fn canonical_name(&self) -> String {
        branch_ref_name(&self.name)
    }
}

/// The state of HEAD: either symbolic (naming a branch) or detached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Head {
    Symbolic(String),
    Detached(ContentHash),
}

impl Head {
    /// Branch named by a symbolic HEAD.
    pub fn branch(&self) -> Option<&str> {
        match self {
            Head::Symbolic(name) => Some(name),
            Head::Detached(_) => None,
        }
    }
}
