//! Three-way, path-level merge of staging maps.
//!
//! For every path the merge compares *ours* (the workspace), *theirs* (the
//! branch tip written by a concurrent writer) and *base* (the commit both
//! started from):
//!
//! | condition         | result  |
//! |-------------------|---------|
//! | ours == theirs    | ours    |
//! | ours == base      | theirs  |
//! | theirs == base    | ours    |
//! | otherwise         | conflict|
//!
//! A merged map whose files end up below a missing or non-directory parent
//! also reports the offending paths as conflicts.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::path::parent;
use crate::staging::{Staged, StagingMap};

/// Merge `ours` and `theirs` relative to `base`.
pub fn three_way(base: &StagingMap, ours: &StagingMap, theirs: &StagingMap) -> FsResult<StagingMap> {
    let paths: BTreeSet<&String> = base.keys().chain(ours.keys()).chain(theirs.keys()).collect();

    let mut merged = StagingMap::new();
    let mut conflicts = Vec::new();
    for path in paths {
        let (o, t, b) = (ours.get(path), theirs.get(path), base.get(path));
        let resolved = if o == t || t == b {
            o
        } else if o == b {
            t
        } else {
            conflicts.push(path.clone());
            continue;
        };
        if let Some(staged) = resolved {
            merged.insert(path.clone(), *staged);
        }
    }

    for path in merged.keys() {
        let Some(dir) = parent(path) else { continue };
        if !dir.is_empty() && merged.get(dir) != Some(&Staged::Dir) {
            conflicts.push(path.clone());
        }
    }

    if conflicts.is_empty() {
        debug!(paths = merged.len(), "merged concurrent changes");
        Ok(merged)
    } else {
        conflicts.sort();
        conflicts.dedup();
        Err(FsError::Conflict { paths: conflicts })
    }
}
