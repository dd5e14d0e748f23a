//! Index rebuilds.
//!
//! A rebuild runs in two phases. [`plan`] walks one container's index tree
//! against a snapshot of the container and records what every leaf index
//! should receive; it only reads. [`apply`] then writes each step, following
//! supply links through the [`IndexRegistry`] to whichever index actually
//! stores the records. Splitting the phases lets a supplying index write
//! into an index owned by a different container.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::error::{IndexError, IndexResult};
use crate::ext::{Extensions, SourceItem};
use crate::hash::{ContentResolver, HashIndex};
use crate::index::Index;
use crate::proxy::AsMapping;
use crate::registry::{IndexLocation, IndexRegistry};

/// One leaf write produced by [`plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStep {
    /// `(key, resource path)` pairs for a hash or keyed index.
    Hash {
        location: IndexLocation,
        entries: Vec<(String, String)>,
    },
    /// Replacement entries computed by a dict hook.
    Dict {
        location: IndexLocation,
        entries: BTreeMap<String, Vec<String>>,
    },
}

/// Access to the indexes of every container in a view.
pub trait IndexHost {
    /// Write buffered document changes so content hashes are current.
    fn flush(&mut self) -> IndexResult<()>;

    fn index(&self, location: &IndexLocation) -> Option<&Index>;

    /// The index at `location` for writing, together with the resolver for
    /// the store. Hosts treat this as a modification of the owning container.
    fn index_mut(
        &mut self,
        location: &IndexLocation,
    ) -> IndexResult<(&mut Index, &dyn ContentResolver)>;
}

/// Compute the writes for `index` (rooted at `location`) from `items`.
pub fn plan<V: AsMapping>(
    index: &Index,
    location: IndexLocation,
    items: &[SourceItem<'_, V>],
    extensions: &Extensions<V>,
) -> IndexResult<Vec<UpdateStep>> {
    let mut steps = Vec::new();
    plan_into(index, location, items, extensions, &mut steps)?;
    Ok(steps)
}

fn plan_into<V: AsMapping>(
    index: &Index,
    location: IndexLocation,
    items: &[SourceItem<'_, V>],
    extensions: &Extensions<V>,
    steps: &mut Vec<UpdateStep>,
) -> IndexResult<()> {
    match index {
        Index::Container(container) => {
            for (name, child) in &container.children {
                plan_into(child, location.child(name), items, extensions, steps)?;
            }
        }
        Index::Dict(dict) => {
            if let Some(hook) = &dict.hook {
                let entries = extensions.dict_hook(hook)?.update(dict, items)?;
                steps.push(UpdateStep::Dict { location, entries });
            }
        }
        Index::Hash(_) => {
            let entries = items
                .iter()
                .map(|item| (item.key.to_string(), item.path.clone()))
                .collect();
            steps.push(UpdateStep::Hash { location, entries });
        }
        Index::Keyed(keyed) => {
            let entries = keyed.remap(items, extensions)?;
            steps.push(UpdateStep::Hash { location, entries });
        }
    }
    Ok(())
}

fn hash_at<'h>(host: &'h dyn IndexHost, location: &IndexLocation) -> IndexResult<&'h HashIndex> {
    host.index(location)
        .and_then(Index::as_hash)
        .ok_or_else(|| IndexError::Configuration(format!("no hash index at {location}")))
}

/// Follow supply links from `start` to the index that stores records.
///
/// Returns that index's location and the namespace to write into: the name
/// of the last supplying index on the chain, or `None` if `start` supplies
/// nothing.
pub fn resolve_supply(
    host: &dyn IndexHost,
    registry: &IndexRegistry,
    start: &IndexLocation,
) -> IndexResult<(IndexLocation, Option<String>)> {
    let mut location = start.clone();
    let mut namespace = None;
    let mut visited = BTreeSet::new();
    loop {
        let index = hash_at(host, &location)?;
        let Some(target) = &index.supply else {
            return Ok((location, namespace));
        };
        let name = index.name.clone().ok_or_else(|| {
            IndexError::Configuration(format!(
                "index at {location} supplies '{target}' but has no name"
            ))
        })?;
        if !visited.insert(name.clone()) {
            return Err(IndexError::Configuration(format!(
                "supply chain revisits '{name}'"
            )));
        }
        location = registry
            .get(target)
            .cloned()
            .ok_or_else(|| IndexError::Configuration(format!("no index named '{target}'")))?;
        namespace = Some(name);
    }
}

/// Write planned steps through `host`.
///
/// Either every step lands or none does: each target index is copied before
/// its first write, and the copies are put back if any step fails.
pub fn apply(
    host: &mut dyn IndexHost,
    registry: &IndexRegistry,
    steps: Vec<UpdateStep>,
) -> IndexResult<()> {
    let mut saved = Vec::new();
    let result = apply_steps(host, registry, steps, &mut saved);
    if let Err(e) = &result {
        debug!(error = %e, restored = saved.len(), "index update failed, rolling back");
        for (location, previous) in saved.into_iter().rev() {
            match host.index_mut(&location) {
                Ok((index, _)) => *index = previous,
                Err(restore) => warn!(at = %location, error = %restore, "could not roll back index"),
            }
        }
    }
    result
}

fn save_before_write(
    host: &dyn IndexHost,
    location: &IndexLocation,
    saved: &mut Vec<(IndexLocation, Index)>,
) {
    if saved.iter().any(|(at, _)| at == location) {
        return;
    }
    if let Some(index) = host.index(location) {
        saved.push((location.clone(), index.clone()));
    }
}

fn apply_steps(
    host: &mut dyn IndexHost,
    registry: &IndexRegistry,
    steps: Vec<UpdateStep>,
    saved: &mut Vec<(IndexLocation, Index)>,
) -> IndexResult<()> {
    for step in steps {
        match step {
            UpdateStep::Hash { location, entries } => {
                let (target, namespace) = resolve_supply(&*host, registry, &location)?;
                host.flush()?;
                save_before_write(&*host, &target, saved);
                let (index, resolver) = host.index_mut(&target)?;
                let hash = index.as_hash_mut().ok_or_else(|| {
                    IndexError::Configuration(format!("no hash index at {target}"))
                })?;
                debug!(from = %location, to = %target, namespace = ?namespace, "applying hash update");
                hash.update(&entries, namespace.as_deref(), resolver)?;
            }
            UpdateStep::Dict { location, entries } => {
                save_before_write(&*host, &location, saved);
                let (index, _) = host.index_mut(&location)?;
                match index {
                    Index::Dict(dict) => dict.entries = entries,
                    other => {
                        return Err(IndexError::Configuration(format!(
                            "expected a dict index at {location}, found {}",
                            other.kind()
                        )))
                    }
                }
            }
        }
    }
    Ok(())
}
