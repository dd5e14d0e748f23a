use std::path::Path;

use folio_doc::{decode, Container, Node, DOC_SUFFIX};
use folio_fs::{path, repo::DEFAULT_BRANCH, Repository};
use folio_index::{
    ContainerIndex, DictHook, Index, IndexError, Match, Proxied,
};
use folio_txn::Transaction;
use folio_types::ContentHash;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::DbConfig;
use crate::coordinator::{CommitCoordinator, CommitState};
use crate::error::{DbError, DbResult};
use crate::view::ViewState;

/// Split a path into its parent container and entry name.
fn split(path: &str) -> DbResult<(String, String)> {
    let path = path::normalize(path)?;
    if path.is_empty() {
        return Err(DbError::NotFound("the root has no name".to_string()));
    }
    let parent = path::parent(&path).unwrap_or_default().to_string();
    let name = path::file_name(&path).to_string();
    Ok((parent, name))
}

/// A view of one branch of a folio repository.
///
/// Each writer opens its own `Database`; views of the same repository never
/// share state. Changes are buffered until [`save`](Self::save), which
/// rebuilds the indexes of every container they touched and publishes the
/// branch. A save that fails is quarantined on a side branch (see
/// [`CommitCoordinator`]).
pub struct Database {
    config: DbConfig,
    view: ViewState,
    txn: Transaction<ViewState, DbError>,
    coordinator: CommitCoordinator,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("branch", &self.view.branch())
            .field("base", &self.base())
            .field("txn", &self.txn)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

impl Database {
    pub fn open(repo: Repository, config: DbConfig) -> DbResult<Self> {
        let branch = match &config.branch {
            Some(branch) => branch.clone(),
            None => repo.default_branch()?,
        };
        let view = ViewState::open(repo, &branch, config.commit_message.clone())?;
        info!(branch = %branch, entries = view.root.len(), "database opened");
        Ok(Self {
            coordinator: CommitCoordinator::new(config.conflict_prefix.clone()),
            config,
            view,
            txn: Transaction::new(),
        })
    }

    /// A fresh database backed by memory only.
    pub fn in_memory() -> DbResult<Self> {
        Self::open(Repository::in_memory()?, DbConfig::default())
    }

    /// Create a repository at `root` and open it.
    pub fn init_path(root: &Path, config: DbConfig) -> DbResult<Self> {
        let branch = config.branch.as_deref().unwrap_or(DEFAULT_BRANCH);
        let repo = Repository::init(root, branch)?;
        Self::open(repo, config)
    }

    pub fn open_path(root: &Path, config: DbConfig) -> DbResult<Self> {
        Self::open(Repository::open(root)?, config)
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn branch(&self) -> &str {
        self.view.branch()
    }

    /// Commit the view was loaded from or last saved.
    pub fn base(&self) -> Option<ContentHash> {
        self.view.store.workspace().base()
    }

    pub fn repository(&self) -> &Repository {
        self.view.repository()
    }

    pub fn root(&self) -> &Container {
        &self.view.root
    }

    pub fn commit_state(&self) -> CommitState {
        self.coordinator.state()
    }

    /// Branch holding the changeset of the last quarantined save.
    pub fn last_quarantine(&self) -> Option<&str> {
        self.coordinator.last_quarantine()
    }

    pub fn has_changes(&self) -> bool {
        self.view.has_pending_changes()
    }

    // ---------------------------------------------------------------
    // Mapping access
    // ---------------------------------------------------------------

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.view.root.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.view.root.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.view.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.root.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.view.root.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.view.root.keys()
    }

    pub fn insert(&mut self, name: &str, node: impl Into<Node>) -> DbResult<Option<Node>> {
        self.insert_path(name, node)
    }

    pub fn remove(&mut self, name: &str) -> DbResult<bool> {
        self.remove_path(name)
    }

    pub fn get_path(&self, path: &str) -> Option<&Node> {
        let path = path::normalize(path).ok()?;
        self.view.root.node_at(&path)
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.get_path(path).is_some()
    }

    fn container_mut(&mut self, dir: &str) -> DbResult<&mut Container> {
        if self.view.root.container_at(dir).is_none() {
            return Err(match self.view.root.node_at(dir) {
                Some(_) => DbError::NotAContainer(dir.to_string()),
                None => DbError::NotFound(dir.to_string()),
            });
        }
        self.view
            .root
            .container_at_mut(dir)
            .ok_or_else(|| DbError::NotFound(dir.to_string()))
    }

    /// Set the entry at `path`; its parent container must exist.
    pub fn insert_path(&mut self, path: &str, node: impl Into<Node>) -> DbResult<Option<Node>> {
        let (dir, name) = split(path)?;
        let node = node.into();
        let indexed = matches!(&node, Node::Container(_));
        let replaced = self.container_mut(&dir)?.insert(&name, node)?;
        if indexed || matches!(replaced, Some(Node::Container(_))) {
            self.view.rebuild_registry();
        }
        self.view.enlist(&dir);
        Ok(replaced)
    }

    /// Delete the entry at `path`. Returns `false` if there was none.
    pub fn remove_path(&mut self, path: &str) -> DbResult<bool> {
        let (dir, name) = split(path)?;
        let removed = self.container_mut(&dir)?.remove(&name);
        if removed {
            self.view.rebuild_registry();
            self.view.enlist(&dir);
        }
        Ok(removed)
    }

    /// Change the node at `path` in place.
    pub fn modify<R>(&mut self, path: &str, f: impl FnOnce(&mut Node) -> R) -> DbResult<R> {
        let (dir, name) = split(path)?;
        let node = self
            .container_mut(&dir)?
            .get_mut(&name)
            .ok_or_else(|| DbError::NotFound(path.to_string()))?;
        let is_container = matches!(node, Node::Container(_));
        let result = f(node);
        if is_container {
            self.view.rebuild_registry();
            let full = path::join(&dir, &name);
            self.view.enlist(&full);
        } else {
            self.view.enlist(&dir);
        }
        Ok(result)
    }

    // ---------------------------------------------------------------
    // Indexes
    // ---------------------------------------------------------------

    pub fn index(&self, container: &str) -> Option<&Index> {
        self.view.root.container_at(container)?.index()
    }

    /// Give `container` an empty container index unless it has an index.
    pub fn init_index(&mut self, container: &str) -> DbResult<()> {
        let owner = self.container_mut(container)?;
        if owner.index().is_none() {
            owner.set_index(Some(ContainerIndex::new().into()));
            self.view.enlist(container);
        }
        Ok(())
    }

    /// Replace the index of `container`, returning the previous one.
    pub fn set_index(&mut self, container: &str, index: impl Into<Index>) -> DbResult<Option<Index>> {
        let previous = self.container_mut(container)?.set_index(Some(index.into()));
        self.view.rebuild_registry();
        self.view.enlist(container);
        Ok(previous)
    }

    /// Add a named child to the container index of `container`, creating
    /// the container index if there is no index yet.
    pub fn add_subindex(
        &mut self,
        container: &str,
        name: &str,
        index: impl Into<Index>,
    ) -> DbResult<()> {
        self.init_index(container)?;
        let owner = self.container_mut(container)?;
        match owner.index_mut() {
            Some(Index::Container(children)) => {
                children.children.insert(name.to_string(), index.into());
            }
            Some(other) => {
                return Err(IndexError::Configuration(format!(
                    "container '{container}' has a {} index, not a container index",
                    other.kind()
                ))
                .into())
            }
            None => return Err(DbError::NoIndex(container.to_string())),
        }
        self.view.rebuild_registry();
        self.view.enlist(container);
        Ok(())
    }

    fn owned_index(&self, container: &str) -> DbResult<&Index> {
        let owner = self
            .view
            .root
            .container_at(container)
            .ok_or_else(|| DbError::NotFound(container.to_string()))?;
        owner
            .index()
            .ok_or_else(|| DbError::NoIndex(container.to_string()))
    }

    pub fn idx_find(&self, container: &str, key: &str, subindex: Option<&str>) -> DbResult<Vec<Match>> {
        Ok(self.owned_index(container)?.find(key, subindex)?)
    }

    pub fn idx_find_first(
        &self,
        container: &str,
        key: &str,
        subindex: Option<&str>,
    ) -> DbResult<Option<Match>> {
        Ok(self.owned_index(container)?.find_first(key, subindex)?)
    }

    /// Rebuild the index of `container` now, from its current items. The
    /// container still joins the running transaction, so its index is
    /// rebuilt and validated again on save.
    pub fn idx_update(&mut self, container: &str) -> DbResult<()> {
        self.owned_index(container)?;
        self.view.rebuild_index(container)?;
        self.view.enlist(container);
        Ok(())
    }

    pub fn idx_validate(&self, container: &str) -> DbResult<()> {
        Ok(self.owned_index(container)?.validate(&self.view.extensions)?)
    }

    /// Register a key mapper for keyed indexes using
    /// [`KeyMapper::Registered`](folio_index::KeyMapper::Registered).
    pub fn register_key_mapper<F>(&mut self, name: &str, mapper: F)
    where
        F: Fn(&str, Proxied<'_, Node>) -> Option<String> + Send + Sync + 'static,
    {
        self.view.extensions.register_key_mapper(name, mapper);
    }

    pub fn register_dict_hook(&mut self, name: &str, hook: impl DictHook<Node> + 'static) {
        self.view.extensions.register_dict_hook(name, hook);
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// Write buffered changes to the workspace without committing.
    pub fn flush(&mut self) -> DbResult<()> {
        self.view.flush()
    }

    /// Commit the current transaction. If that fails, the changes are
    /// committed to a new quarantine branch instead, the view is reloaded
    /// from this branch's tip, and the original error is returned.
    pub fn save(&mut self) -> DbResult<()> {
        self.coordinator.save(&mut self.txn, &mut self.view)
    }

    /// Drop the running transaction and every buffered change.
    pub fn abort(&mut self) -> DbResult<()> {
        self.txn.abort(&mut self.view);
        self.txn = Transaction::new();
        let branch = self.view.branch().to_string();
        self.view.open_branch(&branch)
    }

    /// Rebind this view to `branch`.
    ///
    /// An existing branch is opened at its tip and buffered changes are
    /// dropped. A new branch is forked from the current base and takes the
    /// buffered changes along.
    pub fn switch(&mut self, branch: &str) -> DbResult<()> {
        if self.repository().branch_tip(branch)?.is_some() {
            self.txn.abort(&mut self.view);
            self.txn = Transaction::new();
            self.view.open_branch(branch)?;
        } else {
            self.view.rebind(branch)?;
        }
        debug!(branch, "switched");
        Ok(())
    }

    /// Content hash of the entry at `path` as currently staged: a
    /// document's file or a container's directory. Flushes first.
    pub fn content_hash(&mut self, path: &str) -> DbResult<ContentHash> {
        let path = path::normalize(path)?;
        self.view.flush()?;
        let node = self
            .view
            .root
            .node_at(&path)
            .ok_or_else(|| DbError::NotFound(path.clone()))?;
        let resource = match node {
            Node::Document(_) => format!("{path}{DOC_SUFFIX}"),
            Node::Container(_) => path,
        };
        Ok(self.view.store.hash(&resource)?)
    }

    /// Decode any stored document by the hex content hash an index
    /// returned, including versions no longer on any branch tip.
    pub fn object_by_hash(&self, hash: &str) -> DbResult<Value> {
        let id: ContentHash = hash.parse().map_err(|e: folio_types::TypeError| DbError::InvalidHash {
            hash: hash.to_string(),
            reason: e.to_string(),
        })?;
        let data = self.view.store.show(&id)?;
        Ok(decode(&data, hash)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use crate::error::FailureClass;
    use folio_doc::Document;
    use folio_index::{HashIndex, IndexUpdateError, KeyedHashIndex};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    fn open(repo: &Repository) -> Database {
        Database::open(repo.clone(), DbConfig::default()).unwrap()
    }

    fn field<'a>(db: &'a Database, path: &str, name: &str) -> Option<&'a Value> {
        db.get_path(path)?.as_document()?.get(name)
    }

    fn set_value(db: &mut Database, path: &str, value: &str) {
        db.modify(path, |node| {
            node.as_document_mut().unwrap().set("value", value);
        })
        .unwrap();
    }

    /// A repository whose main branch holds `a = {"value": "a"}`.
    fn seeded() -> Repository {
        let repo = Repository::in_memory().unwrap();
        let mut db = open(&repo);
        db.insert("a", doc(json!({"value": "a"}))).unwrap();
        db.save().unwrap();
        repo
    }

    // ---------------------------------------------------------------
    // Mapping and persistence
    // ---------------------------------------------------------------

    #[test]
    fn save_then_reopen() {
        let repo = Repository::in_memory().unwrap();
        let mut db = open(&repo);
        db.insert("people", Container::new()).unwrap();
        db.insert_path("people/alice", doc(json!({"id": 1}))).unwrap();
        db.insert("readme", doc(json!({"title": "hi"}))).unwrap();
        assert!(db.has_changes());
        db.save().unwrap();
        assert_eq!(db.commit_state(), CommitState::Committed);

        let db = open(&repo);
        assert_eq!(db.keys().collect::<Vec<_>>(), vec!["people", "readme"]);
        assert_eq!(field(&db, "people/alice", "id"), Some(&json!(1)));
        assert!(!db.has_changes());
    }

    #[test]
    fn path_errors() {
        let mut db = Database::in_memory().unwrap();
        db.insert("leaf", Document::new()).unwrap();
        assert!(matches!(
            db.insert_path("missing/x", Document::new()),
            Err(DbError::NotFound(_))
        ));
        assert!(matches!(
            db.insert_path("leaf/x", Document::new()),
            Err(DbError::NotAContainer(_))
        ));
        assert!(matches!(db.modify("nope", |_| ()), Err(DbError::NotFound(_))));
        assert!(!db.remove("nope").unwrap());
    }

    #[test]
    fn double_flush_after_removal() {
        let repo = seeded();
        let mut db = open(&repo);
        assert!(db.remove("a").unwrap());
        db.flush().unwrap();
        db.flush().unwrap();
        db.save().unwrap();

        let db = open(&repo);
        assert!(!db.contains_key("a"));
    }

    #[test]
    fn abort_discards_changes() {
        let repo = seeded();
        let mut db = open(&repo);
        set_value(&mut db, "a", "changed");
        db.insert("b", Document::new()).unwrap();
        db.abort().unwrap();
        assert_eq!(field(&db, "a", "value"), Some(&json!("a")));
        assert!(!db.contains_key("b"));
        db.save().unwrap();
        assert_eq!(db.base(), repo.branch_tip("main").unwrap());
    }

    #[test]
    fn on_disk_database_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::init_path(dir.path(), DbConfig::default()).unwrap();
        db.insert("a", doc(json!({"value": 1}))).unwrap();
        db.save().unwrap();

        let db = Database::open_path(dir.path(), DbConfig::default()).unwrap();
        assert_eq!(db.branch(), "main");
        assert_eq!(field(&db, "a", "value"), Some(&json!(1)));
    }

    // ---------------------------------------------------------------
    // Concurrent writers
    // ---------------------------------------------------------------

    #[test]
    fn disjoint_writers_both_commit() {
        let repo = seeded();
        let mut one = open(&repo);
        let mut two = open(&repo);
        one.insert("b", Container::new()).unwrap();
        two.modify("a", |node| {
            node.as_document_mut().unwrap().set("other", true);
        })
        .unwrap();
        one.save().unwrap();
        two.save().unwrap();

        let db = open(&repo);
        assert!(db.contains_key("b"));
        assert_eq!(field(&db, "a", "other"), Some(&json!(true)));
        assert!(two.contains_key("b"), "merged view reloads the other writer's changes");
    }

    #[test]
    fn conflicting_writer_is_quarantined() {
        let repo = seeded();
        let mut first = open(&repo);
        let mut second = open(&repo);
        set_value(&mut first, "a", "b");
        set_value(&mut second, "a", "c");

        first.save().unwrap();
        let err = second.save().unwrap_err();
        assert_eq!(err.class(), FailureClass::ConcurrencyConflict);
        assert_eq!(second.commit_state(), CommitState::Conflicted);

        // The view is back on main, reloaded from its tip.
        assert_eq!(second.branch(), "main");
        assert_eq!(field(&second, "a", "value"), Some(&json!("b")));
        assert!(!second.has_changes());

        let branch = second.last_quarantine().unwrap().to_string();
        assert!(branch.starts_with("conflict-"));
        let quarantined = Database::open(repo.clone(), DbConfig::default().with_branch(&branch)).unwrap();
        assert_eq!(field(&quarantined, "a", "value"), Some(&json!("c")));

        let tip = repo.branch_tip(&branch).unwrap().unwrap();
        let main: Vec<_> = repo.history("main", 100).unwrap().into_iter().map(|(id, _)| id).collect();
        assert!(!main.contains(&tip));
    }

    #[test]
    fn concurrent_threads_conflict_once() {
        let repo = seeded();
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = ["b", "c"]
            .into_iter()
            .map(|value| {
                let mut db = open(&repo);
                set_value(&mut db, "a", value);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let result = db.save();
                    (value, db, result)
                })
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners: Vec<_> = outcomes.iter().filter(|(_, _, r)| r.is_ok()).collect();
        let losers: Vec<_> = outcomes.iter().filter(|(_, _, r)| r.is_err()).collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(losers.len(), 1);
        let (won, _, _) = winners[0];
        let (lost, loser, result) = losers[0];
        assert!(result.as_ref().unwrap_err().is_conflict());

        let main = open(&repo);
        assert_eq!(field(&main, "a", "value"), Some(&json!(won)));
        let branch = loser.last_quarantine().unwrap();
        let side = Database::open(repo.clone(), DbConfig::default().with_branch(branch)).unwrap();
        assert_eq!(field(&side, "a", "value"), Some(&json!(lost)));
    }

    #[test]
    fn on_disk_views_of_one_path_quarantine_losers() {
        let dir = tempfile::tempdir().unwrap();
        let mut seed = Database::init_path(dir.path(), DbConfig::default()).unwrap();
        seed.insert("a", doc(json!({"value": "seed"}))).unwrap();
        seed.save().unwrap();

        for round in 0..8 {
            let barrier = Arc::new(Barrier::new(4));
            let handles: Vec<_> = (0..4)
                .map(|writer| {
                    let value = format!("r{round}-w{writer}");
                    let mut db = Database::open_path(dir.path(), DbConfig::default()).unwrap();
                    set_value(&mut db, "a", &value);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        let result = db.save();
                        (value, db, result)
                    })
                })
                .collect();
            let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

            let winners: Vec<_> = outcomes.iter().filter(|(_, _, r)| r.is_ok()).collect();
            assert_eq!(winners.len(), 1, "round {round}: exactly one save may win");
            let main = Database::open_path(dir.path(), DbConfig::default()).unwrap();
            assert_eq!(field(&main, "a", "value"), Some(&json!(winners[0].0)));

            for (value, db, result) in outcomes.iter().filter(|(_, _, r)| r.is_err()) {
                assert!(result.as_ref().unwrap_err().is_conflict());
                let branch = db.last_quarantine().unwrap();
                let side = Database::open_path(dir.path(), DbConfig::default().with_branch(branch))
                    .unwrap();
                assert_eq!(field(&side, "a", "value"), Some(&json!(value)));
            }
        }
    }

    #[test]
    fn custom_conflict_prefix() {
        let repo = seeded();
        let config = DbConfig {
            conflict_prefix: "held".into(),
            ..DbConfig::default()
        };
        let mut first = open(&repo);
        let mut second = Database::open(repo.clone(), config).unwrap();
        set_value(&mut first, "a", "x");
        set_value(&mut second, "a", "y");
        first.save().unwrap();
        assert!(second.save().is_err());
        assert!(second.last_quarantine().unwrap().starts_with("held-"));
    }

    // ---------------------------------------------------------------
    // Indexes
    // ---------------------------------------------------------------

    #[test]
    fn supply_fills_parent_namespace() {
        let repo = Repository::in_memory().unwrap();
        let mut db = open(&repo);
        db.set_index("", HashIndex::new().with_name("root_git").with_inverse(true))
            .unwrap();
        db.insert("child", Container::new()).unwrap();
        db.set_index("child", HashIndex::new().with_name("child").with_supply("root_git"))
            .unwrap();
        db.insert_path("child/x", doc(json!({"v": 1}))).unwrap();
        db.save().unwrap();

        let hash = db.content_hash("child/x").unwrap();
        assert_eq!(db.idx_find("", &hash.to_hex(), None).unwrap(), vec!["x"]);
        let root_index = db.index("").and_then(Index::as_hash).unwrap();
        assert!(root_index.namespace("child").is_some());
        assert!(db.index("child").and_then(Index::as_hash).unwrap().records.is_empty());
        db.idx_validate("").unwrap();
        db.idx_validate("child").unwrap();

        // The container itself is indexed in the direct bucket.
        let dir_hash = db.content_hash("child").unwrap();
        assert_eq!(
            db.idx_find_first("", &dir_hash.to_hex(), None).unwrap().as_deref(),
            Some("child")
        );
    }

    #[test]
    fn unresolvable_supply_fails_save() {
        let repo = Repository::in_memory().unwrap();
        let mut db = open(&repo);
        db.set_index("", HashIndex::new().with_name("orphan").with_supply("nowhere"))
            .unwrap();
        db.insert("a", Document::new()).unwrap();
        let err = db.save().unwrap_err();
        assert!(matches!(err, DbError::Index(IndexError::Configuration(_))));
        assert!(db.last_quarantine().is_none());
        assert!(repo.branch_tip("main").unwrap().is_none());
    }

    #[test]
    fn keyed_index_survives_reopen() {
        let repo = Repository::in_memory().unwrap();
        let mut db = open(&repo);
        db.insert("people", Container::new()).unwrap();
        db.set_index("people", KeyedHashIndex::new(HashIndex::new()).with_field("email"))
            .unwrap();
        db.insert_path("people/alice", doc(json!({"email": "alice@example.org", "age": 30})))
            .unwrap();
        db.insert_path("people/bob", doc(json!({"email": "bob@example.org"})))
            .unwrap();
        db.insert_path("people/anon", doc(json!({"age": 5}))).unwrap();
        db.save().unwrap();

        let db = open(&repo);
        let hash = db
            .idx_find_first("people", "alice@example.org", None)
            .unwrap()
            .unwrap();
        assert_eq!(
            db.object_by_hash(&hash).unwrap(),
            json!({"email": "alice@example.org", "age": 30})
        );
        assert!(db.idx_find("people", "nobody", None).unwrap().is_empty());
        assert!(matches!(db.idx_find("", "x", None), Err(DbError::NoIndex(_))));
    }

    #[test]
    fn object_by_hash_reads_old_versions() {
        let repo = seeded();
        let mut db = open(&repo);
        let old = db.content_hash("a").unwrap();
        set_value(&mut db, "a", "new");
        db.save().unwrap();
        assert_eq!(db.object_by_hash(&old.to_hex()).unwrap(), json!({"value": "a"}));
        assert!(matches!(
            db.object_by_hash("not-hex"),
            Err(DbError::InvalidHash { .. })
        ));
    }

    #[test]
    fn duplicate_keys_abort_the_save() {
        let repo = Repository::in_memory().unwrap();
        let mut db = open(&repo);
        db.insert("people", Container::new()).unwrap();
        db.set_index("people", KeyedHashIndex::new(HashIndex::new()))
            .unwrap();
        db.insert_path("people/a", doc(json!({"id": 7, "n": 1}))).unwrap();
        db.insert_path("people/b", doc(json!({"id": 7, "n": 2}))).unwrap();

        let err = db.save().unwrap_err();
        assert!(matches!(
            err,
            DbError::Index(IndexError::Duplicate(IndexUpdateError { ref key, .. })) if key == "7"
        ));
        // The quarantine attempt fails the same way; nothing was published.
        assert!(db.last_quarantine().is_none());
        assert!(repo.branches().unwrap().is_empty());
        assert_eq!(db.branch(), "main");
        assert!(db.is_empty());
    }

    #[test]
    fn subindexes_and_registered_mapper() {
        let mut db = Database::in_memory().unwrap();
        db.register_key_mapper("shout", |key, _| Some(key.to_uppercase()));
        db.insert("docs", Container::new()).unwrap();
        db.add_subindex("docs", "by_name", HashIndex::new()).unwrap();
        db.add_subindex(
            "docs",
            "shouted",
            KeyedHashIndex::new(HashIndex::new()).with_mapper("shout"),
        )
        .unwrap();
        db.insert_path("docs/x", doc(json!({}))).unwrap();
        db.save().unwrap();

        assert_eq!(db.idx_find("docs", "x", Some("by_name")).unwrap().len(), 1);
        assert_eq!(db.idx_find("docs", "X", Some("shouted")).unwrap().len(), 1);
        assert!(db.idx_find("docs", "X", Some("by_name")).unwrap().is_empty());
        assert!(matches!(
            db.idx_find("docs", "x", Some("missing")),
            Err(DbError::Index(IndexError::NoSuchSubindex(_)))
        ));

        db.set_index("docs", HashIndex::new()).unwrap();
        assert!(matches!(
            db.add_subindex("docs", "more", HashIndex::new()),
            Err(DbError::Index(IndexError::Configuration(_)))
        ));
    }

    #[test]
    fn explicit_idx_update_runs_before_save() {
        let mut db = Database::in_memory().unwrap();
        db.insert("c", Container::new()).unwrap();
        db.set_index("c", HashIndex::new()).unwrap();
        db.insert_path("c/x", doc(json!({"v": 1}))).unwrap();
        assert!(db.idx_find("c", "x", None).unwrap().is_empty());
        db.idx_update("c").unwrap();
        assert_eq!(db.idx_find("c", "x", None).unwrap().len(), 1);
        db.save().unwrap();
        assert_eq!(db.idx_find("c", "x", None).unwrap().len(), 1);
    }

    #[test]
    fn failed_idx_update_leaves_container_index_unchanged() {
        let mut db = Database::in_memory().unwrap();
        db.insert("c", Container::new()).unwrap();
        db.add_subindex("c", "a_plain", HashIndex::new()).unwrap();
        db.add_subindex("c", "b_keyed", KeyedHashIndex::new(HashIndex::new()))
            .unwrap();
        db.insert_path("c/x", doc(json!({"id": 1}))).unwrap();
        db.insert_path("c/y", doc(json!({"id": 1}))).unwrap();
        let before = db.index("c").cloned();

        let err = db.idx_update("c").unwrap_err();
        assert!(matches!(err, DbError::Index(IndexError::Duplicate(_))));
        assert_eq!(db.index("c").cloned(), before);
        assert!(db.idx_find("c", "x", Some("a_plain")).unwrap().is_empty());

        // Fixing the data lets the next attempt through.
        db.modify("c/y", |node| {
            node.as_document_mut().unwrap().set("id", 2);
        })
        .unwrap();
        db.idx_update("c").unwrap();
        assert_eq!(db.idx_find("c", "2", Some("b_keyed")).unwrap().len(), 1);
    }

    // ---------------------------------------------------------------
    // Branches
    // ---------------------------------------------------------------

    #[test]
    fn switch_to_new_branch_carries_changes() {
        let repo = seeded();
        let mut db = open(&repo);
        set_value(&mut db, "a", "draft");
        db.switch("drafts").unwrap();
        db.save().unwrap();
        assert_eq!(db.branch(), "drafts");

        let main = open(&repo);
        assert_eq!(field(&main, "a", "value"), Some(&json!("a")));
        db.switch("main").unwrap();
        assert_eq!(field(&db, "a", "value"), Some(&json!("a")));
        db.switch("drafts").unwrap();
        assert_eq!(field(&db, "a", "value"), Some(&json!("draft")));
    }
}
