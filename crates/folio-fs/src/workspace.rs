//! A writer's view of one branch.

use folio_refs::{branch_ref_name, validate_branch_name};
use folio_store::{Blob, CommitObject};
use folio_types::ContentHash;
use tracing::{debug, info};

use crate::error::{FsError, FsResult};
use crate::merge;
use crate::path::{self, normalize};
use crate::repo::Repository;
use crate::staging::{flatten, Staged, StagingMap, TreeBuilder};

/// How many times [`Workspace::finish`] re-merges before giving up on a
/// branch that keeps moving.
pub const MAX_PUBLISH_ATTEMPTS: usize = 16;

/// A commit object that has been written but not yet published on a branch.
#[derive(Debug, Clone)]
pub struct PreparedCommit {
    commit: ContentHash,
    expected: Option<ContentHash>,
    result: StagingMap,
    merged: bool,
    message: String,
}

impl PreparedCommit {
    pub fn commit_id(&self) -> ContentHash {
        self.commit
    }

    /// `true` if concurrent changes were merged in.
    pub fn merged(&self) -> bool {
        self.merged
    }
}

/// Outcome of a successful [`Workspace::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Published {
    pub commit: ContentHash,
    /// The branch had moved and the workspace now also holds the other
    /// writer's changes.
    pub merged: bool,
}

/// A mutable view of a branch, opened at a base commit.
///
/// All mutations are staged in memory; file contents are written to the
/// object store immediately (objects are immutable and unreferenced objects
/// are harmless), trees and the commit only when committing.
#[derive(Debug, Clone)]
pub struct Workspace {
    repo: Repository,
    branch: String,
    base: Option<ContentHash>,
    base_map: StagingMap,
    staging: StagingMap,
}

fn load_map(repo: &Repository, commit: Option<ContentHash>) -> FsResult<StagingMap> {
    match commit {
        Some(id) => {
            let commit = repo.read_commit(&id)?;
            flatten(repo.store(), &commit.tree)
        }
        None => Ok(StagingMap::new()),
    }
}

impl Workspace {
    /// Open `branch` at its current tip. A branch that does not exist yet
    /// opens empty and is created by the first commit.
    pub fn open(repo: Repository, branch: &str) -> FsResult<Self> {
        validate_branch_name(branch)?;
        let base = repo.branch_tip(branch)?;
        let base_map = load_map(&repo, base)?;
        debug!(branch, base = ?base.map(|b| b.short_hex()), "workspace opened");
        Ok(Self {
            repo,
            branch: branch.to_string(),
            base,
            staging: base_map.clone(),
            base_map,
        })
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Commit this workspace was opened at (or last published).
    pub fn base(&self) -> Option<ContentHash> {
        self.base
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// `true` if anything is staged relative to the base.
    pub fn has_changes(&self) -> bool {
        self.staging != self.base_map
    }

    fn entry(&self, path: &str) -> Option<Staged> {
        if path.is_empty() {
            Some(Staged::Dir)
        } else {
            self.staging.get(path).copied()
        }
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    pub fn exists(&self, path: &str) -> FsResult<bool> {
        Ok(self.entry(&normalize(path)?).is_some())
    }

    pub fn is_dir(&self, path: &str) -> FsResult<bool> {
        Ok(matches!(self.entry(&normalize(path)?), Some(Staged::Dir)))
    }

    pub fn read(&self, path: &str) -> FsResult<Vec<u8>> {
        let path = normalize(path)?;
        match self.entry(&path) {
            Some(Staged::File(id)) => self.repo.show(&id),
            Some(Staged::Dir) => Err(FsError::IsADirectory(path)),
            None => Err(FsError::NotFound(path)),
        }
    }

    /// Names of the direct children of a directory, sorted.
    pub fn list(&self, dir: &str) -> FsResult<Vec<String>> {
        let dir = normalize(dir)?;
        match self.entry(&dir) {
            Some(Staged::Dir) => {}
            Some(Staged::File(_)) => return Err(FsError::NotADirectory(dir)),
            None => return Err(FsError::NotFound(dir)),
        }
        Ok(self
            .staging
            .keys()
            .filter(|p| path::parent(p) == Some(dir.as_str()))
            .map(|p| path::file_name(p).to_string())
            .collect())
    }

    /// Content hash of a path: the blob id of a file, or the id the tree of
    /// a directory would have if committed now.
    pub fn hash(&self, path: &str) -> FsResult<ContentHash> {
        let path = normalize(path)?;
        match self.entry(&path) {
            Some(Staged::File(id)) => Ok(id),
            Some(Staged::Dir) => TreeBuilder::new(&self.staging).compute(&path),
            None => Err(FsError::NotFound(path)),
        }
    }

    /// Raw bytes of any blob in the repository, by hash.
    pub fn show(&self, id: &ContentHash) -> FsResult<Vec<u8>> {
        self.repo.show(id)
    }

    // ---------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------

    /// Create a directory and any missing parents. Existing directories are
    /// left alone.
    pub fn mkdir(&mut self, path: &str) -> FsResult<()> {
        let path = normalize(path)?;
        self.ensure_dir(&path)
    }

    fn ensure_dir(&mut self, path: &str) -> FsResult<()> {
        if path.is_empty() {
            return Ok(());
        }
        if let Some(dir) = path::parent(path) {
            self.ensure_dir(dir)?;
        }
        match self.staging.get(path) {
            Some(Staged::Dir) => Ok(()),
            Some(Staged::File(_)) => Err(FsError::NotADirectory(path.to_string())),
            None => {
                self.staging.insert(path.to_string(), Staged::Dir);
                Ok(())
            }
        }
    }

    /// Write a file, creating missing parent directories.
    pub fn write(&mut self, path: &str, data: &[u8]) -> FsResult<ContentHash> {
        let path = normalize(path)?;
        if matches!(self.entry(&path), Some(Staged::Dir)) {
            return Err(FsError::IsADirectory(path));
        }
        if let Some(dir) = path::parent(&path) {
            self.ensure_dir(dir)?;
        }
        let id = self
            .repo
            .store()
            .write(&Blob::new(data.to_vec()).to_stored_object())?;
        debug!(path = %path, id = %id.short_hex(), size = data.len(), "staged file");
        self.staging.insert(path, Staged::File(id));
        Ok(id)
    }

    /// Remove a file.
    pub fn rm(&mut self, path: &str) -> FsResult<()> {
        let path = normalize(path)?;
        match self.entry(&path) {
            Some(Staged::File(_)) => {
                self.staging.remove(&path);
                Ok(())
            }
            Some(Staged::Dir) => Err(FsError::IsADirectory(path)),
            None => Err(FsError::NotFound(path)),
        }
    }

    /// Remove a directory and everything below it.
    pub fn rmtree(&mut self, path: &str) -> FsResult<()> {
        let path = normalize(path)?;
        if path.is_empty() {
            return Err(FsError::InvalidPath {
                path,
                reason: "cannot remove the root directory".to_string(),
            });
        }
        match self.entry(&path) {
            Some(Staged::Dir) => {
                self.staging
                    .retain(|p, _| p != &path && !path::is_descendant(p, &path));
                Ok(())
            }
            Some(Staged::File(_)) => Err(FsError::NotADirectory(path)),
            None => Err(FsError::NotFound(path)),
        }
    }

    /// Drop every staged change.
    pub fn reset(&mut self) {
        self.staging = self.base_map.clone();
    }

    /// Re-open at the current tip of the branch, dropping staged changes.
    pub fn reload(&mut self) -> FsResult<()> {
        self.base = self.repo.branch_tip(&self.branch)?;
        self.base_map = load_map(&self.repo, self.base)?;
        self.staging = self.base_map.clone();
        debug!(branch = %self.branch, "workspace reloaded");
        Ok(())
    }

    /// A workspace for a new branch starting at this workspace's base and
    /// carrying its staged changes.
    pub fn fork(&self, branch: &str) -> FsResult<Workspace> {
        validate_branch_name(branch)?;
        if self.repo.branch_tip(branch)?.is_some() {
            return Err(FsError::BranchExists(branch.to_string()));
        }
        Ok(Workspace {
            branch: branch.to_string(),
            ..self.clone()
        })
    }

    // ---------------------------------------------------------------
    // Commit
    // ---------------------------------------------------------------

    /// Write the trees and commit object for the staged state.
    ///
    /// Returns `None` if the branch exists and nothing changed. If the branch
    /// moved since the base was read, the staged changes are merged with the
    /// new tip; overlapping changes fail with [`FsError::Conflict`].
    pub fn prepare(&self, message: &str) -> FsResult<Option<PreparedCommit>> {
        let tip = self.repo.branch_tip(&self.branch)?;
        self.prepare_against(tip, message)
    }

    fn prepare_against(
        &self,
        tip: Option<ContentHash>,
        message: &str,
    ) -> FsResult<Option<PreparedCommit>> {
        let store = self.repo.store();
        let (result, parents, merged) = match tip {
            Some(_) if tip == self.base => {
                if !self.has_changes() {
                    return Ok(None);
                }
                (self.staging.clone(), self.base.into_iter().collect(), false)
            }
            Some(theirs_id) => {
                let theirs = load_map(&self.repo, Some(theirs_id))?;
                let result = merge::three_way(&self.base_map, &self.staging, &theirs)?;
                if result == theirs {
                    // Their tip already holds everything staged here.
                    return Ok(Some(PreparedCommit {
                        commit: theirs_id,
                        expected: tip,
                        result,
                        merged: true,
                        message: message.to_string(),
                    }));
                }
                let parents = std::iter::once(theirs_id).chain(self.base).collect();
                (result, parents, true)
            }
            None => {
                if let (Some(base), false) = (self.base, self.has_changes()) {
                    return Ok(Some(PreparedCommit {
                        commit: base,
                        expected: None,
                        result: self.staging.clone(),
                        merged: false,
                        message: message.to_string(),
                    }));
                }
                (self.staging.clone(), self.base.into_iter().collect(), false)
            }
        };

        let tree = TreeBuilder::new(&result).write(store, "")?;
        let commit = CommitObject::new(tree, parents, message);
        let id = store.write(&commit.to_stored_object()?)?;
        debug!(
            branch = %self.branch,
            commit = %id.short_hex(),
            tree = %tree.short_hex(),
            merged,
            "prepared commit"
        );
        Ok(Some(PreparedCommit {
            commit: id,
            expected: tip,
            result,
            merged,
            message: message.to_string(),
        }))
    }

    /// Publish a prepared commit by moving the branch. If another writer
    /// moved the branch after `prepare`, merge again and retry.
    pub fn finish(&mut self, mut prepared: PreparedCommit) -> FsResult<Published> {
        let name = branch_ref_name(&self.branch);
        let mut merged = prepared.merged;
        for attempt in 1..=MAX_PUBLISH_ATTEMPTS {
            if self
                .repo
                .refs()
                .compare_and_swap(&name, prepared.expected, prepared.commit)?
            {
                self.base = Some(prepared.commit);
                self.staging = prepared.result.clone();
                self.base_map = prepared.result;
                info!(
                    branch = %self.branch,
                    commit = %prepared.commit.short_hex(),
                    merged,
                    "committed"
                );
                return Ok(Published {
                    commit: prepared.commit,
                    merged,
                });
            }

            debug!(branch = %self.branch, attempt, "branch moved before publish, merging again");
            let tip = self.repo.branch_tip(&self.branch)?;
            match self.prepare_against(tip, &prepared.message)? {
                Some(next) => {
                    merged |= next.merged;
                    prepared = next;
                }
                None => {
                    // Tip is back at our base and nothing is staged.
                    let commit = tip.ok_or_else(|| FsError::NotFound(name.clone()))?;
                    return Ok(Published { commit, merged });
                }
            }
        }
        Err(FsError::RefMoved {
            branch: self.branch.clone(),
            attempts: MAX_PUBLISH_ATTEMPTS,
        })
    }

    /// [`prepare`](Self::prepare) then [`finish`](Self::finish). Returns
    /// `None` if there was nothing to commit.
    pub fn commit(&mut self, message: &str) -> FsResult<Option<Published>> {
        match self.prepare(message)? {
            Some(prepared) => self.finish(prepared).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(repo: &Repository) -> Workspace {
        Workspace::open(repo.clone(), "main").unwrap()
    }

    // ---------------------------------------------------------------
    // Staging
    // ---------------------------------------------------------------

    #[test]
    fn write_creates_parents() {
        let mut ws = open(&Repository::in_memory().unwrap());
        ws.write("a/b/doc.json", b"{}").unwrap();

        assert!(ws.is_dir("a").unwrap());
        assert!(ws.is_dir("a/b").unwrap());
        assert_eq!(ws.read("a/b/doc.json").unwrap(), b"{}");
        assert_eq!(ws.list("a").unwrap(), vec!["b"]);
        assert_eq!(ws.list("").unwrap(), vec!["a"]);
    }

    #[test]
    fn type_errors() {
        let mut ws = open(&Repository::in_memory().unwrap());
        ws.write("f", b"x").unwrap();
        ws.mkdir("d").unwrap();

        assert!(matches!(ws.mkdir("f/sub"), Err(FsError::NotADirectory(_))));
        assert!(matches!(ws.write("d", b"x"), Err(FsError::IsADirectory(_))));
        assert!(matches!(ws.rm("d"), Err(FsError::IsADirectory(_))));
        assert!(matches!(ws.rmtree("f"), Err(FsError::NotADirectory(_))));
        assert!(matches!(ws.read("missing"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn rm_of_missing_path_is_not_found() {
        let mut ws = open(&Repository::in_memory().unwrap());
        ws.write("f", b"x").unwrap();
        ws.rm("f").unwrap();
        assert!(matches!(ws.rm("f"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn rmtree_removes_descendants_only() {
        let mut ws = open(&Repository::in_memory().unwrap());
        ws.write("a/x", b"1").unwrap();
        ws.write("a/y/z", b"2").unwrap();
        ws.write("ab", b"3").unwrap();

        ws.rmtree("a").unwrap();
        assert!(!ws.exists("a").unwrap());
        assert!(!ws.exists("a/y/z").unwrap());
        assert!(ws.exists("ab").unwrap());
    }

    #[test]
    fn directory_hash_tracks_content() {
        let mut ws = open(&Repository::in_memory().unwrap());
        ws.write("d/a", b"1").unwrap();
        let before = ws.hash("d").unwrap();
        ws.write("d/a", b"2").unwrap();
        assert_ne!(ws.hash("d").unwrap(), before);
        ws.write("d/a", b"1").unwrap();
        assert_eq!(ws.hash("d").unwrap(), before);
    }

    // ---------------------------------------------------------------
    // Commit
    // ---------------------------------------------------------------

    #[test]
    fn commit_and_reopen() {
        let repo = Repository::in_memory().unwrap();
        let mut ws = open(&repo);
        ws.write("doc.json", b"{\"a\": 1}").unwrap();
        let published = ws.commit("first").unwrap().unwrap();
        assert!(!published.merged);
        assert_eq!(repo.branch_tip("main").unwrap(), Some(published.commit));

        let reopened = open(&repo);
        assert_eq!(reopened.read("doc.json").unwrap(), b"{\"a\": 1}");
        assert!(!reopened.has_changes());
    }

    #[test]
    fn nothing_to_commit() {
        let repo = Repository::in_memory().unwrap();
        let mut ws = open(&repo);
        ws.write("x", b"1").unwrap();
        ws.commit("first").unwrap();
        assert!(ws.commit("again").unwrap().is_none());
    }

    #[test]
    fn disjoint_concurrent_commits_merge() {
        let repo = Repository::in_memory().unwrap();
        let mut seed = open(&repo);
        seed.mkdir("docs").unwrap();
        seed.commit("seed").unwrap();

        let mut one = open(&repo);
        let mut two = open(&repo);
        one.write("docs/a", b"a").unwrap();
        two.write("docs/b", b"b").unwrap();

        one.commit("one").unwrap();
        let published = two.commit("two").unwrap().unwrap();
        assert!(published.merged);
        assert_eq!(two.read("docs/a").unwrap(), b"a");

        let merged = repo.read_commit(&published.commit).unwrap();
        assert!(merged.is_merge());
        let fresh = open(&repo);
        assert_eq!(fresh.list("docs").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn overlapping_concurrent_commits_conflict() {
        let repo = Repository::in_memory().unwrap();
        let mut seed = open(&repo);
        seed.write("k", b"0").unwrap();
        seed.commit("seed").unwrap();

        let mut one = open(&repo);
        let mut two = open(&repo);
        one.write("k", b"1").unwrap();
        two.write("k", b"2").unwrap();
        one.commit("one").unwrap();

        let err = two.commit("two").unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(open(&repo).read("k").unwrap(), b"1");
    }

    #[test]
    fn finish_remerges_when_tip_moves() {
        let repo = Repository::in_memory().unwrap();
        let mut seed = open(&repo);
        seed.write("a", b"0").unwrap();
        seed.commit("seed").unwrap();

        let mut slow = open(&repo);
        slow.write("b", b"slow").unwrap();
        let prepared = slow.prepare("slow").unwrap().unwrap();

        let mut fast = open(&repo);
        fast.write("a", b"fast").unwrap();
        fast.commit("fast").unwrap();

        let published = slow.finish(prepared).unwrap();
        assert!(published.merged);
        let fresh = open(&repo);
        assert_eq!(fresh.read("a").unwrap(), b"fast");
        assert_eq!(fresh.read("b").unwrap(), b"slow");
    }

    // ---------------------------------------------------------------
    // Branches
    // ---------------------------------------------------------------

    #[test]
    fn fork_carries_staged_changes() {
        let repo = Repository::in_memory().unwrap();
        let mut ws = open(&repo);
        ws.write("k", b"0").unwrap();
        ws.commit("seed").unwrap();

        ws.write("k", b"1").unwrap();
        let mut side = ws.fork("side").unwrap();
        side.commit("side").unwrap();

        assert_eq!(
            Workspace::open(repo.clone(), "side").unwrap().read("k").unwrap(),
            b"1"
        );
        assert_eq!(open(&repo).read("k").unwrap(), b"0");
        assert!(matches!(ws.fork("side"), Err(FsError::BranchExists(_))));
    }

    #[test]
    fn fork_without_changes_points_at_base() {
        let repo = Repository::in_memory().unwrap();
        let mut ws = open(&repo);
        ws.write("k", b"0").unwrap();
        let base = ws.commit("seed").unwrap().unwrap().commit;

        let mut side = ws.fork("copy").unwrap();
        assert_eq!(side.commit("copy").unwrap().unwrap().commit, base);
        assert_eq!(repo.branch_tip("copy").unwrap(), Some(base));
    }

    #[test]
    fn reset_and_reload() {
        let repo = Repository::in_memory().unwrap();
        let mut ws = open(&repo);
        ws.write("k", b"0").unwrap();
        ws.commit("seed").unwrap();

        ws.write("k", b"1").unwrap();
        ws.reset();
        assert_eq!(ws.read("k").unwrap(), b"0");

        let mut other = open(&repo);
        other.write("k", b"2").unwrap();
        other.commit("other").unwrap();

        ws.write("scratch", b"x").unwrap();
        ws.reload().unwrap();
        assert_eq!(ws.read("k").unwrap(), b"2");
        assert!(!ws.exists("scratch").unwrap());
    }

    #[test]
    fn history_follows_first_parents() {
        let repo = Repository::in_memory().unwrap();
        let mut ws = open(&repo);
        for n in 0..3u8 {
            ws.write("k", &[n]).unwrap();
            ws.commit(&format!("c{n}")).unwrap();
        }
        let messages: Vec<_> = repo
            .history("main", 10)
            .unwrap()
            .into_iter()
            .map(|(_, c)| c.message)
            .collect();
        assert_eq!(messages, vec!["c2", "c1", "c0"]);
    }

    #[test]
    fn on_disk_repository_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path(), "main").unwrap();
        let mut ws = Workspace::open(repo, "main").unwrap();
        ws.write("a/b.json", b"{}").unwrap();
        ws.commit("disk").unwrap();

        let reopened = Repository::open(dir.path()).unwrap();
        let ws = Workspace::open(reopened, "main").unwrap();
        assert_eq!(ws.read("a/b.json").unwrap(), b"{}");
    }
}
