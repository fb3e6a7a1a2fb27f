//! File tree synchronizer.
//!
//! Rebuilds a hierarchical view of the server directory from the flat listing
//! sent in `file_init`, then keeps it current by applying `file_update` change
//! lists in arrival order. Every lookup descends the child maps segment by
//! segment, so inserts and deletes cost time proportional to path depth.

use super::node::{segments, ChangeKind, FileChange, FileKind, FileNode, ListingEntry};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Client-side mirror of the remote filesystem.
#[derive(Debug, Clone)]
pub struct FileTree {
    root: FileNode,
}

impl Default for FileTree {
    fn default() -> Self {
        Self {
            root: FileNode::root(),
        }
    }
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_listing(entries: &[ListingEntry]) -> Self {
        let mut tree = Self::new();
        tree.replace_all(entries);
        tree
    }

    pub fn root(&self) -> &FileNode {
        &self.root
    }

    /// Replaces the entire working set with a fresh flat listing.
    pub fn replace_all(&mut self, entries: &[ListingEntry]) {
        self.root = FileNode::root();
        for entry in entries {
            self.upsert(&entry.path, entry.kind, entry.size, entry.modified.clone());
        }
        debug!("🌲 File tree rebuilt from {} listing entries", entries.len());
    }

    /// Applies an ordered change list.
    ///
    /// `listing` is the flat listing that accompanied the changes; it is only
    /// consulted for entry metadata the change itself does not carry.
    pub fn apply_changes(&mut self, changes: &[FileChange], listing: &[ListingEntry]) {
        let metadata: HashMap<String, &ListingEntry> = listing
            .iter()
            .map(|entry| (segments(&entry.path).join("/"), entry))
            .collect();

        for change in changes {
            let path = segments(&change.path).join("/");
            let known = metadata.get(&path).copied();
            let size = change.size.or_else(|| known.and_then(|e| e.size));
            let modified = change
                .modified
                .clone()
                .or_else(|| known.and_then(|e| e.modified.clone()));

            match change.kind {
                ChangeKind::Added => {
                    // Without metadata an existing node keeps its kind
                    let kind = change
                        .entry_kind
                        .or_else(|| known.map(|e| e.kind))
                        .or_else(|| self.get(&path).map(|n| n.kind))
                        .unwrap_or(FileKind::File);
                    self.upsert(&path, kind, size, modified);
                }
                ChangeKind::Modified => {
                    if let Some(node) = self.get_mut(&path) {
                        if !node.is_dir() {
                            node.size = size.or(node.size);
                        }
                        if modified.is_some() {
                            node.modified = modified;
                        }
                    } else {
                        let kind = change
                            .entry_kind
                            .or_else(|| known.map(|e| e.kind))
                            .unwrap_or(FileKind::File);
                        self.upsert(&path, kind, size, modified);
                    }
                }
                ChangeKind::Deleted => {
                    self.remove(&path);
                }
            }
            debug!("🌲 Applied {:?} for '{}'", change.kind, path);
        }
    }

    /// Makes sure every segment of `dir_segments` exists as a directory and
    /// returns the innermost one.
    ///
    /// Missing directories are created with the given `modified` stamp and no
    /// size. Existing directories are left untouched, so repeated calls are
    /// harmless. A file found where a directory is needed becomes a directory,
    /// since the remote side evidently holds children beneath it.
    pub fn ensure_path(&mut self, dir_segments: &[&str], modified: Option<&str>) -> &mut FileNode {
        let mut node = &mut self.root;
        for segment in dir_segments {
            let child_path = if node.path.is_empty() {
                segment.to_string()
            } else {
                format!("{}/{}", node.path, segment)
            };
            let child = node
                .children
                .entry(segment.to_string())
                .or_insert_with(|| {
                    FileNode::directory(
                        child_path,
                        segment.to_string(),
                        modified.map(str::to_string),
                    )
                });
            if !child.is_dir() {
                child.kind = FileKind::Directory;
                child.size = None;
            }
            node = child;
        }
        node
    }

    /// Inserts or overwrites the node at `path`, creating missing ancestors.
    ///
    /// Re-adding an existing directory refreshes its timestamp and keeps its
    /// children. Returns `false` for the root path, which cannot be replaced.
    pub fn upsert(
        &mut self,
        path: &str,
        kind: FileKind,
        size: Option<u64>,
        modified: Option<String>,
    ) -> bool {
        let segs = segments(path);
        let Some((leaf, parents)) = segs.split_last() else {
            return false;
        };
        let normalized = segs.join("/");
        let dir = self.ensure_path(parents, modified.as_deref());

        match dir.children.get_mut(*leaf) {
            Some(existing) if existing.is_dir() && kind == FileKind::Directory => {
                if modified.is_some() {
                    existing.modified = modified;
                }
            }
            _ => {
                dir.children.insert(
                    leaf.to_string(),
                    FileNode {
                        path: normalized,
                        name: leaf.to_string(),
                        kind,
                        size: if kind == FileKind::File { size } else { None },
                        modified,
                        children: Default::default(),
                    },
                );
            }
        }
        true
    }

    /// Removes the node at `path` together with everything beneath it.
    pub fn remove(&mut self, path: &str) -> Option<FileNode> {
        let segs = segments(path);
        let (leaf, parents) = segs.split_last()?;
        let mut node = &mut self.root;
        for segment in parents {
            node = node.children.get_mut(*segment)?;
        }
        node.children.remove(*leaf)
    }

    pub fn get(&self, path: &str) -> Option<&FileNode> {
        let mut node = &self.root;
        for segment in segments(path) {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    fn get_mut(&mut self, path: &str) -> Option<&mut FileNode> {
        let mut node = &mut self.root;
        for segment in segments(path) {
            node = node.children.get_mut(segment)?;
        }
        Some(node)
    }

    /// Entries of the directory at `dir`: directories first, then files, each
    /// group in ascending case-sensitive name order.
    ///
    /// A path that does not resolve to a directory lists as empty.
    pub fn list(&self, dir: &str) -> Vec<&FileNode> {
        let Some(node) = self.get(dir).filter(|n| n.is_dir()) else {
            return Vec::new();
        };
        // BTreeMap already yields names in ascending order; the sort is stable
        let mut entries: Vec<&FileNode> = node.children.values().collect();
        entries.sort_by_key(|entry| !entry.is_dir());
        entries
    }

    /// Like [`FileTree::list`], keeping only names containing `filter`, ignoring case.
    pub fn list_filtered(&self, dir: &str, filter: &str) -> Vec<&FileNode> {
        let needle = filter.to_lowercase();
        self.list(dir)
            .into_iter()
            .filter(|entry| needle.is_empty() || entry.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Every path in the tree, the root excluded.
    pub fn paths(&self) -> BTreeSet<String> {
        let mut paths = BTreeSet::new();
        let mut stack: Vec<&FileNode> = self.root.children.values().collect();
        while let Some(node) = stack.pop() {
            paths.insert(node.path.clone());
            stack.extend(node.children.values());
        }
        paths
    }

    pub fn len(&self) -> usize {
        self.paths().len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: &str = "2024-05-01T10:00:00";
    const T1: &str = "2024-05-01T11:00:00";

    fn names(entries: &[&FileNode]) -> Vec<String> {
        entries.iter().map(|e| e.name.clone()).collect()
    }

    #[test]
    fn test_scenario_init_then_delete_directory() {
        let mut tree = FileTree::from_listing(&[
            ListingEntry::directory("a/", T0),
            ListingEntry::file("a/b.txt", 10, T0),
            ListingEntry::file("c.txt", 5, T0),
        ]);

        let root = tree.list("");
        assert_eq!(names(&root), vec!["a", "c.txt"]);
        assert_eq!(root[0].kind, FileKind::Directory);
        assert_eq!(root[1].kind, FileKind::File);
        assert_eq!(names(&tree.list("a")), vec!["b.txt"]);

        tree.apply_changes(&[FileChange::new(ChangeKind::Deleted, "a")], &[]);
        assert_eq!(names(&tree.list("")), vec!["c.txt"]);
        assert!(tree.get("a/b.txt").is_none());
    }

    #[test]
    fn test_implicit_directories_inherit_modified_only() {
        let tree = FileTree::from_listing(&[ListingEntry::file("world/region/r.0.0.mca", 4096, T1)]);

        let world = tree.get("world").unwrap();
        assert!(world.is_dir());
        assert_eq!(world.modified.as_deref(), Some(T1));
        assert!(world.size.is_none());

        let region = tree.get("world/region").unwrap();
        assert_eq!(region.path, "world/region");
        assert!(region.size.is_none());
    }

    #[test]
    fn test_ensure_path_is_idempotent() {
        let mut tree = FileTree::new();
        tree.ensure_path(&["plugins", "essentials"], Some(T0));
        tree.upsert("plugins/essentials/config.yml", FileKind::File, Some(3), Some(T0.into()));
        tree.ensure_path(&["plugins", "essentials"], Some(T1));

        let dir = tree.get("plugins/essentials").unwrap();
        assert_eq!(dir.modified.as_deref(), Some(T0));
        assert_eq!(dir.children.len(), 1);
    }

    #[test]
    fn test_init_fully_replaces_previous_tree() {
        let mut tree = FileTree::from_listing(&[ListingEntry::file("old.txt", 1, T0)]);
        tree.replace_all(&[ListingEntry::file("new.txt", 1, T0)]);
        assert_eq!(tree.paths(), BTreeSet::from(["new.txt".to_string()]));
    }

    #[test]
    fn test_modified_preserves_kind_and_children() {
        let mut tree = FileTree::from_listing(&[
            ListingEntry::directory("logs", T0),
            ListingEntry::file("logs/latest.log", 10, T0),
        ]);

        let mut change = FileChange::new(ChangeKind::Modified, "logs");
        change.size = Some(999);
        change.modified = Some(T1.into());
        tree.apply_changes(&[change], &[]);

        let logs = tree.get("logs").unwrap();
        assert!(logs.is_dir());
        assert!(logs.size.is_none());
        assert_eq!(logs.modified.as_deref(), Some(T1));
        assert_eq!(logs.children.len(), 1);

        tree.apply_changes(
            &[FileChange::new(ChangeKind::Modified, "logs/latest.log")],
            &[ListingEntry::file("logs/latest.log", 64, T1)],
        );
        let latest = tree.get("logs/latest.log").unwrap();
        assert_eq!(latest.size, Some(64));
        assert_eq!(latest.modified.as_deref(), Some(T1));
    }

    #[test]
    fn test_added_uses_listing_metadata() {
        let mut tree = FileTree::new();
        tree.apply_changes(
            &[FileChange::new(ChangeKind::Added, "backups")],
            &[ListingEntry::directory("backups", T1)],
        );
        assert!(tree.get("backups").unwrap().is_dir());

        tree.apply_changes(&[FileChange::new(ChangeKind::Added, "notes.md")], &[]);
        let notes = tree.get("notes.md").unwrap();
        assert_eq!(notes.kind, FileKind::File);
        assert!(notes.size.is_none());
    }

    #[test]
    fn test_windows_separators_in_changes() {
        let mut tree = FileTree::new();
        tree.apply_changes(&[FileChange::new(ChangeKind::Added, "world\\data\\raids.dat")], &[]);
        assert!(tree.get("world/data/raids.dat").is_some());
    }

    #[test]
    fn test_listing_order_is_independent_of_insertion_order() {
        let mut tree = FileTree::new();
        for path in ["zeta.txt", "Beta", "alpha.txt", "beta", "Alpha.txt"] {
            let kind = if path.ends_with(".txt") { FileKind::File } else { FileKind::Directory };
            tree.upsert(path, kind, None, None);
        }
        assert_eq!(
            names(&tree.list("")),
            vec!["Beta", "beta", "Alpha.txt", "alpha.txt", "zeta.txt"]
        );
    }

    #[test]
    fn test_unresolvable_listing_is_empty() {
        let tree = FileTree::from_listing(&[ListingEntry::file("a.txt", 1, T0)]);
        assert!(tree.list("missing/dir").is_empty());
        assert!(tree.list("a.txt").is_empty());
    }

    #[test]
    fn test_filter_after_ordering() {
        let tree = FileTree::from_listing(&[
            ListingEntry::file("Server.properties", 1, T0),
            ListingEntry::directory("server-icons", T0),
            ListingEntry::file("ops.json", 1, T0),
        ]);
        assert_eq!(
            names(&tree.list_filtered("", "SERVER")),
            vec!["server-icons", "Server.properties"]
        );
        assert_eq!(tree.list_filtered("", "").len(), 3);
    }

    #[test]
    fn test_delete_directory_removes_every_descendant() {
        let mut tree = FileTree::from_listing(&[
            ListingEntry::file("world/level.dat", 1, T0),
            ListingEntry::file("world/region/r.0.0.mca", 1, T0),
            ListingEntry::file("world/region/r.0.1.mca", 1, T0),
            ListingEntry::file("world_nether/level.dat", 1, T0),
        ]);
        tree.remove("world");
        assert!(tree.paths().iter().all(|p| !p.starts_with("world/") && p != "world"));
        assert!(tree.get("world_nether/level.dat").is_some());
    }

    fn ancestors_and_self(path: &str) -> Vec<String> {
        let segs = segments(path);
        (1..=segs.len()).map(|n| segs[..n].join("/")).collect()
    }

    /// Applies the same sequence to the tree and to a plain path set and
    /// compares the results after every step.
    #[test]
    fn test_path_set_matches_reference_model() {
        let pool = [
            "a", "a/b", "a/b/c.txt", "a/d.txt", "e", "e/f/g.log", "h.json", "e/f",
        ];
        let kinds = [ChangeKind::Added, ChangeKind::Modified, ChangeKind::Deleted];

        let initial = [ListingEntry::file("a/b/c.txt", 1, T0), ListingEntry::file("h.json", 1, T0)];
        let mut tree = FileTree::from_listing(&initial);
        let mut model: BTreeSet<String> = initial
            .iter()
            .flat_map(|e| ancestors_and_self(&e.path))
            .collect();
        assert_eq!(tree.paths(), model);

        let mut seed: u64 = 0x5eed;
        for _ in 0..500 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let path = pool[(seed >> 33) as usize % pool.len()];
            let kind = kinds[(seed >> 17) as usize % kinds.len()];

            tree.apply_changes(&[FileChange::new(kind, path)], &[]);
            match kind {
                ChangeKind::Added | ChangeKind::Modified => {
                    model.extend(ancestors_and_self(path));
                }
                ChangeKind::Deleted => {
                    let prefix = format!("{path}/");
                    model.retain(|p| p != path && !p.starts_with(&prefix));
                }
            }
            assert_eq!(tree.paths(), model, "diverged after {kind:?} {path}");
        }
    }
}
