use crate::error::{Error, Result};
use crate::utils::CpioEntry;
use std::collections::BTreeMap;
use tracing::debug;

/// Splits an archive path into its components. Empty and `.` components are
/// dropped, so `.`, `./` and `` all name the root and `./etc//hosts` is
/// `["etc", "hosts"]`.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect()
}

/// A directory in the tree.
///
/// `info` stays `None` while the directory only exists because one of its
/// descendants arrived before its own header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    pub(crate) info: Option<CpioEntry>,
    pub(crate) subdirs: BTreeMap<String, Node>,
    pub(crate) files: BTreeMap<String, CpioEntry>,
}

impl Node {
    pub fn info(&self) -> Option<&CpioEntry> {
        self.info.as_ref()
    }

    pub fn subdirs(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.subdirs.iter().map(|(name, node)| (name.as_str(), node))
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &CpioEntry)> {
        self.files.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn is_empty(&self) -> bool {
        self.subdirs.is_empty() && self.files.is_empty()
    }
}

/// What an archive path points at.
#[derive(Debug, Clone, Copy)]
pub enum Resolved<'a> {
    Dir(&'a Node),
    File(&'a CpioEntry),
}

/// The decoded archive as a directory hierarchy rooted at `.`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    root: Node,
}

impl Tree {
    pub fn new() -> Self {
        Tree::default()
    }

    /// Inserts every entry and validates the result.
    pub fn build<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = CpioEntry>,
    {
        let mut tree = Tree::new();
        for entry in entries {
            tree.insert(entry)?;
        }
        tree.validate()?;
        Ok(tree)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn insert(&mut self, entry: CpioEntry) -> Result<()> {
        if entry.is_trailer() {
            return Ok(());
        }
        if !entry.carries_payload() && !entry.payload.is_empty() {
            return Err(Error::UnexpectedPayload {
                size: entry.size(),
                name: entry.name,
            });
        }

        let segments = path_segments(&entry.name);
        let Some((last, parents)) = segments.split_last() else {
            if !entry.is_dir() {
                return Err(Error::InvalidPath(format!(
                    "'{}' names the archive root but is not a directory",
                    entry.name
                )));
            }
            if self.root.info.is_some() {
                return Err(Error::DuplicateEntry(entry.name));
            }
            self.root.info = Some(entry);
            return Ok(());
        };

        let mut node = &mut self.root;
        for (depth, segment) in parents.iter().enumerate() {
            if node.files.contains_key(*segment) {
                return Err(Error::DuplicateEntry(parents[..=depth].join("/")));
            }
            node = node
                .subdirs
                .entry(segment.to_string())
                .or_insert_with(|| {
                    debug!("creating placeholder for {}", parents[..=depth].join("/"));
                    Node::default()
                });
        }

        let key = last.to_string();
        if entry.is_dir() {
            if node.files.contains_key(&key) {
                return Err(Error::DuplicateEntry(entry.name));
            }
            let dir = node.subdirs.entry(key).or_default();
            if dir.info.is_some() {
                return Err(Error::DuplicateEntry(entry.name));
            }
            dir.info = Some(entry);
        } else {
            if node.files.contains_key(&key) || node.subdirs.contains_key(&key) {
                return Err(Error::DuplicateEntry(entry.name));
            }
            node.files.insert(key, entry);
        }

        Ok(())
    }

    /// Removes a file or a whole directory subtree.
    pub fn remove(&mut self, path: &str) -> Result<()> {
        let segments = path_segments(path);
        let Some((last, parents)) = segments.split_last() else {
            return Err(Error::InvalidPath("the archive root cannot be removed".into()));
        };

        let mut node = &mut self.root;
        for segment in parents {
            node = node
                .subdirs
                .get_mut(*segment)
                .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        }

        if node.subdirs.remove(*last).is_some() {
            debug!("removed directory {path}");
        } else if node.files.remove(*last).is_some() {
            debug!("removed entry {path}");
        } else {
            return Err(Error::PathNotFound(path.to_string()));
        }
        Ok(())
    }

    pub fn resolve(&self, path: &str) -> Result<Resolved<'_>> {
        let segments = path_segments(path);
        let Some((last, parents)) = segments.split_last() else {
            return Ok(Resolved::Dir(&self.root));
        };

        let mut node = &self.root;
        for segment in parents {
            node = node
                .subdirs
                .get(*segment)
                .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        }

        if let Some(dir) = node.subdirs.get(*last) {
            Ok(Resolved::Dir(dir))
        } else if let Some(entry) = node.files.get(*last) {
            Ok(Resolved::File(entry))
        } else {
            Err(Error::PathNotFound(path.to_string()))
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.resolve(path).is_ok()
    }

    /// Fails with `InvalidTree` naming the first directory without metadata.
    pub fn validate(&self) -> Result<()> {
        validate_node(&self.root, ".")
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Entries in archive order: a directory's own entry, then its
    /// subdirectories recursively, then its other members.
    pub fn entries(&self) -> Vec<&CpioEntry> {
        let mut out = Vec::new();
        collect_entries(&self.root, &mut out);
        out
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.info.is_none() && self.root.is_empty()
    }

    pub fn next_inode(&self) -> u64 {
        self.entries()
            .iter()
            .map(|entry| entry.inode)
            .max()
            .map_or(1, |inode| inode + 1)
    }
}

fn validate_node(node: &Node, path: &str) -> Result<()> {
    if node.info.is_none() {
        return Err(Error::InvalidTree(path.to_string()));
    }
    for (name, child) in &node.subdirs {
        let child_path = if path == "." {
            name.clone()
        } else {
            format!("{path}/{name}")
        };
        validate_node(child, &child_path)?;
    }
    Ok(())
}

fn collect_entries<'a>(node: &'a Node, out: &mut Vec<&'a CpioEntry>) {
    if let Some(info) = &node.info {
        out.push(info);
    }
    for child in node.subdirs.values() {
        collect_entries(child, out);
    }
    out.extend(node.files.values());
}
