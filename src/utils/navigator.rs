use crate::error::{Error, Result};
use crate::utils::{CpioEntry, Node, Resolved, Tree};
use bytes::Bytes;

/// Result of [`Tree::ls`].
#[derive(Debug)]
pub enum Listing<'a> {
    Entry(&'a CpioEntry),
    Children(Vec<&'a CpioEntry>),
}

fn dir_info<'a>(node: &'a Node, path: &str) -> Result<&'a CpioEntry> {
    node.info()
        .ok_or_else(|| Error::InvalidTree(path.to_string()))
}

impl Tree {
    /// The entry describing `path` itself, like `stat`.
    pub fn lookup(&self, path: &str) -> Result<&CpioEntry> {
        match self.resolve(path)? {
            Resolved::Dir(node) => dir_info(node, path),
            Resolved::File(entry) => Ok(entry),
        }
    }

    /// Immediate children of a directory: subdirectories first, then the
    /// other members, each group by name.
    pub fn list(&self, path: &str) -> Result<Vec<&CpioEntry>> {
        let node = match self.resolve(path)? {
            Resolved::Dir(node) => node,
            Resolved::File(_) => return Err(Error::NotADirectory(path.to_string())),
        };

        let mut children = Vec::new();
        for (name, child) in node.subdirs() {
            children.push(dir_info(child, &format!("{}/{name}", path.trim_end_matches('/')))?);
        }
        children.extend(node.files().map(|(_, entry)| entry));
        Ok(children)
    }

    pub fn read_content(&self, path: &str) -> Result<&Bytes> {
        match self.resolve(path)? {
            Resolved::Dir(_) => Err(Error::IsADirectory(path.to_string())),
            Resolved::File(entry) => Ok(&entry.payload),
        }
    }

    /// A trailing `/` asks for the contents of a directory, anything else
    /// for the entry itself. `./` lists the root, `.` shows it.
    pub fn ls(&self, path: &str) -> Result<Listing<'_>> {
        if path.ends_with('/') {
            Ok(Listing::Children(self.list(path)?))
        } else {
            Ok(Listing::Entry(self.lookup(path)?))
        }
    }
}
