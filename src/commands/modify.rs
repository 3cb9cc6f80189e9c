use crate::error::{Error, Result};
use crate::utils::{self, CpioEntry, ImageOptions, Resolved, Tree, path_segments};
use clap::{Arg, Command, value_parser};
use std::{
    fs,
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModifyOp {
    Mkdir { path: String },
    Put { local: PathBuf, path: String },
    Link { target: String, path: String },
    Remove { path: String },
}

pub fn get_modify_command() -> Command {
    Command::new("modify")
        .visible_alias("m")
        .about("Edit an image in place")
        .long_about(
            "Apply a sequence of operations to an image and write it back. \
             Operations: 'mkdir <path>', 'put <local file> <path>', \
             'link <target> <path>', 'remove <path>'.",
        )
        .arg(
            Arg::new("image")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Initramfs image to edit"),
        )
        .arg(
            Arg::new("ops")
                .required(true)
                .num_args(1..)
                .help("Operations, applied in order"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_parser(value_parser!(PathBuf))
                .help("Write the result here instead of over the input"),
        )
        .args(super::image_args())
        .arg_required_else_help(true)
}

fn operand<'a>(args: &mut impl Iterator<Item = &'a String>, op: &str, what: &str) -> Result<String> {
    args.next()
        .cloned()
        .ok_or_else(|| Error::InvalidCommand(format!("'{op}' expects {what}")))
}

pub fn parse_ops(args: &[String]) -> Result<Vec<ModifyOp>> {
    let mut ops = Vec::new();
    let mut args = args.iter();

    while let Some(op) = args.next() {
        let parsed = match op.as_str() {
            "mkdir" => ModifyOp::Mkdir {
                path: operand(&mut args, op, "an archive path")?,
            },
            "put" => ModifyOp::Put {
                local: PathBuf::from(operand(&mut args, op, "a local file")?),
                path: operand(&mut args, op, "an archive path")?,
            },
            "link" => ModifyOp::Link {
                target: operand(&mut args, op, "a link target")?,
                path: operand(&mut args, op, "an archive path")?,
            },
            "remove" | "rm" => ModifyOp::Remove {
                path: operand(&mut args, op, "an archive path")?,
            },
            other => {
                return Err(Error::InvalidCommand(format!("unknown operation '{other}'")));
            }
        };
        ops.push(parsed);
    }

    if ops.is_empty() {
        return Err(Error::InvalidCommand("no operations given".into()));
    }
    Ok(ops)
}

fn archive_name(path: &str) -> Result<String> {
    let segments = path_segments(path);
    if segments.is_empty() {
        return Err(Error::InvalidPath("the archive root cannot be replaced".into()));
    }
    Ok(segments.join("/"))
}

/// One past the highest inode in use, as long as it still fits the header.
fn fresh_inode(tree: &Tree, name: &str) -> Result<u64> {
    let inode = tree.next_inode();
    if inode > u32::MAX as u64 {
        return Err(Error::FieldOverflow {
            field: "inode",
            name: name.to_string(),
            value: inode,
        });
    }
    Ok(inode)
}

/// Inserts a new member whose parent directory must already exist.
fn insert_new(tree: &mut Tree, entry: CpioEntry) -> Result<()> {
    if tree.contains(&entry.name) {
        return Err(Error::DuplicateEntry(entry.name));
    }
    let parent = entry.name.rsplit_once('/').map_or(".", |(parent, _)| parent);
    if let Resolved::File(_) = tree.resolve(parent)? {
        return Err(Error::NotADirectory(parent.to_string()));
    }
    tree.insert(entry)
}

/// Applies one operation. New entries are owned by root and get the next
/// free inode; `now` is their mtime unless taken from a local file.
pub fn apply(tree: &mut Tree, op: &ModifyOp, now: u64) -> Result<()> {
    match op {
        ModifyOp::Mkdir { path } => {
            let mut entry = CpioEntry::directory(&archive_name(path)?, 0o755);
            entry.inode = fresh_inode(tree, &entry.name)?;
            entry.mtime = now;
            insert_new(tree, entry)
        }
        ModifyOp::Put { local, path } => {
            let metadata = fs::metadata(local)?;
            if !metadata.is_file() {
                return Err(Error::InvalidCommand(format!(
                    "{} is not a regular file",
                    local.display()
                )));
            }
            let mut entry =
                CpioEntry::regular(&archive_name(path)?, metadata.mode(), fs::read(local)?);
            entry.inode = fresh_inode(tree, &entry.name)?;
            entry.mtime = metadata.mtime().max(0) as u64;
            insert_new(tree, entry)
        }
        ModifyOp::Link { target, path } => {
            let mut entry = CpioEntry::symlink(&archive_name(path)?, target);
            entry.inode = fresh_inode(tree, &entry.name)?;
            entry.mtime = now;
            insert_new(tree, entry)
        }
        ModifyOp::Remove { path } => tree.remove(path),
    }
}

pub fn modify(
    image: &Path,
    ops: &[ModifyOp],
    output: Option<&Path>,
    options: &ImageOptions,
) -> Result<()> {
    let mut tree = utils::load_tree(image)?;
    let now = chrono::Utc::now().timestamp().max(0) as u64;

    for op in ops {
        apply(&mut tree, op, now)?;
        match op {
            ModifyOp::Mkdir { path } => println!("Created directory \"{path}\""),
            ModifyOp::Put { local, path } => {
                println!("Added \"{path}\" from {}", local.display())
            }
            ModifyOp::Link { target, path } => println!("Linked \"{path}\" -> {target}"),
            ModifyOp::Remove { path } => println!("Removed \"{path}\""),
        }
    }

    let output = output.unwrap_or(image);
    utils::save_tree(&tree, output, options)?;
    println!("Wrote {} entries to {}", tree.len(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    fn base_tree() -> Tree {
        let mut root = CpioEntry::directory(".", 0o755);
        root.inode = 1;
        let mut etc = CpioEntry::directory("etc", 0o755);
        etc.inode = 2;
        let mut hosts = CpioEntry::regular("etc/hosts", 0o644, "127.0.0.1 localhost");
        hosts.inode = 3;
        Tree::build(vec![root, etc, hosts]).unwrap()
    }

    #[test]
    fn parses_operation_sequence() {
        let ops = parse_ops(&args("mkdir opt put ./a opt/a link /opt/a bin/a rm etc")).unwrap();
        assert_eq!(
            ops,
            vec![
                ModifyOp::Mkdir { path: "opt".into() },
                ModifyOp::Put {
                    local: PathBuf::from("./a"),
                    path: "opt/a".into()
                },
                ModifyOp::Link {
                    target: "/opt/a".into(),
                    path: "bin/a".into()
                },
                ModifyOp::Remove { path: "etc".into() },
            ]
        );
    }

    #[test]
    fn rejects_bad_operations() {
        assert!(matches!(parse_ops(&args("chmod x")), Err(Error::InvalidCommand(_))));
        assert!(matches!(parse_ops(&args("put only-one")), Err(Error::InvalidCommand(_))));
        assert!(matches!(parse_ops(&[]), Err(Error::InvalidCommand(_))));
    }

    #[test]
    fn mkdir_and_link_add_entries() {
        let mut tree = base_tree();
        apply(&mut tree, &ModifyOp::Mkdir { path: "/opt/".into() }, 42).unwrap();
        apply(
            &mut tree,
            &ModifyOp::Link {
                target: "/etc/hosts".into(),
                path: "opt/hosts".into(),
            },
            42,
        )
        .unwrap();

        let opt = tree.lookup("opt").unwrap();
        assert!(opt.is_dir());
        assert_eq!(opt.name, "opt");
        assert_eq!(opt.inode, 4);
        assert_eq!(opt.mtime, 42);

        let link = tree.lookup("opt/hosts").unwrap();
        assert!(link.is_symlink());
        assert_eq!(&link.payload[..], b"/etc/hosts");
        assert_eq!(link.inode, 5);
        assert!(tree.is_valid());
    }

    #[test]
    fn put_copies_local_file() {
        let dir = tempdir().unwrap();
        let local = dir.path().join("busybox");
        fs::write(&local, b"\x7fELF").unwrap();

        let mut tree = base_tree();
        apply(
            &mut tree,
            &ModifyOp::Put {
                local,
                path: "etc/busybox".into(),
            },
            0,
        )
        .unwrap();

        let entry = tree.lookup("etc/busybox").unwrap();
        assert_eq!(&entry.payload[..], b"\x7fELF");
        assert_eq!(entry.uid, 0);
        assert!(!entry.is_dir());
    }

    #[test]
    fn new_entries_need_an_existing_parent() {
        let mut tree = base_tree();
        let err = apply(&mut tree, &ModifyOp::Mkdir { path: "usr/bin".into() }, 0).unwrap_err();
        assert!(matches!(err, Error::PathNotFound(path) if path == "usr"));

        let err = apply(&mut tree, &ModifyOp::Mkdir { path: "etc/hosts/x".into() }, 0).unwrap_err();
        assert!(matches!(err, Error::NotADirectory(_)));

        let err = apply(&mut tree, &ModifyOp::Mkdir { path: "etc".into() }, 0).unwrap_err();
        assert!(matches!(err, Error::DuplicateEntry(_)));

        let err = apply(&mut tree, &ModifyOp::Mkdir { path: ".".into() }, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)));

        assert_eq!(tree, base_tree());
    }

    #[test]
    fn exhausted_inodes_fail_before_insert() {
        let mut root = CpioEntry::directory(".", 0o755);
        root.inode = u32::MAX as u64;
        let mut tree = Tree::build(vec![root]).unwrap();

        let err = apply(&mut tree, &ModifyOp::Mkdir { path: "opt".into() }, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::FieldOverflow { field: "inode", name, .. } if name == "opt"
        ));
        assert!(!tree.contains("opt"));
    }

    #[test]
    fn modify_rewrites_image() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("initramfs.img");
        let output = dir.path().join("out.cpio");
        utils::save_tree(&base_tree(), &image, &ImageOptions::default()).unwrap();

        let ops = parse_ops(&args("remove etc/hosts mkdir etc/init.d")).unwrap();
        modify(&image, &ops, Some(&output), &ImageOptions { compression: None }).unwrap();

        let tree = utils::load_tree(&output).unwrap();
        assert!(!tree.contains("etc/hosts"));
        assert!(tree.lookup("etc/init.d").unwrap().is_dir());
        assert_eq!(utils::load_tree(&image).unwrap(), base_tree());
    }
}
