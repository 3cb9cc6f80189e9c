use bytes::Bytes;
use initramfs_man::utils::{BLOCK_SIZE, EntryReader, collect_local_entries};
use initramfs_man::{CpioEntry, EntryKind, Error, Tree, decode, encode};
use std::fs;
use tempfile::tempdir;

fn device_tree() -> Tree {
    let mut root = CpioEntry::directory(".", 0o755);
    root.inode = 1;
    let mut dev = CpioEntry::directory("dev", 0o755);
    dev.inode = 2;
    let mut console = CpioEntry::special("dev/console", EntryKind::CharDevice, 0o600, 5, 1);
    console.inode = 3;
    let mut sda = CpioEntry::special("dev/sda", EntryKind::BlockDevice, 0o660, 8, 0);
    sda.inode = 4;
    sda.gid = 6;
    let mut fifo = CpioEntry::special("dev/initctl", EntryKind::Fifo, 0o600, 0, 0);
    fifo.inode = 5;
    let mut busybox = CpioEntry::regular("bin/busybox", 0o755, vec![0xAAu8; 1021]);
    busybox.inode = 7;
    busybox.link_count = 2;
    let mut bin = CpioEntry::directory("bin", 0o755);
    bin.inode = 6;

    Tree::build(vec![
        root,
        dev,
        console,
        sda,
        fifo,
        busybox,
        bin,
        CpioEntry::symlink("bin/sh", "busybox"),
    ])
    .unwrap()
}

#[test]
fn tree_round_trips_through_bytes() {
    let tree = device_tree();
    let encoded = encode(&tree).unwrap();
    assert_eq!(encoded.len() % BLOCK_SIZE, 0);

    let decoded = decode(&Bytes::from(encoded)).unwrap();
    assert_eq!(decoded, tree);

    let console = decoded.lookup("dev/console").unwrap();
    assert_eq!(console.kind(), EntryKind::CharDevice);
    assert_eq!(console.ref_device(), (5 << 8) | 1);
    assert_eq!(console.size(), 0);
}

#[test]
fn reader_yields_archive_order_and_stops_at_trailer() {
    let encoded = Bytes::from(encode(&device_tree()).unwrap());
    let names: Vec<String> = EntryReader::new(encoded)
        .map(|entry| entry.unwrap().name)
        .collect();
    assert_eq!(
        names,
        vec![
            ".",
            "bin",
            "bin/busybox",
            "bin/sh",
            "dev",
            "dev/console",
            "dev/initctl",
            "dev/sda",
        ]
    );
}

#[test]
fn edits_are_reflected_after_re_encoding() {
    let mut tree = device_tree();
    tree.remove("dev").unwrap();
    tree.insert(CpioEntry::regular("init", 0o755, "#!/bin/sh\nexec /bin/sh\n"))
        .unwrap();

    let decoded = decode(&Bytes::from(encode(&tree).unwrap())).unwrap();
    assert!(matches!(decoded.lookup("dev/sda"), Err(Error::PathNotFound(_))));
    assert_eq!(
        &decoded.read_content("init").unwrap()[..],
        b"#!/bin/sh\nexec /bin/sh\n"
    );
    assert_eq!(decoded, tree);
}

#[test]
fn local_directory_round_trips() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("usr/lib")).unwrap();
    fs::write(dir.path().join("usr/lib/os-release"), "NAME=test\n").unwrap();
    fs::write(dir.path().join("empty"), "").unwrap();

    let tree = Tree::build(collect_local_entries(dir.path()).unwrap()).unwrap();
    let decoded = decode(&Bytes::from(encode(&tree).unwrap())).unwrap();

    assert_eq!(decoded, tree);
    assert_eq!(
        &decoded.read_content("usr/lib/os-release").unwrap()[..],
        b"NAME=test\n"
    );
    assert_eq!(decoded.lookup("empty").unwrap().size(), 0);
}
