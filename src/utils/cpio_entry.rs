use bytes::Bytes;

pub const S_IFMT: u32 = 0o170000;
pub const S_IFSOCK: u32 = 0o140000;
pub const S_IFLNK: u32 = 0o120000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFBLK: u32 = 0o060000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFIFO: u32 = 0o010000;

pub const TRAILER_NAME: &str = "TRAILER!!!";
pub const ROOT_NAME: &str = ".";
const TRAILER_FIELD_SUM: u64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Regular,
    Symlink,
    BlockDevice,
    CharDevice,
    Fifo,
    Socket,
    Unknown,
}

impl EntryKind {
    pub fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            S_IFDIR => EntryKind::Directory,
            S_IFREG => EntryKind::Regular,
            S_IFLNK => EntryKind::Symlink,
            S_IFBLK => EntryKind::BlockDevice,
            S_IFCHR => EntryKind::CharDevice,
            S_IFIFO => EntryKind::Fifo,
            S_IFSOCK => EntryKind::Socket,
            _ => EntryKind::Unknown,
        }
    }

    /// File-type bits for this kind, `0` for `Unknown`.
    pub fn mode_bits(self) -> u32 {
        match self {
            EntryKind::Directory => S_IFDIR,
            EntryKind::Regular => S_IFREG,
            EntryKind::Symlink => S_IFLNK,
            EntryKind::BlockDevice => S_IFBLK,
            EntryKind::CharDevice => S_IFCHR,
            EntryKind::Fifo => S_IFIFO,
            EntryKind::Socket => S_IFSOCK,
            EntryKind::Unknown => 0,
        }
    }

    pub fn is_device(self) -> bool {
        matches!(self, EntryKind::BlockDevice | EntryKind::CharDevice)
    }
}

/// One archive member: the 13 newc header fields plus its name and data.
///
/// The payload is file content for regular files, the target path for
/// symlinks and empty for everything else. `size` and `name_size` are not
/// stored; they are derived from the payload and name when encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpioEntry {
    pub inode: u64,
    pub mode: u32, // type bits + permission bits
    pub uid: u32,
    pub gid: u32,
    pub link_count: u32,
    pub mtime: u64, // seconds since epoch
    pub device_major: u32,
    pub device_minor: u32,
    pub ref_device_major: u32,
    pub ref_device_minor: u32,
    pub checksum: u32, // carried through, never verified
    pub name: String,  // archive-relative, '/'-separated, "." for the root
    pub payload: Bytes,
}

impl CpioEntry {
    pub fn directory(name: &str, permissions: u32) -> Self {
        CpioEntry {
            mode: S_IFDIR | (permissions & 0o7777),
            link_count: 2,
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn regular(name: &str, permissions: u32, payload: impl Into<Bytes>) -> Self {
        CpioEntry {
            mode: S_IFREG | (permissions & 0o7777),
            link_count: 1,
            name: name.to_string(),
            payload: payload.into(),
            ..Default::default()
        }
    }

    pub fn symlink(name: &str, target: &str) -> Self {
        CpioEntry {
            mode: S_IFLNK | 0o777,
            link_count: 1,
            name: name.to_string(),
            payload: Bytes::copy_from_slice(target.as_bytes()),
            ..Default::default()
        }
    }

    /// A device node, fifo or socket with no payload.
    pub fn special(name: &str, kind: EntryKind, permissions: u32, major: u32, minor: u32) -> Self {
        CpioEntry {
            mode: kind.mode_bits() | (permissions & 0o7777),
            link_count: 1,
            name: name.to_string(),
            ref_device_major: major,
            ref_device_minor: minor,
            ..Default::default()
        }
    }

    pub fn kind(&self) -> EntryKind {
        EntryKind::from_mode(self.mode)
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == EntryKind::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.kind() == EntryKind::Symlink
    }

    /// Only regular files and symlinks may have a non-zero size.
    pub fn carries_payload(&self) -> bool {
        matches!(self.kind(), EntryKind::Regular | EntryKind::Symlink)
    }

    pub fn permissions(&self) -> u32 {
        self.mode & !S_IFMT
    }

    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Length of the name including its NUL terminator.
    pub fn name_size(&self) -> u64 {
        self.name.len() as u64 + 1
    }

    pub fn device(&self) -> u64 {
        ((self.device_major as u64) << 8) | self.device_minor as u64
    }

    pub fn ref_device(&self) -> u64 {
        ((self.ref_device_major as u64) << 8) | self.ref_device_minor as u64
    }

    /// Last path component, or "." for the root.
    pub fn base_name(&self) -> &str {
        self.name
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(ROOT_NAME)
    }

    /// The end-of-archive sentinel: named `TRAILER!!!`, no payload, and zero
    /// inode, mode and device numbers. Such an entry is never a real member.
    pub fn is_trailer(&self) -> bool {
        self.name == TRAILER_NAME
            && self.inode == 0
            && self.mode == 0
            && self.device() == 0
            && self.ref_device() == 0
            && self.payload.is_empty()
    }

    /// Whether this trailer closes the archive. Writers emit it with
    /// `link_count` 1 and `name_size` 11, so all fields sum to exactly 12.
    pub fn ends_archive(&self) -> bool {
        self.name == TRAILER_NAME && self.field_sum() == TRAILER_FIELD_SUM
    }

    fn field_sum(&self) -> u64 {
        [
            self.inode,
            self.mode as u64,
            self.uid as u64,
            self.gid as u64,
            self.link_count as u64,
            self.mtime,
            self.size(),
            self.device_major as u64,
            self.device_minor as u64,
            self.ref_device_major as u64,
            self.ref_device_minor as u64,
            self.name_size(),
            self.checksum as u64,
        ]
        .iter()
        .fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    pub fn trailer() -> Self {
        CpioEntry {
            link_count: 1,
            name: TRAILER_NAME.to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_mode_bits() {
        assert_eq!(EntryKind::from_mode(0o040755), EntryKind::Directory);
        assert_eq!(EntryKind::from_mode(0o100644), EntryKind::Regular);
        assert_eq!(EntryKind::from_mode(0o120777), EntryKind::Symlink);
        assert_eq!(EntryKind::from_mode(0o060600), EntryKind::BlockDevice);
        assert_eq!(EntryKind::from_mode(0o020620), EntryKind::CharDevice);
        assert_eq!(EntryKind::from_mode(0o010644), EntryKind::Fifo);
        assert_eq!(EntryKind::from_mode(0o140755), EntryKind::Socket);
        assert_eq!(EntryKind::from_mode(0), EntryKind::Unknown);
    }

    #[test]
    fn device_numbers_combine() {
        let mut entry = CpioEntry::special("dev/console", EntryKind::CharDevice, 0o600, 5, 1);
        entry.device_major = 0x103;
        entry.device_minor = 0x02;
        assert_eq!(entry.ref_device(), (5 << 8) | 1);
        assert_eq!(entry.device(), 0x10302);
        assert!(entry.kind().is_device());
    }

    #[test]
    fn trailer_detection() {
        assert!(CpioEntry::trailer().is_trailer());
        assert!(CpioEntry::trailer().ends_archive());

        let mut zero_links = CpioEntry::trailer();
        zero_links.link_count = 0;
        assert!(zero_links.is_trailer());
        assert!(!zero_links.ends_archive());

        let mut not_trailer = CpioEntry::trailer();
        not_trailer.mode = S_IFREG | 0o644;
        assert!(!not_trailer.is_trailer());

        let mut with_data = CpioEntry::trailer();
        with_data.payload = Bytes::from_static(b"x");
        assert!(!with_data.is_trailer());
        assert!(!with_data.ends_archive());
    }

    #[test]
    fn only_files_and_symlinks_carry_data() {
        assert!(CpioEntry::regular("init", 0o755, "").carries_payload());
        assert!(CpioEntry::symlink("bin/sh", "busybox").carries_payload());
        assert!(!CpioEntry::directory("etc", 0o755).carries_payload());
        assert!(!CpioEntry::special("dev/null", EntryKind::CharDevice, 0o666, 1, 3).carries_payload());
        assert!(!CpioEntry::trailer().carries_payload());
    }

    #[test]
    fn base_name() {
        assert_eq!(CpioEntry::directory(".", 0o755).base_name(), ".");
        assert_eq!(CpioEntry::directory("etc", 0o755).base_name(), "etc");
        assert_eq!(CpioEntry::regular("etc/hosts", 0o644, "").base_name(), "hosts");
    }
}
