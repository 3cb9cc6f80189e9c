//! Reading and writing the "newc" cpio layout used by initramfs images.
//!
//! A member is laid out as
//!
//! ```text
//! ALGN(4) + magic + 13 x 8 hex digits + name + "\0" + ALGN(4) + data
//! ```
//!
//! and the archive ends with a member named `TRAILER!!!` whose fields are all
//! zero except `link_count` (1) and `name_size` (11). Writers pad the whole
//! stream to 512 bytes.

use crate::error::{Error, Result};
use crate::utils::{CpioEntry, EntryKind, Tree};
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use tracing::{debug, info};

pub const NEWC_MAGIC: &[u8; 6] = b"070701";
pub const CRC_MAGIC: &[u8; 6] = b"070702";
pub const MAGIC_LEN: usize = 6;
pub const FIELD_LEN: usize = 8;
pub const FIELD_COUNT: usize = 13;
pub const HEADER_LEN: usize = MAGIC_LEN + FIELD_COUNT * FIELD_LEN; // 110
pub const BLOCK_SIZE: usize = 512;

fn read_field(data: &[u8], offset: usize) -> Result<u32> {
    let mut raw = [0u8; 4];
    hex::decode_to_slice(&data[offset..offset + FIELD_LEN], &mut raw)
        .map_err(|err| Error::malformed(offset, format!("bad hex field: {err}")))?;
    Ok(BigEndian::read_u32(&raw))
}

fn write_field(out: &mut Vec<u8>, value: u32) {
    let mut raw = [0u8; 4];
    BigEndian::write_u32(&mut raw, value);
    out.extend_from_slice(hex::encode(raw).as_bytes());
}

fn pad_to(out: &mut Vec<u8>, align: usize) {
    out.resize(out.len().next_multiple_of(align), 0);
}

/// Iterates over the members of a newc stream, stopping at the trailer.
///
/// Payloads are slices of the input buffer, nothing is copied. After an
/// error the iterator is exhausted.
pub struct EntryReader {
    data: Bytes,
    pos: usize,
    done: bool,
}

impl EntryReader {
    pub fn new(data: Bytes) -> Self {
        EntryReader {
            data,
            pos: 0,
            done: false,
        }
    }

    /// Byte offset just past the last member read.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn next_entry(&mut self) -> Result<Option<CpioEntry>> {
        let len = self.data.len();

        // Zero bytes are allowed between members
        loop {
            self.pos = self.pos.next_multiple_of(4);
            if self.pos >= len {
                return Ok(None);
            }
            let rest = &self.data[self.pos..];
            if rest.starts_with(NEWC_MAGIC) || rest.starts_with(CRC_MAGIC) {
                break;
            }
            if rest[0] != 0 {
                return Err(Error::malformed(self.pos, "bad magic"));
            }
            self.pos += 1;
        }

        let start = self.pos;
        let header_end = start + HEADER_LEN;
        if header_end > len {
            return Err(Error::malformed(start, "truncated header"));
        }

        let mut fields = [0u32; FIELD_COUNT];
        for (i, field) in fields.iter_mut().enumerate() {
            *field = read_field(&self.data, start + MAGIC_LEN + i * FIELD_LEN)?;
        }
        let [
            inode,
            mode,
            uid,
            gid,
            link_count,
            mtime,
            size,
            device_major,
            device_minor,
            ref_device_major,
            ref_device_minor,
            name_size,
            checksum,
        ] = fields;

        if name_size == 0 {
            return Err(Error::malformed(start, "empty name"));
        }
        let name_end = header_end + name_size as usize;
        if name_end > len {
            return Err(Error::malformed(start, "truncated name"));
        }
        let raw_name = &self.data[header_end..name_end];
        let raw_name = raw_name.strip_suffix(&[0u8]).unwrap_or(raw_name);
        if raw_name.is_empty() {
            return Err(Error::malformed(header_end, "empty name"));
        }
        let name = std::str::from_utf8(raw_name)
            .map_err(|_| Error::malformed(header_end, "name is not valid UTF-8"))?
            .to_string();

        let data_start = name_end.next_multiple_of(4);
        let size = size as usize;
        let kind = EntryKind::from_mode(mode);
        if size != 0 && !matches!(kind, EntryKind::Regular | EntryKind::Symlink) {
            return Err(Error::malformed(
                start,
                format!("'{name}' cannot carry data but has size {size}"),
            ));
        }
        let payload = if size == 0 {
            Bytes::new()
        } else if data_start + size > len {
            return Err(Error::malformed(start, format!("truncated data of '{name}'")));
        } else {
            self.data.slice(data_start..data_start + size)
        };
        self.pos = data_start + size;

        let entry = CpioEntry {
            inode: inode as u64,
            mode,
            uid,
            gid,
            link_count,
            mtime: mtime as u64,
            device_major,
            device_minor,
            ref_device_major,
            ref_device_minor,
            checksum,
            name,
            payload,
        };

        if entry.ends_archive() {
            debug!("trailer at {start:#x}");
            return Ok(None);
        }

        debug!(
            name = %entry.name,
            kind = ?entry.kind(),
            size,
            "decoded entry at {start:#x}"
        );
        Ok(Some(entry))
    }
}

impl Iterator for EntryReader {
    type Item = Result<CpioEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Decodes a whole archive. Any error discards the partially built tree.
pub fn decode(data: &Bytes) -> Result<Tree> {
    let mut tree = Tree::new();
    let mut reader = EntryReader::new(data.clone());
    for entry in reader.by_ref() {
        tree.insert(entry?)?;
    }
    tree.validate()?;
    info!("decoded {} entries from {} bytes", tree.len(), reader.position());
    Ok(tree)
}

/// Appends one member. Header fields are derived from the entry itself,
/// `size` from the payload and `name_size` from the name.
pub fn write_entry(out: &mut Vec<u8>, entry: &CpioEntry) -> Result<()> {
    if !entry.carries_payload() && !entry.payload.is_empty() {
        return Err(Error::UnexpectedPayload {
            name: entry.name.clone(),
            size: entry.size(),
        });
    }

    let fields: [(&'static str, u64); FIELD_COUNT] = [
        ("inode", entry.inode),
        ("mode", entry.mode as u64),
        ("uid", entry.uid as u64),
        ("gid", entry.gid as u64),
        ("link_count", entry.link_count as u64),
        ("mtime", entry.mtime),
        ("size", entry.size()),
        ("device_major", entry.device_major as u64),
        ("device_minor", entry.device_minor as u64),
        ("ref_device_major", entry.ref_device_major as u64),
        ("ref_device_minor", entry.ref_device_minor as u64),
        ("name_size", entry.name_size()),
        ("checksum", entry.checksum as u64),
    ];

    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(NEWC_MAGIC);
    for (field, value) in fields {
        let value = u32::try_from(value).map_err(|_| Error::FieldOverflow {
            field,
            name: entry.name.clone(),
            value,
        })?;
        write_field(&mut header, value);
    }

    out.extend_from_slice(&header);
    out.extend_from_slice(entry.name.as_bytes());
    out.push(0);
    pad_to(out, 4);
    out.extend_from_slice(&entry.payload);
    pad_to(out, 4);
    Ok(())
}

/// Encodes a valid tree followed by the trailer, padded to a 512-byte block.
pub fn encode(tree: &Tree) -> Result<Vec<u8>> {
    tree.validate()?;

    let entries = tree.entries();
    let mut out = Vec::new();
    for entry in &entries {
        write_entry(&mut out, entry)?;
        debug!(name = %entry.name, "encoded entry");
    }
    write_entry(&mut out, &CpioEntry::trailer())?;
    pad_to(&mut out, BLOCK_SIZE);

    info!(
        "encoded {} entries, total {} blocks",
        entries.len(),
        out.len() / BLOCK_SIZE
    );
    Ok(out)
}

impl Tree {
    pub fn from_bytes(data: &Bytes) -> Result<Tree> {
        decode(data)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(self)
    }
}
