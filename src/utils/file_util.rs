use crate::error::{Error, Result};
use crate::utils::{CpioEntry, Tree, decode, encode};
use bytes::Bytes;
use flate2::{Compression, read::MultiGzDecoder, write::GzEncoder};
use ignore::WalkBuilder;
use std::{
    fs, io,
    io::{Read, Write},
    os::unix::{ffi::OsStringExt, fs::MetadataExt},
    path::Path,
};
use tracing::{debug, info};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
pub const DEFAULT_GZIP_LEVEL: u32 = 9;

/// How images are written back to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOptions {
    /// gzip level, `None` for a bare cpio stream
    pub compression: Option<u32>,
}

impl Default for ImageOptions {
    fn default() -> Self {
        ImageOptions {
            compression: Some(DEFAULT_GZIP_LEVEL),
        }
    }
}

pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

/// Reads an image, gunzipping it when it starts with the gzip magic.
pub fn read_image(path: &Path) -> Result<Bytes> {
    let raw = fs::read(path)?;
    if !is_gzip(&raw) {
        debug!("{} is not gzip-compressed", path.display());
        return Ok(Bytes::from(raw));
    }

    let mut decoder = MultiGzDecoder::new(&raw[..]);
    let mut data = Vec::new();
    decoder.read_to_end(&mut data)?;
    info!("decompressed {} bytes to {}", raw.len(), data.len());
    Ok(Bytes::from(data))
}

pub fn write_image(path: &Path, data: &[u8], options: &ImageOptions) -> Result<()> {
    match options.compression {
        Some(level) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
            encoder.write_all(data)?;
            let compressed = encoder.finish()?;
            info!("compressed {} bytes to {}", data.len(), compressed.len());
            fs::write(path, compressed)?;
        }
        None => fs::write(path, data)?,
    }
    Ok(())
}

pub fn load_tree(image: &Path) -> Result<Tree> {
    decode(&read_image(image)?)
}

pub fn save_tree(tree: &Tree, image: &Path, options: &ImageOptions) -> Result<()> {
    write_image(image, &encode(tree)?, options)
}

fn narrow(field: &'static str, name: &str, value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::FieldOverflow {
        field,
        name: name.to_string(),
        value,
    })
}

/// Describes one local file, directory, symlink or special file as an entry
/// named `name`. Symlinks are not followed.
pub fn local_entry(local: &Path, name: String, inode: u64) -> Result<CpioEntry> {
    let metadata = fs::symlink_metadata(local)?;
    let file_type = metadata.file_type();

    let payload = if file_type.is_symlink() {
        Bytes::from(fs::read_link(local)?.into_os_string().into_vec())
    } else if file_type.is_file() {
        Bytes::from(fs::read(local)?)
    } else {
        Bytes::new()
    };

    let dev = metadata.dev();
    let rdev = metadata.rdev();
    Ok(CpioEntry {
        inode,
        mode: metadata.mode(),
        uid: metadata.uid(),
        gid: metadata.gid(),
        link_count: narrow("link_count", &name, metadata.nlink())?,
        mtime: metadata.mtime().max(0) as u64,
        device_major: narrow("device_major", &name, dev >> 8)?,
        device_minor: (dev & 0xff) as u32,
        ref_device_major: narrow("ref_device_major", &name, rdev >> 8)?,
        ref_device_minor: (rdev & 0xff) as u32,
        checksum: 0,
        name,
        payload,
    })
}

/// Walks `root` depth-first, parents before children, and describes every
/// member. The walk root becomes `.`; inodes are numbered from 1 in walk
/// order since host inode numbers may not fit the header.
pub fn collect_local_entries(root: &Path) -> Result<Vec<CpioEntry>> {
    if !fs::metadata(root)?.is_dir() {
        return Err(Error::NotADirectory(root.display().to_string()));
    }

    let mut entries = Vec::new();
    for result in WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build()
    {
        let dir_entry = result.map_err(io::Error::other)?;
        let relative = dir_entry
            .path()
            .strip_prefix(root)
            .map_err(|_| Error::InvalidPath(dir_entry.path().display().to_string()))?;

        let name = if relative.as_os_str().is_empty() {
            ".".to_string()
        } else {
            relative
                .to_str()
                .ok_or_else(|| Error::InvalidPath(format!("non-UTF-8 path {}", relative.display())))?
                .to_string()
        };

        let entry = local_entry(dir_entry.path(), name, entries.len() as u64 + 1)?;
        debug!(name = %entry.name, size = entry.size(), "collected");
        entries.push(entry);
    }

    info!("collected {} entries from {}", entries.len(), root.display());
    Ok(entries)
}
