//! Versioned, checksum-verified snapshot envelope.
//!
//! A bare shared-file snapshot with only a size-equal check is brittle
//! against partial writes and format drift, so this adds a magic +
//! version + CRC header on top. This module is that header, plus the
//! read/write/restore logic for the two redundant files.
//!
//! Soft-recovery preference order on startup: if both files
//! exist, are well-formed, and are identical in size, prefer the one
//! the worker itself wrote most recently (`child`); otherwise whichever
//! one validates; otherwise fresh init.

use crc::{Crc, CRC_32_ISCSI};
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

/// Magic value identifying an ASI persisted-state file.
pub const SNAPSHOT_MAGIC: u64 = 0x4153495F53584D21; // "ASI_SXM!"

/// Current snapshot format version. Bump on any layout-incompatible change.
pub const SNAPSHOT_FORMAT_VERSION: u16 = 1;

static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Fixed-size header prefixed to every persisted payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: u64,
    pub format_version: u16,
    pub payload_len: u32,
    pub crc32: u32,
}

/// Size of the serialized header, in bytes.
pub const SNAPSHOT_HEADER_LEN: usize = 8 + 2 + 4 + 4;

impl SnapshotHeader {
    fn serialize(self) -> [u8; SNAPSHOT_HEADER_LEN] {
        let mut buf = [0u8; SNAPSHOT_HEADER_LEN];
        buf[0..8].copy_from_slice(&self.magic.to_le_bytes());
        buf[8..10].copy_from_slice(&self.format_version.to_le_bytes());
        buf[10..14].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[14..18].copy_from_slice(&self.crc32.to_le_bytes());
        buf
    }

    fn parse(buf: &[u8]) -> Result<Self, PersistenceError> {
        if buf.len() < SNAPSHOT_HEADER_LEN {
            return Err(PersistenceError::Truncated);
        }
        let magic = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let format_version = u16::from_le_bytes(buf[8..10].try_into().unwrap());
        let payload_len = u32::from_le_bytes(buf[10..14].try_into().unwrap());
        let crc32 = u32::from_le_bytes(buf[14..18].try_into().unwrap());
        if magic != SNAPSHOT_MAGIC {
            return Err(PersistenceError::BadMagic);
        }
        if format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(PersistenceError::UnsupportedVersion(format_version));
        }
        Ok(Self { magic, format_version, payload_len, crc32 })
    }
}

/// Errors reading or writing a persisted snapshot.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot file truncated")]
    Truncated,
    #[error("snapshot magic mismatch")]
    BadMagic,
    #[error("unsupported snapshot format version {0}")]
    UnsupportedVersion(u16),
    #[error("snapshot crc mismatch: header={header:#010x} computed={computed:#010x}")]
    CrcMismatch { header: u32, computed: u32 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write `payload` to `path` as a header-wrapped, checksummed snapshot.
///
/// Writes to a temporary sibling file and renames into place so a
/// concurrent reader never observes a half-written file.
pub fn write_snapshot(path: &Path, payload: &[u8]) -> Result<(), PersistenceError> {
    let header = SnapshotHeader {
        magic: SNAPSHOT_MAGIC,
        format_version: SNAPSHOT_FORMAT_VERSION,
        payload_len: payload.len() as u32,
        crc32: CRC32.checksum(payload),
    };

    let tmp_path = path.with_extension("tmp");
    {
        let mut f = std::fs::File::create(&tmp_path)?;
        f.write_all(&header.serialize())?;
        f.write_all(payload)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read and validate a snapshot written by [`write_snapshot`].
pub fn read_snapshot(path: &Path) -> Result<Vec<u8>, PersistenceError> {
    let mut f = std::fs::File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;

    let header = SnapshotHeader::parse(&buf)?;
    let payload = &buf[SNAPSHOT_HEADER_LEN..];
    if payload.len() != header.payload_len as usize {
        return Err(PersistenceError::Truncated);
    }
    let computed = CRC32.checksum(payload);
    if computed != header.crc32 {
        return Err(PersistenceError::CrcMismatch { header: header.crc32, computed });
    }
    Ok(payload.to_vec())
}

/// Restore preference per spec §6: prefer `child_path` if both files
/// validate; otherwise whichever validates; otherwise `None` (fresh
/// init).
pub fn restore_preferred(
    child_path: &Path,
    parent_path: &Path,
) -> Option<Vec<u8>> {
    let child = read_snapshot(child_path).ok();
    let parent = read_snapshot(parent_path).ok();
    match (child, parent) {
        (Some(c), _) => Some(c),
        (None, Some(p)) => Some(p),
        (None, None) => None,
    }
}
