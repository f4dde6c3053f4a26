//! Encrypted file layer — backing stores and ciphertext layout.
//!
//! # Ciphertext file layout
//!
//! ```text
//! [ header block? ][ data block 0 ][ data block 1 ] … [ final block ]
//! ```
//!
//! The header block exists iff the volume enables unique-IV.  It is exactly
//! `block_size` bytes and carries **no** MAC prefix (volumes declaring a
//! MAC-prefixed header are refused at open):
//!
//! ```text
//! Offset  Size        Field
//!    0      8         file IV            (LE u64)  ┐ stream-encrypted with
//!    8      8         plaintext size hint (LE u64) ┘ the volume key, IV 0
//!   16      rest      weak-random fill, ignored on read
//! ```
//!
//! Each data block is `[mac_bytes][rand_bytes][payload]` where the payload
//! is `block_size` bytes except for a possibly short final block.  The
//! plaintext size is therefore fully determined by the ciphertext length;
//! the header's size hint is advisory (it can go stale if the process dies
//! between a write and a sync).

use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};

pub mod encrypted;

// ── Backing store ─────────────────────────────────────────────────────────────

/// Byte-addressable backing store for one ciphertext file.
///
/// Calls may block on host I/O.  Implementations are not required to be
/// internally synchronized; the encrypted file layer serializes access
/// through its per-file mutex.
pub trait Backend: Send {
    /// Read up to `buf.len()` bytes at `offset`.  Returns bytes read; `0`
    /// means end of store.
    fn pread(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;
    /// Write `data` at `offset`, extending the store as needed.  Returns
    /// bytes written.
    fn pwrite(&self, offset: u64, data: &[u8]) -> Result<usize>;
    /// Grow or shrink the store to exactly `len` bytes.
    fn truncate(&self, len: u64) -> Result<()>;
    /// Request durable write.  `data_only` skips metadata where the host
    /// distinguishes.
    fn fsync(&self, data_only: bool) -> Result<()>;
    /// Current store length in bytes.
    fn size(&self) -> Result<u64>;
}

/// Positional I/O on a host file.
pub struct FileBackend {
    file: File,
}

impl FileBackend {
    /// Open an existing ciphertext file read-write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file })
    }

    /// Create (or truncate-open) a ciphertext file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self { file })
    }
}

impl Backend for FileBackend {
    fn pread(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file.read_at(buf, offset)?)
    }

    fn pwrite(&self, offset: u64, data: &[u8]) -> Result<usize> {
        Ok(self.file.write_at(data, offset)?)
    }

    fn truncate(&self, len: u64) -> Result<()> {
        Ok(self.file.set_len(len)?)
    }

    fn fsync(&self, data_only: bool) -> Result<()> {
        if data_only {
            Ok(self.file.sync_data()?)
        } else {
            Ok(self.file.sync_all()?)
        }
    }

    fn size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

/// In-memory backing store for tests and embedding.  Cloning shares the
/// underlying buffer, so a test can keep a handle to tamper with or inspect
/// bytes the encrypted layer owns.
#[derive(Clone, Default)]
pub struct MemBackend {
    data: Arc<Mutex<Vec<u8>>>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the raw stored bytes.
    pub fn with_bytes<T>(&self, f: impl FnOnce(&mut Vec<u8>) -> T) -> T {
        f(&mut self.data.lock())
    }
}

impl Backend for MemBackend {
    fn pread(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let data = self.data.lock();
        let off = offset as usize;
        if off >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - off);
        buf[..n].copy_from_slice(&data[off..off + n]);
        Ok(n)
    }

    fn pwrite(&self, offset: u64, src: &[u8]) -> Result<usize> {
        let mut data = self.data.lock();
        let end = offset as usize + src.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[offset as usize..end].copy_from_slice(src);
        Ok(src.len())
    }

    fn truncate(&self, len: u64) -> Result<()> {
        self.data.lock().resize(len as usize, 0);
        Ok(())
    }

    fn fsync(&self, _data_only: bool) -> Result<()> {
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.data.lock().len() as u64)
    }
}

// ── Block layout parameters ───────────────────────────────────────────────────

/// Per-volume layout parameters for encrypted files.
#[derive(Debug, Clone, Copy)]
pub struct FileParams {
    /// Plaintext bytes per data block.
    pub block_size: usize,
    /// Stored MAC bytes per data block; `0` disables block MACs.
    pub mac_bytes:  usize,
    /// Random prefix bytes mixed into each block MAC.
    pub rand_bytes: usize,
    /// Whether files carry a header block with a per-file IV.
    pub unique_iv:  bool,
}

impl FileParams {
    /// MAC-plus-random prefix size per data block.
    #[inline]
    pub fn overhead(&self) -> usize {
        self.mac_bytes + self.rand_bytes
    }

    /// Header bytes before data block 0.
    #[inline]
    pub fn header_len(&self) -> u64 {
        if self.unique_iv {
            self.block_size as u64
        } else {
            0
        }
    }

    /// Ciphertext offset of data block `idx`.
    #[inline]
    pub fn block_offset(&self, idx: u64) -> u64 {
        self.header_len() + idx * (self.block_size + self.overhead()) as u64
    }

    /// Ciphertext length for `plain` plaintext bytes (header included when
    /// the header exists on disk).
    pub fn ciphertext_len(&self, plain: u64) -> u64 {
        if plain == 0 {
            return self.header_len();
        }
        let b = self.block_size as u64;
        let blocks = (plain + b - 1) / b;
        self.header_len() + plain + blocks * self.overhead() as u64
    }

    /// Plaintext length implied by a ciphertext store of `ct` bytes.
    ///
    /// A trailing fragment no longer than the per-block prefix cannot hold
    /// any payload and is reported as corruption.
    pub fn plaintext_len(&self, ct: u64) -> Result<u64> {
        if ct == 0 {
            return Ok(0);
        }
        let header = self.header_len();
        if ct < header {
            return Err(Error::Integrity(format!(
                "ciphertext of {ct} bytes is shorter than the {header}-byte header"
            )));
        }
        let data = ct - header;
        if data == 0 {
            return Ok(0);
        }
        let stride = (self.block_size + self.overhead()) as u64;
        let full = data / stride;
        let rem = data % stride;
        if rem == 0 {
            return Ok(full * self.block_size as u64);
        }
        if rem <= self.overhead() as u64 {
            return Err(Error::Integrity(format!(
                "trailing ciphertext fragment of {rem} bytes holds no payload"
            )));
        }
        Ok(full * self.block_size as u64 + rem - self.overhead() as u64)
    }

    /// Reject parameter combinations the layer cannot serve.
    pub fn validate(&self, cipher_block: usize) -> Result<()> {
        if self.block_size == 0 || (cipher_block > 1 && self.block_size % cipher_block != 0) {
            return Err(Error::Invalid(format!(
                "block size {} is not a multiple of the cipher block ({cipher_block})",
                self.block_size
            )));
        }
        if self.mac_bytes > 8 || self.rand_bytes > 8 {
            return Err(Error::Invalid(
                "per-block MAC and random prefixes are limited to 8 bytes each".to_owned(),
            ));
        }
        if self.mac_bytes == 0 && self.rand_bytes != 0 {
            return Err(Error::Invalid(
                "random prefix bytes require a block MAC".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: FileParams =
        FileParams { block_size: 64, mac_bytes: 8, rand_bytes: 4, unique_iv: true };

    #[test]
    fn layout_roundtrip() {
        for plain in [0u64, 1, 63, 64, 65, 128, 1000, 4096] {
            let ct = P.ciphertext_len(plain);
            if plain == 0 {
                assert_eq!(ct, 64);
                continue;
            }
            assert_eq!(P.plaintext_len(ct).unwrap(), plain, "plain={plain}");
        }
    }

    #[test]
    fn layout_no_header_no_mac() {
        let p = FileParams { block_size: 1024, mac_bytes: 0, rand_bytes: 0, unique_iv: false };
        assert_eq!(p.ciphertext_len(0), 0);
        assert_eq!(p.ciphertext_len(2048), 2048);
        assert_eq!(p.plaintext_len(2049).unwrap(), 2049);
        assert_eq!(p.block_offset(3), 3 * 1024);
    }

    #[test]
    fn layout_rejects_prefix_only_tail() {
        // 64-byte header, one full block, then a fragment that is all prefix.
        let ct = 64 + (64 + 12) + 12;
        assert!(P.plaintext_len(ct as u64).is_err());
    }

    #[test]
    fn validate_rejects_misaligned() {
        let p = FileParams { block_size: 100, mac_bytes: 0, rand_bytes: 0, unique_iv: false };
        assert!(p.validate(16).is_err());
        let p = FileParams { block_size: 128, mac_bytes: 0, rand_bytes: 4, unique_iv: false };
        assert!(p.validate(16).is_err());
    }

    #[test]
    fn mem_backend_basics() {
        let m = MemBackend::new();
        assert_eq!(m.size().unwrap(), 0);
        m.pwrite(10, b"abc").unwrap();
        assert_eq!(m.size().unwrap(), 13);
        let mut buf = [0u8; 5];
        let n = m.pread(9, &mut buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(&buf[..4], &[0, b'a', b'b', b'c']);
        m.truncate(11).unwrap();
        assert_eq!(m.size().unwrap(), 11);
    }
}
