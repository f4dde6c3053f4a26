//! Encrypted file I/O — a plaintext byte-addressable view over a ciphertext
//! backing store.
//!
//! Every read, write, truncate, and sync holds the per-file mutex for the
//! whole operation.  The lock is coarse on purpose: all cipher work happens
//! under it, so a truncate can never interleave with a write's
//! read-modify-write of the same block.  Different files proceed in
//! parallel; the shared cipher instance is immutable.
//!
//! # Per-block IVs
//! Data block `i` is encrypted with IV seed `file_iv ⊕ external_iv ⊕ i`.
//! `file_iv` comes from the header block (zero when unique-IV is off);
//! `external_iv` is the name-chain IV of the file's path when the volume
//! chains external IVs, zero otherwise.
//!
//! # Handle states
//!
//! ```text
//! open() ──► OPEN ──► close() ──► CLOSED
//!              │
//!              └─ I/O or integrity failure ──► DEGRADED (close only)
//! ```
//!
//! A degraded handle keeps returning the failure kind that degraded it;
//! only `close` is still honored.  MAC failures surface before any
//! write-back, so a failed read-modify-write never leaves a partial update.

use byteorder::{ByteOrder, LittleEndian};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::cipher::{CipherKey, CipherRef};
use crate::error::{Error, ErrorKind, Result};
use crate::file::{Backend, FileParams};
use crate::rng;

// ── Handle state ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Degraded(ErrorKind),
    Closed,
}

struct Inner {
    backend:        Box<dyn Backend>,
    state:          State,
    /// Per-file IV from the header block; zero when unique-IV is disabled.
    file_iv:        u64,
    /// Name-chain IV of the file's path; zero unless the volume chains
    /// external IVs.
    external_iv:    u64,
    /// Whether the header block exists on disk yet (it is written lazily on
    /// the first write to a fresh file).
    header_on_disk: bool,
    /// Cached plaintext size; authoritative for all offset math.
    size:           u64,
    /// Size hint in the on-disk header is stale.
    hint_dirty:     bool,
}

/// A plaintext view over one ciphertext backing store.
pub struct EncryptedFile {
    cipher: CipherRef,
    key:    Arc<CipherKey>,
    params: FileParams,
    inner:  Mutex<Inner>,
}

impl EncryptedFile {
    // ── Open ─────────────────────────────────────────────────────────────

    /// Open a ciphertext store.
    ///
    /// For a fresh (empty) store under unique-IV, a file IV is synthesized
    /// from strong entropy now and persisted with the header block on the
    /// first write.  For an existing store the header is read and the
    /// plaintext size derived from the ciphertext length; the header's size
    /// hint is only cross-checked.
    pub fn open(
        backend:     Box<dyn Backend>,
        cipher:      CipherRef,
        key:         Arc<CipherKey>,
        params:      FileParams,
        external_iv: u64,
    ) -> Result<Self> {
        params.validate(cipher.cipher_block_size())?;

        let ct_len = backend.size()?;
        let mut file_iv = 0u64;
        let mut header_on_disk = false;
        let size;

        if params.unique_iv {
            if ct_len == 0 {
                while file_iv == 0 {
                    file_iv = rng::strong_random_u64()?;
                }
                size = 0;
            } else {
                let mut header = vec![0u8; params.block_size];
                read_exact_at(backend.as_ref(), 0, &mut header)?;
                cipher.stream_decode(&mut header[..16], 0, &key)?;
                file_iv = LittleEndian::read_u64(&header[0..8]);
                let hint = LittleEndian::read_u64(&header[8..16]);
                header_on_disk = true;
                size = params.plaintext_len(ct_len)?;
                if hint != size {
                    log::debug!("stale plaintext size hint {hint} (ciphertext implies {size})");
                }
            }
        } else {
            size = params.plaintext_len(ct_len)?;
        }

        log::debug!(
            "opened encrypted file: {size} plaintext bytes, block {}, mac {}+{}",
            params.block_size,
            params.mac_bytes,
            params.rand_bytes
        );

        Ok(Self {
            cipher,
            key,
            params,
            inner: Mutex::new(Inner {
                backend,
                state: State::Open,
                file_iv,
                external_iv,
                header_on_disk,
                size,
                hint_dirty: false,
            }),
        })
    }

    // ── Public operations ────────────────────────────────────────────────

    /// Read into `buf` starting at plaintext `offset`.  Returns bytes read,
    /// clamped at end of file.
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.locked("read", |me, inner| {
            if buf.is_empty() || offset >= inner.size {
                return Ok(0);
            }
            let b = me.params.block_size as u64;
            let len = (buf.len() as u64).min(inner.size - offset) as usize;
            let first = offset / b;
            let last = (offset + len as u64 - 1) / b;

            let mut copied = 0usize;
            for idx in first..=last {
                let plain = me.read_block(inner, idx)?;
                let block_start = idx * b;
                let from = if idx == first { (offset - block_start) as usize } else { 0 };
                let take = (len - copied).min(plain.len() - from);
                buf[copied..copied + take].copy_from_slice(&plain[from..from + take]);
                copied += take;
            }
            Ok(copied)
        })
    }

    /// Write `data` at plaintext `offset`, extending the file with zeros
    /// first if `offset` lies past end of file.  Returns bytes written.
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<usize> {
        self.locked("write", |me, inner| {
            if data.is_empty() {
                return Ok(0);
            }
            me.ensure_header(inner)?;
            if offset > inner.size {
                me.grow(inner, offset)?;
            }

            let b = me.params.block_size as u64;
            let end = offset + data.len() as u64;
            let first = offset / b;
            let last = (end - 1) / b;

            for idx in first..=last {
                let block_start = idx * b;
                let dstart = offset.max(block_start);
                let dend = end.min(block_start + b);
                let old_len = (inner.size.saturating_sub(block_start)).min(b) as usize;
                let new_len = (inner.size.max(end) - block_start).min(b) as usize;

                // Old bytes survive in this block iff the write leaves a
                // prefix or a suffix of prior content intact.
                let keeps_old = old_len > 0
                    && (dstart > block_start || dend < block_start + old_len as u64);
                let mut plain = if keeps_old {
                    me.read_block(inner, idx)?
                } else {
                    Vec::new()
                };
                plain.resize(new_len, 0);

                let s = (dstart - block_start) as usize;
                let e = (dend - block_start) as usize;
                plain[s..e].copy_from_slice(&data[(dstart - offset) as usize..(dend - offset) as usize]);
                me.write_block(inner, idx, &plain)?;
            }

            if end > inner.size {
                inner.size = end;
                inner.hint_dirty = true;
            }
            Ok(data.len())
        })
    }

    /// Set the plaintext length to `len`, zero-filling on growth.
    pub fn truncate(&self, len: u64) -> Result<()> {
        self.locked("truncate", |me, inner| {
            if len == inner.size {
                return Ok(());
            }
            me.ensure_header(inner)?;
            if len > inner.size {
                return me.grow(inner, len);
            }
            me.shrink(inner, len)
        })
    }

    /// Flush the size hint into the header block (full sync only), then ask
    /// the backing store for durability.
    pub fn sync(&self, data_only: bool) -> Result<()> {
        self.locked("sync", |me, inner| {
            if !data_only && inner.header_on_disk && inner.hint_dirty {
                me.write_header(inner)?;
            }
            inner.backend.fsync(data_only)
        })
    }

    /// Cached plaintext size.
    pub fn size(&self) -> Result<u64> {
        self.locked("size", |_, inner| Ok(inner.size))
    }

    /// Close the handle.  Flushes a stale size hint when the handle is
    /// healthy; always leaves the handle `CLOSED`.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let result = match inner.state {
            State::Closed => Err(Error::Invalid("file handle already closed".to_owned())),
            State::Degraded(_) => Ok(()),
            State::Open => {
                if inner.header_on_disk && inner.hint_dirty {
                    self.write_header(&mut inner)
                } else {
                    Ok(())
                }
            }
        };
        inner.state = State::Closed;
        result
    }

    // ── Locking and state bookkeeping ────────────────────────────────────

    fn locked<T>(
        &self,
        op: &str,
        f: impl FnOnce(&Self, &mut Inner) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Open => {}
            State::Closed => {
                return Err(Error::Invalid(format!("{op} on a closed file handle")));
            }
            State::Degraded(kind) => return Err(degraded_error(kind)),
        }
        let result = f(self, &mut inner);
        if let Err(ref e) = result {
            if matches!(e.kind(), ErrorKind::Io | ErrorKind::Integrity) {
                log::warn!("file handle degraded after {op} failure: {e}");
                inner.state = State::Degraded(e.kind());
            }
        }
        result
    }

    // ── Block plumbing ───────────────────────────────────────────────────

    #[inline]
    fn block_iv(&self, inner: &Inner, idx: u64) -> u64 {
        inner.file_iv ^ inner.external_iv ^ idx
    }

    /// Read and decrypt data block `idx`.  The expected payload length is
    /// derived from the cached plaintext size; anything shorter on disk is
    /// corruption, not EOF.
    fn read_block(&self, inner: &mut Inner, idx: u64) -> Result<Vec<u8>> {
        let b = self.params.block_size as u64;
        let block_start = idx * b;
        debug_assert!(inner.size > block_start);
        let payload = (inner.size - block_start).min(b) as usize;
        let overhead = self.params.overhead();

        let mut buf = vec![0u8; overhead + payload];
        read_exact_at(inner.backend.as_ref(), self.params.block_offset(idx), &mut buf)?;

        if self.params.mac_bytes > 0 {
            let mut chain = idx;
            let mac = self
                .cipher
                .mac_64(&buf[self.params.mac_bytes..], &self.key, Some(&mut chain));
            let mac_le = mac.to_le_bytes();
            let expect = &mac_le[..self.params.mac_bytes];
            if expect != &buf[..self.params.mac_bytes] {
                return Err(Error::Integrity(format!(
                    "MAC mismatch in data block {idx} (got {}, expected {})",
                    hex::encode(&buf[..self.params.mac_bytes]),
                    hex::encode(expect),
                )));
            }
        }

        let mut plain = buf.split_off(overhead);
        let iv = self.block_iv(inner, idx);
        if plain.len() == self.params.block_size {
            self.cipher.block_decode(&mut plain, iv, &self.key)?;
        } else {
            self.cipher.stream_decode(&mut plain, iv, &self.key)?;
        }
        Ok(plain)
    }

    /// Encrypt and write data block `idx` (encrypt-then-MAC).
    fn write_block(&self, inner: &mut Inner, idx: u64, plain: &[u8]) -> Result<()> {
        debug_assert!(!plain.is_empty() && plain.len() <= self.params.block_size);
        let overhead = self.params.overhead();

        let mut buf = vec![0u8; overhead + plain.len()];
        buf[overhead..].copy_from_slice(plain);

        let iv = self.block_iv(inner, idx);
        if plain.len() == self.params.block_size {
            self.cipher.block_encode(&mut buf[overhead..], iv, &self.key)?;
        } else {
            self.cipher.stream_encode(&mut buf[overhead..], iv, &self.key)?;
        }

        if self.params.rand_bytes > 0 {
            rng::weak_random(&mut buf[self.params.mac_bytes..overhead]);
        }
        if self.params.mac_bytes > 0 {
            let mut chain = idx;
            let mac = self
                .cipher
                .mac_64(&buf[self.params.mac_bytes..], &self.key, Some(&mut chain));
            buf[..self.params.mac_bytes]
                .copy_from_slice(&mac.to_le_bytes()[..self.params.mac_bytes]);
        }

        write_all_at(inner.backend.as_ref(), self.params.block_offset(idx), &buf)
    }

    /// Make sure the header block exists on disk (no-op without unique-IV).
    fn ensure_header(&self, inner: &mut Inner) -> Result<()> {
        if !self.params.unique_iv || inner.header_on_disk {
            return Ok(());
        }
        self.write_header(inner)?;
        inner.header_on_disk = true;
        Ok(())
    }

    fn write_header(&self, inner: &mut Inner) -> Result<()> {
        let mut block = vec![0u8; self.params.block_size];
        rng::weak_random(&mut block);
        LittleEndian::write_u64(&mut block[0..8], inner.file_iv);
        LittleEndian::write_u64(&mut block[8..16], inner.size);
        self.cipher.stream_encode(&mut block[..16], 0, &self.key)?;
        write_all_at(inner.backend.as_ref(), 0, &block)?;
        inner.hint_dirty = false;
        Ok(())
    }

    /// Zero-extend the plaintext to `target` bytes.
    fn grow(&self, inner: &mut Inner, target: u64) -> Result<()> {
        let b = self.params.block_size as u64;
        let old = inner.size;
        debug_assert!(target > old);

        let mut pos = old;
        if old % b != 0 {
            // Widen the existing partial block as far as `target` reaches.
            let idx = old / b;
            let block_start = idx * b;
            let new_len = b.min(target - block_start) as usize;
            let mut plain = self.read_block(inner, idx)?;
            plain.resize(new_len, 0);
            self.write_block(inner, idx, &plain)?;
            pos = block_start + new_len as u64;
        }
        let zeros = vec![0u8; self.params.block_size];
        while pos < target {
            let idx = pos / b;
            let len = b.min(target - pos) as usize;
            self.write_block(inner, idx, &zeros[..len])?;
            pos += len as u64;
        }
        inner.size = target;
        inner.hint_dirty = true;
        Ok(())
    }

    /// Shrink the plaintext to `target` bytes and drop the ciphertext tail.
    fn shrink(&self, inner: &mut Inner, target: u64) -> Result<()> {
        debug_assert!(target < inner.size);
        let b = self.params.block_size as u64;

        if target == 0 {
            inner.backend.truncate(if inner.header_on_disk { self.params.header_len() } else { 0 })?;
        } else {
            let idx = (target - 1) / b;
            let keep = (target - idx * b) as usize;
            if keep < self.params.block_size {
                // The cut lands inside this block: re-encrypt the kept
                // prefix as a short block before dropping the tail.
                let mut plain = self.read_block(inner, idx)?;
                plain.truncate(keep);
                self.write_block(inner, idx, &plain)?;
            }
            inner
                .backend
                .truncate(self.params.block_offset(idx) + (self.params.overhead() + keep) as u64)?;
        }
        inner.size = target;
        inner.hint_dirty = true;
        Ok(())
    }
}

fn degraded_error(kind: ErrorKind) -> Error {
    match kind {
        ErrorKind::Integrity => {
            Error::Integrity("file handle degraded by an earlier integrity failure".to_owned())
        }
        _ => Error::Io(std::io::Error::other(
            "file handle degraded by an earlier I/O failure",
        )),
    }
}

// ── Backing-store helpers ─────────────────────────────────────────────────────

/// Fill `buf` from `offset` or fail.  A short read inside the expected
/// range is corruption: the cached plaintext size promised these bytes.
fn read_exact_at(backend: &dyn Backend, offset: u64, buf: &mut [u8]) -> Result<()> {
    let mut done = 0usize;
    while done < buf.len() {
        let n = backend.pread(offset + done as u64, &mut buf[done..])?;
        if n == 0 {
            return Err(Error::Integrity(format!(
                "ciphertext ends {} bytes short of the expected block extent",
                buf.len() - done
            )));
        }
        done += n;
    }
    Ok(())
}

fn write_all_at(backend: &dyn Backend, offset: u64, data: &[u8]) -> Result<()> {
    let mut done = 0usize;
    while done < data.len() {
        let n = backend.pwrite(offset + done as u64, &data[done..])?;
        if n == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "backing store accepted no bytes",
            )));
        }
        done += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::registry;
    use crate::file::MemBackend;

    const PARAMS: FileParams =
        FileParams { block_size: 64, mac_bytes: 8, rand_bytes: 4, unique_iv: true };

    fn make_file(backend: MemBackend, params: FileParams) -> EncryptedFile {
        let cipher = registry::new_cipher_by_name("aes", Some(256)).unwrap();
        let key = Arc::new(cipher.new_random_key().unwrap());
        EncryptedFile::open(Box::new(backend), cipher, key, params, 0).unwrap()
    }

    /// Reopen over the same backing bytes with the same key material.
    fn reopen(
        backend: MemBackend,
        cipher: CipherRef,
        key: Arc<CipherKey>,
        params: FileParams,
    ) -> EncryptedFile {
        EncryptedFile::open(Box::new(backend), cipher, key, params, 0).unwrap()
    }

    #[test]
    fn fresh_file_is_empty() {
        let f = make_file(MemBackend::new(), PARAMS);
        assert_eq!(f.size().unwrap(), 0);
        let mut buf = [0u8; 16];
        assert_eq!(f.read(0, &mut buf).unwrap(), 0);
    }

    #[test]
    fn partial_block_write() {
        let f = make_file(MemBackend::new(), PARAMS);
        f.write(30, b"hello").unwrap();
        assert_eq!(f.size().unwrap(), 35);

        let mut buf = [0xFFu8; 64];
        let n = f.read(0, &mut buf).unwrap();
        assert_eq!(n, 35);
        assert!(buf[..30].iter().all(|&b| b == 0));
        assert_eq!(&buf[30..35], b"hello");
    }

    #[test]
    fn write_then_read_spanning_blocks() {
        let f = make_file(MemBackend::new(), PARAMS);
        let data: Vec<u8> = (0..300).map(|i| (i % 251) as u8).collect();
        f.write(10, &data).unwrap();

        let mut back = vec![0u8; 300];
        assert_eq!(f.read(10, &mut back).unwrap(), 300);
        assert_eq!(back, data);

        // Overwrite a range crossing block boundaries.
        f.write(60, &[0xAB; 10]).unwrap();
        let mut piece = [0u8; 12];
        f.read(59, &mut piece).unwrap();
        assert_eq!(piece[0], data[49]);
        assert!(piece[1..11].iter().all(|&b| b == 0xAB));
        assert_eq!(piece[11], data[60]);
    }

    #[test]
    fn persists_across_reopen() {
        let backend = MemBackend::new();
        let cipher = registry::new_cipher_by_name("aes", Some(256)).unwrap();
        let key = Arc::new(cipher.new_random_key().unwrap());

        let data: Vec<u8> = (0u8..=255).cycle().take(1000).collect();
        {
            let f = EncryptedFile::open(
                Box::new(backend.clone()),
                cipher.clone(),
                key.clone(),
                PARAMS,
                0,
            )
            .unwrap();
            f.write(0, &data).unwrap();
            f.sync(false).unwrap();
            f.close().unwrap();
        }

        let f = reopen(backend, cipher, key, PARAMS);
        assert_eq!(f.size().unwrap(), 1000);
        let mut back = vec![0u8; 1000];
        assert_eq!(f.read(0, &mut back).unwrap(), 1000);
        assert_eq!(back, data);
    }

    #[test]
    fn ciphertext_hides_plaintext() {
        let backend = MemBackend::new();
        let f = make_file(backend.clone(), PARAMS);
        f.write(0, b"confidential-content").unwrap();
        let raw = backend.with_bytes(|b| b.clone());
        assert!(!raw
            .windows(12)
            .any(|w| w == b"confidential"));
    }

    #[test]
    fn tampered_block_fails_and_degrades() {
        let backend = MemBackend::new();
        let f = make_file(backend.clone(), PARAMS);
        f.write(0, &[0x5A; 128]).unwrap();

        // Flip one payload byte inside data block 0.
        let off = PARAMS.block_offset(0) as usize + PARAMS.overhead() + 3;
        backend.with_bytes(|b| b[off] ^= 0x01);

        let mut buf = [0u8; 1];
        match f.read(0, &mut buf) {
            Err(Error::Integrity(_)) => {}
            other => panic!("expected Integrity, got {other:?}"),
        }
        // Handle is degraded: same kind again, even for untouched blocks.
        assert!(matches!(f.read(64, &mut buf), Err(Error::Integrity(_))));
        // close is still honored.
        f.close().unwrap();
    }

    #[test]
    fn rmw_mac_failure_prevents_write_back() {
        let backend = MemBackend::new();
        let f = make_file(backend.clone(), PARAMS);
        f.write(0, &[7u8; 64]).unwrap();

        let snapshot = backend.with_bytes(|b| b.clone());
        let off = PARAMS.block_offset(0) as usize + PARAMS.overhead();
        backend.with_bytes(|b| b[off] ^= 0xFF);
        let tampered = backend.with_bytes(|b| b.clone());

        // Writing 1 byte into the block forces a read-modify-write, which
        // must fail on MAC and write nothing.
        assert!(f.write(5, b"x").is_err());
        let after = backend.with_bytes(|b| b.clone());
        assert_eq!(after, tampered);
        assert_ne!(after, snapshot);
    }

    #[test]
    fn truncate_down_and_read_past() {
        let f = make_file(MemBackend::new(), PARAMS);
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        f.write(0, &data).unwrap();

        f.truncate(100).unwrap();
        assert_eq!(f.size().unwrap(), 100);

        let mut buf = vec![0u8; 1000];
        let n = f.read(50, &mut buf).unwrap();
        assert_eq!(n, 50);
        assert_eq!(&buf[..50], &data[50..100]);
    }

    #[test]
    fn truncate_up_reads_zero() {
        let f = make_file(MemBackend::new(), PARAMS);
        f.write(0, &[9u8; 100]).unwrap();
        f.truncate(400).unwrap();
        assert_eq!(f.size().unwrap(), 400);

        let mut buf = vec![0u8; 300];
        assert_eq!(f.read(100, &mut buf).unwrap(), 300);
        assert!(buf.iter().all(|&b| b == 0));
        // Original bytes survive.
        let mut head = [0u8; 100];
        f.read(0, &mut head).unwrap();
        assert!(head.iter().all(|&b| b == 9));
    }

    #[test]
    fn truncate_to_block_boundary_skips_rewrite() {
        let f = make_file(MemBackend::new(), PARAMS);
        f.write(0, &[3u8; 200]).unwrap();
        f.truncate(128).unwrap();
        let mut buf = vec![0u8; 200];
        assert_eq!(f.read(0, &mut buf).unwrap(), 128);
        assert!(buf[..128].iter().all(|&b| b == 3));
    }

    #[test]
    fn sparse_write_past_eof_zero_fills() {
        let f = make_file(MemBackend::new(), PARAMS);
        f.write(200, b"tail").unwrap();
        assert_eq!(f.size().unwrap(), 204);
        let mut buf = vec![0u8; 204];
        f.read(0, &mut buf).unwrap();
        assert!(buf[..200].iter().all(|&b| b == 0));
        assert_eq!(&buf[200..], b"tail");
    }

    #[test]
    fn no_mac_no_header_layout() {
        let params = FileParams { block_size: 64, mac_bytes: 0, rand_bytes: 0, unique_iv: false };
        let backend = MemBackend::new();
        let f = make_file(backend.clone(), params);
        f.write(0, &[1u8; 65]).unwrap();
        // Ciphertext length equals plaintext length exactly.
        assert_eq!(backend.size().unwrap(), 65);
        let mut buf = [0u8; 65];
        assert_eq!(f.read(0, &mut buf).unwrap(), 65);
        assert!(buf.iter().all(|&b| b == 1));
    }

    #[test]
    fn closed_handle_rejects_operations() {
        let f = make_file(MemBackend::new(), PARAMS);
        f.close().unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(f.read(0, &mut buf), Err(Error::Invalid(_))));
        assert!(matches!(f.write(0, b"x"), Err(Error::Invalid(_))));
        assert!(f.close().is_err());
    }

    #[test]
    fn external_iv_separates_ciphertexts() {
        let cipher = registry::new_cipher_by_name("aes", Some(256)).unwrap();
        let key = Arc::new(cipher.new_random_key().unwrap());
        let params = FileParams { block_size: 64, mac_bytes: 0, rand_bytes: 0, unique_iv: false };

        let (ba, bb) = (MemBackend::new(), MemBackend::new());
        let fa = EncryptedFile::open(Box::new(ba.clone()), cipher.clone(), key.clone(), params, 0x1234)
            .unwrap();
        let fb = EncryptedFile::open(Box::new(bb.clone()), cipher, key, params, 0x5678).unwrap();
        fa.write(0, &[0u8; 64]).unwrap();
        fb.write(0, &[0u8; 64]).unwrap();
        assert_ne!(ba.with_bytes(|b| b.clone()), bb.with_bytes(|b| b.clone()));
    }
}
