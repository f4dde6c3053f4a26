//! Cipher abstraction — keys, descriptors, and the capability contract.
//!
//! A cipher family is one implementation behind the flat [`Cipher`] trait:
//! key lifecycle, block mode, stream mode, keyed MAC, and access to the
//! entropy tiers.  Families are registered in [`registry`] and instantiated
//! from the algorithm descriptor found in a volume configuration.
//!
//! # Descriptors
//! An [`Interface`] is the `(name, current, age)` triple persisted on disk.
//! Compatibility is semantic-version style: a request `(n, c, a)` is
//! satisfied by an implementation `(n, c', a')` iff the names match,
//! `c' ≥ c`, and `c' − a' ≤ c`.  This gates algorithm selection at volume
//! open; there is no negotiation beyond it.
//!
//! # Keys
//! [`CipherKey`] owns raw key material and zeroes it on drop.  The only
//! operations are constant-time equality and (de)serialization through the
//! owning cipher's `write_key`/`read_key`, which wrap the material under
//! another key with an embedded keyed checksum.  Keys are shared between a
//! volume and its file handles via `Arc`; the final release zeroizes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Result;

pub mod aes;
pub mod null;
pub mod registry;

// ── Algorithm descriptor ──────────────────────────────────────────────────────

/// Versioned algorithm descriptor: family name plus `(current, age)`.
///
/// `current` is the newest revision this implementation speaks; `age` is how
/// many older revisions it still accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub name:    String,
    pub current: u32,
    pub age:     u32,
}

impl Interface {
    pub fn new(name: &str, current: u32, age: u32) -> Self {
        Self { name: name.to_owned(), current, age }
    }

    /// True if an implementation advertising `self` satisfies a request for
    /// `wanted`.
    pub fn implements(&self, wanted: &Interface) -> bool {
        self.name == wanted.name
            && self.current >= wanted.current
            && self.current - self.age <= wanted.current
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.current, self.age)
    }
}

// ── Key material ──────────────────────────────────────────────────────────────

/// Opaque, owned cipher key material.  Zeroed on destruction.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CipherKey {
    material: Vec<u8>,
}

impl CipherKey {
    pub fn from_bytes(material: Vec<u8>) -> Self {
        Self { material }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.material.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.material.is_empty()
    }

    /// Raw material.  Crate-internal: only cipher implementations and the
    /// key wrap/unwrap paths may look inside.
    #[inline]
    pub(crate) fn bytes(&self) -> &[u8] {
        &self.material
    }

    /// Constant-time equality.  Length leaks (it is public metadata);
    /// content does not.
    pub fn constant_time_eq(&self, other: &CipherKey) -> bool {
        if self.material.len() != other.material.len() {
            return false;
        }
        let mut diff = 0u8;
        for (a, b) in self.material.iter().zip(other.material.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherKey")
            .field("len", &self.material.len())
            .field("material", &"[REDACTED]")
            .finish()
    }
}

// ── Parameter ranges ──────────────────────────────────────────────────────────

/// Allowed key lengths in bits, stepped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRange {
    pub min_bits:  u32,
    pub max_bits:  u32,
    pub step_bits: u32,
}

impl KeyRange {
    pub fn contains(&self, bits: u32) -> bool {
        bits >= self.min_bits
            && bits <= self.max_bits
            && (bits - self.min_bits) % self.step_bits.max(1) == 0
    }
}

/// Allowed volume block sizes in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub min_bytes: u32,
    pub max_bytes: u32,
}

impl BlockRange {
    pub fn contains(&self, bytes: u32) -> bool {
        bytes >= self.min_bytes && bytes <= self.max_bytes
    }
}

/// Catalog record for one registered cipher family.
#[derive(Debug, Clone)]
pub struct AlgorithmInfo {
    pub name:        String,
    pub description: String,
    pub iface:       Interface,
    pub key_range:   KeyRange,
    pub block_range: BlockRange,
    /// Whether the family offers a stream mode (short final blocks are
    /// stream-encrypted instead of padded).
    pub stream_mode: bool,
    /// Suppressed from default enumeration, still constructible.
    pub hidden:      bool,
}

// ── Cipher contract ───────────────────────────────────────────────────────────

/// The flat capability interface every cipher family implements.
///
/// Instances are immutable after construction and shared freely across
/// threads; one instance serves every file handle of a volume.
pub trait Cipher: Send + Sync {
    /// Descriptor this instance was constructed for.
    fn interface(&self) -> Interface;

    // ── Key lifecycle ────────────────────────────────────────────────────

    /// Derive a key from a password.
    ///
    /// `iterations == 0` requests calibration: derivations are timed against
    /// a monotonic clock until one call reaches `target_ms`, and the count
    /// that achieved it is returned alongside the key so the caller can
    /// persist it.  A non-zero `iterations` is used as given.
    fn new_key_from_password(
        &self,
        password:   &[u8],
        iterations: u32,
        target_ms:  u64,
        salt:       &[u8],
    ) -> Result<(CipherKey, u32)>;

    /// Draw `key_size()` bytes of fresh key material from the strong
    /// entropy source.
    fn new_random_key(&self) -> Result<CipherKey>;

    /// Unwrap an `encoded_key_size()`-byte blob produced by [`write_key`].
    ///
    /// With `check` set, the embedded keyed checksum is verified and a
    /// mismatch fails with `BadKey`.
    ///
    /// [`write_key`]: Cipher::write_key
    fn read_key(&self, blob: &[u8], wrapping_key: &CipherKey, check: bool) -> Result<CipherKey>;

    /// Wrap `key` under `wrapping_key`, embedding the keyed checksum.
    /// Always `encoded_key_size()` bytes.
    fn write_key(&self, key: &CipherKey, wrapping_key: &CipherKey) -> Result<Vec<u8>>;

    /// Constant-time key equality.
    fn compare_keys(&self, a: &CipherKey, b: &CipherKey) -> bool {
        a.constant_time_eq(b)
    }

    // ── Fixed metadata ───────────────────────────────────────────────────

    /// Raw key material size in bytes.
    fn key_size(&self) -> usize;
    /// Serialized (wrapped) key blob size in bytes.
    fn encoded_key_size(&self) -> usize;
    /// Underlying primitive's block size in bytes.
    fn cipher_block_size(&self) -> usize;

    // ── Entropy ──────────────────────────────────────────────────────────

    /// Fill `buf` with entropy.  `strong` selects the OS CSPRNG; otherwise
    /// the fast source, acceptable for IVs and padding but never keys.
    fn randomize(&self, buf: &mut [u8], strong: bool) -> Result<()>;

    // ── MAC ──────────────────────────────────────────────────────────────

    /// 64-bit keyed MAC over `data`.
    ///
    /// When `chained_iv` is supplied, the previous value is mixed into the
    /// MAC input and the slot is replaced with the new MAC, so a caller can
    /// chain MACs across a sequence of inputs.
    fn mac_64(&self, data: &[u8], key: &CipherKey, chained_iv: Option<&mut u64>) -> u64;

    /// XOR-fold of [`mac_64`] to 32 bits.
    ///
    /// [`mac_64`]: Cipher::mac_64
    fn mac_32(&self, data: &[u8], key: &CipherKey, chained_iv: Option<&mut u64>) -> u32 {
        fold_32(self.mac_64(data, key, chained_iv))
    }

    /// XOR-fold of [`mac_64`] to 16 bits.
    ///
    /// [`mac_64`]: Cipher::mac_64
    fn mac_16(&self, data: &[u8], key: &CipherKey, chained_iv: Option<&mut u64>) -> u16 {
        fold_16(self.mac_64(data, key, chained_iv))
    }

    // ── Data transforms ──────────────────────────────────────────────────

    /// In-place stream encryption of arbitrary length, keyed to a 64-bit IV
    /// seed.
    fn stream_encode(&self, buf: &mut [u8], iv: u64, key: &CipherKey) -> Result<()>;
    /// Inverse of [`stream_encode`].
    ///
    /// [`stream_encode`]: Cipher::stream_encode
    fn stream_decode(&self, buf: &mut [u8], iv: u64, key: &CipherKey) -> Result<()>;

    /// In-place block encryption; `buf.len()` must be a multiple of
    /// `cipher_block_size()`.
    fn block_encode(&self, buf: &mut [u8], iv: u64, key: &CipherKey) -> Result<()>;
    /// Inverse of [`block_encode`].
    ///
    /// [`block_encode`]: Cipher::block_encode
    fn block_decode(&self, buf: &mut [u8], iv: u64, key: &CipherKey) -> Result<()>;
}

/// Shared cipher instance handle.
pub type CipherRef = Arc<dyn Cipher>;

// ── MAC folding ───────────────────────────────────────────────────────────────

#[inline]
pub(crate) fn fold_32(mac: u64) -> u32 {
    (mac >> 32) as u32 ^ (mac & 0xffff_ffff) as u32
}

#[inline]
pub(crate) fn fold_16(mac: u64) -> u16 {
    let w = fold_32(mac);
    (w >> 16) as u16 ^ (w & 0xffff) as u16
}
