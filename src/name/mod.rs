//! Name codec — reversible encryption of path components.
//!
//! A codec turns one plaintext path component into a filesystem-safe
//! ciphertext string and back.  Three variants, selected by the name-codec
//! descriptor in the volume configuration:
//!
//! | Family     | Transform                                             |
//! |------------|-------------------------------------------------------|
//! | `null`     | identity (filename encryption disabled)               |
//! | `block`    | pad to cipher block, block-encrypt, base-64 encode    |
//! | `stream`   | stream-encrypt (length-preserving), base-64 encode    |
//! | `block32`  | `block` with the base-32 alphabet (case-folding hosts)|
//! | `stream32` | `stream` with the base-32 alphabet                    |
//!
//! # IV chaining
//! With `chained_name_iv` enabled, the caller threads a 64-bit IV
//! accumulator through `encode_name`/`decode_name` calls from the volume
//! root downward.  Each call mixes the MAC of the component's plaintext
//! into the accumulator, so the same filename encrypts differently in
//! different directories, yet the chain is reproducible top-down when
//! walking a path.  Decode recovers the plaintext first and then performs
//! the same update, so either direction yields the same final IV.

use std::sync::Arc;

use crate::base::Alphabet;
use crate::cipher::{CipherKey, CipherRef, Interface};
use crate::error::{Error, Result};

pub mod block;
pub mod null;
pub mod stream;

// ── Contract ──────────────────────────────────────────────────────────────────

pub trait NameCodec: Send + Sync {
    /// Descriptor this codec was constructed for.
    fn interface(&self) -> Interface;

    /// Exact upper bound on the encoded length of a `plain_len`-byte name.
    fn max_encoded_name_len(&self, plain_len: usize) -> usize;

    /// Exact upper bound on the decoded length of an `enc_len`-char name.
    fn max_decoded_name_len(&self, enc_len: usize) -> usize;

    /// Encrypt and encode one path component.  See the module docs for the
    /// `iv` contract.
    fn encode_name(&self, plain: &[u8], iv: &mut u64) -> Result<String>;

    /// Invert [`encode_name`].
    ///
    /// [`encode_name`]: NameCodec::encode_name
    fn decode_name(&self, encoded: &str, iv: &mut u64) -> Result<Vec<u8>>;
}

// ── Construction ──────────────────────────────────────────────────────────────

/// Construct the name codec named by a volume's descriptor.
pub fn lookup(
    wanted:     &Interface,
    cipher:     CipherRef,
    key:        Arc<CipherKey>,
    chained_iv: bool,
) -> Result<Box<dyn NameCodec>> {
    match wanted.name.as_str() {
        "null" => Ok(Box::new(null::NullNameCodec::new(wanted)?)),
        "block" => Ok(Box::new(block::BlockNameCodec::new(
            wanted, cipher, key, chained_iv, Alphabet::Base64,
        )?)),
        "block32" => Ok(Box::new(block::BlockNameCodec::new(
            wanted, cipher, key, chained_iv, Alphabet::Base32,
        )?)),
        "stream" => Ok(Box::new(stream::StreamNameCodec::new(
            wanted, cipher, key, chained_iv, Alphabet::Base64,
        )?)),
        "stream32" => Ok(Box::new(stream::StreamNameCodec::new(
            wanted, cipher, key, chained_iv, Alphabet::Base32,
        )?)),
        other => Err(Error::NotFound(other.to_owned())),
    }
}

// ── Path coding ───────────────────────────────────────────────────────────────

/// Encode a `/`-separated path component by component, root to leaf.
///
/// Empty components and the `.`/`..` entries pass through unchanged.  The
/// IV accumulator is threaded through every real component; codecs built
/// without chaining leave it untouched.
pub fn encode_path(codec: &dyn NameCodec, path: &str, iv: &mut u64) -> Result<String> {
    let mut parts = Vec::new();
    for comp in path.split('/') {
        if comp.is_empty() || comp == "." || comp == ".." {
            parts.push(comp.to_owned());
        } else {
            parts.push(codec.encode_name(comp.as_bytes(), iv)?);
        }
    }
    Ok(parts.join("/"))
}

/// Invert [`encode_path`].  Decoded components must be valid UTF-8.
pub fn decode_path(codec: &dyn NameCodec, path: &str, iv: &mut u64) -> Result<String> {
    let mut parts = Vec::new();
    for comp in path.split('/') {
        if comp.is_empty() || comp == "." || comp == ".." {
            parts.push(comp.to_owned());
        } else {
            let plain = codec.decode_name(comp, iv)?;
            parts.push(String::from_utf8(plain).map_err(|e| {
                Error::Invalid(format!("decoded name is not UTF-8: {e}"))
            })?);
        }
    }
    Ok(parts.join("/"))
}
