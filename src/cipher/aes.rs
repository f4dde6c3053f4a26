//! AES cipher family — CBC block mode, CTR stream mode, HMAC-SHA-256 MAC,
//! PBKDF2 key derivation.
//!
//! # Key material layout
//!
//! ```text
//! Offset        Size          Field
//!    0          key_len       AES key (16 / 24 / 32 bytes)
//!  key_len      16            IV base — per-key secret mixed into every IV
//! ```
//!
//! `key_size()` is `key_len + 16`.  The IV base never leaves the key; the
//! 16-byte IV for a cipher invocation is `HMAC-SHA-256(iv_base ‖ seed)[..16]`
//! keyed by the full material, so equal seeds under different keys produce
//! unrelated IVs.
//!
//! # Wrapped key blob
//!
//! ```text
//! Offset  Size           Field
//!    0      8            checksum = MAC-64(material) under the wrapping key  (LE)
//!    8    key_size()     material, stream-encrypted with IV seed = checksum
//! ```
//!
//! The checksum doubles as the wrap IV seed, so flipping any blob byte both
//! garbles the unwrap and fails the checksum comparison.

use std::time::{Duration, Instant};

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, StreamCipher};
use aes::{Aes128, Aes192, Aes256};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::cipher::registry::Registry;
use crate::cipher::{
    AlgorithmInfo, BlockRange, Cipher, CipherKey, CipherRef, Interface, KeyRange,
};
use crate::error::{Error, Result};
use crate::rng;

type HmacSha256 = Hmac<Sha256>;

/// AES block size; also the IV width.
const AES_BLOCK: usize = 16;
/// Secret IV-base bytes appended to the raw AES key.
const IV_BASE_BYTES: usize = 16;
/// Keyed checksum prefix on a wrapped key blob.
const KEY_CHECKSUM_BYTES: usize = 8;

/// Iteration floor for KDF calibration probes.
const KDF_PROBE_START: u32 = 10_000;
/// Hard ceiling so calibration cannot spin unbounded on a broken clock.
const KDF_ITER_CEILING: u32 = 100_000_000;

fn aes_interface() -> Interface {
    Interface::new("aes", 3, 2)
}

/// Register the AES family into `reg`.
pub fn register_into(reg: &Registry) {
    reg.register(
        AlgorithmInfo {
            name:        "aes".to_owned(),
            description: "AES: 16-byte block cipher; CBC block mode, CTR stream mode".to_owned(),
            iface:       aes_interface(),
            key_range:   KeyRange { min_bits: 128, max_bits: 256, step_bits: 64 },
            block_range: BlockRange { min_bytes: 64, max_bytes: 4096 },
            stream_mode: true,
            hidden:      false,
        },
        |iface, key_bits| AesCipher::new(iface, key_bits).map(|c| std::sync::Arc::new(c) as CipherRef),
    );
}

// ── AesCipher ─────────────────────────────────────────────────────────────────

pub struct AesCipher {
    iface:     Interface,
    key_bytes: usize,
}

impl AesCipher {
    /// Construct for a compatible descriptor and key length.
    pub fn new(wanted: &Interface, key_bits: u32) -> Result<Self> {
        let own = aes_interface();
        if !own.implements(wanted) {
            return Err(Error::Unsupported(format!(
                "aes speaks {own}, volume wants {wanted}"
            )));
        }
        if !(KeyRange { min_bits: 128, max_bits: 256, step_bits: 64 }).contains(key_bits) {
            return Err(Error::Invalid(format!(
                "aes key length {key_bits} bits (allowed: 128, 192, 256)"
            )));
        }
        Ok(Self { iface: own, key_bytes: key_bits as usize / 8 })
    }

    fn check_key(&self, key: &CipherKey, what: &str) -> Result<()> {
        if key.len() != self.key_size() {
            return Err(Error::Invalid(format!(
                "{what}: {} bytes of key material, cipher needs {}",
                key.len(),
                self.key_size()
            )));
        }
        Ok(())
    }

    /// Derive the 16-byte IV for one cipher invocation from the 64-bit seed.
    fn derive_iv(&self, key: &CipherKey, seed: u64) -> [u8; AES_BLOCK] {
        let material = key.bytes();
        let iv_base = &material[self.key_bytes..];
        let mut mac = HmacSha256::new_from_slice(material).expect("HMAC accepts any key length");
        mac.update(iv_base);
        mac.update(&seed.to_le_bytes());
        let digest = mac.finalize().into_bytes();
        let mut iv = [0u8; AES_BLOCK];
        iv.copy_from_slice(&digest[..AES_BLOCK]);
        iv
    }

    fn derive_material(&self, password: &[u8], salt: &[u8], iterations: u32) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.key_size()];
        pbkdf2::pbkdf2::<HmacSha256>(password, salt, iterations, &mut out)
            .map_err(|e| Error::Invalid(format!("PBKDF2: {e}")))?;
        Ok(out)
    }
}

// Per-key-size CBC pass over whole blocks.  The cbc mode types carry the
// chaining state across `encrypt_block_mut` calls, so feeding the buffer
// block by block is the streaming-safe equivalent of one bulk call.
macro_rules! cbc_encode {
    ($alg:ty, $key:expr, $iv:expr, $buf:expr) => {{
        let mut enc = cbc::Encryptor::<$alg>::new_from_slices($key, $iv)
            .map_err(|e| Error::Invalid(e.to_string()))?;
        for chunk in $buf.chunks_exact_mut(AES_BLOCK) {
            enc.encrypt_block_mut(aes::Block::from_mut_slice(chunk));
        }
    }};
}

macro_rules! cbc_decode {
    ($alg:ty, $key:expr, $iv:expr, $buf:expr) => {{
        let mut dec = cbc::Decryptor::<$alg>::new_from_slices($key, $iv)
            .map_err(|e| Error::Invalid(e.to_string()))?;
        for chunk in $buf.chunks_exact_mut(AES_BLOCK) {
            dec.decrypt_block_mut(aes::Block::from_mut_slice(chunk));
        }
    }};
}

macro_rules! ctr_apply {
    ($alg:ty, $key:expr, $iv:expr, $buf:expr) => {{
        let mut ctr = ctr::Ctr128BE::<$alg>::new_from_slices($key, $iv)
            .map_err(|e| Error::Invalid(e.to_string()))?;
        ctr.apply_keystream($buf);
    }};
}

impl Cipher for AesCipher {
    fn interface(&self) -> Interface {
        self.iface.clone()
    }

    fn new_key_from_password(
        &self,
        password:   &[u8],
        iterations: u32,
        target_ms:  u64,
        salt:       &[u8],
    ) -> Result<(CipherKey, u32)> {
        if iterations != 0 {
            let material = self.derive_material(password, salt, iterations)?;
            return Ok((CipherKey::from_bytes(material), iterations));
        }

        // Calibrate: time throwaway derivations until a single call reaches
        // the target, then keep the material from the round that did.
        let target = Duration::from_millis(target_ms.max(1));
        let mut iters = KDF_PROBE_START;
        loop {
            let started = Instant::now();
            let material = self.derive_material(password, salt, iters)?;
            let elapsed = started.elapsed();
            if elapsed >= target || iters >= KDF_ITER_CEILING {
                log::debug!(
                    "PBKDF2 calibrated to {iters} iterations ({} ms)",
                    elapsed.as_millis()
                );
                return Ok((CipherKey::from_bytes(material), iters));
            }
            let factor = (target.as_secs_f64() / elapsed.as_secs_f64().max(1e-6)).clamp(1.25, 8.0);
            iters = ((iters as f64 * factor) as u32).min(KDF_ITER_CEILING);
        }
    }

    fn new_random_key(&self) -> Result<CipherKey> {
        let mut material = vec![0u8; self.key_size()];
        rng::strong_random(&mut material)?;
        Ok(CipherKey::from_bytes(material))
    }

    fn read_key(&self, blob: &[u8], wrapping_key: &CipherKey, check: bool) -> Result<CipherKey> {
        self.check_key(wrapping_key, "read_key wrapping key")?;
        if blob.len() != self.encoded_key_size() {
            return Err(Error::BadKey);
        }
        let checksum = u64::from_le_bytes(blob[..KEY_CHECKSUM_BYTES].try_into().expect("8 bytes"));
        let mut material = blob[KEY_CHECKSUM_BYTES..].to_vec();
        self.stream_decode(&mut material, checksum, wrapping_key)?;
        if check {
            let actual = self.mac_64(&material, wrapping_key, None);
            if actual != checksum {
                return Err(Error::BadKey);
            }
        }
        Ok(CipherKey::from_bytes(material))
    }

    fn write_key(&self, key: &CipherKey, wrapping_key: &CipherKey) -> Result<Vec<u8>> {
        self.check_key(key, "write_key key")?;
        self.check_key(wrapping_key, "write_key wrapping key")?;
        let checksum = self.mac_64(key.bytes(), wrapping_key, None);
        let mut blob = Vec::with_capacity(self.encoded_key_size());
        blob.extend_from_slice(&checksum.to_le_bytes());
        blob.extend_from_slice(key.bytes());
        self.stream_encode(&mut blob[KEY_CHECKSUM_BYTES..], checksum, wrapping_key)?;
        Ok(blob)
    }

    fn key_size(&self) -> usize {
        self.key_bytes + IV_BASE_BYTES
    }

    fn encoded_key_size(&self) -> usize {
        self.key_size() + KEY_CHECKSUM_BYTES
    }

    fn cipher_block_size(&self) -> usize {
        AES_BLOCK
    }

    fn randomize(&self, buf: &mut [u8], strong: bool) -> Result<()> {
        if strong {
            rng::strong_random(buf)
        } else {
            rng::weak_random(buf);
            Ok(())
        }
    }

    fn mac_64(&self, data: &[u8], key: &CipherKey, chained_iv: Option<&mut u64>) -> u64 {
        let mut mac = HmacSha256::new_from_slice(key.bytes()).expect("HMAC accepts any key length");
        mac.update(data);
        if let Some(ref chain) = chained_iv {
            mac.update(&chain.to_le_bytes());
        }
        let digest = mac.finalize().into_bytes();
        let mut folded = 0u64;
        for word in digest.chunks_exact(8) {
            folded ^= u64::from_le_bytes(word.try_into().expect("8 bytes"));
        }
        if let Some(chain) = chained_iv {
            *chain = folded;
        }
        folded
    }

    fn stream_encode(&self, buf: &mut [u8], iv: u64, key: &CipherKey) -> Result<()> {
        self.check_key(key, "stream_encode")?;
        if buf.is_empty() {
            return Ok(());
        }
        let ivec = self.derive_iv(key, iv);
        let k = &key.bytes()[..self.key_bytes];
        match self.key_bytes {
            16 => ctr_apply!(Aes128, k, &ivec, buf),
            24 => ctr_apply!(Aes192, k, &ivec, buf),
            _  => ctr_apply!(Aes256, k, &ivec, buf),
        }
        Ok(())
    }

    fn stream_decode(&self, buf: &mut [u8], iv: u64, key: &CipherKey) -> Result<()> {
        // CTR is an involution: decode is the same keystream application.
        self.stream_encode(buf, iv, key)
    }

    fn block_encode(&self, buf: &mut [u8], iv: u64, key: &CipherKey) -> Result<()> {
        self.check_key(key, "block_encode")?;
        if buf.len() % AES_BLOCK != 0 {
            return Err(Error::Invalid(format!(
                "block_encode buffer of {} bytes is not block-aligned",
                buf.len()
            )));
        }
        let ivec = self.derive_iv(key, iv);
        let k = &key.bytes()[..self.key_bytes];
        match self.key_bytes {
            16 => cbc_encode!(Aes128, k, &ivec, buf),
            24 => cbc_encode!(Aes192, k, &ivec, buf),
            _  => cbc_encode!(Aes256, k, &ivec, buf),
        }
        Ok(())
    }

    fn block_decode(&self, buf: &mut [u8], iv: u64, key: &CipherKey) -> Result<()> {
        self.check_key(key, "block_decode")?;
        if buf.len() % AES_BLOCK != 0 {
            return Err(Error::Invalid(format!(
                "block_decode buffer of {} bytes is not block-aligned",
                buf.len()
            )));
        }
        let ivec = self.derive_iv(key, iv);
        let k = &key.bytes()[..self.key_bytes];
        match self.key_bytes {
            16 => cbc_decode!(Aes128, k, &ivec, buf),
            24 => cbc_decode!(Aes192, k, &ivec, buf),
            _  => cbc_decode!(Aes256, k, &ivec, buf),
        }
        Ok(())
    }
}
