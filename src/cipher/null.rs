//! Null cipher — identity transforms, zero-length key.
//!
//! Exists so a volume with encryption disabled still flows through the same
//! code paths, and so the file and name layers can be tested without key
//! material.  Hidden from default enumeration; constructible by name.

use crate::cipher::registry::Registry;
use crate::cipher::{
    AlgorithmInfo, BlockRange, Cipher, CipherKey, CipherRef, Interface, KeyRange,
};
use crate::error::{Error, Result};
use crate::rng;

fn null_interface() -> Interface {
    Interface::new("null", 1, 0)
}

/// Register the null family into `reg` (hidden).
pub fn register_into(reg: &Registry) {
    reg.register(
        AlgorithmInfo {
            name:        "null".to_owned(),
            description: "identity transform; no encryption".to_owned(),
            iface:       null_interface(),
            key_range:   KeyRange { min_bits: 0, max_bits: 0, step_bits: 0 },
            block_range: BlockRange { min_bytes: 64, max_bytes: 4096 },
            stream_mode: true,
            hidden:      true,
        },
        |iface, _key_bits| NullCipher::new(iface).map(|c| std::sync::Arc::new(c) as CipherRef),
    );
}

pub struct NullCipher {
    iface: Interface,
}

impl NullCipher {
    pub fn new(wanted: &Interface) -> Result<Self> {
        let own = null_interface();
        if !own.implements(wanted) {
            return Err(Error::Unsupported(format!(
                "null speaks {own}, volume wants {wanted}"
            )));
        }
        Ok(Self { iface: own })
    }
}

impl Cipher for NullCipher {
    fn interface(&self) -> Interface {
        self.iface.clone()
    }

    fn new_key_from_password(
        &self,
        _password:  &[u8],
        iterations: u32,
        _target_ms: u64,
        _salt:      &[u8],
    ) -> Result<(CipherKey, u32)> {
        Ok((CipherKey::from_bytes(Vec::new()), iterations.max(1)))
    }

    fn new_random_key(&self) -> Result<CipherKey> {
        Ok(CipherKey::from_bytes(Vec::new()))
    }

    fn read_key(&self, blob: &[u8], _wrapping_key: &CipherKey, _check: bool) -> Result<CipherKey> {
        if !blob.is_empty() {
            return Err(Error::BadKey);
        }
        Ok(CipherKey::from_bytes(Vec::new()))
    }

    fn write_key(&self, _key: &CipherKey, _wrapping_key: &CipherKey) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn key_size(&self) -> usize {
        0
    }

    fn encoded_key_size(&self) -> usize {
        0
    }

    fn cipher_block_size(&self) -> usize {
        16
    }

    fn randomize(&self, buf: &mut [u8], strong: bool) -> Result<()> {
        if strong {
            rng::strong_random(buf)
        } else {
            rng::weak_random(buf);
            Ok(())
        }
    }

    // Keyless MAC: everything maps to zero, and the chain stays put so a
    // chained-IV walk over a null volume is still well-defined.
    fn mac_64(&self, _data: &[u8], _key: &CipherKey, _chained_iv: Option<&mut u64>) -> u64 {
        0
    }

    fn stream_encode(&self, _buf: &mut [u8], _iv: u64, _key: &CipherKey) -> Result<()> {
        Ok(())
    }

    fn stream_decode(&self, _buf: &mut [u8], _iv: u64, _key: &CipherKey) -> Result<()> {
        Ok(())
    }

    fn block_encode(&self, _buf: &mut [u8], _iv: u64, _key: &CipherKey) -> Result<()> {
        Ok(())
    }

    fn block_decode(&self, _buf: &mut [u8], _iv: u64, _key: &CipherKey) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_transforms() {
        let c = NullCipher::new(&null_interface()).unwrap();
        let key = c.new_random_key().unwrap();
        let mut buf = b"plaintext stays".to_vec();
        let orig = buf.clone();
        c.block_encode(&mut buf, 5, &key).unwrap();
        assert_eq!(buf, orig);
        c.stream_encode(&mut buf, 5, &key).unwrap();
        assert_eq!(buf, orig);
    }

    #[test]
    fn empty_key_wraps_to_nothing() {
        let c = NullCipher::new(&null_interface()).unwrap();
        let key = c.new_random_key().unwrap();
        let blob = c.write_key(&key, &key).unwrap();
        assert!(blob.is_empty());
        assert!(c.read_key(&blob, &key, true).is_ok());
        assert!(c.read_key(&[1, 2, 3], &key, true).is_err());
    }
}
