//! Stream name codec — length-preserving encryption with a MAC prefix.
//!
//! Same framing as the block codec (2-byte keyed MAC, then ciphertext,
//! then alphabet encoding) but the plaintext is stream-encrypted directly,
//! so the encoded length reveals the exact name length.  Volumes that want
//! length hiding use the block variant.

use std::sync::Arc;

use crate::base::Alphabet;
use crate::cipher::{fold_16, CipherKey, CipherRef, Interface};
use crate::error::{Error, Result};
use crate::name::NameCodec;

pub struct StreamNameCodec {
    iface:    Interface,
    cipher:   CipherRef,
    key:      Arc<CipherKey>,
    chained:  bool,
    alphabet: Alphabet,
}

impl StreamNameCodec {
    pub fn new(
        wanted:     &Interface,
        cipher:     CipherRef,
        key:        Arc<CipherKey>,
        chained_iv: bool,
        alphabet:   Alphabet,
    ) -> Result<Self> {
        let family = match alphabet {
            Alphabet::Base64 => "stream",
            Alphabet::Base32 => "stream32",
        };
        let own = Interface::new(family, 2, 1);
        if !own.implements(wanted) {
            return Err(Error::Unsupported(format!(
                "{family} name codec speaks {own}, volume wants {wanted}"
            )));
        }
        Ok(Self { iface: own, cipher, key, chained: chained_iv, alphabet })
    }
}

impl NameCodec for StreamNameCodec {
    fn interface(&self) -> Interface {
        self.iface.clone()
    }

    fn max_encoded_name_len(&self, plain_len: usize) -> usize {
        self.alphabet.encoded_len(plain_len + 2)
    }

    fn max_decoded_name_len(&self, enc_len: usize) -> usize {
        self.alphabet.decoded_len(enc_len).saturating_sub(2)
    }

    fn encode_name(&self, plain: &[u8], iv: &mut u64) -> Result<String> {
        if plain.is_empty() {
            return Err(Error::Invalid("cannot encode an empty name".to_owned()));
        }
        let parent_iv = if self.chained { *iv } else { 0 };
        let mut chain = parent_iv;
        let mac64 = self.cipher.mac_64(plain, &self.key, Some(&mut chain));
        let mac16 = fold_16(mac64);

        let mut buf = plain.to_vec();
        self.cipher
            .stream_encode(&mut buf, mac16 as u64 ^ parent_iv, &self.key)?;

        let mut raw = Vec::with_capacity(2 + buf.len());
        raw.extend_from_slice(&mac16.to_le_bytes());
        raw.extend_from_slice(&buf);

        if self.chained {
            *iv = chain;
        }
        Ok(self.alphabet.encode(&raw))
    }

    fn decode_name(&self, encoded: &str, iv: &mut u64) -> Result<Vec<u8>> {
        let raw = self.alphabet.decode(encoded)?;
        if raw.len() <= 2 {
            return Err(Error::Invalid(format!(
                "encoded name decodes to {} bytes, below the MAC prefix",
                raw.len()
            )));
        }
        let mac16 = u16::from_le_bytes(raw[..2].try_into().expect("2 bytes"));
        let parent_iv = if self.chained { *iv } else { 0 };

        let mut plain = raw[2..].to_vec();
        self.cipher
            .stream_decode(&mut plain, mac16 as u64 ^ parent_iv, &self.key)?;

        let mut chain = parent_iv;
        let mac64 = self.cipher.mac_64(&plain, &self.key, Some(&mut chain));
        if fold_16(mac64) != mac16 {
            return Err(Error::Integrity("name MAC mismatch".to_owned()));
        }

        if self.chained {
            *iv = chain;
        }
        Ok(plain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::registry;

    fn codec(chained: bool) -> StreamNameCodec {
        let cipher = registry::new_cipher_by_name("aes", Some(192)).unwrap();
        let key = Arc::new(cipher.new_random_key().unwrap());
        StreamNameCodec::new(
            &Interface::new("stream", 2, 0),
            cipher,
            key,
            chained,
            Alphabet::Base64,
        )
        .unwrap()
    }

    #[test]
    fn roundtrip_preserves_length_info() {
        let codec = codec(false);
        let mut iv = 0u64;
        let enc = codec.encode_name(b"x", &mut iv).unwrap();
        assert_eq!(enc.len(), codec.max_encoded_name_len(1));
        let mut iv = 0u64;
        assert_eq!(codec.decode_name(&enc, &mut iv).unwrap(), b"x");
    }

    #[test]
    fn roundtrip_chained() {
        let codec = codec(true);
        let mut enc_iv = 0u64;
        let a = codec.encode_name(b"first", &mut enc_iv).unwrap();
        let b = codec.encode_name(b"second", &mut enc_iv).unwrap();

        let mut dec_iv = 0u64;
        assert_eq!(codec.decode_name(&a, &mut dec_iv).unwrap(), b"first");
        assert_eq!(codec.decode_name(&b, &mut dec_iv).unwrap(), b"second");
        assert_eq!(enc_iv, dec_iv);
    }

    #[test]
    fn tamper_detected() {
        let codec = codec(false);
        let mut iv = 0u64;
        let enc = codec.encode_name(b"ledger.db", &mut iv).unwrap();
        let mut chars = enc.into_bytes();
        chars[0] = if chars[0] == b'Q' { b'R' } else { b'Q' };
        let mut iv = 0u64;
        assert!(codec
            .decode_name(std::str::from_utf8(&chars).unwrap(), &mut iv)
            .is_err());
    }
}
