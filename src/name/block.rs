//! Block name codec — padded block encryption with a MAC prefix.
//!
//! # Encoded layout (before alphabet encoding)
//!
//! ```text
//! Offset  Size        Field
//!    0      2         mac16 of the padded plaintext (LE), keyed, IV-chained
//!    2      n×bs      padded plaintext, block-encrypted
//! ```
//!
//! Padding is PKCS-style: every pad byte holds the pad count, and at least
//! one pad byte is always present so decode can strip it unambiguously.
//! The cipher IV seed is `mac16 ⊕ parent_iv`, which both randomizes the
//! ciphertext per name and lets decode reconstruct the seed from the stored
//! prefix before it knows the plaintext.

use std::sync::Arc;

use crate::base::Alphabet;
use crate::cipher::{fold_16, CipherKey, CipherRef, Interface};
use crate::error::{Error, Result};
use crate::name::NameCodec;

pub struct BlockNameCodec {
    iface:    Interface,
    cipher:   CipherRef,
    key:      Arc<CipherKey>,
    chained:  bool,
    alphabet: Alphabet,
}

impl BlockNameCodec {
    pub fn new(
        wanted:     &Interface,
        cipher:     CipherRef,
        key:        Arc<CipherKey>,
        chained_iv: bool,
        alphabet:   Alphabet,
    ) -> Result<Self> {
        let family = match alphabet {
            Alphabet::Base64 => "block",
            Alphabet::Base32 => "block32",
        };
        let own = Interface::new(family, 4, 0);
        if !own.implements(wanted) {
            return Err(Error::Unsupported(format!(
                "{family} name codec speaks {own}, volume wants {wanted}"
            )));
        }
        Ok(Self { iface: own, cipher, key, chained: chained_iv, alphabet })
    }

    #[inline]
    fn bs(&self) -> usize {
        self.cipher.cipher_block_size()
    }
}

impl NameCodec for BlockNameCodec {
    fn interface(&self) -> Interface {
        self.iface.clone()
    }

    fn max_encoded_name_len(&self, plain_len: usize) -> usize {
        // Round up to the next block boundary (always at least one pad
        // byte), plus the MAC prefix, expanded by the alphabet ratio.
        let padded = (plain_len / self.bs() + 1) * self.bs();
        self.alphabet.encoded_len(padded + 2)
    }

    fn max_decoded_name_len(&self, enc_len: usize) -> usize {
        let raw = self.alphabet.decoded_len(enc_len);
        raw.saturating_sub(2 + 1) // MAC prefix and the minimum pad byte
    }

    fn encode_name(&self, plain: &[u8], iv: &mut u64) -> Result<String> {
        if plain.is_empty() {
            return Err(Error::Invalid("cannot encode an empty name".to_owned()));
        }
        let bs = self.bs();
        let pad = bs - plain.len() % bs;

        let mut padded = Vec::with_capacity(plain.len() + pad);
        padded.extend_from_slice(plain);
        padded.resize(plain.len() + pad, pad as u8);

        let parent_iv = if self.chained { *iv } else { 0 };
        let mut chain = parent_iv;
        let mac64 = self.cipher.mac_64(&padded, &self.key, Some(&mut chain));
        let mac16 = fold_16(mac64);

        self.cipher
            .block_encode(&mut padded, mac16 as u64 ^ parent_iv, &self.key)?;

        let mut raw = Vec::with_capacity(2 + padded.len());
        raw.extend_from_slice(&mac16.to_le_bytes());
        raw.extend_from_slice(&padded);

        if self.chained {
            *iv = chain;
        }
        Ok(self.alphabet.encode(&raw))
    }

    fn decode_name(&self, encoded: &str, iv: &mut u64) -> Result<Vec<u8>> {
        let bs = self.bs();
        let raw = self.alphabet.decode(encoded)?;
        if raw.len() < 2 + bs || (raw.len() - 2) % bs != 0 {
            return Err(Error::Invalid(format!(
                "encoded name decodes to {} bytes, not a block multiple",
                raw.len()
            )));
        }
        let mac16 = u16::from_le_bytes(raw[..2].try_into().expect("2 bytes"));
        let parent_iv = if self.chained { *iv } else { 0 };

        let mut padded = raw[2..].to_vec();
        self.cipher
            .block_decode(&mut padded, mac16 as u64 ^ parent_iv, &self.key)?;

        let pad = *padded.last().expect("non-empty") as usize;
        if pad == 0
            || pad > bs
            || pad > padded.len()
            || padded[padded.len() - pad..].iter().any(|&b| b as usize != pad)
        {
            return Err(Error::Integrity("bad name padding".to_owned()));
        }

        let mut chain = parent_iv;
        let mac64 = self.cipher.mac_64(&padded, &self.key, Some(&mut chain));
        if fold_16(mac64) != mac16 {
            return Err(Error::Integrity("name MAC mismatch".to_owned()));
        }

        padded.truncate(padded.len() - pad);
        if self.chained {
            *iv = chain;
        }
        Ok(padded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::registry;

    fn codec(chained: bool, alphabet: Alphabet) -> BlockNameCodec {
        let cipher = registry::new_cipher_by_name("aes", Some(256)).unwrap();
        let key = Arc::new(cipher.new_random_key().unwrap());
        let family = match alphabet {
            Alphabet::Base64 => "block",
            Alphabet::Base32 => "block32",
        };
        BlockNameCodec::new(&Interface::new(family, 4, 0), cipher, key, chained, alphabet).unwrap()
    }

    #[test]
    fn roundtrip_various_lengths() {
        let codec = codec(false, Alphabet::Base64);
        for name in ["a", "file.txt", "a-much-longer-name-spanning-blocks.tar.gz"] {
            let mut iv = 0u64;
            let enc = codec.encode_name(name.as_bytes(), &mut iv).unwrap();
            assert!(enc.len() <= codec.max_encoded_name_len(name.len()));
            let mut iv = 0u64;
            assert_eq!(codec.decode_name(&enc, &mut iv).unwrap(), name.as_bytes());
        }
    }

    #[test]
    fn roundtrip_base32() {
        let codec = codec(true, Alphabet::Base32);
        let mut iv = 5u64;
        let enc = codec.encode_name(b"Mixed.Case", &mut iv).unwrap();
        assert!(enc.bytes().all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b)));
        // Case-folding host: decode the lowercased form.
        let mut iv2 = 5u64;
        assert_eq!(
            codec.decode_name(&enc.to_lowercase(), &mut iv2).unwrap(),
            b"Mixed.Case"
        );
        assert_eq!(iv, iv2);
    }

    #[test]
    fn tampered_name_fails_mac() {
        let codec = codec(false, Alphabet::Base64);
        let mut iv = 0u64;
        let enc = codec.encode_name(b"secret-name", &mut iv).unwrap();
        // Replace one character with a different alphabet character.
        let mut chars: Vec<u8> = enc.into_bytes();
        let mid = chars.len() / 2;
        chars[mid] = if chars[mid] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(chars).unwrap();
        let mut iv = 0u64;
        assert!(codec.decode_name(&tampered, &mut iv).is_err());
    }

    #[test]
    fn wrong_parent_iv_fails() {
        let codec = codec(true, Alphabet::Base64);
        let mut iv = 0x1111u64;
        let enc = codec.encode_name(b"report.pdf", &mut iv).unwrap();
        let mut wrong = 0x2222u64;
        assert!(codec.decode_name(&enc, &mut wrong).is_err());
    }

    #[test]
    fn empty_name_rejected() {
        let codec = codec(false, Alphabet::Base64);
        let mut iv = 0u64;
        assert!(codec.encode_name(b"", &mut iv).is_err());
    }

    #[test]
    fn garbage_input_rejected_cleanly() {
        let codec = codec(false, Alphabet::Base64);
        let mut iv = 0u64;
        assert!(codec.decode_name("too-short", &mut iv).is_err());
        assert!(codec.decode_name("bad/char", &mut iv).is_err());
    }
}
