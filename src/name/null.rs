//! Identity name codec, used when filename encryption is disabled.

use crate::cipher::Interface;
use crate::error::{Error, Result};
use crate::name::NameCodec;

pub struct NullNameCodec {
    iface: Interface,
}

impl NullNameCodec {
    pub fn new(wanted: &Interface) -> Result<Self> {
        let own = Interface::new("null", 1, 0);
        if !own.implements(wanted) {
            return Err(Error::Unsupported(format!(
                "null name codec speaks {own}, volume wants {wanted}"
            )));
        }
        Ok(Self { iface: own })
    }
}

impl NameCodec for NullNameCodec {
    fn interface(&self) -> Interface {
        self.iface.clone()
    }

    fn max_encoded_name_len(&self, plain_len: usize) -> usize {
        plain_len
    }

    fn max_decoded_name_len(&self, enc_len: usize) -> usize {
        enc_len
    }

    fn encode_name(&self, plain: &[u8], _iv: &mut u64) -> Result<String> {
        String::from_utf8(plain.to_vec())
            .map_err(|e| Error::Invalid(format!("name is not UTF-8: {e}")))
    }

    fn decode_name(&self, encoded: &str, _iv: &mut u64) -> Result<Vec<u8>> {
        Ok(encoded.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity() {
        let codec = NullNameCodec::new(&Interface::new("null", 1, 0)).unwrap();
        let mut iv = 7u64;
        let enc = codec.encode_name(b"notes.txt", &mut iv).unwrap();
        assert_eq!(enc, "notes.txt");
        assert_eq!(codec.decode_name(&enc, &mut iv).unwrap(), b"notes.txt");
        assert_eq!(iv, 7);
    }
}
