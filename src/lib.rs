//! # shroudfs — stackable encrypting filesystem core
//!
//! Plaintext files and directory names presented to an application are
//! transformed on the fly into ciphertext files in an ordinary backing
//! directory tree.  This crate is the core: ciphers, name coding, and the
//! block-encrypted file layer.  Mount integration, password prompting, and
//! every other user-facing concern live outside it.
//!
//! Layout guarantees (frozen in config version 1):
//! - All numeric on-disk fields are little-endian; never negotiated
//! - Algorithm selection is gated only by `(name, current, age)` descriptor
//!   compatibility; an incompatible descriptor refuses the volume — no
//!   fallback, no partial open
//! - A ciphertext file is `[header block?][data blocks…]`; the header block
//!   carries no MAC prefix, and the plaintext size is fully determined by
//!   the ciphertext length
//! - Data block `i` is encrypted with IV seed `file_iv ⊕ external_iv ⊕ i`;
//!   blocks are MAC'd after encryption and verified before decryption
//! - Encoded names never contain `/` or `.`; the name alphabets are frozen
//! - Key material is zeroed on final release; wrapped keys embed a keyed
//!   checksum and a wrong password surfaces as `BadKey`, never as garbage

pub mod base;
pub mod cipher;
pub mod config;
pub mod error;
pub mod file;
pub mod name;
pub mod rng;

// Flat re-exports for the most common types.
pub use cipher::registry::{default_registry, list_algorithms, new_cipher, new_cipher_by_name, Registry};
pub use cipher::{AlgorithmInfo, Cipher, CipherKey, CipherRef, Interface};
pub use config::{Volume, VolumeConfig, VolumeParams, CONFIG_NAME};
pub use error::{Error, ErrorKind, Result};
pub use file::encrypted::EncryptedFile;
pub use file::{Backend, FileBackend, FileParams, MemBackend};
pub use name::{decode_path, encode_path, NameCodec};
