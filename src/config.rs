//! Volume configuration and the unlocked volume handle.
//!
//! The configuration is a JSON document persisted at [`CONFIG_NAME`] inside
//! the ciphertext root.  It is written once at volume creation and treated
//! as ground truth on open; nothing in this crate mutates it afterwards
//! except an explicit password change, which only re-wraps the volume key.
//!
//! # Key hierarchy
//!
//! ```text
//! password ──PBKDF2(salt, iterations)──► user key
//! user key ──unwrap(encrypted_key)─────► volume key
//! ```
//!
//! The volume key is random, generated once, and never changes; changing
//! the password re-wraps it under a fresh user key and salt.  A wrong
//! password fails the wrapped key's checksum and surfaces as `BadKey`.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::base::{b64_standard_decode, b64_standard_encode};
use crate::cipher::registry::Registry;
use crate::cipher::{registry, CipherKey, CipherRef, Interface};
use crate::error::{Error, Result};
use crate::file::encrypted::EncryptedFile;
use crate::file::{Backend, FileParams};
use crate::name::{self, NameCodec};
use crate::rng;

/// Well-known configuration file name in the ciphertext root.
pub const CONFIG_NAME: &str = ".shroudfs";

/// Configuration document version this build reads and writes.
pub const CONFIG_VERSION: u32 = 1;

/// Salt length for password key derivation.
const SALT_BYTES: usize = 20;

/// Default KDF calibration target when creating a volume.
const DEFAULT_KDF_TARGET_MS: u64 = 500;

// ── Configuration document ────────────────────────────────────────────────────

/// Persisted volume metadata.  Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeConfig {
    pub version:              u32,
    pub creator:              String,
    pub created:              String,
    pub volume_id:            uuid::Uuid,

    pub cipher:               Interface,
    pub name_codec:           Interface,
    pub key_size_bits:        u32,
    pub block_size_bytes:     u32,
    pub block_mac_bytes:      u32,
    pub block_mac_rand_bytes: u32,
    pub unique_iv:            bool,
    pub chained_name_iv:      bool,
    pub external_iv_chaining: bool,
    /// Whether file header blocks carry their own MAC prefix.  This build
    /// writes headers without one and refuses volumes that declare it.
    #[serde(default)]
    pub header_mac_prefix:    bool,

    /// Volume key wrapped under the password-derived key; standard base-64.
    pub encrypted_key:        String,
    /// KDF salt; standard base-64.
    pub salt:                 String,
    pub kdf_iterations:       u32,
    pub kdf_target_ms:        u64,
}

/// Parameters for creating a fresh volume.
#[derive(Debug, Clone)]
pub struct VolumeParams {
    pub cipher_name:          String,
    pub name_codec_name:      String,
    pub key_size_bits:        u32,
    pub block_size_bytes:     u32,
    pub block_mac_bytes:      u32,
    pub block_mac_rand_bytes: u32,
    pub unique_iv:            bool,
    pub chained_name_iv:      bool,
    pub external_iv_chaining: bool,
    /// `0` asks creation to calibrate against `kdf_target_ms`.
    pub kdf_iterations:       u32,
    pub kdf_target_ms:        u64,
}

impl Default for VolumeParams {
    fn default() -> Self {
        Self {
            cipher_name:          "aes".to_owned(),
            name_codec_name:      "block".to_owned(),
            key_size_bits:        256,
            block_size_bytes:     1024,
            block_mac_bytes:      8,
            block_mac_rand_bytes: 0,
            unique_iv:            true,
            chained_name_iv:      true,
            external_iv_chaining: false,
            kdf_iterations:       0,
            kdf_target_ms:        DEFAULT_KDF_TARGET_MS,
        }
    }
}

impl VolumeConfig {
    /// Serialize to the on-disk JSON form.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Invalid(format!("config serialization: {e}")))
    }

    /// Parse the on-disk JSON form.  Refuses documents from a newer format
    /// or with a header layout this build does not write.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: VolumeConfig = serde_json::from_str(text)
            .map_err(|e| Error::Invalid(format!("config parse: {e}")))?;
        if config.version > CONFIG_VERSION {
            return Err(Error::Unsupported(format!(
                "config version {} (this build reads up to {CONFIG_VERSION})",
                config.version
            )));
        }
        if config.header_mac_prefix {
            return Err(Error::Unsupported(
                "MAC-prefixed file headers are not supported by this build".to_owned(),
            ));
        }
        Ok(config)
    }

    /// Write the document into `ciphertext_root` under [`CONFIG_NAME`].
    pub fn save(&self, ciphertext_root: &Path) -> Result<()> {
        let path = ciphertext_root.join(CONFIG_NAME);
        std::fs::write(&path, self.to_json()?)?;
        log::debug!("wrote volume config {}", path.display());
        Ok(())
    }

    /// Load the document from `ciphertext_root`.
    pub fn load(ciphertext_root: &Path) -> Result<Self> {
        let path = ciphertext_root.join(CONFIG_NAME);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
                _ => Error::Io(e),
            })?;
        Self::from_json(&text)
    }

    fn file_params(&self) -> FileParams {
        FileParams {
            block_size: self.block_size_bytes as usize,
            mac_bytes:  self.block_mac_bytes as usize,
            rand_bytes: self.block_mac_rand_bytes as usize,
            unique_iv:  self.unique_iv,
        }
    }
}

// ── Volume handle ─────────────────────────────────────────────────────────────

/// An unlocked volume: configuration plus live cipher and key material.
pub struct Volume {
    config: VolumeConfig,
    cipher: CipherRef,
    key:    Arc<CipherKey>,
}

impl Volume {
    /// Create a fresh volume: derive the user key (calibrating the KDF when
    /// asked), generate and wrap a random volume key, and assemble the
    /// configuration document.
    pub fn create(params: &VolumeParams, password: &[u8]) -> Result<Volume> {
        Self::create_in(registry::default_registry(), params, password)
    }

    /// [`Volume::create`] against an explicit registry.
    pub fn create_in(reg: &Registry, params: &VolumeParams, password: &[u8]) -> Result<Volume> {
        let info = reg.lookup(&params.cipher_name)?;
        if info.key_range.max_bits > 0 && !info.key_range.contains(params.key_size_bits) {
            return Err(Error::Invalid(format!(
                "key size {} bits outside `{}` range {}..={}",
                params.key_size_bits, info.name, info.key_range.min_bits, info.key_range.max_bits
            )));
        }
        if !info.block_range.contains(params.block_size_bytes) {
            return Err(Error::Invalid(format!(
                "block size {} outside `{}` range {}..={}",
                params.block_size_bytes, info.name, info.block_range.min_bytes,
                info.block_range.max_bytes
            )));
        }

        let cipher = reg.new_cipher(&info.iface, Some(params.key_size_bits))?;

        let mut salt = vec![0u8; SALT_BYTES];
        rng::strong_random(&mut salt)?;

        let (user_key, iterations) = cipher.new_key_from_password(
            password,
            params.kdf_iterations,
            params.kdf_target_ms,
            &salt,
        )?;
        let volume_key = cipher.new_random_key()?;
        let encrypted_key = cipher.write_key(&volume_key, &user_key)?;

        let name_iface = name_codec_interface(&params.name_codec_name)?;
        let config = VolumeConfig {
            version:              CONFIG_VERSION,
            creator:              format!("shroudfs {}", env!("CARGO_PKG_VERSION")),
            created:              chrono::Utc::now().to_rfc3339(),
            volume_id:            uuid::Uuid::new_v4(),
            cipher:               cipher.interface(),
            name_codec:           name_iface,
            key_size_bits:        params.key_size_bits,
            block_size_bytes:     params.block_size_bytes,
            block_mac_bytes:      params.block_mac_bytes,
            block_mac_rand_bytes: params.block_mac_rand_bytes,
            unique_iv:            params.unique_iv,
            chained_name_iv:      params.chained_name_iv,
            external_iv_chaining: params.external_iv_chaining,
            header_mac_prefix:    false,
            encrypted_key:        b64_standard_encode(&encrypted_key),
            salt:                 b64_standard_encode(&salt),
            kdf_iterations:       iterations,
            kdf_target_ms:        params.kdf_target_ms,
        };

        config.file_params().validate(cipher.cipher_block_size())?;

        log::debug!(
            "created volume {}: cipher {}, name codec {}, {} KDF iterations",
            config.volume_id,
            config.cipher,
            config.name_codec,
            iterations
        );

        Ok(Volume { config, cipher, key: Arc::new(volume_key) })
    }

    /// Unlock an existing volume with its password.
    pub fn unlock(config: VolumeConfig, password: &[u8]) -> Result<Volume> {
        Self::unlock_in(registry::default_registry(), config, password)
    }

    /// [`Volume::unlock`] against an explicit registry.
    pub fn unlock_in(reg: &Registry, config: VolumeConfig, password: &[u8]) -> Result<Volume> {
        let cipher = reg.new_cipher(&config.cipher, Some(config.key_size_bits))?;
        config.file_params().validate(cipher.cipher_block_size())?;

        let salt = b64_standard_decode(&config.salt)?;
        let blob = b64_standard_decode(&config.encrypted_key)?;

        let (user_key, _) =
            cipher.new_key_from_password(password, config.kdf_iterations, 0, &salt)?;
        let volume_key = cipher.read_key(&blob, &user_key, true)?;

        log::debug!("unlocked volume {}", config.volume_id);
        Ok(Volume { config, cipher, key: Arc::new(volume_key) })
    }

    /// Re-wrap the volume key under a new password.  File data is untouched;
    /// only `encrypted_key`, `salt`, and the KDF fields change.
    pub fn change_password(&mut self, new_password: &[u8]) -> Result<()> {
        let mut salt = vec![0u8; SALT_BYTES];
        rng::strong_random(&mut salt)?;
        let (user_key, iterations) = self.cipher.new_key_from_password(
            new_password,
            0,
            self.config.kdf_target_ms,
            &salt,
        )?;
        let encrypted_key = self.cipher.write_key(&self.key, &user_key)?;

        self.config.encrypted_key = b64_standard_encode(&encrypted_key);
        self.config.salt = b64_standard_encode(&salt);
        self.config.kdf_iterations = iterations;
        Ok(())
    }

    /// The configuration document (for persisting after create or password
    /// change).
    pub fn config(&self) -> &VolumeConfig {
        &self.config
    }

    /// The volume's cipher instance.
    pub fn cipher(&self) -> &CipherRef {
        &self.cipher
    }

    /// Construct this volume's name codec.
    pub fn name_codec(&self) -> Result<Box<dyn NameCodec>> {
        name::lookup(
            &self.config.name_codec,
            self.cipher.clone(),
            self.key.clone(),
            self.config.chained_name_iv,
        )
    }

    /// Open an encrypted file over `backend`.
    ///
    /// `external_iv` is the name-chain IV of the file's path; it is ignored
    /// (forced to zero) unless the volume chains external IVs.
    pub fn open_file(&self, backend: Box<dyn Backend>, external_iv: u64) -> Result<EncryptedFile> {
        let iv = if self.config.external_iv_chaining { external_iv } else { 0 };
        EncryptedFile::open(
            backend,
            self.cipher.clone(),
            self.key.clone(),
            self.config.file_params(),
            iv,
        )
    }
}

fn name_codec_interface(family: &str) -> Result<Interface> {
    match family {
        "null" => Ok(Interface::new("null", 1, 0)),
        "block" | "block32" => Ok(Interface::new(family, 4, 0)),
        "stream" | "stream32" => Ok(Interface::new(family, 2, 0)),
        other => Err(Error::NotFound(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_params() -> VolumeParams {
        // Fixed KDF iterations keep unit tests off the calibration path.
        VolumeParams { kdf_iterations: 1_000, ..VolumeParams::default() }
    }

    #[test]
    fn create_unlock_roundtrip() {
        let volume = Volume::create(&quick_params(), b"correct horse").unwrap();
        let json = volume.config().to_json().unwrap();

        let config = VolumeConfig::from_json(&json).unwrap();
        let again = Volume::unlock(config, b"correct horse").unwrap();
        assert!(volume
            .cipher()
            .compare_keys(&volume.key, &again.key));
    }

    #[test]
    fn wrong_password_is_bad_key() {
        let volume = Volume::create(&quick_params(), b"right").unwrap();
        let config = volume.config().clone();
        assert!(matches!(
            Volume::unlock(config, b"wrong"),
            Err(Error::BadKey)
        ));
    }

    #[test]
    fn change_password_preserves_volume_key() {
        let mut volume = Volume::create(&quick_params(), b"old").unwrap();
        let original_key = volume.key.clone();
        volume.change_password(b"new").unwrap();

        let config = volume.config().clone();
        assert!(matches!(Volume::unlock(config.clone(), b"old"), Err(Error::BadKey)));
        let reopened = Volume::unlock(config, b"new").unwrap();
        assert!(reopened.cipher().compare_keys(&original_key, &reopened.key));
    }

    #[test]
    fn rejects_newer_config_version() {
        let volume = Volume::create(&quick_params(), b"pw").unwrap();
        let mut config = volume.config().clone();
        config.version = CONFIG_VERSION + 1;
        let json = config.to_json().unwrap();
        assert!(matches!(VolumeConfig::from_json(&json), Err(Error::Unsupported(_))));
    }

    #[test]
    fn rejects_mac_prefixed_header_layout() {
        let volume = Volume::create(&quick_params(), b"pw").unwrap();
        let mut config = volume.config().clone();
        config.header_mac_prefix = true;
        let json = config.to_json().unwrap();
        assert!(matches!(VolumeConfig::from_json(&json), Err(Error::Unsupported(_))));
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        let mut params = quick_params();
        params.key_size_bits = 160;
        assert!(Volume::create(&params, b"pw").is_err());

        let mut params = quick_params();
        params.block_size_bytes = 32;
        assert!(Volume::create(&params, b"pw").is_err());
    }

    #[test]
    fn unknown_cipher_not_found() {
        let mut params = quick_params();
        params.cipher_name = "rot13".to_owned();
        assert!(matches!(Volume::create(&params, b"pw"), Err(Error::NotFound(_))));
    }
}
