//! Cipher registry — catalog of families, lookup by descriptor or name.
//!
//! The registry is an explicit object rather than scattered static
//! initializers: anything that needs lookups can be handed a [`Registry`],
//! and the module-level convenience functions forward to a process-wide
//! default instance that registers the built-in families on first use.
//!
//! Registration may happen at any time before the first lookup; registering
//! a family name twice replaces the earlier entry silently.  After first
//! lookup the catalog is read-mostly; the lock only covers the map itself,
//! never cipher construction.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::cipher::{aes, null, AlgorithmInfo, CipherRef, Interface};
use crate::error::{Error, Result};

/// Constructor for one cipher family: `(descriptor, key_length_bits)`.
pub type Constructor = fn(&Interface, u32) -> Result<CipherRef>;

struct Entry {
    info: AlgorithmInfo,
    make: Constructor,
}

// ── Registry ──────────────────────────────────────────────────────────────────

pub struct Registry {
    entries: RwLock<HashMap<String, Entry>>,
}

impl Registry {
    /// An empty registry with no families.
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    /// A registry pre-loaded with the built-in families.
    pub fn with_builtins() -> Self {
        let reg = Self::new();
        aes::register_into(&reg);
        null::register_into(&reg);
        reg
    }

    /// Register (or silently replace) a family.
    pub fn register(&self, info: AlgorithmInfo, make: Constructor) {
        let name = info.name.clone();
        let mut entries = self.entries.write();
        if entries.insert(name.clone(), Entry { info, make }).is_some() {
            log::debug!("cipher family `{name}` re-registered");
        }
    }

    /// Catalog records, hidden families excluded unless asked for.
    pub fn list_algorithms(&self, include_hidden: bool) -> Vec<AlgorithmInfo> {
        let entries = self.entries.read();
        let mut out: Vec<AlgorithmInfo> = entries
            .values()
            .filter(|e| include_hidden || !e.info.hidden)
            .map(|e| e.info.clone())
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Catalog record for one family name.
    pub fn lookup(&self, name: &str) -> Result<AlgorithmInfo> {
        self.entries
            .read()
            .get(name)
            .map(|e| e.info.clone())
            .ok_or_else(|| Error::NotFound(name.to_owned()))
    }

    /// Construct a cipher for a descriptor found in a volume configuration.
    ///
    /// `key_bits == None` selects the family's maximum key length.
    pub fn new_cipher(&self, wanted: &Interface, key_bits: Option<u32>) -> Result<CipherRef> {
        let entries = self.entries.read();
        let entry = entries
            .get(&wanted.name)
            .ok_or_else(|| Error::NotFound(wanted.name.clone()))?;
        if !entry.info.iface.implements(wanted) {
            return Err(Error::Unsupported(format!(
                "`{}` speaks {}, volume wants {wanted}",
                wanted.name, entry.info.iface
            )));
        }
        let bits = key_bits.unwrap_or(entry.info.key_range.max_bits);
        let make = entry.make;
        drop(entries);
        make(wanted, bits)
    }

    /// Construct by family name at its newest revision.
    pub fn new_cipher_by_name(&self, name: &str, key_bits: Option<u32>) -> Result<CipherRef> {
        let wanted = self.lookup(name)?.iface;
        self.new_cipher(&wanted, key_bits)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

// ── Process-wide default instance ─────────────────────────────────────────────

static DEFAULT: Lazy<Registry> = Lazy::new(Registry::with_builtins);

/// The process-wide registry, built-ins registered on first use.
pub fn default_registry() -> &'static Registry {
    &DEFAULT
}

/// [`Registry::list_algorithms`] on the default instance.
pub fn list_algorithms(include_hidden: bool) -> Vec<AlgorithmInfo> {
    default_registry().list_algorithms(include_hidden)
}

/// [`Registry::new_cipher`] on the default instance.
pub fn new_cipher(wanted: &Interface, key_bits: Option<u32>) -> Result<CipherRef> {
    default_registry().new_cipher(wanted, key_bits)
}

/// [`Registry::new_cipher_by_name`] on the default instance.
pub fn new_cipher_by_name(name: &str, key_bits: Option<u32>) -> Result<CipherRef> {
    default_registry().new_cipher_by_name(name, key_bits)
}
