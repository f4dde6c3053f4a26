//! Process-wide entropy sources.
//!
//! Two tiers, matching what the cipher layer needs:
//!
//! - **strong** — the OS CSPRNG.  Key material, salts, and file IVs come
//!   from here.  Exhaustion is surfaced as [`Error::Entropy`] and is fatal
//!   to the calling operation.
//! - **weak** — a fast in-process PRNG seeded once from the OS.  Acceptable
//!   for per-block random prefixes and padding fill, never for keys.
//!
//! Both sources are internally synchronized; callers on any thread may use
//! them without additional locking.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rand::rngs::{OsRng, SmallRng};
use rand::{RngCore, SeedableRng};

use crate::error::{Error, Result};

static WEAK: Lazy<Mutex<SmallRng>> = Lazy::new(|| Mutex::new(SmallRng::from_entropy()));

/// Fill `buf` from the OS CSPRNG.
pub fn strong_random(buf: &mut [u8]) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| Error::Entropy(e.to_string()))
}

/// Fill `buf` from the seeded in-process PRNG.  Never fails.
pub fn weak_random(buf: &mut [u8]) {
    WEAK.lock().fill_bytes(buf);
}

/// Draw a strong random `u64`.
pub fn strong_random_u64() -> Result<u64> {
    let mut b = [0u8; 8];
    strong_random(&mut b)?;
    Ok(u64::from_le_bytes(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_fills() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        strong_random(&mut a).unwrap();
        strong_random(&mut b).unwrap();
        assert_ne!(a, b, "two strong draws should differ");
    }

    #[test]
    fn weak_fills() {
        let mut a = [0u8; 32];
        weak_random(&mut a);
        assert_ne!(a, [0u8; 32]);
    }
}
