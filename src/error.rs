//! Crate-wide error type.
//!
//! One flat enum, independent of transport.  Every fallible operation in the
//! crate returns [`Result`].  The kinds mirror how callers are expected to
//! react:
//!
//! | Kind          | Meaning                                        |
//! |---------------|------------------------------------------------|
//! | `NotFound`    | Named algorithm or key absent                  |
//! | `Unsupported` | Descriptor present but no compatible impl      |
//! | `BadKey`      | Wrong password or corrupted wrapped key        |
//! | `Integrity`   | MAC mismatch or structurally invalid block     |
//! | `Io`          | Backing store failed                           |
//! | `Entropy`     | RNG failed when strong bytes were required     |
//! | `Invalid`     | Caller violated a precondition                 |
//!
//! `BadKey` and `Integrity` are authentication failures, not retryable
//! errors; the crate performs no retries anywhere.  An `Io` or `Integrity`
//! failure inside an open encrypted file degrades that handle — see
//! `file::encrypted`.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no algorithm named `{0}`")]
    NotFound(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("bad key — wrong password or corrupted key blob")]
    BadKey,
    #[error("integrity failure: {0}")]
    Integrity(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("entropy source failed: {0}")]
    Entropy(String),
    #[error("invalid argument: {0}")]
    Invalid(String),
}

/// Discriminant-only view of [`Error`], used to remember why a file handle
/// degraded without holding the (non-`Clone`) error itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unsupported,
    BadKey,
    Integrity,
    Io,
    Entropy,
    Invalid,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_)    => ErrorKind::NotFound,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::BadKey         => ErrorKind::BadKey,
            Error::Integrity(_)   => ErrorKind::Integrity,
            Error::Io(_)          => ErrorKind::Io,
            Error::Entropy(_)     => ErrorKind::Entropy,
            Error::Invalid(_)     => ErrorKind::Invalid,
        }
    }
}
