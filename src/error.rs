//! Crate-wide error type.
//!
//! Every fallible operation in this crate returns `Result<T, Error>`. The
//! variants are ordered roughly from most specific to most general, matching
//! the failure taxonomy the installer distinguishes between when deciding
//! whether a mismatch, a schema problem, or a plain I/O failure occurred.

use std::io;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("tar open failed: {0}")]
    BundleOpen(String),

    #[error("manifest.json must be the first entry in the bundle")]
    ManifestNotFirst,

    #[error("previous entry not finished")]
    EntryNotFinished,

    #[error("archive stream drain failed: {0}")]
    DrainFailed(String),

    #[error("manifest schema error: {0}")]
    Schema(String),

    #[error("unknown component type: {0}")]
    UnknownComponentType(String),

    #[error("invalid permissions value: {0}")]
    InvalidPermissions(String),

    #[error("unsafe path in archive: {0}")]
    UnsafePath(String),

    #[error("unsafe hardlink target in archive: {0}")]
    UnsafeHardlink(String),

    #[error("device current_slot is empty")]
    EmptyCurrentSlot,

    #[error("device hw_compatibility is empty")]
    EmptyHwCompatibility,

    #[error("manifest missing slot sections (slot-*)")]
    NoSlotSections,

    #[error("manifest missing slot section: {0}")]
    MissingSlotSection(String),

    #[error("hardware compatibility mismatch: manifest={manifest} device={device}")]
    HwCompatibilityMismatch { manifest: String, device: String },

    #[error("sha256 is empty")]
    EmptyDigest,

    #[error("sha256 mismatch: expected={expected} actual={actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("destination directory does not exist: {path} (set create-destination to create it)")]
    MissingDestinationDir { path: PathBuf },

    #[error("destination path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("gzip init failed: {0}")]
    GzipInit(String),

    #[error("gzip decode failed: {0}")]
    GzipDecode(String),

    #[error("mkdtemp failed: {0}")]
    MkdtempFailed(String),

    #[error("mount failed: {0}")]
    MountFailed(String),

    #[error("umount failed: {0}")]
    UnmountFailed(String),

    #[error("null source reader")]
    NullSource,

    #[error("unsupported component type: {0}")]
    UnsupportedComponentType(String),

    #[error("component '{name}' failed: {source}")]
    ComponentFailed { name: String, source: Box<Error> },

    #[error("manifest component entry missing from bundle: {0}")]
    ComponentMissingFromBundle(String),

    #[error("interrupted")]
    Cancelled,

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for Error {
    /// An `io::Error` produced by `GzipReader` carries a tag identifying it
    /// as a gzip init or decode failure; recover that distinction here so
    /// callers that just use `?` on a generic `Read` still get the specific
    /// variant instead of a catch-all `Error::Io`.
    fn from(e: io::Error) -> Self {
        if let Some(tag) = crate::io::gzip::downcast(&e) {
            return if tag.init {
                Error::GzipInit(tag.message.clone())
            } else {
                Error::GzipDecode(tag.message.clone())
            };
        }
        Error::Io(e)
    }
}

impl Error {
    /// Mirrors the grounded C++ original's `(errno, message)` contract: an
    /// OS error carries its errno, everything else is a domain error (-1).
    pub fn errno(&self) -> i32 {
        match self {
            Error::Io(e) => e.raw_os_error().unwrap_or(-1),
            _ => -1,
        }
    }

    pub fn component_failed(name: impl Into<String>, source: Error) -> Error {
        Error::ComponentFailed {
            name: name.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
