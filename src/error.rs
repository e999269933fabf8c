use thiserror::Error;

/// Errors from decoding the WAPP container format.
///
/// All of these are detected from the raw bytes alone, before any guest
/// code is compiled or instantiated.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("truncated package: {len} bytes, need at least {need}")]
    Truncated { len: usize, need: usize },

    #[error("bad magic {0:?}, not a WAPP package")]
    BadMagic([u8; 4]),

    #[error("unsupported package version {0}, this host reads version 1")]
    UnsupportedVersion(u32),

    #[error("malformed metadata: {0}")]
    BadMetadata(String),
}

/// Errors that abort a load attempt.
///
/// None of these ever reach the tick loop: a failed load leaves the session
/// without an instance.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Package(#[from] PackageError),

    #[error("guest does not export '{0}'")]
    MissingExport(&'static str),

    #[error(transparent)]
    Runtime(#[from] wasmtime::Error),
}

/// Errors from presenting a published frame descriptor.
///
/// Presentation errors are non-fatal: the frame is skipped and the session
/// keeps running.
#[derive(Debug, Error)]
pub enum PresentError {
    #[error(
        "frame descriptor out of bounds: {byte_len} bytes at offset {pointer}, \
         guest memory has {memory_len}"
    )]
    OutOfBounds {
        pointer: u64,
        byte_len: u64,
        memory_len: u64,
    },
}

/// Errors surfaced by a running session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no package is running")]
    NotRunning,

    #[error("guest trapped in '{entry_point}': {reason}")]
    Trap {
        entry_point: &'static str,
        reason: wasmtime::Error,
    },
}
