// THEORY:
// Every fallible operation in the engine returns a `MosaicError`. The variants
// mirror the three failure families of a filter invocation: the caller handed
// us something unusable (`InvalidParameter`), an internal contract between two
// stages was broken (`DimensionMismatch`, `Resize`), or the machine could not
// give us what we asked for (`ResourceExhaustion`). `Cancelled` and `Worker`
// describe how an invocation can end early without any of those being true.
//
// Nothing here is retried. All operations are deterministic functions of the
// image and its parameters, so the same inputs will always fail the same way.

use std::collections::TryReserveError;
use thiserror::Error;

/// Errors produced by the mosaic engine.
#[derive(Debug, Error)]
pub enum MosaicError {
    /// A caller-supplied parameter or input buffer is unusable.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A tile or region did not match the block it was meant for.
    #[error("dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// An allocation for an output or tile buffer failed.
    #[error("resource exhaustion: {0}")]
    ResourceExhaustion(String),

    /// The resampler rejected a source or destination image.
    #[error("resize failed: {0}")]
    Resize(String),

    /// The invocation was abandoned through its cancel token.
    #[error("processing cancelled")]
    Cancelled,

    /// A worker task panicked or was aborted by the runtime.
    #[error("worker failed: {0}")]
    Worker(String),
}

/// Convenience alias used throughout the crate.
pub type MosaicResult<T> = Result<T, MosaicError>;

impl MosaicError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn mismatch(expected: (u32, u32), actual: (u32, u32)) -> Self {
        Self::DimensionMismatch { expected, actual }
    }
}

impl From<TryReserveError> for MosaicError {
    fn from(e: TryReserveError) -> Self {
        Self::ResourceExhaustion(e.to_string())
    }
}

impl From<fast_image_resize::ResizeError> for MosaicError {
    fn from(e: fast_image_resize::ResizeError) -> Self {
        Self::Resize(e.to_string())
    }
}

impl From<fast_image_resize::ImageBufferError> for MosaicError {
    fn from(e: fast_image_resize::ImageBufferError) -> Self {
        Self::Resize(e.to_string())
    }
}

/// Allocates a zeroed byte buffer, reporting allocation failure instead of aborting.
pub(crate) fn try_zeroed(len: usize) -> MosaicResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)?;
    buf.resize(len, 0);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_readable() {
        let err = MosaicError::invalid("block size must be positive");
        assert_eq!(err.to_string(), "invalid parameter: block size must be positive");

        let err = MosaicError::mismatch((10, 10), (7, 10));
        assert_eq!(err.to_string(), "dimension mismatch: expected (10, 10), got (7, 10)");
    }

    #[test]
    fn huge_allocation_is_reported() {
        let err = try_zeroed(usize::MAX).unwrap_err();
        assert!(matches!(err, MosaicError::ResourceExhaustion(_)));
    }

    #[test]
    fn small_allocation_is_zeroed() {
        let buf = try_zeroed(12).unwrap();
        assert_eq!(buf, vec![0u8; 12]);
    }
}
