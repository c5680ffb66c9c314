//! Error types for the rANS codecs.

use thiserror::Error;

/// Error variants for table building, encoding and decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The output buffer cannot hold the data being written.
    #[error("buffer too small: needed at least {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes required at the point of failure.
        needed: usize,
        /// Bytes the caller supplied.
        available: usize,
    },

    /// The frequency table cannot give every present symbol a nonzero slot.
    #[error("degenerate frequency table: {distinct} distinct symbols for total {total}")]
    DegenerateFrequencyTable {
        /// Number of distinct symbols present in the input.
        distinct: usize,
        /// Requested frequency total.
        total: u32,
    },

    /// A symbol was encoded that has zero frequency in the model.
    #[error("symbol {0} has zero frequency in the model")]
    SymbolNotInModel(u8),

    /// The decoder ran past the end of the compressed data.
    #[error("compressed stream is truncated")]
    TruncatedStream,

    /// Decoding finished in a state the encoder never started from.
    #[error("decoded length does not match the encoded stream")]
    InvalidLength,
}

/// A specialized Result type for rANS operations.
pub type Result<T> = std::result::Result<T, Error>;
