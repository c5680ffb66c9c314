//! # Static-model rANS byte coders
//!
//! *Three interchangeable range-ANS codecs over a shared frequency model.*
//!
//! ## Intuition First
//!
//! rANS keeps the whole coded message in a single integer. Encoding a symbol
//! with probability `f / M` grows that integer by roughly `log2(M / f)` bits;
//! whenever it would overflow its window, the low bits are shipped out to the
//! byte stream. Decoding runs the same machine backwards, so the encoder walks
//! the input from the last byte to the first and the decoder emits symbols in
//! forward order.
//!
//! ## The Variants
//!
//! ```text
//! rans            64-bit state, 32-bit renormalization, one division per symbol
//! rans_fast       same bitstream, division replaced by a fixed-point reciprocal
//! fixed_accuracy  18-bit state, bit-level output, 3-bit long division
//! ```
//!
//! The first two produce byte-identical streams and share one decoder. The
//! fixed-accuracy codec bounds the quotient of each encode step to four bits,
//! which turns the division into three conditional subtractions at the cost of
//! a slightly worse compression ratio.
//!
//! ## Model
//!
//! Every codec builds its tables from [`SymbolStats`]: byte counts rescaled to
//! sum to `2^14`, with a repair pass that keeps every occurring byte at a
//! frequency of at least one. The model is static for the whole sequence.
//!
//! ## Buffers
//!
//! Encoders write into a caller-supplied buffer and report the span they used.
//! [`max_compressed_len`] gives a size that is always large enough. Decoders
//! fill a caller-supplied slice whose length must equal the original length.
//!
//! ## References
//!
//! - Duda, J. (2013). "Asymmetric numeral systems: entropy coding combining speed of Huffman coding with compression rate of arithmetic coding."
//! - Giesen, F. (2014). "Interleaved entropy coders." (the 64-bit rANS layout and reciprocal encoder)

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::ops::Range;

pub mod error;
pub mod fixed_accuracy;
pub mod rans;
pub mod rans_fast;
pub mod sample;
pub mod stats;

pub use error::{Error, Result};
pub use stats::{InverseLookup, SymbolStats, ALPHABET_SIZE};

/// Worst-case output buffer size for encoding `len` bytes with any variant.
pub const fn max_compressed_len(len: usize) -> usize {
    2 * len + 16
}

/// Common init/encode/decode surface of the codec variants.
///
/// A stream must be decoded by the variant that encoded it. The tables built by
/// `init` are immutable, so one instance can serve any number of calls.
pub trait Codec: Sized {
    /// Short display name of the variant.
    const NAME: &'static str;

    /// Build the symbol tables for `sequence`.
    fn init(sequence: &[u8]) -> Result<Self>;

    /// Encode `sequence` into `buf`.
    ///
    /// Returns the range of `buf` holding the compressed stream.
    fn encode(&self, sequence: &[u8], buf: &mut [u8]) -> Result<Range<usize>>;

    /// Decode `compressed` into `output`, producing exactly `output.len()` symbols.
    fn decode(&self, compressed: &[u8], output: &mut [u8]) -> Result<()>;

    /// Encode into a freshly allocated buffer holding only the compressed bytes.
    fn compress(&self, sequence: &[u8]) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; max_compressed_len(sequence.len())];
        let span = self.encode(sequence, &mut buf)?;
        Ok(buf[span].to_vec())
    }
}

pub use fixed_accuracy::SequenceInfo as FixedAccuracyCodec;
pub use rans::SequenceInfo as RansCodec;
pub use rans_fast::SequenceInfo as FastRansCodec;
