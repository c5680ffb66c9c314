//! Reference range Asymmetric Numeral Systems (rANS) codec.
//!
//! 64-bit state kept in `[RANS64_L, RANS64_L << 32)`, renormalized 32 bits at a
//! time. Encoding uses one integer division per symbol and writes words
//! backwards from the end of the output buffer, so the compressed stream is the
//! buffer's tail and the decoder reads it front to back.

use std::ops::Range;

use crate::error::{Error, Result};
use crate::stats::{InverseLookup, SymbolStats, ALPHABET_SIZE};
use crate::Codec;

/// Lower bound of the normalized state interval.
pub const RANS64_L: u64 = 1 << 31;

/// Model precision in bits.
pub const SCALE_BITS: u32 = 14;

/// Total of all symbol frequencies.
pub const SCALE: u32 = 1 << SCALE_BITS;

/// Encoder-side symbol entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncSymbol {
    /// Frequency of the symbol.
    pub freq: u32,
    /// Cumulative frequency of all preceding symbols.
    pub cum_freq: u32,
}

/// Decoder-side symbol entry, shared with the fast codec.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecSymbol {
    /// Start of the symbol's slot range.
    pub start: u32,
    /// Frequency of the symbol.
    pub freq: u32,
}

impl DecSymbol {
    /// Decoder entries for every symbol of `stats`.
    pub fn table(stats: &SymbolStats) -> [DecSymbol; ALPHABET_SIZE] {
        std::array::from_fn(|s| DecSymbol {
            start: stats.cum_freq(s as u8),
            freq: stats.freq(s as u8),
        })
    }
}

/// Tables for one input sequence.
#[derive(Clone, Debug)]
pub struct SequenceInfo {
    /// Encoder entries indexed by symbol.
    pub enc_symbols: [EncSymbol; ALPHABET_SIZE],
    /// Decoder entries indexed by symbol.
    pub dec_symbols: [DecSymbol; ALPHABET_SIZE],
    /// Slot-to-symbol table of size [`SCALE`].
    pub cum2sym: InverseLookup,
}

/// Build the encode/decode tables for `sequence` at [`SCALE_BITS`] precision.
pub fn init(sequence: &[u8]) -> Result<SequenceInfo> {
    let stats = SymbolStats::from_bytes(sequence, SCALE)?;
    let enc_symbols = std::array::from_fn(|s| EncSymbol {
        freq: stats.freq(s as u8),
        cum_freq: stats.cum_freq(s as u8),
    });
    Ok(SequenceInfo {
        enc_symbols,
        dec_symbols: DecSymbol::table(&stats),
        cum2sym: InverseLookup::new(&stats),
    })
}

/// Writes 32-bit little-endian words backwards from the end of a buffer.
pub(crate) struct WordWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WordWriter<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        let pos = buf.len();
        Self { buf, pos }
    }

    #[inline]
    pub(crate) fn put(&mut self, word: u32) -> Result<()> {
        if self.pos < 4 {
            return Err(Error::BufferTooSmall {
                needed: self.buf.len() - self.pos + 4,
                available: self.buf.len(),
            });
        }
        self.pos -= 4;
        self.buf[self.pos..self.pos + 4].copy_from_slice(&word.to_le_bytes());
        Ok(())
    }

    /// Bytes written so far.
    pub(crate) fn written(&self) -> usize {
        self.buf.len() - self.pos
    }
}

/// Reads 32-bit little-endian words front to back.
struct WordReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WordReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    fn next_word(&mut self) -> Result<u32> {
        let bytes = self
            .data
            .get(self.pos..self.pos + 4)
            .ok_or(Error::TruncatedStream)?;
        self.pos += 4;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn is_exhausted(&self) -> bool {
        self.pos == self.data.len()
    }
}

/// Look up the encoder entry for `symbol`, rejecting symbols outside the model.
#[inline]
pub(crate) fn model_symbol<T, F>(table: &[T; ALPHABET_SIZE], symbol: u8, freq: F) -> Result<&T>
where
    F: Fn(&T) -> u32,
{
    let entry = &table[symbol as usize];
    if freq(entry) == 0 {
        return Err(Error::SymbolNotInModel(symbol));
    }
    Ok(entry)
}

/// rANS encoder writing into the tail of a caller buffer.
pub struct RansEncoder<'a> {
    state: u64,
    out: WordWriter<'a>,
}

impl<'a> RansEncoder<'a> {
    /// Create an encoder that fills `buf` from the end.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            state: RANS64_L,
            out: WordWriter::new(buf),
        }
    }

    /// Encode one symbol. Symbols must be fed in reverse order and `sym.freq`
    /// must be nonzero.
    #[inline]
    pub fn put(&mut self, sym: &EncSymbol) -> Result<()> {
        debug_assert!(sym.freq != 0);
        let freq = sym.freq as u64;
        let mut x = self.state;

        // x must be below x_max before the update; one word is always enough.
        let x_max = ((RANS64_L >> SCALE_BITS) << 32) * freq;
        if x >= x_max {
            self.out.put(x as u32)?;
            x >>= 32;
        }

        self.state = ((x / freq) << SCALE_BITS) + (x % freq) + sym.cum_freq as u64;
        Ok(())
    }

    /// Return the current internal state.
    pub fn get_state(&self) -> u64 {
        self.state
    }

    /// Flush the final state and return the number of bytes written.
    pub fn finish(mut self) -> Result<usize> {
        let x = self.state;
        self.out.put((x >> 32) as u32)?;
        self.out.put(x as u32)?;
        Ok(self.out.written())
    }
}

/// Encode `sequence` into the tail of `buf`.
///
/// Returns the number of bytes written; the stream occupies
/// `buf[buf.len() - written..]`.
///
/// # Errors
/// `Error::BufferTooSmall` if `buf` runs out, `Error::SymbolNotInModel` if a
/// byte has no frequency in `enc_symbols`.
pub fn encode(
    sequence: &[u8],
    buf: &mut [u8],
    enc_symbols: &[EncSymbol; ALPHABET_SIZE],
) -> Result<usize> {
    let mut encoder = RansEncoder::new(buf);
    for &s in sequence.iter().rev() {
        encoder.put(model_symbol(enc_symbols, s, |e| e.freq)?)?;
    }
    let written = encoder.finish()?;
    log::trace!("rans: encoded {} bytes into {}", sequence.len(), written);
    Ok(written)
}

/// rANS decoder reading a compressed stream front to back.
pub struct RansDecoder<'a> {
    state: u64,
    input: WordReader<'a>,
}

impl<'a> RansDecoder<'a> {
    /// Read the initial state from the first two words of `compressed`.
    pub fn new(compressed: &'a [u8]) -> Result<Self> {
        let mut input = WordReader::new(compressed);
        let lo = input.next_word()? as u64;
        let hi = input.next_word()? as u64;
        Ok(Self {
            state: lo | (hi << 32),
            input,
        })
    }

    /// Return the current internal state.
    pub fn get_state(&self) -> u64 {
        self.state
    }

    /// Slot of the next symbol.
    #[inline]
    pub fn get_cum_freq(&self) -> u32 {
        (self.state & (SCALE as u64 - 1)) as u32
    }

    /// Remove the symbol described by `sym` from the state.
    #[inline]
    pub fn advance(&mut self, sym: &DecSymbol) -> Result<()> {
        let mask = SCALE as u64 - 1;
        let x = self.state;
        let mut x = (sym.freq as u64)
            .wrapping_mul(x >> SCALE_BITS)
            .wrapping_add(x & mask)
            .wrapping_sub(sym.start as u64);

        if x < RANS64_L {
            x = (x << 32) | self.input.next_word()? as u64;
        }
        self.state = x;
        Ok(())
    }

    /// Check that the stream was consumed exactly.
    pub fn finish(self) -> Result<()> {
        if self.state != RANS64_L || !self.input.is_exhausted() {
            return Err(Error::InvalidLength);
        }
        Ok(())
    }
}

/// Decode `compressed` into `output`, which must have the original length.
///
/// # Errors
/// `Error::TruncatedStream` if the stream ends early, `Error::InvalidLength` if
/// the stream is not fully consumed by exactly `output.len()` symbols.
pub fn decode(
    dec_symbols: &[DecSymbol; ALPHABET_SIZE],
    cum2sym: &InverseLookup,
    compressed: &[u8],
    output: &mut [u8],
) -> Result<()> {
    let mut decoder = RansDecoder::new(compressed)?;
    for out in output.iter_mut() {
        let s = cum2sym.symbol(decoder.get_cum_freq());
        *out = s;
        decoder.advance(&dec_symbols[s as usize])?;
    }
    decoder.finish()?;
    log::trace!("rans: decoded {} bytes from {}", output.len(), compressed.len());
    Ok(())
}

impl Codec for SequenceInfo {
    const NAME: &'static str = "rANS";

    fn init(sequence: &[u8]) -> Result<Self> {
        init(sequence)
    }

    fn encode(&self, sequence: &[u8], buf: &mut [u8]) -> Result<Range<usize>> {
        let written = encode(sequence, buf, &self.enc_symbols)?;
        Ok(buf.len() - written..buf.len())
    }

    fn decode(&self, compressed: &[u8], output: &mut [u8]) -> Result<()> {
        decode(&self.dec_symbols, &self.cum2sym, compressed, output)
    }
}
