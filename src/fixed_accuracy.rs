//! rANS with a bounded quotient ("fixed accuracy").
//!
//! The state `x` always lies in `[2^ALL_BITS, 2^(ALL_BITS + 1))`. Before a
//! symbol with frequency `f` is encoded, just enough low bits are peeled off
//! `x` to bring it into `[f << ACCURACY_BITS, f << (ACCURACY_BITS + 1))`, so
//! the quotient `x / f` always lies in `[8, 16)`. Its three low bits come out
//! of three conditional subtractions, and the encoder never divides.
//!
//! The number of bits to peel off is found without a comparison: each symbol
//! stores a `delta` such that `(x + delta) >> (ALL_BITS + 1)` is the shift.
//!
//! Peeled bits are packed LSB-first into a 64-bit accumulator that is flushed
//! after every three symbols, and the stream ends with a 32-bit word holding
//! the final state above the last partial byte. The stream occupies the head
//! of the output buffer; the decoder reads it backwards from its end.

use std::ops::Range;

use crate::error::{Error, Result};
use crate::rans::model_symbol;
use crate::stats::{InverseLookup, SymbolStats, ALPHABET_SIZE};
use crate::Codec;

/// Model precision in bits; frequencies sum to `2^STATE_BITS`.
pub const STATE_BITS: u32 = 14;

/// Width of the bounded quotient, minus its implicit top bit.
pub const ACCURACY_BITS: u32 = 3;

/// The state occupies bits `0..=ALL_BITS`.
pub const ALL_BITS: u32 = STATE_BITS + ACCURACY_BITS;

const ACCURACY_MASK: u32 = (1 << (ACCURACY_BITS + 1)) - 1;
const STATE_MASK: u32 = (1 << STATE_BITS) - 1;

// Three encode steps must fit in the accumulator next to a partial byte.
const _: () = assert!(STATE_BITS * 3 + ACCURACY_BITS + 8 <= 64);
// The final state plus up to 7 pending bits must fit in one u32.
const _: () = assert!(ALL_BITS < 32 - 7);
// `encode_symbol` performs exactly one `div_high` per accuracy bit.
const _: () = assert!(ACCURACY_BITS == 3);

static BIT_MASKS: [u32; 32] = bit_masks();

const fn bit_masks() -> [u32; 32] {
    let mut masks = [0u32; 32];
    let mut i = 1;
    while i < 32 {
        masks[i] = (1u32 << i) - 1;
        i += 1;
    }
    masks
}

/// Number of bits needed to represent `x`; zero for zero.
#[inline]
pub fn bit_width(x: u32) -> u32 {
    u32::BITS - x.leading_zeros()
}

/// Encoder-side symbol entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncSymbol {
    /// Branchless renormalization threshold, see [`EncSymbol::new`].
    pub delta: u32,
    /// Cumulative frequency of all preceding symbols.
    pub cum_freq: u16,
    /// Frequency of the symbol.
    pub freq: u16,
}

impl EncSymbol {
    /// Build the entry for a symbol with the given slot range.
    ///
    /// With `shift = STATE_BITS - bit_width(freq) + 1`, every state
    /// `x >= freq << (shift + ACCURACY_BITS)` needs `shift` bits peeled off and
    /// every smaller state needs `shift - 1`. Adding
    /// `delta = (shift << (ALL_BITS + 1)) - (freq << (shift + ACCURACY_BITS))`
    /// to `x` makes bit `ALL_BITS + 1` and above hold exactly that count.
    pub fn new(cum_freq: u32, freq: u32) -> Self {
        let shift = STATE_BITS + 1 - bit_width(freq);
        let delta = (shift << (ALL_BITS + 1)).wrapping_sub(freq << (shift + ACCURACY_BITS));
        Self {
            delta,
            cum_freq: cum_freq as u16,
            freq: freq as u16,
        }
    }
}

/// Decoder-side symbol entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecSymbol {
    /// Cumulative frequency of all preceding symbols.
    pub cum_freq: u32,
    /// Frequency of the symbol.
    pub freq: u32,
}

/// Tables for one input sequence.
#[derive(Clone, Debug)]
pub struct SequenceInfo {
    /// Encoder entries indexed by symbol.
    pub enc_symbols: [EncSymbol; ALPHABET_SIZE],
    /// Decoder entries indexed by symbol.
    pub dec_symbols: [DecSymbol; ALPHABET_SIZE],
    /// Slot-to-symbol table of size `2^STATE_BITS`.
    pub cum2sym: InverseLookup,
}

/// Build the encode/decode tables for `sequence`.
pub fn init(sequence: &[u8]) -> Result<SequenceInfo> {
    let stats = SymbolStats::from_bytes(sequence, 1 << STATE_BITS)?;
    let enc_symbols =
        std::array::from_fn(|s| EncSymbol::new(stats.cum_freq(s as u8), stats.freq(s as u8)));
    let dec_symbols = std::array::from_fn(|s| DecSymbol {
        cum_freq: stats.cum_freq(s as u8),
        freq: stats.freq(s as u8),
    });
    Ok(SequenceInfo {
        enc_symbols,
        dec_symbols,
        cum2sym: InverseLookup::new(&stats),
    })
}

/// Packs bit fields LSB-first into the head of a byte buffer.
struct BitWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
    word: u64,
    bits: u32,
}

impl<'a> BitWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            word: 0,
            bits: 0,
        }
    }

    #[inline]
    fn emit_bits(&mut self, value: u32, count: u32) {
        self.word |= ((value & BIT_MASKS[count as usize]) as u64) << self.bits;
        self.bits += count;
    }

    /// Write out all whole bytes; at most 7 bits stay pending.
    #[inline]
    fn flush_bits(&mut self) -> Result<()> {
        let bytes = (self.bits >> 3) as usize;
        let end = self.pos + bytes;
        if end > self.buf.len() {
            return Err(Error::BufferTooSmall {
                needed: end,
                available: self.buf.len(),
            });
        }
        self.buf[self.pos..end].copy_from_slice(&self.word.to_le_bytes()[..bytes]);
        self.pos = end;
        self.word >>= bytes << 3;
        self.bits &= 7;
        Ok(())
    }

    /// Write the final state above the pending bits; returns bytes written.
    fn finish(self, x: u32) -> Result<usize> {
        let z = (x << self.bits) | self.word as u32;
        let end = self.pos + 4;
        if end > self.buf.len() {
            return Err(Error::BufferTooSmall {
                needed: end,
                available: self.buf.len(),
            });
        }
        self.buf[self.pos..end].copy_from_slice(&z.to_le_bytes());
        Ok(end)
    }
}

/// One step of long division: subtract `freq << rem_bit` if it fits.
///
/// Bit `rem_bit + ALL_BITS` of `rem` is set when the subtraction did not fit,
/// i.e. it holds the inverted quotient bit.
#[inline(always)]
fn div_high(freq: u32, x: &mut u32, rem: &mut u32, rem_bit: u32) {
    let x_sub = x.wrapping_sub(freq << rem_bit);
    if x_sub as i32 >= 0 {
        *x = x_sub;
    }
    *rem |= x_sub & (1 << (rem_bit + ALL_BITS));
}

#[inline(always)]
fn encode_symbol(sym: &EncSymbol, x: u32, out: &mut BitWriter) -> u32 {
    let cum_freq = sym.cum_freq as u32;
    let freq = sym.freq as u32;

    let shift = x.wrapping_add(sym.delta) >> (ALL_BITS + 1);
    out.emit_bits(x, shift);
    // Quotient is now in [8, 16); take its implicit top bit.
    let mut x = (x >> shift) - (freq << ACCURACY_BITS);

    let mut rem = 0;
    div_high(freq, &mut x, &mut rem, 2);
    div_high(freq, &mut x, &mut rem, 1);
    div_high(freq, &mut x, &mut rem, 0);
    let quotient = (rem ^ (ACCURACY_MASK << ALL_BITS)) >> ACCURACY_BITS;
    x + cum_freq + quotient
}

/// Encode `sequence` into the head of `buf`.
///
/// Returns the number of bytes written; the stream occupies `buf[..written]`.
///
/// # Errors
/// `Error::BufferTooSmall` if `buf` runs out, `Error::SymbolNotInModel` if a
/// byte has no frequency in `enc_symbols`.
pub fn encode(
    sequence: &[u8],
    buf: &mut [u8],
    enc_symbols: &[EncSymbol; ALPHABET_SIZE],
) -> Result<usize> {
    let sym = |s: u8| model_symbol(enc_symbols, s, |e| e.freq as u32);
    let mut x = 1u32 << ALL_BITS;
    let mut out = BitWriter::new(buf);

    let mut chunks = sequence.rchunks_exact(3);
    for chunk in &mut chunks {
        x = encode_symbol(sym(chunk[2])?, x, &mut out);
        x = encode_symbol(sym(chunk[1])?, x, &mut out);
        x = encode_symbol(sym(chunk[0])?, x, &mut out);
        out.flush_bits()?;
    }
    for &s in chunks.remainder().iter().rev() {
        x = encode_symbol(sym(s)?, x, &mut out);
        out.flush_bits()?;
    }

    let written = out.finish(x)?;
    log::trace!(
        "fixed_accuracy: encoded {} bytes into {}",
        sequence.len(),
        written
    );
    Ok(written)
}

/// Reads bit fields backwards from the end of a byte buffer.
///
/// Words that reach before the start of the buffer are zero-filled; the
/// decoder never consumes those bits from a well-formed stream.
struct BitReader<'a> {
    data: &'a [u8],
    end: usize,
    word: u64,
    bits: u32,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            end: data.len(),
            word: 0,
            bits: 0,
        }
    }

    fn prev_word(&mut self) -> u32 {
        if self.end >= 4 {
            self.end -= 4;
            let b = &self.data[self.end..self.end + 4];
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        } else {
            let mut tmp = [0u8; 4];
            tmp[4 - self.end..].copy_from_slice(&self.data[..self.end]);
            self.end = 0;
            u32::from_le_bytes(tmp)
        }
    }

    #[inline]
    fn read_bits(&mut self, count: u32) -> u32 {
        self.bits -= count;
        (self.word >> self.bits) as u32 & BIT_MASKS[count as usize]
    }

    #[inline]
    fn refill(&mut self) {
        if self.bits < STATE_BITS {
            self.word = (self.word << 32) | self.prev_word() as u64;
            self.bits += 32;
        }
    }
}

/// Decode `compressed` into `output`, which must have the original length.
///
/// # Errors
/// `Error::TruncatedStream` if `compressed` is shorter than the final state
/// word, `Error::InvalidLength` if the state is malformed or does not return
/// to its initial value after `output.len()` symbols.
pub fn decode(
    dec_symbols: &[DecSymbol; ALPHABET_SIZE],
    cum2sym: &InverseLookup,
    compressed: &[u8],
    output: &mut [u8],
) -> Result<()> {
    if compressed.len() < 4 {
        return Err(Error::TruncatedStream);
    }

    let mut input = BitReader::new(compressed);
    let z = input.prev_word();
    let width = bit_width(z);
    if width <= ALL_BITS {
        return Err(Error::InvalidLength);
    }
    let pending = width - 1 - ALL_BITS;
    input.word = (z & BIT_MASKS[pending as usize]) as u64;
    input.bits = pending;
    let mut x = z >> pending;
    input.refill();

    for out in output.iter_mut() {
        let y = x & STATE_MASK;
        let s = cum2sym.symbol(y);
        *out = s;

        let sym = &dec_symbols[s as usize];
        let z = sym.freq * (x >> STATE_BITS) + y.wrapping_sub(sym.cum_freq);
        let shift = ALL_BITS + 1 - bit_width(z);
        x = (z << shift) + input.read_bits(shift);
        input.refill();
    }

    if x != 1 << ALL_BITS {
        return Err(Error::InvalidLength);
    }
    log::trace!(
        "fixed_accuracy: decoded {} bytes from {}",
        output.len(),
        compressed.len()
    );
    Ok(())
}

impl Codec for SequenceInfo {
    const NAME: &'static str = "rANS acc 3";

    fn init(sequence: &[u8]) -> Result<Self> {
        init(sequence)
    }

    fn encode(&self, sequence: &[u8], buf: &mut [u8]) -> Result<Range<usize>> {
        let written = encode(sequence, buf, &self.enc_symbols)?;
        Ok(0..written)
    }

    fn decode(&self, compressed: &[u8], output: &mut [u8]) -> Result<()> {
        decode(&self.dec_symbols, &self.cum2sym, compressed, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::max_compressed_len;
    use proptest::prelude::*;

    fn roundtrip(input: &[u8]) -> Vec<u8> {
        let info = init(input).unwrap();
        let mut buf = vec![0u8; max_compressed_len(input.len())];
        let written = encode(input, &mut buf, &info.enc_symbols).unwrap();
        let mut output = vec![0u8; input.len()];
        decode(&info.dec_symbols, &info.cum2sym, &buf[..written], &mut output).unwrap();
        output
    }

    #[test]
    fn test_bit_width() {
        assert_eq!(bit_width(0), 0);
        assert_eq!(bit_width(1), 1);
        assert_eq!(bit_width(1 << 14), 15);
        assert_eq!(bit_width((1 << 18) - 1), 18);
        assert_eq!(BIT_MASKS[0], 0);
        assert_eq!(BIT_MASKS[14], 0x3FFF);
        assert_eq!(BIT_MASKS[31], 0x7FFF_FFFF);
    }

    #[test]
    fn test_delta_gives_exact_shift() {
        for freq in [1u32, 2, 3, 100, 1000, 8191, 8192, 16383, 16384] {
            let sym = EncSymbol::new(0, freq);
            for x in (1u32 << ALL_BITS)..(1u32 << (ALL_BITS + 1)) {
                let shift = x.wrapping_add(sym.delta) >> (ALL_BITS + 1);
                let q = (x >> shift) / freq;
                assert!((8..16).contains(&q), "freq {} x {} shift {}", freq, x, shift);
            }
        }
    }

    #[test]
    fn test_encode_symbol_matches_division() {
        let freq = 1234u32;
        let cum_freq = 5000u32;
        let sym = EncSymbol::new(cum_freq, freq);
        let mut buf = [0u8; 16];
        for x in [1u32 << ALL_BITS, 150_000, 200_001, (1 << (ALL_BITS + 1)) - 1] {
            let mut out = BitWriter::new(&mut buf);
            let shift = x.wrapping_add(sym.delta) >> (ALL_BITS + 1);
            let xs = x >> shift;
            let expected = ((xs / freq) << STATE_BITS) + xs % freq + cum_freq;
            assert_eq!(encode_symbol(&sym, x, &mut out), expected);
        }
    }

    #[test]
    fn test_concrete_sequence() {
        let input = [0u8, 0, 0, 0, 1, 1, 2];
        assert_eq!(roundtrip(&input), input);
    }

    #[test]
    fn test_empty_sequence() {
        let info = init(&[]).unwrap();
        let mut buf = [0u8; 8];
        let written = encode(&[], &mut buf, &info.enc_symbols).unwrap();
        assert_eq!(written, 4);
        assert_eq!(&buf[..4], &(1u32 << ALL_BITS).to_le_bytes());
        decode(&info.dec_symbols, &info.cum2sym, &buf[..4], &mut []).unwrap();
    }

    #[test]
    fn test_remainder_lengths() {
        for len in 1..10 {
            let input = (0..len).map(|i| (i * 37 % 5) as u8).collect::<Vec<_>>();
            assert_eq!(roundtrip(&input), input, "len {}", len);
        }
    }

    #[test]
    fn test_single_symbol_alphabet() {
        let input = vec![9u8; 4096];
        assert_eq!(roundtrip(&input), input);
    }

    #[test]
    fn test_buffer_too_small() {
        let input = (0..=255u8).cycle().take(2048).collect::<Vec<_>>();
        let info = init(&input).unwrap();
        let mut buf = vec![0u8; 100];
        let err = encode(&input, &mut buf, &info.enc_symbols).unwrap_err();
        assert!(matches!(err, Error::BufferTooSmall { available: 100, .. }));
    }

    #[test]
    fn test_truncated_stream() {
        let info = init(b"xyz").unwrap();
        let err = decode(&info.dec_symbols, &info.cum2sym, &[0, 1], &mut [0u8; 3]).unwrap_err();
        assert_eq!(err, Error::TruncatedStream);
    }

    #[test]
    fn test_wrong_length_is_detected() {
        let input = b"fixed accuracy range coder".repeat(30);
        let info = init(&input).unwrap();
        let compressed = info.compress(&input).unwrap();
        let mut output = vec![0u8; input.len() - 2];
        assert_eq!(
            info.decode(&compressed, &mut output).unwrap_err(),
            Error::InvalidLength
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_fixed_accuracy_roundtrip(input in prop::collection::vec(any::<u8>(), 0..3000)) {
            prop_assert_eq!(roundtrip(&input), input);
        }

        #[test]
        fn prop_fixed_accuracy_roundtrip_skewed(input in prop::collection::vec(prop::sample::select(vec![1u8, 1, 1, 1, 1, 1, 1, 7, 128]), 1..3000)) {
            prop_assert_eq!(roundtrip(&input), input);
        }
    }
}
