//! rANS codec with a division-free encoder.
//!
//! The bitstream is identical to [`crate::rans`]. Encoding replaces
//! `x / freq` with a multiply-high by a precomputed fixed-point reciprocal, and
//! decoding reuses the reference decoder.

use std::ops::Range;

use crate::error::Result;
use crate::rans::{self, model_symbol, DecSymbol, WordWriter, RANS64_L, SCALE, SCALE_BITS};
use crate::stats::{InverseLookup, SymbolStats, ALPHABET_SIZE};
use crate::Codec;

/// High 64 bits of the 128-bit product `a * b`.
#[inline]
pub fn mul_hi(a: u64, b: u64) -> u64 {
    ((a as u128 * b as u128) >> 64) as u64
}

/// Encoder-side symbol entry with a fixed-point reciprocal of the frequency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncSymbol {
    /// Fixed-point reciprocal of `freq`.
    pub rcp_freq: u64,
    /// Frequency of the symbol.
    pub freq: u32,
    /// Added to the state on every encode; folds in the cumulative frequency.
    pub bias: u32,
    /// `SCALE - freq`.
    pub cmpl_freq: u32,
    /// Extra right shift applied after the multiply-high.
    pub rcp_shift: u32,
}

impl EncSymbol {
    /// Precompute the reciprocal for a symbol with the given slot range.
    pub fn new(start: u32, freq: u32, scale_bits: u32) -> Self {
        let total = 1u32 << scale_bits;
        let cmpl_freq = total - freq;

        // Frequencies 0 and 1 use a saturated reciprocal: mul_hi(x, !0) == x - 1,
        // and the bias puts the missing `total - 1` back.
        if freq < 2 {
            return Self {
                rcp_freq: !0,
                freq,
                bias: start + total - 1,
                cmpl_freq,
                rcp_shift: 0,
            };
        }

        // shift = ceil(log2(freq))
        let mut shift = 0;
        while freq > (1u32 << shift) {
            shift += 1;
        }

        // rcp = ceil(2^(shift + 63) / freq), computed in two 32-bit halves.
        let freq64 = freq as u64;
        let x1 = 1u64 << (shift + 31);
        let t1 = x1 / freq64;
        let x0 = (freq64 - 1) + ((x1 % freq64) << 32);
        let t0 = x0 / freq64;

        Self {
            rcp_freq: t0 + (t1 << 32),
            freq,
            bias: start,
            cmpl_freq,
            rcp_shift: shift - 1,
        }
    }
}

/// Tables for one input sequence.
#[derive(Clone, Debug)]
pub struct SequenceInfo {
    /// Encoder entries indexed by symbol.
    pub enc_symbols: [EncSymbol; ALPHABET_SIZE],
    /// Decoder entries indexed by symbol; same layout as the reference codec.
    pub dec_symbols: [DecSymbol; ALPHABET_SIZE],
    /// Slot-to-symbol table of size [`SCALE`].
    pub cum2sym: InverseLookup,
}

/// Build the encode/decode tables for `sequence`.
pub fn init(sequence: &[u8]) -> Result<SequenceInfo> {
    let stats = SymbolStats::from_bytes(sequence, SCALE)?;
    let enc_symbols = std::array::from_fn(|s| {
        EncSymbol::new(stats.cum_freq(s as u8), stats.freq(s as u8), SCALE_BITS)
    });
    Ok(SequenceInfo {
        enc_symbols,
        dec_symbols: DecSymbol::table(&stats),
        cum2sym: InverseLookup::new(&stats),
    })
}

/// rANS encoder using reciprocal multiplication instead of division.
pub struct FastRansEncoder<'a> {
    state: u64,
    out: WordWriter<'a>,
}

impl<'a> FastRansEncoder<'a> {
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
        let mut x = self.state;
        let x_max = ((RANS64_L >> SCALE_BITS) << 32) * sym.freq as u64;
        if x >= x_max {
            self.out.put(x as u32)?;
            x >>= 32;
        }

        // x + bias + q * (total - freq) == (q << scale_bits) + (x - q * freq) + start
        let q = mul_hi(x, sym.rcp_freq) >> sym.rcp_shift;
        self.state = x + sym.bias as u64 + q * sym.cmpl_freq as u64;
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

/// Encode `sequence` into the tail of `buf`; returns the number of bytes written.
pub fn encode(
    sequence: &[u8],
    buf: &mut [u8],
    enc_symbols: &[EncSymbol; ALPHABET_SIZE],
) -> Result<usize> {
    let mut encoder = FastRansEncoder::new(buf);
    for &s in sequence.iter().rev() {
        encoder.put(model_symbol(enc_symbols, s, |e| e.freq)?)?;
    }
    let written = encoder.finish()?;
    log::trace!("rans_fast: encoded {} bytes into {}", sequence.len(), written);
    Ok(written)
}

/// Decode a stream produced by [`encode`]. Same as [`rans::decode`].
pub fn decode(
    dec_symbols: &[DecSymbol; ALPHABET_SIZE],
    cum2sym: &InverseLookup,
    compressed: &[u8],
    output: &mut [u8],
) -> Result<()> {
    rans::decode(dec_symbols, cum2sym, compressed, output)
}

impl Codec for SequenceInfo {
    const NAME: &'static str = "rANS fast";

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::max_compressed_len;
    use proptest::prelude::*;

    #[test]
    fn test_mul_hi() {
        assert_eq!(mul_hi(1 << 63, 4), 2);
        assert_eq!(mul_hi(u64::MAX, u64::MAX), u64::MAX - 1);
        assert_eq!(mul_hi(12345, !0), 12344);
    }

    #[test]
    fn test_reciprocal_matches_division() {
        for freq in [1u32, 2, 3, 5, 7, 100, 1000, 4097, SCALE - 1, SCALE] {
            let sym = EncSymbol::new(0, freq, SCALE_BITS);
            let x_max = ((RANS64_L >> SCALE_BITS) << 32) * freq as u64;
            for x in [RANS64_L, RANS64_L + 1, x_max / 2, x_max - 1] {
                let q = mul_hi(x, sym.rcp_freq) >> sym.rcp_shift;
                if freq >= 2 {
                    assert_eq!(q, x / freq as u64, "freq {} x {}", freq, x);
                } else {
                    assert_eq!(q, x - 1);
                }
            }
        }
    }

    #[test]
    fn test_fast_stream_matches_reference() {
        let input = b"abracadabra, abracadabra, alakazam".repeat(50);
        let reference = rans::init(&input).unwrap();
        let fast = init(&input).unwrap();

        let mut ref_buf = vec![0u8; max_compressed_len(input.len())];
        let mut fast_buf = vec![0u8; max_compressed_len(input.len())];
        let ref_len = rans::encode(&input, &mut ref_buf, &reference.enc_symbols).unwrap();
        let fast_len = encode(&input, &mut fast_buf, &fast.enc_symbols).unwrap();
        assert_eq!(ref_len, fast_len);
        assert_eq!(
            &ref_buf[ref_buf.len() - ref_len..],
            &fast_buf[fast_buf.len() - fast_len..]
        );
    }

    #[test]
    fn test_single_symbol_alphabet() {
        let input = vec![200u8; 10_000];
        let info = init(&input).unwrap();
        let compressed = info.compress(&input).unwrap();
        assert_eq!(compressed.len(), 8);
        let mut output = vec![0u8; input.len()];
        info.decode(&compressed, &mut output).unwrap();
        assert_eq!(output, input);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_fast_roundtrip_via_reference_decoder(input in prop::collection::vec(any::<u8>(), 0..3000)) {
            let fast = init(&input).unwrap();
            let reference = rans::init(&input).unwrap();
            let compressed = fast.compress(&input).unwrap();

            let mut output = vec![0u8; input.len()];
            reference.decode(&compressed, &mut output).unwrap();
            prop_assert_eq!(output, input);
        }
    }
}
