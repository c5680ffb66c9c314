//! Symbol statistics shared by every codec variant.
//!
//! Counts byte occurrences, rescales them so that the cumulative total is an
//! exact power of two, and builds the slot-to-symbol table the decoders use.
//!
//! Rescaling is proportional with floor rounding. A symbol that occurs in the
//! input but rounds down to zero would be undecodable, so a repair pass steals
//! one slot from the symbol with the smallest frequency above one (lowest index
//! on ties) and shifts the cumulative boundaries in between.

use crate::error::{Error, Result};

/// Number of distinct byte symbols.
pub const ALPHABET_SIZE: usize = 256;

/// Per-symbol frequencies and cumulative frequencies.
///
/// Built once per input sequence. Before [`SymbolStats::normalize`] the
/// frequencies are raw counts; afterwards they sum to the target total.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolStats {
    freqs: [u32; ALPHABET_SIZE],
    cum_freqs: [u32; ALPHABET_SIZE + 1],
}

impl SymbolStats {
    /// Count raw symbol occurrences in `bytes`.
    ///
    /// Inputs are expected to be shorter than 2^32 bytes.
    pub fn count(bytes: &[u8]) -> Self {
        let mut freqs = [0u32; ALPHABET_SIZE];
        for &b in bytes {
            freqs[b as usize] += 1;
        }
        let mut stats = Self {
            freqs,
            cum_freqs: [0; ALPHABET_SIZE + 1],
        };
        stats.calc_cum_freqs();
        stats
    }

    /// Count `bytes` and normalize to `target_total` in one step.
    pub fn from_bytes(bytes: &[u8], target_total: u32) -> Result<Self> {
        let mut stats = Self::count(bytes);
        stats.normalize(target_total)?;
        Ok(stats)
    }

    fn calc_cum_freqs(&mut self) {
        self.cum_freqs[0] = 0;
        for i in 0..ALPHABET_SIZE {
            self.cum_freqs[i + 1] = self.cum_freqs[i] + self.freqs[i];
        }
    }

    /// Rescale the frequencies so they sum to exactly `target_total`.
    ///
    /// Every symbol with a nonzero count keeps a frequency of at least one.
    ///
    /// # Errors
    /// Returns `Error::DegenerateFrequencyTable` if `target_total` is zero or
    /// smaller than the number of distinct symbols present.
    pub fn normalize(&mut self, target_total: u32) -> Result<()> {
        let distinct = self.distinct_symbols();
        if target_total == 0 || distinct as u64 > target_total as u64 {
            return Err(Error::DegenerateFrequencyTable {
                distinct,
                total: target_total,
            });
        }

        // No data: give the whole range to symbol 0 so the table stays valid.
        if distinct == 0 {
            self.freqs = [0; ALPHABET_SIZE];
            self.freqs[0] = target_total;
            self.calc_cum_freqs();
            log::debug!("normalized empty input to total {}", target_total);
            return Ok(());
        }

        let mut cum = [0u64; ALPHABET_SIZE + 1];
        for i in 0..ALPHABET_SIZE {
            cum[i + 1] = cum[i] + self.freqs[i] as u64;
        }
        let cur_total = cum[ALPHABET_SIZE];
        for c in cum.iter_mut().skip(1) {
            *c = (target_total as u64 * *c) / cur_total;
        }

        let mut repairs = 0usize;
        for s in 0..ALPHABET_SIZE {
            if self.freqs[s] == 0 || cum[s + 1] != cum[s] {
                continue;
            }

            let donor = (0..ALPHABET_SIZE)
                .filter(|&j| cum[j + 1] - cum[j] > 1)
                .min_by_key(|&j| cum[j + 1] - cum[j])
                .ok_or(Error::DegenerateFrequencyTable {
                    distinct,
                    total: target_total,
                })?;

            if donor < s {
                for c in &mut cum[donor + 1..=s] {
                    *c -= 1;
                }
            } else {
                for c in &mut cum[s + 1..=donor] {
                    *c += 1;
                }
            }
            repairs += 1;
        }

        for i in 0..=ALPHABET_SIZE {
            self.cum_freqs[i] = cum[i] as u32;
        }
        for i in 0..ALPHABET_SIZE {
            self.freqs[i] = self.cum_freqs[i + 1] - self.cum_freqs[i];
        }

        log::debug!(
            "normalized {} distinct symbols to total {} ({} repairs)",
            distinct,
            target_total,
            repairs
        );
        Ok(())
    }

    /// Frequency of `symbol`.
    #[inline]
    pub fn freq(&self, symbol: u8) -> u32 {
        self.freqs[symbol as usize]
    }

    /// Cumulative frequency of all symbols below `symbol`.
    #[inline]
    pub fn cum_freq(&self, symbol: u8) -> u32 {
        self.cum_freqs[symbol as usize]
    }

    /// All frequencies, indexed by symbol.
    pub fn freqs(&self) -> &[u32; ALPHABET_SIZE] {
        &self.freqs
    }

    /// All cumulative frequencies; entry 256 is the total.
    pub fn cum_freqs(&self) -> &[u32; ALPHABET_SIZE + 1] {
        &self.cum_freqs
    }

    /// Sum of all frequencies.
    pub fn total(&self) -> u32 {
        self.cum_freqs[ALPHABET_SIZE]
    }

    /// Number of symbols with a nonzero frequency.
    pub fn distinct_symbols(&self) -> usize {
        self.freqs.iter().filter(|&&f| f > 0).count()
    }
}

/// Maps every slot in `[0, total)` to the symbol whose range contains it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InverseLookup {
    table: Vec<u8>,
}

impl InverseLookup {
    /// Build the table from normalized statistics.
    pub fn new(stats: &SymbolStats) -> Self {
        let cum = stats.cum_freqs();
        let mut table = vec![0u8; stats.total() as usize];
        for s in 0..ALPHABET_SIZE {
            table[cum[s] as usize..cum[s + 1] as usize].fill(s as u8);
        }
        Self { table }
    }

    /// Symbol owning `slot`. `slot` must be below the table's total.
    #[inline]
    pub fn symbol(&self, slot: u32) -> u8 {
        self.table[slot as usize]
    }

    /// Number of slots (the frequency total).
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
