//! Compare the three rANS variants on synthetic 64 KiB sequences.
//!
//! Set `RUST_LOG=debug` to see the frequency table statistics.

use std::time::Instant;

use rans_accuracy::sample::{geometric_bytes, uniform_bytes};
use rans_accuracy::{
    max_compressed_len, Codec, FastRansCodec, FixedAccuracyCodec, RansCodec, Result,
};

const SEQUENCE_LEN: usize = 1 << 16;
const SEED: u64 = 5489;

fn run<C: Codec>(sequence: &[u8]) -> Result<()> {
    let codec = C::init(sequence)?;
    let mut buf = vec![0u8; max_compressed_len(sequence.len())];
    let mut decoded = vec![0u8; sequence.len()];

    let start = Instant::now();
    let span = codec.encode(sequence, &mut buf)?;
    let encode_ns = start.elapsed().as_nanos();

    let compressed_len = span.len();
    let start = Instant::now();
    codec.decode(&buf[span], &mut decoded)?;
    let decode_ns = start.elapsed().as_nanos();

    if decoded != sequence {
        println!("ERROR! sequence decompressed incorrectly by {}", C::NAME);
    }
    println!(
        "Comp/decomp time {:<12} {}/{} ns, compressed len: {}",
        format!("{}:", C::NAME),
        encode_ns,
        decode_ns,
        compressed_len
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let sequences = [
        ("geometric p=0.7", geometric_bytes(SEQUENCE_LEN, 0.7, SEED)),
        ("geometric p=0.3", geometric_bytes(SEQUENCE_LEN, 0.3, SEED + 1)),
        ("uniform", uniform_bytes(SEQUENCE_LEN, SEED + 2)),
    ];

    for (label, sequence) in &sequences {
        println!("{} ({} bytes)", label, sequence.len());
        run::<FixedAccuracyCodec>(sequence)?;
        run::<RansCodec>(sequence)?;
        run::<FastRansCodec>(sequence)?;
        println!();
    }
    Ok(())
}
