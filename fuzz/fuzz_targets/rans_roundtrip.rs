#![no_main]
use libfuzzer_sys::fuzz_target;
use rans_accuracy::{Codec, FastRansCodec, FixedAccuracyCodec, RansCodec};

fn check<C: Codec>(input: &[u8]) {
    let codec = match C::init(input) {
        Ok(codec) => codec,
        Err(_) => return,
    };
    let compressed = codec.compress(input).unwrap();
    let mut output = vec![0u8; input.len()];
    codec.decode(&compressed, &mut output).unwrap();
    assert_eq!(input, &output[..]);

    // Decoding garbage must fail cleanly or produce some bytes, never panic.
    let mut scratch = vec![0u8; input.len()];
    let _ = codec.decode(input, &mut scratch);
}

fuzz_target!(|data: &[u8]| {
    check::<RansCodec>(data);
    check::<FastRansCodec>(data);
    check::<FixedAccuracyCodec>(data);
});
