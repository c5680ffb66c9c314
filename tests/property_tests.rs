use proptest::prelude::*;
use rans_accuracy::sample::{geometric_bytes, uniform_bytes};
use rans_accuracy::{
    fixed_accuracy, rans, rans_fast, Codec, FastRansCodec, FixedAccuracyCodec, RansCodec,
    SymbolStats,
};

fn roundtrip<C: Codec>(input: &[u8]) -> Vec<u8> {
    let codec = C::init(input).unwrap();
    let compressed = codec.compress(input).unwrap();
    let mut output = vec![0u8; input.len()];
    codec.decode(&compressed, &mut output).unwrap();
    output
}

fn compressed_len<C: Codec>(input: &[u8]) -> usize {
    C::init(input).unwrap().compress(input).unwrap().len()
}

#[test]
fn test_concrete_scenario_all_variants() {
    let input = [0u8, 0, 0, 0, 1, 1, 2];
    let stats = SymbolStats::from_bytes(&input, 8).unwrap();
    assert_eq!(&stats.freqs()[..3], &[4, 2, 2]);

    assert_eq!(roundtrip::<RansCodec>(&input), input);
    assert_eq!(roundtrip::<FastRansCodec>(&input), input);
    assert_eq!(roundtrip::<FixedAccuracyCodec>(&input), input);
}

#[test]
fn test_boundary_inputs_all_variants() {
    let inputs: Vec<Vec<u8>> = vec![
        vec![],
        vec![0],
        vec![255],
        vec![17; 1000],
        (0..=255u8).collect(),
        uniform_bytes(10_000, 11),
    ];
    for input in &inputs {
        assert_eq!(&roundtrip::<RansCodec>(input), input);
        assert_eq!(&roundtrip::<FastRansCodec>(input), input);
        assert_eq!(&roundtrip::<FixedAccuracyCodec>(input), input);
    }
}

#[test]
fn test_compression_sanity_geometric() {
    let input = geometric_bytes(1 << 16, 0.7, 2024);
    assert_eq!(roundtrip::<FixedAccuracyCodec>(&input), input);

    let reference = compressed_len::<RansCodec>(&input);
    let fast = compressed_len::<FastRansCodec>(&input);
    let fixed = compressed_len::<FixedAccuracyCodec>(&input);

    assert!(reference < input.len() / 2, "reference: {}", reference);
    assert!(fixed < input.len() / 2, "fixed accuracy: {}", fixed);
    assert_eq!(reference, fast);
    // Reduced precision costs a little, but not much.
    assert!(
        (fixed as f64) < reference as f64 * 1.10,
        "fixed {} vs reference {}",
        fixed,
        reference
    );
    assert!(
        (fixed as f64) > reference as f64 * 0.90,
        "fixed {} vs reference {}",
        fixed,
        reference
    );
}

#[test]
fn test_uniform_data_does_not_compress() {
    let input = uniform_bytes(1 << 14, 5);
    for len in [
        compressed_len::<RansCodec>(&input),
        compressed_len::<FixedAccuracyCodec>(&input),
    ] {
        assert!(len > input.len() * 95 / 100);
        assert!(len <= rans_accuracy::max_compressed_len(input.len()));
    }
}

#[test]
fn test_free_function_surface() {
    let input = geometric_bytes(5000, 0.3, 9);

    let info = rans_fast::init(&input).unwrap();
    let mut buf = vec![0u8; rans_accuracy::max_compressed_len(input.len())];
    let written = rans_fast::encode(&input, &mut buf, &info.enc_symbols).unwrap();
    let tail = &buf[buf.len() - written..];

    // Fast streams decode with the reference decoder and tables.
    let reference = rans::init(&input).unwrap();
    let mut output = vec![0u8; input.len()];
    rans::decode(&reference.dec_symbols, &reference.cum2sym, tail, &mut output).unwrap();
    assert_eq!(output, input);

    let info = fixed_accuracy::init(&input).unwrap();
    let written = fixed_accuracy::encode(&input, &mut buf, &info.enc_symbols).unwrap();
    let mut output = vec![0u8; input.len()];
    fixed_accuracy::decode(&info.dec_symbols, &info.cum2sym, &buf[..written], &mut output)
        .unwrap();
    assert_eq!(output, input);
}

#[test]
fn test_tables_are_reusable() {
    let input = geometric_bytes(4000, 0.5, 4);
    let codec = FixedAccuracyCodec::init(&input).unwrap();
    let first = codec.compress(&input).unwrap();
    let second = codec.compress(&input).unwrap();
    assert_eq!(first, second);

    // Any subsequence uses only modelled symbols.
    let part = &input[100..900];
    let compressed = codec.compress(part).unwrap();
    let mut output = vec![0u8; part.len()];
    codec.decode(&compressed, &mut output).unwrap();
    assert_eq!(output, part);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_roundtrip_all_variants(input in prop::collection::vec(any::<u8>(), 0..4000)) {
        prop_assert_eq!(roundtrip::<RansCodec>(&input), input.clone());
        prop_assert_eq!(roundtrip::<FastRansCodec>(&input), input.clone());
        prop_assert_eq!(roundtrip::<FixedAccuracyCodec>(&input), input);
    }

    #[test]
    fn prop_roundtrip_skewed(
        p in 0.05f64..0.95,
        len in 1usize..5000,
        seed in any::<u64>(),
    ) {
        let input = geometric_bytes(len, p, seed);
        prop_assert_eq!(roundtrip::<RansCodec>(&input), input.clone());
        prop_assert_eq!(roundtrip::<FixedAccuracyCodec>(&input), input);
    }

    #[test]
    fn prop_fast_and_reference_streams_identical(input in prop::collection::vec(any::<u8>(), 0..2000)) {
        let reference = RansCodec::init(&input).unwrap().compress(&input).unwrap();
        let fast = FastRansCodec::init(&input).unwrap().compress(&input).unwrap();
        prop_assert_eq!(reference, fast);
    }

    #[test]
    fn prop_deterministic_output(input in prop::collection::vec(any::<u8>(), 0..2000)) {
        let a = FixedAccuracyCodec::init(&input).unwrap().compress(&input).unwrap();
        let b = FixedAccuracyCodec::init(&input).unwrap().compress(&input).unwrap();
        prop_assert_eq!(a, b);

        let a = RansCodec::init(&input).unwrap().compress(&input).unwrap();
        let b = RansCodec::init(&input).unwrap().compress(&input).unwrap();
        prop_assert_eq!(a, b);
    }
}
