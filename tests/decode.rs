mod common;

use crate::common::{init, FluxStreamBuilder};
use gwflux::{decode_flux, FluxError};
use rand::{rngs::StdRng, Rng, SeedableRng};

#[test]
fn test_decode_short_and_extended() {
    init();
    let stream = FluxStreamBuilder::new()
        .flux(0)
        .flux(249)
        .flux(250)
        .flux(1000)
        .flux(1524)
        .finish();

    let (flux, index) = decode_flux(&stream).unwrap();
    assert_eq!(flux, vec![0, 249, 250, 1000, 1524]);
    assert!(index.is_empty());
}

#[test]
fn test_decode_long_interval_uses_space() {
    init();
    let stream = FluxStreamBuilder::new().flux(1525).flux(100_000).flux(7).finish();
    assert!(stream.contains(&255));

    let (flux, _) = decode_flux(&stream).unwrap();
    assert_eq!(flux, vec![1525, 100_000, 7]);
}

#[test]
fn test_decode_index_distances() {
    init();
    let stream = FluxStreamBuilder::new()
        .flux(100)
        .index(30)
        .flux(50)
        .flux(70)
        .index(10)
        .flux(20)
        .finish();

    let (flux, index) = decode_flux(&stream).unwrap();
    assert_eq!(flux, vec![100, 50, 70, 20]);
    // Pulses at 130 and 230 ticks.
    assert_eq!(index, vec![130, 100]);
}

#[test]
fn test_decode_index_during_space() {
    init();
    let stream = FluxStreamBuilder::new()
        .flux(10)
        .space(40)
        .index(5)
        .flux(100)
        .index(20)
        .finish();

    let (flux, index) = decode_flux(&stream).unwrap();
    // The space is folded into the interval that follows it.
    assert_eq!(flux, vec![10, 140]);
    // Pulses at 55 and 170 ticks.
    assert_eq!(index, vec![55, 115]);
}

#[test]
fn test_decode_errors() {
    init();
    assert_eq!(decode_flux(&[5]), Err(FluxError::MalformedBuffer));
    assert_eq!(decode_flux(&[5, 6, 7]), Err(FluxError::MalformedBuffer));
    assert_eq!(decode_flux(&[255, 2, 0, 0, 0, 0]), Err(FluxError::UnexpectedEndOfStream));
    assert_eq!(decode_flux(&[255, 1, 3, 3, 0]), Err(FluxError::UnexpectedEndOfStream));
    assert_eq!(decode_flux(&[12, 255, 0]), Err(FluxError::UnexpectedEndOfStream));
    assert_eq!(decode_flux(&[12, 255, 9, 0]), Err(FluxError::UnknownOpcode(9)));
}

#[test]
fn test_decode_spec_examples() {
    init();
    assert_eq!(decode_flux(&[5, 255, 2, 0, 0, 0, 0, 0]), Ok((vec![5], vec![])));
    assert_eq!(decode_flux(&[255, 1, 0, 0, 0, 0, 0]), Ok((vec![], vec![0])));
}

#[test]
fn test_decode_random_streams() {
    init();
    let mut rng = StdRng::seed_from_u64(0x6777_666c_7578);

    for _ in 0..50 {
        let mut builder = FluxStreamBuilder::new();
        let mut expected_flux = Vec::new();
        let mut expected_index = Vec::new();

        let mut time: i64 = 0;
        let mut last_index: i64 = 0;
        for _ in 0..rng.gen_range(0..500) {
            let val = match rng.gen_range(0..10) {
                0 => rng.gen_range(1525..200_000),
                1..=3 => rng.gen_range(250..1525),
                _ => rng.gen_range(0..250),
            };
            builder.flux(val);
            expected_flux.push(val);
            time += val as i64;

            if rng.gen_ratio(1, 50) {
                let offset = rng.gen_range(0..1000);
                builder.index(offset);
                expected_index.push(time + offset as i64 - last_index);
                last_index = time + offset as i64;
            }
        }

        let stream = builder.finish();
        let (flux, index) = decode_flux(&stream).unwrap();
        assert_eq!(flux, expected_flux);
        assert_eq!(index, expected_index);
    }
}

#[test]
fn test_decode_is_atomic() {
    init();
    // A well-formed prefix followed by a bad opcode produces no output at all.
    let mut stream = FluxStreamBuilder::new().flux(100).flux(200).index(4).finish();
    stream.pop();
    stream.extend_from_slice(&[255, 7, 0]);

    assert_eq!(decode_flux(&stream), Err(FluxError::UnknownOpcode(7)));
}
