//! JPEG-LS adaptor round trips through CharLS.

use dicom_pixel_codecs::{
    decode_jpegls, encode_jpegls, CodecContext, DecoderParameters, EncoderParameters,
    PhotometricInterpretation,
};

fn lcg_noise(len: usize, seed: &mut u32) -> Vec<u8> {
    (0..len)
        .map(|_| {
            *seed = seed.wrapping_mul(4_294_967_291).wrapping_add(67_291);
            (*seed >> 7) as u8
        })
        .collect()
}

fn context(columns: u32, rows: u32, bits_allocated: u16, samples_per_pixel: u16) -> CodecContext {
    let mut ctx = CodecContext::new();
    ctx.set_columns(columns);
    ctx.set_rows(rows);
    ctx.set_bits_allocated(bits_allocated);
    ctx.set_bits_stored(bits_allocated);
    ctx.set_samples_per_pixel(samples_per_pixel);
    ctx.set_photometric_interpretation(if samples_per_pixel == 1 {
        PhotometricInterpretation::Monochrome2
    } else {
        PhotometricInterpretation::Rgb
    });
    ctx
}

#[test]
fn grayscale_8_bit_lossless_round_trip() {
    let mut seed = 1;
    let raw = lcg_noise(64 * 64, &mut seed);
    let mut ctx = context(64, 64, 8, 1);
    ctx.set_decoded_buffer(&raw);

    encode_jpegls(&mut ctx, &EncoderParameters::new()).expect("encoding failed");
    assert!(!ctx.encoded_buffer().is_empty());

    ctx.resize_decoded_buffer(0);
    decode_jpegls(&mut ctx, &DecoderParameters::new()).expect("decoding failed");
    assert_eq!(ctx.decoded_buffer(), &raw[..]);
}

#[test]
fn grayscale_16_bit_lossless_round_trip() {
    let mut seed = 2;
    let raw = lcg_noise(32 * 32 * 2, &mut seed);
    let mut ctx = context(32, 32, 16, 1);
    ctx.set_decoded_buffer(&raw);

    encode_jpegls(&mut ctx, &EncoderParameters::new()).unwrap();
    ctx.resize_decoded_buffer(0);
    decode_jpegls(&mut ctx, &DecoderParameters::new()).unwrap();
    assert_eq!(ctx.decoded_buffer(), &raw[..]);
}

#[test]
fn colour_lossless_round_trip() {
    let mut seed = 3;
    let raw = lcg_noise(32 * 32 * 3, &mut seed);
    let mut ctx = context(32, 32, 8, 3);
    ctx.set_decoded_buffer(&raw);

    encode_jpegls(&mut ctx, &EncoderParameters::new()).unwrap();
    ctx.resize_decoded_buffer(0);
    decode_jpegls(&mut ctx, &DecoderParameters::new()).unwrap();
    assert_eq!(ctx.decoded_buffer(), &raw[..]);
}

#[test]
fn near_lossless_error_stays_within_tolerance() {
    let columns = 64u32;
    let rows = 64u32;
    let raw: Vec<u8> = (0..columns * rows).map(|i| (i % 251) as u8).collect();

    let mut ctx = context(columns, rows, 8, 1);
    ctx.set_decoded_buffer(&raw);

    let mut params = EncoderParameters::new();
    params.lossy = true;
    params.allowed_lossy_error = 2;
    encode_jpegls(&mut ctx, &params).unwrap();

    ctx.resize_decoded_buffer(0);
    decode_jpegls(&mut ctx, &DecoderParameters::new()).unwrap();
    assert_eq!(ctx.decoded_buffer().len(), raw.len());
    for (&decoded, &source) in ctx.decoded_buffer().iter().zip(&raw) {
        assert!(
            decoded.abs_diff(source) <= 2,
            "sample error beyond the near-lossless tolerance: {} vs {}",
            decoded,
            source
        );
    }
}
