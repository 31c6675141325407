//! JPEG adaptor tests: colour-space patching, dispatch refusals and
//! lossy round trips.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dicom_pixel_codecs::{
    decode_jpeg, encode_jpeg, CodecContext, DecodeError, DecoderParameters, EncodeError,
    EncoderParameters, PhotometricInterpretation, PixelRepresentation, PlanarConfiguration,
};

const COLUMNS: u32 = 32;
const ROWS: u32 = 32;

fn rgb_context() -> CodecContext {
    let mut ctx = CodecContext::new();
    ctx.set_columns(COLUMNS);
    ctx.set_rows(ROWS);
    ctx.set_bits_allocated(8);
    ctx.set_bits_stored(8);
    ctx.set_samples_per_pixel(3);
    ctx.set_photometric_interpretation(PhotometricInterpretation::Rgb);
    ctx
}

/// A smooth RGB gradient; compresses gently, so lossy errors stay small.
fn rgb_gradient() -> Vec<u8> {
    let mut data = Vec::with_capacity(COLUMNS as usize * ROWS as usize * 3);
    for y in 0..ROWS {
        for x in 0..COLUMNS {
            data.push((x * 8) as u8);
            data.push((y * 8) as u8);
            data.push(128);
        }
    }
    data
}

fn encode_rgb_jpeg() -> Vec<u8> {
    let mut ctx = rgb_context();
    ctx.set_decoded_buffer(&rgb_gradient());
    let mut params = EncoderParameters::new();
    params.lossy = true;
    params.quality = 95;
    encode_jpeg(&mut ctx, &params).expect("JPEG encoding failed");
    ctx.encoded_buffer().to_vec()
}

#[test]
fn colour_decode_patches_the_context() {
    let encoded = encode_rgb_jpeg();

    let mut ctx = rgb_context();
    ctx.set_photometric_interpretation(PhotometricInterpretation::YbrFull);
    ctx.set_planar_configuration(PlanarConfiguration::Planar);
    ctx.set_encoded_buffer(&encoded);

    let mut params = DecoderParameters::new();
    params.convert_colorspace_to_rgb = true;
    decode_jpeg(&mut ctx, &params).expect("JPEG decoding failed");

    assert_eq!(
        ctx.photometric_interpretation(),
        PhotometricInterpretation::Rgb
    );
    assert_eq!(ctx.planar_configuration(), PlanarConfiguration::Interleaved);
    assert_eq!(
        ctx.decoded_buffer().len(),
        COLUMNS as usize * ROWS as usize * 3
    );

    // the gradient survives the lossy round trip within a small margin
    let original = rgb_gradient();
    for (&decoded, &source) in ctx.decoded_buffer().iter().zip(&original) {
        assert!(
            decoded.abs_diff(source) <= 16,
            "sample error too large: {} vs {}",
            decoded,
            source
        );
    }
}

#[test]
fn signed_colour_conversion_is_refused() {
    let encoded = encode_rgb_jpeg();

    let mut ctx = rgb_context();
    ctx.set_photometric_interpretation(PhotometricInterpretation::YbrFull);
    ctx.set_pixel_representation(PixelRepresentation::Signed);
    ctx.set_encoded_buffer(&encoded);

    let mut params = DecoderParameters::new();
    params.convert_colorspace_to_rgb = true;
    let err = decode_jpeg(&mut ctx, &params).unwrap_err();
    assert!(matches!(err, DecodeError::SignedColorConvertUnsupported));

    // the context descriptors are untouched by the failed call
    assert_eq!(
        ctx.photometric_interpretation(),
        PhotometricInterpretation::YbrFull
    );
    assert_eq!(ctx.planar_configuration(), PlanarConfiguration::Interleaved);
}

#[test]
fn failures_reach_the_event_sink() {
    let encoded = encode_rgb_jpeg();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut ctx = rgb_context();
    ctx.set_pixel_representation(PixelRepresentation::Signed);
    ctx.set_encoded_buffer(&encoded);
    ctx.set_event_sink(move |message| {
        assert!(!message.is_empty());
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let mut params = DecoderParameters::new();
    params.convert_colorspace_to_rgb = true;
    decode_jpeg(&mut ctx, &params).unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn grayscale_frames_round_trip() {
    let mut ctx = CodecContext::new();
    ctx.set_columns(COLUMNS);
    ctx.set_rows(ROWS);
    ctx.set_bits_allocated(8);
    ctx.set_bits_stored(8);
    ctx.set_samples_per_pixel(1);
    ctx.set_photometric_interpretation(PhotometricInterpretation::Monochrome2);

    let raw: Vec<u8> = (0..COLUMNS * ROWS).map(|i| (i / 8) as u8).collect();
    ctx.set_decoded_buffer(&raw);

    let mut params = EncoderParameters::new();
    params.lossy = true;
    params.quality = 100;
    encode_jpeg(&mut ctx, &params).unwrap();

    ctx.resize_decoded_buffer(0);
    decode_jpeg(&mut ctx, &DecoderParameters::new()).unwrap();
    assert_eq!(ctx.decoded_buffer().len(), raw.len());
    for (&decoded, &source) in ctx.decoded_buffer().iter().zip(&raw) {
        assert!(decoded.abs_diff(source) <= 8);
    }
}

#[test]
fn lossy_encoding_requires_8_bit_samples() {
    let mut ctx = rgb_context();
    ctx.set_bits_allocated(16);
    ctx.set_bits_stored(12);
    ctx.set_decoded_buffer(&vec![0; COLUMNS as usize * ROWS as usize * 3 * 2]);

    let mut params = EncoderParameters::new();
    params.lossy = true;
    let err = encode_jpeg(&mut ctx, &params).unwrap_err();
    assert!(matches!(
        err,
        EncodeError::UnsupportedBitDepth { precision: 12 }
    ));
}

#[test]
fn lossless_encoding_is_not_implemented() {
    let mut ctx = rgb_context();
    ctx.set_decoded_buffer(&rgb_gradient());
    let err = encode_jpeg(&mut ctx, &EncoderParameters::new()).unwrap_err();
    assert!(matches!(err, EncodeError::NotImplemented));
}

#[test]
fn decoding_without_any_bit_depth_fails() {
    let mut ctx = CodecContext::new();
    ctx.set_columns(4);
    ctx.set_rows(4);
    ctx.set_samples_per_pixel(1);
    // no SOF marker and no stored bit depth to fall back to
    ctx.set_encoded_buffer(&[0xFF, 0xD8, 0xFF, 0xD9]);
    let err = decode_jpeg(&mut ctx, &DecoderParameters::new()).unwrap_err();
    assert!(matches!(err, DecodeError::BitDepthUnknown));
}
