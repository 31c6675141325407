//! RLE Lossless frame codec.
//!
//! An RLE frame is a fixed 64-byte header (a little-endian `u32` segment
//! count followed by fifteen little-endian `i32` segment offsets) and up
//! to fifteen PackBits byte streams. Each segment carries one byte plane
//! of one sample across the whole image, most significant byte first,
//! so a 16-bit RGB frame is laid out as:
//!
//! ```text
//! Segment: 0     | 1     | 2     | 3     | 4     | 5
//!          R MSB | R LSB | G MSB | G LSB | B MSB | B LSB
//! ```
//!
//! Decoding scatters each segment directly into its interleaved (or
//! planar) position in the raw buffer; encoding walks the raw buffer
//! with the same stride and feeds each byte plane to a streaming
//! PackBits encoder.

mod decoder;
mod encoder;

use snafu::prelude::*;

use crate::context::{CodecContext, PlanarConfiguration};
use crate::error::{encode_error, DecodeResult, EncodeResult};
use crate::params::{DecoderParameters, EncoderParameters};
use decoder::RleDecoder;
use encoder::RleEncoder;

/// Decode the RLE frame in the encoded buffer into raw samples.
///
/// The decoded buffer is resized to
/// `columns · rows · samples_per_pixel · bytes_allocated` and filled
/// according to the context's planar configuration.
pub fn decode_rle(ctx: &mut CodecContext, params: &DecoderParameters) -> DecodeResult<()> {
    tracing::trace!(context = %ctx, params = %params, "decode_rle");
    let result = decode_frame(ctx);
    if let Err(e) = &result {
        ctx.report_failure(&e.to_string());
    }
    result
}

fn decode_frame(ctx: &mut CodecContext) -> DecodeResult<()> {
    let bytes_allocated = ctx.bytes_allocated();
    ensure_whatever!(bytes_allocated > 0, "bits allocated is 0");
    let pixel_count = ctx.pixel_count();
    let samples_per_pixel = usize::from(ctx.samples_per_pixel());
    let planar_configuration = ctx.planar_configuration();

    ctx.resize_decoded_buffer(pixel_count * bytes_allocated * samples_per_pixel);

    let decoder = RleDecoder::new(&ctx.encoded_buffer)?;
    let sink = &mut ctx.decoded_buffer;

    for segment in 0..decoder.segment_count() as usize {
        let sample = segment / bytes_allocated;
        let sabyte = segment % bytes_allocated;

        let (start, sample_offset) = segment_layout(
            planar_configuration,
            sample,
            sabyte,
            bytes_allocated,
            samples_per_pixel,
            pixel_count,
        );

        decoder.decode_segment(segment, sink, start, sample_offset)?;
    }

    Ok(())
}

/// Encode the raw samples in the decoded buffer as an RLE frame.
///
/// Writes `bytes_allocated · samples_per_pixel` segments and pads the
/// result to even length.
pub fn encode_rle(ctx: &mut CodecContext, params: &EncoderParameters) -> EncodeResult<()> {
    tracing::trace!(context = %ctx, params = %params, "encode_rle");
    let result = encode_frame(ctx);
    if let Err(e) = &result {
        ctx.report_failure(&e.to_string());
    }
    result
}

fn encode_frame(ctx: &mut CodecContext) -> EncodeResult<()> {
    let bytes_allocated = ctx.bytes_allocated();
    let pixel_count = ctx.pixel_count();
    let samples_per_pixel = usize::from(ctx.samples_per_pixel());
    let planar_configuration = ctx.planar_configuration();
    let number_of_segments = bytes_allocated * samples_per_pixel;

    let mut encoder = RleEncoder::new();
    let source = &ctx.decoded_buffer;

    for segment in 0..number_of_segments {
        encoder.next_segment()?;

        let sample = segment / bytes_allocated;
        let sabyte = segment % bytes_allocated;
        let (start, sample_offset) = segment_layout(
            planar_configuration,
            sample,
            sabyte,
            bytes_allocated,
            samples_per_pixel,
            pixel_count,
        );

        let mut pos = start;
        for _ in 0..pixel_count {
            ensure!(pos < source.len(), encode_error::InputOverflowSnafu);
            encoder.encode(source[pos]);
            pos += sample_offset;
        }
        encoder.flush();
    }

    encoder.make_even_length();
    ctx.encoded_buffer = encoder.into_encoded();

    Ok(())
}

/// Start position and stride of one segment's byte plane within the raw
/// buffer. Segment bytes are stored most significant first, so byte
/// `sabyte` of a sample lands `bytes_allocated − sabyte − 1` bytes into
/// its little-endian sample.
fn segment_layout(
    planar_configuration: PlanarConfiguration,
    sample: usize,
    sabyte: usize,
    bytes_allocated: usize,
    samples_per_pixel: usize,
    pixel_count: usize,
) -> (usize, usize) {
    let mut start = match planar_configuration {
        PlanarConfiguration::Interleaved => sample * bytes_allocated,
        PlanarConfiguration::Planar => sample * bytes_allocated * pixel_count,
    };
    start += bytes_allocated - sabyte - 1;

    let sample_offset = match planar_configuration {
        PlanarConfiguration::Interleaved => samples_per_pixel * bytes_allocated,
        PlanarConfiguration::Planar => bytes_allocated,
    };

    (start, sample_offset)
}
