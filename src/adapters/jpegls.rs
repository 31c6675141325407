//! JPEG-LS (ISO/IEC 14495-1) adaptor over the CharLS reference
//! implementation.

use std::borrow::Cow;

use charls::{CharLS, FrameInfo};
use snafu::prelude::*;

use crate::context::{CodecContext, PlanarConfiguration};
use crate::error::{DecodeResult, EncodeResult};
use crate::params::{DecoderParameters, EncoderParameters};
use crate::planar::change_planar_configuration;

/// Decode the JPEG-LS stream in the encoded buffer into raw samples.
pub fn decode_jpegls(ctx: &mut CodecContext, params: &DecoderParameters) -> DecodeResult<()> {
    tracing::trace!(context = %ctx, params = %params, "decode_jpegls");
    let result = decode_frame(ctx);
    if let Err(e) = &result {
        ctx.report_failure(&e.to_string());
    }
    result
}

fn decode_frame(ctx: &mut CodecContext) -> DecodeResult<()> {
    let decoded = CharLS::default()
        .decode(&ctx.encoded_buffer)
        .map_err(|error| Box::new(error) as Box<_>)
        .with_whatever_context(|error: &mut Box<dyn std::error::Error + Send + 'static>| error.to_string())?;

    ctx.decoded_buffer = decoded;
    Ok(())
}

/// Encode the raw samples in the decoded buffer as a JPEG-LS stream.
///
/// The near-lossless tolerance is taken from
/// [`allowed_lossy_error`](crate::EncoderParameters::allowed_lossy_error)
/// when lossy encoding is requested, and zero otherwise.
pub fn encode_jpegls(ctx: &mut CodecContext, params: &EncoderParameters) -> EncodeResult<()> {
    tracing::trace!(context = %ctx, params = %params, "encode_jpegls");
    let result = encode_frame(ctx, params);
    if let Err(e) = &result {
        ctx.report_failure(&e.to_string());
    }
    result
}

fn encode_frame(ctx: &mut CodecContext, params: &EncoderParameters) -> EncodeResult<()> {
    let frame_info = FrameInfo {
        width: ctx.columns(),
        height: ctx.rows(),
        bits_per_sample: i32::from(ctx.bits_allocated()),
        component_count: i32::from(ctx.samples_per_pixel()),
    };

    let near = if params.lossy {
        params.allowed_lossy_error as i32
    } else {
        0
    };

    // CharLS consumes sample-interleaved input, so planar colour frames
    // are normalised on a scratch copy first
    let frame_data: Cow<[u8]> = if ctx.planar_configuration() == PlanarConfiguration::Planar
        && ctx.samples_per_pixel() > 1
    {
        let mut interleaved = ctx.decoded_buffer.clone();
        change_planar_configuration(
            &mut interleaved,
            ctx.bits_allocated(),
            ctx.samples_per_pixel(),
            PlanarConfiguration::Planar,
        )
        .map_err(|e| Box::new(e) as Box<_>)
        .with_whatever_context(|error: &mut Box<dyn std::error::Error + Send + 'static>| error.to_string())?;
        Cow::Owned(interleaved)
    } else {
        Cow::Borrowed(&ctx.decoded_buffer)
    };

    let compressed = CharLS::default()
        .encode(frame_info, near, frame_data.as_ref())
        .map_err(|error| Box::new(error) as Box<_>)
        .with_whatever_context(|error: &mut Box<dyn std::error::Error + Send + 'static>| error.to_string())?;

    ctx.encoded_buffer = compressed;
    Ok(())
}
