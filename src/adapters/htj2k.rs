//! High-throughput JPEG 2000 (ISO/IEC 15444-15) adaptor.
//!
//! HT code streams are read through OpenJPEG 2.5. Encoding drives the
//! same Part 1 coder under the high-throughput layout decisions: 64×64
//! code blocks, ceiling-halved decomposition count and component-planar
//! exchange with signed/unsigned sample promotion.

use snafu::prelude::*;

use super::jpeg2k::{compress, progression_order, read_codestream, ImageGuard};
use crate::context::{CodecContext, PixelRepresentation};
use crate::error::{encode_error, DecodeResult, EncodeResult};
use crate::params::{DecoderParameters, EncoderParameters};

use openjpeg_sys as opj;
use std::slice;

/// Number of wavelet decompositions for a frame extent: ceiling-halve
/// both extents while both exceed the 64-pixel code block, capped at 6.
pub(crate) fn decomposition_count(columns: u32, rows: u32) -> u32 {
    let mut count = 0;
    let mut tw = columns;
    let mut th = rows;
    while tw > 64 && th > 64 {
        count += 1;
        tw = (tw + 1) / 2;
        th = (th + 1) / 2;
    }
    count.min(6)
}

/// Decode the HT code stream in the encoded buffer into raw samples.
///
/// Each component line is clamped to the context's sample range
/// (`[0, 255]`, `[0, 65535]` or `[i16::MIN, i16::MAX]`) and scattered
/// into the raw buffer with the samples-per-pixel stride.
pub fn decode_htj2k(ctx: &mut CodecContext, params: &DecoderParameters) -> DecodeResult<()> {
    tracing::trace!(context = %ctx, params = %params, "decode_htj2k");
    let result = decode_frame(ctx);
    if let Err(e) = &result {
        ctx.report_failure(&e.to_string());
    }
    result
}

fn decode_frame(ctx: &mut CodecContext) -> DecodeResult<()> {
    let image = read_codestream(&ctx.encoded_buffer)?;
    let components = image.components();
    ensure_whatever!(!components.is_empty(), "HT code stream carries no components");

    let raw = image.image();
    let width = (raw.x1 - raw.x0) as usize;
    let height = (raw.y1 - raw.y0) as usize;
    let num_pixels = width * height;

    let samples_per_pixel = usize::from(ctx.samples_per_pixel()).max(1);
    let bytes_allocated = ctx.bytes_allocated().max(1);
    let signed = ctx.pixel_representation() == PixelRepresentation::Signed;

    ensure_whatever!(
        components.len() >= samples_per_pixel,
        "HT code stream carries {} components, {} expected",
        components.len(),
        samples_per_pixel
    );

    ctx.resize_decoded_buffer(num_pixels * samples_per_pixel * bytes_allocated);
    let sink = &mut ctx.decoded_buffer;

    for (c, component) in components.iter().take(samples_per_pixel).enumerate() {
        let available = (component.w as usize * component.h as usize).min(num_pixels);
        let samples = unsafe { slice::from_raw_parts(component.data, available) };

        if bytes_allocated <= 1 {
            for (i, &sample) in samples.iter().enumerate() {
                sink[i * samples_per_pixel + c] = sample.clamp(0, i32::from(u8::MAX)) as u8;
            }
        } else if signed {
            for (i, &sample) in samples.iter().enumerate() {
                let value = sample.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
                let offset = (i * samples_per_pixel + c) * 2;
                sink[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
            }
        } else {
            for (i, &sample) in samples.iter().enumerate() {
                let value = sample.clamp(0, i32::from(u16::MAX)) as u16;
                let offset = (i * samples_per_pixel + c) * 2;
                sink[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
            }
        }
    }

    Ok(())
}

/// Encode the raw samples in the decoded buffer as a high-throughput
/// layout code stream.
pub fn encode_htj2k(ctx: &mut CodecContext, params: &EncoderParameters) -> EncodeResult<()> {
    tracing::trace!(context = %ctx, params = %params, "encode_htj2k");
    let result = encode_frame(ctx, params);
    if let Err(e) = &result {
        ctx.report_failure(&e.to_string());
    }
    result
}

fn encode_frame(ctx: &mut CodecContext, params: &EncoderParameters) -> EncodeResult<()> {
    let columns = ctx.columns();
    let rows = ctx.rows();
    let samples_per_pixel = usize::from(ctx.samples_per_pixel());
    ensure_whatever!(columns > 0 && rows > 0, "image extent is empty");
    ensure_whatever!(
        (1..=3).contains(&samples_per_pixel),
        "unsupported samples per pixel ({})",
        samples_per_pixel
    );

    // colour transform across components; planar exchange otherwise
    let color_transform = samples_per_pixel > 1;

    let mut parameters: opj::opj_cparameters_t = unsafe { std::mem::zeroed() };
    unsafe { opj::opj_set_default_encoder_parameters(&mut parameters) };

    parameters.irreversible = i32::from(params.lossy);
    parameters.prog_order = progression_order(params.progression_order);
    parameters.tcp_mct = i8::from(color_transform) as _;
    parameters.cblockw_init = 64;
    parameters.cblockh_init = 64;
    parameters.numresolution = decomposition_count(columns, rows) as i32 + 1;
    parameters.tcp_numlayers = 1;
    parameters.tcp_rates[0] = 0.0;
    parameters.cp_disto_alloc = 1;

    let signed = ctx.pixel_representation() == PixelRepresentation::Signed;
    let mut cmptparm = [unsafe { std::mem::zeroed::<opj::opj_image_cmptparm_t>() }; 3];
    for parm in cmptparm.iter_mut().take(samples_per_pixel) {
        parm.bpp = u32::from(ctx.bits_allocated());
        parm.prec = u32::from(ctx.bits_allocated());
        parm.sgnd = u32::from(signed);
        parm.dx = 1;
        parm.dy = 1;
        parm.w = columns;
        parm.h = rows;
    }

    let color_space = if samples_per_pixel > 1 {
        opj::COLOR_SPACE::OPJ_CLRSPC_SRGB
    } else {
        opj::COLOR_SPACE::OPJ_CLRSPC_GRAY
    };

    let image = unsafe {
        ImageGuard(opj::opj_image_create(
            samples_per_pixel as u32,
            cmptparm.as_mut_ptr(),
            color_space,
        ))
    };
    ensure!(!image.as_ptr().is_null(), encode_error::EncodeFailedSnafu);

    unsafe {
        let raw = &mut *image.as_ptr();
        raw.x0 = 0;
        raw.y0 = 0;
        raw.x1 = columns;
        raw.y1 = rows;
    }

    exchange_components(ctx, &image)?;

    let encoded = compress(&mut parameters, &image)?;
    ctx.encoded_buffer = encoded;
    Ok(())
}

/// Promote the raw frame into the image's component planes: u8 and u16
/// samples widen with zero extension, i16 samples with sign extension.
fn exchange_components(ctx: &CodecContext, image: &ImageGuard) -> EncodeResult<()> {
    let num_pixels = ctx.pixel_count();
    let samples_per_pixel = usize::from(ctx.samples_per_pixel());
    let bytes_allocated = ctx.bytes_allocated();
    let signed = ctx.pixel_representation() == PixelRepresentation::Signed;

    ensure!(
        ctx.decoded_buffer.len() >= ctx.frame_length(),
        encode_error::InputOverflowSnafu
    );
    let source = &ctx.decoded_buffer;

    for (c, component) in image
        .components()
        .iter()
        .take(samples_per_pixel)
        .enumerate()
    {
        let data = unsafe { slice::from_raw_parts_mut(component.data, num_pixels) };

        if bytes_allocated <= 1 {
            for (i, dst) in data.iter_mut().enumerate() {
                *dst = i32::from(source[i * samples_per_pixel + c]);
            }
        } else if signed {
            for (i, dst) in data.iter_mut().enumerate() {
                let offset = (i * samples_per_pixel + c) * 2;
                *dst = i32::from(i16::from_le_bytes([source[offset], source[offset + 1]]));
            }
        } else {
            for (i, dst) in data.iter_mut().enumerate() {
                let offset = (i * samples_per_pixel + c) * 2;
                *dst = i32::from(u16::from_le_bytes([source[offset], source[offset + 1]]));
            }
        }
    }

    Ok(())
}
