//! JPEG (ISO/IEC 10918) adaptor.
//!
//! Decoding dispatches on the sample precision declared in the stream's
//! start-of-frame segment, falling back to the context's stored bit
//! depth. Encoding supports the baseline 8-bit process.

use std::io::Read;

use jpeg_decoder::{ColorTransform, Decoder, PixelFormat};
use jpeg_encoder::{ColorType, Encoder, SamplingFactor};
use snafu::prelude::*;

use crate::context::{
    CodecContext, PhotometricInterpretation, PixelRepresentation, PlanarConfiguration,
};
use crate::error::{decode_error, encode_error, DecodeResult, EncodeResult};
use crate::params::{DecoderParameters, EncoderParameters, SampleFactor};

/// Decoder subvariant selected from the stream's sample precision.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum JpegVariant {
    /// Up to 8 bits per sample
    Jpeg8,
    /// 9 to 12 bits per sample
    Jpeg12,
    /// 13 to 16 bits per sample
    Jpeg16,
}

pub(crate) fn select_variant(precision: u16) -> DecodeResult<JpegVariant> {
    match precision {
        1..=8 => Ok(JpegVariant::Jpeg8),
        9..=12 => Ok(JpegVariant::Jpeg12),
        13..=16 => Ok(JpegVariant::Jpeg16),
        _ => decode_error::UnsupportedBitDepthSnafu { precision }.fail(),
    }
}

/// Walk the marker stream for the first start-of-frame segment and
/// return its sample precision, or 0 if none is found before the scan.
pub(crate) fn scan_sample_precision(data: &[u8]) -> u16 {
    if data.len() < 2 || data[0] != 0xFF || data[1] != 0xD8 {
        return 0;
    }
    let mut i = 2;
    while i + 2 <= data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = data[i + 1];
        match marker {
            // fill byte before a marker
            0xFF => i += 1,
            // stuffed 0xFF data byte
            0x00 => i += 2,
            // standalone markers: TEM, RST0-7, SOI, EOI
            0x01 | 0xD0..=0xD9 => i += 2,
            // SOF segments, excluding DHT (C4), JPG (C8) and DAC (CC):
            // length (2 bytes) is followed by the sample precision
            0xC0..=0xCF if marker != 0xC4 && marker != 0xC8 && marker != 0xCC => {
                return data.get(i + 4).copied().map(u16::from).unwrap_or(0);
            }
            // entropy-coded data follows, give up
            0xDA => return 0,
            _ => {
                if i + 4 > data.len() {
                    return 0;
                }
                let length = usize::from(data[i + 2]) << 8 | usize::from(data[i + 3]);
                if length < 2 {
                    return 0;
                }
                i += 2 + length;
            }
        }
    }
    0
}

/// Source pump over the encoded buffer.
///
/// Yields the buffer once, then an endless end-of-image marker tail,
/// so that truncated streams still terminate the entropy decoder.
struct EoiTailSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Read for EoiTailSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pos < self.data.len() {
            let n = buf.len().min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        } else {
            for (i, byte) in buf.iter_mut().enumerate() {
                *byte = if (self.pos + i - self.data.len()) % 2 == 0 {
                    0xFF
                } else {
                    0xD9
                };
            }
            self.pos += buf.len();
            Ok(buf.len())
        }
    }
}

/// Decode the JPEG stream in the encoded buffer into raw samples.
///
/// With `convert_colorspace_to_rgb` set and a colour stream, the output
/// is forced to interleaved RGB and the context's photometric
/// interpretation is patched to match; otherwise the components are
/// emitted raw, without any colour transform.
pub fn decode_jpeg(ctx: &mut CodecContext, params: &DecoderParameters) -> DecodeResult<()> {
    tracing::trace!(context = %ctx, params = %params, "decode_jpeg");
    let result = decode_frame(ctx, params);
    if let Err(e) = &result {
        ctx.report_failure(&e.to_string());
    }
    result
}

fn decode_frame(ctx: &mut CodecContext, params: &DecoderParameters) -> DecodeResult<()> {
    let mut precision = scan_sample_precision(&ctx.encoded_buffer);
    if precision == 0 {
        precision = ctx.bits_stored();
    }
    ensure!(precision != 0, decode_error::BitDepthUnknownSnafu);

    let variant = select_variant(precision)?;
    tracing::trace!(?variant, precision, "selected JPEG decoder");
    decode_variant(ctx, params, variant)
}

fn decode_variant(
    ctx: &mut CodecContext,
    params: &DecoderParameters,
    variant: JpegVariant,
) -> DecodeResult<()> {
    let source = EoiTailSource {
        data: &ctx.encoded_buffer,
        pos: 0,
    };
    let mut decoder = Decoder::new(source);
    decoder
        .read_info()
        .map_err(|e| Box::new(e) as Box<_>)
        .whatever_context("JPEG header reading failure")?;
    let info = decoder
        .info()
        .whatever_context("JPEG stream carries no frame header")?;

    let components = match info.pixel_format {
        PixelFormat::L8 | PixelFormat::L16 => 1,
        PixelFormat::RGB24 => 3,
        PixelFormat::CMYK32 => 4,
    };
    let sample_bytes = match info.pixel_format {
        PixelFormat::L16 => 2,
        _ => 1,
    };
    let expected_sample_bytes = match variant {
        JpegVariant::Jpeg8 => 1,
        JpegVariant::Jpeg12 | JpegVariant::Jpeg16 => 2,
    };
    ensure_whatever!(
        sample_bytes == expected_sample_bytes,
        "JPEG stream carries {}-byte samples, {} expected",
        sample_bytes,
        expected_sample_bytes
    );

    let mut patch_colorspace = false;
    if params.convert_colorspace_to_rgb && info.pixel_format == PixelFormat::RGB24 {
        ensure!(
            ctx.pixel_representation() == PixelRepresentation::Unsigned,
            decode_error::SignedColorConvertUnsupportedSnafu
        );
        decoder.set_color_transform(ColorTransform::RGB);
        patch_colorspace = true;
    } else {
        decoder.set_color_transform(ColorTransform::None);
    }

    let decoded = decoder
        .decode()
        .map_err(|e| Box::new(e) as Box<_>)
        .whatever_context("JPEG decoding failure")?;

    let frame_length =
        usize::from(info.width) * usize::from(info.height) * ctx.bytes_allocated() * components;
    ensure_whatever!(
        decoded.len() == frame_length,
        "JPEG output length {} does not match the frame length {}",
        decoded.len(),
        frame_length
    );

    if patch_colorspace {
        // patching normally happens at the host level, but only the JPEG
        // header knows the source colour model
        ctx.set_photometric_interpretation(PhotometricInterpretation::Rgb);
        ctx.set_planar_configuration(PlanarConfiguration::Interleaved);
    }

    ctx.decoded_buffer = decoded;
    Ok(())
}

/// Encode the raw samples in the decoded buffer as a baseline JPEG.
///
/// Lossy encoding is only defined for 8-bit stored samples; the lossless
/// process would need an SOF3 capable engine and is reported as
/// [`NotImplemented`](crate::EncodeError::NotImplemented).
pub fn encode_jpeg(ctx: &mut CodecContext, params: &EncoderParameters) -> EncodeResult<()> {
    tracing::trace!(context = %ctx, params = %params, "encode_jpeg");
    let result = encode_frame(ctx, params);
    if let Err(e) = &result {
        ctx.report_failure(&e.to_string());
    }
    result
}

fn encode_frame(ctx: &mut CodecContext, params: &EncoderParameters) -> EncodeResult<()> {
    let precision = ctx.bits_stored();
    if params.lossy && precision != 8 {
        return encode_error::UnsupportedBitDepthSnafu { precision }.fail();
    }
    if !params.lossy {
        return encode_error::NotImplementedSnafu.fail();
    }

    let columns = ctx.columns();
    let rows = ctx.rows();
    let samples_per_pixel = ctx.samples_per_pixel();

    let color_type = match samples_per_pixel {
        1 => ColorType::Luma,
        3 => ColorType::Rgb,
        other => whatever!("Unsupported samples per pixel: {}", other),
    };

    let row_stride = columns as usize
        * usize::from(samples_per_pixel)
        * if precision <= 8 {
            1
        } else {
            ctx.bytes_allocated()
        };
    let frame_length = row_stride * rows as usize;
    ensure!(
        ctx.decoded_buffer.len() >= frame_length,
        encode_error::InputOverflowSnafu
    );
    let frame_data = &ctx.decoded_buffer[..frame_length];

    let mut output = Vec::new();
    let mut encoder = Encoder::new(&mut output, params.quality.clamp(1, 100));
    encoder.set_progressive(false);
    match params.sample_factor {
        SampleFactor::Sf444 => encoder.set_sampling_factor(SamplingFactor::F_1_1),
        SampleFactor::Sf422 => encoder.set_sampling_factor(SamplingFactor::F_2_1),
        SampleFactor::Unknown => {}
    }

    encoder
        .encode(frame_data, columns as u16, rows as u16, color_type)
        .map_err(|e| Box::new(e) as Box<_>)
        .whatever_context("JPEG encoding failed")?;

    ctx.encoded_buffer = output;
    Ok(())
}
