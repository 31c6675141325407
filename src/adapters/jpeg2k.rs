//! JPEG 2000 Part 1 (ISO/IEC 15444-1) adaptor over OpenJPEG.
//!
//! The OpenJPEG stream callbacks are modelled as method calls on a
//! cursor value borrowed from the context buffer; the cursor strictly
//! outlives the stream it is registered with. Codec, stream and image
//! handles are wrapped in guards so that every exit path releases them.

use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::ptr;
use std::slice;

use openjpeg_sys as opj;
use snafu::prelude::*;

use crate::context::{CodecContext, PhotometricInterpretation, PixelRepresentation};
use crate::error::{decode_error, encode_error, DecodeResult, EncodeResult};
use crate::params::{DecoderParameters, EncoderParameters, ProgressionOrder};

const JP2_RFC3745_MAGIC: &[u8] = b"\x00\x00\x00\x0cjP  \r\n\x87\n";
const JP2_MAGIC: &[u8] = b"\r\n\x87\n";
const J2K_CODESTREAM_MAGIC: &[u8] = b"\xff\x4f\xff\x51";

/// Stream chunk size used for OpenJPEG stream buffers.
const J2K_STREAM_CHUNK_SIZE: usize = 0x10_0000;

/// Code stream flavour identified from the first bytes of a payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum CodestreamFormat {
    /// Boxed JP2 file format
    Jp2,
    /// Raw JPEG 2000 code stream
    J2k,
    Unknown,
}

/// Sniff the payload's magic number.
pub(crate) fn detect_codestream_format(data: &[u8]) -> CodestreamFormat {
    if data.len() >= 12 && &data[..12] == JP2_RFC3745_MAGIC {
        CodestreamFormat::Jp2
    } else if data.len() >= 4 && &data[..4] == JP2_MAGIC {
        CodestreamFormat::Jp2
    } else if data.len() >= 4 && &data[..4] == J2K_CODESTREAM_MAGIC {
        CodestreamFormat::J2k
    } else {
        CodestreamFormat::Unknown
    }
}

/// Read-only cursor over an encoded payload, lent to the OpenJPEG
/// read stream.
struct ReadCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

/// Growable sink for the OpenJPEG write stream.
struct WriteCursor {
    data: Vec<u8>,
    offset: usize,
}

unsafe extern "C" fn read_from_cursor(
    p_buffer: *mut c_void,
    nb_bytes: usize,
    p_user_data: *mut c_void,
) -> usize {
    let cursor = &mut *(p_user_data as *mut ReadCursor);
    if p_buffer.is_null() || cursor.offset >= cursor.data.len() {
        return usize::MAX;
    }
    let n = nb_bytes.min(cursor.data.len() - cursor.offset);
    ptr::copy_nonoverlapping(
        cursor.data.as_ptr().add(cursor.offset),
        p_buffer as *mut u8,
        n,
    );
    cursor.offset += n;
    n
}

unsafe extern "C" fn skip_read_cursor(nb_bytes: i64, p_user_data: *mut c_void) -> i64 {
    let cursor = &mut *(p_user_data as *mut ReadCursor);
    if nb_bytes < 0 {
        return -1;
    }
    let new_offset = cursor.offset.saturating_add(nb_bytes as usize);
    if new_offset > cursor.data.len() {
        let skipped = cursor.data.len() - cursor.offset;
        cursor.offset = cursor.data.len();
        skipped as i64
    } else {
        cursor.offset = new_offset;
        nb_bytes
    }
}

unsafe extern "C" fn seek_read_cursor(nb_bytes: i64, p_user_data: *mut c_void) -> i32 {
    let cursor = &mut *(p_user_data as *mut ReadCursor);
    if nb_bytes < 0 {
        return 0;
    }
    cursor.offset = (nb_bytes as usize).min(cursor.data.len());
    1
}

unsafe extern "C" fn write_to_cursor(
    p_buffer: *mut c_void,
    nb_bytes: usize,
    p_user_data: *mut c_void,
) -> usize {
    let cursor = &mut *(p_user_data as *mut WriteCursor);
    if p_buffer.is_null() {
        return usize::MAX;
    }
    let end = cursor.offset + nb_bytes;
    if cursor.data.len() < end {
        cursor.data.resize(end, 0);
    }
    ptr::copy_nonoverlapping(
        p_buffer as *const u8,
        cursor.data.as_mut_ptr().add(cursor.offset),
        nb_bytes,
    );
    cursor.offset = end;
    nb_bytes
}

unsafe extern "C" fn skip_write_cursor(nb_bytes: i64, p_user_data: *mut c_void) -> i64 {
    let cursor = &mut *(p_user_data as *mut WriteCursor);
    if nb_bytes < 0 {
        return -1;
    }
    cursor.offset += nb_bytes as usize;
    if cursor.data.len() < cursor.offset {
        cursor.data.resize(cursor.offset, 0);
    }
    nb_bytes
}

unsafe extern "C" fn seek_write_cursor(nb_bytes: i64, p_user_data: *mut c_void) -> i32 {
    let cursor = &mut *(p_user_data as *mut WriteCursor);
    if nb_bytes < 0 {
        return 0;
    }
    cursor.offset = nb_bytes as usize;
    if cursor.data.len() < cursor.offset {
        cursor.data.resize(cursor.offset, 0);
    }
    1
}

unsafe extern "C" fn info_callback(msg: *const c_char, _client_data: *mut c_void) {
    if !msg.is_null() {
        if let Ok(text) = CStr::from_ptr(msg).to_str() {
            tracing::debug!("OpenJPEG: {}", text.trim_end());
        }
    }
}

unsafe extern "C" fn warning_callback(msg: *const c_char, _client_data: *mut c_void) {
    if !msg.is_null() {
        if let Ok(text) = CStr::from_ptr(msg).to_str() {
            tracing::warn!("OpenJPEG: {}", text.trim_end());
        }
    }
}

unsafe extern "C" fn error_callback(msg: *const c_char, _client_data: *mut c_void) {
    if !msg.is_null() {
        if let Ok(text) = CStr::from_ptr(msg).to_str() {
            tracing::error!("OpenJPEG: {}", text.trim_end());
        }
    }
}

struct StreamGuard(*mut opj::opj_stream_t);

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { opj::opj_stream_destroy(self.0) }
        }
    }
}

struct CodecGuard(*mut opj::opj_codec_t);

impl Drop for CodecGuard {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { opj::opj_destroy_codec(self.0) }
        }
    }
}

pub(super) struct ImageGuard(pub(super) *mut opj::opj_image_t);

impl ImageGuard {
    pub fn image(&self) -> &opj::opj_image_t {
        unsafe { &*self.0 }
    }

    pub fn components(&self) -> &[opj::opj_image_comp_t] {
        let image = self.image();
        unsafe { slice::from_raw_parts(image.comps, image.numcomps as usize) }
    }

    pub(super) fn as_ptr(&self) -> *mut opj::opj_image_t {
        self.0
    }
}

impl Drop for ImageGuard {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { opj::opj_image_destroy(self.0) }
        }
    }
}

unsafe fn install_handlers(codec: *mut opj::opj_codec_t) {
    opj::opj_set_info_handler(codec, Some(info_callback), ptr::null_mut());
    opj::opj_set_warning_handler(codec, Some(warning_callback), ptr::null_mut());
    opj::opj_set_error_handler(codec, Some(error_callback), ptr::null_mut());
}

unsafe fn create_read_stream(cursor: *mut ReadCursor, length: usize) -> *mut opj::opj_stream_t {
    let stream = opj::opj_stream_create(J2K_STREAM_CHUNK_SIZE, 1);
    if stream.is_null() {
        return stream;
    }
    opj::opj_stream_set_user_data(stream, cursor as *mut c_void, None);
    opj::opj_stream_set_user_data_length(stream, length as u64);
    opj::opj_stream_set_read_function(stream, Some(read_from_cursor));
    opj::opj_stream_set_skip_function(stream, Some(skip_read_cursor));
    opj::opj_stream_set_seek_function(stream, Some(seek_read_cursor));
    stream
}

unsafe fn create_write_stream(cursor: *mut WriteCursor) -> *mut opj::opj_stream_t {
    let stream = opj::opj_stream_create(J2K_STREAM_CHUNK_SIZE, 0);
    if stream.is_null() {
        return stream;
    }
    opj::opj_stream_set_user_data(stream, cursor as *mut c_void, None);
    opj::opj_stream_set_write_function(stream, Some(write_to_cursor));
    opj::opj_stream_set_skip_function(stream, Some(skip_write_cursor));
    opj::opj_stream_set_seek_function(stream, Some(seek_write_cursor));
    stream
}

/// Decode a complete code stream into an OpenJPEG image.
///
/// Unknown magic prefixes are read as raw code streams, which is what
/// encapsulated pixel data payloads carry.
pub(super) fn read_codestream(data: &[u8]) -> DecodeResult<ImageGuard> {
    let codec_format = match detect_codestream_format(data) {
        CodestreamFormat::Jp2 => opj::CODEC_FORMAT::OPJ_CODEC_JP2,
        CodestreamFormat::J2k | CodestreamFormat::Unknown => opj::CODEC_FORMAT::OPJ_CODEC_J2K,
    };

    let mut cursor = ReadCursor { data, offset: 0 };

    unsafe {
        let stream = StreamGuard(create_read_stream(&mut cursor, data.len()));
        ensure!(!stream.0.is_null(), decode_error::StreamCreateFailedSnafu);

        let codec = CodecGuard(opj::opj_create_decompress(codec_format));
        ensure!(!codec.0.is_null(), decode_error::StreamCreateFailedSnafu);
        install_handlers(codec.0);

        let mut parameters: opj::opj_dparameters_t = std::mem::zeroed();
        opj::opj_set_default_decoder_parameters(&mut parameters);
        ensure!(
            opj::opj_setup_decoder(codec.0, &mut parameters) != 0,
            decode_error::StreamCreateFailedSnafu
        );

        let mut image: *mut opj::opj_image_t = ptr::null_mut();
        let header_ok = opj::opj_read_header(stream.0, codec.0, &mut image) != 0;
        let image = ImageGuard(image);
        ensure!(header_ok, decode_error::HeaderReadFailedSnafu);

        ensure!(
            opj::opj_decode(codec.0, stream.0, image.as_ptr()) != 0
                && opj::opj_end_decompress(codec.0, stream.0) != 0,
            decode_error::DecodeFailedSnafu
        );

        Ok(image)
    }
}

/// Compress a filled OpenJPEG image with the given coding parameters,
/// returning the code stream bytes.
pub(super) fn compress(
    parameters: &mut opj::opj_cparameters_t,
    image: &ImageGuard,
) -> EncodeResult<Vec<u8>> {
    unsafe {
        let codec = CodecGuard(opj::opj_create_compress(opj::CODEC_FORMAT::OPJ_CODEC_J2K));
        ensure!(!codec.0.is_null(), encode_error::StreamCreateFailedSnafu);
        install_handlers(codec.0);

        ensure!(
            opj::opj_setup_encoder(codec.0, parameters, image.as_ptr()) != 0,
            encode_error::EncodeFailedSnafu
        );

        let mut cursor = WriteCursor {
            data: Vec::with_capacity(J2K_STREAM_CHUNK_SIZE),
            offset: 0,
        };
        let stream = StreamGuard(create_write_stream(&mut cursor));
        ensure!(!stream.0.is_null(), encode_error::StreamCreateFailedSnafu);

        ensure!(
            opj::opj_start_compress(codec.0, image.as_ptr(), stream.0) != 0
                && opj::opj_encode(codec.0, stream.0) != 0
                && opj::opj_end_compress(codec.0, stream.0) != 0,
            encode_error::EncodeFailedSnafu
        );

        drop(stream);
        Ok(cursor.data)
    }
}

pub(super) fn progression_order(order: ProgressionOrder) -> opj::PROG_ORDER {
    match order {
        ProgressionOrder::Lrcp => opj::PROG_ORDER::OPJ_LRCP,
        ProgressionOrder::Rlcp => opj::PROG_ORDER::OPJ_RLCP,
        ProgressionOrder::Rpcl => opj::PROG_ORDER::OPJ_RPCL,
        ProgressionOrder::Pcrl => opj::PROG_ORDER::OPJ_PCRL,
        ProgressionOrder::Cprl => opj::PROG_ORDER::OPJ_CPRL,
    }
}

/// Number of wavelet resolutions for a frame extent, following the
/// halve-while-non-zero rule, capped at 6.
pub(crate) fn resolution_count(columns: u32, rows: u32) -> u32 {
    let mut count = 0;
    let mut tw = columns >> 1;
    let mut th = rows >> 1;
    while tw != 0 && th != 0 {
        count += 1;
        tw >>= 1;
        th >>= 1;
    }
    count.min(6)
}

/// Decode the JPEG 2000 payload in the encoded buffer into raw samples.
pub fn decode_jpeg2000(ctx: &mut CodecContext, params: &DecoderParameters) -> DecodeResult<()> {
    tracing::trace!(context = %ctx, params = %params, "decode_jpeg2000");
    let result = decode_frame(ctx);
    if let Err(e) = &result {
        ctx.report_failure(&e.to_string());
    }
    result
}

fn decode_frame(ctx: &mut CodecContext) -> DecodeResult<()> {
    let image = read_codestream(&ctx.encoded_buffer)?;
    let components = image.components();
    ensure_whatever!(
        !components.is_empty(),
        "JPEG 2000 image carries no components"
    );

    let precision = components[0].prec;
    let depth = ((precision + 7) / 8) as usize;
    let num_pixels = ctx.pixel_count();
    ctx.resize_decoded_buffer(num_pixels * components.len() * depth);

    match components.len() {
        1 => {
            let component = &components[0];
            let samples = component_samples(component, num_pixels);
            if precision <= 8 {
                for (dst, &sample) in ctx.decoded_buffer.iter_mut().zip(samples) {
                    *dst = sample as u8;
                }
            } else {
                for (dst, &sample) in ctx.decoded_buffer.chunks_exact_mut(2).zip(samples) {
                    dst.copy_from_slice(&(sample as u16).to_le_bytes());
                }
            }
        }
        3 => {
            let r = component_samples(&components[0], num_pixels);
            let g = component_samples(&components[1], num_pixels);
            let b = component_samples(&components[2], num_pixels);
            let complete = r.len().min(g.len()).min(b.len());
            for (i, dst) in ctx
                .decoded_buffer
                .chunks_exact_mut(3)
                .take(complete)
                .enumerate()
            {
                dst[0] = r[i] as u8;
                dst[1] = g[i] as u8;
                dst[2] = b[i] as u8;
            }
        }
        n => whatever!("unsupported JPEG 2000 component count ({})", n),
    }

    Ok(())
}

/// View over a component's sample words, clipped to the frame size.
fn component_samples(component: &opj::opj_image_comp_t, num_pixels: usize) -> &[i32] {
    let available = (component.w as usize * component.h as usize).min(num_pixels);
    unsafe { slice::from_raw_parts(component.data, available) }
}

/// Encode the raw samples in the decoded buffer as a JPEG 2000 code
/// stream.
pub fn encode_jpeg2000(ctx: &mut CodecContext, params: &EncoderParameters) -> EncodeResult<()> {
    tracing::trace!(context = %ctx, params = %params, "encode_jpeg2000");
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
        ctx.bits_allocated() > 0,
        "bits allocated is 0, cannot derive the layer rate"
    );
    ensure_whatever!(
        (1..=3).contains(&samples_per_pixel),
        "unsupported samples per pixel ({})",
        samples_per_pixel
    );

    let mut parameters: opj::opj_cparameters_t = unsafe { std::mem::zeroed() };
    unsafe { opj::opj_set_default_encoder_parameters(&mut parameters) };

    parameters.irreversible = i32::from(params.lossy);
    parameters.prog_order = progression_order(params.progression_order);
    if ctx.photometric_interpretation() == PhotometricInterpretation::Rgb && params.allow_mct {
        parameters.tcp_mct = 1;
    }

    // one quality layer at the requested rate, scaled by the payload
    // fraction of the sample word; lossless appends a zero-rate layer
    parameters.tcp_numlayers = 1;
    parameters.tcp_rates[0] =
        (params.rate * u32::from(ctx.bits_stored()) / u32::from(ctx.bits_allocated())) as f32;
    if !params.lossy {
        parameters.tcp_rates[parameters.tcp_numlayers as usize] = 0.0;
        parameters.tcp_numlayers += 1;
    }
    parameters.cp_disto_alloc = 1;
    parameters.numresolution = resolution_count(columns, rows) as i32;

    let mut cmptparm = [unsafe { std::mem::zeroed::<opj::opj_image_cmptparm_t>() }; 3];
    for parm in cmptparm.iter_mut().take(samples_per_pixel) {
        parm.bpp = u32::from(ctx.bits_allocated());
        parm.prec = u32::from(ctx.bits_stored());
        parm.sgnd = u32::from(ctx.pixel_representation() == PixelRepresentation::Signed);
        parm.dx = parameters.subsampling_dx as u32;
        parm.dy = parameters.subsampling_dy as u32;
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
        raw.x0 = parameters.image_offset_x0 as u32;
        raw.y0 = parameters.image_offset_y0 as u32;
        raw.x1 = raw.x0 + (columns - 1) * parameters.subsampling_dx as u32 + 1;
        raw.y1 = raw.y0 + (rows - 1) * parameters.subsampling_dy as u32 + 1;
    }

    fill_components(ctx, &image)?;

    let encoded = compress(&mut parameters, &image)?;
    ctx.encoded_buffer = encoded;
    Ok(())
}

/// Pack the raw frame into the image's component planes, promoting each
/// sample to the 32-bit word OpenJPEG works on.
fn fill_components(ctx: &CodecContext, image: &ImageGuard) -> EncodeResult<()> {
    let num_pixels = ctx.pixel_count();
    let components = image.components();

    ensure!(
        ctx.decoded_buffer.len() >= ctx.frame_length(),
        encode_error::InputOverflowSnafu
    );
    let source = &ctx.decoded_buffer;

    match components.len() {
        1 => {
            let data =
                unsafe { slice::from_raw_parts_mut(components[0].data, num_pixels) };
            if components[0].prec <= 8 {
                for (dst, &byte) in data.iter_mut().zip(source) {
                    *dst = i32::from(byte);
                }
            } else if ctx.pixel_representation() == PixelRepresentation::Unsigned {
                for (dst, pair) in data.iter_mut().zip(source.chunks_exact(2)) {
                    *dst = i32::from(u16::from_le_bytes([pair[0], pair[1]]));
                }
            } else {
                for (dst, pair) in data.iter_mut().zip(source.chunks_exact(2)) {
                    *dst = i32::from(i16::from_le_bytes([pair[0], pair[1]]));
                }
            }
        }
        3 => {
            let (head, tail) = components.split_first().unwrap();
            let r = unsafe { slice::from_raw_parts_mut(head.data, num_pixels) };
            let g = unsafe { slice::from_raw_parts_mut(tail[0].data, num_pixels) };
            let b = unsafe { slice::from_raw_parts_mut(tail[1].data, num_pixels) };
            for (i, rgb) in source.chunks_exact(3).take(num_pixels).enumerate() {
                r[i] = i32::from(rgb[0]);
                g[i] = i32::from(rgb[1]);
                b[i] = i32::from(rgb[2]);
            }
        }
        n => whatever!("unsupported JPEG 2000 component count ({})", n),
    }

    Ok(())
}
