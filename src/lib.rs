//! Single-frame pixel data codecs for the DICOM transfer syntax family.
//!
//! This crate encodes and decodes one image frame at a time between a
//! raw sample layout and one of five compressed bitstreams:
//! RLE Lossless, JPEG (baseline, extended and lossless processes),
//! JPEG-LS, JPEG 2000 and high-throughput JPEG 2000.
//!
//! All work goes through a [`CodecContext`]: the host fills in the image
//! descriptors and the source buffer, calls one codec entry point with a
//! parameter block, and reads the destination buffer back. The RLE codec
//! and the pixel layout transform are implemented natively; the other
//! formats are marshalled to their reference implementations (see the
//! [`adapters`] module).
//!
//! # Example
//!
//! ```
//! use dicom_pixel_codecs::{
//!     decode_rle, encode_rle, CodecContext, DecoderParameters, EncoderParameters,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut ctx = CodecContext::new();
//! ctx.set_columns(16);
//! ctx.set_rows(16);
//! ctx.set_bits_allocated(8);
//! ctx.set_bits_stored(8);
//! ctx.set_samples_per_pixel(1);
//!
//! let frame: Vec<u8> = (0..=255).collect();
//! ctx.set_decoded_buffer(&frame);
//! encode_rle(&mut ctx, &EncoderParameters::new())?;
//!
//! decode_rle(&mut ctx, &DecoderParameters::new())?;
//! assert_eq!(ctx.decoded_buffer(), &frame[..]);
//! # Ok(())
//! # }
//! ```
//!
//! A failing codec call leaves the context's numeric fields unchanged,
//! but the destination buffer may have been resized and partially
//! written; the caller must discard it. Failure messages are also
//! delivered to the context's event sink, if one is installed, before
//! the typed error propagates.

pub mod adapters;
pub mod context;
pub mod error;
pub mod params;
pub mod planar;
pub mod rle;

pub use adapters::htj2k::{decode_htj2k, encode_htj2k};
pub use adapters::jpeg::{decode_jpeg, encode_jpeg};
pub use adapters::jpeg2k::{decode_jpeg2000, encode_jpeg2000};
pub use adapters::jpegls::{decode_jpegls, encode_jpegls};
pub use context::{
    CodecContext, EventSink, PhotometricInterpretation, PixelRepresentation, PlanarConfiguration,
};
pub use error::{
    DecodeError, DecodeResult, EncodeError, EncodeResult, TransformError, TransformResult,
};
pub use params::{DecoderParameters, EncoderParameters, ProgressionOrder, SampleFactor};
pub use planar::change_planar_configuration;
pub use rle::{decode_rle, encode_rle};
