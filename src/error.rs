//! Error types shared by all codec entry points.
//!
//! Users of these types are free to handle errors based on their variant,
//! but should not make decisions based on the display message,
//! since that is not considered part of the API
//! and may change on any new release.
//!
//! Third-party codec failures are wrapped in the `Custom` variant of the
//! respective error, carrying the library's diagnostic string. The
//! [`whatever!`](snafu::whatever) macro can be used to create errors of
//! this kind.

use snafu::Snafu;

/// The possible error conditions when decoding a pixel data frame.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)), module)]
pub enum DecodeError {
    /// A failure reported by an underlying codec library,
    /// wrapped with its diagnostic message.
    #[snafu(whatever, display("Error decoding pixel data: {}", message))]
    Custom {
        /// The error message.
        message: String,
        /// The underlying error cause, if any.
        #[snafu(source(from(Box<dyn std::error::Error + Send + 'static>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + 'static>>,
    },

    /// An RLE segment index at or above the declared segment count
    #[snafu(display("RLE segment number out of range ({})", segment))]
    SegmentOutOfRange { segment: u32 },

    /// An RLE run needs more input bytes than its segment holds
    #[snafu(display("RLE run exceeds input segment length"))]
    InputOverflow,

    /// An RLE run would write past the end of the frame buffer
    #[snafu(display("RLE run exceeds output buffer length"))]
    OutputOverflow,

    /// No start-of-frame marker was found and the context declares
    /// no stored bit depth to fall back to
    #[snafu(display("could not determine JPEG sample precision"))]
    BitDepthUnknown,

    /// The JPEG sample precision has no decoder subvariant
    #[snafu(display("unsupported JPEG sample precision ({})", precision))]
    UnsupportedBitDepth { precision: u16 },

    /// Colorspace conversion was requested for signed samples
    #[snafu(display(
        "JPEG codec unable to perform colorspace conversion on signed pixel data"
    ))]
    SignedColorConvertUnsupported,

    /// Could not set up the JPEG 2000 stream or codec
    #[snafu(display("failed to create JPEG 2000 stream"))]
    StreamCreateFailed,

    /// Could not read the JPEG 2000 main header
    #[snafu(display("failed to read JPEG 2000 header"))]
    HeaderReadFailed,

    /// The JPEG 2000 code stream did not decode
    #[snafu(display("failed to decode JPEG 2000 code stream"))]
    DecodeFailed,
}

/// The possible error conditions when encoding a pixel data frame.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)), module)]
pub enum EncodeError {
    /// A failure reported by an underlying codec library,
    /// wrapped with its diagnostic message.
    #[snafu(whatever, display("Error encoding pixel data: {}", message))]
    Custom {
        /// The error message.
        message: String,
        /// The underlying error cause, if any.
        #[snafu(source(from(Box<dyn std::error::Error + Send + 'static>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + 'static>>,
    },

    /// The encoder read position left the frame buffer
    #[snafu(display("read position is past end of frame buffer"))]
    InputOverflow,

    /// The declared bit depth has no encoder subvariant
    #[snafu(display("unsupported JPEG sample precision ({})", precision))]
    UnsupportedBitDepth { precision: u16 },

    /// Encoding is not implemented for this configuration
    #[snafu(display("encoding is not implemented for this configuration"))]
    NotImplemented,

    /// Could not set up the JPEG 2000 stream or codec
    #[snafu(display("failed to create JPEG 2000 stream"))]
    StreamCreateFailed,

    /// The JPEG 2000 encoder rejected the frame
    #[snafu(display("failed to encode JPEG 2000 code stream"))]
    EncodeFailed,
}

/// The possible error conditions of the planar configuration transform.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)), module)]
pub enum TransformError {
    /// The transform is only defined for single-byte samples
    #[snafu(display("unsupported bits allocated ({})", bits_allocated))]
    UnsupportedBitsAllocated { bits_allocated: u16 },
}

/// The result of decoding a pixel data frame
pub type DecodeResult<T, E = DecodeError> = Result<T, E>;

/// The result of encoding a pixel data frame
pub type EncodeResult<T, E = EncodeError> = Result<T, E>;

/// The result of a pixel layout transform
pub type TransformResult<T, E = TransformError> = Result<T, E>;
