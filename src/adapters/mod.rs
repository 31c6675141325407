//! Adaptor modules for the delegated compressed formats.
//!
//! Each adaptor owns the marshalling contract for one format family:
//! which parameters the underlying library consumes, how the raw sample
//! plane is packed into its input, and how its output is copied back
//! into the context buffers.
//!
//! - [`jpeg`] covers the ISO/IEC 10918 family through [jpeg-decoder]
//!   (baseline, extended and lossless reading) and [jpeg-encoder]
//!   (baseline writing).
//! - [`jpegls`] covers JPEG-LS (ISO/IEC 14495-1) through the CharLS
//!   reference implementation.
//! - [`jpeg2k`] covers JPEG 2000 Part 1 (ISO/IEC 15444-1) through
//!   [OpenJPEG].
//! - [`htj2k`] covers high-throughput JPEG 2000 (ISO/IEC 15444-15),
//!   reading HT code streams through OpenJPEG 2.5.
//!
//! [jpeg-decoder]: https://crates.io/crates/jpeg-decoder
//! [jpeg-encoder]: https://crates.io/crates/jpeg-encoder
//! [OpenJPEG]: https://github.com/uclouvain/openjpeg

pub mod htj2k;
pub mod jpeg;
pub mod jpeg2k;
pub mod jpegls;
