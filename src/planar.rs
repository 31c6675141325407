//! Planar configuration transform for raw sample buffers.

use snafu::ensure;

use crate::context::PlanarConfiguration;
use crate::error::{transform_error, TransformResult};

/// Transpose a raw sample buffer in place between the interleaved and
/// planar layouts, whichever `old_planar_configuration` is not.
///
/// Only single-byte samples are supported; any other bit depth fails
/// with [`UnsupportedBitsAllocated`](crate::TransformError).
pub fn change_planar_configuration(
    pixel_data: &mut [u8],
    bits_allocated: u16,
    samples_per_pixel: u16,
    old_planar_configuration: PlanarConfiguration,
) -> TransformResult<()> {
    ensure!(
        bits_allocated == 8,
        transform_error::UnsupportedBitsAllocatedSnafu { bits_allocated }
    );

    let samples_per_pixel = usize::from(samples_per_pixel);
    let num_values = pixel_data.len();
    let num_pixels = num_values / samples_per_pixel;

    let mut buffer = vec![0u8; num_values];
    if old_planar_configuration == PlanarConfiguration::Planar {
        for n in 0..num_pixels {
            for s in 0..samples_per_pixel {
                buffer[n * samples_per_pixel + s] = pixel_data[n + num_pixels * s];
            }
        }
    } else {
        for n in 0..num_pixels {
            for s in 0..samples_per_pixel {
                buffer[n + num_pixels * s] = pixel_data[n * samples_per_pixel + s];
            }
        }
    }
    pixel_data.copy_from_slice(&buffer);

    Ok(())
}
