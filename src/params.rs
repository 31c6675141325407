//! Decoder and encoder parameter blocks.
//!
//! Both blocks are plain value types. A default-constructed block is a
//! valid input for every codec entry point; individual fields only apply
//! to the formats noted in their documentation.

use std::fmt;

/// Options consumed by the decoder entry points.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct DecoderParameters {
    /// Convert YCbCr or RGB JPEG output to interleaved RGB,
    /// patching the context's photometric interpretation accordingly.
    /// Only the JPEG decoder honors this flag.
    pub convert_colorspace_to_rgb: bool,
}

impl DecoderParameters {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Display for DecoderParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConvertColorspaceToRgb: {}",
            self.convert_colorspace_to_rgb
        )
    }
}

/// Chroma sampling factor for lossy JPEG encoding.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SampleFactor {
    /// No chroma subsampling (1:1)
    #[default]
    Sf444,
    /// Halved horizontal chroma resolution (2:1)
    Sf422,
    /// Leave the choice to the encoder
    Unknown,
}

/// JPEG 2000 progression order.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProgressionOrder {
    #[default]
    Lrcp = 0,
    Rlcp,
    Rpcl,
    Pcrl,
    Cprl,
}

impl ProgressionOrder {
    /// The marker-segment name of this progression order.
    pub fn name(self) -> &'static str {
        PROGRESSION_ORDER_NAMES[self as usize]
    }
}

pub(crate) const PROGRESSION_ORDER_NAMES: [&str; 5] = ["LRCP", "RLCP", "RPCL", "PCRL", "CPRL"];

impl fmt::Display for ProgressionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options consumed by the encoder entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct EncoderParameters {
    /// Request lossy compression where the format supports it.
    pub lossy: bool,
    /// JPEG quality, 1–100.
    pub quality: u8,
    /// JPEG smoothing factor, 0–100.
    pub smoothing_factor: u8,
    /// JPEG chroma sampling factor.
    pub sample_factor: SampleFactor,
    /// Lossless JPEG predictor selection, 1–7.
    pub predictor: u8,
    /// Lossless JPEG point transform, 0–15.
    pub point_transform: u8,
    /// JPEG-LS near-lossless tolerance; ignored for lossless encoding.
    pub allowed_lossy_error: u32,
    /// JPEG 2000 and HT-JPEG 2000 progression order.
    pub progression_order: ProgressionOrder,
    /// JPEG 2000 compression ratio for the lossy quality layer.
    pub rate: u32,
    /// Allow the JPEG 2000 multi-component transform for RGB frames.
    pub allow_mct: bool,
}

impl EncoderParameters {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for EncoderParameters {
    fn default() -> Self {
        EncoderParameters {
            lossy: false,
            quality: 90,
            smoothing_factor: 0,
            sample_factor: SampleFactor::Sf444,
            predictor: 1,
            point_transform: 0,
            allowed_lossy_error: 3,
            progression_order: ProgressionOrder::Lrcp,
            rate: 20,
            allow_mct: true,
        }
    }
}

impl fmt::Display for EncoderParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lossy: {}, Quality [JPEG]: {}, SmoothingFactor [JPEG]: {}, \
             SampleFactor [JPEG]: {:?}, Predictor [JPEG]: {}, \
             PointTransform [JPEG]: {}, AllowedLossyError [JPEG-LS]: {}, \
             ProgressionOrder [JPEG 2000 / HT-JPEG 2000]: {}, \
             Rate [JPEG 2000]: {}, AllowMct [JPEG 2000]: {}",
            self.lossy,
            self.quality,
            self.smoothing_factor,
            self.sample_factor,
            self.predictor,
            self.point_transform,
            self.allowed_lossy_error,
            self.progression_order,
            self.rate,
            self.allow_mct,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progression_order_names() {
        assert_eq!(ProgressionOrder::Lrcp.name(), "LRCP");
        assert_eq!(ProgressionOrder::Rlcp.name(), "RLCP");
        assert_eq!(ProgressionOrder::Rpcl.name(), "RPCL");
        assert_eq!(ProgressionOrder::Pcrl.name(), "PCRL");
        assert_eq!(ProgressionOrder::Cprl.name(), "CPRL");
    }

    #[test]
    fn encoder_defaults_are_lossless() {
        let params = EncoderParameters::new();
        assert!(!params.lossy);
        assert_eq!(params.quality, 90);
        assert_eq!(params.sample_factor, SampleFactor::Sf444);
        assert_eq!(params.progression_order, ProgressionOrder::Lrcp);
    }
}
