//! Validated encoder configuration.
//!
//! The block codec itself only needs the code-block shape; the remaining
//! options parameterize the surrounding pipeline (DWT depth, progression
//! order, lossy quality) and are validated here so misconfiguration
//! surfaces before any block is touched.

use log::debug;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::HtError;

/// Packet progression orders of the surrounding codestream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ProgressionOrder {
    #[default]
    LayerResolutionComponentPosition = 0,
    ResolutionLayerComponentPosition = 1,
    ResolutionPositionComponentLayer = 2,
    PositionComponentResolutionLayer = 3,
    ComponentPositionResolutionLayer = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtCodingParameters {
    /// Lossy quality hint in 1..=100; ignored in lossless mode.
    pub quality: u8,
    /// Code-block width, a power of two in [4, 1024].
    pub block_width: u32,
    /// Code-block height, a power of two in [4, 1024].
    pub block_height: u32,
    /// DWT decomposition levels consumed by the pipeline, 0..=6.
    pub num_levels: u8,
    /// Selects the reversible path.
    pub lossless: bool,
    pub progression: ProgressionOrder,
}

impl Default for HtCodingParameters {
    fn default() -> Self {
        Self {
            quality: 90,
            block_width: 64,
            block_height: 64,
            num_levels: 5,
            lossless: true,
            progression: ProgressionOrder::default(),
        }
    }
}

impl HtCodingParameters {
    /// Validates the parameter set, returning an adjusted copy.
    ///
    /// Hard errors are out-of-domain values; the quality hint is merely
    /// normalized when lossless mode makes it irrelevant.
    pub fn validate(&self) -> Result<HtCodingParameters, HtError> {
        let block_legal =
            |d: u32| d.is_power_of_two() && (4..=1024).contains(&d);
        if !block_legal(self.block_width) || !block_legal(self.block_height) {
            return Err(HtError::InvalidBlockSize {
                width: self.block_width,
                height: self.block_height,
                min: 4,
            });
        }
        if self.quality == 0 || self.quality > 100 {
            return Err(HtError::InvalidConfiguration {
                reason: "quality must be in 1..=100",
            });
        }
        if self.num_levels > 6 {
            return Err(HtError::InvalidConfiguration {
                reason: "decomposition levels must be in 0..=6",
            });
        }

        let mut adjusted = *self;
        if self.lossless && self.quality != 100 {
            debug!("lossless mode ignores quality {}, normalizing to 100", self.quality);
            adjusted.quality = 100;
        }
        Ok(adjusted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let p = HtCodingParameters::default().validate().unwrap();
        assert_eq!(p.quality, 100); // lossless normalization
        assert_eq!(p.block_width, 64);
    }

    #[test]
    fn block_shape_domain() {
        let mut p = HtCodingParameters::default();
        p.block_width = 2; // legal for the raw codec, not for the pipeline
        assert!(matches!(
            p.validate(),
            Err(HtError::InvalidBlockSize { min: 4, .. })
        ));
        p.block_width = 96;
        assert!(p.validate().is_err());
        p.block_width = 1024;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn quality_and_levels_domains() {
        let mut p = HtCodingParameters {
            lossless: false,
            ..Default::default()
        };
        p.quality = 0;
        assert!(p.validate().is_err());
        p.quality = 101;
        assert!(p.validate().is_err());
        p.quality = 55;
        assert_eq!(p.validate().unwrap().quality, 55);

        p.num_levels = 7;
        assert!(p.validate().is_err());
    }

    #[test]
    fn progression_order_from_wire_value() {
        assert_eq!(
            ProgressionOrder::try_from(2u8).unwrap(),
            ProgressionOrder::ResolutionPositionComponentLayer
        );
        assert!(ProgressionOrder::try_from(5u8).is_err());
        assert_eq!(u8::from(ProgressionOrder::ComponentPositionResolutionLayer), 4);
    }
}
