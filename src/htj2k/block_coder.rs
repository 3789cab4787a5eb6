//! Block codec capability surface.
//!
//! The surrounding pipeline abstracts over block entropy coders and picks
//! a variant when a block is constructed. Two variants exist here: the HT
//! cleanup-pass codec and the raw passthrough. The HT decoder also accepts
//! raw segments, so a passthrough-encoded block decodes under either
//! variant.

use crate::error::HtError;
use crate::htj2k::decoder::HtBlockDecoder;
use crate::htj2k::encoder::{validate_dimensions, HtBlockEncoder};
use crate::htj2k::segment::{self, ParsedSegment};

/// The two per-block operations the pipeline needs.
pub trait BlockCodec {
    fn encode(&self, coeffs: &[i32]) -> Result<Vec<u8>, HtError>;
    fn decode(&self, seg: &[u8]) -> Result<Vec<i32>, HtError>;
}

/// Selects a block codec variant at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCodecKind {
    HighThroughput,
    RawPassthrough,
}

pub fn new_block_codec(
    kind: BlockCodecKind,
    width: usize,
    height: usize,
) -> Result<Box<dyn BlockCodec>, HtError> {
    match kind {
        BlockCodecKind::HighThroughput => Ok(Box::new(HtCodec::new(width, height)?)),
        BlockCodecKind::RawPassthrough => Ok(Box::new(RawCodec::new(width, height)?)),
    }
}

/// The HT cleanup-pass codec.
pub struct HtCodec {
    encoder: HtBlockEncoder,
    decoder: HtBlockDecoder,
}

impl HtCodec {
    pub fn new(width: usize, height: usize) -> Result<Self, HtError> {
        Ok(Self {
            encoder: HtBlockEncoder::new(width, height)?,
            decoder: HtBlockDecoder::new(width, height)?,
        })
    }
}

impl BlockCodec for HtCodec {
    fn encode(&self, coeffs: &[i32]) -> Result<Vec<u8>, HtError> {
        self.encoder.encode(coeffs)
    }

    fn decode(&self, seg: &[u8]) -> Result<Vec<i32>, HtError> {
        self.decoder.decode(seg)
    }
}

/// Raw passthrough: coefficients stored as little-endian i32, `Scup = 0`.
pub struct RawCodec {
    width: usize,
    height: usize,
}

impl RawCodec {
    pub fn new(width: usize, height: usize) -> Result<Self, HtError> {
        validate_dimensions(width, height, 2)?;
        Ok(Self { width, height })
    }
}

impl BlockCodec for RawCodec {
    fn encode(&self, coeffs: &[i32]) -> Result<Vec<u8>, HtError> {
        if coeffs.len() != self.width * self.height {
            return Err(HtError::InvalidConfiguration {
                reason: "coefficient count does not match block dimensions",
            });
        }
        Ok(segment::assemble_raw(coeffs))
    }

    fn decode(&self, seg: &[u8]) -> Result<Vec<i32>, HtError> {
        match segment::parse(seg)? {
            ParsedSegment::Raw(data) => {
                if data.len() != self.width * self.height * 4 {
                    return Err(HtError::InvalidSegmentStructure {
                        offset: data.len(),
                        reason: "raw payload does not match block dimensions",
                    });
                }
                Ok(data
                    .chunks_exact(4)
                    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect())
            }
            ParsedSegment::Coded { .. } => Err(HtError::InvalidSegmentStructure {
                offset: 0,
                reason: "raw passthrough codec received a coded segment",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_round_trip_through_the_trait() {
        let coeffs: Vec<i32> = (0..16).map(|i| i - 8).collect();
        for kind in [BlockCodecKind::HighThroughput, BlockCodecKind::RawPassthrough] {
            let codec = new_block_codec(kind, 4, 4).unwrap();
            let seg = codec.encode(&coeffs).unwrap();
            assert_eq!(codec.decode(&seg).unwrap(), coeffs);
        }
    }

    #[test]
    fn ht_decoder_accepts_raw_segments() {
        let coeffs: Vec<i32> = (0..16).map(|i| 1 - i * i).collect();
        let raw = new_block_codec(BlockCodecKind::RawPassthrough, 4, 4).unwrap();
        let ht = new_block_codec(BlockCodecKind::HighThroughput, 4, 4).unwrap();
        let seg = raw.encode(&coeffs).unwrap();
        assert_eq!(ht.decode(&seg).unwrap(), coeffs);
    }

    #[test]
    fn raw_decoder_rejects_coded_segments() {
        let ht = new_block_codec(BlockCodecKind::HighThroughput, 4, 4).unwrap();
        let raw = new_block_codec(BlockCodecKind::RawPassthrough, 4, 4).unwrap();
        let seg = ht.encode(&[3; 16]).unwrap();
        assert!(matches!(
            raw.decode(&seg),
            Err(HtError::InvalidSegmentStructure { .. })
        ));
    }
}
