//! HT cleanup-pass block decoder.
//!
//! Walks quads in the same raster pair order as the encoder, keeping the
//! significance and exponent maps in lockstep so context and predictor
//! values reproduce exactly. Raw passthrough segments (`Scup = 0`) skip
//! entropy decoding entirely.

use crate::error::HtError;
use crate::htj2k::bit_io::VlcBitReader;
use crate::htj2k::context::QuadState;
use crate::htj2k::encoder::validate_dimensions;
use crate::htj2k::exponent::{predict_k, U_Q_MAX};
use crate::htj2k::mag_sgn::MagSgnDecoder;
use crate::htj2k::mel::MelDecoder;
use crate::htj2k::quad::sample_index;
use crate::htj2k::segment::{self, ParsedSegment};
use crate::htj2k::uvlc;
use crate::htj2k::vlc;
use crate::htj2k::vlc_tables::{PackedEntry, TABLE_INITIAL, TABLE_NON_INITIAL};

pub struct HtBlockDecoder {
    width: usize,
    height: usize,
}

impl HtBlockDecoder {
    pub fn new(width: usize, height: usize) -> Result<Self, HtError> {
        validate_dimensions(width, height, 2)?;
        Ok(Self { width, height })
    }

    /// Decodes a segment into a freshly owned coefficient array.
    pub fn decode(&self, seg: &[u8]) -> Result<Vec<i32>, HtError> {
        match segment::parse(seg)? {
            ParsedSegment::Raw(data) => self.decode_raw(data),
            ParsedSegment::Coded { mag_sgn, mel, vlc } => self.decode_coded(mag_sgn, mel, vlc),
        }
    }

    fn decode_raw(&self, data: &[u8]) -> Result<Vec<i32>, HtError> {
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

    fn decode_coded(
        &self,
        mag_sgn: &[u8],
        mel_bytes: &[u8],
        vlc_bytes: &[u8],
    ) -> Result<Vec<i32>, HtError> {
        let qw = self.width.div_ceil(2);
        let qh = self.height.div_ceil(2);

        let mut coeffs = vec![0i32; self.width * self.height];
        let mut state = QuadState::new(qw, qh);
        let mut mel = MelDecoder::new(mel_bytes);
        let mut mag = MagSgnDecoder::new(mag_sgn);
        let mut vlc_r = VlcBitReader::new(vlc_bytes);

        for qy in 0..qh {
            let table = if qy == 0 { TABLE_INITIAL } else { TABLE_NON_INITIAL };
            let mut qx = 0;
            while qx < qw {
                let e0 = self.decode_quad_header(&mut state, &mut mel, &mut vlc_r, table, qx, qy)?;
                let e1 = if qx + 1 < qw {
                    self.decode_quad_header(&mut state, &mut mel, &mut vlc_r, table, qx + 1, qy)?
                } else {
                    None
                };

                let u_off0 = e0.is_some_and(|e| e.u_off() == 1);
                let u_off1 = e1.is_some_and(|e| e.u_off() == 1);
                let mel_event = if table == TABLE_INITIAL && u_off0 && u_off1 {
                    mel.decode()
                } else {
                    false
                };
                let (u0, u1) = uvlc::decode_pair(&mut vlc_r, table, u_off0, u_off1, mel_event)?;

                if let Some(e) = e0 {
                    self.finish_quad(&mut coeffs, &mut state, &mut mag, e, u0, qx, qy)?;
                }
                if let Some(e) = e1 {
                    self.finish_quad(&mut coeffs, &mut state, &mut mag, e, u1, qx + 1, qy)?;
                }
                qx += 2;
            }
        }
        Ok(coeffs)
    }

    /// Reads the MEL significance event and, for significant quads, the
    /// CxtVLC codeword. Insignificant quads settle their map state here.
    fn decode_quad_header(
        &self,
        state: &mut QuadState,
        mel: &mut MelDecoder<'_>,
        vlc_r: &mut VlcBitReader<'_>,
        table: usize,
        qx: usize,
        qy: usize,
    ) -> Result<Option<PackedEntry>, HtError> {
        if !mel.decode() {
            state.set(qx, qy, 0, 0);
            return Ok(None);
        }
        let context = state.vlc_context(qx, qy);
        let entry = vlc::decode_codeword(vlc_r, table, context, (qx as u32, qy as u32))?;
        // The east quad's context needs this rho before the pair's
        // residuals are in; E_max follows in finish_quad.
        state.set(qx, qy, entry.rho(), 0);
        Ok(Some(entry))
    }

    /// Reconstructs the samples of one significant quad from its decoded
    /// codeword and residual, then records rho and E_max for the quads
    /// that follow.
    #[allow(clippy::too_many_arguments)]
    fn finish_quad(
        &self,
        coeffs: &mut [i32],
        state: &mut QuadState,
        mag: &mut MagSgnDecoder<'_>,
        entry: PackedEntry,
        u: u32,
        qx: usize,
        qy: usize,
    ) -> Result<(), HtError> {
        let rho = entry.rho();
        let gamma = rho.count_ones() > 1;
        let k = predict_k(state, qx, qy, gamma);
        let u_q = k + u;
        if u_q > U_Q_MAX {
            return Err(HtError::ValueOutOfRange {
                what: "exponent bound U_q",
                value: u_q,
                max: U_Q_MAX,
                quad_x: qx as u32,
                quad_y: qy as u32,
            });
        }

        let mut e_max = 0u32;
        for n in 0..4 {
            if rho & (1 << n) == 0 {
                continue;
            }
            let m = u_q - ((entry.e_k() >> n) & 1) as u32;
            let implicit = entry.e_1() & (1 << n) != 0;
            let (magnitude, negative) = mag.get(m, implicit)?;
            if magnitude != 0 {
                e_max = e_max.max(32 - magnitude.leading_zeros());
            }
            if let Some(i) = sample_index(self.width, self.height, qx, qy, n as usize) {
                coeffs[i] = if negative {
                    (magnitude as i64).wrapping_neg() as i32
                } else {
                    magnitude as i32
                };
            }
        }
        state.set(qx, qy, rho, e_max);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::htj2k::encoder::HtBlockEncoder;

    #[test]
    fn raw_segment_decodes_without_entropy_state() {
        let coeffs: Vec<i32> = (0..16).map(|i| i * 3 - 20).collect();
        let seg = segment::assemble_raw(&coeffs);
        let dec = HtBlockDecoder::new(4, 4).unwrap();
        assert_eq!(dec.decode(&seg).unwrap(), coeffs);
    }

    #[test]
    fn raw_payload_length_is_checked() {
        let seg = segment::assemble_raw(&[1, 2, 3]);
        let dec = HtBlockDecoder::new(4, 4).unwrap();
        assert!(matches!(
            dec.decode(&seg),
            Err(HtError::InvalidSegmentStructure { .. })
        ));
    }

    #[test]
    fn truncated_coded_segment_fails() {
        let enc = HtBlockEncoder::new(4, 4).unwrap();
        let coeffs: Vec<i32> = (0..16).map(|i| (i * 37) % 256 - 128).collect();
        let seg = enc.encode(&coeffs).unwrap();
        // Keep only the trailer: Scup now exceeds the remaining payload.
        let truncated = seg[seg.len() - 4..].to_vec();
        let dec = HtBlockDecoder::new(4, 4).unwrap();
        assert!(dec.decode(&truncated).is_err());
    }

    #[test]
    fn oversized_residual_is_caught_by_the_bound_check() {
        // Hand-build a segment whose single quad claims a residual that
        // pushes U_q past the 32-bit magnitude limit.
        use crate::htj2k::bit_io::VlcBitWriter;
        use crate::htj2k::mel::MelEncoder;
        use crate::htj2k::{uvlc, vlc};

        let mut mel = MelEncoder::new();
        mel.encode(true);
        let mut w = VlcBitWriter::new();
        vlc::encode_codeword(&mut w, TABLE_INITIAL, 0, 0xF, 1, 0xF, (0, 0)).unwrap();
        uvlc::encode_pair(&mut w, TABLE_INITIAL, Some(40), None, false, (0, 0)).unwrap();
        let seg = segment::assemble(&[], &mel.finish(), &w.finish()).unwrap();

        let dec = HtBlockDecoder::new(2, 2).unwrap();
        assert!(matches!(
            dec.decode(&seg),
            Err(HtError::ValueOutOfRange { .. })
        ));
    }
}
