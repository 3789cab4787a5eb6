//! HT cleanup-pass block encoder.
//!
//! Quads are scanned in raster order and processed in horizontal pairs.
//! Each quad contributes one MEL significance event; significant quads add
//! a CxtVLC codeword, a share of the pair's U-VLC residual bits, and one
//! MagSgn field per significant sample. The three finalized streams are
//! assembled into the segment layout of [`segment`](super::segment).

use crate::error::HtError;
use crate::htj2k::bit_io::VlcBitWriter;
use crate::htj2k::context::QuadState;
use crate::htj2k::exponent::{bound_u, predict_k};
use crate::htj2k::mag_sgn::MagSgnEncoder;
use crate::htj2k::mel::MelEncoder;
use crate::htj2k::quad::{gather, QuadStats};
use crate::htj2k::segment;
use crate::htj2k::uvlc;
use crate::htj2k::vlc;
use crate::htj2k::vlc_tables::{TABLE_INITIAL, TABLE_NON_INITIAL};

/// Checks code-block dimensions: powers of two in `[min, 1024]`.
pub(crate) fn validate_dimensions(width: usize, height: usize, min: usize) -> Result<(), HtError> {
    let legal = |d: usize| d.is_power_of_two() && (min..=1024).contains(&d);
    if legal(width) && legal(height) {
        Ok(())
    } else {
        Err(HtError::InvalidBlockSize {
            width: width as u32,
            height: height as u32,
            min: min as u32,
        })
    }
}

/// Per-quad state carried from codeword emission to residual and MagSgn
/// emission.
struct QuadPlan {
    stats: QuadStats,
    u: u32,
    u_q: u32,
    u_off: bool,
    e_k: u8,
    e_1: u8,
}

pub struct HtBlockEncoder {
    width: usize,
    height: usize,
}

impl HtBlockEncoder {
    pub fn new(width: usize, height: usize) -> Result<Self, HtError> {
        validate_dimensions(width, height, 2)?;
        Ok(Self { width, height })
    }

    /// Encodes one code-block of row-major coefficients into a segment.
    pub fn encode(&self, coeffs: &[i32]) -> Result<Vec<u8>, HtError> {
        if coeffs.len() != self.width * self.height {
            return Err(HtError::InvalidConfiguration {
                reason: "coefficient count does not match block dimensions",
            });
        }
        let qw = self.width.div_ceil(2);
        let qh = self.height.div_ceil(2);

        let mut state = QuadState::new(qw, qh);
        let mut mel = MelEncoder::new();
        let mut mag_sgn = MagSgnEncoder::new();
        let mut vlc_w = VlcBitWriter::new();

        for qy in 0..qh {
            let table = if qy == 0 { TABLE_INITIAL } else { TABLE_NON_INITIAL };
            let mut qx = 0;
            while qx < qw {
                let p0 = self.encode_quad(coeffs, &mut state, &mut mel, &mut vlc_w, table, qx, qy)?;
                let p1 = if qx + 1 < qw {
                    Some(self.encode_quad(coeffs, &mut state, &mut mel, &mut vlc_w, table, qx + 1, qy)?)
                } else {
                    None
                };

                let u0 = p0.u_off.then_some(p0.u);
                let u1 = p1.as_ref().and_then(|p| p.u_off.then_some(p.u));
                let mut mel_event = false;
                if table == TABLE_INITIAL {
                    if let (Some(a), Some(b)) = (u0, u1) {
                        mel_event = a > 2 && b > 2;
                        mel.encode(mel_event);
                    }
                }
                uvlc::encode_pair(&mut vlc_w, table, u0, u1, mel_event, (qx as u32, qy as u32))?;

                emit_mag_sgn(&mut mag_sgn, &p0);
                if let Some(p) = &p1 {
                    emit_mag_sgn(&mut mag_sgn, p);
                }
                qx += 2;
            }
        }

        segment::assemble(&mag_sgn.finish(), &mel.finish(), &vlc_w.finish())
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_quad(
        &self,
        coeffs: &[i32],
        state: &mut QuadState,
        mel: &mut MelEncoder,
        vlc_w: &mut VlcBitWriter,
        table: usize,
        qx: usize,
        qy: usize,
    ) -> Result<QuadPlan, HtError> {
        let stats = gather(coeffs, self.width, self.height, qx, qy);
        mel.encode(stats.rho != 0);
        if stats.rho == 0 {
            state.set(qx, qy, 0, 0);
            return Ok(QuadPlan {
                stats,
                u: 0,
                u_q: 0,
                u_off: false,
                e_k: 0,
                e_1: 0,
            });
        }

        let context = state.vlc_context(qx, qy);
        let k = predict_k(state, qx, qy, stats.gamma);
        let (u_q, u) = bound_u(stats.e_max, k);
        let u_off = u > 0;
        let entry = vlc::encode_codeword(
            vlc_w,
            table,
            context,
            stats.rho,
            u_off as u8,
            stats.eps0,
            (qx as u32, qy as u32),
        )?;
        state.set(qx, qy, stats.rho, stats.e_max);
        Ok(QuadPlan {
            stats,
            u,
            u_q,
            u_off,
            e_k: entry.e_k,
            e_1: entry.e_1,
        })
    }
}

fn emit_mag_sgn(mag_sgn: &mut MagSgnEncoder, plan: &QuadPlan) {
    for n in 0..4 {
        if plan.stats.rho & (1 << n) == 0 {
            continue;
        }
        let m = plan.u_q - ((plan.e_k >> n) & 1) as u32;
        mag_sgn.put(plan.stats.mag[n], plan.stats.negative[n], m);
    }
}
