//! Codeword emission and parsing over the CxtVLC tables.

use crate::error::HtError;
use crate::htj2k::bit_io::{VlcBitReader, VlcBitWriter};
use crate::htj2k::vlc_tables::{tables, PackedEntry, VlcEntry};

/// Codes one significant quad. Selection follows the table rule: entries
/// matching `(context, rho, u_off)` with `(e_k & eps0) == e_1`, preferring
/// the densest e_k. The returned entry supplies the MagSgn bit counts.
pub fn encode_codeword(
    w: &mut VlcBitWriter,
    table: usize,
    context: u8,
    rho: u8,
    u_off: u8,
    eps0: u8,
    quad: (u32, u32),
) -> Result<&'static VlcEntry, HtError> {
    let entry = tables()[table]
        .lookup_encode(context, rho, u_off, eps0)
        .ok_or(HtError::InvalidCodeword {
            context,
            quad_x: quad.0,
            quad_y: quad.1,
        })?;
    w.push_bits(entry.cwd as u64, entry.len as u32);
    Ok(entry)
}

/// Parses one codeword with a single 7-bit window lookup.
pub fn decode_codeword(
    r: &mut VlcBitReader,
    table: usize,
    context: u8,
    quad: (u32, u32),
) -> Result<PackedEntry, HtError> {
    let window = r.peek(7)?;
    let entry = tables()[table].decode_window(context, window);
    if !entry.is_valid() {
        return Err(HtError::InvalidCodeword {
            context,
            quad_x: quad.0,
            quad_y: quad.1,
        });
    }
    r.consume(entry.len())?;
    Ok(entry)
}
