//! Unsigned-residual (U-VLC) coder.
//!
//! Residuals `u = U_q - K_q >= 1` are coded with a prefix/suffix/extension
//! decomposition:
//!
//! | u      | prefix | suffix bits | extension bits |
//! |--------|--------|-------------|----------------|
//! | 1      | 1      | 0           | 0              |
//! | 2      | 01     | 0           | 0              |
//! | 3..4   | 001    | 1           | 0              |
//! | 5..32  | 000    | 5           | 0              |
//! | 33..96 | 000    | 5 (>= 28)   | 4              |
//!
//! Suffix and extension bits are little-endian. Quads are coded in
//! horizontal pairs with the two prefixes leading the two suffixes, which
//! lets the decoder resolve both prefixes from one 6-bit head via a
//! precomputed table. The initial line-pair has two special shapes: when
//! both quads carry a residual, a MEL event signals `u0 > 2 && u1 > 2`, in
//! which case both residuals are coded with a bias of 2; otherwise, when
//! `u0 > 2`, the second residual is necessarily 1 or 2 and is coded with a
//! single bit.

use std::sync::OnceLock;

use crate::error::HtError;
use crate::htj2k::bit_io::{VlcBitReader, VlcBitWriter};
use crate::htj2k::vlc_tables::TABLE_INITIAL;

/// Largest residual the extension field can express.
pub const U_MAX: u32 = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UParts {
    prefix: u32,
    prefix_len: u32,
    suffix: u32,
    suffix_len: u32,
    ext: u32,
    ext_len: u32,
}

fn u_parts(u: u32, quad: (u32, u32)) -> Result<UParts, HtError> {
    let p = match u {
        1 => UParts {
            prefix: 0b1,
            prefix_len: 1,
            suffix: 0,
            suffix_len: 0,
            ext: 0,
            ext_len: 0,
        },
        2 => UParts {
            prefix: 0b10,
            prefix_len: 2,
            suffix: 0,
            suffix_len: 0,
            ext: 0,
            ext_len: 0,
        },
        3..=4 => UParts {
            prefix: 0b100,
            prefix_len: 3,
            suffix: u - 3,
            suffix_len: 1,
            ext: 0,
            ext_len: 0,
        },
        5..=32 => UParts {
            prefix: 0b000,
            prefix_len: 3,
            suffix: u - 5,
            suffix_len: 5,
            ext: 0,
            ext_len: 0,
        },
        33..=U_MAX => UParts {
            prefix: 0b000,
            prefix_len: 3,
            suffix: 28 + ((u - 33) & 3),
            suffix_len: 5,
            ext: (u - 33) >> 2,
            ext_len: 4,
        },
        _ => {
            return Err(HtError::ValueOutOfRange {
                what: "U-VLC residual",
                value: u,
                max: U_MAX,
                quad_x: quad.0,
                quad_y: quad.1,
            })
        }
    };
    Ok(p)
}

/// Codes a single residual, prefix then suffix then extension.
pub fn encode_u(w: &mut VlcBitWriter, u: u32, quad: (u32, u32)) -> Result<(), HtError> {
    let p = u_parts(u, quad)?;
    w.push_bits(p.prefix as u64, p.prefix_len);
    w.push_bits(p.suffix as u64, p.suffix_len);
    w.push_bits(p.ext as u64, p.ext_len);
    Ok(())
}

/// Scalar decode, the reference for the pair tables.
pub fn decode_u(r: &mut VlcBitReader) -> Result<u32, HtError> {
    if r.read_bit()? == 1 {
        return Ok(1);
    }
    if r.read_bit()? == 1 {
        return Ok(2);
    }
    if r.read_bit()? == 1 {
        return Ok(3 + r.read_bits(1)?);
    }
    let s = r.read_bits(5)?;
    if s < 28 {
        Ok(5 + s)
    } else {
        Ok(33 + (s - 28) + (r.read_bits(4)? << 2))
    }
}

/// Base value reached by a prefix alone: 1, 2, 3 (one suffix bit) or
/// 5 (five suffix bits, possibly extended).
fn suffix_len_for(base: u32) -> u32 {
    match base {
        3 => 1,
        5 => 5,
        _ => 0,
    }
}

/// Parses one prefix from `head` starting at `offset`. Returns
/// `(bits_consumed, base)`.
fn parse_prefix(head: u32, offset: u32) -> (u32, u32) {
    let h = head >> offset;
    if h & 1 == 1 {
        (1, 1)
    } else if (h >> 1) & 1 == 1 {
        (2, 2)
    } else if (h >> 2) & 1 == 1 {
        (3, 3)
    } else {
        (3, 5)
    }
}

/// Pair-table entry: `lp:3 | ls0:3 | ls1:3 | b0:3 | b1:3`, where lp is the
/// joint prefix length and b encodes the base (0 = residual absent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairEntry(u16);

impl PairEntry {
    fn pack(lp: u32, ls0: u32, ls1: u32, b0: u32, b1: u32) -> Self {
        PairEntry((lp | (ls0 << 3) | (ls1 << 6) | (b0 << 9) | (b1 << 12)) as u16)
    }

    fn prefix_len(self) -> u32 {
        (self.0 & 7) as u32
    }

    fn suffix_len0(self) -> u32 {
        ((self.0 >> 3) & 7) as u32
    }

    fn suffix_len1(self) -> u32 {
        ((self.0 >> 6) & 7) as u32
    }

    fn base0(self) -> u32 {
        ((self.0 >> 9) & 7) as u32
    }

    fn base1(self) -> u32 {
        ((self.0 >> 12) & 7) as u32
    }
}

/// Pair coding modes. The head index of the decode tables is
/// `mode << 6 | head6`.
const MODE_NONE: usize = 0;
const MODE_FIRST: usize = 1;
const MODE_SECOND: usize = 2;
const MODE_BOTH: usize = 3;
/// Initial line-pair with the MEL event set: both residuals biased by 2.
const MODE_BOTH_BIASED: usize = 4;

fn build_pair_table(table: usize) -> Vec<PairEntry> {
    let modes = if table == TABLE_INITIAL { 5 } else { 4 };
    let mut entries = vec![PairEntry(0); modes * 64];
    for head in 0u32..64 {
        entries[MODE_FIRST * 64 + head as usize] = {
            let (lp, b0) = parse_prefix(head, 0);
            PairEntry::pack(lp, suffix_len_for(b0), 0, b0, 0)
        };
        entries[MODE_SECOND * 64 + head as usize] = {
            let (lp, b1) = parse_prefix(head, 0);
            PairEntry::pack(lp, 0, suffix_len_for(b1), 0, b1)
        };
        entries[MODE_BOTH * 64 + head as usize] = {
            let (l0, b0) = parse_prefix(head, 0);
            if table == TABLE_INITIAL && b0 > 2 {
                // Simplified second residual: one bit selects 1 or 2.
                let b1 = 1 + ((head >> l0) & 1);
                PairEntry::pack(l0 + 1, suffix_len_for(b0), 0, b0, b1)
            } else {
                let (l1, b1) = parse_prefix(head, l0);
                PairEntry::pack(l0 + l1, suffix_len_for(b0), suffix_len_for(b1), b0, b1)
            }
        };
        if table == TABLE_INITIAL {
            entries[MODE_BOTH_BIASED * 64 + head as usize] = {
                let (l0, b0) = parse_prefix(head, 0);
                let (l1, b1) = parse_prefix(head, l0);
                PairEntry::pack(l0 + l1, suffix_len_for(b0), suffix_len_for(b1), b0, b1)
            };
        }
    }
    entries
}

fn validate_pair_table(table: usize, entries: &[PairEntry]) -> Result<(), String> {
    let modes = if table == TABLE_INITIAL { 5 } else { 4 };
    if entries.len() != modes * 64 {
        return Err(format!("U-VLC table {}: wrong size {}", table, entries.len()));
    }
    for mode in MODE_FIRST..modes {
        for head in 0..64 {
            let e = entries[mode * 64 + head];
            if e.prefix_len() == 0 || e.prefix_len() > 6 {
                return Err(format!("U-VLC table {}: bad prefix length", table));
            }
            for (base, ls) in [(e.base0(), e.suffix_len0()), (e.base1(), e.suffix_len1())] {
                let legal = matches!(base, 0..=3 | 5);
                if !legal || (base != 0 && ls != suffix_len_for(base)) {
                    return Err(format!("U-VLC table {}: inconsistent entry", table));
                }
            }
        }
    }
    Ok(())
}

static PAIR_TABLES: OnceLock<[Vec<PairEntry>; 2]> = OnceLock::new();

fn pair_tables() -> &'static [Vec<PairEntry>; 2] {
    PAIR_TABLES.get_or_init(|| {
        let built = [build_pair_table(0), build_pair_table(1)];
        for (t, entries) in built.iter().enumerate() {
            if let Err(msg) = validate_pair_table(t, entries) {
                panic!("U-VLC pair table conformance check failed: {}", msg);
            }
        }
        built
    })
}

fn select_mode(table: usize, u0: Option<u32>, u1: Option<u32>, mel_event: bool) -> usize {
    match (u0.is_some(), u1.is_some()) {
        (false, false) => MODE_NONE,
        (true, false) => MODE_FIRST,
        (false, true) => MODE_SECOND,
        (true, true) => {
            if table == TABLE_INITIAL && mel_event {
                MODE_BOTH_BIASED
            } else {
                MODE_BOTH
            }
        }
    }
}

/// Codes the residuals of one horizontal quad pair. `None` marks a quad
/// with `u_off = 0` (or a missing second quad in an odd-width last
/// column). `mel_event` is the already-coded initial line-pair event.
pub fn encode_pair(
    w: &mut VlcBitWriter,
    table: usize,
    u0: Option<u32>,
    u1: Option<u32>,
    mel_event: bool,
    quad: (u32, u32),
) -> Result<(), HtError> {
    match select_mode(table, u0, u1, mel_event) {
        MODE_NONE => Ok(()),
        MODE_FIRST => encode_u(w, u0.unwrap_or_default(), quad),
        MODE_SECOND => encode_u(w, u1.unwrap_or_default(), quad),
        MODE_BOTH_BIASED => {
            let a = u_parts(u0.unwrap_or_default() - 2, quad)?;
            let b = u_parts(u1.unwrap_or_default() - 2, quad)?;
            emit_joint(w, a, b);
            Ok(())
        }
        _ => {
            let (u0, u1) = (u0.unwrap_or_default(), u1.unwrap_or_default());
            if table == TABLE_INITIAL && u0 > 2 {
                // The event was 0, so u1 is 1 or 2: simplified form.
                if !(1..=2).contains(&u1) {
                    return Err(HtError::ValueOutOfRange {
                        what: "simplified U-VLC residual",
                        value: u1,
                        max: 2,
                        quad_x: quad.0,
                        quad_y: quad.1,
                    });
                }
                let a = u_parts(u0, quad)?;
                w.push_bits(a.prefix as u64, a.prefix_len);
                w.push_bit(u1 - 1);
                w.push_bits(a.suffix as u64, a.suffix_len);
                w.push_bits(a.ext as u64, a.ext_len);
                Ok(())
            } else {
                let a = u_parts(u0, quad)?;
                let b = u_parts(u1, quad)?;
                emit_joint(w, a, b);
                Ok(())
            }
        }
    }
}

fn emit_joint(w: &mut VlcBitWriter, a: UParts, b: UParts) {
    w.push_bits(a.prefix as u64, a.prefix_len);
    w.push_bits(b.prefix as u64, b.prefix_len);
    w.push_bits(a.suffix as u64, a.suffix_len);
    w.push_bits(b.suffix as u64, b.suffix_len);
    w.push_bits(a.ext as u64, a.ext_len);
    w.push_bits(b.ext as u64, b.ext_len);
}

/// Decodes the residuals of one quad pair. Returns `(u0, u1)` with 0 for
/// absent residuals.
pub fn decode_pair(
    r: &mut VlcBitReader,
    table: usize,
    u_off0: bool,
    u_off1: bool,
    mel_event: bool,
) -> Result<(u32, u32), HtError> {
    let mode = select_mode(
        table,
        u_off0.then_some(0),
        u_off1.then_some(0),
        mel_event,
    );
    if mode == MODE_NONE {
        return Ok((0, 0));
    }
    let head = r.peek(6)?;
    let e = pair_tables()[table][mode * 64 + head as usize];
    r.consume(e.prefix_len())?;
    let s0 = r.read_bits(e.suffix_len0())?;
    let s1 = r.read_bits(e.suffix_len1())?;
    let bias = if mode == MODE_BOTH_BIASED { 2 } else { 0 };
    let u0 = if e.base0() == 0 {
        0
    } else {
        resolve(r, e.base0(), s0)? + bias
    };
    let u1 = if e.base1() == 0 {
        0
    } else {
        resolve(r, e.base1(), s1)? + bias
    };
    Ok((u0, u1))
}

/// Completes a residual from its base and raw suffix, reading the 4-bit
/// extension when the suffix signals it.
fn resolve(r: &mut VlcBitReader, base: u32, suffix: u32) -> Result<u32, HtError> {
    match base {
        3 => Ok(3 + suffix),
        5 => {
            if suffix < 28 {
                Ok(5 + suffix)
            } else {
                Ok(33 + (suffix - 28) + (r.read_bits(4)? << 2))
            }
        }
        _ => Ok(base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::htj2k::vlc_tables::TABLE_NON_INITIAL;

    #[test]
    fn scalar_round_trip_over_full_domain() {
        for u in 1..=U_MAX {
            let mut w = VlcBitWriter::new();
            encode_u(&mut w, u, (0, 0)).unwrap();
            let bytes = w.finish();
            let mut r = VlcBitReader::new(&bytes);
            assert_eq!(decode_u(&mut r).unwrap(), u, "u = {}", u);
        }
    }

    #[test]
    fn residual_above_cap_is_rejected() {
        let mut w = VlcBitWriter::new();
        assert!(matches!(
            encode_u(&mut w, U_MAX + 1, (3, 7)),
            Err(HtError::ValueOutOfRange { value, .. }) if value == U_MAX + 1
        ));
    }

    fn pair_round_trip(table: usize, u0: Option<u32>, u1: Option<u32>, mel_event: bool) {
        let mut w = VlcBitWriter::new();
        encode_pair(&mut w, table, u0, u1, mel_event, (0, 0)).unwrap();
        let bytes = w.finish();
        let mut r = VlcBitReader::new(&bytes);
        let (d0, d1) = decode_pair(&mut r, table, u0.is_some(), u1.is_some(), mel_event).unwrap();
        assert_eq!((d0, d1), (u0.unwrap_or(0), u1.unwrap_or(0)));
    }

    #[test]
    fn single_residual_modes() {
        for table in [TABLE_INITIAL, TABLE_NON_INITIAL] {
            for u in 1..=U_MAX {
                pair_round_trip(table, Some(u), None, false);
                pair_round_trip(table, None, Some(u), false);
            }
        }
    }

    #[test]
    fn non_initial_joint_pairs() {
        for u0 in [1, 2, 3, 4, 5, 17, 32, 33, 50, 96] {
            for u1 in [1, 2, 3, 4, 5, 17, 32, 33, 50, 96] {
                pair_round_trip(TABLE_NON_INITIAL, Some(u0), Some(u1), false);
            }
        }
    }

    #[test]
    fn initial_pair_event_set_applies_bias() {
        for u0 in [3, 4, 5, 10, 34, 96] {
            for u1 in [3, 4, 5, 10, 34, 96] {
                pair_round_trip(TABLE_INITIAL, Some(u0), Some(u1), true);
            }
        }
    }

    #[test]
    fn initial_pair_event_clear_uses_simplified_second() {
        // u0 > 2 forces u1 into {1, 2}.
        for u0 in [3, 4, 5, 32, 33, 96] {
            for u1 in [1, 2] {
                pair_round_trip(TABLE_INITIAL, Some(u0), Some(u1), false);
            }
        }
        // u0 <= 2 codes the pair jointly.
        for u0 in [1, 2] {
            for u1 in [1, 2, 3, 5, 33, 96] {
                pair_round_trip(TABLE_INITIAL, Some(u0), Some(u1), false);
            }
        }
    }

    #[test]
    fn simplified_second_out_of_range_is_rejected() {
        let mut w = VlcBitWriter::new();
        let err = encode_pair(&mut w, TABLE_INITIAL, Some(5), Some(3), false, (1, 0));
        assert!(matches!(err, Err(HtError::ValueOutOfRange { .. })));
    }

    #[test]
    fn pair_tables_pass_conformance() {
        for (t, entries) in pair_tables().iter().enumerate() {
            assert!(validate_pair_table(t, entries).is_ok());
        }
    }

    #[test]
    fn pair_decode_agrees_with_scalar_decode() {
        // A joint non-initial pair must parse identically to two scalar
        // codes read prefix-first; verify via a transposed emission.
        for u0 in [1, 2, 4, 9, 33] {
            for u1 in [1, 2, 4, 9, 33] {
                let mut w = VlcBitWriter::new();
                encode_pair(&mut w, TABLE_NON_INITIAL, Some(u0), Some(u1), false, (0, 0))
                    .unwrap();
                let bytes = w.finish();
                let mut r = VlcBitReader::new(&bytes);
                let (d0, d1) =
                    decode_pair(&mut r, TABLE_NON_INITIAL, true, true, false).unwrap();
                assert_eq!((d0, d1), (u0, u1));
            }
        }
    }
}
