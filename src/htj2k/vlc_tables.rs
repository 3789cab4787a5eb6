//! Context-adaptive VLC codeword tables and their derived decode tables.
//!
//! Two tables exist: index 0 for quads on the initial row of a code-block,
//! index 1 for all subsequent rows. Each table holds, per 3-bit context, a
//! prefix-free set of codewords over the quad alphabet
//! `(rho, u_off, e_k, e_1)`:
//!
//! - `rho`    significance pattern, 1..=15 (all-zero quads are MEL-coded),
//! - `u_off`  whether a U-VLC residual follows,
//! - `e_k`    mask of samples whose top magnitude bit is table-signalled,
//! - `e_1`    the signalled values of those bits.
//!
//! Codewords are at most 7 bits, stored in read order (bit 0 is read
//! first). The tables are process-wide immutable state built once; the
//! construction is a deterministic canonical-code assignment, and a
//! conformance check runs at initialization and panics on any violation,
//! so a corrupted table can never silently mis-decode.

use std::sync::OnceLock;

/// One codeword table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlcEntry {
    pub context: u8,
    pub rho: u8,
    pub u_off: u8,
    pub e_k: u8,
    pub e_1: u8,
    pub cwd: u8,
    pub len: u8,
}

/// Decode-table slot: `EK:4 | E1:4 | Rho:4 | UOff:1 | CwdLen:3` packed in
/// 16 bits for cache-friendly access. A zero slot is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedEntry(pub u16);

impl PackedEntry {
    fn pack(e: &VlcEntry) -> Self {
        let v = (e.len as u16)
            | ((e.u_off as u16) << 3)
            | ((e.rho as u16) << 4)
            | ((e.e_1 as u16) << 8)
            | ((e.e_k as u16) << 12);
        PackedEntry(v)
    }

    pub fn len(self) -> u32 {
        (self.0 & 0x7) as u32
    }

    pub fn u_off(self) -> u8 {
        ((self.0 >> 3) & 1) as u8
    }

    pub fn rho(self) -> u8 {
        ((self.0 >> 4) & 0xF) as u8
    }

    pub fn e_1(self) -> u8 {
        ((self.0 >> 8) & 0xF) as u8
    }

    pub fn e_k(self) -> u8 {
        ((self.0 >> 12) & 0xF) as u8
    }

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// One of the two CxtVLC tables with its derived lookup structures.
pub struct CxtVlcTable {
    pub entries: Vec<VlcEntry>,
    /// 1024 slots indexed by `context << 7 | window7`.
    dec: Vec<PackedEntry>,
    /// Encode buckets indexed by `context << 5 | u_off << 4 | rho`.
    enc: Vec<Vec<u16>>,
}

pub const TABLE_INITIAL: usize = 0;
pub const TABLE_NON_INITIAL: usize = 1;

impl CxtVlcTable {
    /// Encode-side lookup: among entries with matching `(context, rho,
    /// u_off)` and `(e_k & eps0) == e_1`, returns the one with the most
    /// e_k bits.
    pub fn lookup_encode(&self, context: u8, rho: u8, u_off: u8, eps0: u8) -> Option<&VlcEntry> {
        let bucket = &self.enc[((context as usize) << 5) | ((u_off as usize) << 4) | rho as usize];
        let mut best: Option<&VlcEntry> = None;
        for &i in bucket {
            let e = &self.entries[i as usize];
            if e.e_k & eps0 != e.e_1 {
                continue;
            }
            if best.map_or(true, |b| e.e_k.count_ones() > b.e_k.count_ones()) {
                best = Some(e);
            }
        }
        best
    }

    /// Single-lookup decode from a 7-bit window (bit 0 = next bit read).
    pub fn decode_window(&self, context: u8, window7: u32) -> PackedEntry {
        self.dec[((context as usize) << 7) | (window7 & 0x7F) as usize]
    }

    /// Length-by-length decode: grow the window one bit at a time and
    /// accept the slot whose stored length matches the bits consumed.
    /// Equivalent to [`decode_window`]; retained as the conformance
    /// reference for the derived table.
    pub fn decode_stepwise(&self, context: u8, window7: u32) -> Option<PackedEntry> {
        for len in 1..=7u32 {
            let w = window7 & ((1u32 << len) - 1);
            let e = self.dec[((context as usize) << 7) | w as usize];
            if e.is_valid() && e.len() == len {
                return Some(e);
            }
        }
        None
    }
}

/// Codeword values per length class, in rank order. Two 3-bit codes, six
/// 5-bit codes and seventy-two 7-bit codes tile the 128-leaf space of each
/// context exactly.
const LEN3_CODES: [u8; 2] = [0x00, 0x04];
const LEN5_CODES: [u8; 6] = [0x01, 0x02, 0x03, 0x05, 0x06, 0x07];

fn len7_codes() -> Vec<u8> {
    (0u8..128)
        .filter(|v| {
            let low3 = v & 7;
            let low5 = v & 31;
            low3 != 0 && low3 != 4 && !(low5 >= 1 && low5 <= 7 && low5 != 4)
        })
        .collect()
}

#[derive(Clone, Copy)]
struct Symbol {
    rho: u8,
    u_off: u8,
    e_k: u8,
    e_1: u8,
}

fn alphabet() -> Vec<Symbol> {
    let mut syms = Vec::with_capacity(80);
    for rho in 1u8..=15 {
        syms.push(Symbol {
            rho,
            u_off: 0,
            e_k: 0,
            e_1: 0,
        });
    }
    for rho in 1u8..=15 {
        // e_1 runs over the non-empty subsets of rho: at least one sample
        // always attains the quad maximum exponent when u_off = 1.
        let mut e_1 = rho;
        loop {
            syms.push(Symbol {
                rho,
                u_off: 1,
                e_k: rho,
                e_1,
            });
            e_1 = (e_1 - 1) & rho;
            if e_1 == 0 {
                break;
            }
        }
    }
    syms
}

/// Static prior: contexts with more significant-neighbor bits favor denser
/// quads. The initial-row table additionally favors u_off = 1, since the
/// first-row predictor is pinned at K_q = 1.
fn score(sym: &Symbol, context: u8, table: usize) -> i32 {
    let expected = 1 + (context & 1) as i32 + ((context >> 1) & 1) as i32 + ((context >> 2) & 1) as i32;
    let density = (sym.rho.count_ones() as i32 - expected).abs();
    let u_off_bias = if table == TABLE_INITIAL {
        (sym.u_off == 0) as i32
    } else {
        (sym.u_off == 1) as i32
    };
    let emb = if sym.u_off == 1 {
        sym.e_1.count_ones() as i32 - 1
    } else {
        0
    };
    4 * density + 2 * u_off_bias + emb
}

fn build_table(table: usize) -> CxtVlcTable {
    let len7 = len7_codes();
    let mut entries = Vec::with_capacity(8 * 80);
    let mut dec = vec![PackedEntry(0); 1024];
    let mut enc = vec![Vec::new(); 8 * 32];

    for context in 0u8..8 {
        let mut syms = alphabet();
        syms.sort_by_key(|s| (score(s, context, table), s.u_off, s.rho, s.e_1));

        for (rank, sym) in syms.iter().enumerate() {
            let (cwd, len) = match rank {
                0..=1 => (LEN3_CODES[rank], 3u8),
                2..=7 => (LEN5_CODES[rank - 2], 5),
                _ => (len7[rank - 8], 7),
            };
            let entry = VlcEntry {
                context,
                rho: sym.rho,
                u_off: sym.u_off,
                e_k: sym.e_k,
                e_1: sym.e_1,
                cwd,
                len,
            };
            let idx = entries.len() as u16;
            entries.push(entry);
            enc[((context as usize) << 5) | ((sym.u_off as usize) << 4) | sym.rho as usize]
                .push(idx);

            // Every completion of the codeword maps to this entry.
            let packed = PackedEntry::pack(&entry);
            let step = 1usize << len;
            let mut slot = cwd as usize;
            while slot < 128 {
                let i = ((context as usize) << 7) | slot;
                assert_eq!(dec[i].0, 0, "codeword overlap in context {}", context);
                dec[i] = packed;
                slot += step;
            }
        }
    }

    CxtVlcTable { entries, dec, enc }
}

/// Conformance check for a table pair. Verifies field invariants, the
/// exact prefix-tree cover of every context, agreement of the derived
/// decode table with length-by-length decoding, and encode totality.
pub fn validate(tables: &[CxtVlcTable; 2]) -> Result<(), String> {
    for (t, table) in tables.iter().enumerate() {
        if table.entries.len() != 8 * 80 {
            return Err(format!("table {}: wrong entry count {}", t, table.entries.len()));
        }
        for e in &table.entries {
            if e.rho == 0 || e.rho > 15 {
                return Err(format!("table {}: rho {} out of range", t, e.rho));
            }
            if e.len == 0 || e.len > 7 || (e.cwd as u32) >= (1u32 << e.len) {
                return Err(format!("table {}: bad codeword {:#x}/{}", t, e.cwd, e.len));
            }
            if e.e_1 & !e.e_k != 0 || e.e_k & !e.rho != 0 {
                return Err(format!("table {}: EMB masks escape rho {:#x}", t, e.rho));
            }
            if e.u_off == 0 && (e.e_k != 0 || e.e_1 != 0) {
                return Err(format!("table {}: EMB bits on a u_off=0 entry", t));
            }
        }
        for slot in 0..1024usize {
            if !table.dec[slot].is_valid() {
                return Err(format!("table {}: uncovered decode slot {:#x}", t, slot));
            }
        }
        for e in &table.entries {
            let packed = PackedEntry::pack(e);
            // Any window completing the codeword must resolve to the entry,
            // both directly and stepwise.
            for high in 0..(1u32 << (7 - e.len)) {
                let w = e.cwd as u32 | (high << e.len);
                if table.decode_window(e.context, w) != packed {
                    return Err(format!("table {}: window {:#x} mismatch", t, w));
                }
                if table.decode_stepwise(e.context, w) != Some(packed) {
                    return Err(format!("table {}: stepwise {:#x} mismatch", t, w));
                }
            }
        }
        for context in 0u8..8 {
            for rho in 1u8..=15 {
                if table.lookup_encode(context, rho, 0, 0).is_none() {
                    return Err(format!("table {}: no u_off=0 entry for rho {}", t, rho));
                }
                let mut eps0 = rho;
                loop {
                    match table.lookup_encode(context, rho, 1, eps0) {
                        Some(e) if e.e_k & eps0 == e.e_1 => {}
                        _ => {
                            return Err(format!(
                                "table {}: encode lookup failed for rho {} eps0 {:#x}",
                                t, rho, eps0
                            ));
                        }
                    }
                    eps0 = (eps0 - 1) & rho;
                    if eps0 == 0 {
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

static TABLES: OnceLock<[CxtVlcTable; 2]> = OnceLock::new();

/// The process-wide CxtVLC tables, built and conformance-checked on first
/// use. A failed check is a bug and aborts rather than risking silent
/// data corruption.
pub fn tables() -> &'static [CxtVlcTable; 2] {
    TABLES.get_or_init(|| {
        let built = [build_table(TABLE_INITIAL), build_table(TABLE_NON_INITIAL)];
        if let Err(msg) = validate(&built) {
            panic!("CxtVLC table conformance check failed: {}", msg);
        }
        built
    })
}
