//! Magnitude/sign value codec over the stuffed MagSgn bit stream.
//!
//! Each significant sample contributes `m + 1` bits: the sign in the low
//! bit, then the low `m` bits of the magnitude. When the VLC table marks
//! the sample with e_1, bit `m` of the magnitude is implicit and restored
//! on decode.

use crate::error::HtError;
use crate::htj2k::bit_io::{MagSgnBitReader, MagSgnBitWriter};

pub struct MagSgnEncoder {
    bits: MagSgnBitWriter,
}

impl MagSgnEncoder {
    pub fn new() -> Self {
        Self {
            bits: MagSgnBitWriter::new(),
        }
    }

    /// Emits one sample: `m` magnitude bits plus the sign bit.
    pub fn put(&mut self, magnitude: u32, negative: bool, m: u32) {
        let mask = if m >= 32 { u32::MAX } else { (1u32 << m) - 1 };
        let v = (((magnitude & mask) as u64) << 1) | negative as u64;
        self.bits.push_bits(v, m + 1);
    }

    pub fn finish(self) -> Vec<u8> {
        self.bits.finish()
    }
}

impl Default for MagSgnEncoder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MagSgnDecoder<'a> {
    bits: MagSgnBitReader<'a>,
}

impl<'a> MagSgnDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            bits: MagSgnBitReader::new(data),
        }
    }

    /// Reads one sample coded with `m` magnitude bits. `implicit_msb`
    /// restores the e_1-signalled bit at position `m`.
    pub fn get(&mut self, m: u32, implicit_msb: bool) -> Result<(u32, bool), HtError> {
        let v = self.bits.read_bits(m + 1)?;
        let negative = v & 1 == 1;
        let mut magnitude = (v >> 1) as u32;
        if implicit_msb {
            magnitude |= 1 << m;
        }
        Ok((magnitude, negative))
    }
}
