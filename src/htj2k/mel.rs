//! Adaptive run-length (MEL) coder.
//!
//! A 13-state machine codes one binary event per quad: 0 for an all-zero
//! quad, 1 for a significant one. Runs of zero events are batched: when a
//! run reaches `1 << MEL_E[k]` a single 1-bit stands for the whole run and
//! the state adapts up; a significant event mid-run emits a 0-bit followed
//! by the partial run length and adapts down. The same machine also codes
//! the U-VLC initial line-pair events.
//!
//! Bits pack MSB-first. An emitted 0xFF byte restricts the following byte
//! to 7 payload bits, placed from bit 6 downward.

/// Exponent table indexed by the MEL state variable k.
pub const MEL_E: [u32; 13] = [0, 0, 0, 1, 1, 1, 2, 2, 2, 3, 3, 4, 5];

struct MelBitWriter {
    buf: Vec<u8>,
    acc: u8,
    used: u8,
    limit: u8,
}

impl MelBitWriter {
    fn new() -> Self {
        Self {
            buf: Vec::new(),
            acc: 0,
            used: 0,
            limit: 8,
        }
    }

    fn push_bit(&mut self, bit: u32) {
        self.acc |= ((bit & 1) as u8) << (self.limit - 1 - self.used);
        self.used += 1;
        if self.used == self.limit {
            self.emit();
        }
    }

    fn emit(&mut self) {
        let b = self.acc;
        self.buf.push(b);
        self.limit = if b == 0xFF { 7 } else { 8 };
        self.acc = 0;
        self.used = 0;
    }

    fn finish(mut self) -> Vec<u8> {
        if self.used > 0 {
            // Left-aligned already; unused low bits stay zero.
            self.buf.push(self.acc);
        }
        self.buf
    }
}

struct MelBitReader<'a> {
    data: &'a [u8],
    pos: usize,
    acc: u8,
    avail: u8,
    prev_ff: bool,
}

impl<'a> MelBitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            acc: 0,
            avail: 0,
            prev_ff: false,
        }
    }

    /// Returns `None` once the byte stream is exhausted.
    fn read_bit(&mut self) -> Option<u32> {
        if self.avail == 0 {
            if self.pos >= self.data.len() {
                return None;
            }
            let b = self.data[self.pos];
            self.pos += 1;
            self.avail = if self.prev_ff { 7 } else { 8 };
            self.prev_ff = b == 0xFF;
            self.acc = b;
        }
        self.avail -= 1;
        Some(((self.acc >> self.avail) & 1) as u32)
    }
}

pub struct MelEncoder {
    bits: MelBitWriter,
    k: usize,
    run: u32,
}

impl MelEncoder {
    pub fn new() -> Self {
        Self {
            bits: MelBitWriter::new(),
            k: 0,
            run: 0,
        }
    }

    /// Codes one event: `false` for an all-zero quad, `true` otherwise.
    pub fn encode(&mut self, significant: bool) {
        if !significant {
            self.run += 1;
            if self.run == 1 << MEL_E[self.k] {
                self.bits.push_bit(1);
                self.run = 0;
                self.k = (self.k + 1).min(12);
            }
        } else {
            self.bits.push_bit(0);
            let e = MEL_E[self.k];
            for i in (0..e).rev() {
                self.bits.push_bit((self.run >> i) & 1);
            }
            self.run = 0;
            self.k = self.k.saturating_sub(1);
        }
    }

    /// Terminates the stream. A pending zero-run is promoted to a full run
    /// so the decoder's run counter covers the remaining quads.
    pub fn finish(mut self) -> Vec<u8> {
        if self.run > 0 {
            self.bits.push_bit(1);
        }
        self.bits.finish()
    }
}

impl Default for MelEncoder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MelDecoder<'a> {
    bits: MelBitReader<'a>,
    k: usize,
    run: u32,
    one: bool,
}

impl<'a> MelDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            bits: MelBitReader::new(data),
            k: 0,
            run: 0,
            one: false,
        }
    }

    /// Decodes one event. Exhaustion of both the byte stream and the
    /// pending-run state yields `false`: remaining quads are all-zero.
    pub fn decode(&mut self) -> bool {
        loop {
            if self.run > 0 {
                self.run -= 1;
                return false;
            }
            if self.one {
                self.one = false;
                return true;
            }
            match self.bits.read_bit() {
                None => return false,
                Some(1) => {
                    self.run = 1 << MEL_E[self.k];
                    self.k = (self.k + 1).min(12);
                }
                Some(_) => {
                    let e = MEL_E[self.k];
                    let mut r = 0;
                    for _ in 0..e {
                        r = (r << 1) | self.bits.read_bit().unwrap_or(0);
                    }
                    self.run = r;
                    self.k = self.k.saturating_sub(1);
                    self.one = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(events: &[bool]) {
        let mut enc = MelEncoder::new();
        for &e in events {
            enc.encode(e);
        }
        let bytes = enc.finish();
        let mut dec = MelDecoder::new(&bytes);
        for (i, &e) in events.iter().enumerate() {
            assert_eq!(dec.decode(), e, "event {} mismatch", i);
        }
    }

    #[test]
    fn all_zero_events() {
        round_trip(&[false; 300]);
        // A long zero run compresses to a handful of run bits.
        let mut enc = MelEncoder::new();
        for _ in 0..300 {
            enc.encode(false);
        }
        assert!(enc.finish().len() <= 4);
    }

    #[test]
    fn all_significant_events() {
        round_trip(&[true; 64]);
    }

    #[test]
    fn alternating_events() {
        let events: Vec<bool> = (0..128).map(|i| i % 2 == 0).collect();
        round_trip(&events);
    }

    #[test]
    fn pseudo_random_events_round_trip() {
        let mut state = 0x2545F491u32;
        let mut events = Vec::new();
        for _ in 0..4096 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            events.push(state & 3 == 0);
        }
        round_trip(&events);
    }

    #[test]
    fn state_adapts_and_saturates() {
        let mut enc = MelEncoder::new();
        for _ in 0..10_000 {
            enc.encode(false);
        }
        assert_eq!(enc.k, 12);
        for _ in 0..40 {
            enc.encode(true);
        }
        assert_eq!(enc.k, 0);
    }

    #[test]
    fn trailing_zero_run_is_covered() {
        // Significant event followed by zeros that never reach a run
        // boundary: the decoder must still see them as zeros.
        let mut events = vec![true];
        events.extend(std::iter::repeat(false).take(5));
        round_trip(&events);
    }

    #[test]
    fn state_trajectories_match_at_significant_events() {
        // Every 1-event forces both machines through the same 0-branch;
        // all batched-run bits preceding it have been consumed on both
        // sides, so the adaptation state must agree exactly there.
        let mut state = 0xACE1u32;
        let mut events = Vec::new();
        for _ in 0..2048 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            events.push(state & 7 == 0);
        }
        let mut enc = MelEncoder::new();
        for &e in &events {
            enc.encode(e);
        }
        let bytes = enc.finish();

        let mut shadow = MelEncoder::new();
        let mut dec = MelDecoder::new(&bytes);
        for &e in &events {
            shadow.encode(e);
            assert_eq!(dec.decode(), e);
            if e {
                assert_eq!(dec.k, shadow.k, "state diverged at a significant event");
            }
        }
    }

    #[test]
    fn empty_stream_decodes_as_zeros() {
        let mut dec = MelDecoder::new(&[]);
        for _ in 0..16 {
            assert!(!dec.decode());
        }
    }
}
