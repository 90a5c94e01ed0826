//! Bit-level access to a de-armored AIS payload.
//!
//! A `BitBuffer` holds one bit per element, most significant bit of each
//! 6-bit group first. Fields are addressed by an inclusive `[start, end]`
//! range plus the span the caller expects, mirroring how ITU-R M.1371 tables
//! list them. Ranges that run past the end of the buffer yield `None`: AIS
//! messages are routinely transmitted a few bits short (type 5 at 420/422
//! instead of 424 bits), and a truncated tail must not sink the whole decode.

/// Largest field the extractor will pack into an integer.
pub const MAX_INT_BITS: usize = 64;

/// Dense, immutable bit sequence built from one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitBuffer {
    bits: Vec<u8>,
}

impl BitBuffer {
    /// Build from raw 0/1 values. Any non-zero element counts as a set bit.
    pub fn from_bits(bits: Vec<u8>) -> Self {
        let bits = bits.into_iter().map(|b| (b != 0) as u8).collect();
        BitBuffer { bits }
    }

    pub(crate) fn with_capacity(n: usize) -> Self {
        BitBuffer {
            bits: Vec::with_capacity(n),
        }
    }

    /// Append the low `width` bits of `value`, MSB first. Widths beyond 64
    /// are zero-padded on the left.
    pub fn push_uint(&mut self, value: u64, width: usize) {
        for i in (0..width).rev() {
            let bit = if i < 64 { (value >> i) & 1 } else { 0 };
            self.bits.push(bit as u8);
        }
    }

    /// Append a whole other buffer (fragment reassembly).
    pub fn extend(&mut self, other: &BitBuffer) {
        self.bits.extend_from_slice(&other.bits);
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Single bit, or `None` past the end.
    pub fn bit(&self, index: usize) -> Option<bool> {
        self.bits.get(index).map(|&b| b == 1)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bits
    }

    /// Render as a "0101..." string (diagnostics).
    pub fn to_bit_string(&self) -> String {
        self.bits.iter().map(|&b| if b == 1 { '1' } else { '0' }).collect()
    }

    /// Unsigned integer from bits `start..=end`.
    ///
    /// Returns `None` when the range is inconsistent with `span`, wider than
    /// 64 bits, or extends past the buffer.
    pub fn uint(&self, start: usize, end: usize, span: usize) -> Option<u64> {
        let range = self.range(start, end, span)?;
        if span > MAX_INT_BITS {
            return None;
        }
        Some(
            range
                .iter()
                .fold(0u64, |acc, &b| (acc << 1) | u64::from(b)),
        )
    }

    /// Two's-complement signed integer from bits `start..=end`.
    pub fn int(&self, start: usize, end: usize, span: usize) -> Option<i64> {
        let raw = self.uint(start, end, span)?;
        Some(sign_extend(raw, span))
    }

    /// 6-bit text from bits `start..=end`. `span` must be a multiple of 6.
    ///
    /// Values 1-31 map to `value + 64` ('A'..'_'), 32-63 map to themselves
    /// (' '..'?'), and 0 maps to NUL. Trailing NUL, '@' and spaces are
    /// trimmed.
    pub fn text(&self, start: usize, end: usize, span: usize) -> Option<String> {
        if span % 6 != 0 {
            return None;
        }
        let range = self.range(start, end, span)?;

        let mut text = String::with_capacity(span / 6);
        for group in range.chunks(6) {
            let value = group.iter().fold(0u8, |acc, &b| (acc << 1) | b);
            text.push(sixbit_char(value));
        }

        let trimmed = text.trim_end_matches(['\0', '@', ' ']).len();
        text.truncate(trimmed);
        Some(text)
    }

    fn range(&self, start: usize, end: usize, span: usize) -> Option<&[u8]> {
        if span == 0 || end < start || end - start + 1 != span {
            return None;
        }
        self.bits.get(start..=end)
    }
}

/// Map one 6-bit value to its printable character.
pub fn sixbit_char(value: u8) -> char {
    match value {
        0 => '\0',
        1..=31 => (value + 64) as char,
        32..=63 => value as char,
        _ => '\0',
    }
}

/// Interpret the low `width` bits of `raw` as a two's-complement number.
pub fn sign_extend(raw: u64, width: usize) -> i64 {
    if width == 0 || width >= 64 {
        return raw as i64;
    }
    let shift = 64 - width as u32;
    ((raw << shift) as i64) >> shift
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
