pub const MAX_DEPTH: usize = 256;

pub(crate) const FIXED_DECIMALS: usize = 6;

pub(crate) const TRUE_LITERAL: &str = "true";
pub(crate) const FALSE_LITERAL: &str = "false";

/// The whitespace set of C's `isspace`.
#[inline]
pub fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r')
}

#[inline]
pub fn is_structural_byte(byte: u8) -> bool {
    matches!(byte, b'=' | b',' | b'[' | b']' | b'{' | b'}' | b'"' | b'\\')
}

/// Keys made only of these bytes are written without quotes.
#[inline]
pub fn is_bare_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|byte| !is_space(byte) && !is_structural_byte(byte) && byte != 0)
}

#[inline]
pub(crate) fn is_number_byte(byte: u8) -> bool {
    matches!(byte, b'0'..=b'9' | b'.' | b'e' | b'E' | b'+' | b'-')
}
