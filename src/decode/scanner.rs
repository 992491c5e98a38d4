use memchr::memchr2;

use crate::arena::RawStr;
use crate::constants::{is_number_byte, is_space};
use crate::error::Location;
use crate::{Error, Result};

/// Cursor over a read-only input. Never allocates; strings come back as
/// slices of the input.
pub struct Scanner<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn error(&self, message: impl Into<String>) -> Error {
        self.error_at(self.position, message)
    }

    pub fn error_at(&self, offset: usize, message: impl Into<String>) -> Error {
        Error::parse(message).with_location(Location::from_offset(self.input, offset))
    }

    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    pub fn skip_whitespace(&mut self) {
        let bytes = self.bytes();
        while self.position < bytes.len() && is_space(bytes[self.position]) {
            self.position += 1;
        }
    }

    /// Next non-whitespace byte, without consuming it.
    pub fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.bytes().get(self.position).copied()
    }

    pub fn next(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.position += 1;
        Some(byte)
    }

    pub fn try_consume(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            return true;
        }
        false
    }

    pub fn expect(&mut self, expected: u8) -> Result<()> {
        self.skip_whitespace();
        let start = self.position;
        match self.next() {
            Some(found) if found == expected => Ok(()),
            Some(found) => Err(self.error_at(
                start,
                format!(
                    "expected `{}`, found `{}`",
                    expected as char,
                    printable(found)
                ),
            )),
            None => Err(self.error_at(
                start,
                format!("expected `{}`, found end of input", expected as char),
            )),
        }
    }

    /// End of the top-level object: end of input, or a NUL terminator.
    pub fn at_document_end(&mut self) -> bool {
        matches!(self.peek(), None | Some(0))
    }

    /// Scan a quoted string when the next byte is `"`, otherwise an unquoted
    /// token ending at whitespace or any byte in `stops`.
    pub fn scan_string(&mut self, stops: &[u8]) -> Result<RawStr<'a>> {
        if self.try_consume(b'"') {
            self.scan_quoted()
        } else {
            self.scan_unquoted(stops)
        }
    }

    fn scan_quoted(&mut self) -> Result<RawStr<'a>> {
        let bytes = self.bytes();
        let open = self.position.saturating_sub(1);
        let start = self.position;
        let mut idx = start;
        let mut escaped = false;
        while let Some(found) = memchr2(b'"', b'\\', &bytes[idx..]) {
            let at = idx + found;
            if bytes[at] == b'\\' {
                escaped = true;
                idx = at + 2;
                if idx > bytes.len() {
                    break;
                }
                continue;
            }
            self.position = at + 1;
            return Ok(RawStr {
                text: &self.input[start..at],
                escaped,
            });
        }
        Err(self.error_at(open, "unterminated string"))
    }

    fn scan_unquoted(&mut self, stops: &[u8]) -> Result<RawStr<'a>> {
        let bytes = self.bytes();
        let start = self.position;
        let mut end = start;
        while end < bytes.len() && !is_space(bytes[end]) && !stops.contains(&bytes[end]) {
            end += 1;
        }
        if end == start {
            return Err(self.error("expected a string"));
        }
        self.position = end;
        Ok(RawStr::plain(&self.input[start..end]))
    }

    fn number_token(&self) -> &'a str {
        let bytes = self.bytes();
        let mut end = self.position;
        while end < bytes.len() && is_number_byte(bytes[end]) {
            end += 1;
        }
        &self.input[self.position..end]
    }

    /// True when the number at the cursor is a float: it contains `.`, `e`
    /// or `E`.
    pub fn number_is_float(&mut self) -> bool {
        self.skip_whitespace();
        self.number_token()
            .bytes()
            .any(|byte| matches!(byte, b'.' | b'e' | b'E'))
    }

    pub fn number_is_hex(&mut self) -> bool {
        self.skip_whitespace();
        let rest = &self.bytes()[self.position..];
        let rest = rest.strip_prefix(b"-").unwrap_or(rest);
        rest.len() > 1 && rest[0] == b'0' && matches!(rest[1], b'x' | b'X')
    }

    /// Decimal integer. Values above `i64::MAX` that fit a `u64` are stored
    /// bit-cast.
    pub fn parse_int(&mut self) -> Result<i64> {
        self.skip_whitespace();
        let token = self.number_token();
        let value = match token.parse::<i64>() {
            Ok(value) => value,
            Err(_) => match token.parse::<u64>() {
                Ok(value) => value as i64,
                Err(_) => return Err(self.error(format!("invalid integer `{token}`"))),
            },
        };
        self.position += token.len();
        Ok(value)
    }

    pub fn parse_float(&mut self) -> Result<f64> {
        self.skip_whitespace();
        let token = self.number_token();
        match token.parse::<f64>() {
            Ok(value) => {
                self.position += token.len();
                Ok(value)
            }
            Err(_) => Err(self.error(format!("invalid float `{token}`"))),
        }
    }

    /// Hex integer with a mandatory `0x`/`0X` prefix.
    pub fn parse_hex(&mut self) -> Result<i64> {
        let negative = self.try_consume(b'-');
        self.expect(b'0')?;
        match self.bytes().get(self.position) {
            Some(b'x' | b'X') => self.position += 1,
            _ => return Err(self.error("expected `x` or `X` in hex number")),
        }
        let bytes = self.bytes();
        let start = self.position;
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_hexdigit() {
            end += 1;
        }
        let digits = &self.input[start..end];
        let value = u64::from_str_radix(digits, 16)
            .map_err(|_| self.error(format!("invalid hex integer `0x{digits}`")))?;
        self.position = end;
        let value = value as i64;
        Ok(if negative { value.wrapping_neg() } else { value })
    }
}

fn printable(byte: u8) -> String {
    if byte.is_ascii_graphic() {
        (byte as char).to_string()
    } else {
        format!("\\x{byte:02x}")
    }
}
