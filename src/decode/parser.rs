use std::collections::HashSet;

use crate::arena::{Document, Field, Value};
use crate::{ReadOptions, Result};

use super::scanner::Scanner;

const KEY_STOPS: &[u8] = b"=";
const VALUE_STOPS: &[u8] = b",}]=";

pub fn parse_document<'a>(input: &'a str, options: &ReadOptions) -> Result<Document<'a>> {
    let mut parser = Parser::new(input, options);
    let root = parser.parse_object(true)?;
    debug_assert_eq!(root, 0);
    Ok(parser.doc)
}

struct Parser<'a, 'o> {
    scanner: Scanner<'a>,
    doc: Document<'a>,
    options: &'o ReadOptions,
    depth: usize,
}

impl<'a, 'o> Parser<'a, 'o> {
    fn new(input: &'a str, options: &'o ReadOptions) -> Self {
        Self {
            scanner: Scanner::new(input),
            doc: Document::new(input),
            options,
            depth: 0,
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.options.max_depth {
            return Err(self.scanner.error(format!(
                "nesting exceeds the maximum depth of {}",
                self.options.max_depth
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Parse `key = value` pairs until `}`; the root object runs until the
    /// end of input instead.
    fn parse_object(&mut self, top_level: bool) -> Result<usize> {
        let index = self.doc.push_object();
        let mut seen: HashSet<&'a str> = HashSet::new();
        if !top_level {
            self.scanner.expect(b'{')?;
            self.enter()?;
        }

        loop {
            if top_level {
                if self.scanner.at_document_end() {
                    break;
                }
            } else {
                if self.scanner.try_consume(b'}') {
                    break;
                }
                if self.scanner.peek().is_none() {
                    return Err(self.scanner.error("unterminated object, expected `}`"));
                }
            }

            let key_offset = self.scanner.position();
            let key = self.parse_key()?;
            self.scanner.expect(b'=')?;
            let value = self.parse_value()?;

            if !seen.insert(key) {
                return Err(self
                    .scanner
                    .error_at(key_offset, format!("duplicate key `{key}`")));
            }
            self.doc.adopt(&value, index);
            self.doc.objects[index].fields.push(Field { key, value });
        }

        if !top_level {
            self.leave();
        }
        Ok(index)
    }

    fn parse_key(&mut self) -> Result<&'a str> {
        match self.scanner.peek() {
            Some(b'=' | b',' | b'{' | b'}' | b'[' | b']') | None => {
                return Err(self.scanner.error("expected a key"));
            }
            _ => {}
        }
        let offset = self.scanner.position();
        let raw = self.scanner.scan_string(KEY_STOPS)?;
        if raw.escaped {
            return Err(self
                .scanner
                .error_at(offset, "escape sequences are not allowed in keys"));
        }
        Ok(raw.text)
    }

    fn parse_value(&mut self) -> Result<Value<'a>> {
        let value = match self.scanner.peek() {
            Some(b'"') => Value::String(self.scanner.scan_string(VALUE_STOPS)?),
            Some(b'0'..=b'9' | b'-') => self.parse_number()?,
            Some(b'[') => Value::Array(self.parse_array()?),
            Some(b'{') => Value::Object(self.parse_object(false)?),
            Some(b',' | b'}' | b']' | b'=') => {
                return Err(self.scanner.error("expected a value"));
            }
            Some(_) if self.options.allow_bare_strings => {
                Value::String(self.scanner.scan_string(VALUE_STOPS)?)
            }
            Some(_) => return Err(self.scanner.error("unexpected character in value")),
            None => return Err(self.scanner.error("expected a value, found end of input")),
        };
        self.scanner.try_consume(b',');
        Ok(value)
    }

    fn parse_number(&mut self) -> Result<Value<'a>> {
        if self.scanner.number_is_hex() {
            return Ok(Value::Int(self.scanner.parse_hex()?));
        }
        if self.scanner.number_is_float() {
            Ok(Value::Double(self.scanner.parse_float()?))
        } else {
            Ok(Value::Int(self.scanner.parse_int()?))
        }
    }

    /// `[<count>] { v0, v1, ... }`. The declared count must match.
    fn parse_array(&mut self) -> Result<Vec<Value<'a>>> {
        let start = self.scanner.position();
        self.scanner.expect(b'[')?;
        let count = self.scanner.parse_int()?;
        if count < 0 {
            return Err(self
                .scanner
                .error_at(start, format!("negative array length {count}")));
        }
        let count = count as usize;
        self.scanner.expect(b']')?;
        self.scanner.expect(b'{')?;
        self.enter()?;

        // An untrusted count must not drive the allocation.
        let mut items: Vec<Value<'a>> = Vec::with_capacity(count.min(1024));
        loop {
            if self.scanner.try_consume(b'}') {
                break;
            }
            if self.scanner.peek().is_none() {
                return Err(self.scanner.error("unterminated array, expected `}`"));
            }
            if items.len() == count {
                return Err(self.scanner.error_at(
                    start,
                    format!("array declares {count} elements but has more"),
                ));
            }
            items.push(self.parse_value()?);
        }

        if items.len() != count {
            return Err(self.scanner.error_at(
                start,
                format!(
                    "array declares {count} elements but has {}",
                    items.len()
                ),
            ));
        }
        self.leave();
        Ok(items)
    }
}
