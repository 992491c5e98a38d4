use crate::constants::{is_bare_key, is_space};
use crate::{Error, FloatFormat, Result, WriteOptions};

use super::{push_f32, push_f64, push_i64, push_quoted, push_u64};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArrayState {
    NotInArray,
    FirstElement,
    Subsequent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Object,
    Array,
}

#[derive(Debug, Clone)]
struct WriteScope {
    kind: ScopeKind,
    state: ArrayState,
    declared: usize,
    written: usize,
    /// Start of the key that opened this object, when an empty body may be
    /// dropped along with it.
    retract_from: Option<usize>,
    body_start: usize,
}

/// Text buffer for write mode. Tracks indentation, the array-context stack
/// and the bytes of the key written last so that a field can be retracted.
#[derive(Debug, Clone)]
pub struct Writer {
    buffer: String,
    indent_unit: String,
    float_format: FloatFormat,
    depth: usize,
    scopes: Vec<WriteScope>,
    pending_key: Option<usize>,
}

impl Writer {
    pub fn new(options: &WriteOptions) -> Self {
        Self {
            buffer: String::new(),
            indent_unit: options.indent.unit(),
            float_format: options.float_format,
            depth: 0,
            scopes: Vec::new(),
            pending_key: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_string(self) -> String {
        self.buffer
    }

    pub fn open_scopes(&self) -> usize {
        self.scopes.len()
    }

    pub fn in_array(&self) -> bool {
        self.state() != ArrayState::NotInArray
    }

    pub fn has_pending_key(&self) -> bool {
        self.pending_key.is_some()
    }

    fn state(&self) -> ArrayState {
        self.scopes
            .last()
            .map_or(ArrayState::NotInArray, |scope| scope.state)
    }

    fn write_indent(&mut self) {
        for _ in 0..self.depth {
            self.buffer.push_str(&self.indent_unit);
        }
    }

    /// Append `key = ` and remember where it started.
    pub fn write_key(&mut self, key: &str) -> Result<()> {
        if self.in_array() {
            return Err(Error::misuse("cannot write a key inside an array").with_key(key));
        }
        if self.pending_key.is_some() {
            return Err(Error::misuse("previous key has no value").with_key(key));
        }
        let start = self.buffer.len();
        if is_bare_key(key) {
            self.buffer.push_str(key);
        } else if key.contains(['"', '\\']) {
            return Err(Error::encode("keys cannot contain `\"` or `\\`").with_key(key));
        } else {
            push_quoted(&mut self.buffer, key);
        }
        self.buffer.push_str(" = ");
        self.pending_key = Some(start);
        Ok(())
    }

    /// Drop the pending key from the buffer. Returns false when there was
    /// none.
    pub fn retract_key(&mut self) -> bool {
        match self.pending_key.take() {
            Some(start) => {
                self.buffer.truncate(start);
                true
            }
            None => false,
        }
    }

    /// Claim the slot for the next value: a key outside arrays, an element
    /// inside them.
    fn claim_slot(&mut self) -> Result<()> {
        match self.scopes.last_mut() {
            Some(scope) if scope.kind == ScopeKind::Array => {
                if scope.written == scope.declared {
                    return Err(Error::misuse(format!(
                        "array declared {} elements, cannot write more",
                        scope.declared
                    )));
                }
                scope.written += 1;
                Ok(())
            }
            _ if self.pending_key.is_some() => Ok(()),
            _ => Err(Error::misuse("a key must be written before a value outside an array")),
        }
    }

    fn begin_value(&mut self) -> Result<()> {
        self.claim_slot()?;
        self.separate_element();
        Ok(())
    }

    /// Advance the enclosing array past its first element. Later elements
    /// get a space unless a closed scope already left a line break.
    fn separate_element(&mut self) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        match scope.state {
            ArrayState::FirstElement => scope.state = ArrayState::Subsequent,
            ArrayState::Subsequent => {
                if !self.buffer.ends_with(|ch: char| ch.is_ascii() && is_space(ch as u8)) {
                    self.buffer.push(' ');
                }
            }
            ArrayState::NotInArray => {}
        }
    }

    fn end_value(&mut self) {
        self.pending_key = None;
        self.buffer.push(',');
        if !self.in_array() {
            self.buffer.push('\n');
            self.write_indent();
        }
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.begin_value()?;
        push_i64(&mut self.buffer, value);
        self.end_value();
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.begin_value()?;
        push_u64(&mut self.buffer, value);
        self.end_value();
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.begin_value()?;
        push_f32(&mut self.buffer, value, self.float_format)?;
        self.end_value();
        Ok(())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.begin_value()?;
        push_f64(&mut self.buffer, value, self.float_format)?;
        self.end_value();
        Ok(())
    }

    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.begin_value()?;
        push_quoted(&mut self.buffer, value);
        self.end_value();
        Ok(())
    }

    fn begin_scope(&mut self, kind: ScopeKind, declared: usize, retractable: bool) -> Result<()> {
        self.claim_slot()?;
        self.separate_element();
        let retract_from = if retractable { self.pending_key } else { None };
        self.pending_key = None;
        self.depth += 1;
        let state = match kind {
            ScopeKind::Object => {
                self.buffer.push_str("{\n");
                ArrayState::NotInArray
            }
            ScopeKind::Array => {
                self.buffer.push('[');
                push_u64(&mut self.buffer, declared as u64);
                self.buffer.push_str("] {\n");
                ArrayState::FirstElement
            }
        };
        self.write_indent();
        self.scopes.push(WriteScope {
            kind,
            state,
            declared,
            written: 0,
            retract_from,
            body_start: self.buffer.len(),
        });
        Ok(())
    }

    fn end_scope(&mut self, kind: ScopeKind) -> Result<WriteScope> {
        if self.pending_key.is_some() {
            return Err(Error::misuse("scope closed while a key is waiting for its value"));
        }
        match self.scopes.last() {
            Some(scope) if scope.kind == kind => {}
            Some(_) => {
                return Err(Error::misuse(match kind {
                    ScopeKind::Object => "object_end called while an array is open",
                    ScopeKind::Array => "array_end called while an object is open",
                }))
            }
            None => {
                return Err(Error::misuse(match kind {
                    ScopeKind::Object => "object_end called without a matching object_begin",
                    ScopeKind::Array => "array_end called without a matching array_begin",
                }))
            }
        }
        let scope = self.scopes.pop().ok_or_else(|| Error::misuse("no open scope"))?;
        self.depth -= 1;
        Ok(scope)
    }

    /// `retractable` marks a keyed object that a base layer also has: if
    /// nothing ends up inside it, the key and braces are removed again.
    pub fn begin_object(&mut self, retractable: bool) -> Result<()> {
        self.begin_scope(ScopeKind::Object, 0, retractable)
    }

    /// Returns true when the object was empty and got retracted.
    pub fn end_object(&mut self) -> Result<bool> {
        let scope = self.end_scope(ScopeKind::Object)?;
        if let Some(start) = scope.retract_from {
            if self.buffer.len() == scope.body_start {
                self.buffer.truncate(start);
                return Ok(true);
            }
        }
        if self.buffer.ends_with(self.indent_unit.as_str()) {
            let len = self.buffer.len() - self.indent_unit.len();
            self.buffer.truncate(len);
        }
        self.buffer.push_str("},\n");
        self.write_indent();
        Ok(false)
    }

    pub fn begin_array(&mut self, count: usize) -> Result<()> {
        self.begin_scope(ScopeKind::Array, count, false)
    }

    pub fn end_array(&mut self) -> Result<()> {
        if let Some(scope) = self.scopes.last() {
            if scope.kind == ScopeKind::Array && scope.written != scope.declared {
                return Err(Error::misuse(format!(
                    "array declared {} elements but {} were written",
                    scope.declared, scope.written
                )));
            }
        }
        self.end_scope(ScopeKind::Array)?;
        let trimmed = self
            .buffer
            .trim_end_matches(|ch: char| ch.is_ascii() && is_space(ch as u8))
            .len();
        self.buffer.truncate(trimmed);
        self.buffer.push('\n');
        self.write_indent();
        self.buffer.push_str("},\n");
        self.write_indent();
        Ok(())
    }

    /// Fails while a scope or key is still open.
    pub fn check_complete(&self) -> Result<()> {
        if let Some(scope) = self.scopes.last() {
            return Err(Error::misuse(match scope.kind {
                ScopeKind::Object => "document finished with an unclosed object",
                ScopeKind::Array => "document finished with an unclosed array",
            }));
        }
        if self.pending_key.is_some() {
            return Err(Error::misuse("document finished with a key that has no value"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, Indent};

    fn writer() -> Writer {
        Writer::new(&WriteOptions::default())
    }

    #[rstest::rstest]
    fn test_flat_fields() {
        let mut w = writer();
        w.write_key("a").unwrap();
        w.write_i64(5).unwrap();
        w.write_key("b").unwrap();
        w.write_f32(10.3).unwrap();
        w.write_key("str").unwrap();
        w.write_str("Hello.").unwrap();
        assert_eq!(w.as_str(), "a = 5,\nb = 10.300000,\nstr = \"Hello.\",\n");
        assert!(w.check_complete().is_ok());
    }

    #[rstest::rstest]
    fn test_nested_objects() {
        let mut w = writer();
        w.write_key("sub").unwrap();
        w.begin_object(false).unwrap();
        w.write_key("x").unwrap();
        w.write_i64(1).unwrap();
        w.write_key("deeper").unwrap();
        w.begin_object(false).unwrap();
        w.write_key("y").unwrap();
        w.write_i64(2).unwrap();
        w.end_object().unwrap();
        w.end_object().unwrap();
        w.write_key("z").unwrap();
        w.write_i64(3).unwrap();
        assert_eq!(
            w.as_str(),
            "sub = {\n\tx = 1,\n\tdeeper = {\n\t\ty = 2,\n\t},\n},\nz = 3,\n"
        );
    }

    #[rstest::rstest]
    fn test_arrays_and_nested_arrays() {
        let mut w = writer();
        w.write_key("list").unwrap();
        w.begin_array(3).unwrap();
        for i in 0..3 {
            w.write_i64(i).unwrap();
        }
        w.end_array().unwrap();
        w.write_key("grid").unwrap();
        w.begin_array(2).unwrap();
        for _ in 0..2 {
            w.begin_array(2).unwrap();
            w.write_i64(0).unwrap();
            w.write_i64(1).unwrap();
            w.end_array().unwrap();
        }
        w.end_array().unwrap();
        assert_eq!(
            w.as_str(),
            "list = [3] {\n\t0, 1, 2,\n},\ngrid = [2] {\n\t[2] {\n\t\t0, 1,\n\t},\n\t[2] {\n\t\t0, 1,\n\t},\n},\n"
        );
    }

    #[rstest::rstest]
    fn test_array_of_objects() {
        let mut w = writer();
        w.write_key("items").unwrap();
        w.begin_array(2).unwrap();
        for i in 0..2 {
            w.begin_object(false).unwrap();
            w.write_key("n").unwrap();
            w.write_i64(i).unwrap();
            w.end_object().unwrap();
        }
        w.end_array().unwrap();
        assert_eq!(
            w.as_str(),
            "items = [2] {\n\t{\n\t\tn = 0,\n\t},\n\t{\n\t\tn = 1,\n\t},\n},\n"
        );
    }

    #[rstest::rstest]
    fn test_mixed_array_separates_scopes() {
        let mut w = writer();
        w.write_key("mix").unwrap();
        w.begin_array(4).unwrap();
        w.write_i64(5).unwrap();
        w.begin_array(1).unwrap();
        w.write_i64(6).unwrap();
        w.end_array().unwrap();
        w.write_i64(7).unwrap();
        w.begin_object(false).unwrap();
        w.write_key("n").unwrap();
        w.write_i64(1).unwrap();
        w.end_object().unwrap();
        w.end_array().unwrap();
        assert_eq!(
            w.as_str(),
            "mix = [4] {\n\t5, [1] {\n\t\t6,\n\t},\n\t7, {\n\t\tn = 1,\n\t},\n},\n"
        );
        assert!(crate::decode::parse_document(w.as_str(), &crate::ReadOptions::default()).is_ok());
    }

    #[rstest::rstest]
    fn test_empty_array() {
        let mut w = writer();
        w.write_key("none").unwrap();
        w.begin_array(0).unwrap();
        w.end_array().unwrap();
        assert_eq!(w.as_str(), "none = [0] {\n},\n");
    }

    #[rstest::rstest]
    fn test_space_indent() {
        let mut w = Writer::new(&WriteOptions::default().with_indent(Indent::spaces(2)));
        w.write_key("sub").unwrap();
        w.begin_object(false).unwrap();
        w.write_key("x").unwrap();
        w.write_i64(1).unwrap();
        w.end_object().unwrap();
        assert_eq!(w.as_str(), "sub = {\n  x = 1,\n},\n");
    }

    #[rstest::rstest]
    fn test_retract_key() {
        let mut w = writer();
        w.write_key("a").unwrap();
        w.write_i64(1).unwrap();
        w.write_key("b").unwrap();
        assert!(w.retract_key());
        assert!(!w.retract_key());
        w.write_key("c").unwrap();
        w.write_i64(3).unwrap();
        assert_eq!(w.as_str(), "a = 1,\nc = 3,\n");
    }

    #[rstest::rstest]
    fn test_empty_retractable_object_is_dropped() {
        let mut w = writer();
        w.write_key("a").unwrap();
        w.write_i64(1).unwrap();
        w.write_key("sub").unwrap();
        w.begin_object(true).unwrap();
        w.write_key("same").unwrap();
        w.retract_key();
        assert!(w.end_object().unwrap());
        w.write_key("keep").unwrap();
        w.begin_object(true).unwrap();
        w.write_key("x").unwrap();
        w.write_i64(2).unwrap();
        assert!(!w.end_object().unwrap());
        assert_eq!(w.as_str(), "a = 1,\nkeep = {\n\tx = 2,\n},\n");
    }

    #[rstest::rstest]
    fn test_quoted_keys() {
        let mut w = writer();
        w.write_key("two words").unwrap();
        w.write_i64(1).unwrap();
        assert_eq!(w.as_str(), "\"two words\" = 1,\n");
        let err = w.write_key("bad\"key").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Encode);
    }

    #[rstest::rstest]
    fn test_misuse() {
        let mut w = writer();
        assert_eq!(w.write_i64(1).unwrap_err().kind, ErrorKind::Misuse);
        assert_eq!(w.end_object().unwrap_err().kind, ErrorKind::Misuse);
        assert_eq!(w.begin_object(false).unwrap_err().kind, ErrorKind::Misuse);

        w.write_key("list").unwrap();
        w.begin_array(1).unwrap();
        assert_eq!(w.write_key("x").unwrap_err().kind, ErrorKind::Misuse);
        assert_eq!(w.end_object().unwrap_err().kind, ErrorKind::Misuse);
        assert!(w.check_complete().is_err());
        w.write_i64(1).unwrap();
        assert_eq!(w.write_i64(2).unwrap_err().kind, ErrorKind::Misuse);
        w.end_array().unwrap();
        assert!(w.check_complete().is_ok());
    }

    #[rstest::rstest]
    fn test_short_array_is_misuse() {
        let mut w = writer();
        w.write_key("list").unwrap();
        w.begin_array(3).unwrap();
        w.write_i64(1).unwrap();
        let err = w.end_array().unwrap_err();
        assert!(err.message.contains("but 1 were written"));
    }
}
