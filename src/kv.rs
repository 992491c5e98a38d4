use std::borrow::Cow;

use smallvec::SmallVec;
use smol_str::SmolStr;
use tracing::{debug, trace};

use crate::arena::{Document, Value, ValueType};
use crate::chain::{Chain, Hit, KeyMatch};
use crate::constants::{FALSE_LITERAL, TRUE_LITERAL};
use crate::decode;
use crate::encode::{decode_blob, encode_blob, Writer};
use crate::val::KvVal;
use crate::{Error, ReadOptions, Result, WriteOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvMode {
    Read,
    Write,
}

#[derive(Debug)]
enum Mode<'a> {
    Read(Document<'a>),
    Write(Writer),
}

/// Position inside an array being read. `path` walks from the field that
/// holds the outermost array down through nested arrays.
#[derive(Debug, Clone)]
struct ArrayCursor {
    hit: Hit,
    path: SmallVec<[usize; 4]>,
    next: usize,
    len: usize,
}

#[derive(Debug, Clone)]
enum ReadScope {
    Object,
    Array(ArrayCursor),
}

#[derive(Debug, Clone)]
struct PendingMatch {
    key: SmolStr,
    found: KeyMatch,
}

/// A KV document in either read or write mode.
///
/// The same sequence of calls serializes a value in write mode and fills it
/// back in read mode:
///
/// ```
/// use kvdoc::Kv;
///
/// fn visit(kv: &mut Kv<'_>, hp: &mut i32, name: &mut String) -> kvdoc::Result<()> {
///     kv.key("hp")?;
///     kv.val_i32(hp)?;
///     kv.key("name")?;
///     kv.val_string(name)
/// }
///
/// let mut writer = Kv::write();
/// visit(&mut writer, &mut 10, &mut "slime".to_string()).unwrap();
/// let text = writer.into_buffer().unwrap();
/// assert_eq!(text, "hp = 10,\nname = \"slime\",\n");
///
/// let mut reader = Kv::read(&text).unwrap();
/// let (mut hp, mut name) = (0, String::new());
/// visit(&mut reader, &mut hp, &mut name).unwrap();
/// assert_eq!((hp, name.as_str()), (10, "slime"));
/// ```
///
/// A document may have a base (see [`Kv::set_base`]). Reads fall back to
/// the base for missing fields, and writes leave out fields whose value
/// equals the base.
#[derive(Debug)]
pub struct Kv<'a> {
    mode: Mode<'a>,
    chain: Chain<'a>,
    scopes: Vec<ReadScope>,
    matched: Option<PendingMatch>,
    error: Option<Error>,
}

macro_rules! int_accessors {
    ($($name:ident => $ty:ty),* $(,)?) => {$(
        pub fn $name(&mut self, value: &mut $ty) -> Result<()> {
            if self.is_writing() {
                let wide = i64::from(*value);
                self.write_value(|base| same_int(base, wide), |writer| writer.write_i64(wide))
            } else {
                *value = self.read_value(stringify!($ty), read_int::<$ty>)?;
                Ok(())
            }
        }
    )*};
}

impl<'a> Kv<'a> {
    pub fn read(input: &'a str) -> Result<Self> {
        Self::read_with_options(input, &ReadOptions::default())
    }

    pub fn read_bytes(input: &'a [u8]) -> Result<Self> {
        let doc = decode::parse_bytes(input, &ReadOptions::default())?;
        Ok(Self::with_mode(Mode::Read(doc)))
    }

    pub fn read_with_options(input: &'a str, options: &ReadOptions) -> Result<Self> {
        let doc = decode::parse(input, options)?;
        Ok(Self::with_mode(Mode::Read(doc)))
    }

    pub fn write() -> Self {
        Self::write_with_options(&WriteOptions::default())
    }

    pub fn write_with_options(options: &WriteOptions) -> Self {
        Self::with_mode(Mode::Write(Writer::new(options)))
    }

    fn with_mode(mode: Mode<'a>) -> Self {
        Self {
            mode,
            chain: Chain::new(),
            scopes: Vec::new(),
            matched: None,
            error: None,
        }
    }

    pub fn mode(&self) -> KvMode {
        match self.mode {
            Mode::Read(_) => KvMode::Read,
            Mode::Write(_) => KvMode::Write,
        }
    }

    fn is_writing(&self) -> bool {
        matches!(self.mode, Mode::Write(_))
    }

    /// The parsed document, in read mode.
    pub fn document(&self) -> Option<&Document<'a>> {
        match &self.mode {
            Mode::Read(doc) => Some(doc),
            Mode::Write(_) => None,
        }
    }

    /// Base documents, nearest first.
    pub fn bases(&self) -> impl Iterator<Item = &'a Document<'a>> + '_ {
        self.chain.base_docs()
    }

    /// The first parse, misuse or encode error. Once set, every call
    /// returns it.
    pub fn last_error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn check(&self) -> Result<()> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_sticky() && self.error.is_none() {
                self.error = Some(err.clone());
            }
        }
        result
    }

    fn open_scopes(&self) -> usize {
        match &self.mode {
            Mode::Read(_) => self.scopes.len(),
            Mode::Write(writer) => writer.open_scopes(),
        }
    }

    /// Text written so far, or the input in read mode.
    pub fn as_str(&self) -> &str {
        match &self.mode {
            Mode::Read(doc) => doc.input,
            Mode::Write(writer) => writer.as_str(),
        }
    }

    pub fn size_written(&self) -> usize {
        match &self.mode {
            Mode::Read(_) => 0,
            Mode::Write(writer) => writer.len(),
        }
    }

    /// The finished text. Fails on a sticky error or while a scope is open.
    pub fn buffer(&self) -> Result<&str> {
        self.check()?;
        match &self.mode {
            Mode::Read(doc) => Ok(doc.input),
            Mode::Write(writer) => {
                writer.check_complete()?;
                Ok(writer.as_str())
            }
        }
    }

    pub fn into_buffer(self) -> Result<String> {
        self.check()?;
        match self.mode {
            Mode::Read(doc) => Ok(doc.input.to_string()),
            Mode::Write(writer) => {
                writer.check_complete()?;
                debug!(bytes = writer.len(), "finished kv document");
                Ok(writer.into_string())
            }
        }
    }

    /// Use `base` as the fallback and diff reference for this document.
    /// The base's own bases follow it in the chain. Replaces any earlier
    /// chain.
    pub fn set_base(&mut self, base: &'a Kv<'a>) -> Result<()> {
        self.check()?;
        let result = self.attach_base(base);
        self.track(result)
    }

    fn attach_base(&mut self, base: &'a Kv<'a>) -> Result<()> {
        let Mode::Read(doc) = &base.mode else {
            return Err(Error::misuse("a base document must be in read mode"));
        };
        if self.open_scopes() > 0 {
            return Err(Error::misuse("set_base called while a scope is open"));
        }
        self.chain
            .set_bases(std::iter::once(doc).chain(base.chain.base_docs()));
        self.scopes.clear();
        self.matched = None;
        debug!(depth = self.chain.depth(), "attached base chain");
        Ok(())
    }

    /// Rewind every read cursor to the root so the document can be read
    /// again. Sticky errors are kept.
    pub fn reset_read_state(&mut self) -> Result<()> {
        if self.is_writing() {
            return Err(Error::misuse("reset_read_state called in write mode"));
        }
        self.scopes.clear();
        self.matched = None;
        self.chain.reset();
        Ok(())
    }

    /// Select the field `name` for the next value or scope call.
    ///
    /// In read mode this returns the type of the matched value, looking in
    /// the document first and then in its bases. In write mode it writes
    /// the key and returns [`ValueType::Null`].
    pub fn key(&mut self, name: &str) -> Result<ValueType> {
        self.check()?;
        let result = self.match_key(name);
        self.track(result)
    }

    fn match_key(&mut self, name: &str) -> Result<ValueType> {
        self.matched = None;
        match &mut self.mode {
            Mode::Write(writer) => {
                writer.write_key(name)?;
                let found = self.chain.match_key(None, name);
                self.matched = Some(PendingMatch {
                    key: SmolStr::new(name),
                    found,
                });
                Ok(ValueType::Null)
            }
            Mode::Read(doc) => {
                let doc = &*doc;
                if matches!(self.scopes.last(), Some(ReadScope::Array(_))) {
                    return Err(Error::lookup("cannot look up a key while reading array elements")
                        .with_key(name));
                }
                let found = self.chain.match_key(Some(doc), name);
                let kind = found
                    .hits()
                    .find_map(|hit| self.chain.value(Some(doc), hit))
                    .map(Value::kind)
                    .ok_or_else(|| Error::lookup("no field matches key").with_key(name))?;
                self.matched = Some(PendingMatch {
                    key: SmolStr::new(name),
                    found,
                });
                Ok(kind)
            }
        }
    }

    fn read_value<T>(
        &mut self,
        expected: &str,
        convert: impl FnMut(&Value<'a>) -> Option<Result<T>>,
    ) -> Result<T> {
        self.check()?;
        let result = self.take_value(expected, convert);
        self.track(result)
    }

    fn take_value<T>(
        &mut self,
        expected: &str,
        mut convert: impl FnMut(&Value<'a>) -> Option<Result<T>>,
    ) -> Result<T> {
        let Mode::Read(doc) = &self.mode else {
            return Err(Error::misuse("cannot read a value in write mode"));
        };
        let own = Some(doc);

        if let Some(ReadScope::Array(cursor)) = self.scopes.last_mut() {
            let (index, value) = next_element(&self.chain, own, cursor)?;
            return convert(value).unwrap_or_else(|| {
                Err(Error::lookup(format!(
                    "array element {index} is {}, expected {expected}",
                    value.kind()
                )))
            });
        }

        let pending = self
            .matched
            .take()
            .ok_or_else(|| Error::lookup("no key was matched before reading a value"))?;
        let mut found = None;
        for hit in pending.found.hits() {
            let Some(value) = self.chain.value(own, hit) else {
                continue;
            };
            if let Some(result) = convert(value) {
                return result.map_err(|err| err.with_key(&pending.key));
            }
            found.get_or_insert(value.kind());
        }
        Err(Error::lookup(format!(
            "field is {}, expected {expected}",
            found.unwrap_or(ValueType::Null)
        ))
        .with_key(&pending.key))
    }

    fn write_value(
        &mut self,
        same_as_base: impl FnOnce(&Value<'a>) -> bool,
        write: impl FnOnce(&mut Writer) -> Result<()>,
    ) -> Result<()> {
        self.check()?;
        let result = self.emit(same_as_base, write);
        self.track(result)
    }

    fn emit(
        &mut self,
        same_as_base: impl FnOnce(&Value<'a>) -> bool,
        write: impl FnOnce(&mut Writer) -> Result<()>,
    ) -> Result<()> {
        let pending = self.matched.take();
        let Mode::Write(writer) = &mut self.mode else {
            return Err(Error::misuse("cannot write a value in read mode"));
        };
        if let Some(pending) = pending.filter(|_| writer.has_pending_key()) {
            let base = pending
                .found
                .base
                .and_then(|hit| self.chain.value(None, hit));
            if base.is_some_and(same_as_base) {
                writer.retract_key();
                trace!(key = %pending.key, "value equals base, field omitted");
                return Ok(());
            }
        }
        write(writer)
    }

    int_accessors! {
        val_i8 => i8,
        val_i16 => i16,
        val_i32 => i32,
        val_i64 => i64,
        val_u8 => u8,
        val_u16 => u16,
        val_u32 => u32,
    }

    /// Values above `i64::MAX` are stored as their two's complement bit
    /// pattern.
    pub fn val_u64(&mut self, value: &mut u64) -> Result<()> {
        if self.is_writing() {
            let v = *value;
            self.write_value(|base| same_int(base, v as i64), |writer| writer.write_u64(v))
        } else {
            *value = self.read_value("u64", read_u64)?;
            Ok(())
        }
    }

    pub fn val_f32(&mut self, value: &mut f32) -> Result<()> {
        if self.is_writing() {
            let v = *value;
            self.write_value(|base| same_f32(base, v), |writer| writer.write_f32(v))
        } else {
            *value = self.read_value("f32", |v| read_f64(v).map(|r| r.map(|d| d as f32)))?;
            Ok(())
        }
    }

    pub fn val_f64(&mut self, value: &mut f64) -> Result<()> {
        if self.is_writing() {
            let v = *value;
            self.write_value(|base| same_f64(base, v), |writer| writer.write_f64(v))
        } else {
            *value = self.read_value("f64", read_f64)?;
            Ok(())
        }
    }

    /// Booleans travel as the strings `true` and `false`. Any other string
    /// reads as `false`.
    pub fn val_bool(&mut self, value: &mut bool) -> Result<()> {
        if self.is_writing() {
            let literal = if *value { TRUE_LITERAL } else { FALSE_LITERAL };
            self.write_value(|base| same_str(base, literal), |writer| writer.write_str(literal))
        } else {
            *value = self.read_value("string", |v| {
                v.as_str().map(|raw| Ok(raw.matches(TRUE_LITERAL)))
            })?;
            Ok(())
        }
    }

    pub fn val_string(&mut self, value: &mut String) -> Result<()> {
        if self.is_writing() {
            let text = value.as_str();
            self.write_value(|base| same_str(base, text), |writer| writer.write_str(text))
        } else {
            *value = self.read_value("string", |v| {
                v.as_str().map(|raw| Ok(raw.unescape().into_owned()))
            })?;
            Ok(())
        }
    }

    /// Like [`Kv::val_string`], but borrows from the input when the string
    /// has no escapes.
    pub fn val_str(&mut self, value: &mut Cow<'a, str>) -> Result<()> {
        if self.is_writing() {
            let text: &str = value;
            self.write_value(|base| same_str(base, text), |writer| writer.write_str(text))
        } else {
            *value = self.read_value("string", |v| v.as_str().map(|raw| Ok(raw.unescape())))?;
            Ok(())
        }
    }

    /// Binary data, stored as a base64 string.
    pub fn val_blob(&mut self, value: &mut Vec<u8>) -> Result<()> {
        if self.is_writing() {
            let bytes = value.as_slice();
            self.write_value(
                |base| {
                    base.as_str()
                        .and_then(|raw| decode_blob(&raw.unescape()).ok())
                        .is_some_and(|decoded| decoded == bytes)
                },
                |writer| writer.write_str(&encode_blob(bytes)),
            )
        } else {
            *value = self.read_value("string", |v| {
                v.as_str().map(|raw| decode_blob(&raw.unescape()))
            })?;
            Ok(())
        }
    }

    pub fn val<T: KvVal<'a>>(&mut self, value: &mut T) -> Result<()> {
        value.kv_val(self)
    }

    /// `key` followed by `val`.
    pub fn field<T: KvVal<'a>>(&mut self, key: &str, value: &mut T) -> Result<()> {
        self.key(key)?;
        value.kv_val(self)
    }

    /// Open an object scope. With `None`, uses the key from the last
    /// [`Kv::key`] call, or the next element when inside an array.
    pub fn object_begin(&mut self, key: Option<&str>) -> Result<()> {
        self.check()?;
        if let Some(key) = key {
            self.key(key)?;
        }
        let result = self.open_object();
        self.track(result)
    }

    fn open_object(&mut self) -> Result<()> {
        let pending = self.matched.take();
        match &mut self.mode {
            Mode::Write(writer) => {
                let base_is_object = pending
                    .as_ref()
                    .and_then(|pending| pending.found.base)
                    .and_then(|hit| self.chain.value(None, hit))
                    .is_some_and(|value| value.kind() == ValueType::Object);
                writer.begin_object(base_is_object)?;
                let entered =
                    pending.is_some_and(|pending| !self.chain.enter(None, &pending.key).is_empty());
                if !entered {
                    self.chain.skip_all();
                }
                Ok(())
            }
            Mode::Read(doc) => {
                let doc = &*doc;
                if let Some(pending) = pending {
                    if self.chain.enter(Some(doc), &pending.key).is_empty() {
                        return Err(Error::lookup("field is not an object").with_key(&pending.key));
                    }
                    self.scopes.push(ReadScope::Object);
                    return Ok(());
                }
                let Some(ReadScope::Array(cursor)) = self.scopes.last_mut() else {
                    return Err(Error::misuse(
                        "object_begin needs a key when not reading an array",
                    ));
                };
                let layer = cursor.hit.layer;
                let (index, value) = next_element(&self.chain, Some(doc), cursor)?;
                let object = value.as_object().ok_or_else(|| {
                    Error::lookup(format!(
                        "array element {index} is {}, expected object",
                        value.kind()
                    ))
                })?;
                self.chain.enter_element(layer, object);
                self.scopes.push(ReadScope::Object);
                Ok(())
            }
        }
    }

    pub fn object_end(&mut self) -> Result<()> {
        self.check()?;
        let result = self.close_object();
        self.track(result)
    }

    fn close_object(&mut self) -> Result<()> {
        self.matched = None;
        match &mut self.mode {
            Mode::Write(writer) => {
                if writer.end_object()? {
                    trace!("object equals base, omitted");
                }
                self.chain.leave(None)
            }
            Mode::Read(doc) => {
                match self.scopes.last() {
                    Some(ReadScope::Object) => {}
                    Some(ReadScope::Array(_)) => {
                        return Err(Error::misuse("object_end called while an array is open"))
                    }
                    None => {
                        return Err(Error::misuse(
                            "object_end called without a matching object_begin",
                        ))
                    }
                }
                self.scopes.pop();
                self.chain.leave(Some(&*doc))
            }
        }
    }

    /// Open an array scope. In write mode `count` is the number of
    /// elements about to be written; in read mode it is set to the number
    /// of elements present.
    pub fn array_begin(&mut self, count: &mut usize, key: Option<&str>) -> Result<()> {
        self.check()?;
        if let Some(key) = key {
            self.key(key)?;
        }
        let result = self.open_array(*count);
        *count = self.track(result)?;
        Ok(())
    }

    fn open_array(&mut self, count: usize) -> Result<usize> {
        let pending = self.matched.take();
        match &mut self.mode {
            Mode::Write(writer) => {
                writer.begin_array(count)?;
                Ok(count)
            }
            Mode::Read(doc) => {
                let doc = &*doc;
                if let Some(pending) = pending {
                    let (hit, len) = pending
                        .found
                        .hits()
                        .find_map(|hit| {
                            self.chain
                                .value(Some(doc), hit)
                                .and_then(Value::as_array)
                                .map(|items| (hit, items.len()))
                        })
                        .ok_or_else(|| {
                            Error::lookup("field is not an array").with_key(&pending.key)
                        })?;
                    self.scopes.push(ReadScope::Array(ArrayCursor {
                        hit,
                        path: SmallVec::new(),
                        next: 0,
                        len,
                    }));
                    return Ok(len);
                }
                let Some(ReadScope::Array(cursor)) = self.scopes.last_mut() else {
                    return Err(Error::misuse(
                        "array_begin needs a key when not reading an array",
                    ));
                };
                let (index, value) = next_element(&self.chain, Some(doc), cursor)?;
                let len = value.as_array().map(<[Value<'a>]>::len).ok_or_else(|| {
                    Error::lookup(format!(
                        "array element {index} is {}, expected array",
                        value.kind()
                    ))
                })?;
                let hit = cursor.hit;
                let mut path = cursor.path.clone();
                path.push(index);
                self.scopes.push(ReadScope::Array(ArrayCursor {
                    hit,
                    path,
                    next: 0,
                    len,
                }));
                Ok(len)
            }
        }
    }

    pub fn array_end(&mut self) -> Result<()> {
        self.check()?;
        let result = self.close_array();
        self.track(result)
    }

    fn close_array(&mut self) -> Result<()> {
        self.matched = None;
        match &mut self.mode {
            Mode::Write(writer) => writer.end_array(),
            Mode::Read(_) => match self.scopes.last() {
                Some(ReadScope::Array(_)) => {
                    self.scopes.pop();
                    Ok(())
                }
                Some(ReadScope::Object) => {
                    Err(Error::misuse("array_end called while an object is open"))
                }
                None => Err(Error::misuse(
                    "array_end called without a matching array_begin",
                )),
            },
        }
    }
}

fn array_items<'s, 'a>(
    chain: &'s Chain<'a>,
    own: Option<&'s Document<'a>>,
    hit: Hit,
    path: &[usize],
) -> Option<&'s [Value<'a>]> {
    let mut items = chain.value(own, hit)?.as_array()?;
    for &index in path {
        items = items.get(index)?.as_array()?;
    }
    Some(items)
}

fn next_element<'s, 'a>(
    chain: &'s Chain<'a>,
    own: Option<&'s Document<'a>>,
    cursor: &mut ArrayCursor,
) -> Result<(usize, &'s Value<'a>)> {
    let items = array_items(chain, own, cursor.hit, &cursor.path)
        .ok_or_else(|| Error::misuse("array scope no longer resolves to an array"))?;
    let index = cursor.next;
    let value = items.get(index).ok_or_else(|| {
        Error::lookup(format!(
            "array has {} elements, cannot read element {index}",
            cursor.len
        ))
    })?;
    cursor.next += 1;
    Ok((index, value))
}

fn double_to_i64(value: f64) -> Option<i64> {
    let whole = value.trunc();
    (whole.is_finite() && (-9_223_372_036_854_775_808.0..9_223_372_036_854_775_808.0).contains(&whole))
        .then_some(whole as i64)
}

fn read_int<T: TryFrom<i64>>(value: &Value<'_>) -> Option<Result<T>> {
    let wide = match *value {
        Value::Int(v) => v,
        Value::Double(d) => match double_to_i64(d) {
            Some(v) => v,
            None => {
                return Some(Err(Error::lookup(format!(
                    "{d} is out of range for {}",
                    std::any::type_name::<T>()
                ))))
            }
        },
        _ => return None,
    };
    Some(T::try_from(wide).map_err(|_| {
        Error::lookup(format!(
            "{wide} is out of range for {}",
            std::any::type_name::<T>()
        ))
    }))
}

fn read_u64(value: &Value<'_>) -> Option<Result<u64>> {
    match *value {
        Value::Int(v) => Some(Ok(v as u64)),
        Value::Double(d) => {
            let whole = d.trunc();
            Some(if whole.is_finite() && (0.0..18_446_744_073_709_551_616.0).contains(&whole) {
                Ok(whole as u64)
            } else {
                Err(Error::lookup(format!("{d} is out of range for u64")))
            })
        }
        _ => None,
    }
}

fn read_f64(value: &Value<'_>) -> Option<Result<f64>> {
    match *value {
        Value::Double(d) => Some(Ok(d)),
        Value::Int(v) => Some(Ok(v as f64)),
        _ => None,
    }
}

fn same_int(base: &Value<'_>, value: i64) -> bool {
    match *base {
        Value::Int(b) => b == value,
        Value::Double(d) => d == value as f64,
        _ => false,
    }
}

fn same_f64(base: &Value<'_>, value: f64) -> bool {
    match *base {
        Value::Double(d) => d == value,
        Value::Int(i) => i as f64 == value,
        _ => false,
    }
}

fn same_f32(base: &Value<'_>, value: f32) -> bool {
    match *base {
        Value::Double(d) => d as f32 == value,
        Value::Int(i) => i as f32 == value,
        _ => false,
    }
}

fn same_str(base: &Value<'_>, value: &str) -> bool {
    base.as_str().is_some_and(|raw| raw.matches(value))
}
