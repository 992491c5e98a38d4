use std::borrow::Cow;

/// Type tag of a parsed value, as reported by `Kv::key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Null,
    Int,
    Double,
    String,
    Array,
    Object,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Int => "int",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::Array => "array",
            ValueType::Object => "object",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw text of a string value: the bytes between the quotes, escapes intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawStr<'a> {
    pub text: &'a str,
    pub escaped: bool,
}

impl<'a> RawStr<'a> {
    pub fn plain(text: &'a str) -> Self {
        Self {
            text,
            escaped: false,
        }
    }

    /// Resolve escapes. Borrows from the input when there are none.
    pub fn unescape(&self) -> Cow<'a, str> {
        if !self.escaped {
            return Cow::Borrowed(self.text);
        }
        let mut out = String::with_capacity(self.text.len());
        let mut chars = self.text.chars();
        while let Some(ch) = chars.next() {
            if ch != '\\' {
                out.push(ch);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        }
        Cow::Owned(out)
    }

    /// Compare against unescaped text without allocating in the common case.
    pub fn matches(&self, value: &str) -> bool {
        if self.escaped {
            self.unescape() == value
        } else {
            self.text == value
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Null,
    Int(i64),
    Double(f64),
    String(RawStr<'a>),
    Array(Vec<Value<'a>>),
    Object(usize),
}

impl<'a> Value<'a> {
    pub fn kind(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Int(_) => ValueType::Int,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Array(_) => ValueType::Array,
            Value::Object(_) => ValueType::Object,
        }
    }

    pub fn as_object(&self) -> Option<usize> {
        match self {
            Value::Object(index) => Some(*index),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value<'a>]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<RawStr<'a>> {
        match self {
            Value::String(raw) => Some(*raw),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field<'a> {
    pub key: &'a str,
    pub value: Value<'a>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object<'a> {
    pub parent: Option<usize>,
    pub fields: Vec<Field<'a>>,
}

impl<'a> Object<'a> {
    pub fn find(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.key == key)
    }

    pub fn get(&self, key: &str) -> Option<&Value<'a>> {
        self.find(key).map(|index| &self.fields[index].value)
    }
}

/// A fully parsed document: the input text plus a flat object arena.
/// Object 0 is always the root.
#[derive(Debug, Clone)]
pub struct Document<'a> {
    pub input: &'a str,
    pub objects: Vec<Object<'a>>,
}

impl<'a> Document<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            objects: Vec::new(),
        }
    }

    pub fn root(&self) -> Option<&Object<'a>> {
        self.objects.first()
    }

    pub fn object(&self, index: usize) -> Option<&Object<'a>> {
        self.objects.get(index)
    }

    pub fn field(&self, object: usize, field: usize) -> Option<&Field<'a>> {
        self.objects.get(object)?.fields.get(field)
    }

    /// Number of `parent` hops from `index` up to the root.
    pub fn depth(&self, index: usize) -> Option<usize> {
        let mut depth = 0;
        let mut current = self.objects.get(index)?;
        while let Some(parent) = current.parent {
            depth += 1;
            current = self.objects.get(parent)?;
            if depth > self.objects.len() {
                return None;
            }
        }
        Some(depth)
    }

    pub(crate) fn push_object(&mut self) -> usize {
        self.objects.push(Object::default());
        self.objects.len() - 1
    }

    /// Link every object reachable from `value` (through nested arrays too)
    /// to `parent`.
    pub(crate) fn adopt(&mut self, value: &Value<'a>, parent: usize) {
        match value {
            Value::Object(index) => {
                if let Some(object) = self.objects.get_mut(*index) {
                    object.parent = Some(parent);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.adopt(item, parent);
                }
            }
            _ => {}
        }
    }
}
