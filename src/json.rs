//! JSON view of a parsed document merged with its base chain.
//!
//! Fields of the document come first, in their written order, followed by
//! base fields it does not override. Objects present in several layers are
//! merged recursively. Arrays and scalars come from the nearest layer only.

use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use smallvec::SmallVec;

use crate::arena::{Document, Value};
use crate::{Error, Kv, Result};

type Layers<'s, 'a> = SmallVec<[(&'s Document<'a>, usize); 4]>;

/// An object seen through every layer that has it, nearest first.
pub struct MergedObject<'s, 'a> {
    layers: Layers<'s, 'a>,
}

impl<'s, 'a> MergedObject<'s, 'a> {
    pub fn root(docs: impl IntoIterator<Item = &'s Document<'a>>) -> Self {
        Self {
            layers: docs
                .into_iter()
                .filter(|doc| doc.root().is_some())
                .map(|doc| (doc, 0))
                .collect(),
        }
    }

    /// Fields of every layer in output order. The first layer holding a key
    /// decides it; objects under that key in later layers merge into it.
    fn entries(&self) -> Vec<(&'a str, Entry<'s, 'a>)> {
        let mut entries: Vec<(&'a str, Entry<'s, 'a>)> = Vec::new();
        let mut slots: HashMap<&'a str, usize> = HashMap::new();
        for &(doc, object) in &self.layers {
            let Some(object) = doc.object(object) else {
                continue;
            };
            for field in &object.fields {
                if let Some(&slot) = slots.get(field.key) {
                    if let (Entry::Object(merged), Value::Object(index)) =
                        (&mut entries[slot].1, &field.value)
                    {
                        merged.layers.push((doc, *index));
                    }
                    continue;
                }
                let entry = match &field.value {
                    Value::Object(index) => Entry::Object(MergedObject {
                        layers: std::iter::once((doc, *index)).collect(),
                    }),
                    value => Entry::Value(ValueView { doc, value }),
                };
                slots.insert(field.key, entries.len());
                entries.push((field.key, entry));
            }
        }
        entries
    }
}

enum Entry<'s, 'a> {
    Value(ValueView<'s, 'a>),
    Object(MergedObject<'s, 'a>),
}

impl Serialize for Entry<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Entry::Value(view) => view.serialize(serializer),
            Entry::Object(object) => object.serialize(serializer),
        }
    }
}

impl Serialize for MergedObject<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let entries = self.entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, entry) in &entries {
            map.serialize_entry(key, entry)?;
        }
        map.end()
    }
}

/// A single value with no merging; objects inside it come from `doc` alone.
struct ValueView<'s, 'a> {
    doc: &'s Document<'a>,
    value: &'s Value<'a>,
}

impl Serialize for ValueView<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.value {
            Value::Null => serializer.serialize_unit(),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::String(raw) => serializer.serialize_str(&raw.unescape()),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for value in items {
                    seq.serialize_element(&ValueView {
                        doc: self.doc,
                        value,
                    })?;
                }
                seq.end()
            }
            Value::Object(index) => MergedObject {
                layers: std::iter::once((self.doc, *index)).collect(),
            }
            .serialize(serializer),
        }
    }
}

/// The merged view of a read-mode document.
pub fn view<'s, 'a>(kv: &'s Kv<'a>) -> Result<MergedObject<'s, 'a>> {
    let doc = kv
        .document()
        .ok_or_else(|| Error::misuse("only read-mode documents can be viewed as JSON"))?;
    let bases = kv.bases().map(|base| -> &'s Document<'a> { base });
    Ok(MergedObject::root(std::iter::once(doc).chain(bases)))
}

pub fn to_json(kv: &Kv<'_>) -> Result<serde_json::Value> {
    serde_json::to_value(view(kv)?).map_err(|err| Error::encode(format!("json failed: {err}")))
}
