//! Per-layer cursors over a document and its chain of bases.
//!
//! Layer 0 is the document being read or written. Layer `i > 0` is the
//! `i`-th base, nearest first. Each layer keeps its own current object, so
//! a patch may have a different shape than its base at any depth: a layer
//! that lacks a scope is skipped until that scope closes.

use smallvec::SmallVec;

use crate::arena::{Document, Value};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Cursor {
    pub object: usize,
    pub skipped: usize,
}

impl Cursor {
    fn is_active(&self) -> bool {
        self.skipped == 0
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BaseLayer<'a> {
    pub doc: &'a Document<'a>,
    pub cursor: Cursor,
}

/// A field located in one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Hit {
    pub layer: usize,
    pub object: usize,
    pub field: usize,
}

/// Result of a key lookup: the hit in the document itself and the hit in
/// the nearest base that has the key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct KeyMatch {
    pub own: Option<Hit>,
    pub base: Option<Hit>,
}

impl KeyMatch {
    pub fn is_empty(&self) -> bool {
        self.own.is_none() && self.base.is_none()
    }

    pub fn hits(&self) -> impl Iterator<Item = Hit> {
        self.own.into_iter().chain(self.base)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Chain<'a> {
    own: Cursor,
    bases: Vec<BaseLayer<'a>>,
}

impl<'a> Chain<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bases(&mut self, docs: impl IntoIterator<Item = &'a Document<'a>>) {
        self.bases = docs
            .into_iter()
            .map(|doc| BaseLayer {
                doc,
                cursor: Cursor::default(),
            })
            .collect();
        self.reset();
    }

    pub fn base_docs(&self) -> impl Iterator<Item = &'a Document<'a>> + '_ {
        self.bases.iter().map(|layer| layer.doc)
    }

    pub fn depth(&self) -> usize {
        self.bases.len()
    }

    pub fn reset(&mut self) {
        self.own = Cursor::default();
        for layer in &mut self.bases {
            layer.cursor = Cursor::default();
        }
    }

    fn layer<'s>(
        &'s self,
        own: Option<&'s Document<'a>>,
        layer: usize,
    ) -> Option<(&'s Document<'a>, Cursor)> {
        if layer == 0 {
            own.map(|doc| (doc, self.own))
        } else {
            self.bases
                .get(layer - 1)
                .map(|base| (base.doc, base.cursor))
        }
    }

    fn cursor_mut(&mut self, layer: usize) -> Option<&mut Cursor> {
        if layer == 0 {
            Some(&mut self.own)
        } else {
            self.bases.get_mut(layer - 1).map(|base| &mut base.cursor)
        }
    }

    fn find(&self, own: Option<&Document<'a>>, layer: usize, key: &str) -> Option<Hit> {
        let (doc, cursor) = self.layer(own, layer)?;
        if !cursor.is_active() {
            return None;
        }
        let field = doc.object(cursor.object)?.find(key)?;
        Some(Hit {
            layer,
            object: cursor.object,
            field,
        })
    }

    pub fn value<'s>(&'s self, own: Option<&'s Document<'a>>, hit: Hit) -> Option<&'s Value<'a>> {
        let (doc, _) = self.layer(own, hit.layer)?;
        doc.field(hit.object, hit.field).map(|field| &field.value)
    }

    pub fn match_key(&self, own: Option<&Document<'a>>, key: &str) -> KeyMatch {
        KeyMatch {
            own: self.find(own, 0, key),
            base: (1..=self.bases.len()).find_map(|layer| self.find(own, layer, key)),
        }
    }

    /// Move every layer into the object stored under `key`. Layers without
    /// such an object are skipped. Returns which layers entered, and leaves
    /// the chain untouched when none did.
    pub fn enter(&mut self, own: Option<&Document<'a>>, key: &str) -> KeyMatch {
        let targets: SmallVec<[Option<Hit>; 4]> = (0..=self.bases.len())
            .map(|layer| {
                self.find(own, layer, key).filter(|hit| {
                    matches!(self.value(own, *hit), Some(Value::Object(_)))
                })
            })
            .collect();

        let entered = KeyMatch {
            own: targets[0],
            base: targets[1..].iter().flatten().next().copied(),
        };
        if entered.is_empty() {
            return entered;
        }

        let objects: SmallVec<[Option<usize>; 4]> = targets
            .iter()
            .map(|target| {
                target
                    .and_then(|hit| self.value(own, hit))
                    .and_then(Value::as_object)
            })
            .collect();
        for (layer, object) in objects.into_iter().enumerate() {
            if let Some(cursor) = self.cursor_mut(layer) {
                match object {
                    Some(object) => cursor.object = object,
                    None => cursor.skipped += 1,
                }
            }
        }
        entered
    }

    /// Enter an object taken from an array in `layer`. Every other layer is
    /// skipped, since array elements are never matched across layers.
    pub fn enter_element(&mut self, layer: usize, object: usize) {
        for index in 0..=self.bases.len() {
            if let Some(cursor) = self.cursor_mut(index) {
                if index == layer && cursor.is_active() {
                    cursor.object = object;
                } else {
                    cursor.skipped += 1;
                }
            }
        }
    }

    pub fn skip_all(&mut self) {
        for index in 0..=self.bases.len() {
            if let Some(cursor) = self.cursor_mut(index) {
                cursor.skipped += 1;
            }
        }
    }

    pub fn leave(&mut self, own: Option<&Document<'a>>) -> Result<()> {
        for layer in 0..=self.bases.len() {
            let doc = if layer == 0 {
                own
            } else {
                Some(self.bases[layer - 1].doc)
            };
            let Some(cursor) = self.cursor_mut(layer) else {
                continue;
            };
            if cursor.skipped > 0 {
                cursor.skipped -= 1;
                continue;
            }
            let Some(doc) = doc else {
                continue;
            };
            match doc.object(cursor.object).and_then(|object| object.parent) {
                Some(parent) => cursor.object = parent,
                None => {
                    return Err(Error::misuse(
                        "object_end called, but no object is currently open",
                    ))
                }
            }
        }
        Ok(())
    }
}
