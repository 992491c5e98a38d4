use crate::arena::{Document, Value};
use crate::{Error, Kv, KvMode, ReadOptions, Result, WriteOptions};

/// Replay the fields of a read-mode document through the write API of
/// `target`. With a base set on `target`, fields equal to the base drop out.
pub fn transcribe(source: &Kv<'_>, target: &mut Kv<'_>) -> Result<()> {
    let doc = source
        .document()
        .ok_or_else(|| Error::misuse("only read-mode documents can be transcribed"))?;
    if target.mode() != KvMode::Write {
        return Err(Error::misuse("transcription target must be in write mode"));
    }
    write_object(doc, 0, target)
}

fn write_object(doc: &Document<'_>, index: usize, target: &mut Kv<'_>) -> Result<()> {
    let object = doc
        .object(index)
        .ok_or_else(|| Error::misuse(format!("object {index} does not exist")))?;
    for field in &object.fields {
        match &field.value {
            Value::Object(child) => {
                target.object_begin(Some(field.key))?;
                write_object(doc, *child, target)?;
                target.object_end()?;
            }
            Value::Array(items) => {
                let mut count = items.len();
                target.array_begin(&mut count, Some(field.key))?;
                write_items(doc, items, target)?;
                target.array_end()?;
            }
            value => {
                target.key(field.key)?;
                write_scalar(value, target)?;
            }
        }
    }
    Ok(())
}

fn write_items(doc: &Document<'_>, items: &[Value<'_>], target: &mut Kv<'_>) -> Result<()> {
    for item in items {
        match item {
            Value::Object(child) => {
                target.object_begin(None)?;
                write_object(doc, *child, target)?;
                target.object_end()?;
            }
            Value::Array(nested) => {
                let mut count = nested.len();
                target.array_begin(&mut count, None)?;
                write_items(doc, nested, target)?;
                target.array_end()?;
            }
            value => write_scalar(value, target)?,
        }
    }
    Ok(())
}

fn write_scalar(value: &Value<'_>, target: &mut Kv<'_>) -> Result<()> {
    match value {
        Value::Int(v) => target.val_i64(&mut { *v }),
        Value::Double(v) => target.val_f64(&mut { *v }),
        Value::String(raw) => target.val_string(&mut raw.unescape().into_owned()),
        Value::Null => Err(Error::encode("null values have no text form")),
        Value::Array(_) | Value::Object(_) => Err(Error::misuse("expected a scalar value")),
    }
}

/// Write `doc` as a patch against `base`: only fields that differ from the
/// base chain are kept.
pub fn diff<'a>(doc: &Kv<'_>, base: &'a Kv<'a>, options: &WriteOptions) -> Result<String> {
    let mut out = Kv::write_with_options(options);
    out.set_base(base)?;
    transcribe(doc, &mut out)?;
    out.into_buffer()
}

/// Re-emit `doc` in canonical layout.
pub fn format(doc: &Kv<'_>, options: &WriteOptions) -> Result<String> {
    let mut out = Kv::write_with_options(options);
    transcribe(doc, &mut out)?;
    out.into_buffer()
}

/// Parse a chain of base documents and hand the nearest one to `f`.
///
/// `texts[0]` is the nearest base and each later text is the base of the
/// one before it. `f` receives `None` when `texts` is empty.
pub fn with_base_chain<S, R, F>(texts: &[S], options: &ReadOptions, f: F) -> Result<R>
where
    S: AsRef<str>,
    F: FnOnce(Option<&Kv<'_>>) -> Result<R>,
{
    build_chain(texts, None, options, f)
}

fn build_chain<'p, S, R, F>(
    texts: &[S],
    base: Option<&'p Kv<'p>>,
    options: &ReadOptions,
    f: F,
) -> Result<R>
where
    S: AsRef<str>,
    F: FnOnce(Option<&Kv<'_>>) -> Result<R>,
{
    let Some((farthest, rest)) = texts.split_last() else {
        return f(base);
    };
    let mut kv = Kv::read_with_options(farthest.as_ref(), options)?;
    if let Some(base) = base {
        kv.set_base(base)?;
    }
    build_chain(rest, Some(&kv), options, f)
}
