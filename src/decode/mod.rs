pub mod parser;
pub mod scanner;

use tracing::debug;

use crate::arena::Document;
use crate::{Error, ReadOptions, Result};

pub use parser::parse_document;

/// Parse a whole document. The arena borrows every string from `input`.
pub fn parse<'a>(input: &'a str, options: &ReadOptions) -> Result<Document<'a>> {
    let doc = parse_document(input, options)?;
    debug!(
        objects = doc.objects.len(),
        bytes = input.len(),
        "parsed kv document"
    );
    Ok(doc)
}

pub fn parse_bytes<'a>(input: &'a [u8], options: &ReadOptions) -> Result<Document<'a>> {
    let text = std::str::from_utf8(input)
        .map_err(|err| Error::parse(format!("invalid utf-8: {err}")))?;
    parse(text, options)
}
