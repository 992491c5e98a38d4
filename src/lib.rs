pub mod arena;
mod chain;
pub mod constants;
pub mod decode;
pub mod encode;
pub mod error;
pub mod json;
pub mod kv;
pub mod options;
pub mod transcribe;
pub mod val;

pub use crate::arena::{Document, Field, Object, RawStr, Value, ValueType};
pub use crate::error::{Error, ErrorKind, Location};
pub use crate::json::to_json;
pub use crate::kv::{Kv, KvMode};
pub use crate::options::{FloatFormat, Indent, ReadOptions, WriteOptions};
pub use crate::transcribe::{diff, format, transcribe, with_base_chain};
pub use crate::val::{Blob, KvVal};

pub type Result<T> = std::result::Result<T, Error>;

pub fn read(input: &str) -> Result<Kv<'_>> {
    Kv::read(input)
}

pub fn read_with_options<'a>(input: &'a str, options: &ReadOptions) -> Result<Kv<'a>> {
    Kv::read_with_options(input, options)
}

pub fn write<'a>() -> Kv<'a> {
    Kv::write()
}

pub fn write_with_options<'a>(options: &WriteOptions) -> Kv<'a> {
    Kv::write_with_options(options)
}

/// Parse `input` and report the first error, if any.
pub fn validate_str(input: &str) -> Result<()> {
    validate_str_with_options(input, &ReadOptions::default())
}

pub fn validate_str_with_options(input: &str, options: &ReadOptions) -> Result<()> {
    decode::parse(input, options).map(|_| ())
}
