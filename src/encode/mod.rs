pub mod writer;

use base64::Engine as _;

use crate::constants::FIXED_DECIMALS;
use crate::{Error, FloatFormat, Result};

pub use writer::Writer;

pub(crate) fn push_i64(out: &mut String, value: i64) {
    let mut buf = itoa::Buffer::new();
    out.push_str(buf.format(value));
}

pub(crate) fn push_u64(out: &mut String, value: u64) {
    let mut buf = itoa::Buffer::new();
    out.push_str(buf.format(value));
}

pub(crate) fn push_f64(out: &mut String, value: f64, format: FloatFormat) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::encode(format!("cannot write non-finite float {value}")));
    }
    if format == FloatFormat::Fixed {
        let fixed = format!("{value:.prec$}", prec = FIXED_DECIMALS);
        if fixed.parse::<f64>().is_ok_and(|back| back == value) {
            out.push_str(&fixed);
            return Ok(());
        }
    }
    let mut buf = ryu::Buffer::new();
    out.push_str(buf.format_finite(value));
    Ok(())
}

/// Floats are stored as doubles, so the six-decimal form only has to read
/// back to the same `f32`.
pub(crate) fn push_f32(out: &mut String, value: f32, format: FloatFormat) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::encode(format!("cannot write non-finite float {value}")));
    }
    if format == FloatFormat::Fixed {
        let fixed = format!("{:.prec$}", f64::from(value), prec = FIXED_DECIMALS);
        if fixed.parse::<f64>().is_ok_and(|back| back as f32 == value) {
            out.push_str(&fixed);
            return Ok(());
        }
    }
    let mut buf = ryu::Buffer::new();
    out.push_str(buf.format_finite(value));
    Ok(())
}

pub(crate) fn push_quoted(out: &mut String, value: &str) {
    out.reserve(value.len() + 2);
    out.push('"');
    let mut rest = value;
    while let Some(idx) = memchr::memchr2(b'"', b'\\', rest.as_bytes()) {
        out.push_str(&rest[..idx]);
        out.push('\\');
        out.push_str(&rest[idx..idx + 1]);
        rest = &rest[idx + 1..];
    }
    out.push_str(rest);
    out.push('"');
}

pub fn encode_blob(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

pub fn decode_blob(text: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(text.trim())
        .map_err(|err| Error::lookup(format!("invalid base64 blob: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_text(value: f64, format: FloatFormat) -> String {
        let mut out = String::new();
        push_f64(&mut out, value, format).unwrap();
        out
    }

    fn f32_text(value: f32, format: FloatFormat) -> String {
        let mut out = String::new();
        push_f32(&mut out, value, format).unwrap();
        out
    }

    #[rstest::rstest]
    #[case(9.9, "9.900000")]
    #[case(5.0, "5.000000")]
    #[case(-0.5, "-0.500000")]
    #[case(0.1 + 0.2, "0.30000000000000004")]
    #[case(1e-9, "1e-9")]
    fn test_fixed_f64(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(f64_text(value, FloatFormat::Fixed), expected);
    }

    #[rstest::rstest]
    #[case(10.3, "10.300000")]
    #[case(5.0, "5.000000")]
    #[case(1.0e-7, "1e-7")]
    fn test_fixed_f32(#[case] value: f32, #[case] expected: &str) {
        assert_eq!(f32_text(value, FloatFormat::Fixed), expected);
    }

    #[rstest::rstest]
    fn test_shortest_floats() {
        assert_eq!(f64_text(9.9, FloatFormat::Shortest), "9.9");
        assert_eq!(f64_text(5.0, FloatFormat::Shortest), "5.0");
        assert_eq!(f32_text(10.3, FloatFormat::Shortest), "10.3");
    }

    #[rstest::rstest]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    #[case(f64::NEG_INFINITY)]
    fn test_non_finite_is_encode_error(#[case] value: f64) {
        let err = push_f64(&mut String::new(), value, FloatFormat::Fixed).unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::Encode);
    }

    #[rstest::rstest]
    #[case("Hello.", "\"Hello.\"")]
    #[case("say \"hi\"", r#""say \"hi\"""#)]
    #[case(r"C:\path", r#""C:\\path""#)]
    #[case("", "\"\"")]
    fn test_push_quoted(#[case] value: &str, #[case] expected: &str) {
        let mut out = String::new();
        push_quoted(&mut out, value);
        assert_eq!(out, expected);
    }

    #[rstest::rstest]
    fn test_blob_base64() {
        let encoded = encode_blob(b"Some blob input.\0");
        assert_eq!(encoded, "U29tZSBibG9iIGlucHV0LgA=");
        assert_eq!(decode_blob(&encoded).unwrap(), b"Some blob input.\0");
        assert!(decode_blob("not base64!").is_err());
    }

    #[rstest::rstest]
    fn test_integers() {
        let mut out = String::new();
        push_i64(&mut out, -42);
        out.push(' ');
        push_u64(&mut out, u64::MAX);
        assert_eq!(out, "-42 18446744073709551615");
    }
}
