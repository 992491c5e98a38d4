use smol_str::SmolStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input text. Fatal to the whole parse.
    Parse,
    /// A key or array element could not be found, or had the wrong type.
    Lookup,
    /// Unbalanced or out-of-order API calls.
    Misuse,
    /// A value that cannot be represented in the text format.
    Encode,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Location {
    /// Resolve a byte offset into a 1-based line and column.
    pub fn from_offset(input: &str, offset: usize) -> Self {
        let offset = offset.min(input.len());
        let before = &input.as_bytes()[..offset];
        let line = memchr::memchr_iter(b'\n', before).count() + 1;
        let line_start = memchr::memrchr(b'\n', before).map_or(0, |idx| idx + 1);
        Self {
            offset,
            line,
            column: offset - line_start + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}{}", context_suffix(.key, .location))]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub location: Option<Location>,
    pub key: Option<SmolStr>,
}

impl Error {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
            key: None,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn lookup(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Lookup, message)
    }

    pub fn misuse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Misuse, message)
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Encode, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(SmolStr::new(key));
        self
    }

    /// Parse, misuse and encode errors poison the document; lookups do not.
    pub fn is_sticky(&self) -> bool {
        !matches!(self.kind, ErrorKind::Lookup)
    }
}

fn context_suffix(key: &Option<SmolStr>, location: &Option<Location>) -> String {
    let mut out = String::new();
    if let Some(key) = key {
        out.push_str(&format!(" (key `{key}`)"));
    }
    if let Some(location) = location {
        out.push_str(&format!(
            " at line {}, column {}",
            location.line, location.column
        ));
    }
    out
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::io(format!("io failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case("a = 1", 0, 1, 1)]
    #[case("a = 1,\nb = x", 7, 2, 1)]
    #[case("a = 1,\nb = x", 11, 2, 5)]
    #[case("a\n\nb", 3, 3, 1)]
    fn test_location_from_offset(
        #[case] input: &str,
        #[case] offset: usize,
        #[case] line: usize,
        #[case] column: usize,
    ) {
        let location = Location::from_offset(input, offset);
        assert_eq!(location.line, line);
        assert_eq!(location.column, column);
    }

    #[rstest::rstest]
    fn test_display_includes_context() {
        let err = Error::parse("unterminated string")
            .with_location(Location::from_offset("a = \"x", 4));
        assert_eq!(err.to_string(), "unterminated string at line 1, column 5");

        let err = Error::lookup("no field matches key").with_key("hp");
        assert_eq!(err.to_string(), "no field matches key (key `hp`)");
    }

    #[rstest::rstest]
    fn test_stickiness() {
        assert!(Error::parse("x").is_sticky());
        assert!(Error::misuse("x").is_sticky());
        assert!(!Error::lookup("x").is_sticky());
    }

    #[rstest::rstest]
    fn test_from_io_error() {
        let err = Error::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        assert_eq!(err.kind, ErrorKind::Io);
        assert!(err.is_sticky());
        assert_eq!(err.to_string(), "io failed: no such file");
    }
}
