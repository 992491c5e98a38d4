use crate::constants::MAX_DEPTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Indent {
    #[default]
    Tabs,
    Spaces(usize),
}

impl Indent {
    pub fn spaces(count: usize) -> Self {
        Indent::Spaces(count)
    }

    pub(crate) fn unit(self) -> String {
        match self {
            Indent::Tabs => "\t".to_string(),
            Indent::Spaces(count) => " ".repeat(count),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloatFormat {
    /// Six fixed decimals (`9.900000`), falling back to the shortest
    /// round-trip form when six decimals would lose precision.
    #[default]
    Fixed,
    /// Always the shortest representation that reads back exactly.
    Shortest,
}

#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub indent: Indent,
    pub float_format: FloatFormat,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indent(mut self, indent: Indent) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_float_format(mut self, float_format: FloatFormat) -> Self {
        self.float_format = float_format;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub max_depth: usize,
    pub allow_bare_strings: bool,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_bare_strings(mut self, allow: bool) -> Self {
        self.allow_bare_strings = allow;
        self
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            allow_bare_strings: true,
        }
    }
}
