use thiserror::Error;

use crate::types::{MetaKey, RecordField};

pub type Result<T, E = VcfError> = std::result::Result<T, E>;

fn at_line(line: &Option<usize>) -> String {
    match line {
        Some(line) => format!(" (line {})", line),
        None => String::new(),
    }
}

/// Structural corruption. Aborts the parse that raised it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty line{}", at_line(.line))]
    EmptyLine { line: Option<usize> },
    #[error("expected at least {expected} tab-separated columns, found {found}{}", at_line(.line))]
    TooFewColumns {
        expected: usize,
        found: usize,
        line: Option<usize>,
    },
    #[error("malformed meta-information line {text:?}: {reason}{}", at_line(.line))]
    MalformedMeta {
        text: String,
        reason: String,
        line: Option<usize>,
    },
    #[error("input does not start with a ##fileformat line, found {text:?}")]
    MissingFileformat { text: String },
    #[error("input ended before the #CHROM column line")]
    MissingColumnHeader,
}

/// A header that does not conform to the declared schema or the version's grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid header field {field} value {value:?}: {reason}{}", at_line(.line))]
pub struct HeaderValidationError {
    pub field: String,
    pub value: String,
    pub reason: String,
    pub line: Option<usize>,
}

impl HeaderValidationError {
    pub(crate) fn new(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            line: None,
        }
    }

    pub(crate) fn at(mut self, line: Option<usize>) -> Self {
        self.line = self.line.or(line);
        self
    }
}

/// A record field that violates the header's declarations or the version's grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {field} value {value:?}: {reason}{}", at_line(.line))]
pub struct RecordValidationError {
    pub field: RecordField,
    pub value: String,
    pub reason: String,
    pub line: Option<usize>,
}

impl RecordValidationError {
    pub(crate) fn new(field: RecordField, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            reason: reason.into(),
            line: None,
        }
    }

    pub(crate) fn at(mut self, line: Option<usize>) -> Self {
        self.line = self.line.or(line);
        self
    }
}

/// A rejected mutation. The mutated structure is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("{kind} already contains {key:?}")]
    DuplicateKey { kind: String, key: String },
    #[error("{kind} key {key:?} is not declared in the header")]
    Undeclared { kind: String, key: String },
    #[error("{field} cannot be mutated through this operation")]
    ImmutableField { field: RecordField },
    #[error("unknown header target {target:?}")]
    UnknownTarget { target: String },
    #[error("{kind} has no declaration with ID {id:?}")]
    UnknownId { kind: MetaKey, id: String },
    #[error("malformed patch for {target}: {reason}")]
    MalformedPatch { target: String, reason: String },
    #[error("{kind} is not a declaration kind")]
    NotADeclaration { kind: MetaKey },
    #[error("{kind} has no entry {key:?} to change")]
    Missing { kind: String, key: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid validation level {0:?}, expected one of basic, relaxed, strict")]
    InvalidValidationLevel(String),
    #[error("neither a file nor in-memory data was given")]
    NoInput,
}

#[derive(Error, Debug)]
pub enum VcfError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Header(#[from] HeaderValidationError),
    #[error(transparent)]
    Record(#[from] RecordValidationError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Unable to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unable to open input: {0}")]
    Open(#[from] niffler::Error),
}
