use std::fmt::Display;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("varint overflows a 32-bit integer")]
    IntegerOverflow,

    #[error("length of {0} overflows a 32-bit integer")]
    LengthOverflow(usize),

    /// The stream ended before the first byte of a new value.
    #[error("end of stream")]
    EndOfStream,

    /// The stream ended in the middle of a value.
    #[error("unexpected end of stream")]
    UnexpectedEndOfStream,

    /// String bytes were not valid UTF-8. `lossy` holds the best-effort decoding.
    #[error("string is not valid UTF-8")]
    InvalidEncoding { lossy: String },

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("nesting depth exceeds limit of {limit}")]
    SchemaDepthExceeded { limit: usize },

    #[error("schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    /// A list whose items occupy no bytes on the wire.
    #[error("list items of kind {0} occupy no bytes on the wire")]
    ZeroSizedItems(String),

    #[error("invalid discriminant {0:#04x}")]
    InvalidDiscriminant(u8),

    #[error("unknown record id {0}")]
    UnknownRecord(u32),

    #[error("record `{0}` declared but never defined")]
    UndefinedRecord(String),

    #[error("duplicate field `{field}` in record `{record}`")]
    DuplicateField { record: String, field: String },

    #[error("failed to process `{field}` field: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    #[error("unsupported type: {0}")]
    Unsupported(&'static str),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    pub(crate) fn field(field: impl Into<String>, source: Error) -> Self {
        Self::Field {
            field: field.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn mismatch(expected: impl Display, found: impl Display) -> Self {
        Self::SchemaMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// The innermost error beneath any field context.
    pub fn root_cause(&self) -> &Error {
        let mut err = self;
        while let Error::Field { source, .. } = err {
            err = source;
        }
        err
    }

    /// Dotted path of the fields wrapping the root cause, outermost first.
    pub fn field_path(&self) -> String {
        let mut path = Vec::new();
        let mut err = self;
        while let Error::Field { field, source } = err {
            path.push(field.as_str());
            err = source;
        }
        path.join(".")
    }

    /// True when the stream ended cleanly at a value boundary.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }

    /// Promote a clean end of stream into an unexpected one; used once part
    /// of a value has already been consumed.
    pub(crate) fn mid_value(self) -> Self {
        match self {
            Error::EndOfStream => Error::UnexpectedEndOfStream,
            other => other,
        }
    }
}

impl serde::ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Self::Custom(msg.to_string())
    }
}

impl serde::de::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Self::Custom(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
