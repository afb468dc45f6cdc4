//! Strand Core - Schema-driven wire codecs
//!
//! Peers that share a [`Schema`] out of band exchange values as a positional
//! byte layout: LEB128 varints, length-prefixed UTF-8 strings and records
//! written field by field in schema order.
//!
//! # Example
//!
//! ```
//! use strand_core::{Kind, Record, Schema, ValueCodec};
//!
//! let mut builder = Schema::builder();
//! let data = builder.record("data", [("name", Kind::String), ("count", Kind::U32)]);
//! let schema = builder.build().unwrap();
//!
//! let record = Record::new().with("name", "hello").with("count", 5u32);
//! let codec = ValueCodec::new(&schema);
//! let bytes = codec.encode_record(data, &record).unwrap();
//! assert_eq!(bytes, [0x05, b'h', b'e', b'l', b'l', b'o', 0x05]);
//!
//! let decoded = codec.decode_record(&mut bytes.as_slice(), data).unwrap();
//! assert_eq!(decoded, record);
//! ```

pub mod diagnostics;
pub mod error;
pub mod record;
pub mod schema;
pub mod string;
pub mod typed;
pub mod value;
pub mod varint;

// Re-exports for convenience
pub use diagnostics::{Diagnostics, NoDiagnostics, TracingDiagnostics};
pub use error::{Error, Result};
pub use record::ValueCodec;
pub use schema::{Kind, RecordId, Schema, SchemaBuilder};
pub use value::{Record, Value};
