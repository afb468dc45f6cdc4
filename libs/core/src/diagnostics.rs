//! Optional observation of codec progress.
//!
//! The codecs never log on their own; callers that want a trace inject a
//! [`Diagnostics`] implementation into [`ValueCodec`](crate::ValueCodec).

/// Direction of a codec operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Encode,
    Decode,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Encode => "encode",
            Phase::Decode => "decode",
        }
    }
}

pub trait Diagnostics: Send + Sync {
    /// A record field is about to be processed.
    fn field(&self, _phase: Phase, _record: &str, _field: &str) {}

    /// A length prefix (string bytes or list items) was processed.
    fn length(&self, _phase: Phase, _len: u32) {}

    /// A field failed; `error` is the innermost cause, without field context.
    fn failed(&self, _phase: Phase, _record: &str, _field: &str, _error: &crate::Error) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiagnostics;

impl Diagnostics for NoDiagnostics {}

/// Forwards codec progress to `tracing` at trace level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn field(&self, phase: Phase, record: &str, field: &str) {
        tracing::trace!(phase = phase.as_str(), record, field, "field");
    }

    fn length(&self, phase: Phase, len: u32) {
        tracing::trace!(phase = phase.as_str(), len, "length prefix");
    }

    fn failed(&self, phase: Phase, record: &str, field: &str, error: &crate::Error) {
        tracing::trace!(phase = phase.as_str(), record, field, %error, "field failed");
    }
}
