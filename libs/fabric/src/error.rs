use thiserror::Error;

use crate::invocation::InvocationState;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] strand_core::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// The peer reported a failure for the call.
    #[error("`{interface}#{function}` failed remotely: {message}")]
    Remote {
        interface: String,
        function: String,
        message: String,
    },

    /// `0` names the bounded step: connect, send, receive or response.
    #[error("{0} timeout exceeded")]
    Timeout(&'static str),

    #[error("Invocation cancelled")]
    Cancelled,

    #[error("Cannot {operation} an invocation in state {state}")]
    InvalidState {
        operation: &'static str,
        state: InvocationState,
    },

    #[error("Invocation already resolved")]
    AlreadyResolved,

    #[error("Failed to invoke `{interface}#{function}`: {source}")]
    Invocation {
        interface: String,
        function: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// The innermost error beneath any invocation context.
    pub fn root_cause(&self) -> &Error {
        let mut err = self;
        while let Error::Invocation { source, .. } = err {
            err = source;
        }
        err
    }

    /// The codec error at the bottom of the chain, if any.
    pub fn codec_cause(&self) -> Option<&strand_core::Error> {
        match self.root_cause() {
            Error::Codec(e) => Some(e.root_cause()),
            _ => None,
        }
    }

    /// True for failures of the underlying byte stream.
    pub fn is_transport(&self) -> bool {
        matches!(
            self.root_cause(),
            Error::Io(_) | Error::ConnectionClosed | Error::InvalidFrame(_)
        ) || matches!(self.codec_cause(), Some(strand_core::Error::Transport(_)))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), Error::Timeout(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
