//! Request and response frames.
//!
//! Each invocation exchanges exactly one request frame and one response
//! frame over its transport:
//!
//! ```text
//! request   string(interface) ‖ string(function) ‖ params
//! response  0x00 ‖ result
//!           0x01 ‖ string(message)
//! ```

use strand_core::string;

use crate::error::{Error, Result};

const STATUS_OK: u8 = 0;
const STATUS_ERR: u8 = 1;

/// A call: target identifiers plus the encoded parameter record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub interface: String,
    pub function: String,
    pub payload: Vec<u8>,
}

impl Request {
    pub fn new(interface: impl Into<String>, function: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            interface: interface.into(),
            function: function.into(),
            payload,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut frame = string::encode(&self.interface)?;
        frame.extend(string::encode(&self.function)?);
        frame.extend_from_slice(&self.payload);
        Ok(frame)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        if frame.is_empty() {
            return Err(Error::InvalidFrame("Empty request".to_string()));
        }
        let mut reader = frame;
        let interface = string::decode(&mut reader)?;
        let function = string::decode(&mut reader).map_err(|e| match e {
            strand_core::Error::EndOfStream => strand_core::Error::UnexpectedEndOfStream,
            other => other,
        })?;
        Ok(Self {
            interface,
            function,
            payload: reader.to_vec(),
        })
    }
}

/// The single answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Encoded result value.
    Ok(Vec<u8>),
    /// Diagnostic message from the peer.
    Err(String),
}

impl Response {
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Response::Ok(payload) => {
                let mut frame = Vec::with_capacity(1 + payload.len());
                frame.push(STATUS_OK);
                frame.extend_from_slice(payload);
                Ok(frame)
            }
            Response::Err(message) => {
                let mut frame = vec![STATUS_ERR];
                frame.extend(string::encode(message)?);
                Ok(frame)
            }
        }
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        let (status, body) = frame
            .split_first()
            .ok_or_else(|| Error::InvalidFrame("Empty response".to_string()))?;
        match *status {
            STATUS_OK => Ok(Response::Ok(body.to_vec())),
            STATUS_ERR => {
                let mut reader = body;
                let message = match string::decode(&mut reader) {
                    Ok(message) => message,
                    // Keep what the peer meant to say even if it is mangled.
                    Err(strand_core::Error::InvalidEncoding { lossy }) => lossy,
                    Err(strand_core::Error::EndOfStream) => {
                        return Err(strand_core::Error::UnexpectedEndOfStream.into())
                    }
                    Err(e) => return Err(e.into()),
                };
                if !reader.is_empty() {
                    return Err(strand_core::Error::TrailingBytes(reader.len()).into());
                }
                Ok(Response::Err(message))
            }
            other => Err(strand_core::Error::InvalidDiscriminant(other).into()),
        }
    }
}
