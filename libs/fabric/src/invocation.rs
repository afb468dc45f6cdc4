//! A single remote call and its lifecycle.
//!
//! ```text
//! Created → ParametersSerialized → Transmitted → AwaitingResponse → Completed
//!                                                                 ↘ Failed
//!                                                                 ↘ Cancelled
//! ```
//!
//! Sending and awaiting are separate suspension points; a [`CancelHandle`]
//! is observed at both. Exactly one outcome is delivered per invocation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use strand_core::{typed, Kind, Record, RecordId, Schema, Value, ValueCodec};
use tokio::sync::watch;
use tracing::debug;

use crate::client::ClientConfig;
use crate::envelope::{Request, Response};
use crate::error::{Error, Result};
use crate::transport::{deadline, Connector, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Created,
    ParametersSerialized,
    Transmitted,
    AwaitingResponse,
    Completed,
    Failed,
    Cancelled,
}

impl InvocationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            InvocationState::Completed | InvocationState::Failed | InvocationState::Cancelled
        )
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InvocationState::Created => "created",
            InvocationState::ParametersSerialized => "parameters_serialized",
            InvocationState::Transmitted => "transmitted",
            InvocationState::AwaitingResponse => "awaiting_response",
            InvocationState::Completed => "completed",
            InvocationState::Failed => "failed",
            InvocationState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Cooperative cancellation signal shared between an invocation and
/// whoever may want to abort it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal has been raised.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Unreachable while `self` holds the sender.
                std::future::pending::<()>().await;
            }
        }
    }
}

enum Link {
    Pending(Arc<dyn Connector>),
    Open(Box<dyn Transport>),
    Closed,
}

pub struct Invocation {
    interface: String,
    function: String,
    state: InvocationState,
    link: Link,
    cancel: CancelHandle,
    config: ClientConfig,
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("interface", &self.interface)
            .field("function", &self.function)
            .field("state", &self.state)
            .finish()
    }
}

impl Invocation {
    pub(crate) fn new(
        interface: impl Into<String>,
        function: impl Into<String>,
        connector: Arc<dyn Connector>,
        config: ClientConfig,
    ) -> Self {
        Self {
            interface: interface.into(),
            function: function.into(),
            state: InvocationState::Created,
            link: Link::Pending(connector),
            cancel: CancelHandle::new(),
            config,
        }
    }

    /// Run an invocation over an already established transport.
    pub fn over(
        transport: impl Transport + 'static,
        interface: impl Into<String>,
        function: impl Into<String>,
    ) -> Self {
        Self {
            interface: interface.into(),
            function: function.into(),
            state: InvocationState::Created,
            link: Link::Open(Box::new(transport)),
            cancel: CancelHandle::new(),
            config: ClientConfig::default(),
        }
    }

    /// Observe a caller-supplied cancellation signal instead of a private one.
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// A handle that cancels this invocation from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Encode `params` against `schema` and transmit the request.
    pub async fn send_parameters(
        &mut self,
        schema: &Schema,
        params: RecordId,
        record: &Record,
    ) -> Result<()> {
        self.expect_created()?;
        let encoded = ValueCodec::new(schema)
            .max_depth(self.config.max_depth)
            .encode_record(params, record)
            .map_err(Error::from);
        self.transmit(encoded).await
    }

    /// Like [`send_parameters`](Self::send_parameters) for a serde type.
    pub async fn send<P: Serialize + ?Sized>(&mut self, params: &P) -> Result<()> {
        self.expect_created()?;
        let encoded = typed::to_vec(params).map_err(Error::from);
        self.transmit(encoded).await
    }

    /// Wait for the response and decode it as `result`.
    pub async fn await_result(&mut self, schema: &Schema, result: &Kind) -> Result<Value> {
        let body = self.receive_body().await?;
        let codec = ValueCodec::new(schema).max_depth(self.config.max_depth);
        let decoded = decode_body(&body, |reader| codec.decode(reader, result));
        self.finish(decoded).await
    }

    /// Like [`await_result`](Self::await_result) for a serde type.
    pub async fn await_typed<R: DeserializeOwned>(&mut self) -> Result<R> {
        let body = self.receive_body().await?;
        let max_depth = self.config.max_depth;
        let decoded = decode_body(&body, |reader| {
            R::deserialize(&mut typed::Deserializer::new(reader).with_max_depth(max_depth))
        });
        self.finish(decoded).await
    }

    /// Abort the exchange. No-op once the invocation has resolved.
    pub async fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.cancel.cancel();
        self.resolve_cancelled().await;
    }

    fn expect_created(&self) -> Result<()> {
        match self.state {
            InvocationState::Created => Ok(()),
            InvocationState::Cancelled => Err(Error::Cancelled),
            state => Err(Error::InvalidState {
                operation: "send parameters for",
                state,
            }),
        }
    }

    async fn transmit(&mut self, encoded: Result<Vec<u8>>) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(self.resolve_cancelled().await);
        }
        let payload = match encoded {
            Ok(payload) => payload,
            Err(e) => return Err(self.fail(e).await),
        };
        self.transition(InvocationState::ParametersSerialized);

        let frame = match Request::new(&self.interface, &self.function, payload).encode() {
            Ok(frame) => frame,
            Err(e) => return Err(self.fail(e).await),
        };

        let cancel = self.cancel.clone();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            sent = self.connect_and_send(&frame) => Some(sent),
        };

        match outcome {
            None => Err(self.resolve_cancelled().await),
            Some(Err(e)) => Err(self.fail(e).await),
            Some(Ok(())) => {
                self.transition(InvocationState::Transmitted);
                Ok(())
            }
        }
    }

    async fn connect_and_send(&mut self, frame: &[u8]) -> Result<()> {
        let pending = match &self.link {
            Link::Pending(connector) => Some(Arc::clone(connector)),
            _ => None,
        };
        if let Some(connector) = pending {
            let transport =
                deadline(self.config.connect_timeout(), "Connect", connector.connect()).await?;
            self.link = Link::Open(transport);
        }
        match &mut self.link {
            Link::Open(transport) => transport.send(frame).await,
            _ => Err(Error::ConnectionClosed),
        }
    }

    async fn receive_body(&mut self) -> Result<Vec<u8>> {
        match self.state {
            InvocationState::Transmitted => {}
            InvocationState::Cancelled => return Err(Error::Cancelled),
            InvocationState::Completed | InvocationState::Failed => {
                return Err(Error::AlreadyResolved)
            }
            state => {
                return Err(Error::InvalidState {
                    operation: "await the result of",
                    state,
                })
            }
        }
        if self.cancel.is_cancelled() {
            return Err(self.resolve_cancelled().await);
        }
        self.transition(InvocationState::AwaitingResponse);

        let cancel = self.cancel.clone();
        let timeout = self.config.response_timeout();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            frame = self.receive_frame(timeout) => Some(frame),
        };

        let frame = match outcome {
            None => return Err(self.resolve_cancelled().await),
            Some(Err(e)) => return Err(self.fail(e).await),
            Some(Ok(frame)) => frame,
        };

        match Response::decode(&frame) {
            Ok(Response::Ok(body)) => Ok(body),
            Ok(Response::Err(message)) => {
                debug!(
                    interface = %self.interface,
                    function = %self.function,
                    %message,
                    "remote failure"
                );
                self.transition(InvocationState::Failed);
                self.close().await;
                Err(Error::Remote {
                    interface: self.interface.clone(),
                    function: self.function.clone(),
                    message,
                })
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn receive_frame(&mut self, timeout: Option<Duration>) -> Result<Vec<u8>> {
        let transport = match &mut self.link {
            Link::Open(transport) => transport,
            _ => return Err(Error::ConnectionClosed),
        };
        deadline(timeout, "Response", transport.receive()).await
    }

    async fn finish<T>(&mut self, decoded: Result<T>) -> Result<T> {
        match decoded {
            Ok(value) => {
                self.transition(InvocationState::Completed);
                self.close().await;
                Ok(value)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn fail(&mut self, source: Error) -> Error {
        self.transition(InvocationState::Failed);
        self.close().await;
        Error::Invocation {
            interface: self.interface.clone(),
            function: self.function.clone(),
            source: Box::new(source),
        }
    }

    async fn resolve_cancelled(&mut self) -> Error {
        self.transition(InvocationState::Cancelled);
        self.close().await;
        Error::Cancelled
    }

    async fn close(&mut self) {
        if let Link::Open(mut transport) = std::mem::replace(&mut self.link, Link::Closed) {
            if let Err(e) = transport.close().await {
                debug!(interface = %self.interface, function = %self.function, error = %e, "close failed");
            }
        }
    }

    fn transition(&mut self, next: InvocationState) {
        debug!(
            interface = %self.interface,
            function = %self.function,
            from = %self.state,
            to = %next,
            "invocation state"
        );
        self.state = next;
    }
}

/// Decode a response body that must be consumed exactly.
fn decode_body<T>(
    body: &[u8],
    decode: impl FnOnce(&mut &[u8]) -> strand_core::Result<T>,
) -> Result<T> {
    let mut reader = body;
    let value = decode(&mut reader).map_err(|e| match e {
        strand_core::Error::EndOfStream => strand_core::Error::UnexpectedEndOfStream,
        other => other,
    })?;
    if !reader.is_empty() {
        return Err(strand_core::Error::TrailingBytes(reader.len()).into());
    }
    Ok(value)
}
