//! Serving exported functions to remote callers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use strand_core::record::DEFAULT_MAX_DEPTH;
use strand_core::{Kind, Record, RecordId, Schema, Value, ValueCodec};
use tracing::{debug, info, warn};

use crate::envelope::{Request, Response};
use crate::error::{Error, Result};
use crate::transport::{Connector, MemoryTransport, Transport, TransportListener};

/// What a handler returns: a result value, or a message sent back as the
/// remote error.
pub type HandlerResult = std::result::Result<Value, String>;

/// Implementation of one exported function
#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, params: Record) -> HandlerResult;
}

#[async_trait::async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Record) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, params: Record) -> HandlerResult {
        (self)(params).await
    }
}

struct Export {
    params: RecordId,
    result: Kind,
    handler: Arc<dyn Handler>,
}

/// Dispatches requests to exports keyed by `(interface, function)`
pub struct Server {
    schema: Schema,
    exports: HashMap<(String, String), Export>,
    max_depth: usize,
}

impl Server {
    pub fn builder(schema: Schema) -> ServerBuilder {
        ServerBuilder {
            schema,
            exports: HashMap::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Accept connections until the listener fails, serving each on its own task
    pub async fn serve<L: TransportListener>(self: Arc<Self>, listener: L) -> Result<()> {
        loop {
            let transport = listener.accept().await?;
            debug!("accepted connection");
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = server.serve_connection(transport).await {
                    warn!(error = %e, "connection failed");
                }
            });
        }
    }

    /// Answer the single request a connection carries, then close it
    pub async fn serve_connection<T: Transport>(&self, mut transport: T) -> Result<()> {
        let handled = self.handle(&mut transport).await;
        if let Err(e) = transport.close().await {
            debug!(error = %e, "close failed");
        }
        handled
    }

    /// Answer one request.
    ///
    /// A connection carries one invocation. While the handler runs, the
    /// connection is watched: the caller closing it drops the call, and a
    /// further frame is refused with an error response after the first
    /// response is sent. Nothing is read from the connection afterwards.
    pub async fn handle<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<()> {
        let frame = match transport.receive().await {
            Ok(frame) => frame,
            Err(Error::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e),
        };
        let (export, params, (interface, function)) = match self.route(&frame) {
            Ok(routed) => routed,
            Err(response) => return transport.send(&response.encode()?).await,
        };

        debug!(%interface, %function, "dispatching");
        let handler = Arc::clone(&export.handler);
        let mut call = handler.call(params);
        let early = tokio::select! {
            // Frames already buffered win over a finished call.
            biased;
            received = transport.receive() => match received {
                Ok(_) => Early::Pipelined,
                Err(_) => Early::Gone,
            },
            outcome = &mut call => Early::Done(outcome),
        };
        let (outcome, pipelined) = match early {
            Early::Done(outcome) => (outcome, false),
            Early::Gone => {
                info!(%interface, %function, "caller went away, dropping call");
                return Ok(());
            }
            Early::Pipelined => {
                warn!(%interface, %function, "second request on one connection");
                (call.await, true)
            }
        };

        let response = match outcome {
            Ok(value) => {
                let codec = ValueCodec::new(&self.schema).max_depth(self.max_depth);
                match codec.encode(&export.result, &value) {
                    Ok(bytes) => Response::Ok(bytes),
                    Err(e) => {
                        warn!(%interface, %function, error = %e, "handler returned a bad result");
                        Response::Err(format!("failed to encode result: {e}"))
                    }
                }
            }
            Err(message) => {
                debug!(%interface, %function, %message, "handler failed");
                Response::Err(message)
            }
        };
        transport.send(&response.encode()?).await?;
        if pipelined {
            let refusal = Response::Err("connection carries a single request".to_string());
            transport.send(&refusal.encode()?).await?;
        }
        Ok(())
    }

    /// Find the export a request names and decode its parameters, or the
    /// error response to send instead.
    fn route(
        &self,
        frame: &[u8],
    ) -> std::result::Result<(&Export, Record, (String, String)), Response> {
        let request = Request::decode(frame).map_err(|e| {
            warn!(error = %e, "malformed request");
            Response::Err(format!("malformed request: {e}"))
        })?;

        let key = (request.interface, request.function);
        let Some(export) = self.exports.get(&key) else {
            let (interface, function) = &key;
            warn!(%interface, %function, "no such export");
            return Err(Response::Err(format!("no export `{interface}#{function}`")));
        };

        let codec = ValueCodec::new(&self.schema).max_depth(self.max_depth);
        let mut reader = request.payload.as_slice();
        let params = match codec.decode_record(&mut reader, export.params) {
            Ok(_) if !reader.is_empty() => Err(strand_core::Error::TrailingBytes(reader.len())),
            other => other,
        };
        match params {
            Ok(params) => Ok((export, params, key)),
            Err(e) => {
                let (interface, function) = &key;
                warn!(%interface, %function, error = %e, "bad parameters");
                Err(Response::Err(format!("failed to decode parameters: {e}")))
            }
        }
    }
}

/// How the watch over a running call ended
enum Early {
    Done(HandlerResult),
    Pipelined,
    Gone,
}

/// Registers exports before the [`Server`] is frozen
pub struct ServerBuilder {
    schema: Schema,
    exports: HashMap<(String, String), Export>,
    max_depth: usize,
}

impl ServerBuilder {
    /// Export `interface#function` taking the `params` record and returning `result`
    pub fn export(
        mut self,
        interface: impl Into<String>,
        function: impl Into<String>,
        params: RecordId,
        result: Kind,
        handler: impl Handler + 'static,
    ) -> Self {
        self.exports.insert(
            (interface.into(), function.into()),
            Export {
                params,
                result,
                handler: Arc::new(handler),
            },
        );
        self
    }

    /// Set the nesting bound
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Freeze the exports, checking that their record ids belong to the schema
    pub fn build(self) -> Result<Server> {
        for export in self.exports.values() {
            self.schema.record(export.params)?;
            self.schema.check(&export.result)?;
        }
        Ok(Server {
            schema: self.schema,
            exports: self.exports,
            max_depth: self.max_depth,
        })
    }
}

/// In-process [`Connector`]: each connection is a [`MemoryTransport`] pair
/// whose far end is served by the wrapped server.
#[derive(Clone)]
pub struct LoopbackConnector {
    server: Arc<Server>,
}

impl LoopbackConnector {
    pub fn new(server: Arc<Server>) -> Self {
        Self { server }
    }
}

#[async_trait::async_trait]
impl Connector for LoopbackConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        let (local, remote) = MemoryTransport::pair();
        let server = Arc::clone(&self.server);
        tokio::spawn(async move {
            if let Err(e) = server.serve_connection(remote).await {
                warn!(error = %e, "loopback connection failed");
            }
        });
        Ok(Box::new(local))
    }
}
