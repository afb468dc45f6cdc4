use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strand_core::record::DEFAULT_MAX_DEPTH;
use strand_core::{Kind, Record, RecordId, Schema, Value};

use crate::error::{Error, Result};
use crate::invocation::Invocation;
use crate::transport::Connector;

/// Tunables shared by every invocation a [`Client`] creates
///
/// Durations are in milliseconds so the struct can be embedded in an
/// application's own config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bound on establishing the per-invocation transport
    pub connect_timeout_ms: Option<u64>,
    /// Bound on waiting for the response once parameters are sent
    pub response_timeout_ms: Option<u64>,
    /// Nesting bound for encoding parameters and decoding results
    pub max_depth: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: None,
            response_timeout_ms: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout_ms.map(Duration::from_millis)
    }
}

/// Long-lived handle that creates invocations
///
/// Each invocation gets its own transport from the connector; connection
/// reuse and multiplexing are the connector's business.
#[derive(Clone)]
pub struct Client {
    connector: Arc<dyn Connector>,
    config: ClientConfig,
}

impl Client {
    /// Create a client with default settings
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Arc::new(connector),
            config: ClientConfig::default(),
        }
    }

    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start a call to `interface#function`. Nothing touches the wire until
    /// parameters are sent.
    pub fn new_invocation(&self, interface: impl Into<String>, function: impl Into<String>) -> Invocation {
        Invocation::new(
            interface,
            function,
            Arc::clone(&self.connector),
            self.config.clone(),
        )
    }

    /// Send `params` and wait for a result of kind `result`
    pub async fn invoke(
        &self,
        interface: &str,
        function: &str,
        schema: &Schema,
        params: RecordId,
        record: &Record,
        result: &Kind,
    ) -> Result<Value> {
        let mut invocation = self.new_invocation(interface, function);
        invocation.send_parameters(schema, params, record).await?;
        invocation.await_result(schema, result).await
    }

    /// Typed call: parameters and result go through the serde codec
    pub async fn call<P, R>(&self, interface: &str, function: &str, params: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut invocation = self.new_invocation(interface, function);
        invocation.send(params).await?;
        invocation.await_typed().await
    }
}

/// Builder for configuring a [`Client`]
#[derive(Default)]
pub struct ClientBuilder {
    connector: Option<Arc<dyn Connector>>,
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connector that supplies transports
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Replace all tunables at once
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set the response timeout
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set the nesting bound
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    pub fn build(self) -> Result<Client> {
        let connector = self
            .connector
            .ok_or_else(|| Error::Custom("Connector not set".to_string()))?;
        Ok(Client {
            connector,
            config: self.config,
        })
    }
}
