//! Strand Fabric - Remote invocation over framed transports
//!
//! Each call is an [`Invocation`] that owns one transport: the caller sends
//! a parameter record, then awaits exactly one response (a result value or
//! a remote error). Either side of that exchange can be cancelled.
//!
//! # Example
//!
//! ```no_run
//! use strand_fabric::{transport::TcpConnector, Client};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize)]
//! struct Greet { name: String }
//!
//! #[derive(Deserialize)]
//! struct Greeting { text: String }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let addr = "127.0.0.1:8080".parse()?;
//! let client = Client::new(TcpConnector::new(addr));
//!
//! // One call
//! let greeting: Greeting = client
//!     .call("greeter", "greet", &Greet { name: "world".to_string() })
//!     .await?;
//!
//! // Or drive the steps yourself
//! let mut invocation = client.new_invocation("greeter", "greet");
//! let cancel = invocation.cancel_handle();
//! invocation.send(&Greet { name: "again".to_string() }).await?;
//! # drop(cancel);
//! let greeting: Greeting = invocation.await_typed().await?;
//! # let _ = greeting.text;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod envelope;
pub mod error;
pub mod invocation;
pub mod request;
pub mod server;
pub mod transport;

// Re-exports for convenience
pub use client::{Client, ClientBuilder, ClientConfig};
pub use error::{Error, Result};
pub use invocation::{CancelHandle, Invocation, InvocationState};
pub use server::{Handler, HandlerResult, LoopbackConnector, Server, ServerBuilder};
