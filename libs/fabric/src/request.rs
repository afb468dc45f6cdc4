use std::net::SocketAddr;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::Client;
use crate::error::Result;
use crate::transport::TcpConnector;

/// Perform a one-off typed call over TCP
///
/// Opens a connection, sends the request, waits for the response and closes
/// the connection.
pub async fn invoke_tcp<P, R>(
    addr: SocketAddr,
    interface: &str,
    function: &str,
    params: &P,
) -> Result<R>
where
    P: Serialize + ?Sized,
    R: DeserializeOwned,
{
    Client::new(TcpConnector::new(addr))
        .call(interface, function, params)
        .await
}
