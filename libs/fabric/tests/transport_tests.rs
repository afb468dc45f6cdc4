use std::net::SocketAddr;
use std::time::Duration;

use strand_fabric::{
    envelope::{Request, Response},
    error::Error,
    transport::{
        Connector, MemoryTransport, TcpConnector, TcpTransportListener, Transport,
        TransportListener,
    },
    Invocation,
};
use tokio::io::AsyncWriteExt;

/// Bind on a free port
async fn get_listener() -> (TcpTransportListener, SocketAddr) {
    let listener = TcpTransportListener::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

#[tokio::test]
async fn tcp_connector_carries_request_and_response() {
    let (listener, addr) = get_listener().await;

    // Answer with the request payload
    tokio::spawn(async move {
        let mut transport = listener.accept().await.unwrap();
        let request = Request::decode(&transport.receive().await.unwrap()).unwrap();
        assert_eq!(request.interface, "demo");
        assert_eq!(request.function, "echo");
        let response = Response::Ok(request.payload);
        transport.send(&response.encode().unwrap()).await.unwrap();
    });

    let connector = TcpConnector::new(addr);
    assert_eq!(connector.address(), addr);
    let mut client = connector.connect().await.unwrap();

    let request = Request::new("demo", "echo", vec![1, 2, 3]);
    client.send(&request.encode().unwrap()).await.unwrap();
    let frame = client.receive().await.unwrap();
    assert_eq!(Response::decode(&frame).unwrap(), Response::Ok(vec![1, 2, 3]));
}

#[tokio::test]
async fn tcp_receive_timeout_fires() {
    let (listener, addr) = get_listener().await;

    // Hold the connection open, never answer
    tokio::spawn(async move {
        let _transport = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let mut client = TcpConnector::new(addr)
        .io_timeout(Duration::from_millis(100))
        .dial()
        .await
        .unwrap();

    let err = client.receive().await.unwrap_err();
    assert!(matches!(err, Error::Timeout("Receive")), "got {:?}", err);
    assert!(err.is_timeout());
}

#[tokio::test]
async fn tcp_rejects_oversized_frame_header() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    // Claim 200MB, over the default limit
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.write_u32(200 * 1024 * 1024).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let mut client = TcpConnector::new(addr).dial().await.unwrap();
    match client.receive().await {
        Err(Error::InvalidFrame(msg)) => assert!(msg.contains("too large")),
        other => panic!("Expected InvalidFrame error, got {:?}", other),
    }
}

#[tokio::test]
async fn tcp_sender_rejects_frame_over_limit() {
    let (listener, addr) = get_listener().await;

    tokio::spawn(async move {
        let _transport = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let mut client = TcpConnector::new(addr)
        .max_frame_size(16)
        .dial()
        .await
        .unwrap();

    match client.send(&[0u8; 17]).await {
        Err(Error::InvalidFrame(msg)) => assert!(msg.contains("too large")),
        other => panic!("Expected InvalidFrame error, got {:?}", other),
    }
    client.send(&[0u8; 16]).await.unwrap();
}

#[tokio::test]
async fn listener_frame_limit_applies_to_accepted_connections() {
    let (listener, addr) = get_listener().await;
    let listener = listener.with_max_frame_size(4);

    let mut client = TcpConnector::new(addr).dial().await.unwrap();
    client.send(b"too long").await.unwrap();

    let mut server = listener.accept().await.unwrap();
    match server.receive().await {
        Err(Error::InvalidFrame(msg)) => assert!(msg.contains("too large")),
        other => panic!("Expected InvalidFrame error, got {:?}", other),
    }
}

#[tokio::test]
async fn oversized_response_fails_invocation_as_transport_error() {
    let (listener, addr) = get_listener().await;

    tokio::spawn(async move {
        let mut transport = listener.accept().await.unwrap();
        transport.receive().await.unwrap();
        let response = Response::Ok(vec![0; 64]);
        transport.send(&response.encode().unwrap()).await.unwrap();
    });

    // Room for the request, not for the response
    let transport = TcpConnector::new(addr)
        .max_frame_size(32)
        .dial()
        .await
        .unwrap();
    let mut invocation = Invocation::over(transport, "demo", "echo");
    invocation.send(&5u32).await.unwrap();

    let err = invocation.await_typed::<Vec<u8>>().await.unwrap_err();
    assert!(err.is_transport(), "got {:?}", err);
    assert!(matches!(err.root_cause(), Error::InvalidFrame(_)));
}

#[tokio::test]
async fn tcp_peer_close_is_connection_closed() {
    let (listener, addr) = get_listener().await;

    tokio::spawn(async move {
        let mut transport = listener.accept().await.unwrap();
        transport.close().await.unwrap();
    });

    let mut client = TcpConnector::new(addr).dial().await.unwrap();
    match client.receive().await {
        Err(Error::ConnectionClosed) => {}
        other => panic!("Expected ConnectionClosed, got {:?}", other),
    }
}

#[tokio::test]
async fn listener_is_usable_through_the_trait() {
    async fn accept_generic<L: TransportListener>(listener: &L) -> Vec<u8> {
        let mut transport = listener.accept().await.unwrap();
        transport.receive().await.unwrap()
    }

    let (listener, addr) = get_listener().await;
    let client = tokio::spawn(async move {
        let mut client = TcpConnector::new(addr).connect().await.unwrap();
        client.send(b"generic").await.unwrap();
        client
    });

    assert_eq!(accept_generic(&listener).await, b"generic");
    drop(client.await.unwrap());
}

// In-memory transport tests

#[tokio::test]
async fn memory_pair_preserves_boundaries() {
    let (mut left, mut right) = MemoryTransport::pair();

    tokio::spawn(async move {
        for _ in 0..3 {
            let msg = right.receive().await.unwrap();
            right.send(&msg).await.unwrap();
        }
    });

    for msg in [b"first".to_vec(), Vec::new(), b"third".to_vec()] {
        left.send(&msg).await.unwrap();
        assert_eq!(left.receive().await.unwrap(), msg);
    }
}

#[tokio::test]
async fn memory_close_is_seen_as_connection_closed() {
    let (mut left, mut right) = MemoryTransport::pair();
    left.close().await.unwrap();

    match right.receive().await {
        Err(Error::ConnectionClosed) => {}
        other => panic!("Expected ConnectionClosed, got {:?}", other),
    }
}

#[tokio::test]
async fn memory_frame_limit_applies_to_receiver() {
    let (mut left, right) = MemoryTransport::pair();
    let mut right = right.with_max_frame_size(4);

    left.send(b"too long").await.unwrap();
    match right.receive().await {
        Err(Error::InvalidFrame(msg)) => assert!(msg.contains("too large")),
        other => panic!("Expected InvalidFrame error, got {:?}", other),
    }
}
