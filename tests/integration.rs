//! Integration tests for subwire-client.
//!
//! Sessions are driven against an in-process publisher: a test connector hands
//! the client one end of an in-memory pipe and the test keeps the other.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use subwire_client::codec::{Codec, MsgPackCodec};
use subwire_client::protocol::{read_body, read_header, write_heartbeat, WireHeader};
use subwire_client::transport::{BoxedStream, Connect, ConnectFuture};
use subwire_client::{
    ProtocolException, SessionState, SubscriptionError, SubscriptionRegistry, SubwireError, Topic,
    TopicDescriptor,
};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

/// Connector that pairs every dial with a publisher-side stream for the test.
struct PipeConnector {
    accepted: mpsc::UnboundedSender<(SocketAddr, DuplexStream)>,
}

impl Connect for PipeConnector {
    fn connect(&self, endpoint: SocketAddr) -> ConnectFuture {
        let (client, publisher) = tokio::io::duplex(64 * 1024);
        let _ = self.accepted.send((endpoint, publisher));
        Box::pin(async move { Ok(Box::new(client) as BoxedStream) })
    }
}

/// Topic delivering raw message bodies.
struct RawTopic(&'static str);

impl TopicDescriptor for RawTopic {
    type Message = Vec<u8>;

    fn name(&self) -> &str {
        self.0
    }

    fn pack_topic<C: Codec>(&self, codec: &C) -> subwire_client::Result<Vec<u8>> {
        codec.pack(self.0)
    }

    fn unpack<C: Codec>(&self, _codec: &C, bytes: &[u8]) -> subwire_client::Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Tick {
    symbol: String,
    price: u64,
}

fn setup() -> (
    SubscriptionRegistry,
    mpsc::UnboundedReceiver<(SocketAddr, DuplexStream)>,
) {
    let (accepted, rx) = mpsc::unbounded_channel();
    let registry = SubscriptionRegistry::builder()
        .connector(PipeConnector { accepted })
        .build();
    (registry, rx)
}

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Accept the next dial and consume its subscribe request, returning the body.
async fn accept(
    rx: &mut mpsc::UnboundedReceiver<(SocketAddr, DuplexStream)>,
) -> (DuplexStream, Vec<u8>) {
    let (_, mut publisher) = rx.recv().await.expect("no dial");
    let header = read_header(&mut publisher).await.unwrap();
    let body = read_body(&mut publisher, header.length).await.unwrap();
    (publisher, body.to_vec())
}

async fn send_frame(publisher: &mut DuplexStream, code: u32, body: &[u8]) {
    let header = WireHeader::new(body.len() as u32, code);
    publisher.write_all(&header.encode()).await.unwrap();
    publisher.write_all(body).await.unwrap();
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_handshake_carries_procedure_and_topic() {
    let (registry, mut rx) = setup();
    let topic: Topic<&str, Tick> = Topic::new("prices", "ACME");
    registry.subscribe(addr(9000), topic, |_| {}).unwrap();

    let (_publisher, body) = accept(&mut rx).await;

    let mut expected = b"sub_topic\0".to_vec();
    expected.extend(MsgPackCodec::encode("ACME").unwrap());
    assert_eq!(body, expected);
}

#[tokio::test]
async fn test_duplicate_subscribe_fails_and_keeps_one_session() {
    let (registry, _rx) = setup();
    registry
        .subscribe(addr(9000), RawTopic("prices"), |_| {})
        .unwrap();

    let err = registry
        .subscribe(addr(9000), RawTopic("prices"), |_| {})
        .unwrap_err();

    assert!(matches!(err, SubwireError::AlreadySubscribed { .. }));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.topics(addr(9000)), vec!["prices"]);
}

#[tokio::test]
async fn test_frames_delivered_in_order_and_heartbeat_acks_skipped() {
    let (registry, mut rx) = setup();
    let (tx, mut messages) = mpsc::unbounded_channel();
    registry
        .subscribe(addr(9000), RawTopic("prices"), move |body: Vec<u8>| {
            let _ = tx.send(body);
        })
        .unwrap();

    let (mut publisher, _) = accept(&mut rx).await;
    send_frame(&mut publisher, 0, b"").await;

    let first = vec![0x37u8; 37];
    let second = vec![0x12u8; 12];
    let mut burst = Vec::new();
    burst.extend(WireHeader::new(37, 0).encode());
    burst.extend(&first);
    burst.extend(WireHeader::heartbeat().encode());
    burst.extend(WireHeader::new(12, 0).encode());
    burst.extend(&second);
    publisher.write_all(&burst).await.unwrap();

    assert_eq!(messages.recv().await.unwrap(), first);
    assert_eq!(messages.recv().await.unwrap(), second);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(messages.try_recv().is_err());
}

#[tokio::test]
async fn test_rejection_reaches_error_callback_and_removes_session() {
    let (registry, mut rx) = setup();
    let (tx, mut errors) = mpsc::unbounded_channel();
    registry
        .subscribe_with_error(
            addr(9000),
            RawTopic("prices"),
            |_| {},
            move |err: &SubscriptionError| {
                let _ = tx.send(err.clone());
            },
        )
        .unwrap();

    let (mut publisher, _) = accept(&mut rx).await;
    let exception = ProtocolException::new("Denied", "topic unknown");
    send_frame(&mut publisher, 1, &MsgPackCodec::encode(&exception).unwrap()).await;

    let err = errors.recv().await.unwrap();
    assert_eq!(err, SubscriptionError::ServerRejected(exception));

    eventually(|| !registry.contains(addr(9000), "prices")).await;
    assert!(registry.endpoints().is_empty());
}

#[tokio::test]
async fn test_ok_ack_without_body_starts_receive_and_heartbeat() {
    let (accepted, mut rx) = mpsc::unbounded_channel();
    let registry = SubscriptionRegistry::builder()
        .connector(PipeConnector { accepted })
        .heartbeat_interval(Duration::from_millis(20))
        .build();
    let (tx, mut messages) = mpsc::unbounded_channel();
    let session = registry
        .subscribe(addr(9000), RawTopic("prices"), move |body: Vec<u8>| {
            let _ = tx.send(body);
        })
        .unwrap();

    let (mut publisher, _) = accept(&mut rx).await;
    send_frame(&mut publisher, 0, b"").await;

    let ping = read_header(&mut publisher).await.unwrap();
    assert!(ping.is_heartbeat());
    write_heartbeat(&mut publisher).await.unwrap();
    assert_eq!(session.state(), SessionState::Active);

    send_frame(&mut publisher, 0, b"live").await;
    assert_eq!(messages.recv().await.unwrap(), b"live");
}

#[tokio::test]
async fn test_malformed_handshake_reply_is_reported() {
    let (registry, mut rx) = setup();
    let (tx, mut errors) = mpsc::unbounded_channel();
    registry
        .subscribe_with_error(
            addr(9000),
            RawTopic("prices"),
            |_| {},
            move |err: &SubscriptionError| {
                let _ = tx.send(err.clone());
            },
        )
        .unwrap();

    let (mut publisher, _) = accept(&mut rx).await;
    send_frame(&mut publisher, 1, b"").await;

    let err = errors.recv().await.unwrap();
    assert_eq!(err, SubscriptionError::MalformedHandshakeReply { result_code: 1 });
    eventually(|| registry.is_empty()).await;
}

#[tokio::test]
async fn test_no_callback_after_stop() {
    stop_silences_callbacks().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_callback_after_stop_multi_thread() {
    for _ in 0..10 {
        stop_silences_callbacks().await;
    }
}

/// Stop an active session, then feed it a message and a hangup.
async fn stop_silences_callbacks() {
    let (registry, mut rx) = setup();
    let (msg_tx, mut messages) = mpsc::unbounded_channel();
    let (err_tx, mut errors) = mpsc::unbounded_channel();
    let session = registry
        .subscribe_with_error(
            addr(9000),
            RawTopic("prices"),
            move |body: Vec<u8>| {
                let _ = msg_tx.send(body);
            },
            move |err: &SubscriptionError| {
                let _ = err_tx.send(err.clone());
            },
        )
        .unwrap();

    let (mut publisher, _) = accept(&mut rx).await;
    send_frame(&mut publisher, 0, b"").await;
    send_frame(&mut publisher, 0, b"before").await;
    assert_eq!(messages.recv().await.unwrap(), b"before");

    session.stop();
    assert_eq!(session.state(), SessionState::Stopped);

    // Messages and a hangup arriving afterwards must stay silent.
    let _ = publisher.write_all(&WireHeader::new(5, 0).encode()).await;
    let _ = publisher.write_all(b"after").await;
    drop(publisher);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(messages.try_recv().is_err());
    assert!(errors.try_recv().is_err());

    // Stopping alone does not deregister; the session is still listed.
    assert!(registry.contains(addr(9000), "prices"));
}

#[tokio::test]
async fn test_remove_twice_is_noop() {
    let (registry, _rx) = setup();
    let session = registry
        .subscribe(addr(9000), RawTopic("prices"), |_| {})
        .unwrap();

    assert!(registry.remove(&session));
    assert!(!registry.remove(&session));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_endpoint_with_two_topics() {
    let (registry, mut rx) = setup();
    let (tx, mut messages) = mpsc::unbounded_channel();
    let prices = registry
        .subscribe(addr(9000), RawTopic("prices"), |_| {})
        .unwrap();
    let orders = registry
        .subscribe(addr(9000), RawTopic("orders"), move |body: Vec<u8>| {
            let _ = tx.send(body);
        })
        .unwrap();

    let first = accept(&mut rx).await;
    let second = accept(&mut rx).await;
    let orders_topic = MsgPackCodec::encode("orders").unwrap();
    let (mut orders_pub, _prices_pub) = if first.1.ends_with(&orders_topic) {
        (first.0, second.0)
    } else {
        assert!(second.1.ends_with(&orders_topic));
        (second.0, first.0)
    };

    registry.remove(&prices);
    prices.stop();
    assert_eq!(registry.topics(addr(9000)), vec!["orders"]);

    send_frame(&mut orders_pub, 0, b"").await;
    send_frame(&mut orders_pub, 0, b"order-1").await;
    assert_eq!(messages.recv().await.unwrap(), b"order-1");

    registry.remove(&orders);
    assert!(registry.endpoints().is_empty());
}

#[tokio::test]
async fn test_resubscribe_after_failure() {
    let (registry, mut rx) = setup();
    registry
        .subscribe(addr(9000), RawTopic("prices"), |_| {})
        .unwrap();

    let (publisher, _) = accept(&mut rx).await;
    drop(publisher);
    eventually(|| registry.is_empty()).await;

    let session = registry
        .subscribe(addr(9000), RawTopic("prices"), |_| {})
        .unwrap();
    let (_publisher, _) = accept(&mut rx).await;
    assert_eq!(session.state(), SessionState::Handshaking);
}

#[tokio::test]
async fn test_typed_messages_skip_undecodable_bodies() {
    let (registry, mut rx) = setup();
    let (tx, mut ticks) = mpsc::unbounded_channel();
    let topic: Topic<&str, Tick> = Topic::new("prices", "ACME");
    let session = registry
        .subscribe(addr(9000), topic, move |tick: Tick| {
            let _ = tx.send(tick);
        })
        .unwrap();

    let (mut publisher, _) = accept(&mut rx).await;
    send_frame(&mut publisher, 0, b"").await;

    let tick = Tick {
        symbol: "ACME".to_string(),
        price: 1250,
    };
    send_frame(&mut publisher, 0, &[0xc1]).await;
    send_frame(&mut publisher, 0, &MsgPackCodec::encode(&tick).unwrap()).await;

    assert_eq!(ticks.recv().await.unwrap(), tick);
    assert_eq!(session.state(), SessionState::Active);
}

#[tokio::test]
async fn test_over_tcp() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = listener.local_addr().unwrap();

    let publisher = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let header = read_header(&mut socket).await.unwrap();
        let body = read_body(&mut socket, header.length).await.unwrap();
        assert!(body.starts_with(b"sub_topic\0"));

        let mut reply = WireHeader::new(0, 0).encode().to_vec();
        let payload = MsgPackCodec::encode("hello over tcp").unwrap();
        reply.extend(WireHeader::new(payload.len() as u32, 0).encode());
        reply.extend(payload);
        socket.write_all(&reply).await.unwrap();
        socket
    });

    let registry = SubscriptionRegistry::new();
    let (tx, mut messages) = mpsc::unbounded_channel();
    let topic: Topic<&str, String> = Topic::new("greetings", "all");
    registry
        .subscribe(endpoint, topic, move |text: String| {
            let _ = tx.send(text);
        })
        .unwrap();

    assert_eq!(messages.recv().await.unwrap(), "hello over tcp");
    let _socket = publisher.await.unwrap();
    registry.shutdown();
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_registry_drop_stops_sessions() {
    let (registry, mut rx) = setup();
    let session = registry
        .subscribe(addr(9000), RawTopic("prices"), |_| {})
        .unwrap();
    let (_publisher, _) = accept(&mut rx).await;

    drop(registry);
    assert_eq!(session.state(), SessionState::Stopped);
}
