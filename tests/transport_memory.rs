// tests/transport_memory.rs

use bytes::Bytes;
use tokio::time::{timeout, Duration};

use pubsub_rpc::{
    // ---
    create_memory_transport,
    Address,
    CorrelationId,
    Envelope,
    MemoryHub,
};

#[tokio::test]
async fn memory_subscribe_then_publish_delivers() {
    // ---
    // Arrange
    // ---
    let hub = MemoryHub::new();
    let publisher = create_memory_transport("mstpd-pub", hub.clone());
    let subscriber = create_memory_transport("mstpd-sub", hub.clone());

    let address = Address::from("test.address");

    let mut sub = subscriber
        .subscribe(address.clone().into(), 16)
        .await
        .expect("subscribe failed");

    let payload = Bytes::from_static(b"hello");
    let correlation_id = CorrelationId::generate();

    let env = Envelope::request(
        address.clone(),
        payload.clone(),
        correlation_id,
        Address::from("test.replies"),
    );

    // ---
    // Act
    // ---
    publisher.publish(env).await.expect("publish failed");

    // ---
    // Assert
    // ---
    let received = timeout(Duration::from_millis(100), sub.inbox.recv())
        .await
        .expect("timed out waiting for message")
        .expect("subscription channel closed unexpectedly");

    assert_eq!(received.payload, payload);
    assert_eq!(received.address, address);
    assert_eq!(received.correlation_id(), Some(correlation_id));
    assert_eq!(received.reply_to, Some(Address::from("test.replies")));
}

#[tokio::test]
async fn memory_hubs_are_isolated() {
    // ---
    let left = create_memory_transport("left", MemoryHub::new());
    let right = create_memory_transport("right", MemoryHub::new());

    let mut sub = right
        .subscribe("shared.name".into(), 4)
        .await
        .expect("subscribe failed");

    let env = Envelope::response(
        Address::from("shared.name"),
        Bytes::from_static(b"x"),
        CorrelationId::generate(),
    );
    left.publish(env).await.expect("publish failed");

    assert!(timeout(Duration::from_millis(50), sub.inbox.recv()).await.is_err());
}

#[tokio::test]
async fn memory_fanout_to_every_subscriber() {
    // ---
    let hub = MemoryHub::new();
    let transport = create_memory_transport("fanout", hub.clone());

    let mut first = transport.subscribe("fan".into(), 4).await.unwrap();
    let mut second = transport.subscribe("fan".into(), 4).await.unwrap();
    assert_eq!(hub.subscriber_count("fan").await, 2);

    let env = Envelope::response(Address::from("fan"), Bytes::new(), CorrelationId::generate());
    transport.publish(env).await.unwrap();

    assert!(first.inbox.recv().await.is_some());
    assert!(second.inbox.recv().await.is_some());
}
