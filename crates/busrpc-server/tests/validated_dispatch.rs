//! Server-side dispatch behavior over the in-memory bus.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::Deserialize;
use serde_json::{json, Value};

use busrpc_client::{ClientConfig, RequestOverrides, RpcClient};
use busrpc_json_rpc::{json_payload, JsonRpcRequest, JsonRpcSuccess, PayloadError};
use busrpc_server::{BusServer, FnInvalidMessageHandler, FnMessageHandler};
use busrpc_transport::{BoxedBus, Delivery, FnDeliveryHandler, InMemoryBus, QueueOptions};

const EXCHANGE: &str = "services";

fn setup() -> (Arc<InMemoryBus>, BusServer) {
    let bus = Arc::new(InMemoryBus::new());
    let server = BusServer::new(bus.clone() as BoxedBus, EXCHANGE);
    (bus, server)
}

fn accept_a2(value: &Value) -> Result<Value, PayloadError> {
    if value.get("a") == Some(&json!(2)) {
        Ok(value.clone())
    } else {
        Err(PayloadError::new("'a' must be 2"))
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn validate_handler_splits_valid_and_invalid_messages() {
    let (bus, server) = setup();

    let handled = Arc::new(AtomicUsize::new(0));
    let diverted = Arc::new(AtomicUsize::new(0));

    let handled_count = handled.clone();
    let handler = Arc::new(FnMessageHandler::new(move |_payload: Value, _msg| {
        let handled_count = handled_count.clone();
        async move {
            handled_count.fetch_add(1, Ordering::SeqCst);
        }
        .boxed()
    }));
    let diverted_count = diverted.clone();
    let invalid = Arc::new(FnInvalidMessageHandler::new(move |error, _msg| {
        let diverted_count = diverted_count.clone();
        async move {
            assert!(error.is_payload());
            diverted_count.fetch_add(1, Ordering::SeqCst);
        }
        .boxed()
    }));

    server
        .add_validate_handler("measurements", handler, accept_a2, invalid, None)
        .await
        .unwrap();
    server.start_pending_subscriptions().await.unwrap();

    let client = RpcClient::new(bus as BoxedBus, ClientConfig::new(EXCHANGE));
    client
        .publish(json!({"a": 1}), "measurements", RequestOverrides::default())
        .await
        .unwrap();
    client
        .publish(json!({"a": 2}), "measurements", RequestOverrides::default())
        .await
        .unwrap();

    settle().await;
    assert_eq!(handled.load(Ordering::SeqCst), 1);
    assert_eq!(diverted.load(Ordering::SeqCst), 1);
}

#[derive(Debug, Deserialize, PartialEq)]
struct SumParams {
    a: i64,
    b: i64,
}

#[tokio::test]
async fn rpc_validate_handler_round_trip() {
    let (bus, server) = setup();

    let handler = Arc::new(FnMessageHandler::new(
        |request: JsonRpcRequest<SumParams>, msg| {
            async move {
                let sum = request.params.a + request.params.b;
                let reply = JsonRpcSuccess::new(request.id.clone(), json!({"sum": sum}));
                msg.reply(serde_json::to_value(&reply).unwrap()).await.unwrap();
                msg.ack().await.unwrap();
            }
            .boxed()
        },
    ));
    let invalid = Arc::new(FnInvalidMessageHandler::new(|error, _msg| {
        async move { panic!("unexpected invalid message: {}", error) }.boxed()
    }));

    server
        .add_rpc_validate_handler("math.sum", handler, json_payload::<SumParams>(), invalid, None)
        .await
        .unwrap();
    server.start_pending_subscriptions().await.unwrap();

    #[derive(Debug, Deserialize, PartialEq)]
    struct SumResult {
        sum: i64,
    }

    let client = RpcClient::new(bus as BoxedBus, ClientConfig::new(EXCHANGE));
    let request = JsonRpcRequest::new(7, "math.sum", json!({"a": 2, "b": 3}));
    let reply = client
        .high_level_rpc_request(
            serde_json::to_value(&request).unwrap(),
            "math.sum",
            json_payload::<SumResult>(),
            RequestOverrides::default(),
        )
        .await
        .unwrap();

    assert_eq!(reply.response.result, SumResult { sum: 5 });
}

#[tokio::test]
async fn rpc_validate_handler_diverts_bad_envelopes() {
    let (bus, server) = setup();

    let diverted = Arc::new(AtomicUsize::new(0));
    let diverted_count = diverted.clone();

    let handler = Arc::new(FnMessageHandler::new(
        |_request: JsonRpcRequest<SumParams>, _msg| async move { panic!("must not run") }.boxed(),
    ));
    let invalid = Arc::new(FnInvalidMessageHandler::new(move |error, msg| {
        let diverted_count = diverted_count.clone();
        async move {
            assert!(error.is_envelope());
            // Validation failures do not get an implicit ack; this callback
            // decides, and here it discards the message.
            msg.reject().await.unwrap();
            diverted_count.fetch_add(1, Ordering::SeqCst);
        }
        .boxed()
    }));

    server
        .add_rpc_validate_handler("math.sum", handler, json_payload::<SumParams>(), invalid, None)
        .await
        .unwrap();
    server.start_pending_subscriptions().await.unwrap();

    let client = RpcClient::new(bus.clone() as BoxedBus, ClientConfig::new(EXCHANGE));
    client
        .publish(json!({"method": "math.sum"}), "math.sum", RequestOverrides::default())
        .await
        .unwrap();

    settle().await;
    assert_eq!(diverted.load(Ordering::SeqCst), 1);
    assert_eq!(bus.stats().rejected, 1);
}

#[tokio::test]
async fn pending_subscriptions_register_once_and_drain() {
    let (bus, server) = setup();

    server
        .add_queue("alpha", QueueOptions::default())
        .await
        .unwrap();
    server
        .add_queue("alpha", QueueOptions::default())
        .await
        .unwrap();
    server
        .add_queue("beta", QueueOptions::default())
        .await
        .unwrap();

    assert_eq!(server.pending_subscriptions(), vec!["alpha", "beta"]);

    server
        .bind_queue("alpha", &["alpha".to_string()], None)
        .await
        .unwrap();

    let received = Arc::new(AtomicUsize::new(0));
    let received_count = received.clone();
    let handler = Arc::new(FnDeliveryHandler::new(move |_delivery: Delivery| {
        let received_count = received_count.clone();
        async move {
            received_count.fetch_add(1, Ordering::SeqCst);
        }
        .boxed()
    }));
    server
        .add_handler("alpha", handler, Default::default())
        .await
        .unwrap();

    let client = RpcClient::new(bus as BoxedBus, ClientConfig::new(EXCHANGE));
    client
        .publish(json!({"n": 1}), "alpha", RequestOverrides::default())
        .await
        .unwrap();

    // Not subscribed yet: the message waits in the backlog.
    settle().await;
    assert_eq!(received.load(Ordering::SeqCst), 0);

    server.start_pending_subscriptions().await.unwrap();
    settle().await;
    assert_eq!(received.load(Ordering::SeqCst), 1);
    assert!(server.pending_subscriptions().is_empty());
}

#[tokio::test]
async fn unrouted_messages_reach_the_fallback_handler() {
    let (bus, server) = setup();

    let seen = Arc::new(AtomicUsize::new(0));
    let seen_count = seen.clone();
    let handler = Arc::new(FnDeliveryHandler::new(move |delivery: Delivery| {
        let seen_count = seen_count.clone();
        async move {
            assert_eq!(delivery.routing_key, "nowhere");
            seen_count.fetch_add(1, Ordering::SeqCst);
        }
        .boxed()
    }));
    server.on_unrouted(handler).await.unwrap();

    let client = RpcClient::new(bus as BoxedBus, ClientConfig::new(EXCHANGE));
    client
        .publish(json!({"n": 1}), "nowhere", RequestOverrides::default())
        .await
        .unwrap();

    settle().await;
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn auto_subscribed_queue_is_not_registered_as_pending() {
    let (_bus, server) = setup();

    let options = QueueOptions {
        subscribe: true,
        ..QueueOptions::default()
    };
    server.add_queue("live", options).await.unwrap();

    assert!(server.pending_subscriptions().is_empty());
}
