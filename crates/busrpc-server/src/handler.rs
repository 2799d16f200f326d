//! The validated handler wrapper.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use busrpc_json_rpc::{validate_request, JsonRpcRequest, PayloadError, ValidateError};
use busrpc_transport::{Delivery, DeliveryHandler};

/// Business handler for a message whose body already passed validation
///
/// `Out` is whatever the validator narrowed the body to: the caller's
/// payload type for raw validation, a typed [`JsonRpcRequest`] for the
/// RPC-flavored variant. Acknowledgement is the handler's business (or the
/// bus's default policy); the wrapper does not ack for it.
#[async_trait]
pub trait MessageHandler<Out: Send>: Send + Sync {
    async fn handle(&self, payload: Out, message: Delivery);
}

/// Callback for messages that failed validation
///
/// Receives the validation error and the raw delivery, so it can log,
/// dead-letter or nack the message. Infallible by signature: there is
/// nowhere further for a failure to go.
#[async_trait]
pub trait InvalidMessageHandler: Send + Sync {
    async fn handle(&self, error: ValidateError, message: Delivery);
}

/// Adapter turning a closure into a [`MessageHandler`]
pub struct FnMessageHandler<Out, F>
where
    Out: Send,
    F: Fn(Out, Delivery) -> BoxFuture<'static, ()> + Send + Sync,
{
    handler_fn: F,
    _marker: PhantomData<fn(Out)>,
}

impl<Out, F> FnMessageHandler<Out, F>
where
    Out: Send,
    F: Fn(Out, Delivery) -> BoxFuture<'static, ()> + Send + Sync,
{
    pub fn new(handler_fn: F) -> Self {
        Self {
            handler_fn,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<Out, F> MessageHandler<Out> for FnMessageHandler<Out, F>
where
    Out: Send + 'static,
    F: Fn(Out, Delivery) -> BoxFuture<'static, ()> + Send + Sync,
{
    async fn handle(&self, payload: Out, message: Delivery) {
        (self.handler_fn)(payload, message).await
    }
}

/// Adapter turning a closure into an [`InvalidMessageHandler`]
pub struct FnInvalidMessageHandler<F>
where
    F: Fn(ValidateError, Delivery) -> BoxFuture<'static, ()> + Send + Sync,
{
    handler_fn: F,
}

impl<F> FnInvalidMessageHandler<F>
where
    F: Fn(ValidateError, Delivery) -> BoxFuture<'static, ()> + Send + Sync,
{
    pub fn new(handler_fn: F) -> Self {
        Self { handler_fn }
    }
}

#[async_trait]
impl<F> InvalidMessageHandler for FnInvalidMessageHandler<F>
where
    F: Fn(ValidateError, Delivery) -> BoxFuture<'static, ()> + Send + Sync,
{
    async fn handle(&self, error: ValidateError, message: Delivery) {
        (self.handler_fn)(error, message).await
    }
}

/// Wraps a validator, a business handler and an invalid-message callback
/// into one [`DeliveryHandler`]
///
/// Per message: run the validator; on success call the business handler
/// with the narrowed payload, on failure call the invalid-message callback.
/// Never both, and a validation failure never escapes the wrapper. The
/// wrapper holds no per-message state across dispatches.
pub struct ValidatedHandler<Out, V>
where
    Out: Send,
    V: Fn(&Value) -> Result<Out, ValidateError> + Send + Sync,
{
    validator: V,
    handler: Arc<dyn MessageHandler<Out>>,
    invalid: Arc<dyn InvalidMessageHandler>,
}

impl<Out, V> ValidatedHandler<Out, V>
where
    Out: Send,
    V: Fn(&Value) -> Result<Out, ValidateError> + Send + Sync,
{
    pub fn new(
        validator: V,
        handler: Arc<dyn MessageHandler<Out>>,
        invalid: Arc<dyn InvalidMessageHandler>,
    ) -> Self {
        Self {
            validator,
            handler,
            invalid,
        }
    }
}

#[async_trait]
impl<Out, V> DeliveryHandler for ValidatedHandler<Out, V>
where
    Out: Send + 'static,
    V: Fn(&Value) -> Result<Out, ValidateError> + Send + Sync,
{
    async fn handle(&self, delivery: Delivery) {
        match (self.validator)(&delivery.body) {
            Ok(payload) => self.handler.handle(payload, delivery).await,
            Err(error) => {
                debug!(
                    routing_key = %delivery.routing_key,
                    error = %error,
                    "message failed validation, diverting to invalid-message handler"
                );
                self.invalid.handle(error, delivery).await;
            }
        }
    }
}

/// Validated handler for raw payloads: the caller's validator checks the
/// whole message body.
pub fn validated_handler<T, V>(
    validator: V,
    handler: Arc<dyn MessageHandler<T>>,
    invalid: Arc<dyn InvalidMessageHandler>,
) -> ValidatedHandler<T, impl Fn(&Value) -> Result<T, ValidateError> + Send + Sync>
where
    T: Send + 'static,
    V: Fn(&Value) -> Result<T, PayloadError> + Send + Sync + 'static,
{
    ValidatedHandler::new(
        move |body: &Value| validator(body).map_err(ValidateError::from),
        handler,
        invalid,
    )
}

/// Validated handler for JSON-RPC requests: the body must be a valid
/// request envelope and its `params` must satisfy the caller's validator.
pub fn rpc_validated_handler<T, V>(
    params_validator: V,
    handler: Arc<dyn MessageHandler<JsonRpcRequest<T>>>,
    invalid: Arc<dyn InvalidMessageHandler>,
) -> ValidatedHandler<JsonRpcRequest<T>, impl Fn(&Value) -> Result<JsonRpcRequest<T>, ValidateError> + Send + Sync>
where
    T: Send + 'static,
    V: Fn(&Value) -> Result<T, PayloadError> + Send + Sync + 'static,
{
    ValidatedHandler::new(
        move |body: &Value| validate_request(body, &params_validator),
        handler,
        invalid,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use busrpc_transport::DeliveryOps;
    use busrpc_transport::TransportError;

    struct NoopOps;

    #[async_trait]
    impl DeliveryOps for NoopOps {
        async fn ack(&self) -> Result<(), TransportError> {
            Ok(())
        }
        async fn nack(&self) -> Result<(), TransportError> {
            Ok(())
        }
        async fn reject(&self) -> Result<(), TransportError> {
            Ok(())
        }
        async fn reply(&self, _body: Value) -> Result<(), TransportError> {
            Err(TransportError::NoReplyAddress)
        }
    }

    fn delivery(body: Value) -> Delivery {
        Delivery::new(body, "test", None, Arc::new(NoopOps))
    }

    fn accept_a2(value: &Value) -> Result<Value, PayloadError> {
        if value.get("a") == Some(&json!(2)) {
            Ok(value.clone())
        } else {
            Err(PayloadError::new("'a' must be 2"))
        }
    }

    struct Counters {
        handled: AtomicUsize,
        diverted: AtomicUsize,
    }

    fn counting_wrapper(
        counters: Arc<Counters>,
    ) -> ValidatedHandler<Value, impl Fn(&Value) -> Result<Value, ValidateError> + Send + Sync>
    {
        let handled = counters.clone();
        let handler = Arc::new(FnMessageHandler::new(move |_payload: Value, _msg| {
            let handled = handled.clone();
            async move {
                handled.handled.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        }));
        let invalid = Arc::new(FnInvalidMessageHandler::new(move |_error, _msg| {
            let counters = counters.clone();
            async move {
                counters.diverted.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        }));
        validated_handler(accept_a2, handler, invalid)
    }

    #[tokio::test]
    async fn test_valid_message_reaches_only_business_handler() {
        let counters = Arc::new(Counters {
            handled: AtomicUsize::new(0),
            diverted: AtomicUsize::new(0),
        });
        let wrapper = counting_wrapper(counters.clone());

        wrapper.handle(delivery(json!({"a": 2}))).await;

        assert_eq!(counters.handled.load(Ordering::SeqCst), 1);
        assert_eq!(counters.diverted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_message_is_diverted_exactly_once() {
        let counters = Arc::new(Counters {
            handled: AtomicUsize::new(0),
            diverted: AtomicUsize::new(0),
        });
        let wrapper = counting_wrapper(counters.clone());

        wrapper.handle(delivery(json!({"a": 1}))).await;

        assert_eq!(counters.handled.load(Ordering::SeqCst), 0);
        assert_eq!(counters.diverted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rpc_wrapper_narrows_params() {
        let received = Arc::new(AtomicUsize::new(0));
        let seen = received.clone();
        let handler = Arc::new(FnMessageHandler::new(
            move |request: JsonRpcRequest<Value>, _msg| {
                let seen = seen.clone();
                async move {
                    assert_eq!(request.method, "sum");
                    assert_eq!(request.params, json!({"a": 2}));
                    seen.fetch_add(1, Ordering::SeqCst);
                }
                .boxed()
            },
        ));
        let invalid = Arc::new(FnInvalidMessageHandler::new(|error, _msg| {
            async move { panic!("unexpected divert: {}", error) }.boxed()
        }));
        let wrapper = rpc_validated_handler(accept_a2, handler, invalid);

        wrapper
            .handle(delivery(json!({
                "jsonrpc": "2.0",
                "method": "sum",
                "params": {"a": 2},
                "id": 1,
            })))
            .await;

        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rpc_wrapper_diverts_envelope_violations() {
        let diverted = Arc::new(AtomicUsize::new(0));
        let counted = diverted.clone();
        let handler = Arc::new(FnMessageHandler::new(
            |_request: JsonRpcRequest<Value>, _msg| async move { panic!("must not run") }.boxed(),
        ));
        let invalid = Arc::new(FnInvalidMessageHandler::new(move |error, _msg| {
            let counted = counted.clone();
            async move {
                assert!(error.is_envelope());
                counted.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        }));
        let wrapper = rpc_validated_handler(accept_a2, handler, invalid);

        wrapper.handle(delivery(json!({"method": "sum"}))).await;

        assert_eq!(diverted.load(Ordering::SeqCst), 1);
    }
}
