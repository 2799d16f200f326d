//! Process-local bus used by the test suites and demos.
//!
//! A direct exchange with exact routing-key bindings. Messages delivered to
//! a queue without an active subscription wait in a backlog; handlers run
//! on spawned tasks and a panicking handler is auto-nacked when the
//! registration asked for it. This is test infrastructure, not a broker.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::TransportError;
use crate::message::{Delivery, DeliveryOps};
use crate::options::{HandleOptions, PublishOptions, QueueOptions};
use crate::registration::HandlerRegistration;
use crate::subscription::ReplySubscription;
use crate::traits::{BusTransport, DeliveryHandler, QueueInfo};

const REPLY_CHANNEL_CAPACITY: usize = 64;

/// Counters exposed by [`InMemoryBus::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub published: u64,
    pub requests: u64,
    pub delivered: u64,
    pub acked: u64,
    pub nacked: u64,
    pub rejected: u64,
    pub replies: u64,
}

#[derive(Default)]
struct StatsInner {
    published: AtomicU64,
    requests: AtomicU64,
    delivered: AtomicU64,
    acked: AtomicU64,
    nacked: AtomicU64,
    rejected: AtomicU64,
    replies: AtomicU64,
}

impl StatsInner {
    fn snapshot(&self) -> BusStats {
        BusStats {
            published: self.published.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            nacked: self.nacked.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            replies: self.replies.load(Ordering::Relaxed),
        }
    }
}

/// Reply address carried by request deliveries
struct ReplyAddress {
    correlation_id: String,
    tx: mpsc::Sender<Delivery>,
    cancel: CancellationToken,
}

struct MemoryOps {
    stats: Arc<StatsInner>,
    reply: Option<ReplyAddress>,
}

#[async_trait]
impl DeliveryOps for MemoryOps {
    async fn ack(&self) -> Result<(), TransportError> {
        self.stats.acked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn nack(&self) -> Result<(), TransportError> {
        self.stats.nacked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn reject(&self) -> Result<(), TransportError> {
        self.stats.rejected.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn reply(&self, body: Value) -> Result<(), TransportError> {
        let address = self.reply.as_ref().ok_or(TransportError::NoReplyAddress)?;
        if address.cancel.is_cancelled() {
            return Err(TransportError::ReplyChannelClosed);
        }

        let delivery = Delivery::new(
            body,
            "",
            Some(address.correlation_id.clone()),
            Arc::new(MemoryOps {
                stats: self.stats.clone(),
                reply: None,
            }),
        );

        address
            .tx
            .send(delivery)
            .await
            .map_err(|_| TransportError::ReplyChannelClosed)?;
        self.stats.replies.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

struct HandlerSlot {
    options: HandleOptions,
    handler: Arc<dyn DeliveryHandler>,
    cancel: CancellationToken,
}

struct Queue {
    options: QueueOptions,
    backlog: VecDeque<Delivery>,
    handler: Option<HandlerSlot>,
    subscribed: bool,
}

struct State {
    queues: HashMap<String, Queue>,
    // (exchange, routing key) -> bound queue names
    bindings: HashMap<(String, String), Vec<String>>,
    unrouted: Option<Arc<dyn DeliveryHandler>>,
    closed: bool,
}

struct DispatchJob {
    queue: String,
    handler: Arc<dyn DeliveryHandler>,
    auto_nack: bool,
    delivery: Delivery,
}

/// In-process direct-exchange bus
pub struct InMemoryBus {
    state: Mutex<State>,
    stats: Arc<StatsInner>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                queues: HashMap::new(),
                bindings: HashMap::new(),
                unrouted: None,
                closed: false,
            }),
            stats: Arc::new(StatsInner::default()),
        }
    }

    pub fn stats(&self) -> BusStats {
        self.stats.snapshot()
    }

    fn plain_ops(&self) -> Arc<dyn DeliveryOps> {
        Arc::new(MemoryOps {
            stats: self.stats.clone(),
            reply: None,
        })
    }

    /// Route a body to every queue bound for (exchange, routing key),
    /// returning the dispatch work to run outside the lock. A key with no
    /// bound queue falls back to the unrouted handler when one is set.
    fn route(
        &self,
        exchange: &str,
        options: &PublishOptions,
        ops: &Arc<dyn DeliveryOps>,
        correlation_id: Option<&str>,
    ) -> Result<Vec<DispatchJob>, TransportError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }

        let targets = state
            .bindings
            .get(&(exchange.to_string(), options.routing_key.clone()))
            .cloned()
            .unwrap_or_default();

        if targets.is_empty() {
            if let Some(handler) = state.unrouted.clone() {
                let delivery = Delivery::new(
                    options.body.clone(),
                    options.routing_key.clone(),
                    correlation_id.map(str::to_string),
                    ops.clone(),
                );
                return Ok(vec![DispatchJob {
                    queue: options.routing_key.clone(),
                    handler,
                    auto_nack: false,
                    delivery,
                }]);
            }
            debug!(
                exchange,
                routing_key = %options.routing_key,
                "no queue bound for routing key, message dropped"
            );
        }

        let mut jobs = Vec::new();
        for name in targets {
            let delivery = Delivery::new(
                options.body.clone(),
                options.routing_key.clone(),
                correlation_id.map(str::to_string),
                ops.clone(),
            );
            if let Some(job) = enqueue_or_dispatch(&mut state, &self.stats, &name, delivery) {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    fn spawn_jobs(&self, jobs: Vec<DispatchJob>) {
        for job in jobs {
            spawn_job(job);
        }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

fn enqueue_or_dispatch(
    state: &mut State,
    stats: &Arc<StatsInner>,
    queue_name: &str,
    delivery: Delivery,
) -> Option<DispatchJob> {
    let queue = state.queues.get_mut(queue_name)?;

    if queue.subscribed {
        if let Some(slot) = &queue.handler {
            if !slot.cancel.is_cancelled() {
                stats.delivered.fetch_add(1, Ordering::Relaxed);
                return Some(DispatchJob {
                    queue: queue_name.to_string(),
                    handler: slot.handler.clone(),
                    auto_nack: slot.options.auto_nack,
                    delivery,
                });
            }
        }
    }

    if queue.backlog.len() >= queue.options.queue_limit as usize {
        warn!(queue = queue_name, "queue limit reached, message dropped");
        return None;
    }
    queue.backlog.push_back(delivery);
    None
}

fn drain_backlog(state: &mut State, stats: &Arc<StatsInner>, queue_name: &str) -> Vec<DispatchJob> {
    let Some(queue) = state.queues.get_mut(queue_name) else {
        return Vec::new();
    };
    if !queue.subscribed {
        return Vec::new();
    }
    let Some(slot) = &queue.handler else {
        return Vec::new();
    };
    if slot.cancel.is_cancelled() {
        return Vec::new();
    }

    let mut jobs = Vec::with_capacity(queue.backlog.len());
    while let Some(delivery) = queue.backlog.pop_front() {
        stats.delivered.fetch_add(1, Ordering::Relaxed);
        jobs.push(DispatchJob {
            queue: queue_name.to_string(),
            handler: slot.handler.clone(),
            auto_nack: slot.options.auto_nack,
            delivery,
        });
    }
    jobs
}

fn spawn_job(job: DispatchJob) {
    tokio::spawn(async move {
        let DispatchJob {
            queue,
            handler,
            auto_nack,
            delivery,
        } = job;

        // Run the handler on its own task so a panic is contained and the
        // delivery can still be nacked afterwards.
        let probe = delivery.clone();
        let joined = tokio::spawn(async move { handler.handle(delivery).await }).await;

        if joined.is_err() {
            warn!(queue = %queue, "message handler panicked");
            if auto_nack {
                if let Err(err) = probe.nack().await {
                    warn!(queue = %queue, error = %err, "failed to nack after handler panic");
                }
            }
        }
    });
}

#[async_trait]
impl BusTransport for InMemoryBus {
    async fn publish(&self, exchange: &str, options: PublishOptions) -> Result<(), TransportError> {
        let ops = self.plain_ops();
        let jobs = self.route(exchange, &options, &ops, None)?;
        self.stats.published.fetch_add(1, Ordering::Relaxed);
        self.spawn_jobs(jobs);
        Ok(())
    }

    async fn publish_bulk(
        &self,
        exchange: &str,
        batch: Vec<PublishOptions>,
    ) -> Result<(), TransportError> {
        let ops = self.plain_ops();
        let mut jobs = Vec::new();
        for options in &batch {
            jobs.extend(self.route(exchange, options, &ops, None)?);
            self.stats.published.fetch_add(1, Ordering::Relaxed);
        }
        self.spawn_jobs(jobs);
        Ok(())
    }

    async fn set_unrouted_handler(
        &self,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.unrouted = Some(handler);
        Ok(())
    }

    async fn request(
        &self,
        exchange: &str,
        options: PublishOptions,
    ) -> Result<ReplySubscription, TransportError> {
        let correlation_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(REPLY_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let ops: Arc<dyn DeliveryOps> = Arc::new(MemoryOps {
            stats: self.stats.clone(),
            reply: Some(ReplyAddress {
                correlation_id: correlation_id.clone(),
                tx,
                cancel: cancel.clone(),
            }),
        });

        let jobs = self.route(exchange, &options, &ops, Some(&correlation_id))?;
        self.stats.requests.fetch_add(1, Ordering::Relaxed);
        self.spawn_jobs(jobs);

        debug!(exchange, correlation_id = %correlation_id, "opened reply subscription");
        Ok(ReplySubscription::new(correlation_id, rx, cancel))
    }

    async fn add_queue(&self, name: &str, options: QueueOptions) -> Result<QueueInfo, TransportError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }

        let queue = state.queues.entry(name.to_string()).or_insert_with(|| Queue {
            subscribed: options.subscribe,
            options,
            backlog: VecDeque::new(),
            handler: None,
        });

        Ok(QueueInfo {
            name: name.to_string(),
            backlog: queue.backlog.len(),
        })
    }

    async fn bind_queue(
        &self,
        exchange: &str,
        queue: &str,
        routing_keys: &[String],
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        if !state.queues.contains_key(queue) {
            return Err(TransportError::UnknownQueue(queue.to_string()));
        }

        for key in routing_keys {
            let bound = state
                .bindings
                .entry((exchange.to_string(), key.clone()))
                .or_default();
            if !bound.iter().any(|name| name == queue) {
                bound.push(queue.to_string());
            }
        }
        Ok(())
    }

    async fn add_handler(
        &self,
        queue: &str,
        options: HandleOptions,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Result<HandlerRegistration, TransportError> {
        let cancel = CancellationToken::new();
        let jobs = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(TransportError::Closed);
            }
            let slot = HandlerSlot {
                options,
                handler,
                cancel: cancel.clone(),
            };
            match state.queues.get_mut(queue) {
                Some(entry) => entry.handler = Some(slot),
                None => return Err(TransportError::UnknownQueue(queue.to_string())),
            }
            drain_backlog(&mut state, &self.stats, queue)
        };
        self.spawn_jobs(jobs);

        Ok(HandlerRegistration::new(queue, cancel))
    }

    async fn start_subscription(&self, queue: &str) -> Result<(), TransportError> {
        let jobs = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(TransportError::Closed);
            }
            match state.queues.get_mut(queue) {
                Some(entry) => entry.subscribed = true,
                None => return Err(TransportError::UnknownQueue(queue.to_string())),
            }
            drain_backlog(&mut state, &self.stats, queue)
        };
        self.spawn_jobs(jobs);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.closed = true;
        for queue in state.queues.values_mut() {
            if let Some(slot) = queue.handler.take() {
                slot.cancel.cancel();
            }
            queue.backlog.clear();
        }
        state.bindings.clear();
        state.unrouted = None;
        Ok(())
    }
}
