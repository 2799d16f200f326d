use tokio_util::sync::CancellationToken;

/// Handle returned when a message handler is registered on a queue
pub struct HandlerRegistration {
    queue: String,
    cancel: CancellationToken,
}

impl HandlerRegistration {
    pub fn new(queue: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            queue: queue.into(),
            cancel,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Stop dispatching to this handler; queued messages fall back to the
    /// queue's backlog.
    pub fn remove(self) {
        self.cancel.cancel();
    }
}
