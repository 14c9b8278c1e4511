//! Keyed fan-out of stored instances to watchers

use futures::future::join_all;
use futures::Stream;
use ontology_core::{Context, DynInstance, Error, Id, Result};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::task::Poll;
use std::time::Duration;
use tokio::sync::mpsc;

/// Per-recipient delivery timeout used when none is configured
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct Recipient {
    id: u64,
    tx: mpsc::Sender<DynInstance>,
    cancel: Context,
}

struct Subscribers {
    recipients: RwLock<HashMap<Id, Vec<Recipient>>>,
    next_id: AtomicU64,
}

impl Subscribers {
    fn remove(&self, key: &Id, recipient: u64) {
        let Ok(mut recipients) = self.recipients.write() else {
            tracing::warn!("Could not retire subscription {} on {}: lock poisoned", recipient, key);
            return;
        };

        if let Some(list) = recipients.get_mut(key) {
            list.retain(|r| r.id != recipient);
            if list.is_empty() {
                recipients.remove(key);
            }
        }
    }
}

/// Pub/sub keyed by ID
///
/// Subscriptions are retired when the context they were registered with is
/// cancelled or when they are dropped. Sending never fails: a recipient that
/// does not accept a delivery within the timeout is skipped.
#[derive(Clone)]
pub struct Broadcast {
    subscribers: Arc<Subscribers>,
    delivery_timeout: Duration,
}

impl Default for Broadcast {
    fn default() -> Self {
        Self::new(DEFAULT_DELIVERY_TIMEOUT)
    }
}

impl Broadcast {
    pub fn new(delivery_timeout: Duration) -> Self {
        Self {
            subscribers: Arc::new(Subscribers {
                recipients: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
            delivery_timeout,
        }
    }

    /// Subscribe to everything sent under `key` until `ctx` is cancelled
    ///
    /// Must be called from within a tokio runtime.
    pub fn register(&self, ctx: &Context, key: Id) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(1);
        let cancel = ctx.child_token();
        let id = self.subscribers.next_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut recipients = self
                .subscribers
                .recipients
                .write()
                .map_err(|e| Error::backend(format!("Lock error: {}", e)))?;
            recipients.entry(key.clone()).or_default().push(Recipient {
                id,
                tx,
                cancel: cancel.clone(),
            });
        }

        let subscribers = Arc::clone(&self.subscribers);
        let retired = cancel.clone();
        tokio::spawn(async move {
            retired.cancelled().await;
            subscribers.remove(&key, id);
            tracing::debug!("Retired subscription {} on {}", id, key);
        });

        Ok(Subscription { rx, cancel })
    }

    /// Number of live subscriptions under `key`
    pub fn subscriber_count(&self, key: &Id) -> usize {
        self.subscribers
            .recipients
            .read()
            .map(|r| r.get(key).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Deliver `instance` to every subscription under any of `keys`
    ///
    /// Returns once each recipient has accepted it, been cancelled, or timed out.
    pub async fn send(&self, ctx: &Context, instance: &DynInstance, keys: &[Id]) {
        let targets: Vec<Recipient> = match self.subscribers.recipients.read() {
            Ok(recipients) => keys
                .iter()
                .filter_map(|key| recipients.get(key))
                .flatten()
                .cloned()
                .collect(),
            Err(e) => {
                tracing::warn!("Dropping broadcast of {}: {}", instance.id(), e);
                return;
            }
        };

        if targets.is_empty() {
            return;
        }

        let deliveries = targets
            .into_iter()
            .map(|recipient| deliver(ctx, recipient, instance.clone(), self.delivery_timeout));
        join_all(deliveries).await;
    }
}

async fn deliver(ctx: &Context, recipient: Recipient, instance: DynInstance, timeout: Duration) {
    let id = instance.id().clone();

    // A ready recipient is always served, even if the sender was cancelled
    let reason = tokio::select! {
        biased;
        sent = recipient.tx.send(instance) => match sent {
            Ok(()) => return,
            Err(_) => "subscription closed",
        },
        _ = recipient.cancel.cancelled() => return,
        _ = ctx.cancelled() => "sender cancelled",
        _ = tokio::time::sleep(timeout) => "delivery timed out",
    };

    tracing::warn!(
        "Skipped delivery of {} to subscription {}: {}",
        id,
        recipient.id,
        reason
    );
}

/// A stream of instances sent under one key
///
/// Yields nothing once its context is cancelled, and ends after the
/// broadcast has retired it.
pub struct Subscription {
    rx: mpsc::Receiver<DynInstance>,
    cancel: Context,
}

impl Subscription {
    /// Next delivered instance, or `None` once the subscription is retired
    pub async fn recv(&mut self) -> Option<DynInstance> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = self.rx.recv() => item,
        }
    }

    /// Retire the subscription without cancelling the caller's context
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Stream for Subscription {
    type Item = DynInstance;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}
