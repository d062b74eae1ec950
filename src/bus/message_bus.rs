// src/bus/message_bus.rs

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Anything that can travel over the bus. The topic is the concrete type.
pub trait Message: Any + Send + Sync + 'static {}

impl<T: Any + Send + Sync + 'static> Message for T {}

/// Handle returned by [`MessageBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Payload = dyn Any + Send + Sync;
type Handler = Arc<dyn Fn(&Payload) -> anyhow::Result<()> + Send + Sync>;

enum Dispatch {
    Deliver {
        topic: &'static str,
        message: Arc<Payload>,
        subscribers: Vec<(SubscriptionId, Handler)>,
    },
    Flush(oneshot::Sender<()>),
    Close,
}

struct BusShared {
    subscribers: Mutex<HashMap<TypeId, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl BusShared {
    fn subscribers(&self) -> MutexGuard<'_, HashMap<TypeId, Vec<(SubscriptionId, Handler)>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Topic-keyed publish/subscribe with one ordered dispatcher per bus.
///
/// - `publish` snapshots the current subscribers of the message's type and
///   hands the message to the dispatcher; it never blocks on handlers.
/// - A single Tokio task delivers messages in publish order, one handler at
///   a time, so no two dispatch cycles interleave.
/// - A handler that returns an error or panics is logged and counted; the
///   remaining subscribers and later messages are unaffected.
/// - Subscribing or unsubscribing (also from inside a handler) takes effect
///   from the next `publish`.
///
/// Handlers run on the dispatcher task and should return quickly.
#[derive(Clone)]
pub struct MessageBus {
    shared: Arc<BusShared>,
    tx: mpsc::UnboundedSender<Dispatch>,
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("delivered", &self.delivered())
            .field("failed", &self.failed_deliveries())
            .finish_non_exhaustive()
    }
}

impl MessageBus {
    /// Create a bus and spawn its dispatcher on the current Tokio runtime.
    pub fn start() -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Dispatch>();
        let shared = Arc::new(BusShared {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dispatcher: Mutex::new(None),
        });

        let handle = tokio::spawn(dispatch_loop(Arc::clone(&shared), rx));
        *shared
            .dispatcher
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);

        Self { shared, tx }
    }

    /// Register `handler` for messages of type `M`.
    pub fn subscribe<M, F>(&self, handler: F) -> SubscriptionId
    where
        M: Message,
        F: Fn(&M) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let wrapped: Handler = Arc::new(move |payload: &Payload| match payload.downcast_ref::<M>() {
            Some(message) => handler(message),
            None => Ok(()),
        });

        self.shared
            .subscribers()
            .entry(TypeId::of::<M>())
            .or_default()
            .push((id, wrapped));

        debug!(topic = type_name::<M>(), subscription = id.0, "subscribed");
        id
    }

    /// Forward every message of type `M` into a channel.
    ///
    /// Once the receiver is dropped, deliveries to this subscription are
    /// reported as failures; call [`MessageBus::unsubscribe`] to stop them.
    pub fn subscribe_channel<M>(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<M>)
    where
        M: Message + Clone,
    {
        let (tx, rx) = mpsc::unbounded_channel::<M>();
        let id = self.subscribe(move |message: &M| {
            tx.send(message.clone())
                .map_err(|_| anyhow!("subscription channel closed"))
        });
        (id, rx)
    }

    /// Remove a subscription. Returns `false` if it was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        for subscribers in self.shared.subscribers().values_mut() {
            let before = subscribers.len();
            subscribers.retain(|(sid, _)| *sid != id);
            removed |= subscribers.len() != before;
        }
        removed
    }

    /// Number of subscribers currently registered for `M`.
    pub fn subscriber_count<M: Message>(&self) -> usize {
        self.shared
            .subscribers()
            .get(&TypeId::of::<M>())
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Publish a message to every current subscriber of its type.
    pub fn publish<M: Message>(&self, message: M) {
        let subscribers = self
            .shared
            .subscribers()
            .get(&TypeId::of::<M>())
            .cloned()
            .unwrap_or_default();

        if subscribers.is_empty() {
            return;
        }

        let item = Dispatch::Deliver {
            topic: type_name::<M>(),
            message: Arc::new(message),
            subscribers,
        };
        if self.tx.send(item).is_err() {
            debug!(topic = type_name::<M>(), "message bus closed; dropping message");
        }
    }

    /// Wait until every message published before this call was dispatched.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Dispatch::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Successful handler invocations so far.
    pub fn delivered(&self) -> u64 {
        self.shared.delivered.load(Ordering::Relaxed)
    }

    /// Handler invocations that returned an error or panicked.
    pub fn failed_deliveries(&self) -> u64 {
        self.shared.failed.load(Ordering::Relaxed)
    }

    /// Dispatch what is already queued, then stop the dispatcher.
    ///
    /// Later publishes on any clone of this bus are dropped.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Dispatch::Close);
        let handle = self
            .shared
            .dispatcher
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "message bus dispatcher ended abnormally");
            }
        }
    }
}

async fn dispatch_loop(shared: Arc<BusShared>, mut rx: mpsc::UnboundedReceiver<Dispatch>) {
    debug!("message bus dispatcher started");

    while let Some(item) = rx.recv().await {
        match item {
            Dispatch::Deliver {
                topic,
                message,
                subscribers,
            } => {
                for (id, handler) in subscribers {
                    deliver(&shared, topic, id, &handler, message.as_ref());
                }
            }
            Dispatch::Flush(ack) => {
                let _ = ack.send(());
            }
            Dispatch::Close => {
                info!("message bus closed");
                break;
            }
        }
    }

    debug!("message bus dispatcher finished");
}

fn deliver(
    shared: &BusShared,
    topic: &'static str,
    id: SubscriptionId,
    handler: &Handler,
    message: &Payload,
) {
    match panic::catch_unwind(AssertUnwindSafe(|| handler(message))) {
        Ok(Ok(())) => {
            shared.delivered.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Err(err)) => {
            shared.failed.fetch_add(1, Ordering::Relaxed);
            warn!(
                topic,
                subscription = id.0,
                error = %err,
                "subscriber failed; continuing dispatch"
            );
        }
        Err(panic) => {
            shared.failed.fetch_add(1, Ordering::Relaxed);
            error!(
                topic,
                subscription = id.0,
                panic = %panic_message(panic.as_ref()),
                "subscriber panicked; continuing dispatch"
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
