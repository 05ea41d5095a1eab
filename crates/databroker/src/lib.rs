//! Client side of the vehicle data broker: typed accessors, subscription
//! streams and handler dispatch.
//!
//! ```text
//!   Vehicle tree ──▶ DataPointAccessor<S> ──▶ dyn DataBroker ──▶ Subscription
//!                                                                  │
//!                                          spawn_handler ◀─────────┘
//! ```

use std::{
    fmt,
    future::Future,
    marker::PhantomData,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use shared::{
    domain::{DataValue, Signal, SignalPath, SignalValue},
    error::BrokerError,
    protocol::{DataPoint, DataPointReply},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error};

mod local;
pub mod model;

pub use local::{standard_signals, LocalDataBroker, SignalMetadata};
pub use model::Vehicle;

#[async_trait]
pub trait DataBroker: Send + Sync {
    /// Current value of a signal, `None` if it was never written.
    async fn get(&self, path: &SignalPath) -> Result<Option<DataPoint>, BrokerError>;
    async fn set(&self, path: SignalPath, value: DataValue) -> Result<(), BrokerError>;
    /// Opens a stream that yields a reply for every future change of any of `paths`.
    async fn subscribe(&self, paths: Vec<SignalPath>) -> Result<Subscription, BrokerError>;
}

/// Unbounded stream of notification batches for a fixed set of signals.
///
/// Delivery ends when the subscription is dropped or [`Subscription::unsubscribe`]
/// is called; re-subscribing is the only way to restart it.
pub struct Subscription {
    paths: Vec<SignalPath>,
    replies: UnboundedReceiverStream<DataPointReply>,
}

impl Subscription {
    pub fn new(paths: Vec<SignalPath>, receiver: mpsc::UnboundedReceiver<DataPointReply>) -> Self {
        Self {
            paths,
            replies: UnboundedReceiverStream::new(receiver),
        }
    }

    pub fn paths(&self) -> &[SignalPath] {
        &self.paths
    }

    pub fn unsubscribe(mut self) {
        self.replies.close();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

impl Stream for Subscription {
    type Item = DataPointReply;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.replies).poll_next(cx)
    }
}

/// Live handler registration returned by [`spawn_handler`].
///
/// Dropping the handle leaves the handler running for the lifetime of the
/// runtime; call [`SubscriptionHandle::unsubscribe`] to stop it.
pub struct SubscriptionHandle {
    paths: Vec<SignalPath>,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn paths(&self) -> &[SignalPath] {
        &self.paths
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops dispatching and releases the underlying subscription. Handler
    /// invocations already in flight run to completion.
    pub async fn unsubscribe(self) {
        self.task.abort();
        let _ = self.task.await;
        debug!(paths = ?self.paths, "subscription cancelled");
    }
}

/// Drains `subscription` in a background task and runs `handler` for every
/// reply in a task of its own, so one slow or failing invocation never holds
/// up later deliveries. Handler errors are logged and go no further.
pub fn spawn_handler<F, Fut>(mut subscription: Subscription, handler: F) -> SubscriptionHandle
where
    F: Fn(DataPointReply) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let paths = subscription.paths().to_vec();
    let handler = Arc::new(handler);
    let task_paths = paths.clone();
    let task = tokio::spawn(async move {
        while let Some(reply) = subscription.next().await {
            let handler = Arc::clone(&handler);
            let paths = task_paths.clone();
            tokio::spawn(async move {
                if let Err(err) = (*handler)(reply).await {
                    error!(?paths, error = %format!("{err:#}"), "subscription handler failed");
                }
            });
        }
        debug!(paths = ?task_paths, "subscription stream ended");
    });

    SubscriptionHandle { paths, task }
}

/// Typed handle on one leaf signal.
pub struct DataPointAccessor<S: Signal> {
    broker: Arc<dyn DataBroker>,
    _signal: PhantomData<fn() -> S>,
}

impl<S: Signal> DataPointAccessor<S> {
    pub fn new(broker: Arc<dyn DataBroker>) -> Self {
        Self {
            broker,
            _signal: PhantomData,
        }
    }

    pub fn path(&self) -> SignalPath {
        S::PATH
    }

    pub async fn get(&self) -> Result<Option<S::Value>, BrokerError> {
        match self.broker.get(&S::PATH).await? {
            Some(point) => point.typed::<S>().map(Some),
            None => Ok(None),
        }
    }

    pub async fn set(&self, value: S::Value) -> Result<(), BrokerError> {
        debug!(signal = %S::PATH, ?value, "set data point");
        self.broker.set(S::PATH, value.into_data_value()).await
    }

    pub async fn subscribe(&self) -> Result<Subscription, BrokerError> {
        self.broker.subscribe(vec![S::PATH]).await
    }
}

impl<S: Signal> Clone for DataPointAccessor<S> {
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
            _signal: PhantomData,
        }
    }
}

impl<S: Signal> fmt::Debug for DataPointAccessor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DataPointAccessor").field(&S::PATH).finish()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
