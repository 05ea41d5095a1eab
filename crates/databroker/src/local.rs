use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use shared::{
    domain::{
        DataType, DataValue, EntryType, FrontWipingMode, HoodIsOpen, Signal, SignalPath,
        SignalValue,
    },
    error::BrokerError,
    protocol::{DataPoint, DataPointReply},
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};

use crate::{DataBroker, Subscription};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalMetadata {
    pub path: SignalPath,
    pub data_type: DataType,
    pub entry_type: EntryType,
    pub read_only: bool,
}

impl SignalMetadata {
    pub fn of<S: Signal>() -> Self {
        Self {
            path: S::PATH,
            data_type: <S::Value as SignalValue>::DATA_TYPE,
            entry_type: S::ENTRY_TYPE,
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// Signals the smart wipers application reads and writes.
pub fn standard_signals() -> Vec<SignalMetadata> {
    vec![
        SignalMetadata::of::<HoodIsOpen>(),
        SignalMetadata::of::<FrontWipingMode>(),
    ]
}

struct Subscriber {
    paths: HashSet<SignalPath>,
    tx: mpsc::UnboundedSender<DataPointReply>,
}

#[derive(Default)]
struct LocalState {
    metadata: HashMap<SignalPath, SignalMetadata>,
    values: HashMap<SignalPath, DataPoint>,
    subscribers: Vec<Subscriber>,
    injected_failures: HashMap<SignalPath, BrokerError>,
}

impl LocalState {
    fn metadata(&self, path: &SignalPath) -> Result<&SignalMetadata, BrokerError> {
        self.metadata
            .get(path)
            .ok_or_else(|| BrokerError::UnknownSignal(path.clone()))
    }

    fn prune_closed_subscribers(&mut self) {
        self.subscribers.retain(|subscriber| !subscriber.tx.is_closed());
    }
}

/// In-process stand-in for the vehicle data broker.
///
/// Holds the latest value of every registered signal and notifies subscribers
/// when a value actually changes. There is no transport behind it.
pub struct LocalDataBroker {
    inner: Mutex<LocalState>,
}

impl LocalDataBroker {
    pub fn new(signals: impl IntoIterator<Item = SignalMetadata>) -> Arc<Self> {
        let metadata = signals
            .into_iter()
            .map(|meta| (meta.path.clone(), meta))
            .collect();
        Arc::new(Self {
            inner: Mutex::new(LocalState {
                metadata,
                ..LocalState::default()
            }),
        })
    }

    pub fn with_standard_signals() -> Arc<Self> {
        Self::new(standard_signals())
    }

    pub async fn register(&self, metadata: SignalMetadata) {
        let mut guard = self.inner.lock().await;
        guard.metadata.insert(metadata.path.clone(), metadata);
    }

    /// Makes the next `set` on `path` fail with `error` without applying the value.
    pub async fn fail_next_set(&self, path: SignalPath, error: BrokerError) {
        let mut guard = self.inner.lock().await;
        guard.injected_failures.insert(path, error);
    }

    pub async fn subscriber_count(&self) -> usize {
        let mut guard = self.inner.lock().await;
        guard.prune_closed_subscribers();
        guard.subscribers.len()
    }
}

#[async_trait]
impl DataBroker for LocalDataBroker {
    async fn get(&self, path: &SignalPath) -> Result<Option<DataPoint>, BrokerError> {
        let guard = self.inner.lock().await;
        guard.metadata(path)?;
        Ok(guard.values.get(path).cloned())
    }

    async fn set(&self, path: SignalPath, value: DataValue) -> Result<(), BrokerError> {
        let mut guard = self.inner.lock().await;
        if let Some(err) = guard.injected_failures.remove(&path) {
            debug!(signal = %path, error = %err, "injected set failure");
            return Err(err);
        }

        let meta = guard.metadata(&path)?;
        if meta.read_only {
            return Err(BrokerError::PermissionDenied(path));
        }
        if meta.data_type != value.data_type() {
            return Err(BrokerError::TypeMismatch {
                path,
                expected: meta.data_type,
                actual: value.to_string(),
            });
        }

        let changed = guard
            .values
            .get(&path)
            .map_or(true, |current| current.value != value);
        let point = DataPoint::new(path.clone(), value);
        guard.values.insert(path.clone(), point.clone());

        if !changed {
            trace!(signal = %path, "value unchanged; no notification");
            return Ok(());
        }

        guard.prune_closed_subscribers();
        let mut delivered = 0usize;
        for subscriber in guard.subscribers.iter().filter(|s| s.paths.contains(&path)) {
            let reply: DataPointReply = std::iter::once(point.clone()).collect();
            if subscriber.tx.send(reply).is_ok() {
                delivered += 1;
            }
        }
        debug!(signal = %path, value = %point.value, delivered, "data point updated");
        Ok(())
    }

    async fn subscribe(&self, paths: Vec<SignalPath>) -> Result<Subscription, BrokerError> {
        let mut guard = self.inner.lock().await;
        for path in &paths {
            guard.metadata(path)?;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        guard.subscribers.push(Subscriber {
            paths: paths.iter().cloned().collect(),
            tx,
        });
        debug!(?paths, "subscription registered");
        Ok(Subscription::new(paths, rx))
    }
}
