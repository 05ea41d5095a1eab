use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{DataValue, Signal, SignalPath, SignalValue},
    error::BrokerError,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub path: SignalPath,
    pub value: DataValue,
    pub timestamp: DateTime<Utc>,
}

impl DataPoint {
    pub fn new(path: SignalPath, value: DataValue) -> Self {
        Self {
            path,
            value,
            timestamp: Utc::now(),
        }
    }

    pub fn of<S: Signal>(value: S::Value) -> Self {
        Self::new(S::PATH, value.into_data_value())
    }

    /// Decodes the value as `S`, failing if the point belongs to another signal
    /// or carries a value `S` cannot represent.
    pub fn typed<S: Signal>(&self) -> Result<S::Value, BrokerError> {
        if self.path != S::PATH {
            return Err(BrokerError::MissingSignal(S::PATH));
        }
        <S::Value as SignalValue>::from_data_value(&self.value).ok_or_else(|| {
            BrokerError::TypeMismatch {
                path: S::PATH,
                expected: <S::Value as SignalValue>::DATA_TYPE,
                actual: self.value.to_string(),
            }
        })
    }
}

/// One notification batch delivered to a subscriber, keyed by signal path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPointReply {
    entries: BTreeMap<SignalPath, DataPoint>,
}

impl DataPointReply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single<S: Signal>(value: S::Value) -> Self {
        let mut reply = Self::new();
        reply.insert(DataPoint::of::<S>(value));
        reply
    }

    pub fn insert(&mut self, point: DataPoint) {
        self.entries.insert(point.path.clone(), point);
    }

    pub fn contains(&self, path: &SignalPath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn data_point(&self, path: &SignalPath) -> Result<&DataPoint, BrokerError> {
        self.entries
            .get(path)
            .ok_or_else(|| BrokerError::MissingSignal(path.clone()))
    }

    pub fn get<S: Signal>(&self) -> Result<S::Value, BrokerError> {
        self.data_point(&S::PATH)?.typed::<S>()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataPoint> {
        self.entries.values()
    }
}

impl FromIterator<DataPoint> for DataPointReply {
    fn from_iter<I: IntoIterator<Item = DataPoint>>(iter: I) -> Self {
        let mut reply = Self::new();
        for point in iter {
            reply.insert(point);
        }
        reply
    }
}
