use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DataType, SignalPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Transport,
    PermissionDenied,
    NotFound,
    Validation,
}

/// Failures reported by the signal broker or while decoding its replies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("unknown signal {0}")]
    UnknownSignal(SignalPath),
    #[error("signal {path} expects {expected:?} values, got {actual}")]
    TypeMismatch {
        path: SignalPath,
        expected: DataType,
        actual: String,
    },
    #[error("signal {0} is read-only")]
    PermissionDenied(SignalPath),
    #[error("signal {0} missing from notification")]
    MissingSignal(SignalPath),
    #[error("broker transport failure: {0}")]
    Transport(String),
}

impl BrokerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownSignal(_) | Self::MissingSignal(_) => ErrorCode::NotFound,
            Self::TypeMismatch { .. } => ErrorCode::Validation,
            Self::PermissionDenied(_) => ErrorCode::PermissionDenied,
            Self::Transport(_) => ErrorCode::Transport,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("unknown plugin name {0:?}")]
    UnknownPlugin(String),
}

impl PluginError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownPlugin(_) => ErrorCode::NotFound,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown wiper mode {0:?}")]
pub struct ParseWiperModeError(pub String);
