use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::bluetooth::constants::{
    DEFAULT_ADAPTER_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_OPERATION_TIMEOUT_SECS,
};

/// Bounds on every GATT step. An expired step tears the session down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Waiting for the adapter to report itself available.
    pub adapter_secs: u64,

    /// Link establishment and service discovery.
    pub connect_secs: u64,

    /// Characteristic read/write, descriptor lookup and subscription.
    pub operation_secs: u64,
}

impl TimeoutConfig {
    pub fn adapter(&self) -> Duration {
        Duration::from_secs(self.adapter_secs)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn operation(&self) -> Duration {
        Duration::from_secs(self.operation_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            adapter_secs: DEFAULT_ADAPTER_TIMEOUT_SECS,
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            operation_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        }
    }
}
