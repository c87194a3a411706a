//! Adapter availability
//! Capability check consulted before scanning or connecting. It is passed by
//! reference to the components that need it.

use std::time::Duration;

use async_trait::async_trait;
use bluest::Adapter;
use log::{info, warn};

use crate::core::bluetooth::errors::ProvisionError;

#[async_trait]
pub trait AdapterAvailability: Send + Sync {
    /// Succeeds when the radio is powered and the process may use it.
    async fn ensure_available(&self) -> Result<(), ProvisionError>;
}

/// Availability as reported by a `bluest` adapter
pub struct BluestAvailability {
    adapter: Adapter,
    timeout: Duration,
}

impl BluestAvailability {
    pub fn new(adapter: Adapter, timeout: Duration) -> Self {
        Self { adapter, timeout }
    }
}

#[async_trait]
impl AdapterAvailability for BluestAvailability {
    async fn ensure_available(&self) -> Result<(), ProvisionError> {
        match tokio::time::timeout(self.timeout, self.adapter.wait_available()).await {
            Ok(Ok(())) => {
                info!("Bluetooth adapter is available.");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("Bluetooth adapter unavailable: {}", e);
                Err(ProvisionError::AdapterUnavailable(e.to_string()))
            }
            Err(_) => {
                warn!("Bluetooth adapter did not become available in {:?}", self.timeout);
                Err(ProvisionError::AdapterUnavailable(
                    "adapter is powered off or access was denied".to_string(),
                ))
            }
        }
    }
}

/// Always available. For hosts that manage the radio themselves.
pub struct AlwaysAvailable;

#[async_trait]
impl AdapterAvailability for AlwaysAvailable {
    async fn ensure_available(&self) -> Result<(), ProvisionError> {
        Ok(())
    }
}
