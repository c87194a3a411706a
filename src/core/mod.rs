//! Core functionality for Wi-Fi BLE provisioning
//! This module contains everything that talks to the provisioning peripheral.

pub mod bluetooth;

// Re-export commonly used types
pub use bluetooth::{ProvisionError, ProvisionerEvent, ProvisioningManager};
