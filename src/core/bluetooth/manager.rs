//! Provisioning manager
//! This module provides the main interface for host applications: scanning,
//! connecting and issuing provisioning requests on a `bluest` adapter.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use bluest::{Adapter, Device};
use log::info;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::core::bluetooth::availability::{AdapterAvailability, BluestAvailability};
use crate::core::bluetooth::driver::DriverSnapshot;
use crate::core::bluetooth::errors::ProvisionError;
use crate::core::bluetooth::events::{EventEmitter, EventReceiver};
use crate::core::bluetooth::provisioner::Provisioner;
use crate::core::bluetooth::scanner::BluetoothScanner;
use crate::core::bluetooth::transport::BluestTransport;
use crate::core::bluetooth::types::{ConnectionState, PeripheralRef};

/// Manages provisioning over the default Bluetooth adapter
pub struct ProvisioningManager {
    /// Bluetooth scanner
    scanner: BluetoothScanner,
    /// Session owner
    provisioner: Provisioner<BluestTransport>,
    /// Adapter power/permission check
    availability: BluestAvailability,
}

impl ProvisioningManager {
    /// Creates a new ProvisioningManager on the default adapter.
    /// Events are delivered on the returned receiver.
    pub async fn new(config: AppConfig) -> Result<(Self, EventReceiver)> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;
        let devices: Arc<Mutex<HashMap<String, Device>>> = Arc::new(Mutex::new(HashMap::new()));
        let (events, receiver) = EventEmitter::channel();

        let availability = BluestAvailability::new(adapter.clone(), config.timeouts.adapter());
        let scanner = BluetoothScanner::new(
            adapter.clone(),
            devices.clone(),
            events.clone(),
            config.ble.clone(),
        );
        let transport = Arc::new(BluestTransport::new(adapter, devices));
        let provisioner = Provisioner::new(transport, config, events);

        Ok((
            Self {
                scanner,
                provisioner,
                availability,
            },
            receiver,
        ))
    }

    /// Starts scanning for provisioning peripherals
    pub async fn start_scan(&mut self) -> Result<()> {
        self.availability.ensure_available().await?;
        self.scanner.start_scan().await
    }

    pub async fn stop_scan(&mut self) -> Result<()> {
        self.scanner.stop_scan().await
    }

    pub fn is_scanning(&self) -> bool {
        self.scanner.is_scanning()
    }

    /// Peripherals found by the last scan
    pub async fn discovered(&self) -> Vec<PeripheralRef> {
        self.scanner.discovered().await
    }

    /// Connects to a device with the given ID
    pub async fn connect_device(&mut self, device_id: &str) -> Result<()> {
        let peripheral = self
            .scanner
            .peripheral(device_id)
            .await
            .ok_or_else(|| anyhow!("Device not found with ID: {}", device_id))?;

        if self.scanner.is_scanning() {
            self.scanner.stop_scan().await?;
        }

        self.provisioner
            .connect(peripheral, &self.availability)
            .await?;
        info!("Device successfully connected and session started.");
        Ok(())
    }

    /// Disconnects from the currently connected device
    pub async fn disconnect(&mut self) {
        self.provisioner.disconnect().await;
    }

    pub async fn request_start_provisioning(
        &self,
        ssid: &str,
        password: &str,
    ) -> Result<(), ProvisionError> {
        self.provisioner
            .request_start_provisioning(ssid, password)
            .await
    }

    pub async fn request_stop(&self) -> Result<(), ProvisionError> {
        self.provisioner.request_stop().await
    }

    pub async fn request_status(&self) -> Result<(), ProvisionError> {
        self.provisioner.request_status().await
    }

    pub async fn snapshot(&self) -> Result<DriverSnapshot, ProvisionError> {
        self.provisioner.snapshot().await
    }

    pub async fn is_wifi_running(&self) -> bool {
        self.provisioner.is_wifi_running().await
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.provisioner.connection_state()
    }

    /// Returns the currently connected peripheral
    pub fn connected_peripheral(&self) -> Option<&PeripheralRef> {
        self.provisioner.connected_peripheral()
    }
}
