//! Transport seam
//! The connection manager and session only talk to the BLE stack through
//! [`GattTransport`] and [`GattAttribute`]. The production implementation
//! wraps `bluest`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bluest::{Adapter, Characteristic, Device};
use log::info;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::core::bluetooth::errors::TransportError;
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::types::PeripheralRef;

/// Link-level operations on a peripheral
#[async_trait]
pub trait GattTransport: Send + Sync + 'static {
    type Attribute: GattAttribute;

    /// Establishes the link.
    async fn connect(&self, peripheral: &PeripheralRef) -> Result<(), TransportError>;

    /// Looks up `characteristic` inside `service`.
    async fn discover(
        &self,
        peripheral: &PeripheralRef,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Self::Attribute, TransportError>;

    /// Drops the link. Must succeed when the link is already down.
    async fn disconnect(&self, peripheral: &PeripheralRef) -> Result<(), TransportError>;
}

/// Operations on the discovered characteristic
#[async_trait]
pub trait GattAttribute: Clone + Send + Sync + 'static {
    async fn read(&self) -> Result<Vec<u8>, TransportError>;

    async fn write(&self, value: &[u8]) -> Result<(), TransportError>;

    async fn has_descriptor(&self, uuid: Uuid) -> Result<bool, TransportError>;

    /// Enables notifications. Values are delivered on the returned channel,
    /// which closes when the link goes away.
    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, TransportError>;
}

/// `bluest` implementation of [`GattTransport`]
#[derive(Clone)]
pub struct BluestTransport {
    adapter: Adapter,
    /// Devices seen by the scanner, keyed by platform id
    devices: Arc<Mutex<HashMap<String, Device>>>,
}

impl BluestTransport {
    pub fn new(adapter: Adapter, devices: Arc<Mutex<HashMap<String, Device>>>) -> Self {
        Self { adapter, devices }
    }

    async fn device(&self, peripheral: &PeripheralRef) -> Result<Device, TransportError> {
        self.devices
            .lock()
            .await
            .get(&peripheral.id)
            .cloned()
            .ok_or_else(|| TransportError::UnknownPeripheral(peripheral.id.clone()))
    }
}

#[async_trait]
impl GattTransport for BluestTransport {
    type Attribute = BluestAttribute;

    async fn connect(&self, peripheral: &PeripheralRef) -> Result<(), TransportError> {
        let device = self.device(peripheral).await?;
        if device.is_connected().await {
            info!("Device {} already connected.", peripheral.id);
            return Ok(());
        }
        info!("Initiating connection to {}...", peripheral.id);
        self.adapter.connect_device(&device).await?;
        Ok(())
    }

    async fn discover(
        &self,
        peripheral: &PeripheralRef,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<BluestAttribute, TransportError> {
        let device = self.device(peripheral).await?;

        let services = device.discover_services_with_uuid(service).await?;
        let wifi_service = services
            .into_iter()
            .next()
            .ok_or(TransportError::ServiceNotFound(service))?;
        info!("Found Wi-Fi service: {}", wifi_service.uuid());

        let characteristics = wifi_service
            .discover_characteristics_with_uuid(characteristic)
            .await?;
        let wifi_char = characteristics
            .into_iter()
            .next()
            .ok_or(TransportError::CharacteristicNotFound(characteristic))?;
        info!("Found Wi-Fi characteristic: {}", wifi_char.uuid());

        Ok(BluestAttribute::new(wifi_char))
    }

    async fn disconnect(&self, peripheral: &PeripheralRef) -> Result<(), TransportError> {
        let device = self.device(peripheral).await?;
        if device.is_connected().await {
            info!("Disconnecting from device {}", peripheral.id);
            self.adapter.disconnect_device(&device).await?;
            info!("Successfully disconnected");
        } else {
            info!("Device {} not connected", peripheral.id);
        }
        Ok(())
    }
}

/// `bluest` characteristic handle
#[derive(Clone)]
pub struct BluestAttribute {
    characteristic: Characteristic,
}

impl BluestAttribute {
    pub fn new(characteristic: Characteristic) -> Self {
        Self { characteristic }
    }
}

#[async_trait]
impl GattAttribute for BluestAttribute {
    async fn read(&self) -> Result<Vec<u8>, TransportError> {
        Ok(self.characteristic.read().await?)
    }

    async fn write(&self, value: &[u8]) -> Result<(), TransportError> {
        // bluest writes with response, so returning means the peripheral acknowledged.
        self.characteristic.write(value).await?;
        Ok(())
    }

    async fn has_descriptor(&self, uuid: Uuid) -> Result<bool, TransportError> {
        let descriptors = self.characteristic.discover_descriptors().await?;
        Ok(descriptors.iter().any(|d| d.uuid() == uuid))
    }

    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, TransportError> {
        NotificationHandler::setup_notifications(self.characteristic.clone()).await
    }
}
