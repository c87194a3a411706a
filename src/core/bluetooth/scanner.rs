//! Scanning for peripherals that advertise the Wi-Fi provisioning service.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::Result;
use bluest::{Adapter, AdvertisingDevice, Device};
use futures_util::StreamExt;
use log::{debug, error, info};
use regex::Regex;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ble_config::BleConfig;
use crate::core::bluetooth::events::{EventEmitter, ProvisionerEvent};
use crate::core::bluetooth::types::PeripheralRef;

static MAC_ADDRESS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok());

pub struct BluetoothScanner {
    adapter: Adapter,
    devices: Arc<Mutex<HashMap<String, Device>>>,
    peripherals: Arc<Mutex<HashMap<String, PeripheralRef>>>,
    events: EventEmitter,
    config: BleConfig,
    cancel_token: CancellationToken,
    scan_task_handle: Option<JoinHandle<Result<()>>>,
}

impl BluetoothScanner {
    pub fn new(
        adapter: Adapter,
        devices: Arc<Mutex<HashMap<String, Device>>>,
        events: EventEmitter,
        config: BleConfig,
    ) -> Self {
        Self {
            adapter,
            devices,
            peripherals: Arc::new(Mutex::new(HashMap::new())),
            events,
            config,
            cancel_token: CancellationToken::new(),
            scan_task_handle: None,
        }
    }

    /// Whether a scan task is running
    pub fn is_scanning(&self) -> bool {
        self.scan_task_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// A peripheral found by the last scan
    pub async fn peripheral(&self, id: &str) -> Option<PeripheralRef> {
        self.peripherals.lock().await.get(id).cloned()
    }

    /// Everything found by the last scan, strongest signal first
    pub async fn discovered(&self) -> Vec<PeripheralRef> {
        let mut found: Vec<_> = self.peripherals.lock().await.values().cloned().collect();
        found.sort_by_key(|p| std::cmp::Reverse(p.rssi));
        found
    }

    pub async fn start_scan(&mut self) -> Result<()> {
        if self.scan_task_handle.is_some() {
            self.stop_scan().await?;
        }
        // Clear existing devices
        self.devices.lock().await.clear();
        self.peripherals.lock().await.clear();

        self.cancel_token = CancellationToken::new();
        let scan = Self::internal_scan_task(
            self.adapter.clone(),
            self.devices.clone(),
            self.peripherals.clone(),
            self.events.clone(),
            self.cancel_token.clone(),
            self.config.clone(),
        );
        self.scan_task_handle = Some(spawn_scan_task(self.events.clone(), scan));
        info!("Device scan task started.");
        Ok(())
    }

    async fn internal_scan_task(
        adapter: Adapter,
        devices: Arc<Mutex<HashMap<String, Device>>>,
        peripherals: Arc<Mutex<HashMap<String, PeripheralRef>>>,
        events: EventEmitter,
        cancel_token: CancellationToken,
        config: BleConfig,
    ) -> Result<()> {
        info!("Starting bluetooth scan for service {}", config.service_uuid);
        let services = [config.service_uuid];
        let mut scan_stream = adapter.scan(&services).await?;
        let deadline = tokio::time::sleep(Duration::from_secs(config.scan_duration_secs));
        tokio::pin!(deadline);

        // Process discovered devices in real-time
        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered) => {
                            debug!("Found device - Device: {:?}, RSSI: {:?}", discovered.device, discovered.rssi);
                            let Some(peripheral) = Self::accept(&discovered, &config) else {
                                continue;
                            };

                            let is_new = devices
                                .lock()
                                .await
                                .insert(peripheral.id.clone(), discovered.device.clone())
                                .is_none();
                            peripherals
                                .lock()
                                .await
                                .insert(peripheral.id.clone(), peripheral.clone());
                            if is_new {
                                info!(
                                    "Found provisioning peripheral: Address: {}, ID: {}, Name: {:?}, RSSI: {:?}",
                                    peripheral.address, peripheral.id, peripheral.name, peripheral.rssi
                                );
                                events.emit(ProvisionerEvent::PeripheralDiscovered(peripheral));
                                if config.stop_scan_on_match {
                                    break;
                                }
                            }
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = &mut deadline => {
                    info!("Scan duration elapsed.");
                    break;
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }

        Ok(())
    }

    pub async fn stop_scan(&mut self) -> Result<()> {
        info!("Stopping Bluetooth scan.");
        self.cancel_token.cancel();

        if let Some(handle) = self.scan_task_handle.take() {
            info!("Waiting for scan task to finish...");
            match handle.await {
                Ok(Ok(())) => info!("Scan task finished successfully after cancellation."),
                Ok(Err(e)) => error!("Scan task finished with an error: {:?}", e),
                Err(e) if e.is_cancelled() => info!("Scan task was cancelled successfully."),
                Err(e) => error!("Scan task finished with an unexpected join error: {:?}", e),
            }
        } else {
            info!("No active scan task handle found to wait for.");
        }
        Ok(())
    }

    /// Turns an advertisement into a peripheral if it passes the filters
    fn accept(discovered: &AdvertisingDevice, config: &BleConfig) -> Option<PeripheralRef> {
        if !passes_rssi(discovered.rssi, config.min_rssi) {
            return None;
        }
        let advertises_service =
            advertises_service(&discovered.adv_data.services, config.service_uuid);

        let id = discovered.device.id().to_string();
        let name = discovered
            .adv_data
            .local_name
            .clone()
            .or_else(|| discovered.device.name().ok());
        let address = extract_mac_address(&id).unwrap_or_else(|| "N/A".to_string());

        Some(PeripheralRef::new(
            id,
            address,
            name,
            discovered.rssi,
            advertises_service,
        ))
    }
}

/// Pulls a MAC address out of a platform device id
pub fn extract_mac_address(device_id_str: &str) -> Option<String> {
    MAC_ADDRESS
        .as_ref()?
        .find_iter(device_id_str)
        .last()
        .map(|m| m.as_str().to_uppercase())
}

/// Whether the advertised service list includes `service`
pub fn advertises_service(advertised: &[Uuid], service: Uuid) -> bool {
    advertised.contains(&service)
}

/// Advertisements without an RSSI are kept; the platform filter already matched them.
pub fn passes_rssi(rssi: Option<i16>, min_rssi: i16) -> bool {
    rssi.is_none_or(|value| value >= min_rssi)
}

/// Runs `scan` on its own task, bracketed by `ScanStarted` and `ScanComplete`.
fn spawn_scan_task<F>(events: EventEmitter, scan: F) -> JoinHandle<Result<()>>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    // Started must precede anything the task publishes.
    events.emit(ProvisionerEvent::ScanStarted);
    tokio::spawn(async move {
        let result = scan.await;
        if let Err(e) = &result {
            error!("Scan task failed: {}", e);
        }
        events.emit(ProvisionerEvent::ScanComplete);
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::constants::{UUID_WIFI_CHARACTERISTIC, UUID_WIFI_SERVICE};

    #[tokio::test]
    async fn scan_started_precedes_everything_the_task_emits() {
        let (events, mut rx) = EventEmitter::channel();
        let found = PeripheralRef::new(
            "dev".to_string(),
            "AA:BB:CC:DD:EE:FF".to_string(),
            None,
            Some(-40),
            true,
        );
        let task_events = events.clone();
        let task_found = found.clone();
        let handle = spawn_scan_task(events, async move {
            task_events.emit(ProvisionerEvent::PeripheralDiscovered(task_found));
            Ok(())
        });
        handle.await.unwrap().unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                ProvisionerEvent::ScanStarted,
                ProvisionerEvent::PeripheralDiscovered(found),
                ProvisionerEvent::ScanComplete,
            ]
        );
    }

    #[tokio::test]
    async fn failed_scan_still_completes() {
        let (events, mut rx) = EventEmitter::channel();
        let handle = spawn_scan_task(events, async { Err(anyhow::anyhow!("adapter gone")) });
        assert!(handle.await.unwrap().is_err());

        assert_eq!(rx.try_recv().ok(), Some(ProvisionerEvent::ScanStarted));
        assert_eq!(rx.try_recv().ok(), Some(ProvisionerEvent::ScanComplete));
    }

    #[test]
    fn mac_address_is_extracted_and_uppercased() {
        assert_eq!(
            extract_mac_address("hci0/dev_aa:bb:cc:dd:ee:0f"),
            Some("AA:BB:CC:DD:EE:0F".to_string())
        );
        assert_eq!(
            extract_mac_address("BluetoothLE#BluetoothLE00:11:22:33:44:55-a4-c1-38-01-02-03"),
            Some("A4-C1-38-01-02-03".to_string())
        );
    }

    #[test]
    fn opaque_ids_have_no_address() {
        assert_eq!(extract_mac_address("8D4F1C2E-7B1A-4F3C-9E0D-112233445566"), None);
    }

    #[test]
    fn service_match_requires_the_exact_uuid() {
        assert!(advertises_service(&[UUID_WIFI_CHARACTERISTIC, UUID_WIFI_SERVICE], UUID_WIFI_SERVICE));
        assert!(!advertises_service(&[UUID_WIFI_CHARACTERISTIC], UUID_WIFI_SERVICE));
        assert!(!advertises_service(&[], UUID_WIFI_SERVICE));
    }

    #[test]
    fn rssi_threshold_is_inclusive() {
        assert!(passes_rssi(Some(-90), -90));
        assert!(passes_rssi(Some(-40), -90));
        assert!(!passes_rssi(Some(-91), -90));
        assert!(passes_rssi(None, -90));
    }
}
