//! CLI commands
//! This module defines the commands that can be invoked from the command line.
//! Each one drives a [`ProvisioningManager`] and prints the events it publishes.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use log::{info, warn};
use tokio::time::Instant;

use crate::config::AppConfig;
use crate::core::bluetooth::{
    ConnectionEvent, Credentials, EventReceiver, PeripheralRef, ProvisionError, ProvisionerEvent,
    ProvisioningManager, StatusReport,
};

/// Scans for provisioning peripherals and lists them
///
/// # Arguments
/// * `config` - The application config
/// * `duration` - Overrides the configured scan duration, in seconds
pub async fn scan(mut config: AppConfig, duration: Option<u64>) -> Result<()> {
    if let Some(duration) = duration {
        config.ble.scan_duration_secs = duration;
    }
    config.ble.stop_scan_on_match = false;
    println!(
        "Scanning for provisioning peripherals ({} seconds)...",
        config.ble.scan_duration_secs
    );

    let (mut manager, mut events) = ProvisioningManager::new(config).await?;
    manager.start_scan().await?;
    while let Some(event) = events.recv().await {
        if event == ProvisionerEvent::ScanComplete {
            break;
        }
    }

    let found = manager.discovered().await;
    println!("\nFound {} peripherals:", found.len());
    for peripheral in &found {
        println!("  {}", describe_peripheral(peripheral));
    }
    Ok(())
}

/// Sends Wi-Fi credentials and starts the station
///
/// # Arguments
/// * `config` - The application config
/// * `target` - Device id, address or name; the first match is used when absent
/// * `ssid` / `password` - The credentials, validated before any radio access
/// * `wait` - How long to wait for the peripheral to acknowledge and report, in seconds
pub async fn provision(
    config: AppConfig,
    target: Option<String>,
    ssid: String,
    password: String,
    wait: u64,
) -> Result<()> {
    // Fail on bad input before touching the adapter.
    Credentials::new(&ssid, &password)?;

    run_request(config, target, wait, Request::StartProvisioning { ssid, password }).await
}

/// Stops the station on the peripheral
pub async fn stop(config: AppConfig, target: Option<String>, wait: u64) -> Result<()> {
    run_request(config, target, wait, Request::Stop).await
}

/// Asks the peripheral to report its station status
pub async fn status(config: AppConfig, target: Option<String>, wait: u64) -> Result<()> {
    run_request(config, target, wait, Request::Status).await
}

/// What to ask of a connected peripheral
enum Request {
    StartProvisioning { ssid: String, password: String },
    Stop,
    Status,
}

impl Request {
    async fn issue(&self, manager: &ProvisioningManager) -> Result<(), ProvisionError> {
        match self {
            Self::StartProvisioning { ssid, password } => {
                manager.request_start_provisioning(ssid, password).await
            }
            Self::Stop => manager.request_stop().await,
            Self::Status => manager.request_status().await,
        }
    }
}

/// Finds and connects to a peripheral, issues one request and waits for its outcome.
async fn run_request(
    mut config: AppConfig,
    target: Option<String>,
    wait: u64,
    request: Request,
) -> Result<()> {
    // A specific target must not be cut short by the first unrelated match.
    if target.is_some() {
        config.ble.stop_scan_on_match = false;
    }

    let (mut manager, mut events) = ProvisioningManager::new(config).await?;
    let peripheral = find_peripheral(&mut manager, &mut events, target.as_deref()).await?;
    println!("Connecting to {}...", describe_peripheral(&peripheral));

    let outcome = async {
        manager.connect_device(&peripheral.id).await?;
        settle(&manager, &mut events).await;

        request.issue(&manager).await?;
        let report = await_outcome(&mut events, Duration::from_secs(wait)).await?;
        match report {
            Some(report) => println!("Peripheral status: {}", report),
            None => println!("Command acknowledged; no status reported within {} seconds", wait),
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    manager.disconnect().await;
    outcome
}

/// Scans until a peripheral matching `target` (or any, when `None`) shows up.
async fn find_peripheral(
    manager: &mut ProvisioningManager,
    events: &mut EventReceiver,
    target: Option<&str>,
) -> Result<PeripheralRef> {
    manager.start_scan().await?;

    while let Some(event) = events.recv().await {
        match event {
            ProvisionerEvent::PeripheralDiscovered(peripheral) => {
                if target.is_none_or(|t| matches_target(&peripheral, t)) {
                    manager.stop_scan().await?;
                    return Ok(peripheral);
                }
                info!("Skipping {}", peripheral.display_name());
            }
            ProvisionerEvent::ScanComplete => break,
            _ => {}
        }
    }

    match target {
        Some(t) => Err(anyhow!("No provisioning peripheral matching {:?} found", t)),
        None => Err(anyhow!("No provisioning peripheral found")),
    }
}

/// Prints events published while connecting.
///
/// The snapshot round trip guarantees the session has processed the initial
/// status read, so a report that predates the request is not mistaken for its answer.
async fn settle(manager: &ProvisioningManager, events: &mut EventReceiver) {
    if let Err(e) = manager.snapshot().await {
        warn!("Session ended while settling: {}", e);
    }
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
}

/// Waits for the command chain to be acknowledged and for a status report.
async fn await_outcome(events: &mut EventReceiver, wait: Duration) -> Result<Option<StatusReport>> {
    let deadline = Instant::now() + wait;
    let mut chain_done = false;
    let mut report = None;

    while !(chain_done && report.is_some()) {
        let Ok(Some(event)) = tokio::time::timeout_at(deadline, events.recv()).await else {
            break;
        };
        print_event(&event);
        match event {
            ProvisionerEvent::ChainComplete => chain_done = true,
            ProvisionerEvent::Status(status) => report = Some(status),
            ProvisionerEvent::Connection(ConnectionEvent::Failed(reason)) => {
                bail!("Session failed: {:?}", reason)
            }
            _ => {}
        }
    }

    if !chain_done {
        bail!("Peripheral did not acknowledge the command within {:?}", wait);
    }
    Ok(report)
}

fn print_event(event: &ProvisionerEvent) {
    match event {
        ProvisionerEvent::Connection(state) => println!("  connection: {:?}", state),
        ProvisionerEvent::Status(report) => println!("  status: {}", report),
        ProvisionerEvent::ChainComplete => println!("  command acknowledged"),
        other => info!("Event: {:?}", other),
    }
}

/// Whether `peripheral` is the one the user asked for
pub fn matches_target(peripheral: &PeripheralRef, target: &str) -> bool {
    peripheral.id == target
        || peripheral.address.eq_ignore_ascii_case(target)
        || peripheral.name.as_deref() == Some(target)
}

fn describe_peripheral(peripheral: &PeripheralRef) -> String {
    let rssi = peripheral
        .rssi
        .map(|r| format!("{} dBm", r))
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "{} ({}) id: {} RSSI: {}",
        peripheral.name.as_deref().unwrap_or("Unknown"),
        peripheral.address,
        peripheral.id,
        rssi
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::EventEmitter;

    fn peripheral() -> PeripheralRef {
        PeripheralRef::new(
            "hci0/dev_AA_BB".to_string(),
            "AA:BB:CC:DD:EE:FF".to_string(),
            Some("esp32-wifi".to_string()),
            Some(-50),
            true,
        )
    }

    #[test]
    fn target_matches_id_address_or_name() {
        let p = peripheral();
        assert!(matches_target(&p, "hci0/dev_AA_BB"));
        assert!(matches_target(&p, "aa:bb:cc:dd:ee:ff"));
        assert!(matches_target(&p, "esp32-wifi"));
        assert!(!matches_target(&p, "esp32"));
    }

    #[test]
    fn description_falls_back_for_missing_fields() {
        let p = PeripheralRef::new("id".to_string(), "N/A".to_string(), None, None, true);
        assert_eq!(describe_peripheral(&p), "Unknown (N/A) id: id RSSI: N/A");
    }

    #[tokio::test]
    async fn outcome_waits_for_ack_and_status() {
        let (emitter, mut events) = EventEmitter::channel();
        emitter.emit(ProvisionerEvent::Status(StatusReport::Started(7)));
        emitter.emit(ProvisionerEvent::ChainComplete);

        let report = await_outcome(&mut events, Duration::from_secs(1)).await.unwrap();
        assert_eq!(report, Some(StatusReport::Started(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn outcome_without_status_is_still_acknowledged() {
        let (emitter, mut events) = EventEmitter::channel();
        emitter.emit(ProvisionerEvent::ChainComplete);

        let report = await_outcome(&mut events, Duration::from_secs(3)).await.unwrap();
        assert_eq!(report, None);
    }

    #[tokio::test(start_paused = true)]
    async fn outcome_without_ack_times_out() {
        let (_emitter, mut events) = EventEmitter::channel();
        assert!(await_outcome(&mut events, Duration::from_secs(3)).await.is_err());
    }

    #[tokio::test]
    async fn failure_ends_the_wait() {
        let (emitter, mut events) = EventEmitter::channel();
        emitter.connection(ConnectionEvent::Failed(
            crate::core::bluetooth::FailureReason::OperationFailed,
        ));
        assert!(await_outcome(&mut events, Duration::from_secs(3)).await.is_err());
    }
}
