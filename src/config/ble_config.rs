use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    DEFAULT_SCAN_DURATION_SECS, MIN_RSSI_THRESHOLD, UUID_CCC_DESCRIPTOR, UUID_WIFI_CHARACTERISTIC,
    UUID_WIFI_SERVICE,
};
use crate::core::bluetooth::StatusRevision;

/// Identifiers of the provisioning service and scan behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Service advertised by the peripheral and used as scan filter.
    pub service_uuid: Uuid,

    /// Command/status characteristic inside the service.
    pub characteristic_uuid: Uuid,

    /// Descriptor written to enable notifications.
    pub cccd_uuid: Uuid,

    /// Advertisements weaker than this (dBm) are ignored.
    pub min_rssi: i16,

    /// How long a scan runs before it stops on its own.
    pub scan_duration_secs: u64,

    /// Stop scanning as soon as the first matching peripheral is found.
    pub stop_scan_on_match: bool,

    /// Status opcode table spoken by the firmware.
    pub status_revision: StatusRevision,
}

impl Default for BleConfig {
    fn default() -> Self {
        BleConfig {
            service_uuid: UUID_WIFI_SERVICE,
            characteristic_uuid: UUID_WIFI_CHARACTERISTIC,
            cccd_uuid: UUID_CCC_DESCRIPTOR,
            min_rssi: MIN_RSSI_THRESHOLD,
            scan_duration_secs: DEFAULT_SCAN_DURATION_SECS,
            stop_scan_on_match: true,
            status_revision: StatusRevision::Current,
        }
    }
}
