//! Constants used throughout the application
//! This module contains the protocol identifiers, opcodes, limits and
//! default timeouts of the Wi-Fi provisioning service.

use uuid::Uuid;

/// The UUID of the Wi-Fi provisioning service advertised by the peripheral
pub const UUID_WIFI_SERVICE: Uuid = Uuid::from_u128(0x4fafc201_1fb5_459e_8fcc_c5c9c331914b);

/// The UUID of the single command/status characteristic
pub const UUID_WIFI_CHARACTERISTIC: Uuid = Uuid::from_u128(0xbeb5483e_36e1_4688_b7f5_ea07361b26a8);

/// Standard client characteristic configuration descriptor
pub const UUID_CCC_DESCRIPTOR: Uuid = Uuid::from_u128(0x00002902_0000_1000_8000_00805f9b34fb);

/// Command opcodes (first byte of every write)
pub const WIFI_CMD_NONE: u8 = 0x00;
pub const WIFI_CMD_SET_SSID: u8 = 0x01;
pub const WIFI_CMD_SET_PWD: u8 = 0x02;
pub const WIFI_CMD_START: u8 = 0x03;
pub const WIFI_CMD_STOP: u8 = 0x04;
pub const WIFI_CMD_GET_STATUS: u8 = 0x05;

/// Status opcodes (first byte of every read/notification)
pub const WIFI_STATUS_STARTED: u8 = 0x01;
pub const WIFI_STATUS_STOPPED: u8 = 0x02;
pub const WIFI_STATUS_NO_CONFIG: u8 = 0x04;
pub const WIFI_STATUS_ERROR: u8 = 0x05;

/// Status opcodes used by the older firmware revision
pub const LEGACY_WIFI_STATUS_NO_CONFIG: u8 = 0x03;
pub const LEGACY_WIFI_STATUS_ERROR: u8 = 0x04;

/// Maximum SSID / password length in bytes
pub const MAX_CREDENTIAL_LEN: usize = 16;

/// Status payload size in bytes
pub const STATUS_PAYLOAD_LEN: usize = 2;

/// Only devices at or above this signal strength are reported by the scanner
pub const MIN_RSSI_THRESHOLD: i16 = -90;

/// Scan duration in seconds
pub const DEFAULT_SCAN_DURATION_SECS: u64 = 10;

/// Timeout for connect and service discovery in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Timeout for a single characteristic read/write or descriptor operation in seconds
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 5;

/// How long to wait for the adapter to become available in seconds
pub const DEFAULT_ADAPTER_TIMEOUT_SECS: u64 = 5;
