//! Wi-Fi BLE provisioner library
//! Hands Wi-Fi credentials to a peripheral through a single GATT characteristic
//! and reports the station status it notifies back.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod logging;
pub mod utils;
