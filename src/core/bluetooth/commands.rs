//! Wi-Fi provisioning commands
//! This module contains the commands that can be written to the peripheral
//! and their wire encoding.

use crate::core::bluetooth::constants::{
    WIFI_CMD_GET_STATUS, WIFI_CMD_NONE, WIFI_CMD_SET_PWD, WIFI_CMD_SET_SSID, WIFI_CMD_START,
    WIFI_CMD_STOP,
};
use crate::core::bluetooth::credentials::Credential;

/// Provisioning commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// No command (0x00). Never written by the driver.
    None,
    /// Set the network name (0x01, ssid...)
    SetSsid(Credential),
    /// Set the network password (0x02, password...)
    SetPassword(Credential),
    /// Start the Wi-Fi station with the stored credentials (0x03)
    Start,
    /// Stop the Wi-Fi station (0x04)
    Stop,
    /// Ask the device to notify its current status (0x05)
    GetStatus,
}

impl Command {
    /// Opcode byte of the command
    pub fn opcode(&self) -> u8 {
        match self {
            Self::None => WIFI_CMD_NONE,
            Self::SetSsid(_) => WIFI_CMD_SET_SSID,
            Self::SetPassword(_) => WIFI_CMD_SET_PWD,
            Self::Start => WIFI_CMD_START,
            Self::Stop => WIFI_CMD_STOP,
            Self::GetStatus => WIFI_CMD_GET_STATUS,
        }
    }

    /// Convert the command to its byte representation
    pub fn to_bytes(&self) -> Vec<u8> {
        let argument = match self {
            Self::SetSsid(value) | Self::SetPassword(value) => value.as_bytes(),
            _ => &[],
        };

        let mut frame = Vec::with_capacity(1 + argument.len());
        frame.push(self.opcode());
        frame.extend_from_slice(argument);
        frame
    }
}
