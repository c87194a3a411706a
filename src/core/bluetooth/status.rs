//! Wi-Fi status reports
//! Decoding of the 2-byte payload the peripheral returns on read and notify.

use serde::{Deserialize, Serialize};

use crate::core::bluetooth::constants::{
    LEGACY_WIFI_STATUS_ERROR, LEGACY_WIFI_STATUS_NO_CONFIG, STATUS_PAYLOAD_LEN,
    WIFI_STATUS_ERROR, WIFI_STATUS_NO_CONFIG, WIFI_STATUS_STARTED, WIFI_STATUS_STOPPED,
};

/// Status reported by the peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusReport {
    /// Station is running; the parameter is informational (last IP octet or client count)
    Started(u8),
    Stopped,
    NoConfig,
    Error,
    /// Opcode this firmware revision does not know about
    Unknown(u8),
}

impl StatusReport {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started(param) => write!(f, "started ({})", param),
            Self::Stopped => write!(f, "stopped"),
            Self::NoConfig => write!(f, "not configured"),
            Self::Error => write!(f, "error"),
            Self::Unknown(opcode) => write!(f, "unknown (0x{:02x})", opcode),
        }
    }
}

/// Firmware revision of the status opcode table.
///
/// `Current` maps NO_CONFIG/ERROR to 0x04/0x05, `Legacy` to 0x03/0x04.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusRevision {
    #[default]
    Current,
    Legacy,
}

/// Decodes a status payload using the current opcode table.
pub fn decode_status(payload: [u8; STATUS_PAYLOAD_LEN]) -> StatusReport {
    decode_status_with(StatusRevision::Current, payload)
}

/// Decodes a status payload using the given opcode table.
pub fn decode_status_with(
    revision: StatusRevision,
    payload: [u8; STATUS_PAYLOAD_LEN],
) -> StatusReport {
    let [opcode, param] = payload;
    let (no_config, error) = match revision {
        StatusRevision::Current => (WIFI_STATUS_NO_CONFIG, WIFI_STATUS_ERROR),
        StatusRevision::Legacy => (LEGACY_WIFI_STATUS_NO_CONFIG, LEGACY_WIFI_STATUS_ERROR),
    };

    match opcode {
        WIFI_STATUS_STARTED => StatusReport::Started(param),
        WIFI_STATUS_STOPPED => StatusReport::Stopped,
        op if op == no_config => StatusReport::NoConfig,
        op if op == error => StatusReport::Error,
        op => StatusReport::Unknown(op),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn started_carries_every_parameter_value() {
        for n in 0..=u8::MAX {
            assert_eq!(decode_status([0x01, n]), StatusReport::Started(n));
        }
    }

    #[test]
    fn known_opcodes() {
        assert_eq!(decode_status([0x02, 0x00]), StatusReport::Stopped);
        assert_eq!(decode_status([0x04, 0x00]), StatusReport::NoConfig);
        assert_eq!(decode_status([0x05, 0x00]), StatusReport::Error);
    }

    #[test]
    fn unmapped_opcodes_are_unknown_regardless_of_parameter() {
        for x in (0..=u8::MAX).filter(|x| ![0x01, 0x02, 0x04, 0x05].contains(x)) {
            for y in [0x00, 0x07, 0xff] {
                assert_eq!(decode_status([x, y]), StatusReport::Unknown(x));
            }
        }
    }

    #[test]
    fn legacy_revision_shifts_no_config_and_error() {
        let legacy = StatusRevision::Legacy;
        assert_eq!(decode_status_with(legacy, [0x03, 0]), StatusReport::NoConfig);
        assert_eq!(decode_status_with(legacy, [0x04, 0]), StatusReport::Error);
        assert_eq!(decode_status_with(legacy, [0x05, 0]), StatusReport::Unknown(0x05));
        assert_eq!(decode_status_with(legacy, [0x01, 9]), StatusReport::Started(9));
    }

    #[test]
    fn current_revision_treats_0x03_as_unknown() {
        assert_eq!(decode_status([0x03, 0x00]), StatusReport::Unknown(0x03));
    }
}
