//! Protocol driver
//! Sequences the command chain on the Wi-Fi characteristic and turns incoming
//! payloads into status events.
//!
//! The driver never waits on the transport. Writes are handed to a
//! [`CommandLink`], and their completion is fed back through
//! [`ProtocolDriver::on_write_complete`]. Status payloads arrive through
//! [`ProtocolDriver::on_status_payload`] independently of the command state.
//!
//! ```text
//! Idle --start--> AwaitingSsidAck --ack--> AwaitingPasswordAck --ack--> AwaitingStartAck --ack--> Idle
//! Idle --stop---> AwaitingStopAck --ack--> Idle
//! Idle --status-> AwaitingStatusAck --ack--> Idle
//! ```

use log::{debug, info, warn};
use serde::Serialize;

use crate::core::bluetooth::commands::Command;
use crate::core::bluetooth::constants::STATUS_PAYLOAD_LEN;
use crate::core::bluetooth::credentials::{Credential, Credentials};
use crate::core::bluetooth::errors::{FailureReason, ProvisionError, TransportError};
use crate::core::bluetooth::events::{EventEmitter, ProvisionerEvent};
use crate::core::bluetooth::status::{decode_status_with, StatusReport, StatusRevision};
use crate::core::bluetooth::types::ConnectionEvent;

/// Write side of a ready session
pub trait CommandLink {
    /// Hands a frame to the transport without waiting for it to be acknowledged.
    /// An error means the write could not even be issued.
    fn issue_write(&mut self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Asks the transport to tear the session down.
    fn disconnect(&mut self);
}

/// Command sub-state of a ready session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum DriverPhase {
    #[default]
    Idle,
    AwaitingSsidAck,
    AwaitingPasswordAck,
    AwaitingStartAck,
    AwaitingStopAck,
    AwaitingStatusAck,
}

/// Point-in-time view of the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriverSnapshot {
    pub phase: DriverPhase,
    pub last_status: Option<StatusReport>,
}

impl DriverSnapshot {
    /// Whether the peripheral last reported a running station
    pub fn wifi_running(&self) -> bool {
        self.last_status.is_some_and(|s| s.is_started())
    }
}

pub struct ProtocolDriver<L: CommandLink> {
    link: L,
    phase: DriverPhase,
    /// Password waiting for the SSID write to be acknowledged
    pending_password: Option<Credential>,
    last_status: Option<StatusReport>,
    revision: StatusRevision,
    events: EventEmitter,
}

impl<L: CommandLink> ProtocolDriver<L> {
    pub fn new(link: L, revision: StatusRevision, events: EventEmitter) -> Self {
        Self {
            link,
            phase: DriverPhase::Idle,
            pending_password: None,
            last_status: None,
            revision,
            events,
        }
    }

    pub fn phase(&self) -> DriverPhase {
        self.phase
    }

    pub fn last_status(&self) -> Option<StatusReport> {
        self.last_status
    }

    pub fn wifi_running(&self) -> bool {
        self.snapshot().wifi_running()
    }

    pub fn snapshot(&self) -> DriverSnapshot {
        DriverSnapshot {
            phase: self.phase,
            last_status: self.last_status,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Starts the SetSsid → SetPassword → Start chain.
    pub fn request_start_provisioning(
        &mut self,
        ssid: &str,
        password: &str,
    ) -> Result<(), ProvisionError> {
        let Credentials { ssid, password } = Credentials::new(ssid, password)?;
        self.ensure_idle()?;

        info!("Provisioning SSID {:?}", ssid.as_str());
        self.pending_password = Some(password);
        self.issue(Command::SetSsid(ssid), DriverPhase::AwaitingSsidAck)
    }

    /// Asks the peripheral to stop its station.
    pub fn request_stop(&mut self) -> Result<(), ProvisionError> {
        self.ensure_idle()?;
        info!("Requesting Wi-Fi stop");
        self.issue(Command::Stop, DriverPhase::AwaitingStopAck)
    }

    /// Asks the peripheral to notify its current status.
    pub fn request_status(&mut self) -> Result<(), ProvisionError> {
        self.ensure_idle()?;
        debug!("Requesting Wi-Fi status");
        self.issue(Command::GetStatus, DriverPhase::AwaitingStatusAck)
    }

    /// Feeds the outcome of the outstanding write.
    pub fn on_write_complete(&mut self, result: Result<(), TransportError>) {
        if let Err(e) = result {
            let reason = match e {
                TransportError::Timeout => FailureReason::Timeout,
                _ => FailureReason::OperationFailed,
            };
            self.fail(reason, &format!("write rejected in {:?}: {}", self.phase, e));
            return;
        }

        match self.phase {
            DriverPhase::Idle => debug!("Ignoring stale write completion"),
            DriverPhase::AwaitingSsidAck => match self.pending_password.take() {
                Some(password) => {
                    let next = DriverPhase::AwaitingPasswordAck;
                    if let Err(e) = self.write(Command::SetPassword(password), next) {
                        debug!("Provisioning chain aborted before SetPassword: {}", e);
                    }
                }
                None => self.fail(
                    FailureReason::OperationFailed,
                    "no password cached for the SSID acknowledgement",
                ),
            },
            DriverPhase::AwaitingPasswordAck => {
                if let Err(e) = self.write(Command::Start, DriverPhase::AwaitingStartAck) {
                    debug!("Provisioning chain aborted before Start: {}", e);
                }
            }
            DriverPhase::AwaitingStartAck
            | DriverPhase::AwaitingStopAck
            | DriverPhase::AwaitingStatusAck => {
                debug!("Command chain finished after {:?}", self.phase);
                self.phase = DriverPhase::Idle;
                self.events.emit(ProvisionerEvent::ChainComplete);
            }
        }
    }

    /// Feeds a value received by notification or read.
    /// Returns the decoded report, or `None` when the payload is not 2 bytes long.
    pub fn on_status_payload(&mut self, payload: &[u8]) -> Option<StatusReport> {
        let Ok(bytes) = <[u8; STATUS_PAYLOAD_LEN]>::try_from(payload) else {
            debug!("Ignoring status payload of {} bytes: {:?}", payload.len(), payload);
            return None;
        };

        let report = decode_status_with(self.revision, bytes);
        info!("Wi-Fi status: {}", report);
        self.last_status = Some(report);
        self.events.emit(ProvisionerEvent::Status(report));
        Some(report)
    }

    /// Clears command state once the session is gone.
    pub fn reset(&mut self) {
        self.phase = DriverPhase::Idle;
        self.pending_password = None;
    }

    fn ensure_idle(&self) -> Result<(), ProvisionError> {
        if self.phase == DriverPhase::Idle {
            Ok(())
        } else {
            debug!("Rejecting request while {:?}", self.phase);
            Err(ProvisionError::Busy)
        }
    }

    /// Issues the first write of a chain on behalf of a caller.
    fn issue(&mut self, command: Command, next: DriverPhase) -> Result<(), ProvisionError> {
        let opcode = command.opcode();
        self.write(command, next).map_err(|e| {
            ProvisionError::OperationFailed(format!("could not issue opcode 0x{:02x}: {}", opcode, e))
        })
    }

    /// Hands `command` to the link. A frame that cannot be issued ends the session.
    fn write(&mut self, command: Command, next: DriverPhase) -> Result<(), TransportError> {
        let frame = command.to_bytes();
        debug!("Writing opcode 0x{:02x} ({} bytes)", command.opcode(), frame.len());

        match self.link.issue_write(frame) {
            Ok(()) => {
                self.phase = next;
                Ok(())
            }
            Err(e) => {
                self.fail(
                    FailureReason::OperationFailed,
                    &format!("could not issue {:?}: {}", command, e),
                );
                Err(e)
            }
        }
    }

    fn fail(&mut self, reason: FailureReason, message: &str) {
        warn!("Tearing down session: {}", message);
        self.reset();
        self.link.disconnect();
        self.events.connection(ConnectionEvent::Failed(reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::errors::ValidationError;
    use crate::core::bluetooth::events::EventReceiver;

    #[derive(Default)]
    struct RecordingLink {
        writes: Vec<Vec<u8>>,
        fail_on_write: Option<usize>,
        disconnects: usize,
    }

    impl CommandLink for RecordingLink {
        fn issue_write(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
            if self.fail_on_write == Some(self.writes.len()) {
                return Err(TransportError::Closed);
            }
            self.writes.push(frame);
            Ok(())
        }

        fn disconnect(&mut self) {
            self.disconnects += 1;
        }
    }

    fn driver_with(link: RecordingLink) -> (ProtocolDriver<RecordingLink>, EventReceiver) {
        let (events, rx) = EventEmitter::channel();
        (ProtocolDriver::new(link, StatusRevision::Current, events), rx)
    }

    fn drain(rx: &mut EventReceiver) -> Vec<ProvisionerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn full_provisioning_chain() {
        let (mut driver, mut rx) = driver_with(RecordingLink::default());

        driver.request_start_provisioning("home", "secret12").unwrap();
        assert_eq!(driver.phase(), DriverPhase::AwaitingSsidAck);
        assert_eq!(driver.link().writes, vec![b"\x01home".to_vec()]);

        driver.on_write_complete(Ok(()));
        assert_eq!(driver.phase(), DriverPhase::AwaitingPasswordAck);
        assert_eq!(driver.link().writes[1], b"\x02secret12".to_vec());

        driver.on_write_complete(Ok(()));
        assert_eq!(driver.phase(), DriverPhase::AwaitingStartAck);
        assert_eq!(driver.link().writes[2], vec![0x03]);

        assert!(drain(&mut rx).is_empty());
        driver.on_write_complete(Ok(()));
        assert_eq!(driver.phase(), DriverPhase::Idle);
        assert_eq!(drain(&mut rx), vec![ProvisionerEvent::ChainComplete]);
        assert_eq!(driver.link().writes.len(), 3);
    }

    #[test]
    fn failed_password_write_disconnects_without_start() {
        let link = RecordingLink {
            fail_on_write: Some(1),
            ..Default::default()
        };
        let (mut driver, mut rx) = driver_with(link);

        driver.request_start_provisioning("home", "secret12").unwrap();
        driver.on_write_complete(Ok(()));

        assert_eq!(driver.phase(), DriverPhase::Idle);
        assert_eq!(driver.link().disconnects, 1);
        assert_eq!(driver.link().writes, vec![b"\x01home".to_vec()]);
        assert_eq!(
            drain(&mut rx),
            vec![ProvisionerEvent::Connection(ConnectionEvent::Failed(
                FailureReason::OperationFailed
            ))]
        );

        // A late acknowledgement must not resume the chain.
        driver.on_write_complete(Ok(()));
        assert_eq!(driver.link().writes.len(), 1);
        assert_eq!(driver.phase(), DriverPhase::Idle);
    }

    #[test]
    fn rejected_write_completion_disconnects() {
        let (mut driver, mut rx) = driver_with(RecordingLink::default());

        driver.request_start_provisioning("home", "secret12").unwrap();
        driver.on_write_complete(Err(TransportError::Closed));

        assert_eq!(driver.phase(), DriverPhase::Idle);
        assert_eq!(driver.link().disconnects, 1);
        assert_eq!(driver.link().writes.len(), 1);
        assert_eq!(
            drain(&mut rx),
            vec![ProvisionerEvent::Connection(ConnectionEvent::Failed(
                FailureReason::OperationFailed
            ))]
        );
    }

    #[test]
    fn expired_write_is_reported_as_timeout() {
        let (mut driver, mut rx) = driver_with(RecordingLink::default());

        driver.request_stop().unwrap();
        driver.on_write_complete(Err(TransportError::Timeout));

        assert_eq!(driver.phase(), DriverPhase::Idle);
        assert_eq!(driver.link().disconnects, 1);
        assert_eq!(
            drain(&mut rx),
            vec![ProvisionerEvent::Connection(ConnectionEvent::Failed(
                FailureReason::Timeout
            ))]
        );
    }

    #[test]
    fn failed_first_write_is_reported_to_the_caller() {
        let link = RecordingLink {
            fail_on_write: Some(0),
            ..Default::default()
        };
        let (mut driver, mut rx) = driver_with(link);

        let err = driver.request_start_provisioning("home", "secret12").unwrap_err();
        assert!(matches!(err, ProvisionError::OperationFailed(_)));
        assert_eq!(driver.phase(), DriverPhase::Idle);
        assert_eq!(driver.link().disconnects, 1);
        assert_eq!(
            drain(&mut rx),
            vec![ProvisionerEvent::Connection(ConnectionEvent::Failed(
                FailureReason::OperationFailed
            ))]
        );
    }

    #[test]
    fn failed_start_write_ends_the_chain_once() {
        let link = RecordingLink {
            fail_on_write: Some(2),
            ..Default::default()
        };
        let (mut driver, mut rx) = driver_with(link);

        driver.request_start_provisioning("home", "secret12").unwrap();
        driver.on_write_complete(Ok(()));
        driver.on_write_complete(Ok(()));

        assert_eq!(driver.phase(), DriverPhase::Idle);
        assert_eq!(driver.link().disconnects, 1);
        assert_eq!(driver.link().writes.len(), 2);
        assert_eq!(
            drain(&mut rx),
            vec![ProvisionerEvent::Connection(ConnectionEvent::Failed(
                FailureReason::OperationFailed
            ))]
        );
    }

    #[test]
    fn invalid_ssid_never_reaches_the_wire() {
        let (mut driver, mut rx) = driver_with(RecordingLink::default());

        let err = driver.request_start_provisioning("", "x").unwrap_err();
        assert_eq!(err.validation(), Some(ValidationError::Empty));
        assert_eq!(driver.phase(), DriverPhase::Idle);
        assert!(driver.link().writes.is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn validation_is_reported_before_busy() {
        let (mut driver, _rx) = driver_with(RecordingLink::default());
        driver.request_stop().unwrap();

        let err = driver
            .request_start_provisioning("home", "seventeen-bytes!!")
            .unwrap_err();
        assert!(matches!(err.validation(), Some(ValidationError::TooLong { .. })));
    }

    #[test]
    fn status_is_delivered_mid_chain() {
        let (mut driver, mut rx) = driver_with(RecordingLink::default());
        driver.request_start_provisioning("home", "secret12").unwrap();
        driver.on_write_complete(Ok(()));
        assert_eq!(driver.phase(), DriverPhase::AwaitingPasswordAck);

        assert_eq!(driver.on_status_payload(&[0x01, 7]), Some(StatusReport::Started(7)));
        assert_eq!(
            drain(&mut rx),
            vec![ProvisionerEvent::Status(StatusReport::Started(7))]
        );
        assert_eq!(driver.phase(), DriverPhase::AwaitingPasswordAck);
        assert!(driver.wifi_running());
    }

    #[test]
    fn stop_while_pending_is_busy() {
        let (mut driver, _rx) = driver_with(RecordingLink::default());
        driver.request_start_provisioning("home", "secret12").unwrap();

        assert!(matches!(driver.request_stop(), Err(ProvisionError::Busy)));
        assert!(matches!(driver.request_status(), Err(ProvisionError::Busy)));
        assert!(matches!(
            driver.request_start_provisioning("other", "password"),
            Err(ProvisionError::Busy)
        ));
        assert_eq!(driver.link().writes.len(), 1);
        assert_eq!(driver.phase(), DriverPhase::AwaitingSsidAck);
    }

    #[test]
    fn stop_completes_the_chain() {
        let (mut driver, mut rx) = driver_with(RecordingLink::default());

        driver.request_stop().unwrap();
        assert_eq!(driver.phase(), DriverPhase::AwaitingStopAck);
        assert_eq!(driver.link().writes, vec![vec![0x04]]);

        driver.on_write_complete(Ok(()));
        assert_eq!(driver.phase(), DriverPhase::Idle);
        assert_eq!(drain(&mut rx), vec![ProvisionerEvent::ChainComplete]);
    }

    #[test]
    fn status_request_writes_get_status() {
        let (mut driver, _rx) = driver_with(RecordingLink::default());
        driver.request_status().unwrap();
        assert_eq!(driver.phase(), DriverPhase::AwaitingStatusAck);
        assert_eq!(driver.link().writes, vec![vec![0x05]]);
        driver.on_write_complete(Ok(()));
        assert_eq!(driver.phase(), DriverPhase::Idle);
    }

    #[test]
    fn wrong_length_payloads_are_ignored() {
        let (mut driver, mut rx) = driver_with(RecordingLink::default());
        assert_eq!(driver.on_status_payload(&[]), None);
        assert_eq!(driver.on_status_payload(&[0x01]), None);
        assert_eq!(driver.on_status_payload(&[0x01, 2, 3]), None);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(driver.last_status(), None);
    }

    #[test]
    fn running_flag_follows_the_latest_report() {
        let (mut driver, _rx) = driver_with(RecordingLink::default());
        assert!(!driver.wifi_running());
        driver.on_status_payload(&[0x01, 42]);
        assert!(driver.wifi_running());
        driver.on_status_payload(&[0x02, 0]);
        assert!(!driver.wifi_running());
        driver.on_status_payload(&[0x7f, 0]);
        assert_eq!(driver.last_status(), Some(StatusReport::Unknown(0x7f)));
        assert!(!driver.wifi_running());
    }

    #[test]
    fn reset_drops_the_cached_password() {
        let (mut driver, _rx) = driver_with(RecordingLink::default());
        driver.request_start_provisioning("home", "secret12").unwrap();
        driver.reset();

        driver.on_write_complete(Ok(()));
        assert_eq!(driver.link().writes.len(), 1);

        driver.request_start_provisioning("home", "secret12").unwrap();
        assert_eq!(driver.link().writes[1], b"\x01home".to_vec());
    }

    #[test]
    fn legacy_revision_is_honoured() {
        let (events, _rx) = EventEmitter::channel();
        let mut driver =
            ProtocolDriver::new(RecordingLink::default(), StatusRevision::Legacy, events);
        assert_eq!(driver.on_status_payload(&[0x03, 0]), Some(StatusReport::NoConfig));
    }
}
