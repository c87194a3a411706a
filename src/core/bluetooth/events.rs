//! Event channel between the provisioning stack and its host.
//! Every component publishes through a cloned [`EventEmitter`]; the host
//! drains the matching [`EventReceiver`] on whatever context suits it.

use log::debug;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::bluetooth::status::StatusReport;
use crate::core::bluetooth::types::{ConnectionEvent, PeripheralRef};

/// Events published to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProvisionerEvent {
    ScanStarted,
    PeripheralDiscovered(PeripheralRef),
    ScanComplete,
    Connection(ConnectionEvent),
    Status(StatusReport),
    /// The last command of a chain was acknowledged; controls may be re-enabled
    ChainComplete,
}

pub type EventReceiver = mpsc::UnboundedReceiver<ProvisionerEvent>;

#[derive(Clone)]
pub struct EventEmitter {
    tx: mpsc::UnboundedSender<ProvisionerEvent>,
}

impl EventEmitter {
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: ProvisionerEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!("No listener for event {:?}", e.0);
        }
    }

    pub fn connection(&self, event: ConnectionEvent) {
        self.emit(ProvisionerEvent::Connection(event));
    }
}
