//! Session actor
//! One tokio task per link. It owns the [`ConnectionManager`] from the first
//! connect step onwards and, once the link is ready, the [`ProtocolDriver`].
//! Host requests, write completions and notification payloads are serialised
//! onto a single sequence.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::connection::{ConnectionManager, GattSession};
use crate::core::bluetooth::driver::{CommandLink, DriverSnapshot, ProtocolDriver};
use crate::core::bluetooth::errors::{FailureReason, ProvisionError, TransportError};
use crate::core::bluetooth::events::EventEmitter;
use crate::core::bluetooth::status::StatusRevision;
use crate::core::bluetooth::transport::{GattAttribute, GattTransport};
use crate::core::bluetooth::types::{ConnectionEvent, ConnectionState, PeripheralRef};

type Reply<T> = oneshot::Sender<Result<T, ProvisionError>>;

enum SessionRequest {
    StartProvisioning {
        ssid: String,
        password: String,
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<()>,
    },
    RefreshStatus {
        reply: Reply<()>,
    },
    Snapshot {
        reply: oneshot::Sender<DriverSnapshot>,
    },
}

/// Issues writes as spawned tasks that report back to the session.
struct SpawnedWriteLink<A: GattAttribute> {
    attribute: A,
    completions: mpsc::UnboundedSender<Result<(), TransportError>>,
    teardown: CancellationToken,
    write_timeout: Duration,
}

impl<A: GattAttribute> CommandLink for SpawnedWriteLink<A> {
    fn issue_write(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        if self.teardown.is_cancelled() {
            return Err(TransportError::Closed);
        }

        let attribute = self.attribute.clone();
        let completions = self.completions.clone();
        let write_timeout = self.write_timeout;
        tokio::spawn(async move {
            let result = match tokio::time::timeout(write_timeout, attribute.write(&frame)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout),
            };
            // A closed channel means the session already ended; the completion is stale.
            let _ = completions.send(result);
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        self.teardown.cancel();
    }
}

/// Handle to a running session
pub struct SessionHandle {
    peripheral: PeripheralRef,
    requests: mpsc::UnboundedSender<SessionRequest>,
    state: watch::Receiver<ConnectionState>,
    teardown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

/// Resolves once the link is ready or the connect attempt has ended
pub type SessionReady = oneshot::Receiver<Result<(), ProvisionError>>;

impl SessionHandle {
    /// Spawns the session task, which connects and then serves requests.
    ///
    /// The handle can tear the session down at any point, including while
    /// the connect steps are still running.
    pub fn spawn<T: GattTransport>(
        connection: ConnectionManager<T>,
        peripheral: PeripheralRef,
        revision: StatusRevision,
        write_timeout: Duration,
        events: EventEmitter,
    ) -> (Self, SessionReady) {
        let state = connection.subscribe_state();
        let teardown = CancellationToken::new();
        let (requests, request_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready) = oneshot::channel();

        let task = tokio::spawn(run_session(
            connection,
            peripheral.clone(),
            request_rx,
            teardown.clone(),
            ready_tx,
            revision,
            write_timeout,
            events,
        ));

        let handle = Self {
            peripheral,
            requests,
            state,
            teardown,
            task: Some(task),
        };
        (handle, ready)
    }

    pub fn peripheral(&self) -> &PeripheralRef {
        &self.peripheral
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether the link is ready and the session task is serving requests
    pub fn is_active(&self) -> bool {
        !self.requests.is_closed() && self.connection_state() == ConnectionState::Ready
    }

    pub async fn request_start_provisioning(
        &self,
        ssid: &str,
        password: &str,
    ) -> Result<(), ProvisionError> {
        self.call(|reply| SessionRequest::StartProvisioning {
            ssid: ssid.to_string(),
            password: password.to_string(),
            reply,
        })
        .await
    }

    pub async fn request_stop(&self) -> Result<(), ProvisionError> {
        self.call(|reply| SessionRequest::Stop { reply }).await
    }

    pub async fn request_status(&self) -> Result<(), ProvisionError> {
        self.call(|reply| SessionRequest::RefreshStatus { reply }).await
    }

    pub async fn snapshot(&self) -> Result<DriverSnapshot, ProvisionError> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(SessionRequest::Snapshot { reply })
            .map_err(|_| ProvisionError::NotConnected)?;
        rx.await.map_err(|_| ProvisionError::NotConnected)
    }

    /// Tears the session down and waits for the link to be released. Idempotent.
    pub async fn disconnect(&mut self) {
        self.teardown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Session task ended abnormally: {}", e);
            }
        }
    }

    async fn call<F>(&self, build: F) -> Result<(), ProvisionError>
    where
        F: FnOnce(Reply<()>) -> SessionRequest,
    {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(build(reply))
            .map_err(|_| ProvisionError::NotConnected)?;
        rx.await.map_err(|_| ProvisionError::NotConnected)?
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_session<T: GattTransport>(
    mut connection: ConnectionManager<T>,
    peripheral: PeripheralRef,
    requests: mpsc::UnboundedReceiver<SessionRequest>,
    teardown: CancellationToken,
    ready: oneshot::Sender<Result<(), ProvisionError>>,
    revision: StatusRevision,
    write_timeout: Duration,
    events: EventEmitter,
) {
    let connected = tokio::select! {
        biased;

        _ = teardown.cancelled() => None,
        result = connection.connect(peripheral) => Some(result),
    };

    let gatt = match connected {
        Some(Ok(gatt)) => gatt,
        Some(Err(e)) => {
            // The connection manager already released the link.
            let _ = ready.send(Err(e));
            return;
        }
        None => {
            info!("Connect cancelled");
            connection.disconnect().await;
            let _ = ready.send(Err(ProvisionError::NotConnected));
            return;
        }
    };

    let _ = ready.send(Ok(()));
    serve(connection, gatt, requests, teardown, revision, write_timeout, events).await;
}

async fn serve<T: GattTransport>(
    mut connection: ConnectionManager<T>,
    gatt: GattSession<T::Attribute>,
    mut requests: mpsc::UnboundedReceiver<SessionRequest>,
    teardown: CancellationToken,
    revision: StatusRevision,
    write_timeout: Duration,
    events: EventEmitter,
) {
    let GattSession {
        peripheral,
        characteristic,
        mut notifications,
        initial_value,
    } = gatt;

    let (completion_tx, mut completions) = mpsc::unbounded_channel();
    let link = SpawnedWriteLink {
        attribute: characteristic,
        completions: completion_tx,
        teardown: teardown.clone(),
        write_timeout,
    };
    let mut driver = ProtocolDriver::new(link, revision, events.clone());

    info!("Session with {} ready", peripheral.display_name());
    driver.on_status_payload(&initial_value);

    loop {
        tokio::select! {
            biased;

            _ = teardown.cancelled() => {
                debug!("Session teardown requested");
                break;
            }
            request = requests.recv() => match request {
                Some(SessionRequest::StartProvisioning { ssid, password, reply }) => {
                    let _ = reply.send(driver.request_start_provisioning(&ssid, &password));
                }
                Some(SessionRequest::Stop { reply }) => {
                    let _ = reply.send(driver.request_stop());
                }
                Some(SessionRequest::RefreshStatus { reply }) => {
                    let _ = reply.send(driver.request_status());
                }
                Some(SessionRequest::Snapshot { reply }) => {
                    let _ = reply.send(driver.snapshot());
                }
                None => {
                    info!("Session handle dropped");
                    break;
                }
            },
            Some(result) = completions.recv() => driver.on_write_complete(result),
            payload = notifications.recv() => match payload {
                Some(value) => {
                    driver.on_status_payload(&value);
                }
                None => {
                    warn!("Notification stream closed, link to {} lost", peripheral.id);
                    events.connection(ConnectionEvent::Failed(FailureReason::LinkLost));
                    break;
                }
            },
        }
    }

    driver.reset();
    // Dropping the receivers makes late completions and notifications stale.
    drop(completions);
    drop(notifications);
    requests.close();
    connection.disconnect().await;
}
