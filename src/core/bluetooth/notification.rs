//! Notification handling for the Wi-Fi characteristic
//! This module subscribes to notifications and forwards their payloads to the session.

use bluest::Characteristic;
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio::sync::{mpsc, oneshot};

use crate::core::bluetooth::errors::TransportError;

/// Notification handler for status payloads
pub struct NotificationHandler;

impl NotificationHandler {
    /// Set up notifications for the characteristic.
    ///
    /// Returns once the subscription is confirmed. Payloads are forwarded on the
    /// returned channel until the stream ends or the receiver is dropped.
    pub async fn setup_notifications(
        notify_char: Characteristic,
    ) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, TransportError> {
        info!("Subscribing to notifications...");
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        tokio::spawn(async move {
            Self::process_notifications(notify_char, tx, ready_tx).await;
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(rx),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(TransportError::Other(
                "notification task ended before subscribing".to_string(),
            )),
        }
    }

    /// Process notifications from the peripheral
    async fn process_notifications(
        notify_char: Characteristic,
        tx: mpsc::UnboundedSender<Vec<u8>>,
        ready: oneshot::Sender<Result<(), TransportError>>,
    ) {
        // The stream borrows the characteristic, so both have to live in this task.
        let mut notification_stream = match notify_char.notify().await {
            Ok(stream) => {
                let _ = ready.send(Ok(()));
                stream
            }
            Err(e) => {
                error!("Failed to subscribe to notifications: {}", e);
                let _ = ready.send(Err(e.into()));
                return;
            }
        };

        info!("Listening for status notifications...");
        while let Some(result) = notification_stream.next().await {
            match result {
                Ok(value) => {
                    debug!("Received status data: {:?}", value);
                    if tx.send(value).is_err() {
                        debug!("Session closed, dropping notification stream");
                        break;
                    }
                }
                Err(e) => {
                    error!("Error in notification stream: {}", e);
                    break;
                }
            }
        }

        info!("Notification stream ended");
    }
}
