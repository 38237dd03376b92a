//! GATT characteristic handling.
//!
//! Provides a [`GattTransport`] over an already-connected `btleplug`
//! peripheral: reading, writing, and subscribing to characteristics.

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, trace};
use uuid::Uuid;

use super::transport::{GattTransport, NotificationEvent};
use crate::error::{Error, Result};

/// Capacity of the notification broadcast channel.
const NOTIFICATION_CHANNEL_CAPACITY: usize = 256;

/// How often the listener checks whether it should stop.
const LISTENER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Handler for GATT characteristics on a connected meter.
pub struct CharacteristicHandler {
    /// The peripheral to communicate with.
    peripheral: Peripheral,
    /// Cached characteristics by UUID.
    characteristics: Arc<RwLock<HashMap<Uuid, Characteristic>>>,
    /// Channel for notification events.
    notification_tx: broadcast::Sender<NotificationEvent>,
    /// Whether we're currently listening for notifications.
    is_listening: Arc<AtomicBool>,
    /// Handle to the notification listener task.
    listener_handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl CharacteristicHandler {
    /// Create a new characteristic handler for a peripheral.
    ///
    /// Note: Services must be discovered before calling
    /// [`discover_characteristics`](Self::discover_characteristics).
    pub fn new(peripheral: Peripheral) -> Self {
        let (notification_tx, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);

        Self {
            peripheral,
            characteristics: Arc::new(RwLock::new(HashMap::new())),
            notification_tx,
            is_listening: Arc::new(AtomicBool::new(false)),
            listener_handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Discover services and cache all characteristics.
    pub async fn discover_characteristics(&self) -> Result<()> {
        self.peripheral.discover_services().await?;
        let services = self.peripheral.services();

        let mut chars = self.characteristics.write();
        chars.clear();

        for service in services {
            for characteristic in service.characteristics {
                debug!(
                    "Found characteristic: {} in service {}",
                    characteristic.uuid, service.uuid
                );
                chars.insert(characteristic.uuid, characteristic);
            }
        }

        debug!("Discovered {} characteristics", chars.len());

        Ok(())
    }

    /// Check if a characteristic exists.
    pub fn has_characteristic(&self, uuid: &Uuid) -> bool {
        self.characteristics.read().contains_key(uuid)
    }

    fn characteristic(&self, uuid: &Uuid) -> Result<Characteristic> {
        self.characteristics
            .read()
            .get(uuid)
            .cloned()
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: uuid.to_string(),
            })
    }

    async fn write(&self, uuid: &Uuid, data: &[u8], write_type: WriteType) -> Result<()> {
        let characteristic = self.characteristic(uuid)?;

        self.peripheral
            .write(&characteristic, data, write_type)
            .await
            .map_err(Error::Bluetooth)?;

        trace!(
            "Wrote {} bytes to characteristic {}: {:02X?}",
            data.len(),
            uuid,
            data
        );

        Ok(())
    }

    /// Start forwarding peripheral notifications into the broadcast channel.
    ///
    /// Called by the first [`subscribe`](GattTransport::subscribe).
    pub async fn start_notifications(&self) -> Result<()> {
        if self.is_listening.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut notifications = match self.peripheral.notifications().await {
            Ok(n) => n,
            Err(e) => {
                self.is_listening.store(false, Ordering::SeqCst);
                return Err(Error::Bluetooth(e));
            }
        };

        let is_listening = self.is_listening.clone();
        let notification_tx = self.notification_tx.clone();

        let handle = tokio::spawn(async move {
            debug!("Notification listener entering main loop");

            while is_listening.load(Ordering::SeqCst) {
                tokio::select! {
                    next = notifications.next() => {
                        let Some(notification) = next else {
                            error!("Notification stream ended");
                            break;
                        };

                        debug!(
                            "Notification received from {}: {} bytes, data: {:02X?}",
                            notification.uuid,
                            notification.value.len(),
                            &notification.value[..std::cmp::min(notification.value.len(), 20)]
                        );

                        let event = NotificationEvent {
                            characteristic_uuid: notification.uuid,
                            data: notification.value,
                        };

                        if notification_tx.send(event).is_err() {
                            trace!("No notification receivers");
                        }
                    }
                    _ = tokio::time::sleep(LISTENER_POLL_INTERVAL) => {}
                }
            }

            is_listening.store(false, Ordering::SeqCst);
            debug!("Notification listener stopped");
        });

        *self.listener_handle.write() = Some(handle);

        Ok(())
    }

    /// Stop forwarding notifications.
    pub async fn stop_notifications(&self) {
        self.is_listening.store(false, Ordering::SeqCst);

        let handle = self.listener_handle.write().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[async_trait]
impl GattTransport for CharacteristicHandler {
    async fn read(&self, uuid: &Uuid) -> Result<Vec<u8>> {
        let characteristic = self.characteristic(uuid)?;

        let data = self
            .peripheral
            .read(&characteristic)
            .await
            .map_err(Error::Bluetooth)?;

        trace!("Read {} bytes from characteristic {}", data.len(), uuid);

        Ok(data)
    }

    async fn write_command(&self, uuid: &Uuid, data: &[u8]) -> Result<()> {
        self.write(uuid, data, WriteType::WithoutResponse).await
    }

    async fn write_request(&self, uuid: &Uuid, data: &[u8]) -> Result<()> {
        self.write(uuid, data, WriteType::WithResponse).await
    }

    async fn subscribe(&self, uuid: &Uuid) -> Result<()> {
        let characteristic = self.characteristic(uuid).map_err(|e| {
            for k in self.characteristics.read().keys() {
                debug!("  Available characteristic: {}", k);
            }
            e
        })?;

        debug!(
            "Subscribing to {}, properties: {:?}",
            uuid, characteristic.properties
        );

        self.start_notifications().await?;

        self.peripheral
            .subscribe(&characteristic)
            .await
            .map_err(|e| {
                debug!("Failed to subscribe to {}: {:?}", uuid, e);
                Error::Bluetooth(e)
            })?;

        debug!("Successfully subscribed to notifications from {}", uuid);

        Ok(())
    }

    async fn unsubscribe(&self, uuid: &Uuid) -> Result<()> {
        let characteristic = self.characteristic(uuid)?;

        self.peripheral
            .unsubscribe(&characteristic)
            .await
            .map_err(Error::Bluetooth)?;

        debug!("Unsubscribed from notifications from {}", uuid);

        Ok(())
    }

    fn notifications(&self) -> broadcast::Receiver<NotificationEvent> {
        self.notification_tx.subscribe()
    }
}

impl Drop for CharacteristicHandler {
    fn drop(&mut self) {
        self.is_listening.store(false, Ordering::SeqCst);
    }
}
