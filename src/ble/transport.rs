//! Transport abstraction over a connected GATT client.
//!
//! Everything above this module talks to the meter through [`GattTransport`],
//! so the protocol code never touches a BLE stack directly. The production
//! implementation is [`CharacteristicHandler`](super::CharacteristicHandler).

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Result;

/// Notification event from a characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    /// UUID of the characteristic that sent the notification.
    pub characteristic_uuid: Uuid,
    /// The notification data.
    pub data: Vec<u8>,
}

impl NotificationEvent {
    /// Create a notification event.
    pub fn new(characteristic_uuid: Uuid, data: impl Into<Vec<u8>>) -> Self {
        Self {
            characteristic_uuid,
            data: data.into(),
        }
    }
}

/// GATT operations needed by the profile clients.
///
/// Characteristics are addressed by their full 128-bit UUID.
#[async_trait]
pub trait GattTransport: Send + Sync {
    /// Read a characteristic value.
    async fn read(&self, characteristic: &Uuid) -> Result<Vec<u8>>;

    /// Write without response.
    async fn write_command(&self, characteristic: &Uuid, data: &[u8]) -> Result<()>;

    /// Write with response.
    async fn write_request(&self, characteristic: &Uuid, data: &[u8]) -> Result<()>;

    /// Enable notifications or indications on a characteristic.
    async fn subscribe(&self, characteristic: &Uuid) -> Result<()>;

    /// Disable notifications or indications on a characteristic.
    async fn unsubscribe(&self, characteristic: &Uuid) -> Result<()>;

    /// Get a receiver for notification events from all subscribed characteristics.
    fn notifications(&self) -> broadcast::Receiver<NotificationEvent>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory transport for async flow tests.

    use super::*;
    use crate::error::Error;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::time::Duration;

    mockall::mock! {
        pub(crate) Transport {}

        #[async_trait]
        impl GattTransport for Transport {
            async fn read(&self, characteristic: &Uuid) -> Result<Vec<u8>>;
            async fn write_command(&self, characteristic: &Uuid, data: &[u8]) -> Result<()>;
            async fn write_request(&self, characteristic: &Uuid, data: &[u8]) -> Result<()>;
            async fn subscribe(&self, characteristic: &Uuid) -> Result<()>;
            async fn unsubscribe(&self, characteristic: &Uuid) -> Result<()>;
            fn notifications(&self) -> broadcast::Receiver<NotificationEvent>;
        }
    }

    /// Transport that answers each write by replaying the next scripted batch
    /// of notifications.
    pub(crate) struct FakeTransport {
        tx: broadcast::Sender<NotificationEvent>,
        values: Mutex<HashMap<Uuid, Vec<u8>>>,
        writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
        script: Mutex<VecDeque<Vec<NotificationEvent>>>,
        subscribed: Mutex<HashSet<Uuid>>,
        reply_delay: Duration,
    }

    impl FakeTransport {
        pub(crate) fn new() -> Self {
            let (tx, _) = broadcast::channel(256);
            Self {
                tx,
                values: Mutex::new(HashMap::new()),
                writes: Mutex::new(Vec::new()),
                script: Mutex::new(VecDeque::new()),
                subscribed: Mutex::new(HashSet::new()),
                reply_delay: Duration::from_millis(5),
            }
        }

        /// Queue the notifications sent in reply to the next write.
        pub(crate) fn script_reply(&self, events: Vec<NotificationEvent>) {
            self.script.lock().push_back(events);
        }

        /// Set the value returned by `read`.
        pub(crate) fn set_value(&self, characteristic: Uuid, value: Vec<u8>) {
            self.values.lock().insert(characteristic, value);
        }

        /// Push a notification immediately.
        pub(crate) fn notify(&self, event: NotificationEvent) {
            let _ = self.tx.send(event);
        }

        pub(crate) fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
            self.writes.lock().clone()
        }

        pub(crate) fn is_subscribed(&self, characteristic: &Uuid) -> bool {
            self.subscribed.lock().contains(characteristic)
        }

        fn replay_next(&self) {
            let Some(events) = self.script.lock().pop_front() else {
                return;
            };
            let tx = self.tx.clone();
            let delay = self.reply_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                for event in events {
                    let _ = tx.send(event);
                }
            });
        }
    }

    #[async_trait]
    impl GattTransport for FakeTransport {
        async fn read(&self, characteristic: &Uuid) -> Result<Vec<u8>> {
            self.values
                .lock()
                .get(characteristic)
                .cloned()
                .ok_or_else(|| Error::CharacteristicNotFound {
                    uuid: characteristic.to_string(),
                })
        }

        async fn write_command(&self, characteristic: &Uuid, data: &[u8]) -> Result<()> {
            self.writes.lock().push((*characteristic, data.to_vec()));
            self.replay_next();
            Ok(())
        }

        async fn write_request(&self, characteristic: &Uuid, data: &[u8]) -> Result<()> {
            self.writes.lock().push((*characteristic, data.to_vec()));
            self.replay_next();
            Ok(())
        }

        async fn subscribe(&self, characteristic: &Uuid) -> Result<()> {
            self.subscribed.lock().insert(*characteristic);
            Ok(())
        }

        async fn unsubscribe(&self, characteristic: &Uuid) -> Result<()> {
            self.subscribed.lock().remove(characteristic);
            Ok(())
        }

        fn notifications(&self) -> broadcast::Receiver<NotificationEvent> {
            self.tx.subscribe()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeTransport;
    use super::*;
    use crate::ble::uuids::RECORD_ACCESS_CONTROL_POINT_UUID;

    #[test]
    fn test_notification_event_clone() {
        let event = NotificationEvent::new(RECORD_ACCESS_CONTROL_POINT_UUID, vec![1, 2, 3]);
        let cloned = event.clone();
        assert_eq!(event, cloned);
    }

    #[tokio::test]
    async fn test_fake_transport_replays_after_write() {
        let transport = FakeTransport::new();
        let mut rx = transport.notifications();
        transport.script_reply(vec![NotificationEvent::new(
            RECORD_ACCESS_CONTROL_POINT_UUID,
            vec![0x06, 0x00, 0x01, 0x01],
        )]);

        transport
            .write_command(&RECORD_ACCESS_CONTROL_POINT_UUID, &[0x01, 0x01])
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.data, vec![0x06, 0x00, 0x01, 0x01]);
        assert_eq!(transport.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_fake_transport_read_and_notify() {
        let transport = FakeTransport::new();
        transport.set_value(RECORD_ACCESS_CONTROL_POINT_UUID, vec![0xAA]);
        assert_eq!(
            transport.read(&RECORD_ACCESS_CONTROL_POINT_UUID).await.unwrap(),
            vec![0xAA]
        );
        assert!(transport.read(&Uuid::nil()).await.is_err());

        let mut rx = transport.notifications();
        transport.notify(NotificationEvent::new(Uuid::nil(), vec![0x01]));
        assert_eq!(rx.recv().await.unwrap().data, vec![0x01]);
    }
}
