//! Glucose Profile session.
//!
//! A [`GlucoseService`] owns the subscriptions to the Glucose Measurement,
//! Glucose Measurement Context and RACP characteristics, and a routing task
//! that feeds their notifications to the decoders and the RACP engine.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::ble::transport::{GattTransport, NotificationEvent};
use crate::ble::uuids::{
    GLUCOSE_MEASUREMENT_CONTEXT_UUID, GLUCOSE_MEASUREMENT_UUID, RECORD_ACCESS_CONTROL_POINT_UUID,
};
use crate::data::context::ContextRecord;
use crate::data::log::MeasurementLog;
use crate::data::measurement::GlucoseMeasurement;
use crate::error::Result;
use crate::protocol::attribute_stream::AttributeCodec;
use crate::racp_engine::{CommandOutcome, RacpConfig, RacpEngine, RacpState};

/// Characteristics the session subscribes to, in subscription order.
const SUBSCRIBED_CHARACTERISTICS: [uuid::Uuid; 3] = [
    GLUCOSE_MEASUREMENT_UUID,
    GLUCOSE_MEASUREMENT_CONTEXT_UUID,
    RECORD_ACCESS_CONTROL_POINT_UUID,
];

/// Client session for a meter's Glucose service.
pub struct GlucoseService {
    transport: Arc<dyn GattTransport>,
    engine: Arc<RacpEngine>,
    log: Arc<RwLock<MeasurementLog>>,
    router: Option<JoinHandle<()>>,
}

impl GlucoseService {
    /// Subscribe to the glucose characteristics with default timeouts.
    pub async fn open(transport: Arc<dyn GattTransport>) -> Result<Self> {
        Self::open_with_config(transport, RacpConfig::default()).await
    }

    /// Subscribe to the glucose characteristics.
    ///
    /// On error, characteristics already subscribed stay subscribed.
    pub async fn open_with_config(
        transport: Arc<dyn GattTransport>,
        config: RacpConfig,
    ) -> Result<Self> {
        // Take the receiver first so nothing sent after subscribing is missed.
        let rx = transport.notifications();

        for uuid in &SUBSCRIBED_CHARACTERISTICS {
            transport.subscribe(uuid).await?;
        }

        let engine = Arc::new(RacpEngine::new(transport.clone(), config));
        let log = Arc::new(RwLock::new(MeasurementLog::new()));
        let router = Self::start_router(rx, engine.clone(), log.clone());

        info!("Glucose service opened");

        Ok(Self {
            transport,
            engine,
            log,
            router: Some(router),
        })
    }

    fn start_router(
        mut rx: Receiver<NotificationEvent>,
        engine: Arc<RacpEngine>,
        log: Arc<RwLock<MeasurementLog>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!("Glucose notification router started");
            loop {
                match rx.recv().await {
                    Ok(event) => route_notification(&event, &engine, &log),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Glucose notification router lagged, {} notifications lost", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Glucose notification router stopped");
        })
    }

    /// Ask the meter how many records it stores.
    pub async fn record_count(&self) -> Result<u16> {
        self.engine.request_record_count().await
    }

    /// Retrieve every stored record.
    ///
    /// Previously received measurements are cleared once the transfer has
    /// started; a call rejected with [`Error::CommandInProgress`] leaves them
    /// alone. A protocol error from the meter is logged and whatever arrived
    /// is returned. On timeout the measurements received so far stay
    /// available through [`measurements`](Self::measurements).
    ///
    /// [`Error::CommandInProgress`]: crate::Error::CommandInProgress
    pub async fn read_all_measurements(&self) -> Result<Vec<GlucoseMeasurement>> {
        let outcome = self
            .engine
            .report_all_records_with(|| self.log.write().clear())
            .await?;
        if let CommandOutcome::ProtocolError { context } = &outcome {
            warn!("Record transfer ended with a protocol error: {}", context);
        }

        let mut log = self.log.write();
        let discarded = log.discard_pending();
        if discarded > 0 {
            warn!("{} contexts had no matching measurement", discarded);
        }
        info!("Received {} measurements", log.len());

        Ok(log.measurements().to_vec())
    }

    /// Delete every stored record on the meter.
    pub async fn delete_all_measurements(&self) -> Result<CommandOutcome> {
        self.engine.delete_all_records().await
    }

    /// Measurements received so far.
    pub fn measurements(&self) -> Vec<GlucoseMeasurement> {
        self.log.read().measurements().to_vec()
    }

    /// Current RACP engine state.
    pub fn racp_state(&self) -> RacpState {
        self.engine.state()
    }

    /// The RACP engine driving this session.
    pub fn engine(&self) -> &RacpEngine {
        &self.engine
    }

    /// Unsubscribe from the glucose characteristics and stop routing.
    ///
    /// Every characteristic is unsubscribed even if one fails; the first
    /// error is returned.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(router) = self.router.take() {
            router.abort();
        }

        let mut result = Ok(());
        for uuid in &SUBSCRIBED_CHARACTERISTICS {
            if let Err(e) = self.transport.unsubscribe(uuid).await {
                warn!("Failed to unsubscribe from {}: {}", uuid, e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        info!("Glucose service closed");
        result
    }
}

impl Drop for GlucoseService {
    fn drop(&mut self) {
        if let Some(router) = self.router.take() {
            router.abort();
        }
    }
}

fn route_notification(
    event: &NotificationEvent,
    engine: &RacpEngine,
    log: &RwLock<MeasurementLog>,
) {
    let uuid = event.characteristic_uuid;

    if uuid == GLUCOSE_MEASUREMENT_UUID {
        debug!("Glucose measurement: {:02X?}", event.data);
        match GlucoseMeasurement::parse(&event.data) {
            Ok(measurement) => log.write().add_measurement(measurement),
            Err(e) => error!("Dropping glucose measurement {:02X?}: {}", event.data, e),
        }
    } else if uuid == GLUCOSE_MEASUREMENT_CONTEXT_UUID {
        debug!("Glucose measurement context: {:02X?}", event.data);
        match ContextRecord::parse(&event.data) {
            Ok(record) => {
                log.write().attach_context(record);
            }
            Err(e) => error!("Dropping measurement context {:02X?}: {}", event.data, e),
        }
    } else if uuid == RECORD_ACCESS_CONTROL_POINT_UUID {
        engine.handle_notification(&event.data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::transport::testing::FakeTransport;
    use crate::data::context::Meal;
    use crate::error::Error;
    use std::time::Duration;

    // 2024-02-14 09:30:00
    const BASE_TIME: [u8; 7] = [0xE8, 0x07, 0x02, 0x0E, 0x09, 0x1E, 0x00];

    fn fast_config() -> RacpConfig {
        RacpConfig {
            count_timeout: Duration::from_millis(100),
            transfer_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(1),
        }
    }

    fn measurement(sequence: u16) -> NotificationEvent {
        // kg/L with concentration, SFLOAT mantissa 95 exponent -5
        let mut data = vec![0x12];
        data.extend_from_slice(&sequence.to_le_bytes());
        data.extend_from_slice(&BASE_TIME);
        data.extend_from_slice(&[0x5F, 0xB0, 0x11]);
        NotificationEvent::new(GLUCOSE_MEASUREMENT_UUID, data)
    }

    fn meal_context(sequence: u16, meal: u8) -> NotificationEvent {
        let mut data = vec![0x02];
        data.extend_from_slice(&sequence.to_le_bytes());
        data.push(meal);
        NotificationEvent::new(GLUCOSE_MEASUREMENT_CONTEXT_UUID, data)
    }

    fn racp(data: &[u8]) -> NotificationEvent {
        NotificationEvent::new(RECORD_ACCESS_CONTROL_POINT_UUID, data.to_vec())
    }

    async fn open(transport: &Arc<FakeTransport>) -> GlucoseService {
        GlucoseService::open_with_config(transport.clone(), fast_config())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_subscribes() {
        let transport = Arc::new(FakeTransport::new());
        let service = open(&transport).await;

        for uuid in &SUBSCRIBED_CHARACTERISTICS {
            assert!(transport.is_subscribed(uuid));
        }

        service.shutdown().await.unwrap();
        for uuid in &SUBSCRIBED_CHARACTERISTICS {
            assert!(!transport.is_subscribed(uuid));
        }
    }

    #[tokio::test]
    async fn test_read_all_with_two_measurements() {
        let transport = Arc::new(FakeTransport::new());
        let service = open(&transport).await;
        transport.script_reply(vec![
            measurement(1),
            meal_context(1, 3),
            measurement(2),
            racp(&[0x06, 0x00, 0x01, 0x01]),
        ]);

        let measurements = service.read_all_measurements().await.unwrap();

        assert_eq!(measurements.len(), 2);
        assert_eq!(measurements[0].sequence_number, 1);
        assert_eq!(measurements[1].sequence_number, 2);
        assert_eq!(
            measurements[0].context.as_ref().and_then(|c| c.meal),
            Some(Meal::Fasting)
        );
        assert_eq!(measurements[1].context, None);
        assert!((measurements[0].concentration.unwrap() - 0.95).abs() < 1e-3);
        assert_eq!(service.racp_state(), RacpState::Completed);
        assert_eq!(
            transport.writes(),
            vec![(RECORD_ACCESS_CONTROL_POINT_UUID, vec![0x01, 0x01])]
        );
    }

    #[tokio::test]
    async fn test_context_before_measurement() {
        let transport = Arc::new(FakeTransport::new());
        let service = open(&transport).await;
        transport.script_reply(vec![
            meal_context(4, 5),
            measurement(4),
            meal_context(9, 1),
            racp(&[0x06, 0x00, 0x01, 0x01]),
        ]);

        let measurements = service.read_all_measurements().await.unwrap();

        assert_eq!(measurements.len(), 1);
        assert_eq!(
            measurements[0].context.as_ref().and_then(|c| c.meal),
            Some(Meal::Bedtime)
        );
    }

    #[tokio::test]
    async fn test_read_all_protocol_error_keeps_measurements() {
        let transport = Arc::new(FakeTransport::new());
        let service = open(&transport).await;
        transport.script_reply(vec![measurement(1), racp(&[0x06, 0x00, 0x01, 0x06])]);

        let measurements = service.read_all_measurements().await.unwrap();

        assert_eq!(measurements.len(), 1);
        assert!(matches!(service.racp_state(), RacpState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_read_all_timeout_keeps_partial_results() {
        let transport = Arc::new(FakeTransport::new());
        let service = open(&transport).await;
        transport.script_reply(vec![measurement(1), measurement(2)]);

        let err = service.read_all_measurements().await.unwrap_err();

        assert!(matches!(err, Error::Timeout { opcode: 0x0101, .. }));
        assert_eq!(service.measurements().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_measurement_is_dropped() {
        let transport = Arc::new(FakeTransport::new());
        let service = open(&transport).await;
        transport.script_reply(vec![
            NotificationEvent::new(GLUCOSE_MEASUREMENT_UUID, vec![0x00; 9]),
            measurement(3),
            racp(&[0x06, 0x00, 0x01, 0x01]),
        ]);

        let measurements = service.read_all_measurements().await.unwrap();

        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].sequence_number, 3);
    }

    #[tokio::test]
    async fn test_record_count_and_delete() {
        let transport = Arc::new(FakeTransport::new());
        let service = open(&transport).await;
        transport.script_reply(vec![racp(&[0x04, 0x00, 0x0C, 0x00])]);
        transport.script_reply(vec![racp(&[0x06, 0x00, 0x01, 0x01])]);

        assert_eq!(service.record_count().await.unwrap(), 12);
        assert!(service.delete_all_measurements().await.unwrap().is_completed());

        let opcodes: Vec<Vec<u8>> = transport.writes().into_iter().map(|(_, d)| d).collect();
        assert_eq!(opcodes, vec![vec![0x01, 0x04], vec![0x01, 0x02]]);
    }

    #[tokio::test]
    async fn test_second_read_all_keeps_transfer_in_flight() {
        let transport = Arc::new(FakeTransport::new());
        let service = Arc::new(open(&transport).await);
        transport.script_reply(vec![measurement(1)]);

        let first = {
            let service = service.clone();
            tokio::spawn(async move { service.read_all_measurements().await })
        };
        while service.measurements().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let err = service.read_all_measurements().await.unwrap_err();
        assert!(matches!(err, Error::CommandInProgress { pending: 0x0101 }));
        assert_eq!(service.measurements().len(), 1);

        transport.notify(racp(&[0x06, 0x00, 0x01, 0x01]));
        let measurements = first.await.unwrap().unwrap();
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].sequence_number, 1);
    }

    #[tokio::test]
    async fn test_read_all_clears_previous_results() {
        let transport = Arc::new(FakeTransport::new());
        let service = open(&transport).await;
        transport.script_reply(vec![measurement(1), racp(&[0x06, 0x00, 0x01, 0x01])]);
        transport.script_reply(vec![measurement(2), racp(&[0x06, 0x00, 0x01, 0x01])]);

        assert_eq!(service.read_all_measurements().await.unwrap().len(), 1);
        let second = service.read_all_measurements().await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].sequence_number, 2);
    }
}
