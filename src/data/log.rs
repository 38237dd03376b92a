//! In-memory record log.
//!
//! Collects measurements in arrival order and attaches context records to
//! them by sequence number.

use tracing::{debug, warn};

use super::context::ContextRecord;
use super::measurement::GlucoseMeasurement;

/// Measurements received during a transfer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementLog {
    /// Measurements in the order they arrived.
    measurements: Vec<GlucoseMeasurement>,
    /// Contexts whose measurement has not arrived yet.
    pending_contexts: Vec<ContextRecord>,
}

impl MeasurementLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a measurement, attaching any context that arrived before it.
    pub fn add_measurement(&mut self, mut measurement: GlucoseMeasurement) {
        if let Some(pos) = self
            .pending_contexts
            .iter()
            .position(|c| c.sequence_number == measurement.sequence_number)
        {
            let record = self.pending_contexts.remove(pos);
            debug!(
                "Attaching queued context to measurement {}",
                measurement.sequence_number
            );
            measurement.context = Some(record.context);
        }

        self.measurements.push(measurement);
    }

    /// Attach a context to its measurement.
    ///
    /// Returns `false` if the measurement is not known yet; the context is
    /// then queued until it arrives.
    pub fn attach_context(&mut self, record: ContextRecord) -> bool {
        match self
            .measurements
            .iter_mut()
            .find(|m| m.sequence_number == record.sequence_number)
        {
            Some(measurement) => {
                measurement.context = Some(record.context);
                true
            }
            None => {
                debug!(
                    "Queueing context for unknown measurement {}",
                    record.sequence_number
                );
                self.pending_contexts.push(record);
                false
            }
        }
    }

    /// Drop contexts that never found their measurement, returning how many.
    pub fn discard_pending(&mut self) -> usize {
        let count = self.pending_contexts.len();
        for record in self.pending_contexts.drain(..) {
            warn!(
                "Discarding context for missing measurement {}",
                record.sequence_number
            );
        }
        count
    }

    /// Number of contexts still waiting for their measurement.
    pub fn pending_count(&self) -> usize {
        self.pending_contexts.len()
    }

    /// Measurements in arrival order.
    pub fn measurements(&self) -> &[GlucoseMeasurement] {
        &self.measurements
    }

    /// Look up a measurement by sequence number.
    pub fn get(&self, sequence_number: u16) -> Option<&GlucoseMeasurement> {
        self.measurements
            .iter()
            .find(|m| m.sequence_number == sequence_number)
    }

    /// Number of measurements.
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    /// Check if the log holds no measurements.
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Remove all measurements and pending contexts.
    pub fn clear(&mut self) {
        self.measurements.clear();
        self.pending_contexts.clear();
    }
}
