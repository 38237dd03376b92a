//! Record Access Control Point command engine.
//!
//! Issues one RACP command at a time and waits, bounded by a timeout, for the
//! correlated response notification. Notifications are fed in from outside
//! through [`RacpEngine::handle_notification`], usually by the routing task
//! of a [`GlucoseService`](crate::GlucoseService).

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::ble::transport::GattTransport;
use crate::ble::uuids::RECORD_ACCESS_CONTROL_POINT_UUID;
use crate::error::{Error, Result};
use crate::protocol::racp::{encode_command, RacpCommand, RacpResponse};

/// Timeouts used by the RACP engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RacpConfig {
    /// How long to wait for a record count.
    pub count_timeout: Duration,
    /// How long to wait for a transfer or deletion to finish.
    pub transfer_timeout: Duration,
    /// How often the waiting caller checks for completion.
    pub poll_interval: Duration,
}

impl RacpConfig {
    /// Default timeout for a record count.
    pub const DEFAULT_COUNT_TIMEOUT: Duration = RacpCommand::COUNT_TIMEOUT;
    /// Default timeout for read-all and delete-all.
    pub const DEFAULT_TRANSFER_TIMEOUT: Duration = RacpCommand::TRANSFER_TIMEOUT;
    /// Default completion poll interval.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
}

impl Default for RacpConfig {
    fn default() -> Self {
        Self {
            count_timeout: Self::DEFAULT_COUNT_TIMEOUT,
            transfer_timeout: Self::DEFAULT_TRANSFER_TIMEOUT,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }
}

/// State of the RACP engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RacpState {
    /// No command outstanding.
    #[default]
    Idle,
    /// A command was written and its response has not arrived.
    AwaitingResponse {
        /// Opcode of the outstanding command.
        opcode: u16,
    },
    /// The last command completed successfully.
    Completed,
    /// The last command was answered with an unexpected response.
    Failed {
        /// Description of the response.
        context: String,
    },
    /// The last command got no response in time.
    TimedOut {
        /// Opcode of the command that timed out.
        opcode: u16,
    },
}

impl RacpState {
    /// Check if a command is outstanding.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::AwaitingResponse { .. })
    }

    /// Check if the last command has finished, one way or another.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed { .. } | Self::TimedOut { .. }
        )
    }
}

impl fmt::Display for RacpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::AwaitingResponse { opcode } => write!(f, "Awaiting response to {:#06x}", opcode),
            Self::Completed => write!(f, "Completed"),
            Self::Failed { context } => write!(f, "Failed: {}", context),
            Self::TimedOut { opcode } => write!(f, "Timed out waiting for {:#06x}", opcode),
        }
    }
}

/// How a RACP command finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The meter reported success.
    Completed,
    /// The meter answered, but not with success. Already logged.
    ProtocolError {
        /// Description of the response.
        context: String,
    },
}

impl CommandOutcome {
    /// Check if the command completed successfully.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Single-command-at-a-time RACP state machine.
pub struct RacpEngine {
    transport: Arc<dyn GattTransport>,
    config: RacpConfig,
    state: RwLock<RacpState>,
    done: AtomicBool,
    record_count: RwLock<Option<u16>>,
}

impl RacpEngine {
    /// Create an engine writing commands through `transport`.
    pub fn new(transport: Arc<dyn GattTransport>, config: RacpConfig) -> Self {
        Self {
            transport,
            config,
            state: RwLock::new(RacpState::Idle),
            done: AtomicBool::new(false),
            record_count: RwLock::new(None),
        }
    }

    /// The engine's timeouts.
    pub fn config(&self) -> &RacpConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> RacpState {
        self.state.read().clone()
    }

    /// The record count reported in answer to the last command, if any.
    pub fn record_count(&self) -> Option<u16> {
        *self.record_count.read()
    }

    /// Return to `Idle` unless a command is outstanding.
    pub fn reset(&self) {
        let mut state = self.state.write();
        if !state.is_busy() {
            *state = RacpState::Idle;
        }
    }

    /// Write `opcode` to the RACP characteristic and wait for the response.
    ///
    /// # Errors
    ///
    /// - [`Error::CommandInProgress`] if another command is outstanding.
    /// - [`Error::Timeout`] if no response arrives within `timeout`.
    /// - Any transport error from the write; the engine returns to `Idle`.
    pub async fn send_command(&self, opcode: u16, timeout: Duration) -> Result<CommandOutcome> {
        self.send_command_with(opcode, timeout, || {}).await
    }

    /// Like [`send_command`](Self::send_command), running `before_write` once
    /// the command slot is claimed and before anything is written.
    ///
    /// `before_write` does not run if another command is outstanding.
    pub async fn send_command_with<F>(
        &self,
        opcode: u16,
        timeout: Duration,
        before_write: F,
    ) -> Result<CommandOutcome>
    where
        F: FnOnce() + Send,
    {
        {
            let mut state = self.state.write();
            if let RacpState::AwaitingResponse { opcode: pending } = *state {
                return Err(Error::CommandInProgress { pending });
            }
            *state = RacpState::AwaitingResponse { opcode };
            *self.record_count.write() = None;
            self.done.store(false, Ordering::SeqCst);
        }

        before_write();

        let command = encode_command(opcode);
        info!("Sending RACP command {:#06x}: {:02X?}", opcode, command);

        if let Err(e) = self
            .transport
            .write_command(&RECORD_ACCESS_CONTROL_POINT_UUID, &command)
            .await
        {
            error!("Failed to write RACP command {:#06x}: {}", opcode, e);
            *self.state.write() = RacpState::Idle;
            return Err(e);
        }

        let deadline = Instant::now() + timeout;
        while !self.done.load(Ordering::SeqCst) {
            if Instant::now() >= deadline {
                let mut state = self.state.write();
                if self.done.load(Ordering::SeqCst) {
                    break;
                }
                *state = RacpState::TimedOut { opcode };
                warn!("RACP command {:#06x} timed out after {:?}", opcode, timeout);
                return Err(Error::Timeout { opcode, timeout });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        let state = self.state.read().clone();
        debug!("RACP command {:#06x} finished: {}", opcode, state);
        match state {
            RacpState::Completed => Ok(CommandOutcome::Completed),
            RacpState::Failed { context } => Ok(CommandOutcome::ProtocolError { context }),
            other => Err(Error::ProtocolError {
                context: format!("Command {:#06x} finished in state {}", opcode, other),
            }),
        }
    }

    /// Feed a RACP notification into the engine.
    ///
    /// Anything other than a record count or a success response code fails
    /// the outstanding command. Notifications with no command outstanding are
    /// ignored.
    pub fn handle_notification(&self, data: &[u8]) {
        let mut state = self.state.write();

        let RacpState::AwaitingResponse { opcode } = *state else {
            warn!(
                "Ignoring RACP notification {:02X?} in state {}",
                data, *state
            );
            return;
        };

        debug!("RACP response to {:#06x}: {:02X?}", opcode, data);

        let next = match RacpResponse::parse(data) {
            Ok(RacpResponse::NumberOfRecords(count)) => {
                info!("Meter holds {} records", count);
                *self.record_count.write() = Some(count);
                RacpState::Completed
            }
            Ok(response) if response.is_success() => RacpState::Completed,
            Ok(response) => {
                let context = format!("command {:#06x} answered with {}", opcode, response);
                error!("RACP {}", context);
                RacpState::Failed { context }
            }
            Err(e) => {
                error!("RACP command {:#06x}: {}", opcode, e);
                RacpState::Failed {
                    context: e.to_string(),
                }
            }
        };

        *state = next;
        self.done.store(true, Ordering::SeqCst);
    }

    /// Ask the meter how many records it stores.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolError`] if the meter answers without a count.
    pub async fn request_record_count(&self) -> Result<u16> {
        let outcome = self
            .send_command(
                RacpCommand::ReportNumberOfRecords.opcode(),
                self.config.count_timeout,
            )
            .await?;

        match (outcome, self.record_count()) {
            (CommandOutcome::Completed, Some(count)) => Ok(count),
            (CommandOutcome::Completed, None) => Err(Error::ProtocolError {
                context: "record count request completed without a count".to_string(),
            }),
            (CommandOutcome::ProtocolError { context }, _) => Err(Error::ProtocolError { context }),
        }
    }

    /// Ask the meter to send every stored record.
    pub async fn report_all_records(&self) -> Result<CommandOutcome> {
        self.report_all_records_with(|| {}).await
    }

    /// Ask the meter to send every stored record, running `before_write`
    /// once the transfer is claimed.
    pub async fn report_all_records_with<F>(&self, before_write: F) -> Result<CommandOutcome>
    where
        F: FnOnce() + Send,
    {
        self.send_command_with(
            RacpCommand::ReportAllRecords.opcode(),
            self.config.transfer_timeout,
            before_write,
        )
        .await
    }

    /// Ask the meter to delete every stored record.
    pub async fn delete_all_records(&self) -> Result<CommandOutcome> {
        self.send_command(
            RacpCommand::DeleteAllRecords.opcode(),
            self.config.transfer_timeout,
        )
        .await
    }
}

impl fmt::Debug for RacpEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RacpEngine")
            .field("config", &self.config)
            .field("state", &*self.state.read())
            .field("record_count", &*self.record_count.read())
            .finish()
    }
}
