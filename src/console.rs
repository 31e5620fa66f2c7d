// Operator console: line commands for accepting registrations

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::errors::RelayError;
use crate::core::models::RegistrationId;
use crate::registration::RegistrationService;

/// Operator command, keyed on the first three characters of a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// `ACK<id>`: accept registration `<id>`
    Ack(RegistrationId),
    /// `END`: stop reading commands
    End,
    Unknown(String),
}

impl ConsoleCommand {
    /// Parse one non-blank line
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line.get(..3) {
            Some("ACK") => ConsoleCommand::Ack(RegistrationId::from(line[3..].trim())),
            Some("END") => ConsoleCommand::End,
            _ => ConsoleCommand::Unknown(line.to_string()),
        }
    }
}

/// Why the console loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    End,
    Eof,
    Cancelled,
    ReadError,
}

pub struct OperatorConsole {
    registrations: Arc<RegistrationService>,
}

impl OperatorConsole {
    pub fn new(registrations: Arc<RegistrationService>) -> Self {
        Self { registrations }
    }

    /// Read and execute commands until `END`, EOF, a read error or cancellation
    ///
    /// Stopping the console never stops the HTTP service.
    pub async fn run<R>(&self, mut input: R, shutdown: CancellationToken) -> ConsoleExit
    where
        R: AsyncBufRead + Unpin,
    {
        info!("Operator console ready");
        let mut line = String::new();

        loop {
            line.clear();
            let read = tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Operator console cancelled");
                    return ConsoleExit::Cancelled;
                }
                read = input.read_line(&mut line) => read,
            };

            match read {
                Ok(0) => {
                    info!("Operator console input closed");
                    return ConsoleExit::Eof;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Operator console read failed");
                    return ConsoleExit::ReadError;
                }
            }

            if line.trim().is_empty() {
                continue;
            }

            match ConsoleCommand::parse(&line) {
                ConsoleCommand::Ack(id) => self.acknowledge(&id).await,
                ConsoleCommand::End => {
                    info!("Operator console stopped by END");
                    return ConsoleExit::End;
                }
                ConsoleCommand::Unknown(text) => {
                    warn!(command = %text, "Unknown console command");
                }
            }
        }
    }

    async fn acknowledge(&self, id: &RegistrationId) {
        match self.registrations.accept(id).await {
            Ok(()) => info!(registration_id = %id, "Acknowledged registration"),
            Err(RelayError::NotFound) => {
                warn!(registration_id = %id, "No registration with that id")
            }
            Err(e) => error!(registration_id = %id, error = %e, "Acknowledge failed"),
        }
    }
}
