//! Arming handshake.
//!
//! Each command in [`ARMING_SEQUENCE`] is written, followed by a short
//! settling delay, and then lines are read until one starts with `OK`
//! (advance) or `NG` (fail). Any other line is chatter and is skipped.
//!
//! [`HandshakeState`] holds the transitions as plain functions so they can be
//! exercised without a device; [`Handshake::run`] drives them over a
//! [`LineChannel`].

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::channel::{LineChannel, LinkError};
use crate::protocol::{ARMING_SEQUENCE, Command, Response};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    Sending(Command),
    AwaitingResponse(Command),
    Ready,
    Failed { command: Command, reason: String },
}

impl HandshakeState {
    /// `Idle` moves to sending the first command; other states are returned
    /// unchanged.
    pub fn begin(self) -> Self {
        match self {
            HandshakeState::Idle => HandshakeState::Sending(ARMING_SEQUENCE[0]),
            other => other,
        }
    }

    /// The command has been written; start listening for its response.
    pub fn sent(self) -> Self {
        match self {
            HandshakeState::Sending(command) => HandshakeState::AwaitingResponse(command),
            other => other,
        }
    }

    pub fn on_response(self, response: &Response) -> Self {
        match (self, response) {
            (HandshakeState::AwaitingResponse(command), Response::Success(_)) => {
                match command.next_in_sequence() {
                    Some(next) => HandshakeState::Sending(next),
                    None => HandshakeState::Ready,
                }
            }
            (HandshakeState::AwaitingResponse(command), Response::Failure(reason)) => {
                HandshakeState::Failed {
                    command,
                    reason: reason.clone(),
                }
            }
            (state, _) => state,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HandshakeState::Ready | HandshakeState::Failed { .. }
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("sensor rejected command `{command}`: {reason}")]
    Rejected { command: Command, reason: String },

    #[error("handshake cancelled")]
    Cancelled,

    #[error(transparent)]
    Link(#[from] LinkError),
}

#[derive(Debug, Clone, Copy)]
pub struct Handshake {
    settle_delay: Duration,
    read_timeout: Duration,
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SETTLE_DELAY, Self::DEFAULT_READ_TIMEOUT)
    }
}

impl Handshake {
    pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(settle_delay: Duration, read_timeout: Duration) -> Self {
        Self {
            settle_delay,
            read_timeout,
        }
    }

    /// Run the arming sequence to completion.
    ///
    /// Returns once the sensor has acknowledged every command. A rejected
    /// command stops the sequence; nothing after it is sent.
    #[instrument(name = "handshake", skip_all)]
    pub async fn run<C>(
        &self,
        channel: &mut C,
        cancel: &CancellationToken,
    ) -> Result<(), HandshakeError>
    where
        C: LineChannel + ?Sized,
    {
        info!("Preparing sensor");

        let mut state = HandshakeState::Idle;

        loop {
            state = match state {
                HandshakeState::Idle => state.begin(),
                HandshakeState::Sending(command) => {
                    debug!(%command, "Sending command");
                    channel.write_line(command.as_str()).await?;

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(HandshakeError::Cancelled),
                        _ = tokio::time::sleep(self.settle_delay) => {}
                    }

                    state.sent()
                }
                HandshakeState::AwaitingResponse(command) => {
                    let line = tokio::select! {
                        _ = cancel.cancelled() => return Err(HandshakeError::Cancelled),
                        line = channel.next_line(self.read_timeout) => line?,
                    };
                    let Some(line) = line else {
                        return Err(LinkError::EndOfStream.into());
                    };

                    let response = Response::classify(&line);
                    match &response {
                        Response::Success(line) => info!(%command, response = %line, "Command accepted"),
                        Response::Failure(line) => warn!(%command, response = %line, "Command rejected"),
                        Response::Unrecognized(line) => debug!(%command, %line, "Ignoring unrelated line"),
                    }

                    state.on_response(&response)
                }
                HandshakeState::Ready => {
                    info!("Sensor ready");
                    return Ok(());
                }
                HandshakeState::Failed { command, reason } => {
                    return Err(HandshakeError::Rejected { command, reason });
                }
            };
        }
    }
}
