use std::time::Duration;

use co2_core::{Telemetry, decode};
use co2_link::{Command, Handshake, HandshakeError, LineChannel, LinkError, open_serial};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::SerialConfig;
use crate::store::ReadingStore;

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("failed to prepare sensor: {0}")]
    Handshake(#[source] HandshakeError),

    #[error(transparent)]
    Link(#[from] LinkError),
}

#[derive(Debug, Clone, Copy)]
pub struct ReaderOptions {
    pub settle_delay: Duration,
    pub read_timeout: Duration,
}

impl ReaderOptions {
    fn handshake(&self) -> Handshake {
        Handshake::new(self.settle_delay, self.read_timeout)
    }
}

impl From<&SerialConfig> for ReaderOptions {
    fn from(config: &SerialConfig) -> Self {
        Self {
            settle_delay: config.settle_delay(),
            read_timeout: config.read_timeout(),
        }
    }
}

/// Open the sensor's serial device and run a reading session on it.
#[instrument(name = "reader", skip(store, cancel, options))]
pub async fn run_reader(
    device: &str,
    store: ReadingStore,
    cancel: CancellationToken,
    options: ReaderOptions,
) -> Result<(), ReaderError> {
    let channel = open_serial(device)?;
    run_session(channel, &store, &cancel, options).await
}

/// Arm the sensor, then decode its frames into `store` until the sensor
/// stops or `cancel` fires.
///
/// The channel is closed on every exit path, after a final `STP` if one has
/// not been sent yet.
pub async fn run_session<C>(
    mut channel: C,
    store: &ReadingStore,
    cancel: &CancellationToken,
    options: ReaderOptions,
) -> Result<(), ReaderError>
where
    C: LineChannel,
{
    let mut stop_sent = false;
    let result = stream(&mut channel, store, cancel, options, &mut stop_sent).await;

    if !stop_sent {
        match channel.write_line(Command::Stop.as_str()).await {
            Ok(()) => tokio::time::sleep(options.settle_delay).await,
            Err(e) => debug!(error = %e, "Could not send final stop"),
        }
    }
    channel.close().await;

    match &result {
        Ok(()) => info!("Reader stopped"),
        Err(e) => error!(error = %e, "Reader failed"),
    }
    result
}

async fn stream<C>(
    channel: &mut C,
    store: &ReadingStore,
    cancel: &CancellationToken,
    options: ReaderOptions,
    stop_sent: &mut bool,
) -> Result<(), ReaderError>
where
    C: LineChannel,
{
    match options.handshake().run(channel, cancel).await {
        Ok(()) => {}
        Err(HandshakeError::Cancelled) => {
            info!("Shutdown requested during handshake");
            return Ok(());
        }
        Err(e) => return Err(ReaderError::Handshake(e)),
    }

    info!("Streaming telemetry");

    // Set once `STP` has gone out; the sensor then gets one read timeout to
    // acknowledge it.
    let mut drain_deadline: Option<Instant> = None;

    loop {
        let line = match drain_deadline {
            None => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!("Shutdown requested, stopping sensor");
                        *stop_sent = true;
                        if let Err(e) = channel.write_line(Command::Stop.as_str()).await {
                            warn!(error = %e, "Could not send stop, exiting anyway");
                            return Ok(());
                        }
                        drain_deadline = Some(Instant::now() + options.read_timeout);
                        continue;
                    }
                    line = channel.next_line(options.read_timeout) => match line? {
                        Some(line) => line,
                        None => return Err(LinkError::EndOfStream.into()),
                    },
                }
            }
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match channel.next_line(remaining).await {
                    Ok(Some(line)) => line,
                    Ok(None) | Err(LinkError::ReadTimeout(_)) => {
                        warn!("Sensor did not acknowledge stop");
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        match decode(&line, jiff::Timestamp::now()) {
            Ok(Telemetry::Reading(reading)) => {
                debug!(
                    co2 = reading.co2,
                    humidity = reading.humidity,
                    temperature = reading.temperature,
                    "Captured reading"
                );
                store.store(reading);
            }
            Ok(Telemetry::StopAcknowledged) => {
                info!("Sensor stopped streaming");
                return Ok(());
            }
            Ok(Telemetry::NotAFrame) => info!(%line, "Read unmatched line"),
            Err(e) => warn!(error = %e, %line, "Discarding malformed frame"),
        }
    }
}
