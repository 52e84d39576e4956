use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info, warn};

pub const BAUD_RATE: u32 = 115_200;

const LINE_TERMINATOR: &[u8] = b"\r\n";
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("failed to open serial port {path}: {source}")]
    Open {
        path: String,
        source: tokio_serial::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no line received within {0:?}")]
    ReadTimeout(Duration),

    #[error("sensor closed the stream")]
    EndOfStream,

    #[error("line channel already closed")]
    Closed,
}

/// A text-line connection to the sensor.
#[async_trait]
pub trait LineChannel: Send {
    /// Write `text` followed by CRLF.
    async fn write_line(&mut self, text: &str) -> Result<(), LinkError>;

    /// Wait up to `timeout` for the next complete line, without its
    /// terminator. `Ok(None)` means the stream has ended.
    ///
    /// Dropping the returned future before it completes does not lose data.
    async fn next_line(&mut self, timeout: Duration) -> Result<Option<String>, LinkError>;

    /// Release the connection. Calling it again is a no-op.
    async fn close(&mut self);
}

/// [`LineChannel`] over any byte stream.
pub struct LineStream<S> {
    stream: BufReader<S>,
    pending: Vec<u8>,
    closed: bool,
}

impl<S> LineStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            pending: Vec::with_capacity(128),
            closed: false,
        }
    }
}

/// Open the sensor's serial device at 115200 baud, 8N1.
pub fn open_serial(path: &str) -> Result<LineStream<SerialStream>, LinkError> {
    let port = tokio_serial::new(path, BAUD_RATE)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|source| LinkError::Open {
            path: path.to_owned(),
            source,
        })?;

    info!(path, baud_rate = BAUD_RATE, "Serial port opened");
    Ok(LineStream::new(port))
}

#[async_trait]
impl<S> LineChannel for LineStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_line(&mut self, text: &str) -> Result<(), LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }

        let writer = self.stream.get_mut();
        writer.write_all(text.as_bytes()).await?;
        writer.write_all(LINE_TERMINATOR).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn next_line(&mut self, timeout: Duration) -> Result<Option<String>, LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }

        // read_until appends into `pending`, so a timed-out or dropped read
        // resumes where it left off.
        let read = tokio::time::timeout(timeout, self.stream.read_until(b'\n', &mut self.pending))
            .await
            .map_err(|_| LinkError::ReadTimeout(timeout))?;

        if read? == 0 && self.pending.is_empty() {
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&self.pending)
            .trim_end_matches(['\r', '\n'])
            .to_owned();
        self.pending.clear();

        Ok(Some(line))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        match tokio::time::timeout(CLOSE_TIMEOUT, self.stream.get_mut().shutdown()).await {
            Ok(Ok(())) => debug!("Line channel closed"),
            Ok(Err(e)) => warn!(error = %e, "Error while closing line channel"),
            Err(_) => warn!(timeout = ?CLOSE_TIMEOUT, "Timed out closing line channel"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, duplex};

    const WAIT: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn write_line_appends_crlf() {
        let (client, mut device) = duplex(64);
        let mut channel = LineStream::new(client);

        channel.write_line("ID?").await.unwrap();

        let mut buf = [0u8; 5];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ID?\r\n");
    }

    #[tokio::test]
    async fn next_line_strips_terminators() {
        let (client, mut device) = duplex(64);
        let mut channel = LineStream::new(client);

        device.write_all(b"OK\r\nNG 02\nOK STP\r\n").await.unwrap();

        assert_eq!(channel.next_line(WAIT).await.unwrap().as_deref(), Some("OK"));
        assert_eq!(channel.next_line(WAIT).await.unwrap().as_deref(), Some("NG 02"));
        assert_eq!(channel.next_line(WAIT).await.unwrap().as_deref(), Some("OK STP"));
    }

    #[tokio::test]
    async fn silence_is_a_read_timeout() {
        let (client, _device) = duplex(64);
        let mut channel = LineStream::new(client);

        let err = channel.next_line(Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, LinkError::ReadTimeout(_)));
    }

    #[tokio::test]
    async fn partial_line_survives_timeout() {
        let (client, mut device) = duplex(64);
        let mut channel = LineStream::new(client);

        device.write_all(b"CO2=4").await.unwrap();
        assert!(channel.next_line(Duration::from_millis(10)).await.is_err());

        device.write_all(b"12,HUM=40,TMP=20\r\n").await.unwrap();
        assert_eq!(
            channel.next_line(WAIT).await.unwrap().as_deref(),
            Some("CO2=412,HUM=40,TMP=20")
        );
    }

    #[tokio::test]
    async fn end_of_stream_after_last_line() {
        let (client, mut device) = duplex(64);
        let mut channel = LineStream::new(client);

        device.write_all(b"OK\r\nunterminated").await.unwrap();
        drop(device);

        assert_eq!(channel.next_line(WAIT).await.unwrap().as_deref(), Some("OK"));
        assert_eq!(
            channel.next_line(WAIT).await.unwrap().as_deref(),
            Some("unterminated")
        );
        assert_eq!(channel.next_line(WAIT).await.unwrap(), None);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_further_io() {
        let (client, device) = duplex(64);
        let mut channel = LineStream::new(client);
        drop(device);

        channel.close().await;
        channel.close().await;

        assert!(matches!(
            channel.write_line("STP").await,
            Err(LinkError::Closed)
        ));
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let (client, mut device) = duplex(64);
        let mut channel = LineStream::new(client);

        device.write_all(b"OK \xff\r\n").await.unwrap();

        let line = channel.next_line(WAIT).await.unwrap().unwrap();
        assert!(line.starts_with("OK "));
    }
}
