#![allow(dead_code)]

use std::time::Duration;

use co2_bridge::{ReaderOptions, ReadingStore};
use co2_core::Reading;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

pub const FRAME_INTERVAL: Duration = Duration::from_millis(5);

pub fn options() -> ReaderOptions {
    ReaderOptions {
        settle_delay: Duration::from_millis(1),
        read_timeout: Duration::from_millis(300),
    }
}

/// How the simulated sensor behaves.
#[derive(Clone, Default)]
pub struct Script {
    /// Lines emitted in a loop once streaming has started.
    pub frames: Vec<&'static str>,
    /// Command answered with `NG` instead of `OK`.
    pub reject: Option<&'static str>,
    /// Do not answer `STP` while streaming.
    pub ignore_stop: bool,
    /// Emit each frame once, then stop streaming with `OK STP` unprompted.
    pub stop_unprompted: bool,
}

/// Spawn a simulated sensor on `device`. The task ends when the other side
/// closes and returns every command it received.
pub fn spawn_sensor(device: DuplexStream, script: Script) -> JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let (reader, mut writer) = tokio::io::split(device);
        let mut lines = BufReader::new(reader).lines();
        let mut received = Vec::new();
        let mut streaming = false;
        let mut frames = script.frames.iter().cycle();
        let mut emitted = 0;

        loop {
            let line = if streaming && !script.frames.is_empty() {
                tokio::select! {
                    line = lines.next_line() => line,
                    _ = tokio::time::sleep(FRAME_INTERVAL) => {
                        if script.stop_unprompted && emitted == script.frames.len() {
                            streaming = false;
                            let _ = writer.write_all(b"OK STP\r\n").await;
                        } else if let Some(frame) = frames.next() {
                            emitted += 1;
                            let _ = writer.write_all(format!("{frame}\r\n").as_bytes()).await;
                        }
                        continue;
                    }
                }
            } else {
                lines.next_line().await
            };

            let Ok(Some(command)) = line else {
                return received;
            };
            received.push(command.clone());

            let reply = match command.as_str() {
                c if Some(c) == script.reject => Some("NG".to_owned()),
                "STP" if streaming => {
                    if script.ignore_stop {
                        None
                    } else {
                        streaming = false;
                        Some("OK STP".to_owned())
                    }
                }
                "STP" => Some("OK STP".to_owned()),
                "ID?" => Some("OK ID=UD-CO2S".to_owned()),
                "STA" => {
                    streaming = true;
                    Some("OK STA".to_owned())
                }
                other => Some(format!("NG unknown command {other}")),
            };

            if let Some(reply) = reply {
                if writer.write_all(format!("{reply}\r\n").as_bytes()).await.is_err() {
                    return received;
                }
            }
        }
    })
}

/// Poll `store` until it holds a reading or `within` elapses.
pub async fn wait_for_reading(store: &ReadingStore, within: Duration) -> Option<Reading> {
    tokio::time::timeout(within, async {
        loop {
            if let Some(reading) = store.latest() {
                return Reading::clone(&reading);
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .ok()
}
