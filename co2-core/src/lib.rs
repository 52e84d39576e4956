pub mod compensation;
pub mod decode;
pub mod timestamp;

use serde::{Deserialize, Serialize};

pub use compensation::{correct_humidity, correct_temperature};
pub use decode::{FrameField, MalformedFrame, Telemetry, decode};

/// A compensated sensor reading, as exposed to HTTP clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// CO2 concentration in ppm.
    pub co2: u32,
    /// Relative humidity in percent, referenced to the corrected temperature.
    pub humidity: f64,
    /// Ambient temperature in degrees Celsius.
    pub temperature: f64,
    /// Capture time of the frame this reading was decoded from.
    #[serde(with = "crate::timestamp")]
    pub timestamp: jiff::Timestamp,
}

impl Reading {
    /// Build a reading from uncompensated frame values.
    pub fn from_raw(raw: RawFrame, captured_at: jiff::Timestamp) -> Self {
        Self {
            co2: raw.co2,
            humidity: correct_humidity(raw.humidity, raw.temperature),
            temperature: correct_temperature(raw.temperature),
            timestamp: captured_at,
        }
    }
}

/// Values exactly as reported by the sensor, before compensation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawFrame {
    pub co2: u32,
    pub humidity: f64,
    pub temperature: f64,
}
