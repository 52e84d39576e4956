use std::fmt;
use std::str::FromStr;

use crate::{RawFrame, Reading};

const CO2_MARKER: &str = "CO2=";
const HUMIDITY_MARKER: &str = ",HUM=";
const TEMPERATURE_MARKER: &str = ",TMP=";

/// Sent by the sensor once it has accepted a `STP` command while streaming.
pub const STOP_ACKNOWLEDGEMENT: &str = "OK STP";

/// Classification of one line received while streaming.
#[derive(Debug, Clone, PartialEq)]
pub enum Telemetry {
    /// A telemetry frame, already compensated.
    Reading(Reading),
    /// The sensor confirmed a stop request; no more frames follow.
    StopAcknowledged,
    /// Anything else the sensor printed.
    NotAFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameField {
    Co2,
    Humidity,
    Temperature,
}

impl fmt::Display for FrameField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameField::Co2 => f.write_str("CO2"),
            FrameField::Humidity => f.write_str("HUM"),
            FrameField::Temperature => f.write_str("TMP"),
        }
    }
}

/// A line that has the shape of a telemetry frame but a value that does not
/// parse as a finite number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed {field} value {value:?} in telemetry frame")]
pub struct MalformedFrame {
    pub field: FrameField,
    pub value: String,
}

/// Decode one line of sensor output.
///
/// Frames are located by substring search for `CO2=…,HUM=…,TMP=…`, each
/// value being the numeric run that follows its marker, so text before or
/// after the frame is ignored. When several `CO2=` markers appear, the first
/// one that starts a complete frame wins. A frame-shaped line whose values do
/// not parse is an error rather than a reading with defaulted fields.
pub fn decode(line: &str, captured_at: jiff::Timestamp) -> Result<Telemetry, MalformedFrame> {
    if let Some(fields) = FrameFields::locate(line) {
        let raw = fields.parse()?;
        return Ok(Telemetry::Reading(Reading::from_raw(raw, captured_at)));
    }

    if let Some(malformed) = FrameFields::diagnose(line) {
        return Err(malformed);
    }

    if line.starts_with(STOP_ACKNOWLEDGEMENT) {
        return Ok(Telemetry::StopAcknowledged);
    }

    Ok(Telemetry::NotAFrame)
}

fn is_co2_char(c: char) -> bool {
    c.is_ascii_digit()
}

fn is_humidity_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

fn is_temperature_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.' || c == '-'
}

struct FrameFields<'a> {
    co2: &'a str,
    humidity: &'a str,
    temperature: &'a str,
}

impl<'a> FrameFields<'a> {
    fn locate(line: &'a str) -> Option<Self> {
        line.match_indices(CO2_MARKER)
            .find_map(|(at, marker)| Self::match_at(&line[at + marker.len()..]))
    }

    fn match_at(text: &'a str) -> Option<Self> {
        let (co2, rest) = numeric_run(text, is_co2_char)?;
        let rest = rest.strip_prefix(HUMIDITY_MARKER)?;
        let (humidity, rest) = numeric_run(rest, is_humidity_char)?;
        let rest = rest.strip_prefix(TEMPERATURE_MARKER)?;
        let (temperature, _) = numeric_run(rest, is_temperature_char)?;

        Some(Self {
            co2,
            humidity,
            temperature,
        })
    }

    /// Reports the offending field of a line that has all three markers in
    /// order but no complete frame.
    fn diagnose(line: &str) -> Option<MalformedFrame> {
        let rest = after(line, CO2_MARKER)?;
        let (co2, rest) = split_at_marker(rest, HUMIDITY_MARKER)?;
        let (humidity, rest) = split_at_marker(rest, TEMPERATURE_MARKER)?;
        let end = rest
            .find(|c: char| c.is_whitespace() || c == ',')
            .unwrap_or(rest.len());

        let fields: [(FrameField, &str, fn(char) -> bool); 3] = [
            (FrameField::Co2, co2, is_co2_char),
            (FrameField::Humidity, humidity, is_humidity_char),
            (FrameField::Temperature, &rest[..end], is_temperature_char),
        ];

        fields
            .into_iter()
            .find(|(_, value, accept)| value.is_empty() || !value.chars().all(accept))
            .map(|(field, value, _)| MalformedFrame {
                field,
                value: value.to_owned(),
            })
    }

    fn parse(&self) -> Result<RawFrame, MalformedFrame> {
        let co2 = parse_field::<u32>(FrameField::Co2, self.co2)?;
        let humidity = parse_finite(FrameField::Humidity, self.humidity)?;
        let temperature = parse_finite(FrameField::Temperature, self.temperature)?;

        Ok(RawFrame {
            co2,
            humidity,
            temperature,
        })
    }
}

/// Splits `text` after its leading run of accepted characters, if any.
fn numeric_run(text: &str, accept: fn(char) -> bool) -> Option<(&str, &str)> {
    let end = text.find(|c: char| !accept(c)).unwrap_or(text.len());
    (end > 0).then(|| text.split_at(end))
}

fn after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    text.find(marker).map(|at| &text[at + marker.len()..])
}

fn split_at_marker<'a>(text: &'a str, marker: &str) -> Option<(&'a str, &'a str)> {
    text.find(marker)
        .map(|at| (&text[..at], &text[at + marker.len()..]))
}

fn parse_field<T: FromStr>(field: FrameField, value: &str) -> Result<T, MalformedFrame> {
    value.parse().map_err(|_| MalformedFrame {
        field,
        value: value.to_owned(),
    })
}

fn parse_finite(field: FrameField, value: &str) -> Result<f64, MalformedFrame> {
    let parsed: f64 = parse_field(field, value)?;
    if !parsed.is_finite() {
        return Err(MalformedFrame {
            field,
            value: value.to_owned(),
        });
    }
    Ok(parsed)
}
