use std::fmt;

/// Commands understood by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Stop streaming. Sent first when arming and again on shutdown.
    Stop,
    /// Ask the sensor to identify itself.
    Identify,
    /// Start streaming telemetry frames.
    Start,
}

/// Commands sent, in order, to bring the sensor into streaming mode.
pub const ARMING_SEQUENCE: [Command; 3] = [Command::Stop, Command::Identify, Command::Start];

impl Command {
    pub const fn as_str(self) -> &'static str {
        match self {
            Command::Stop => "STP",
            Command::Identify => "ID?",
            Command::Start => "STA",
        }
    }

    /// The command following this one in [`ARMING_SEQUENCE`].
    pub fn next_in_sequence(self) -> Option<Command> {
        let position = ARMING_SEQUENCE.iter().position(|c| *c == self)?;
        ARMING_SEQUENCE.get(position + 1).copied()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line read back after issuing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Success(String),
    Failure(String),
    Unrecognized(String),
}

impl Response {
    pub fn classify(line: &str) -> Self {
        if line.starts_with("OK") {
            Response::Success(line.to_owned())
        } else if line.starts_with("NG") {
            Response::Failure(line.to_owned())
        } else {
            Response::Unrecognized(line.to_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_vocabulary() {
        let wire: Vec<_> = ARMING_SEQUENCE.iter().map(|c| c.as_str()).collect();
        assert_eq!(wire, ["STP", "ID?", "STA"]);
    }

    #[test]
    fn sequence_order() {
        assert_eq!(Command::Stop.next_in_sequence(), Some(Command::Identify));
        assert_eq!(Command::Identify.next_in_sequence(), Some(Command::Start));
        assert_eq!(Command::Start.next_in_sequence(), None);
    }

    #[test]
    fn classify_by_prefix() {
        assert_eq!(Response::classify("OK"), Response::Success("OK".into()));
        assert_eq!(
            Response::classify("OK ID=UD-CO2S"),
            Response::Success("OK ID=UD-CO2S".into())
        );
        assert_eq!(Response::classify("NG 01"), Response::Failure("NG 01".into()));
        assert_eq!(
            Response::classify("CO2=400,HUM=40,TMP=20"),
            Response::Unrecognized("CO2=400,HUM=40,TMP=20".into())
        );
        assert_eq!(Response::classify(""), Response::Unrecognized(String::new()));
        assert_eq!(Response::classify("O"), Response::Unrecognized("O".into()));
    }
}
