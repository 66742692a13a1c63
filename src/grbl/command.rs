use std::fmt::{self, Display};

/// Distance between two preset positions along Z
pub const SEGMENT_LENGTH: u32 = 178;

/// Relative Z travel of a single jog
pub const JOG_STEP: u32 = 5;

/// GRBL real-time status query, sent once after connecting
pub const STATUS_PROBE: &str = "?";

/// The fixed set of motion requests sent to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Declare the current Z position as work zero
    Home,

    /// Rapid absolute move to preset `n`, `n * SEGMENT_LENGTH` below zero
    MoveToSegment(u8),

    /// Relative rapid towards +Z
    JogPositive,

    /// Relative rapid towards -Z
    JogNegative,
}

impl Command {
    /// The newline-terminated G-code line for this command
    pub fn line(&self) -> String {
        match self {
            Command::Home => "G10 L20 P1 Z0\n".to_string(),
            Command::MoveToSegment(segment) => {
                format!("G90 G00 Z-{}\n", u32::from(*segment) * SEGMENT_LENGTH)
            }
            Command::JogPositive => format!("G91 G00 Z{}\n", JOG_STEP),
            Command::JogNegative => format!("G91 G00 Z-{}\n", JOG_STEP),
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Home => write!(f, "Home"),
            Command::MoveToSegment(segment) => write!(f, "MoveToSegment({})", segment),
            Command::JogPositive => write!(f, "JogPositive"),
            Command::JogNegative => write!(f, "JogNegative"),
        }
    }
}
