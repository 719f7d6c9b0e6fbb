//! The stable severity-level table (RFC 5424 numbering) and its mapping onto
//! tracing filter levels.

use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl Severity {
    pub const ALL: [Severity; 8] = [
        Severity::Emergency,
        Severity::Alert,
        Severity::Critical,
        Severity::Error,
        Severity::Warning,
        Severity::Notice,
        Severity::Info,
        Severity::Debug,
    ];

    /// Numeric level, 0 (emergency) through 7 (debug).
    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Emergency => "emergency",
            Severity::Alert => "alert",
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Notice => "notice",
            Severity::Info => "info",
            Severity::Debug => "debug",
        }
    }

    /// The tracing level filter this severity admits.
    pub fn tracing_directive(self) -> &'static str {
        match self {
            Severity::Emergency | Severity::Alert | Severity::Critical | Severity::Error => {
                "error"
            }
            Severity::Warning => "warn",
            Severity::Notice | Severity::Info => "info",
            Severity::Debug => "debug",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unknown severity `{0}` (expected emergency..debug or a level 0-7)")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if let Ok(level) = value.parse::<u8>() {
            return Severity::ALL
                .get(usize::from(level))
                .copied()
                .ok_or_else(|| ParseSeverityError(value.to_string()));
        }
        let lowered = value.to_ascii_lowercase();
        Severity::ALL
            .iter()
            .copied()
            .find(|severity| severity.as_str() == lowered)
            .ok_or_else(|| ParseSeverityError(value.to_string()))
    }
}
