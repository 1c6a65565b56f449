use std::{fmt, str::FromStr, time::Duration};

/// A duration in the Go `time.ParseDuration` format used throughout the
/// Kubernetes API (`"10s"`, `"500ms"`, `"1m"`, `"1h30m"`, fractional values
/// allowed).
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct K8sDuration {
    duration: Duration,
    is_negative: bool,
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("invalid unit: {}", EXPECTED_UNITS)]
    InvalidUnit,

    #[error("missing a unit: {}", EXPECTED_UNITS)]
    NoUnit,

    #[error("invalid floating-point number: {}", .0)]
    NotANumber(#[from] std::num::ParseFloatError),
}

const EXPECTED_UNITS: &str = "expected one of 'ns', 'us', 'ms', 's', 'm', or 'h'";

impl K8sDuration {
    /// Whole milliseconds of a non-negative duration; zero when negative.
    pub fn as_millis(&self) -> u128 {
        if self.is_negative {
            0
        } else {
            self.duration.as_millis()
        }
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.is_negative
    }
}

impl From<Duration> for K8sDuration {
    fn from(duration: Duration) -> Self {
        Self {
            duration,
            is_negative: false,
        }
    }
}

impl From<K8sDuration> for Duration {
    fn from(K8sDuration { duration, .. }: K8sDuration) -> Self {
        duration
    }
}

impl FromStr for K8sDuration {
    type Err = ParseError;

    fn from_str(mut s: &str) -> Result<Self, Self::Err> {
        fn duration_from_units(val: f64, unit: &str) -> Result<Duration, ParseError> {
            const MINUTE: Duration = Duration::from_secs(60);
            let base = match unit {
                "ns" => Duration::from_nanos(1),
                // U+00B5 is the micro sign, U+03BC is Greek mu; Go accepts
                // both spellings.
                "us" | "\u{00b5}s" | "\u{03bc}s" => Duration::from_micros(1),
                "ms" => Duration::from_millis(1),
                "s" => Duration::from_secs(1),
                "m" => MINUTE,
                "h" => MINUTE * 60,
                _ => return Err(ParseError::InvalidUnit),
            };
            Ok(base.mul_f64(val))
        }

        let is_negative = s.starts_with('-');
        s = s.trim_start_matches('+').trim_start_matches('-');

        if s == "0" {
            return Ok(K8sDuration {
                duration: Duration::ZERO,
                is_negative,
            });
        }

        let mut total = Duration::ZERO;
        while !s.is_empty() {
            let unit_start = s
                .find(|c: char| c.is_alphabetic() || c == '\u{00b5}' || c == '\u{03bc}')
                .ok_or(ParseError::NoUnit)?;
            let (val, rest) = s.split_at(unit_start);
            let val = val.parse::<f64>()?;
            let unit_end = rest
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(rest.len());
            let (unit, rest) = rest.split_at(unit_end);
            total += duration_from_units(val, unit)?;
            s = rest;
        }

        Ok(K8sDuration {
            duration: total,
            is_negative,
        })
    }
}

impl fmt::Debug for K8sDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use std::fmt::Write;
        if self.is_negative {
            f.write_char('-')?;
        }
        fmt::Debug::fmt(&self.duration, f)
    }
}

impl fmt::Display for K8sDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
