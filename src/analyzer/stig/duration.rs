//! Durations in Kubernetes API notation.
//!
//! Component flags and kubelet configuration express timeouts as signed
//! sequences of decimal numbers with units (`90s`, `1h30m`, `-1.5h`,
//! `300ms`). `ApiDuration` parses that notation and prints the canonical form
//! (`1h0m0s`), which is what shows up in check result details.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const NANOSECOND: u64 = 1;
const MICROSECOND: u64 = 1_000 * NANOSECOND;
const MILLISECOND: u64 = 1_000 * MICROSECOND;
const SECOND: u64 = 1_000 * MILLISECOND;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;

/// Error type for duration parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("time: invalid duration \"{0}\"")]
    Invalid(String),

    #[error("time: missing unit in duration \"{0}\"")]
    MissingUnit(String),

    #[error("time: unknown unit \"{unit}\" in duration \"{input}\"")]
    UnknownUnit { unit: String, input: String },
}

/// A signed duration with nanosecond precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiDuration {
    nanos: i64,
}

impl ApiDuration {
    pub const ZERO: ApiDuration = ApiDuration { nanos: 0 };

    pub const fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self {
            nanos: secs * SECOND as i64,
        }
    }

    pub const fn from_mins(mins: i64) -> Self {
        Self {
            nanos: mins * MINUTE as i64,
        }
    }

    pub const fn from_hours(hours: i64) -> Self {
        Self {
            nanos: hours * HOUR as i64,
        }
    }

    pub const fn as_nanos(&self) -> i64 {
        self.nanos
    }

    pub fn is_positive(&self) -> bool {
        self.nanos > 0
    }

    /// Parse a duration such as `300ms`, `-1.5h` or `2h45m`.
    pub fn parse(input: &str) -> Result<Self, DurationError> {
        let invalid = || DurationError::Invalid(input.to_string());

        let (negative, mut rest) = match input.as_bytes().first() {
            Some(b'-') => (true, &input[1..]),
            Some(b'+') => (false, &input[1..]),
            _ => (false, input),
        };

        if rest == "0" {
            return Ok(Self::ZERO);
        }
        if rest.is_empty() {
            return Err(invalid());
        }

        let mut total: u64 = 0;
        while !rest.is_empty() {
            let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
            let (int_part, after_int) = rest.split_at(int_len);

            let (frac_part, after_number) = match after_int.strip_prefix('.') {
                Some(after_dot) => {
                    let frac_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
                    after_dot.split_at(frac_len)
                }
                None => ("", after_int),
            };
            if int_part.is_empty() && frac_part.is_empty() {
                return Err(invalid());
            }

            let unit_len = after_number
                .find(|c: char| c == '.' || c.is_ascii_digit())
                .unwrap_or(after_number.len());
            if unit_len == 0 {
                return Err(DurationError::MissingUnit(input.to_string()));
            }
            let (unit, remaining) = after_number.split_at(unit_len);
            let scale = unit_scale(unit).ok_or_else(|| DurationError::UnknownUnit {
                unit: unit.to_string(),
                input: input.to_string(),
            })?;

            let whole: u64 = if int_part.is_empty() {
                0
            } else {
                int_part.parse().map_err(|_| invalid())?
            };
            let mut value = whole.checked_mul(scale).ok_or_else(invalid)?;

            if !frac_part.is_empty() {
                let mut fraction: u64 = 0;
                let mut frac_scale = 1f64;
                for digit in frac_part.bytes() {
                    // Digits beyond u64 precision are dropped.
                    if fraction > (u64::MAX - 9) / 10 {
                        break;
                    }
                    fraction = fraction * 10 + u64::from(digit - b'0');
                    frac_scale *= 10.0;
                }
                let extra = (fraction as f64 * (scale as f64 / frac_scale)) as u64;
                value = value.checked_add(extra).ok_or_else(invalid)?;
            }

            total = total.checked_add(value).ok_or_else(invalid)?;
            rest = remaining;
        }

        if negative {
            if total > i64::MAX as u64 + 1 {
                return Err(invalid());
            }
            Ok(Self {
                nanos: (-(total as i128)) as i64,
            })
        } else {
            let nanos = i64::try_from(total).map_err(|_| invalid())?;
            Ok(Self { nanos })
        }
    }
}

fn unit_scale(unit: &str) -> Option<u64> {
    match unit {
        "ns" => Some(NANOSECOND),
        "us" | "\u{b5}s" | "\u{3bc}s" => Some(MICROSECOND),
        "ms" => Some(MILLISECOND),
        "s" => Some(SECOND),
        "m" => Some(MINUTE),
        "h" => Some(HOUR),
        _ => None,
    }
}

impl FromStr for ApiDuration {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ApiDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.nanos < 0 { "-" } else { "" };
        let nanos = self.nanos.unsigned_abs();

        if nanos == 0 {
            return write!(f, "0s");
        }

        if nanos < SECOND {
            let (unit, scale) = if nanos < MICROSECOND {
                ("ns", NANOSECOND)
            } else if nanos < MILLISECOND {
                ("\u{b5}s", MICROSECOND)
            } else {
                ("ms", MILLISECOND)
            };
            return write!(f, "{}{}{}", sign, decimal(nanos, scale), unit);
        }

        let hours = nanos / HOUR;
        let minutes = (nanos % HOUR) / MINUTE;
        let seconds = decimal(nanos % MINUTE, SECOND);

        write!(f, "{}", sign)?;
        if hours > 0 {
            write!(f, "{}h{}m", hours, minutes)?;
        } else if minutes > 0 {
            write!(f, "{}m", minutes)?;
        }
        write!(f, "{}s", seconds)
    }
}

/// `value / scale` printed without trailing fractional zeros.
fn decimal(value: u64, scale: u64) -> String {
    let whole = value / scale;
    let fraction = value % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let width = scale.ilog10() as usize;
    let digits = format!("{:0width$}", fraction, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

impl Serialize for ApiDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ApiDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
