//! INDI timestamp handling

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Subsecond digits, kept as a count plus value so that `09.50` and `09.5`
/// stay distinguishable on redisplay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fraction {
    value: u32,
    digits: u8,
}

impl Fraction {
    const MAX_DIGITS: u8 = 9;

    /// Truncate a nanosecond count to `digits` fractional places.
    fn of_nanos(nanos: u32, digits: u8) -> Self {
        let digits = digits.min(Self::MAX_DIGITS);
        let divisor = 10u32.pow((Self::MAX_DIGITS - digits) as u32);
        Self {
            value: nanos / divisor,
            digits,
        }
    }

    fn parse(text: &str) -> Option<Self> {
        if text.is_empty() || text.len() > Self::MAX_DIGITS as usize {
            return None;
        }
        if !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            value: text.parse().ok()?,
            digits: text.len() as u8,
        })
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.value, width = self.digits as usize)
    }
}

/// A timestamp in INDI wire format, `YYYY-MM-DDThh:mm:ss[.fff]`
///
/// A timezone designator is normally absent and the time is taken as UTC; a
/// trailing `Z` is tolerated. The subsecond digit count survives a
/// parse/redisplay round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndiTimestamp {
    datetime: NaiveDateTime,
    fraction: Option<Fraction>,
}

const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

impl IndiTimestamp {
    /// Current time, with `precision` fractional digits if requested
    pub fn now(precision: Option<u8>) -> Self {
        Self::from_datetime(Utc::now(), precision)
    }

    /// Build from a `DateTime<Utc>`, truncated to `precision` fractional
    /// digits
    pub fn from_datetime(datetime: DateTime<Utc>, precision: Option<u8>) -> Self {
        Self {
            datetime: datetime.naive_utc(),
            fraction: precision.map(|p| Fraction::of_nanos(datetime.timestamp_subsec_nanos(), p)),
        }
    }

    /// The underlying UTC instant, fractional part dropped
    pub fn datetime(&self) -> DateTime<Utc> {
        self.datetime.and_utc()
    }
}

impl FromStr for IndiTimestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wire = s.strip_suffix('Z').unwrap_or(s);
        let (base, fraction) = match wire.split_once('.') {
            None => (wire, None),
            Some((base, subsec)) => {
                let fraction = Fraction::parse(subsec).ok_or_else(|| {
                    Error::Parse(format!("invalid timestamp fraction `{}`", s))
                })?;
                (base, Some(fraction))
            }
        };
        let datetime = NaiveDateTime::parse_from_str(base, WIRE_FORMAT)
            .map_err(|e| Error::Parse(format!("invalid timestamp `{}`: {}", s, e)))?;
        Ok(Self { datetime, fraction })
    }
}

impl fmt::Display for IndiTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.datetime.format(WIRE_FORMAT))?;
        match &self.fraction {
            Some(fraction) => write!(f, ".{}", fraction),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_redisplay() {
        for s in [
            "2026-01-22T15:32:57",
            "2026-01-22T15:32:57.5",
            "2026-01-22T15:32:57.500",
            "2026-01-22T15:32:57.007",
        ] {
            let ts = IndiTimestamp::from_str(s).unwrap();
            assert_eq!(ts.to_string(), s);
        }
    }

    #[test]
    fn test_digit_count_distinguishes_values() {
        let short = IndiTimestamp::from_str("2026-01-22T15:32:57.5").unwrap();
        let long = IndiTimestamp::from_str("2026-01-22T15:32:57.50").unwrap();
        assert_ne!(short, long);
        assert_eq!(short.datetime(), long.datetime());
    }

    #[test]
    fn test_zulu_suffix_tolerated() {
        let ts = IndiTimestamp::from_str("2026-01-22T15:32:57Z").unwrap();
        assert_eq!(ts.to_string(), "2026-01-22T15:32:57");
    }

    #[test]
    fn test_invalid_timestamps() {
        assert!(IndiTimestamp::from_str("not a time").is_err());
        assert!(IndiTimestamp::from_str("2026-01-22 15:32:57").is_err());
        assert!(IndiTimestamp::from_str("2026-01-22T15:32:57.").is_err());
        assert!(IndiTimestamp::from_str("2026-01-22T15:32:57.abc").is_err());
        assert!(IndiTimestamp::from_str("2026-01-22T15:32:57.0123456789").is_err());
    }

    #[test]
    fn test_fixed_precision_truncates() {
        let dt = DateTime::parse_from_rfc3339("2024-02-21T19:30:00.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            IndiTimestamp::from_datetime(dt, Some(3)).to_string(),
            "2024-02-21T19:30:00.123"
        );
        assert_eq!(
            IndiTimestamp::from_datetime(dt, Some(1)).to_string(),
            "2024-02-21T19:30:00.1"
        );
        assert_eq!(
            IndiTimestamp::from_datetime(dt, None).to_string(),
            "2024-02-21T19:30:00"
        );
    }

    #[test]
    fn test_round_trip_through_datetime() {
        let ts = IndiTimestamp::from_str("2026-01-22T15:32:57").unwrap();
        let again = IndiTimestamp::from_datetime(ts.datetime(), None);
        assert_eq!(ts, again);
    }
}
