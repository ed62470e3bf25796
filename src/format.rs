//! Number formatting for INDI properties
//!
//! INDI number elements carry a printf-like format hint of the shape
//! `%[+][0][width][.precision](d|f|g|e|m)`. The `m` conversion requests
//! sexagesimal rendering; whether it reads as hours or degrees is the
//! caller's choice via [`SexagesimalStyle`]. The module also parses the
//! sexagesimal *input* spellings servers send for coordinates
//! (`12:30:00`, `12 30`, `-41;16;9`).

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::fmt::Write;

static FORMAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%(\+)?(0)?(\d+)?(?:\.(\d+))?([dfgem])$").unwrap());
static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[-+]?\d*\.?\d*(?:[:; ]\d*\.?\d*)*\s*$").unwrap());

/// How an `m` conversion renders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SexagesimalStyle {
    /// Hours, minutes, seconds with superscript separators (`12ʰ30ᵐ00ˢ`)
    Hms,
    /// Degrees, arcminutes, arcseconds with an explicit leading sign
    /// (`+41°16'09"`)
    Dms,
}

/// The conversion letter of a format specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// `d`: rounded integer
    Integer,
    /// `f`: fixed-point
    Fixed,
    /// `g`: shortest of fixed and scientific
    General,
    /// `e`: scientific
    Scientific,
    /// `m`: sexagesimal
    Sexagesimal,
}

/// A parsed `%[+][0][width][.precision]X` format specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberFormat {
    /// Emit a `+` for non-negative values
    pub plus: bool,
    /// Pad to width with zeros instead of spaces
    pub zero_pad: bool,
    /// Minimum field width in characters
    pub width: Option<usize>,
    /// Precision; for `m` this selects the sexagesimal sub-field layout
    pub precision: Option<usize>,
    /// Conversion letter
    pub conversion: Conversion,
}

impl NumberFormat {
    /// Parse a format string
    pub fn parse(format: &str) -> Result<Self> {
        let caps = FORMAT_RE
            .captures(format)
            .ok_or_else(|| Error::Format(format!("invalid number format: {}", format)))?;
        let width = caps
            .get(3)
            .map(|m| m.as_str().parse::<usize>())
            .transpose()
            .map_err(|_| Error::Format(format!("invalid width in {}", format)))?;
        let precision = caps
            .get(4)
            .map(|m| m.as_str().parse::<usize>())
            .transpose()
            .map_err(|_| Error::Format(format!("invalid precision in {}", format)))?;
        let conversion = match &caps[5] {
            "d" => Conversion::Integer,
            "f" => Conversion::Fixed,
            "g" => Conversion::General,
            "e" => Conversion::Scientific,
            "m" => Conversion::Sexagesimal,
            _ => unreachable!(),
        };
        Ok(Self {
            plus: caps.get(1).is_some(),
            zero_pad: caps.get(2).is_some(),
            width,
            precision,
            conversion,
        })
    }

    /// Render `value` according to the specification
    pub fn format(&self, value: f64, style: SexagesimalStyle) -> Result<String> {
        let core = match self.conversion {
            Conversion::Integer => {
                let rounded = value.round();
                format!("{}", rounded.abs() as i64)
            }
            Conversion::Fixed => {
                format!("{:.*}", self.precision.unwrap_or(6), value.abs())
            }
            Conversion::Scientific => {
                scientific(value.abs(), self.precision.unwrap_or(6))
            }
            Conversion::General => general(value.abs(), self.precision.unwrap_or(6)),
            Conversion::Sexagesimal => {
                return self.format_sexagesimal(value, style);
            }
        };
        Ok(self.pad(core, value.is_sign_negative() && value != 0.0, false))
    }

    fn format_sexagesimal(&self, value: f64, style: SexagesimalStyle) -> Result<String> {
        let precision = self.precision.unwrap_or(6);
        let abs = value.abs();
        let mut core = String::new();

        let (first_sep, second_sep, trailing) = match style {
            SexagesimalStyle::Hms => ("\u{2b0}", "\u{1d50}", "\u{2e2}"),
            SexagesimalStyle::Dms => ("\u{b0}", "'", "\""),
        };

        // Decompose from a rounded count of the smallest displayed unit so
        // carries propagate (59.96s rounds to the next minute, not to 60s).
        match precision {
            3 => {
                let total = (abs * 60.0).round() as u64;
                write!(core, "{}{}{:02}{}", total / 60, first_sep, total % 60, second_sep)?;
            }
            5 => {
                let total = (abs * 600.0).round() as u64;
                let minutes = total % 600;
                write!(
                    core,
                    "{}{}{:02}.{}{}",
                    total / 600,
                    first_sep,
                    minutes / 10,
                    minutes % 10,
                    second_sep
                )?;
            }
            6 => {
                let total = (abs * 3600.0).round() as u64;
                write!(
                    core,
                    "{}{}{:02}{}{:02}{}",
                    total / 3600,
                    first_sep,
                    (total % 3600) / 60,
                    second_sep,
                    total % 60,
                    trailing
                )?;
            }
            8 => {
                let total = (abs * 36000.0).round() as u64;
                let seconds = total % 600;
                write!(
                    core,
                    "{}{}{:02}{}{:02}.{}{}",
                    total / 36000,
                    first_sep,
                    (total % 36000) / 600,
                    second_sep,
                    seconds / 10,
                    seconds % 10,
                    trailing
                )?;
            }
            9 => {
                let total = (abs * 360_000.0).round() as u64;
                let seconds = total % 6000;
                write!(
                    core,
                    "{}{}{:02}{}{:02}.{:02}{}",
                    total / 360_000,
                    first_sep,
                    (total % 360_000) / 6000,
                    second_sep,
                    seconds / 100,
                    seconds % 100,
                    trailing
                )?;
            }
            other => {
                return Err(Error::Format(format!(
                    "unsupported sexagesimal precision: {}",
                    other
                )))
            }
        }

        let negative = value.is_sign_negative() && value != 0.0;
        let force_sign = matches!(style, SexagesimalStyle::Dms);
        Ok(self.pad(core, negative, force_sign))
    }

    fn pad(&self, core: String, negative: bool, force_sign: bool) -> String {
        let sign = if negative {
            "-"
        } else if self.plus || force_sign {
            "+"
        } else {
            ""
        };
        let width = self.width.unwrap_or(0);
        let len = sign.chars().count() + core.chars().count();
        if len >= width {
            return format!("{}{}", sign, core);
        }
        let fill = width - len;
        if self.zero_pad {
            format!("{}{}{}", sign, "0".repeat(fill), core)
        } else {
            format!("{}{}{}", " ".repeat(fill), sign, core)
        }
    }
}

impl fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%")?;
        if self.plus {
            write!(f, "+")?;
        }
        if self.zero_pad {
            write!(f, "0")?;
        }
        if let Some(width) = self.width {
            write!(f, "{}", width)?;
        }
        if let Some(precision) = self.precision {
            write!(f, ".{}", precision)?;
        }
        let letter = match self.conversion {
            Conversion::Integer => 'd',
            Conversion::Fixed => 'f',
            Conversion::General => 'g',
            Conversion::Scientific => 'e',
            Conversion::Sexagesimal => 'm',
        };
        write!(f, "{}", letter)
    }
}

fn scientific(abs: f64, precision: usize) -> String {
    let raw = format!("{:.*e}", precision, abs);
    // Rust renders `1.50e1`; printf wants a signed two-digit exponent.
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => raw,
    }
}

fn general(abs: f64, precision: usize) -> String {
    let precision = precision.max(1);
    if abs == 0.0 {
        return "0".to_string();
    }
    let exponent = abs.log10().floor() as i32;
    if exponent < -4 || exponent >= precision as i32 {
        let s = scientific(abs, precision - 1);
        trim_mantissa(s)
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        let s = format!("{:.*}", decimals, abs);
        trim_fraction(s)
    }
}

fn trim_fraction(s: String) -> String {
    if !s.contains('.') {
        return s;
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn trim_mantissa(s: String) -> String {
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            format!("{}e{}", trim_fraction(mantissa.to_string()), exp)
        }
        None => s,
    }
}

/// Parse a number that may use sexagesimal notation
///
/// Accepts plain decimals plus `D:M[:S]` forms with `:`, `;` or space
/// separators. The sign of the leading field applies to the whole value.
pub fn parse_number(s: &str) -> Result<f64> {
    if !NUMBER_RE.is_match(s) {
        return Err(Error::Format(format!("invalid number: {}", s)));
    }

    let s = s.trim();
    let mut parts = s.split(|c| c == ':' || c == ';' || c == ' ');
    let first = parts
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::Format(format!("invalid number: {}", s)))?;
    let leading = first
        .parse::<f64>()
        .map_err(|_| Error::Format(format!("invalid number: {}", first)))?;
    let sign = if first.starts_with('-') { -1.0 } else { 1.0 };

    let mut value = leading.abs();
    let mut scale = 1.0 / 60.0;
    for part in parts {
        if !part.is_empty() {
            let field = part
                .parse::<f64>()
                .map_err(|_| Error::Format(format!("invalid number: {}", part)))?;
            value += field * scale;
        }
        scale /= 60.0;
    }

    Ok(sign * value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        let f = NumberFormat::parse("%010.6m").unwrap();
        assert_eq!(f.plus, false);
        assert_eq!(f.zero_pad, true);
        assert_eq!(f.width, Some(10));
        assert_eq!(f.precision, Some(6));
        assert_eq!(f.conversion, Conversion::Sexagesimal);
        assert_eq!(f.to_string(), "%010.6m");

        let f = NumberFormat::parse("%+8.3f").unwrap();
        assert_eq!(f.plus, true);
        assert_eq!(f.conversion, Conversion::Fixed);

        assert!(NumberFormat::parse("8.3m").is_err());
        assert!(NumberFormat::parse("%8.3x").is_err());
        assert!(NumberFormat::parse("%%f").is_err());
    }

    #[test]
    fn test_fixed_and_integer() {
        let f = NumberFormat::parse("%.2f").unwrap();
        assert_eq!(f.format(3.14159, SexagesimalStyle::Hms).unwrap(), "3.14");

        let f = NumberFormat::parse("%5d").unwrap();
        assert_eq!(f.format(42.4, SexagesimalStyle::Hms).unwrap(), "   42");

        let f = NumberFormat::parse("%05d").unwrap();
        assert_eq!(f.format(-42.0, SexagesimalStyle::Hms).unwrap(), "-0042");

        let f = NumberFormat::parse("%+d").unwrap();
        assert_eq!(f.format(7.0, SexagesimalStyle::Hms).unwrap(), "+7");
    }

    #[test]
    fn test_scientific() {
        let f = NumberFormat::parse("%.2e").unwrap();
        assert_eq!(f.format(1550.0, SexagesimalStyle::Hms).unwrap(), "1.55e+03");
        assert_eq!(f.format(0.0155, SexagesimalStyle::Hms).unwrap(), "1.55e-02");
    }

    #[test]
    fn test_general() {
        let f = NumberFormat::parse("%g").unwrap();
        assert_eq!(f.format(0.0001, SexagesimalStyle::Hms).unwrap(), "0.0001");
        assert_eq!(f.format(1500000.0, SexagesimalStyle::Hms).unwrap(), "1.5e+06");
        assert_eq!(f.format(12.5, SexagesimalStyle::Hms).unwrap(), "12.5");
    }

    #[test]
    fn test_sexagesimal_hms() {
        let f = NumberFormat::parse("%.6m").unwrap();
        assert_eq!(
            f.format(12.508333333, SexagesimalStyle::Hms).unwrap(),
            "12\u{2b0}30\u{1d50}30\u{2e2}"
        );

        let f = NumberFormat::parse("%.3m").unwrap();
        assert_eq!(f.format(1.5, SexagesimalStyle::Hms).unwrap(), "1\u{2b0}30\u{1d50}");

        let f = NumberFormat::parse("%.5m").unwrap();
        assert_eq!(
            f.format(1.525, SexagesimalStyle::Hms).unwrap(),
            "1\u{2b0}31.5\u{1d50}"
        );

        let f = NumberFormat::parse("%.8m").unwrap();
        assert_eq!(
            f.format(1.50833333, SexagesimalStyle::Hms).unwrap(),
            "1\u{2b0}30\u{1d50}30.0\u{2e2}"
        );

        let f = NumberFormat::parse("%.9m").unwrap();
        assert_eq!(
            f.format(1.50833333, SexagesimalStyle::Hms).unwrap(),
            "1\u{2b0}30\u{1d50}30.00\u{2e2}"
        );
    }

    #[test]
    fn test_sexagesimal_dms_sign() {
        let f = NumberFormat::parse("%.6m").unwrap();
        assert_eq!(
            f.format(41.269167, SexagesimalStyle::Dms).unwrap(),
            "+41\u{b0}16'09\""
        );
        assert_eq!(
            f.format(-41.269167, SexagesimalStyle::Dms).unwrap(),
            "-41\u{b0}16'09\""
        );
        // HMS carries a sign only when negative.
        assert!(f
            .format(10.0, SexagesimalStyle::Hms)
            .unwrap()
            .starts_with("10"));
        assert!(f
            .format(-10.0, SexagesimalStyle::Hms)
            .unwrap()
            .starts_with("-10"));
    }

    #[test]
    fn test_sexagesimal_carry() {
        let f = NumberFormat::parse("%.6m").unwrap();
        assert_eq!(
            f.format(1.9999999, SexagesimalStyle::Hms).unwrap(),
            "2\u{2b0}00\u{1d50}00\u{2e2}"
        );
    }

    #[test]
    fn test_sexagesimal_width() {
        let f = NumberFormat::parse("%010.6m").unwrap();
        let s = f.format(15.5, SexagesimalStyle::Hms).unwrap();
        assert_eq!(s, "015\u{2b0}30\u{1d50}00\u{2e2}");
        assert_eq!(s.chars().count(), 10);
    }

    #[test]
    fn test_unsupported_precision() {
        let f = NumberFormat::parse("%.4m").unwrap();
        assert!(f.format(1.0, SexagesimalStyle::Hms).is_err());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("12.5").unwrap(), 12.5);
        assert_eq!(parse_number("-12:30").unwrap(), -12.5);
        assert_eq!(parse_number("12:30:00").unwrap(), 12.5);
        assert_eq!(parse_number("12 30").unwrap(), 12.5);
        assert_eq!(parse_number("-41;15;0").unwrap(), -41.25);
        assert!(parse_number("twelve").is_err());
    }
}
