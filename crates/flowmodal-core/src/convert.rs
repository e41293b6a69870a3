//! Attribute value converters.
//!
//! Flow elements are configured through string attributes. This module turns
//! those strings into typed values: durations (`"30m"`, `"1.5h"`, `"200"`),
//! delimited lists (`"local, memory"`), boolean flags and countdown display
//! formats (`"mm:ss"`).

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{FlowError, Result};

const MS_PER_SECOND: f64 = 1000.0;
const MS_PER_MINUTE: f64 = MS_PER_SECOND * 60.0;
const MS_PER_HOUR: f64 = MS_PER_MINUTE * 60.0;
const MS_PER_DAY: f64 = MS_PER_HOUR * 24.0;
const MS_PER_WEEK: f64 = MS_PER_DAY * 7.0;
const MS_PER_YEAR: f64 = MS_PER_DAY * 365.25;

/// Longest duration string accepted.
const MAX_DURATION_LEN: usize = 100;

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(-?(?:\d+)?\.?\d+) *(milliseconds?|msecs?|ms|seconds?|secs?|s|minutes?|mins?|m|hours?|hrs?|h|days?|d|weeks?|w|years?|yrs?|y)?$",
    )
    .expect("duration pattern is valid")
});

/// Parse a human readable duration into milliseconds.
///
/// A bare number is read as milliseconds. Fractions are rounded to the
/// nearest millisecond. Negative durations are rejected.
pub fn parse_duration(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() || value.len() > MAX_DURATION_LEN {
        return None;
    }

    let caps = DURATION_RE.captures(value)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_else(|| "ms".to_string());

    let factor = match unit.as_str() {
        "years" | "year" | "yrs" | "yr" | "y" => MS_PER_YEAR,
        "weeks" | "week" | "w" => MS_PER_WEEK,
        "days" | "day" | "d" => MS_PER_DAY,
        "hours" | "hour" | "hrs" | "hr" | "h" => MS_PER_HOUR,
        "minutes" | "minute" | "mins" | "min" | "m" => MS_PER_MINUTE,
        "seconds" | "second" | "secs" | "sec" | "s" => MS_PER_SECOND,
        _ => 1.0,
    };

    let ms = (amount * factor).round();
    if ms < 0.0 || !ms.is_finite() || ms > u64::MAX as f64 {
        return None;
    }
    Some(ms as u64)
}

/// Parse a duration attribute, naming the attribute in the error.
pub fn duration_attribute(attribute: &str, value: &str) -> Result<u64> {
    parse_duration(value).ok_or_else(|| FlowError::invalid_duration(attribute))
}

/// Split a delimited string into trimmed, non-empty items.
pub fn parse_list(value: &str, separator: &str) -> Vec<String> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Inverse of [`parse_list`].
pub fn join_list(items: &[String], separator: &str) -> String {
    items.join(separator)
}

/// Boolean attribute: present means `true` unless spelled `"false"`.
pub fn parse_flag(value: &str) -> bool {
    !value.trim().eq_ignore_ascii_case("false")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Hours(usize),
    Minutes(usize),
    Seconds(usize),
    Fraction(usize),
}

/// Display format for a remaining-time countdown.
///
/// Uses date-fns style tokens: `H`/`HH` (hours), `m`/`mm` (minutes of the
/// hour), `s`/`ss` (seconds of the minute), `S`..`SSS` (fractional seconds).
/// Text between single quotes is copied verbatim and `''` yields a quote.
/// Any other unquoted latin letter is rejected. Hours are not wrapped at 24.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownFormat {
    source: String,
    parts: Vec<Part>,
}

impl CountdownFormat {
    pub fn parse(format: &str) -> Result<Self> {
        let chars: Vec<char> = format.chars().collect();
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if c == '\'' {
                if chars.get(i + 1) == Some(&'\'') {
                    literal.push('\'');
                    i += 2;
                    continue;
                }
                let mut j = i + 1;
                loop {
                    match chars.get(j) {
                        None => break,
                        Some('\'') if chars.get(j + 1) == Some(&'\'') => {
                            literal.push('\'');
                            j += 2;
                        }
                        Some('\'') => {
                            j += 1;
                            break;
                        }
                        Some(other) => {
                            literal.push(*other);
                            j += 1;
                        }
                    }
                }
                i = j;
                continue;
            }

            if !c.is_ascii_alphabetic() {
                literal.push(c);
                i += 1;
                continue;
            }

            let run = chars[i..].iter().take_while(|&&x| x == c).count();
            let part = match c {
                'H' => Part::Hours(run),
                'm' => Part::Minutes(run),
                's' => Part::Seconds(run),
                'S' => Part::Fraction(run),
                other => {
                    return Err(FlowError::InvalidValue(format!(
                        "Format string contains an unescaped latin alphabet character `{other}`"
                    )))
                }
            };
            if !literal.is_empty() {
                parts.push(Part::Literal(std::mem::take(&mut literal)));
            }
            parts.push(part);
            i += run;
        }

        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }

        Ok(Self {
            source: format.to_string(),
            parts,
        })
    }

    /// The format string this was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Render `remaining_ms` with this format.
    pub fn format(&self, remaining_ms: u64) -> String {
        let hours = remaining_ms / 3_600_000;
        let minutes = (remaining_ms / 60_000) % 60;
        let seconds = (remaining_ms / 1000) % 60;
        let millis = remaining_ms % 1000;

        let mut out = String::new();
        for part in &self.parts {
            match *part {
                Part::Literal(ref text) => out.push_str(text),
                Part::Hours(width) => {
                    let _ = write!(out, "{hours:0width$}");
                }
                Part::Minutes(width) => {
                    let _ = write!(out, "{minutes:0width$}");
                }
                Part::Seconds(width) => {
                    let _ = write!(out, "{seconds:0width$}");
                }
                Part::Fraction(digits) => {
                    let fraction = format!("{millis:03}");
                    if digits <= 3 {
                        out.push_str(&fraction[..digits]);
                    } else {
                        let _ = write!(out, "{fraction:0<digits$}");
                    }
                }
            }
        }
        out
    }
}
