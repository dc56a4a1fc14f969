//! Time text capability used by `timeW` fields.
//!
//! Calendar parsing belongs to an external time library; the codec only needs
//! "text to microseconds since 2000" and back. Callers supply an
//! implementation as a shared capability object. [`IsoTimeParser`] covers the
//! ISO-8601 forms das2 producers emit.

use std::fmt::Debug;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, TimeDelta};

const US_PER_SECOND: i64 = 1_000_000;
const US_PER_DAY: i64 = 86_400 * US_PER_SECOND;

/// Converts between time text and microseconds since 2000-01-01T00:00:00.
pub trait TimeParser: Send + Sync + Debug {
    /// Parse free-form date/time text. `None` when the text is not a time.
    fn parse(&self, text: &str) -> Option<f64>;

    /// Render `us2000` as `YYYY-MM-DDTHH:MM:SS` followed by
    /// `fraction_digits` (0-6) digits of fractional seconds.
    fn format(&self, us2000: f64, fraction_digits: usize) -> Option<String>;
}

/// The built-in capability.
pub fn default_time_parser() -> Arc<dyn TimeParser> {
    Arc::new(IsoTimeParser)
}

/// ISO-8601 calendar and ordinal dates with optional time of day.
///
/// Accepted: `YYYY-MM-DD` or `YYYY-DDD`, optionally followed by `T` or a space
/// and `HH`, `HH:MM`, `HH:MM:SS` or `HH:MM:SS.f` (up to 9 fraction digits),
/// optionally followed by `Z`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IsoTimeParser;

impl TimeParser for IsoTimeParser {
    fn parse(&self, text: &str) -> Option<f64> {
        let text = text.trim();
        let text = text.strip_suffix('Z').unwrap_or(text);
        let (date_text, time_text) = match text.find(|c: char| c == 'T' || c == ' ') {
            Some(i) => (&text[..i], Some(text[i + 1..].trim())),
            None => (text, None),
        };

        let date = parse_date(date_text)?;
        let days = date.signed_duration_since(epoch()?).num_days();
        let time_of_day = match time_text {
            Some(t) if !t.is_empty() => parse_time_of_day(t)?,
            _ => 0.0,
        };
        Some(days as f64 * US_PER_DAY as f64 + time_of_day)
    }

    fn format(&self, us2000: f64, fraction_digits: usize) -> Option<String> {
        if !us2000.is_finite() {
            return None;
        }
        let digits = fraction_digits.min(6);
        let step = 10i64.pow(6 - digits as u32);
        let total = (us2000 / step as f64).round() as i64 * step;

        let days = total.div_euclid(US_PER_DAY);
        let micros = total.rem_euclid(US_PER_DAY);
        let date = epoch()?.checked_add_signed(TimeDelta::try_days(days)?)?;

        let seconds = micros / US_PER_SECOND;
        let mut out = format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            date.year(),
            date.month(),
            date.day(),
            seconds / 3600,
            seconds / 60 % 60,
            seconds % 60
        );
        if digits > 0 {
            let fraction = micros % US_PER_SECOND / step;
            out.push_str(&format!(".{fraction:0digits$}"));
        }
        Some(out)
    }
}

fn epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2000, 1, 1)
}

fn digits<T: std::str::FromStr>(text: &str) -> Option<T> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let mut parts = text.split('-');
    let year: i32 = digits(parts.next()?)?;
    let second = parts.next()?;
    let third = parts.next();
    if parts.next().is_some() {
        return None;
    }
    match third {
        Some(day) => NaiveDate::from_ymd_opt(year, digits(second)?, digits(day)?),
        None if second.len() == 3 => NaiveDate::from_yo_opt(year, digits(second)?),
        None => None,
    }
}

fn parse_time_of_day(text: &str) -> Option<f64> {
    let mut parts = text.split(':');
    let hour: i64 = digits(parts.next()?)?;
    let minute: i64 = match parts.next() {
        Some(m) => digits(m)?,
        None => 0,
    };
    let seconds_text = parts.next();
    if parts.next().is_some() || hour > 23 || minute > 59 {
        return None;
    }

    let (seconds, fraction_us) = match seconds_text {
        None => (0, 0.0),
        Some(s) => match s.split_once('.') {
            Some((whole, frac)) => {
                if frac.len() > 9 {
                    return None;
                }
                let frac_value: u64 = if frac.is_empty() { 0 } else { digits(frac)? };
                let scale = 10f64.powi(6 - frac.len() as i32);
                (digits::<i64>(whole)?, frac_value as f64 * scale)
            }
            None => (digits::<i64>(s)?, 0.0),
        },
    };
    // 60 allows a leap second to be read as the first second of the next minute.
    if seconds > 60 {
        return None;
    }

    Some(((hour * 60 + minute) * 60 + seconds) as f64 * 1.0e6 + fraction_us)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_calendar_and_ordinal_dates() {
        let parser = IsoTimeParser;
        assert_eq!(parser.parse("2000-01-01"), Some(0.0));
        assert_eq!(parser.parse("2000-01-02T00:00:00"), Some(86_400.0e6));
        assert_eq!(parser.parse("2000-032"), Some(31.0 * 86_400.0e6));
        assert_eq!(parser.parse("1999-12-31T23:59:59Z"), Some(-1.0e6));
    }

    #[test]
    fn parses_partial_times_and_fractions() {
        let parser = IsoTimeParser;
        assert_eq!(parser.parse("2000-01-01T01"), Some(3_600.0e6));
        assert_eq!(parser.parse("2000-01-01 00:01"), Some(60.0e6));
        assert_eq!(parser.parse("2000-01-01T00:00:01.5"), Some(1.5e6));
        assert_eq!(parser.parse("2000-01-01T00:00:00.000250"), Some(250.0));
        assert_eq!(parser.parse("  2000-01-01T00:00:00.000250   "), Some(250.0));
    }

    #[test]
    fn rejects_garbage() {
        let parser = IsoTimeParser;
        assert_eq!(parser.parse(""), None);
        assert_eq!(parser.parse("yesterday"), None);
        assert_eq!(parser.parse("2000-13-01"), None);
        assert_eq!(parser.parse("2000-01-01T25:00"), None);
        assert_eq!(parser.parse("2000-01-01T00:00:00.1234567890"), None);
    }

    #[test]
    fn formats_with_requested_fraction() {
        let parser = IsoTimeParser;
        assert_eq!(
            parser.format(0.0, 0).as_deref(),
            Some("2000-01-01T00:00:00")
        );
        assert_eq!(
            parser.format(1_500_000.0, 3).as_deref(),
            Some("2000-01-01T00:00:01.500")
        );
        assert_eq!(
            parser.format(-1.0, 6).as_deref(),
            Some("1999-12-31T23:59:59.999999")
        );
        assert_eq!(parser.format(f64::NAN, 3), None);
    }

    #[test]
    fn format_rounds_into_next_day() {
        let parser = IsoTimeParser;
        let almost_midnight = 86_400.0e6 - 400.0;
        assert_eq!(
            parser.format(almost_midnight, 3).as_deref(),
            Some("2000-01-02T00:00:00.000")
        );
    }

    #[test]
    fn parse_inverts_format() {
        let parser = IsoTimeParser;
        let us = 712_345_678_901_234.0;
        let text = parser.format(us, 6).unwrap();
        assert_eq!(parser.parse(&text), Some(us));
    }
}
