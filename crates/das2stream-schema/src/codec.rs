use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

use crate::error::{CodecError, SchemaError};
use crate::time::TimeParser;
use crate::units::{TimeBase, Units};

/// Narrowest `asciiW` field: one character plus the separator.
pub const MIN_ASCII_WIDTH: usize = 2;

/// Narrowest `timeW` field: a `YYYY-MM-DD` date plus the separator.
pub const MIN_TIME_WIDTH: usize = 11;

/// Length of `YYYY-MM-DDTHH:MM:SS`.
const TIME_SECONDS_LEN: usize = 19;

/// Byte order of a binary real field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    Big,
    Little,
}

/// Encode/decode strategy for one field.
///
/// Selected by the field's `type` attribute when a packet schema is
/// registered. Every variant has a fixed byte size, so a packet's length is
/// known as soon as its schema is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "codec", rename_all = "snake_case")]
pub enum Codec {
    /// IEEE-754 single precision.
    Real4 { order: ByteOrder },
    /// IEEE-754 double precision.
    Real8 { order: ByteOrder },
    /// Right-aligned decimal text, `width - 1` characters and a separator.
    Ascii { width: usize },
    /// ISO-8601 text, `width - 1` characters and a separator.
    Time { width: usize, base: TimeBase },
}

impl Codec {
    /// Resolve a wire type name.
    ///
    /// `units` only matters for `timeW`, where it picks the numeric time base
    /// (microseconds since 2000 when the units are not a time unit).
    pub fn from_type_name(name: &str, units: &Units) -> Result<Self, SchemaError> {
        let codec = match name {
            "sun_real4" => Self::Real4 {
                order: ByteOrder::Big,
            },
            "sun_real8" => Self::Real8 {
                order: ByteOrder::Big,
            },
            "little_endian_real4" => Self::Real4 {
                order: ByteOrder::Little,
            },
            "little_endian_real8" => Self::Real8 {
                order: ByteOrder::Little,
            },
            _ => {
                if let Some(width) = name.strip_prefix("ascii") {
                    Self::Ascii {
                        width: parse_width(name, width, MIN_ASCII_WIDTH)?,
                    }
                } else if let Some(width) = name.strip_prefix("time") {
                    Self::Time {
                        width: parse_width(name, width, MIN_TIME_WIDTH)?,
                        base: units.time_base().unwrap_or_default(),
                    }
                } else {
                    return Err(SchemaError::UnsupportedCodec(name.to_string()));
                }
            }
        };
        Ok(codec)
    }

    /// The name written into `type` attributes.
    pub fn type_name(&self) -> String {
        match self {
            Self::Real4 {
                order: ByteOrder::Big,
            } => "sun_real4".to_string(),
            Self::Real8 {
                order: ByteOrder::Big,
            } => "sun_real8".to_string(),
            Self::Real4 {
                order: ByteOrder::Little,
            } => "little_endian_real4".to_string(),
            Self::Real8 {
                order: ByteOrder::Little,
            } => "little_endian_real8".to_string(),
            Self::Ascii { width } => format!("ascii{width}"),
            Self::Time { width, .. } => format!("time{width}"),
        }
    }

    /// Encoded size of one value.
    pub fn size_bytes(&self) -> usize {
        match self {
            Self::Real4 { .. } => 4,
            Self::Real8 { .. } => 8,
            Self::Ascii { width } | Self::Time { width, .. } => *width,
        }
    }

    /// True for the text codecs (`asciiW`, `timeW`).
    pub fn is_ascii(&self) -> bool {
        matches!(self, Self::Ascii { .. } | Self::Time { .. })
    }

    /// Decode exactly [`size_bytes`](Self::size_bytes) bytes.
    pub fn decode(&self, bytes: &[u8], time: &dyn TimeParser) -> Result<f64, CodecError> {
        if bytes.len() != self.size_bytes() {
            return Err(CodecError::Length {
                codec: self.type_name(),
                expected: self.size_bytes(),
                actual: bytes.len(),
            });
        }

        let mut src = bytes;
        match self {
            Self::Real4 {
                order: ByteOrder::Big,
            } => Ok(src.get_f32() as f64),
            Self::Real4 {
                order: ByteOrder::Little,
            } => Ok(src.get_f32_le() as f64),
            Self::Real8 {
                order: ByteOrder::Big,
            } => Ok(src.get_f64()),
            Self::Real8 {
                order: ByteOrder::Little,
            } => Ok(src.get_f64_le()),
            Self::Ascii { .. } => {
                let text = field_text(self, bytes)?;
                text.parse::<f64>().map_err(|_| self.decode_error(bytes))
            }
            Self::Time { base, .. } => {
                let text = field_text(self, bytes)?;
                time.parse(text)
                    .map(|us| base.from_us2000(us))
                    .ok_or_else(|| self.decode_error(bytes))
            }
        }
    }

    /// Append exactly [`size_bytes`](Self::size_bytes) bytes to `dst`.
    pub fn encode(
        &self,
        value: f64,
        time: &dyn TimeParser,
        dst: &mut BytesMut,
    ) -> Result<(), CodecError> {
        match self {
            Self::Real4 {
                order: ByteOrder::Big,
            } => dst.put_f32(value as f32),
            Self::Real4 {
                order: ByteOrder::Little,
            } => dst.put_f32_le(value as f32),
            Self::Real8 {
                order: ByteOrder::Big,
            } => dst.put_f64(value),
            Self::Real8 {
                order: ByteOrder::Little,
            } => dst.put_f64_le(value),
            Self::Ascii { width } => {
                let n = width - 1;
                let text = render_decimal(value, n).ok_or_else(|| self.encode_error(value))?;
                dst.put_slice(format!("{text:>n$} ").as_bytes());
            }
            Self::Time { width, base } => {
                let n = width - 1;
                let text = render_time(time, base.to_us2000(value), n)
                    .filter(|text| text.len() <= n)
                    .ok_or_else(|| self.encode_error(value))?;
                dst.put_slice(format!("{text:<n$} ").as_bytes());
            }
        }
        Ok(())
    }

    fn decode_error(&self, bytes: &[u8]) -> CodecError {
        CodecError::Decode {
            codec: self.type_name(),
            text: String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    fn encode_error(&self, value: f64) -> CodecError {
        CodecError::Encode {
            codec: self.type_name(),
            value,
        }
    }
}

fn parse_width(name: &str, digits: &str, min: usize) -> Result<usize, SchemaError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SchemaError::UnsupportedCodec(name.to_string()));
    }
    match digits.parse::<usize>() {
        Ok(width) if width >= min => Ok(width),
        _ => Err(SchemaError::bad_attribute("type", name)),
    }
}

fn field_text<'a>(codec: &Codec, bytes: &'a [u8]) -> Result<&'a str, CodecError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| codec.decode_error(bytes))?
        .trim_matches(|c: char| c.is_ascii_whitespace() || c == '\0');
    if text.is_empty() {
        return Err(codec.decode_error(bytes));
    }
    Ok(text)
}

/// Most precise decimal rendering of `value` in at most `n` characters.
fn render_decimal(value: f64, n: usize) -> Option<String> {
    if value.is_nan() {
        return fit("NaN", n);
    }
    if value.is_infinite() {
        return fit(if value > 0.0 { "inf" } else { "-inf" }, n);
    }

    // Shortest round-trip forms are exact; take them when they fit.
    let shortest = format!("{value}");
    if shortest.len() <= n {
        return Some(shortest);
    }
    let scientific = format!("{value:e}");
    if scientific.len() <= n {
        return Some(scientific);
    }

    let fixed = (0..n)
        .rev()
        .map(|p| format!("{value:.p$}"))
        .find(|s| s.len() <= n);
    let rounded_scientific = (0..n)
        .rev()
        .map(|p| format!("{value:.p$e}"))
        .find(|s| s.len() <= n);

    [fixed, rounded_scientific]
        .into_iter()
        .flatten()
        .filter_map(|s| s.parse::<f64>().ok().map(|v| ((v - value).abs(), s)))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, s)| s)
}

fn fit(text: &str, n: usize) -> Option<String> {
    (text.len() <= n).then(|| text.to_string())
}

/// ISO text for `us2000` in at most `n` characters, at the finest resolution
/// that fits.
fn render_time(time: &dyn TimeParser, us2000: f64, n: usize) -> Option<String> {
    if n >= TIME_SECONDS_LEN {
        let fraction_digits = n.saturating_sub(TIME_SECONDS_LEN + 1).min(6);
        return time.format(us2000, fraction_digits);
    }

    let (step_us, keep) = if n >= 16 {
        (60.0e6, 16)
    } else if n >= 13 {
        (3_600.0e6, 13)
    } else {
        (86_400.0e6, 10)
    };
    let rounded = (us2000 / step_us).round() * step_us;
    let mut text = time.format(rounded, 0)?;
    text.truncate(keep);
    Some(text)
}
