use std::fmt;

use serde::Serialize;

const US_PER_SECOND: f64 = 1.0e6;
const US_PER_DAY: f64 = 86_400.0e6;
const SECONDS_1970_TO_2000: f64 = 946_684_800.0;
const DAYS_1958_TO_2000: f64 = 15_340.0;

/// Physical unit tag carried by a field.
///
/// The engine does not do unit algebra. The tag is passed through to decoded
/// records untouched, except that time-valued codecs look at it to pick their
/// numeric base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Units(String);

impl Units {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The empty tag.
    pub fn dimensionless() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_dimensionless(&self) -> bool {
        self.0.is_empty()
    }

    /// The time base this tag names, if any.
    pub fn time_base(&self) -> Option<TimeBase> {
        TimeBase::from_name(&self.0)
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Units {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<TimeBase> for Units {
    fn from(base: TimeBase) -> Self {
        Self::new(base.name())
    }
}

/// Numeric time representations understood by the time codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBase {
    /// Microseconds since 2000-01-01T00:00:00.
    #[default]
    Us2000,
    /// Seconds since 2000-01-01T00:00:00.
    T2000,
    /// Seconds since 1970-01-01T00:00:00.
    T1970,
    /// Milliseconds since 1970-01-01T00:00:00.
    Ms1970,
    /// Days since 1958-01-01 (modified Julian, 1958 epoch).
    Mj1958,
}

impl TimeBase {
    /// Look up a base by its unit name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "us2000" => Some(Self::Us2000),
            "t2000" => Some(Self::T2000),
            "t1970" => Some(Self::T1970),
            "ms1970" => Some(Self::Ms1970),
            "mj1958" => Some(Self::Mj1958),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Us2000 => "us2000",
            Self::T2000 => "t2000",
            Self::T1970 => "t1970",
            Self::Ms1970 => "ms1970",
            Self::Mj1958 => "mj1958",
        }
    }

    /// Convert a value in this base to microseconds since 2000.
    pub fn to_us2000(self, value: f64) -> f64 {
        match self {
            Self::Us2000 => value,
            Self::T2000 => value * US_PER_SECOND,
            Self::T1970 => (value - SECONDS_1970_TO_2000) * US_PER_SECOND,
            Self::Ms1970 => value * 1.0e3 - SECONDS_1970_TO_2000 * US_PER_SECOND,
            Self::Mj1958 => (value - DAYS_1958_TO_2000) * US_PER_DAY,
        }
    }

    /// Convert microseconds since 2000 to this base.
    pub fn from_us2000(self, us: f64) -> f64 {
        match self {
            Self::Us2000 => us,
            Self::T2000 => us / US_PER_SECOND,
            Self::T1970 => us / US_PER_SECOND + SECONDS_1970_TO_2000,
            Self::Ms1970 => (us + SECONDS_1970_TO_2000 * US_PER_SECOND) / 1.0e3,
            Self::Mj1958 => us / US_PER_DAY + DAYS_1958_TO_2000,
        }
    }
}
