//! Convenience structure for dealing with relative payload timestamps.

use time::Duration;

/// Time span of one GPMF payload: relative time from the start of the
/// source recording, and the duration of the payload (i.e. time until
/// the next payload is logged).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamp {
    /// Time passed since recording start.
    pub relative: Duration,
    /// Duration of the payload's span.
    pub duration: Duration,
}

/// Payloads order by their start time.
impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.relative.cmp(&other.relative)
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl From<(Duration, Duration)> for Timestamp {
    fn from(value: (Duration, Duration)) -> Self {
        Self {
            relative: value.0,
            duration: value.1,
        }
    }
}

impl Timestamp {
    /// New timestamp from milliseconds relative to recording start and
    /// payload duration in milliseconds.
    pub fn new(relative_ms: u32, duration_ms: u32) -> Self {
        Timestamp {
            relative: Duration::milliseconds(relative_ms as i64),
            duration: Duration::milliseconds(duration_ms as i64),
        }
    }

    /// Start of the payload's span.
    pub fn start(&self) -> Duration {
        self.relative
    }

    /// End of the payload's span.
    pub fn end(&self) -> Duration {
        self.relative + self.duration
    }

    /// Start of the payload's span in seconds.
    pub fn start_seconds(&self) -> f64 {
        self.relative.as_seconds_f64()
    }

    /// End of the payload's span in seconds.
    pub fn end_seconds(&self) -> f64 {
        self.end().as_seconds_f64()
    }

    /// Returns `relative` (time since recording start) as milliseconds.
    pub fn relative_ms(&self) -> i128 {
        self.relative.whole_milliseconds()
    }

    /// Returns `duration` (span of the payload) as milliseconds.
    pub fn duration_ms(&self) -> i128 {
        self.duration.whole_milliseconds()
    }

    /// Adds another timestamp's span to this one, returning the shifted
    /// timestamp. Only the `relative` field changes. Used when
    /// concatenating payload runs from consecutive recordings.
    pub fn add(&self, other: &Self) -> Self {
        Self {
            relative: self.relative + other.relative + other.duration,
            ..self.to_owned()
        }
    }
}
