//! World time and durations.
//!
//! World time is a signed count of milliseconds on the world's own timeline.
//! It has no relation to wall-clock time; the world clock only moves when the
//! scheduler advances it. All arithmetic is checked and returns `None` on
//! overflow rather than wrapping.

use serde::{Deserialize, Serialize};

/// A point on the world timeline, in milliseconds. Defaults to
/// [`WorldTime::ZERO`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldTime(pub i64);

/// A non-directional span of world time, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeSpan(pub i64);

impl WorldTime {
    /// The start of the timeline.
    pub const ZERO: Self = Self(0);

    /// Construct from milliseconds.
    pub const fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    /// Milliseconds since the start of the timeline.
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Add a span, returning `None` on overflow.
    pub const fn checked_add(self, span: TimeSpan) -> Option<Self> {
        match self.0.checked_add(span.0) {
            Some(ms) => Some(Self(ms)),
            None => None,
        }
    }

    /// Add a span, clamping at the end of the representable timeline.
    pub const fn saturating_add(self, span: TimeSpan) -> Self {
        Self(self.0.saturating_add(span.0))
    }

    /// Span from `earlier` to `self`, returning `None` on overflow.
    pub const fn checked_since(self, earlier: Self) -> Option<TimeSpan> {
        match self.0.checked_sub(earlier.0) {
            Some(ms) => Some(TimeSpan(ms)),
            None => None,
        }
    }
}

impl TimeSpan {
    /// The empty span.
    pub const ZERO: Self = Self(0);

    /// Construct from milliseconds.
    pub const fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    /// Construct from whole seconds, saturating on overflow.
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Construct from whole minutes, saturating on overflow.
    pub const fn from_mins(mins: i64) -> Self {
        Self(mins.saturating_mul(60_000))
    }

    /// Length in milliseconds.
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Length in whole seconds (truncated).
    pub const fn whole_secs(self) -> i64 {
        match self.0.checked_div(1000) {
            Some(s) => s,
            None => 0,
        }
    }

    /// Whether the span is zero or negative.
    pub const fn is_empty(self) -> bool {
        self.0 <= 0
    }
}

impl core::fmt::Display for WorldTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "t+{}ms", self.0)
    }
}

impl core::fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_add_detects_overflow() {
        assert_eq!(
            WorldTime(10).checked_add(TimeSpan(5)),
            Some(WorldTime(15))
        );
        assert_eq!(WorldTime(i64::MAX).checked_add(TimeSpan(1)), None);
        assert_eq!(
            WorldTime(i64::MAX).saturating_add(TimeSpan(1)),
            WorldTime(i64::MAX)
        );
    }

    #[test]
    fn span_constructors() {
        assert_eq!(TimeSpan::from_secs(60).as_millis(), 60_000);
        assert_eq!(TimeSpan::from_mins(2), TimeSpan::from_secs(120));
        assert_eq!(TimeSpan::from_millis(2_999).whole_secs(), 2);
        assert!(TimeSpan::ZERO.is_empty());
    }

    #[test]
    fn defaults_are_zero() {
        assert_eq!(WorldTime::default(), WorldTime::ZERO);
        assert_eq!(TimeSpan::default(), TimeSpan::ZERO);
    }

    #[test]
    fn since_is_inverse_of_add() {
        let start = WorldTime(30_000);
        let end = WorldTime(90_000);
        assert_eq!(end.checked_since(start), Some(TimeSpan::from_secs(60)));
    }
}
