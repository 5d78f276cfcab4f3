use instant::Instant;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp in milliseconds since process start (monotonic).
///
/// Position samples are stamped by the device that produced them, so
/// comparisons only ever happen between timestamps from the same origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp representing the current moment
    pub fn now() -> Self {
        // Single anchor point for all timestamps in this process
        static ANCHOR: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
        let anchor = ANCHOR.get_or_init(Instant::now);

        let elapsed = Instant::now().duration_since(*anchor);
        Timestamp(elapsed.as_millis() as u64)
    }

    /// Get the raw milliseconds value
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Create a timestamp from a raw milliseconds value (wire decoding, tests)
    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_are_monotonic() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        assert!(a <= b);
    }

    #[test]
    fn test_from_millis_ordering() {
        assert!(Timestamp::from_millis(100) < Timestamp::from_millis(200));
        assert_eq!(Timestamp::from_millis(100).as_millis(), 100);
    }
}
