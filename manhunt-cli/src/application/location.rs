use crate::application::Walker;

/// Whether position samples can be produced at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationStatus {
    Authorized,
    Denied,
}

/// Source of own-position samples.
///
/// The session engine consumes coordinates and never talks to GPS hardware;
/// this is the boundary where a real device would plug in its location
/// service. The demo binary plugs in a [`Walker`].
pub trait LocationSource {
    fn status(&self) -> LocationStatus;

    /// Next position, or `None` when no fix is available
    fn sample(&mut self) -> Option<(f64, f64)>;
}

impl LocationSource for Walker {
    fn status(&self) -> LocationStatus {
        LocationStatus::Authorized
    }

    fn sample(&mut self) -> Option<(f64, f64)> {
        Some(self.step())
    }
}
