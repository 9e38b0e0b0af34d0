/// Engine status definitions
///
/// Exactly one engine is long-lived per process; its status is the sole gate
/// controlling whether new work may start.
use std::fmt;

/// Represents the current lifecycle status of the crawl engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineStatus {
    /// No crawl in progress; a new one may start
    #[default]
    Free,

    /// The batch loop is running
    Active,

    /// A stop was requested; in-flight operations are draining
    Closing,
}

impl EngineStatus {
    /// Returns true if a new crawl may be started
    pub fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }

    /// Returns true if crawl operations should treat themselves as live
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns the lowercase name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Active => "active",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
