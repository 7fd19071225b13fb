//! Status taxonomy and worst-status aggregation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Liveness status of a single target, or of all targets combined.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Not probed yet, or reset after a configuration change.
    #[default]
    Init,
    /// Last probe got a response in [200, 400).
    Up,
    /// Last probe failed, timed out or got an HTTP error.
    Down,
    /// The target URL is malformed; no request could be built.
    Bad,
}

impl Status {
    /// Severity rank used for aggregation. Higher is worse.
    pub fn severity(self) -> u8 {
        match self {
            Status::Up => 0,
            Status::Init => 1,
            Status::Bad => 2,
            Status::Down => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Init => "init",
            Status::Up => "up",
            Status::Down => "down",
            Status::Bad => "bad",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduce a set of statuses to the worst one.
///
/// Severity order, worst first: `Down`, `Bad`, `Init`, `Up`.
/// An empty input (no targets configured) yields `Init`.
pub fn aggregate<I>(statuses: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    statuses
        .into_iter()
        .max_by_key(|s| s.severity())
        .unwrap_or(Status::Init)
}
