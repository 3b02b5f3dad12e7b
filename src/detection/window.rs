//! # Window Filter
//!
//! Decides whether an event's time of day lies inside the inspection
//! window. The window is a closed interval: both bounds are included.
//!
//! No zone conversion happens here. Every timestamp in one log is assumed
//! to share a zone; that is an input precondition, not something checked.

use serde::Serialize;

use crate::{SweepError, SweepResult, TimeOfDay};

/// Closed `[start, end]` interval over time of day.
///
/// Windows that cross midnight are not representable: `start > end` is
/// rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InspectionWindow {
    start: TimeOfDay,
    end: TimeOfDay,
}

impl InspectionWindow {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> SweepResult<Self> {
        if start > end {
            return Err(SweepError::InvalidPolicy(format!(
                "window start {} is after window end {} (midnight wraparound is not supported)",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse both bounds from `HH:MM:SS` strings.
    pub fn parse(start: &str, end: &str) -> SweepResult<Self> {
        let parse_bound = |label: &str, text: &str| {
            TimeOfDay::parse(text).ok_or_else(|| {
                SweepError::InvalidPolicy(format!(
                    "window {} '{}' is not a zero-padded HH:MM:SS time",
                    label, text
                ))
            })
        };
        Self::new(parse_bound("start", start)?, parse_bound("end", end)?)
    }

    pub fn start(&self) -> TimeOfDay {
        self.start
    }

    pub fn end(&self) -> TimeOfDay {
        self.end
    }

    /// `start <= t <= end`.
    pub fn contains(&self, t: TimeOfDay) -> bool {
        self.start <= t && t <= self.end
    }
}
