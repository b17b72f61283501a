mod probe;

mod tracer;
pub use tracer::*;

use crate::hop::Hop;
use std::time::Duration;

/// Exit status of traceroute
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceStatus {
    /// The destination answered
    Done,
    /// The TTL budget ran out before the destination answered
    Incomplete,
    /// Stopped through the tracer's cancellation token
    Cancelled,
}

/// Result of traceroute
#[derive(Clone, Debug)]
pub struct TraceResult {
    /// One entry per probed TTL, enrichment merged in
    pub hops: Vec<Hop>,
    pub status: TraceStatus,
    /// Wall time of the sweep and the lookups it started
    pub trace_time: Duration,
}

impl TraceResult {
    pub fn reached(&self) -> bool {
        self.status == TraceStatus::Done
    }
}
