//! Live ICMP traceroute.
//!
//! Probes a destination with ICMP echo requests of increasing TTL, reports
//! every hop as soon as it is classified, and looks up IP metadata for each
//! public hop concurrently. See [`trace::Tracer`] for the main entry point
//! and [`host::trace`] for the string-in/string-out bridge used by UI hosts.

pub mod enrich;
pub mod error;
pub mod hop;
pub mod host;
pub mod lookup;
pub mod packet;
pub mod sink;
pub mod socket;
pub mod trace;

pub use error::TraceError;
pub use hop::Hop;
pub use lookup::EnrichmentInfo;
pub use sink::{EventSink, HopEvent};
pub use trace::{TraceResult, TraceStatus, Tracer};
