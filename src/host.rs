//! Bridge for UI hosts that call into the tracer with plain values and
//! expect an error string back.

use crate::error::TraceError;
use crate::sink::EventSink;
use crate::trace::Tracer;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Checks the raw call arguments and turns them into a [`Tracer`].
pub fn tracer_for(
    destination: &str,
    max_hops: u32,
    timeout_millis: u64,
) -> Result<Tracer, TraceError> {
    let dst_ip = parse_destination(destination)?;
    if max_hops == 0 || max_hops > u8::MAX as u32 {
        return Err(TraceError::InvalidMaxHops(max_hops));
    }
    if timeout_millis == 0 {
        return Err(TraceError::InvalidTimeout);
    }
    let mut tracer = Tracer::new(dst_ip);
    tracer.set_max_hop(max_hops as u8);
    tracer.set_receive_timeout(Duration::from_millis(timeout_millis));
    Ok(tracer)
}

fn parse_destination(destination: &str) -> Result<Ipv4Addr, TraceError> {
    match destination.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(ipv4_addr)) => Ok(ipv4_addr),
        Ok(ip_addr) => Err(TraceError::UnsupportedDestination(ip_addr)),
        Err(_) => Err(TraceError::InvalidDestination(destination.to_string())),
    }
}

/// Traces `destination`, streaming `"hop"` and `"hop info"` events to `sink`.
///
/// Returns an empty string on success, including when the destination was
/// never reached, and the error message when the trace could not run.
pub async fn trace(
    destination: &str,
    max_hops: u32,
    timeout_millis: u64,
    sink: Arc<dyn EventSink>,
) -> String {
    let result = match tracer_for(destination, max_hops, timeout_millis) {
        Ok(tracer) => tracer.trace_with_sink(sink).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(_) => String::new(),
        Err(e) => {
            error!(destination, error = %e, "trace failed");
            e.to_string()
        }
    }
}
