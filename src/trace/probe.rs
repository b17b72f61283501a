use super::{TraceResult, TraceStatus, Tracer};
use crate::enrich::Dispatcher;
use crate::error::TraceError;
use crate::hop::Hop;
use crate::lookup::Lookup;
use crate::packet::{self, IcmpReply, RECV_BUF_SIZE};
use crate::sink::{EventSink, HopEvent};
use crate::socket::ProbeSocket;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

pub(crate) fn validate(tracer: &Tracer) -> Result<(), TraceError> {
    if tracer.max_hop == 0 {
        return Err(TraceError::InvalidMaxHops(0));
    }
    if tracer.receive_timeout.is_zero() {
        return Err(TraceError::InvalidTimeout);
    }
    Ok(())
}

/// Reads datagrams until one answers the probe with `sequence_number`.
async fn recv_reply<S: ProbeSocket + ?Sized>(
    socket: &S,
    buf: &mut [u8],
    identifier: u16,
    sequence_number: u16,
) -> io::Result<(IcmpReply, Instant)> {
    loop {
        let (bytes_len, src_addr) = socket.recv_from(buf).await?;
        let recv_time = Instant::now();
        match packet::parse_reply(&buf[..bytes_len], identifier) {
            Some(reply) if reply.sequence_number == sequence_number => {
                return Ok((reply, recv_time));
            }
            _ => trace!(%src_addr, bytes_len, "ignoring unrelated datagram"),
        }
    }
}

/// Runs the TTL sweep on `socket`, then waits for the lookups it started.
pub(crate) async fn trace_route<S: ProbeSocket + ?Sized>(
    tracer: &Tracer,
    socket: &S,
    lookup: Arc<dyn Lookup>,
    sink: Arc<dyn EventSink>,
) -> Result<TraceResult, TraceError> {
    validate(tracer)?;
    let dst_ip = IpAddr::V4(tracer.dst_ip);
    let identifier: u16 = rand::random();
    let mut dispatcher = Dispatcher::new(lookup, Arc::clone(&sink));
    let mut hops: Vec<Hop> = Vec::with_capacity(tracer.max_hop as usize);
    let mut status = TraceStatus::Incomplete;
    let mut buf = vec![0u8; RECV_BUF_SIZE];

    info!(
        dst = %dst_ip,
        max_hop = tracer.max_hop,
        timeout_ms = tracer.receive_timeout.as_millis() as u64,
        "starting trace"
    );
    let start_time = Instant::now();

    for ttl in 1..=tracer.max_hop {
        if tracer.cancel.is_cancelled() {
            status = TraceStatus::Cancelled;
            break;
        }
        socket
            .set_ttl(ttl as u32)
            .map_err(|source| TraceError::SetTtl { ttl, source })?;
        let icmp_packet = packet::build_icmpv4_echo_packet(identifier, ttl as u16)
            .ok_or(TraceError::PacketBuild)?;

        let send_time = Instant::now();
        socket
            .send_to(&icmp_packet, tracer.dst_ip)
            .await
            .map_err(|source| TraceError::Send { ttl, source })?;
        trace!(ttl, "probe sent");

        let deadline = tokio::time::Instant::from_std(send_time) + tracer.receive_timeout;
        let recv = tokio::select! {
            biased;
            _ = tracer.cancel.cancelled() => {
                status = TraceStatus::Cancelled;
                break;
            }
            recv = tokio::time::timeout_at(
                deadline,
                recv_reply(socket, &mut buf, identifier, ttl as u16),
            ) => recv,
        };

        let hop = match recv {
            Ok(Ok((reply, recv_time))) => {
                let rtt: Duration = recv_time.duration_since(send_time);
                debug!(ttl, kind = ?reply.kind, "reply matched");
                Hop::reply(ttl, IpAddr::V4(reply.source), rtt)
            }
            Ok(Err(e)) => {
                debug!(ttl, error = %e, "receive failed");
                Hop::timeout(ttl)
            }
            Err(_) => Hop::timeout(ttl),
        };
        debug!(
            ttl,
            addr = %hop.address(),
            rtt_ms = hop.rtt_millis(),
            private = hop.is_private,
            "hop"
        );

        sink.emit(HopEvent::Hop(hop.clone()));
        let reached = hop.ip_addr == Some(dst_ip);
        dispatcher.dispatch(&hop);
        hops.push(hop);

        if reached {
            status = TraceStatus::Done;
            break;
        }
    }

    debug!(pending = dispatcher.pending(), "waiting for lookups");
    for enriched in dispatcher.join(&tracer.cancel).await {
        if let Some(hop) = hops.get_mut(enriched.number as usize - 1) {
            hop.enrichment = enriched.enrichment;
        }
    }
    // Cancelling the join barrier only drops lookups; a reached destination stays Done.
    if status == TraceStatus::Incomplete && tracer.cancel.is_cancelled() {
        status = TraceStatus::Cancelled;
    }

    let trace_time = start_time.elapsed();
    for hop in &hops {
        let info = hop.enrichment.as_ref();
        info!(
            hop = hop.number,
            addr = %hop.address(),
            country = info.and_then(|i| i.country.as_deref()).unwrap_or("-"),
            as_name = info.and_then(|i| i.as_name.as_deref()).unwrap_or("-"),
            "summary"
        );
    }
    info!(
        status = ?status,
        hops = hops.len(),
        trace_time_ms = trace_time.as_millis() as u64,
        "trace finished"
    );

    Ok(TraceResult {
        hops,
        status,
        trace_time,
    })
}
