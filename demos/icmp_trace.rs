use lycaon::trace::default_src_ip;
use lycaon::{HopEvent, Tracer};
use std::net::Ipv4Addr;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

// Raw ICMP sockets need root or CAP_NET_RAW:
//   sudo -E cargo run --example icmp_trace -- 1.1.1.1
// Pass `--pin-source` to bind to the default interface address.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dst_ip: Ipv4Addr = match std::env::args().nth(1).as_deref().unwrap_or("1.1.1.1").parse() {
        Ok(ip) => ip,
        Err(e) => {
            eprintln!("invalid IPv4 address: {}", e);
            return;
        }
    };

    let mut tracer = Tracer::new(dst_ip);
    if std::env::args().any(|arg| arg == "--pin-source") {
        if let Some(src_ip) = default_src_ip() {
            tracer.set_src_ip(src_ip);
        }
    }
    let mut rx = tracer.get_progress_receiver();
    let cancel = tracer.get_cancel_token();
    let handle = tokio::spawn(async move { tracer.trace_async().await });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    println!("Progress:");
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                eprintln!("  ({} events skipped)", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        match &event {
            HopEvent::Hop(hop) => println!("{}", hop),
            HopEvent::HopInfo(_) => match event.to_json() {
                Ok(json) => println!("  {} {}", event.name(), json),
                Err(e) => eprintln!("  {}", e),
            },
        }
    }

    println!("Result:");
    match handle.await {
        Ok(Ok(r)) => {
            println!("Status: {:?}", r.status);
            for hop in r.hops {
                println!("{}", hop);
            }
            println!("Trace Time: {:?}", r.trace_time);
        }
        Ok(Err(e)) => eprintln!("{}", e),
        Err(e) => eprintln!("join error: {}", e),
    }
}
