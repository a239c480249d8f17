//! Drive a session against a simulated target over an in-memory pipe.
//!
//! ```bash
//! RUST_LOG=debug cargo run -p sidestub-core --example loopback
//! ```

use std::sync::Arc;

use sidestub_core::{Session, SessionConfig};
use sidestub_protocol::{checksum, Framer, Frame};
use sidestub_transport::StreamTransport;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tracing_subscriber::EnvFilter;

fn frame(start: u8, body: &str) -> Vec<u8> {
    format!("{}{}#{}", start as char, body, checksum::compute(body.as_bytes())).into_bytes()
}

/// Answers every command with a canned reply and reports a tracepoint hit
async fn target(mut pipe: DuplexStream) -> std::io::Result<()> {
    let mut framer = Framer::new();
    let mut buf = [0u8; 256];

    loop {
        let n = pipe.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }

        for result in framer.feed(&buf[..n]) {
            let Ok(Frame::Packet(packet)) = result else {
                continue;
            };
            pipe.write_all(b"+").await?;

            let body = packet.payload_lossy();
            let reply = if let Some(symbol) = body.strip_prefix("vTR") {
                pipe.write_all(&frame(b'%', &format!("Tracepoint hit: {}", symbol))).await?;
                "0000000080200000".to_string()
            } else if body.starts_with("vTM") {
                "deadbeef".to_string()
            } else {
                String::new()
            };
            pipe.write_all(&frame(b'$', &reply)).await?;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (transport, far_end) = StreamTransport::pair(4096);
    tokio::spawn(target(far_end));

    let session = Session::start(Arc::new(transport), SessionConfig::default()).await?;
    let mut notifications = session
        .take_notifications()
        .ok_or_else(|| anyhow::anyhow!("notifications already taken"))?;

    let registers = session.tracepoint_get_registers("sys_write").await?;
    println!("registers: {:?}", registers);

    if let Some(note) = notifications.recv().await {
        println!("notification: {}", note.payload_lossy());
    }

    let memory = session.tracepoint_get_memory(0x8020_0000, 4).await?;
    println!("memory: {}", hex::encode(memory));

    let reply = session.tracepoint_get_arguments("sys_read").await?;
    println!("arguments: {:?}", reply);

    println!("stats: {:?}", session.stats());
    session.disconnect().await?;
    Ok(())
}
