//! Framed TCP link against a simulated device.
//!
//! Demonstrates:
//! - Building a FramedLink with STX/ETX delimiters
//! - Subscribing to link events
//! - Sending commands and reading decoded replies
//! - Automatic reconnect after the device drops the connection
//!
//! Usage:
//!   cargo run --example framed_tcp
//!   cargo run --example framed_tcp -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::Context;
use device_link::{FramedEvent, FramedLink, Link, LinkEvent, SerialFrame};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const STX: u8 = 0x02;
const ETX: u8 = 0x03;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let debug = std::env::args().any(|a| a == "--debug");
    init_logging(debug);

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    println!("=== Framed TCP Link ===\n");

    // ========================================================================
    // Simulated Device
    // ========================================================================

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind device listener")?;
    let port = listener.local_addr()?.port();
    tokio::spawn(device(listener));
    println!("[Setup] Device listening on 127.0.0.1:{port}\n");

    // ========================================================================
    // Link
    // ========================================================================

    let link = Link::builder()
        .tcp("127.0.0.1", port)
        .reconnect_delay(Duration::from_millis(500))
        .build_framed(SerialFrame::new().with_header([STX]).with_footer([ETX]))?;

    link.subscribe(|event| match event {
        FramedEvent::Link(LinkEvent::ConnectedChanged(up)) => {
            println!("[Event] connected = {up}");
        }
        FramedEvent::Link(LinkEvent::Error { error, context }) => {
            println!("[Event] error in {context}: {error}");
        }
        _ => {}
    });

    wait_connected(&link).await?;

    // ========================================================================
    // Commands
    // ========================================================================

    for command in ["POWER?", "INPUT?", "BYE"] {
        println!("[Send] {command}");
        link.send_message(command);
        tokio::time::sleep(Duration::from_millis(200)).await;

        while let Some(reply) = link.receive()? {
            println!("        ✓ {reply}");
        }
    }

    // The device hangs up on BYE; the link reconnects on its own.
    wait_connected(&link).await?;
    link.send_message("POWER?");
    tokio::time::sleep(Duration::from_millis(200)).await;
    if let Some(reply) = link.receive()? {
        println!("[Reconnected] ✓ {reply}");
    }

    link.dispose();
    println!("\n=== Done ===");
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn init_logging(debug: bool) {
    let filter = if debug {
        "device_link=debug"
    } else {
        "device_link=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

async fn wait_connected(link: &FramedLink) -> anyhow::Result<()> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !link.is_connected() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .context("link did not connect")
}

/// Accepts connections forever, answering each framed command.
async fn device(listener: TcpListener) {
    while let Ok((socket, _)) = listener.accept().await {
        tokio::spawn(serve(socket));
    }
}

async fn serve(mut socket: TcpStream) {
    let mut buf = [0u8; 256];
    let mut command = Vec::new();

    while let Ok(n) = socket.read(&mut buf).await {
        if n == 0 {
            return;
        }
        for &byte in &buf[..n] {
            match byte {
                STX => command.clear(),
                ETX => {
                    let reply = match command.as_slice() {
                        b"POWER?" => "POWER=ON",
                        b"INPUT?" => "INPUT=HDMI1",
                        b"BYE" => return,
                        _ => "ERR",
                    };
                    let mut frame = vec![STX];
                    frame.extend_from_slice(reply.as_bytes());
                    frame.push(ETX);
                    if socket.write_all(&frame).await.is_err() {
                        return;
                    }
                    command.clear();
                }
                other => command.push(other),
            }
        }
    }
}
