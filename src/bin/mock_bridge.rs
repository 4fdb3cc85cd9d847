//! Mock terminal bridge for integration testing
//!
//! Accepts WebSocket clients and echoes every input frame back as a binary
//! frame, the way a PTY in echo mode would. Resize control messages are
//! accepted silently.

use std::io::Write;

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser)]
#[command(name = "mock_bridge", about = "Loopback echo bridge for term-e2e")]
struct Args {
    /// Port to listen on (0 picks a free port)
    #[arg(long, default_value_t = 0)]
    port: u16,

    /// Exit after the first connection closes
    #[arg(long)]
    once: bool,
}

fn is_resize(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .map(|v| v.get("type").and_then(|t| t.as_str()) == Some("resize"))
        .unwrap_or(false)
}

async fn serve(stream: TcpStream) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut source) = ws.split();

    while let Some(message) = source.next().await {
        match message? {
            Message::Binary(data) => sink.send(Message::Binary(data)).await?,
            Message::Text(text) if is_resize(text.as_str()) => {}
            Message::Text(text) => {
                sink.send(Message::Binary(text.as_str().as_bytes().to_vec().into()))
                    .await?
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    // Completes the closing handshake if the client started it.
    let _ = sink.close().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let listener = match TcpListener::bind(("127.0.0.1", args.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Error: failed to bind port {}: {e}", args.port);
            std::process::exit(1);
        }
    };
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("listening on ws://{addr}");
    let _ = std::io::stdout().flush();

    loop {
        let (stream, _) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                eprintln!("accept failed: {e}");
                continue;
            }
        };

        if args.once {
            if let Err(e) = serve(stream).await {
                eprintln!("connection error: {e}");
            }
            break;
        }

        tokio::spawn(async move {
            if let Err(e) = serve(stream).await {
                eprintln!("connection error: {e}");
            }
        });
    }
}
