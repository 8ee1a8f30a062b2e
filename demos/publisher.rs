//! Publisher - minimal topic publisher for trying out the `ticker` demo.
//!
//! Accepts subscriptions on 127.0.0.1:9000, acknowledges every handshake and
//! pushes a price tick to each subscriber once a second. Heartbeats from the
//! client are answered with a zero-length frame.
//!
//! ```bash
//! cargo run --example publisher
//! cargo run --example ticker
//! ```

use std::time::Duration;

use serde::Serialize;
use subwire_client::protocol::{read_body, read_header, WireHeader};
use subwire_client::MsgPackCodec;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

#[derive(Serialize, Debug)]
struct Tick {
    symbol: String,
    price: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:9000").await?;
    eprintln!("Publishing on {}", listener.local_addr()?);

    loop {
        let (socket, peer) = listener.accept().await?;
        tokio::spawn(async move {
            if let Err(e) = serve(socket).await {
                eprintln!("Subscriber {} gone: {}", peer, e);
            }
        });
    }
}

async fn serve(socket: TcpStream) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (mut reader, mut writer) = socket.into_split();

    let header = read_header(&mut reader).await?;
    let body = read_body(&mut reader, header.length).await?;
    let split = body.iter().position(|&b| b == 0).ok_or("missing procedure")?;
    let symbol: String = MsgPackCodec::decode(&body[split + 1..])?;
    eprintln!("Subscribed: {}", symbol);

    writer.write_all(&WireHeader::new(0, 0).encode()).await?;

    // Frames from both the heartbeat responder and the tick loop go through one writer.
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let pongs = tx.clone();
    tokio::spawn(async move {
        while let Ok(header) = read_header(&mut reader).await {
            if !header.is_heartbeat() {
                continue;
            }
            if pongs.send(WireHeader::heartbeat().encode().to_vec()).is_err() {
                break;
            }
        }
    });

    let ticks = tokio::spawn(async move {
        let mut price = 1000u64;
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
            price = price + 7 - (price % 13);
            let tick = Tick {
                symbol: symbol.clone(),
                price,
            };
            let Ok(payload) = MsgPackCodec::encode(&tick) else {
                break;
            };
            let mut frame = WireHeader::new(payload.len() as u32, 0).encode().to_vec();
            frame.extend(payload);
            if tx.send(frame).is_err() {
                break;
            }
        }
    });

    while let Some(frame) = rx.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            ticks.abort();
            return Err(e.into());
        }
    }
    Ok(())
}
