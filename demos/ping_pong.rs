//! Ping/pong over a linked pair of in-memory sessions.
//!
//! A "phone" connector pings a "watch" connector, which answers every ping
//! with a pong and publishes its now-playing state as application context.
//!
//! Run with: RUST_LOG=session_link=debug cargo run --example ping_pong

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use session_link::{Connector, Descriptor, MemorySession, Message, RawPayload, Result, SessionConfig};

#[derive(Debug, Serialize, Deserialize)]
struct Ping {
    count: i64,
}

impl Message for Ping {
    const TAG: &'static str = "ping";

    fn to_fields(&self) -> Result<RawPayload> {
        session_link::to_fields(self)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Pong {
    count: i64,
}

impl Message for Pong {
    const TAG: &'static str = "pong";

    fn to_fields(&self) -> Result<RawPayload> {
        session_link::to_fields(self)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct NowPlaying {
    title: String,
    position_s: f64,
}

impl Message for NowPlaying {
    const TAG: &'static str = "now_playing";

    fn to_fields(&self) -> Result<RawPayload> {
        session_link::to_fields(self)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (phone_session, watch_session) =
        MemorySession::pair(SessionConfig::new("phone"), SessionConfig::new("watch"));

    let phone = Connector::builder(phone_session).build()?;
    let watch = Connector::builder(watch_session).build()?;

    // ---
    // The watch answers pings and reports what it is playing
    let responder = watch.clone();
    let _on_ping = watch.subscribe(Descriptor::<Ping>::json(), move |ping: Ping| {
        println!("watch: got ping #{}", ping.count);

        let reply = Pong { count: ping.count };
        if let Err(err) = responder.send(reply, None) {
            eprintln!("watch: pong not sent: {err}");
        }
        responder.update_application_context(&NowPlaying {
            title: format!("Track {}", ping.count),
            position_s: ping.count as f64 * 1.5,
        });
    });

    // ---
    // The phone counts pongs and watches the context
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let _on_pong = phone.subscribe(Descriptor::<Pong>::json(), move |pong: Pong| {
        println!("phone: got pong #{}", pong.count);
        let _ = done_tx.send(pong.count);
    });
    let _on_context = phone.subscribe(Descriptor::<NowPlaying>::json(), |now: NowPlaying| {
        println!("phone: watch is playing {:?} at {:.1}s", now.title, now.position_s);
    });

    for count in 1..=3 {
        phone.send(
            Ping { count },
            Some(Box::new(|err| eprintln!("phone: ping lost: {err}"))),
        )?;

        match tokio::time::timeout(Duration::from_secs(1), done_rx.recv()).await {
            Ok(Some(n)) => println!("round trip {n} complete"),
            _ => eprintln!("no pong for ping #{count}"),
        }
    }

    phone.flush_deliveries().await;
    Ok(())
}
